//! Incremental ingestion of a creator's long-form uploads.
//!
//! A creator's cursor (channel id, handle, uploads list, continuation token)
//! lives on the creator record and is only written from here. Page fetches
//! for one creator are serialized, and a load-more always reads the token
//! from the store right before using it.

pub mod duration;
pub mod youtube;

use crate::error::{PipelineError, Result};
use crate::models::{new_record_id, Creator, TripVideo, VideoStatus};
use crate::store::{BlueprintStore, CreatorPatch};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub use duration::{parse_iso8601_duration, VideoDuration};
pub use youtube::YouTubeClient;

/// Upload-list entries requested per page
pub const PAGE_SIZE: u32 = 15;

/// Videos at or below this length are Shorts and never ingested
pub const SHORTS_MAX_SECONDS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub channel_id: String,
    pub uploads_list_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistItem {
    pub video_id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub published_at: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistPage {
    pub items: Vec<PlaylistItem>,
    pub next_page_token: Option<String>,
}

/// Video platform metadata API
#[async_trait]
pub trait VideoPlatform: Send + Sync {
    async fn channel_by_handle(&self, handle: &str) -> Result<Option<ChannelInfo>>;
    async fn search_channel(&self, query: &str) -> Result<Option<String>>;
    async fn uploads_list_id(&self, channel_id: &str) -> Result<Option<String>>;
    async fn playlist_page(
        &self,
        uploads_list_id: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<PlaylistPage>;
    /// Raw ISO-8601 durations keyed by video id, fetched in one call
    async fn video_durations(&self, video_ids: &[String]) -> Result<HashMap<String, String>>;
}

/// A long-form video that survived filtering
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelVideo {
    pub platform_video_id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub duration: String,
    pub duration_seconds: u64,
    pub published_at: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelPage {
    pub videos: Vec<ChannelVideo>,
    pub next_token: Option<String>,
    /// Entries dropped as Shorts
    pub filtered: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub count: usize,
    pub has_more: bool,
}

/// Strip `@`, surrounding whitespace and any `youtube.com/` URL prefix.
pub fn normalize_handle(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    let tail = match trimmed.find("youtube.com/") {
        Some(index) => &trimmed[index + "youtube.com/".len()..],
        None => trimmed,
    };
    let handle = tail.split(['/', '?']).next().unwrap_or_default();
    handle.trim_start_matches('@').to_string()
}

/// Keep entries longer than the Shorts limit, in playlist order.
pub fn filter_long_form(items: Vec<PlaylistItem>, durations: &HashMap<String, String>) -> (Vec<ChannelVideo>, usize) {
    let mut filtered = 0;
    let videos = items
        .into_iter()
        .filter_map(|item| {
            let parsed = durations
                .get(&item.video_id)
                .and_then(|raw| parse_iso8601_duration(raw));
            let total_seconds = parsed.as_ref().map(|d| d.total_seconds).unwrap_or(0);

            if total_seconds <= SHORTS_MAX_SECONDS {
                debug!("Filtered out Short: {} ({}s)", item.video_id, total_seconds);
                filtered += 1;
                return None;
            }

            Some(ChannelVideo {
                platform_video_id: item.video_id,
                title: item.title,
                thumbnail_url: item.thumbnail_url,
                duration: parsed.map(|d| d.clock).unwrap_or_else(|| "0:00".to_string()),
                duration_seconds: total_seconds,
                published_at: item.published_at,
            })
        })
        .collect();
    (videos, filtered)
}

pub struct ChannelIngestor {
    platform: Arc<dyn VideoPlatform>,
    store: Arc<dyn BlueprintStore>,
    cursor_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ChannelIngestor {
    pub fn new(platform: Arc<dyn VideoPlatform>, store: Arc<dyn BlueprintStore>) -> Self {
        Self {
            platform,
            store,
            cursor_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn cursor_lock(&self, creator_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.cursor_locks.lock().await;
        locks
            .entry(creator_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Resolve a handle, trying the direct lookup before a channel search.
    pub async fn resolve_handle(&self, handle: &str) -> Result<ChannelInfo> {
        let handle = normalize_handle(handle);

        if let Some(info) = self.platform.channel_by_handle(&handle).await? {
            debug!("Resolved @{} by handle to {}", handle, info.channel_id);
            return Ok(info);
        }

        if let Some(channel_id) = self.platform.search_channel(&handle).await? {
            if let Some(uploads_list_id) = self.platform.uploads_list_id(&channel_id).await? {
                debug!("Resolved @{} by search to {}", handle, channel_id);
                return Ok(ChannelInfo { channel_id, uploads_list_id });
            }
        }

        Err(PipelineError::ChannelNotFound(handle))
    }

    /// Fetch one page and its durations, then drop Shorts. Nothing is emitted
    /// before every duration is known.
    pub async fn fetch_page(&self, uploads_list_id: &str, token: Option<&str>) -> Result<ChannelPage> {
        let page = self.platform.playlist_page(uploads_list_id, token, PAGE_SIZE).await?;
        debug!("Fetched {} raw items from playlist", page.items.len());

        let ids: Vec<String> = page.items.iter().map(|item| item.video_id.clone()).collect();
        let durations = self.platform.video_durations(&ids).await?;

        let (videos, filtered) = filter_long_form(page.items, &durations);
        info!("🎞️ Keeping {} videos, filtered {} Shorts", videos.len(), filtered);

        Ok(ChannelPage {
            videos,
            next_token: page.next_page_token,
            filtered,
        })
    }

    /// Connect a channel (first page) or continue from the stored cursor.
    pub async fn connect_channel(&self, creator_id: &str, handle: &str, load_more: bool) -> Result<ConnectOutcome> {
        let lock = self.cursor_lock(creator_id).await;
        let _guard = lock.lock().await;

        let creator = self.load_creator(creator_id).await?;

        let (uploads_list_id, token) = if load_more {
            // Always the latest persisted token, never a caller-held copy
            let Some(token) = creator.next_page_token.clone() else {
                debug!("No continuation token for {}, nothing more to load", creator_id);
                return Ok(ConnectOutcome { count: 0, has_more: false });
            };
            let supplied = normalize_handle(handle);
            if creator.channel_handle.as_deref().is_some_and(|stored| stored != supplied) {
                warn!("Ignoring handle @{} on load-more, continuing @{:?}", supplied, creator.channel_handle);
            }
            (self.stored_uploads_list(&creator).await?, Some(token))
        } else {
            let info = self.fresh_cursor(&creator, handle).await?;
            self.store.clear_creator_videos(creator_id).await?;
            (info.uploads_list_id, None)
        };

        info!(
            "📺 Fetching uploads for creator {}{}",
            creator_id,
            token.as_deref().map(|t| format!(" (page {})", t)).unwrap_or_default()
        );

        let page = self.fetch_page(&uploads_list_id, token.as_deref()).await?;

        self.store
            .patch_creator(creator_id, CreatorPatch::page_token(page.next_token.clone()))
            .await?;

        let count = page.videos.len();
        for video in page.videos {
            self.store
                .insert_video(TripVideo {
                    id: new_record_id(),
                    creator_id: creator_id.to_string(),
                    platform_video_id: video.platform_video_id,
                    title: video.title,
                    thumbnail_url: video.thumbnail_url,
                    duration: video.duration,
                    duration_seconds: video.duration_seconds,
                    published_at: video.published_at,
                    status: VideoStatus::Pending,
                    transcript: None,
                    created_at: Utc::now(),
                })
                .await?;
        }

        Ok(ConnectOutcome {
            count,
            has_more: page.next_token.is_some(),
        })
    }

    /// Clear the cursor and every ingested video for a creator.
    pub async fn disconnect(&self, creator_id: &str) -> Result<usize> {
        let lock = self.cursor_lock(creator_id).await;
        let _guard = lock.lock().await;

        self.load_creator(creator_id).await?;
        self.store.patch_creator(creator_id, CreatorPatch::disconnected()).await?;
        let removed = self.store.clear_creator_videos(creator_id).await?;
        info!("🔌 Disconnected channel for creator {}", creator_id);
        Ok(removed)
    }

    async fn load_creator(&self, creator_id: &str) -> Result<Creator> {
        self.store
            .get_creator(creator_id)
            .await?
            .ok_or_else(|| PipelineError::CreatorNotFound(creator_id.to_string()))
    }

    async fn stored_uploads_list(&self, creator: &Creator) -> Result<String> {
        if let Some(uploads) = &creator.uploads_list_id {
            return Ok(uploads.clone());
        }

        let channel_id = creator
            .channel_id
            .as_deref()
            .ok_or_else(|| PipelineError::ChannelNotFound(creator.channel_handle.clone().unwrap_or_default()))?;

        let uploads = self
            .platform
            .uploads_list_id(channel_id)
            .await?
            .ok_or_else(|| PipelineError::ChannelNotFound(channel_id.to_string()))?;

        self.store
            .patch_creator(
                &creator.id,
                CreatorPatch { uploads_list_id: Some(Some(uploads.clone())), ..CreatorPatch::default() },
            )
            .await?;
        Ok(uploads)
    }

    async fn fresh_cursor(&self, creator: &Creator, handle: &str) -> Result<ChannelInfo> {
        let handle = normalize_handle(handle);

        let cached = match (&creator.channel_handle, &creator.channel_id, &creator.uploads_list_id) {
            (Some(stored), Some(channel_id), Some(uploads)) if *stored == handle => Some(ChannelInfo {
                channel_id: channel_id.clone(),
                uploads_list_id: uploads.clone(),
            }),
            _ => None,
        };

        let info = match cached {
            Some(info) => {
                debug!("Reusing cached channel {} for @{}", info.channel_id, handle);
                info
            }
            None => self.resolve_handle(&handle).await?,
        };

        self.store
            .patch_creator(
                &creator.id,
                CreatorPatch::connected(&info.channel_id, &handle, &info.uploads_list_id),
            )
            .await?;
        Ok(info)
    }
}
