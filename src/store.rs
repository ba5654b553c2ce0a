use crate::models::{
    Blueprint, BlueprintStatus, Creator, TripPoint, TripVideo, VideoStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    fn not_found(kind: &'static str, id: &str) -> Self {
        StoreError::NotFound { kind, id: id.to_string() }
    }
}

/// Creator fields to replace. `Some(None)` clears a field.
#[derive(Debug, Clone, Default)]
pub struct CreatorPatch {
    pub name: Option<String>,
    pub avatar_url: Option<Option<String>>,
    pub channel_id: Option<Option<String>>,
    pub channel_handle: Option<Option<String>>,
    pub uploads_list_id: Option<Option<String>>,
    pub next_page_token: Option<Option<String>>,
}

impl CreatorPatch {
    /// Cursor after a fresh channel resolution
    pub fn connected(channel_id: &str, handle: &str, uploads_list_id: &str) -> Self {
        Self {
            channel_id: Some(Some(channel_id.to_string())),
            channel_handle: Some(Some(handle.to_string())),
            uploads_list_id: Some(Some(uploads_list_id.to_string())),
            next_page_token: Some(None),
            ..Self::default()
        }
    }

    pub fn page_token(token: Option<String>) -> Self {
        Self {
            next_page_token: Some(token),
            ..Self::default()
        }
    }

    pub fn disconnected() -> Self {
        Self {
            channel_id: Some(None),
            channel_handle: Some(None),
            uploads_list_id: Some(None),
            next_page_token: Some(None),
            ..Self::default()
        }
    }

    fn apply(self, creator: &mut Creator) {
        if let Some(name) = self.name {
            creator.name = name;
        }
        if let Some(avatar_url) = self.avatar_url {
            creator.avatar_url = avatar_url;
        }
        if let Some(channel_id) = self.channel_id {
            creator.channel_id = channel_id;
        }
        if let Some(handle) = self.channel_handle {
            creator.channel_handle = handle;
        }
        if let Some(uploads) = self.uploads_list_id {
            creator.uploads_list_id = uploads;
        }
        if let Some(token) = self.next_page_token {
            creator.next_page_token = token;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VideoPatch {
    pub status: Option<VideoStatus>,
    pub transcript: Option<Option<String>>,
}

impl VideoPatch {
    pub fn status(status: VideoStatus) -> Self {
        Self { status: Some(status), ..Self::default() }
    }

    fn apply(self, video: &mut TripVideo) {
        if let Some(status) = self.status {
            video.status = status;
        }
        if let Some(transcript) = self.transcript {
            video.transcript = transcript;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlueprintPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub tags: Option<Vec<String>>,
    /// Replaces the whole point collection
    pub points: Option<Vec<TripPoint>>,
    pub status: Option<BlueprintStatus>,
    pub creator_verified: Option<Option<bool>>,
    pub published_at: Option<Option<DateTime<Utc>>>,
}

impl BlueprintPatch {
    pub fn points(points: Vec<TripPoint>) -> Self {
        Self { points: Some(points), ..Self::default() }
    }

    pub fn published(verified: bool, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(BlueprintStatus::Published),
            creator_verified: Some(Some(verified)),
            published_at: Some(Some(at)),
            ..Self::default()
        }
    }

    fn apply(self, blueprint: &mut Blueprint) {
        if let Some(title) = self.title {
            blueprint.title = title;
        }
        if let Some(description) = self.description {
            blueprint.description = description;
        }
        if let Some(price) = self.price {
            blueprint.price = price;
        }
        if let Some(tags) = self.tags {
            blueprint.tags = tags;
        }
        if let Some(points) = self.points {
            blueprint.points = points;
        }
        if let Some(status) = self.status {
            blueprint.status = status;
        }
        if let Some(verified) = self.creator_verified {
            blueprint.creator_verified = verified;
        }
        if let Some(published_at) = self.published_at {
            blueprint.published_at = published_at;
        }
    }
}

/// Persistence collaborator for creators, ingested videos and blueprints.
/// Lists are returned in insertion order.
#[async_trait]
pub trait BlueprintStore: Send + Sync {
    async fn insert_creator(&self, creator: Creator) -> Result<String>;
    async fn get_creator(&self, id: &str) -> Result<Option<Creator>>;
    async fn list_creators(&self) -> Result<Vec<Creator>>;
    async fn patch_creator(&self, id: &str, patch: CreatorPatch) -> Result<Creator>;

    /// Returns the existing id when the creator already has this platform video.
    async fn insert_video(&self, video: TripVideo) -> Result<String>;
    async fn get_video(&self, id: &str) -> Result<Option<TripVideo>>;
    async fn find_video(&self, creator_id: &str, platform_video_id: &str) -> Result<Option<TripVideo>>;
    async fn list_videos(&self, creator_id: &str) -> Result<Vec<TripVideo>>;
    async fn patch_video(&self, id: &str, patch: VideoPatch) -> Result<TripVideo>;
    async fn delete_video(&self, id: &str) -> Result<()>;
    async fn clear_creator_videos(&self, creator_id: &str) -> Result<usize>;

    async fn insert_blueprint(&self, blueprint: Blueprint) -> Result<String>;
    async fn get_blueprint(&self, id: &str) -> Result<Option<Blueprint>>;
    async fn list_blueprints(&self, creator_id: &str) -> Result<Vec<Blueprint>>;
    async fn list_blueprints_by_status(&self, status: BlueprintStatus) -> Result<Vec<Blueprint>>;
    async fn patch_blueprint(&self, id: &str, patch: BlueprintPatch) -> Result<Blueprint>;
    async fn delete_blueprint(&self, id: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    creators: Vec<Creator>,
    videos: Vec<TripVideo>,
    blueprints: Vec<Blueprint>,
}

/// In-memory store with an optional JSON snapshot on disk
#[derive(Clone)]
pub struct LocalStore {
    /// Snapshot file, if persistence is enabled
    snapshot_path: Option<PathBuf>,

    /// In-memory data (thread-safe)
    data: Arc<RwLock<StoreData>>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self {
            snapshot_path: None,
            data: Arc::new(RwLock::new(StoreData::default())),
        }
    }

    /// Open a store backed by `<state_dir>/store.json`, loading it if present
    pub async fn open(state_dir: &Path) -> Result<Self> {
        fs::create_dir_all(state_dir).await?;
        let snapshot_path = state_dir.join("store.json");

        let data = if fs::try_exists(&snapshot_path).await? {
            let content = fs::read_to_string(&snapshot_path).await?;
            serde_json::from_str(&content)?
        } else {
            StoreData::default()
        };

        info!(
            "📊 Store opened at {} ({} creators, {} videos, {} blueprints)",
            snapshot_path.display(),
            data.creators.len(),
            data.videos.len(),
            data.blueprints.len()
        );

        Ok(Self {
            snapshot_path: Some(snapshot_path),
            data: Arc::new(RwLock::new(data)),
        })
    }

    async fn persist(&self, data: &StoreData) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let tmp_path = path.with_extension("json.tmp");
        let json_content = serde_json::to_string_pretty(data)?;
        fs::write(&tmp_path, json_content).await?;
        fs::rename(&tmp_path, path).await?;

        debug!("💾 Store snapshot written to {}", path.display());
        Ok(())
    }

    /// Write a staged copy and swap it in. Memory only changes once the
    /// snapshot is on disk.
    async fn commit(&self, data: &mut StoreData, next: StoreData) -> Result<()> {
        self.persist(&next).await?;
        *data = next;
        Ok(())
    }
}

#[async_trait]
impl BlueprintStore for LocalStore {
    async fn insert_creator(&self, creator: Creator) -> Result<String> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        let id = creator.id.clone();
        next.creators.push(creator);
        self.commit(&mut data, next).await?;
        Ok(id)
    }

    async fn get_creator(&self, id: &str) -> Result<Option<Creator>> {
        let data = self.data.read().await;
        Ok(data.creators.iter().find(|c| c.id == id).cloned())
    }

    async fn list_creators(&self) -> Result<Vec<Creator>> {
        Ok(self.data.read().await.creators.clone())
    }

    async fn patch_creator(&self, id: &str, patch: CreatorPatch) -> Result<Creator> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        let creator = next
            .creators
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::not_found("creator", id))?;
        patch.apply(creator);
        let updated = creator.clone();
        self.commit(&mut data, next).await?;
        Ok(updated)
    }

    async fn insert_video(&self, video: TripVideo) -> Result<String> {
        let mut data = self.data.write().await;
        if let Some(existing) = data.videos.iter().find(|v| {
            v.creator_id == video.creator_id && v.platform_video_id == video.platform_video_id
        }) {
            debug!("Video {} already stored as {}", video.platform_video_id, existing.id);
            return Ok(existing.id.clone());
        }

        let mut next = data.clone();
        let id = video.id.clone();
        next.videos.push(video);
        self.commit(&mut data, next).await?;
        Ok(id)
    }

    async fn get_video(&self, id: &str) -> Result<Option<TripVideo>> {
        let data = self.data.read().await;
        Ok(data.videos.iter().find(|v| v.id == id).cloned())
    }

    async fn find_video(&self, creator_id: &str, platform_video_id: &str) -> Result<Option<TripVideo>> {
        let data = self.data.read().await;
        Ok(data
            .videos
            .iter()
            .find(|v| v.creator_id == creator_id && v.platform_video_id == platform_video_id)
            .cloned())
    }

    async fn list_videos(&self, creator_id: &str) -> Result<Vec<TripVideo>> {
        let data = self.data.read().await;
        Ok(data.videos.iter().filter(|v| v.creator_id == creator_id).cloned().collect())
    }

    async fn patch_video(&self, id: &str, patch: VideoPatch) -> Result<TripVideo> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        let video = next
            .videos
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| StoreError::not_found("video", id))?;
        patch.apply(video);
        let updated = video.clone();
        self.commit(&mut data, next).await?;
        Ok(updated)
    }

    async fn delete_video(&self, id: &str) -> Result<()> {
        let mut data = self.data.write().await;
        if !data.videos.iter().any(|v| v.id == id) {
            return Err(StoreError::not_found("video", id));
        }
        let mut next = data.clone();
        next.videos.retain(|v| v.id != id);
        self.commit(&mut data, next).await
    }

    async fn clear_creator_videos(&self, creator_id: &str) -> Result<usize> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        next.videos.retain(|v| v.creator_id != creator_id);
        let removed = data.videos.len() - next.videos.len();
        self.commit(&mut data, next).await?;
        if removed > 0 {
            info!("🧹 Cleared {} videos for creator {}", removed, creator_id);
        }
        Ok(removed)
    }

    async fn insert_blueprint(&self, blueprint: Blueprint) -> Result<String> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        let id = blueprint.id.clone();
        next.blueprints.push(blueprint);
        self.commit(&mut data, next).await?;
        Ok(id)
    }

    async fn get_blueprint(&self, id: &str) -> Result<Option<Blueprint>> {
        let data = self.data.read().await;
        Ok(data.blueprints.iter().find(|b| b.id == id).cloned())
    }

    async fn list_blueprints(&self, creator_id: &str) -> Result<Vec<Blueprint>> {
        let data = self.data.read().await;
        Ok(data
            .blueprints
            .iter()
            .filter(|b| b.creator_id == creator_id)
            .cloned()
            .collect())
    }

    async fn list_blueprints_by_status(&self, status: BlueprintStatus) -> Result<Vec<Blueprint>> {
        let data = self.data.read().await;
        Ok(data.blueprints.iter().filter(|b| b.status == status).cloned().collect())
    }

    async fn patch_blueprint(&self, id: &str, patch: BlueprintPatch) -> Result<Blueprint> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        let blueprint = next
            .blueprints
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| StoreError::not_found("blueprint", id))?;
        patch.apply(blueprint);
        let updated = blueprint.clone();
        self.commit(&mut data, next).await?;
        Ok(updated)
    }

    async fn delete_blueprint(&self, id: &str) -> Result<()> {
        let mut data = self.data.write().await;
        if !data.blueprints.iter().any(|b| b.id == id) {
            return Err(StoreError::not_found("blueprint", id));
        }
        let mut next = data.clone();
        next.blueprints.retain(|b| b.id != id);
        self.commit(&mut data, next).await
    }
}
