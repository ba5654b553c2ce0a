use super::{ChannelInfo, PlaylistItem, PlaylistPage, VideoPlatform};
use crate::config::YouTubeConfig;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// YouTube Data API v3 client
pub struct YouTubeClient {
    config: YouTubeConfig,
    client: reqwest::Client,
}

impl YouTubeClient {
    pub fn new(config: YouTubeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| PipelineError::PlatformRequest(e.to_string()))?;

        Ok(Self { config, client })
    }

    async fn get_json(&self, resource: &str, params: &[(&str, &str)]) -> Result<Value> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(PipelineError::MissingCredential("YOUTUBE_API_KEY"))?;

        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), resource);
        debug!("YouTube API request: {} {:?}", resource, params);

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", api_key)])
            .send()
            .await
            .map_err(|e| PipelineError::PlatformRequest(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::PlatformRequest(format!(
                "YouTube API error {}: {}",
                status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| PipelineError::PlatformRequest(e.to_string()))
    }
}

#[async_trait]
impl VideoPlatform for YouTubeClient {
    async fn channel_by_handle(&self, handle: &str) -> Result<Option<ChannelInfo>> {
        let body = self
            .get_json("channels", &[("part", "id,contentDetails"), ("forHandle", handle)])
            .await?;
        Ok(parse_channel_lookup(&body))
    }

    async fn search_channel(&self, query: &str) -> Result<Option<String>> {
        let body = self
            .get_json("search", &[("part", "snippet"), ("type", "channel"), ("q", query)])
            .await?;
        Ok(parse_channel_search(&body))
    }

    async fn uploads_list_id(&self, channel_id: &str) -> Result<Option<String>> {
        let body = self
            .get_json("channels", &[("part", "contentDetails,id"), ("id", channel_id)])
            .await?;
        Ok(parse_channel_lookup(&body).map(|info| info.uploads_list_id))
    }

    async fn playlist_page(
        &self,
        uploads_list_id: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<PlaylistPage> {
        let max_results = max_results.to_string();
        let mut params = vec![
            ("part", "snippet,contentDetails"),
            ("playlistId", uploads_list_id),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let body = self.get_json("playlistItems", &params).await?;
        parse_playlist_page(&body)
    }

    async fn video_durations(&self, video_ids: &[String]) -> Result<HashMap<String, String>> {
        if video_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let ids = video_ids.join(",");
        let body = self
            .get_json("videos", &[("part", "contentDetails"), ("id", ids.as_str())])
            .await?;
        Ok(parse_video_durations(&body))
    }
}

fn str_at(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(Value::as_str).map(str::to_string)
}

/// Channel id and uploads list from a `channels` response
pub fn parse_channel_lookup(body: &Value) -> Option<ChannelInfo> {
    let item = body.pointer("/items/0")?;
    Some(ChannelInfo {
        channel_id: str_at(item, "/id")?,
        uploads_list_id: str_at(item, "/contentDetails/relatedPlaylists/uploads")?,
    })
}

/// First channel id from a `search` response
pub fn parse_channel_search(body: &Value) -> Option<String> {
    str_at(body, "/items/0/id/channelId")
}

/// Entries and continuation token from a `playlistItems` response
pub fn parse_playlist_page(body: &Value) -> Result<PlaylistPage> {
    let items = body.get("items").and_then(Value::as_array).ok_or_else(|| {
        PipelineError::PlatformRequest("Failed to fetch playlist items from YouTube API".to_string())
    })?;

    let items = items
        .iter()
        .filter_map(|item| {
            Some(PlaylistItem {
                video_id: str_at(item, "/contentDetails/videoId")?,
                title: str_at(item, "/snippet/title").unwrap_or_default(),
                thumbnail_url: str_at(item, "/snippet/thumbnails/high/url")
                    .or_else(|| str_at(item, "/snippet/thumbnails/default/url"))
                    .unwrap_or_default(),
                published_at: str_at(item, "/snippet/publishedAt").unwrap_or_default(),
            })
        })
        .collect();

    Ok(PlaylistPage {
        items,
        next_page_token: str_at(body, "/nextPageToken").filter(|token| !token.is_empty()),
    })
}

/// Raw ISO-8601 durations keyed by video id from a `videos` response
pub fn parse_video_durations(body: &Value) -> HashMap<String, String> {
    body.get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| Some((str_at(item, "/id")?, str_at(item, "/contentDetails/duration")?)))
                .collect()
        })
        .unwrap_or_default()
}
