use super::{RawTranscript, TranscriptProvider};
use crate::config::TranscriptConfig;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

/// Supadata transcript API client
pub struct SupadataClient {
    config: TranscriptConfig,
    client: reqwest::Client,
}

impl SupadataClient {
    pub fn new(config: TranscriptConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| PipelineError::TranscriptFetch(e.to_string()))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl TranscriptProvider for SupadataClient {
    async fn fetch(&self, video_id: &str, language: &str) -> Result<RawTranscript> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(PipelineError::MissingCredential("SUPADATA_API_KEY"))?;

        let url = format!(
            "{}/youtube/transcript?videoId={}&lang={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(video_id),
            urlencoding::encode(language)
        );

        debug!("Requesting transcript from Supadata for {}", video_id);

        let response = self
            .client
            .get(&url)
            .header("x-api-key", api_key)
            .send()
            .await
            .map_err(|e| PipelineError::TranscriptFetch(e.to_string()))?;

        let status = response.status();
        debug!("Supadata status: {}", status);

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Supadata API error {}: {}", status, text);
            return Err(PipelineError::TranscriptFetch(format!("Supadata error: {}", status.as_u16())));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PipelineError::TranscriptFetch(e.to_string()))?;

        Ok(RawTranscript {
            body,
            partial: status == StatusCode::PARTIAL_CONTENT,
        })
    }
}
