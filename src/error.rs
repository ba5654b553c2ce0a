//! Operation-boundary errors for the extraction, enrichment and
//! verification pipeline.

use crate::store::StoreError;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Transkrypcja video niedostępna na YouTube (brak napisów).")]
    TranscriptUnavailable,

    #[error("Transcript incomplete: {0}")]
    TranscriptIncomplete(String),

    #[error("Transcript is empty")]
    TranscriptEmpty,

    #[error("Transcript fetch failed: {0}")]
    TranscriptFetch(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Could not parse extraction response: {0}")]
    ExtractionParseError(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Video platform request failed: {0}")]
    PlatformRequest(String),

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Blueprint not found: {0}")]
    BlueprintNotFound(String),

    #[error("Creator not found: {0}")]
    CreatorNotFound(String),

    #[error("Blueprint already published: {0}")]
    AlreadyPublished(String),

    #[error("Nothing to publish")]
    NothingToPublish,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Errors that mark the triggering video as `failed` so it can be retried.
    pub fn fails_video(&self) -> bool {
        !matches!(self, PipelineError::VideoNotFound(_) | PipelineError::Store(_))
    }
}
