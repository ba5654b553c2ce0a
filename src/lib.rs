//! Trip Blueprint
//!
//! Turns creator travel videos into geo-located, creator-verified trip plans:
//! channel ingestion, transcript assembly, model-driven point extraction,
//! place enrichment and a review state machine ending in publication.

pub mod blueprint;
pub mod channel;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod places;
pub mod store;
pub mod transcript;
pub mod verification;

// Re-export main types for easy access
pub use crate::blueprint::BlueprintAssembler;
pub use crate::channel::{ChannelIngestor, ConnectOutcome, VideoPlatform, YouTubeClient};
pub use crate::config::{Config, ConfigBuilder, EnrichmentBackend};
pub use crate::error::{PipelineError, Result};
pub use crate::llm::{GroundedPlaceSearch, LLMConfig, LLMProvider, PoiExtractor, RawPoi, LLM};
pub use crate::models::{Blueprint, BlueprintStatus, Creator, PointCategory, TripPoint, TripVideo, VideoStatus};
pub use crate::pipeline::{ProcessOutcome, ProcessStage, VideoProcessor};
pub use crate::places::{GooglePlacesClient, PlaceEnricher, PlaceInfo, PlaceSearch};
pub use crate::store::{BlueprintStore, LocalStore, StoreError};
pub use crate::transcript::{SupadataClient, TranscriptAssembler, TranscriptProvider};
pub use crate::verification::{SessionAction, SessionPhase, VerificationSession, VerificationSource, Verifier};
