use crate::blueprint::BlueprintAssembler;
use crate::error::{PipelineError, Result};
use crate::llm::PoiExtractor;
use crate::models::{TripVideo, VideoStatus};
use crate::store::{BlueprintStore, VideoPatch};
use crate::transcript::TranscriptAssembler;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Stages of turning one video into a draft blueprint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProcessStage {
    /// Fetching and assembling the transcript
    Transcript,

    /// Model call and response validation
    Extraction,

    /// Place lookups and blueprint persistence
    Assembly,

    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub blueprint_id: String,
    /// Zero is a valid outcome: no points found
    pub points_count: usize,
}

/// Drives transcript → extraction → enrichment → draft for one stored video.
pub struct VideoProcessor {
    transcripts: TranscriptAssembler,
    extractor: PoiExtractor,
    assembler: Arc<BlueprintAssembler>,
    store: Arc<dyn BlueprintStore>,
}

impl VideoProcessor {
    pub fn new(
        transcripts: TranscriptAssembler,
        extractor: PoiExtractor,
        assembler: Arc<BlueprintAssembler>,
        store: Arc<dyn BlueprintStore>,
    ) -> Self {
        Self {
            transcripts,
            extractor,
            assembler,
            store,
        }
    }

    /// Process a video by store id. On failure the video is marked `failed`.
    pub async fn process_video(&self, video_id: &str) -> Result<ProcessOutcome> {
        let video = self
            .store
            .get_video(video_id)
            .await?
            .ok_or_else(|| PipelineError::VideoNotFound(video_id.to_string()))?;

        info!("🎬 Processing video: {} ({})", video.title, video.platform_video_id);
        let start_time = Instant::now();

        self.store
            .patch_video(video_id, VideoPatch::status(VideoStatus::Processing))
            .await?;

        let mut stage = ProcessStage::Transcript;
        match self.run(&video, &mut stage).await {
            Ok(outcome) => {
                self.store
                    .patch_video(video_id, VideoPatch::status(VideoStatus::Completed))
                    .await?;
                info!(
                    "🎉 Video {} processed in {:.2}s: {} points",
                    video_id,
                    start_time.elapsed().as_secs_f64(),
                    outcome.points_count
                );
                Ok(outcome)
            }
            Err(e) => {
                error!("❌ Video {} failed during {:?}: {}", video_id, stage, e);
                if e.fails_video() {
                    if let Err(mark_err) = self
                        .store
                        .patch_video(video_id, VideoPatch::status(VideoStatus::Failed))
                        .await
                    {
                        warn!("Could not mark video {} as failed: {}", video_id, mark_err);
                    }
                }
                Err(e)
            }
        }
    }

    async fn run(&self, video: &TripVideo, stage: &mut ProcessStage) -> Result<ProcessOutcome> {
        let transcript = self.transcripts.fetch_transcript(&video.platform_video_id).await?;
        self.store
            .patch_video(
                &video.id,
                VideoPatch {
                    transcript: Some(Some(transcript.clone())),
                    ..VideoPatch::default()
                },
            )
            .await?;

        *stage = ProcessStage::Extraction;
        let pois = self.extractor.extract(&transcript).await?;
        if pois.is_empty() {
            info!("No points found in video {}", video.id);
        }

        *stage = ProcessStage::Assembly;
        let blueprint = self.assembler.assemble(pois, &video.id).await?;

        *stage = ProcessStage::Completed;
        Ok(ProcessOutcome {
            blueprint_id: blueprint.id,
            points_count: blueprint.points.len(),
        })
    }
}
