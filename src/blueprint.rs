use crate::config::BlueprintDefaults;
use crate::error::{PipelineError, Result};
use crate::llm::RawPoi;
use crate::models::{new_record_id, Blueprint, BlueprintStatus, TripPoint, VideoStatus};
use crate::places::PlaceEnricher;
use crate::store::{BlueprintPatch, BlueprintStore, VideoPatch};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

/// Turns extracted POIs into enriched trip points and persists draft blueprints.
pub struct BlueprintAssembler {
    enricher: PlaceEnricher,
    store: Arc<dyn BlueprintStore>,
    defaults: BlueprintDefaults,
    max_concurrent_lookups: usize,
}

impl BlueprintAssembler {
    pub fn new(
        enricher: PlaceEnricher,
        store: Arc<dyn BlueprintStore>,
        defaults: BlueprintDefaults,
        max_concurrent_lookups: usize,
    ) -> Self {
        Self {
            enricher,
            store,
            defaults,
            max_concurrent_lookups: max_concurrent_lookups.max(1),
        }
    }

    /// Enrich every POI. Lookups run concurrently but the result keeps
    /// extraction order, and a failed lookup only leaves its point bare.
    pub async fn enrich_all(&self, pois: Vec<RawPoi>) -> Vec<TripPoint> {
        let total = pois.len();
        let points: Vec<TripPoint> = stream::iter(pois)
            .map(|poi| async move {
                let query = poi.search_query.clone();
                let mut point = poi.into_point();
                let resolved = self.enricher.enrich_point(&mut point, &query).await;
                debug!("Enriched [{}]: {}", point.name, resolved);
                point
            })
            .buffered(self.max_concurrent_lookups)
            .collect()
            .await;

        let enriched = points.iter().filter(|p| p.is_enriched()).count();
        info!("🗺️ Enriched {}/{} points", enriched, total);
        points
    }

    /// Build and persist a draft blueprint for a stored video.
    pub async fn assemble(&self, pois: Vec<RawPoi>, video_id: &str) -> Result<Blueprint> {
        let video = self
            .store
            .get_video(video_id)
            .await?
            .ok_or_else(|| PipelineError::VideoNotFound(video_id.to_string()))?;

        let points = self.enrich_all(pois).await;

        let blueprint = Blueprint {
            id: new_record_id(),
            creator_id: video.creator_id.clone(),
            video_id: Some(video.id.clone()),
            platform_video_id: Some(video.platform_video_id.clone()),
            title: video.title.clone(),
            description: format!("{}{}", self.defaults.description_prefix, video.title),
            thumbnail_url: video.thumbnail_url.clone(),
            region: self.defaults.region.clone(),
            tags: self.defaults.tags.clone(),
            price: self.defaults.price,
            currency: self.defaults.currency.clone(),
            rating: 0.0,
            review_count: 0,
            points: points.iter().map(TripPoint::to_persisted).collect(),
            status: BlueprintStatus::Draft,
            creator_verified: None,
            created_at: Utc::now(),
            published_at: None,
        };

        self.store.insert_blueprint(blueprint.clone()).await?;
        info!("📘 Draft blueprint {} saved with {} points", blueprint.id, blueprint.points.len());
        Ok(blueprint)
    }

    /// Persist an already-built point list as a draft blueprint with no source video.
    pub async fn insert_unsourced(&self, creator_id: &str, title: &str, points: Vec<TripPoint>) -> Result<Blueprint> {
        let blueprint = Blueprint {
            id: new_record_id(),
            creator_id: creator_id.to_string(),
            video_id: None,
            platform_video_id: None,
            title: title.to_string(),
            description: format!("{}{}", self.defaults.description_prefix, title),
            thumbnail_url: String::new(),
            region: self.defaults.region.clone(),
            tags: self.defaults.tags.clone(),
            price: self.defaults.price,
            currency: self.defaults.currency.clone(),
            rating: 0.0,
            review_count: 0,
            points: points.iter().map(TripPoint::to_persisted).collect(),
            status: BlueprintStatus::Draft,
            creator_verified: None,
            created_at: Utc::now(),
            published_at: None,
        };

        self.store.insert_blueprint(blueprint.clone()).await?;
        Ok(blueprint)
    }

    /// Replace the point collection wholesale, keeping order.
    pub async fn replace_points(&self, blueprint_id: &str, points: &[TripPoint]) -> Result<Blueprint> {
        let blueprint = self.load(blueprint_id).await?;
        if blueprint.is_published() {
            return Err(PipelineError::AlreadyPublished(blueprint_id.to_string()));
        }

        let persisted = points.iter().map(TripPoint::to_persisted).collect();
        Ok(self.store.patch_blueprint(blueprint_id, BlueprintPatch::points(persisted)).await?)
    }

    /// Publish and fix the trust flag. A published blueprint is never re-stamped.
    pub async fn publish(&self, blueprint_id: &str, verified: bool) -> Result<Blueprint> {
        let blueprint = self.load(blueprint_id).await?;
        if !blueprint.status.can_transition_to(BlueprintStatus::Published) {
            return Err(PipelineError::AlreadyPublished(blueprint_id.to_string()));
        }

        let published = self
            .store
            .patch_blueprint(blueprint_id, BlueprintPatch::published(verified, Utc::now()))
            .await?;
        info!("🚀 Published blueprint {} (creator verified: {})", blueprint_id, verified);
        Ok(published)
    }

    /// Delete a blueprint and make its source video reprocessable.
    pub async fn delete(&self, blueprint_id: &str) -> Result<()> {
        let blueprint = self.load(blueprint_id).await?;
        self.store.delete_blueprint(blueprint_id).await?;

        if let Some(video_id) = &blueprint.video_id {
            if self.store.get_video(video_id).await?.is_some() {
                self.store
                    .patch_video(video_id, VideoPatch::status(VideoStatus::Pending))
                    .await?;
            }
        }

        info!("🗑️ Deleted blueprint {}", blueprint_id);
        Ok(())
    }

    pub async fn load(&self, blueprint_id: &str) -> Result<Blueprint> {
        self.store
            .get_blueprint(blueprint_id)
            .await?
            .ok_or_else(|| PipelineError::BlueprintNotFound(blueprint_id.to_string()))
    }
}
