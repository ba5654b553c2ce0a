use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use trip_blueprint::channel::{ChannelInfo, PlaylistItem, PlaylistPage};
use trip_blueprint::config::{BlueprintDefaults, ConfigBuilder};
use trip_blueprint::llm::{GenerationRequest, LLMConfig, LLMProvider, LLMResponse};
use trip_blueprint::models::{Blueprint, BlueprintStatus, Creator, TripVideo, VideoStatus};
use trip_blueprint::store::{BlueprintPatch, CreatorPatch, VideoPatch};
use trip_blueprint::transcript::RawTranscript;
use trip_blueprint::verification::{FailureOrigin, PointUpdate, ReviewMode, SessionPhase};
use trip_blueprint::{
    BlueprintAssembler, BlueprintStore, ChannelIngestor, LocalStore, PipelineError, PlaceEnricher, PlaceInfo,
    PlaceSearch, PoiExtractor, StoreError, TranscriptAssembler, TranscriptProvider, VerificationSource,
    Verifier, VideoPlatform, VideoProcessor, LLM,
};

const EIFFEL_REPLY: &str = r#"```json
[{"name": "Eiffel Tower", "description": "Go at sunset.", "type": "activity", "day": 1, "timestamp": 45, "searchQuery": "Eiffel Tower Paris", "isGeneric": false}]
```"#;

/// Replies with a fixed body and records every request
struct ScriptedLlm {
    reply: String,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedLlm {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LLM for ScriptedLlm {
    async fn generate(&self, request: GenerationRequest) -> trip_blueprint::llm::Result<LLMResponse> {
        self.requests.lock().unwrap().push(request);
        Ok(LLMResponse {
            content: self.reply.clone(),
            ..LLMResponse::default()
        })
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::Gemini
    }
}

/// Serves one payload for every video
struct FixedTranscripts {
    body: serde_json::Value,
}

#[async_trait]
impl TranscriptProvider for FixedTranscripts {
    async fn fetch(&self, _video_id: &str, _language: &str) -> trip_blueprint::Result<RawTranscript> {
        Ok(RawTranscript {
            body: self.body.clone(),
            partial: false,
        })
    }
}

/// Resolves every query to the Eiffel Tower, or fails on demand
struct StubPlaces {
    fail: bool,
    calls: AtomicUsize,
}

impl StubPlaces {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PlaceSearch for StubPlaces {
    async fn text_search(&self, query: &str) -> anyhow::Result<PlaceInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("REQUEST_DENIED for {}", query);
        }
        Ok(PlaceInfo {
            name: Some(query.to_string()),
            lat: Some(48.8584),
            lng: Some(2.2945),
            place_id: Some("abc".to_string()),
            ..PlaceInfo::default()
        })
    }

    fn backend_name(&self) -> &'static str {
        "stub"
    }
}

/// Store that can be told to reject blueprint writes
struct FlakyStore {
    inner: LocalStore,
    fail_blueprint_writes: AtomicBool,
}

#[async_trait]
impl BlueprintStore for FlakyStore {
    async fn insert_creator(&self, creator: Creator) -> Result<String, StoreError> {
        self.inner.insert_creator(creator).await
    }
    async fn get_creator(&self, id: &str) -> Result<Option<Creator>, StoreError> {
        self.inner.get_creator(id).await
    }
    async fn list_creators(&self) -> Result<Vec<Creator>, StoreError> {
        self.inner.list_creators().await
    }
    async fn patch_creator(&self, id: &str, patch: CreatorPatch) -> Result<Creator, StoreError> {
        self.inner.patch_creator(id, patch).await
    }
    async fn insert_video(&self, video: TripVideo) -> Result<String, StoreError> {
        self.inner.insert_video(video).await
    }
    async fn get_video(&self, id: &str) -> Result<Option<TripVideo>, StoreError> {
        self.inner.get_video(id).await
    }
    async fn find_video(&self, creator_id: &str, platform_video_id: &str) -> Result<Option<TripVideo>, StoreError> {
        self.inner.find_video(creator_id, platform_video_id).await
    }
    async fn list_videos(&self, creator_id: &str) -> Result<Vec<TripVideo>, StoreError> {
        self.inner.list_videos(creator_id).await
    }
    async fn patch_video(&self, id: &str, patch: VideoPatch) -> Result<TripVideo, StoreError> {
        self.inner.patch_video(id, patch).await
    }
    async fn delete_video(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete_video(id).await
    }
    async fn clear_creator_videos(&self, creator_id: &str) -> Result<usize, StoreError> {
        self.inner.clear_creator_videos(creator_id).await
    }
    async fn insert_blueprint(&self, blueprint: Blueprint) -> Result<String, StoreError> {
        self.inner.insert_blueprint(blueprint).await
    }
    async fn get_blueprint(&self, id: &str) -> Result<Option<Blueprint>, StoreError> {
        self.inner.get_blueprint(id).await
    }
    async fn list_blueprints(&self, creator_id: &str) -> Result<Vec<Blueprint>, StoreError> {
        self.inner.list_blueprints(creator_id).await
    }
    async fn list_blueprints_by_status(&self, status: BlueprintStatus) -> Result<Vec<Blueprint>, StoreError> {
        self.inner.list_blueprints_by_status(status).await
    }
    async fn patch_blueprint(&self, id: &str, patch: BlueprintPatch) -> Result<Blueprint, StoreError> {
        if self.fail_blueprint_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")));
        }
        self.inner.patch_blueprint(id, patch).await
    }
    async fn delete_blueprint(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete_blueprint(id).await
    }
}

/// One channel with a fixed upload list
struct StubPlatform {
    items: Vec<(&'static str, &'static str)>,
}

#[async_trait]
impl VideoPlatform for StubPlatform {
    async fn channel_by_handle(&self, _handle: &str) -> trip_blueprint::Result<Option<ChannelInfo>> {
        Ok(Some(ChannelInfo {
            channel_id: "UC1".into(),
            uploads_list_id: "UU1".into(),
        }))
    }

    async fn search_channel(&self, _query: &str) -> trip_blueprint::Result<Option<String>> {
        Ok(None)
    }

    async fn uploads_list_id(&self, _channel_id: &str) -> trip_blueprint::Result<Option<String>> {
        Ok(Some("UU1".into()))
    }

    async fn playlist_page(
        &self,
        _uploads_list_id: &str,
        _page_token: Option<&str>,
        _max_results: u32,
    ) -> trip_blueprint::Result<PlaylistPage> {
        Ok(PlaylistPage {
            items: self
                .items
                .iter()
                .map(|(id, _)| PlaylistItem {
                    video_id: id.to_string(),
                    title: format!("Video {}", id),
                    thumbnail_url: format!("{}.jpg", id),
                    published_at: "2025-01-01T00:00:00Z".into(),
                })
                .collect(),
            next_page_token: None,
        })
    }

    async fn video_durations(&self, video_ids: &[String]) -> trip_blueprint::Result<HashMap<String, String>> {
        Ok(self
            .items
            .iter()
            .filter(|(id, _)| video_ids.iter().any(|v| v == id))
            .map(|(id, duration)| (id.to_string(), duration.to_string()))
            .collect())
    }
}

struct Harness {
    store: Arc<dyn BlueprintStore>,
    assembler: Arc<BlueprintAssembler>,
    processor: VideoProcessor,
    verifier: Verifier,
    llm: Arc<ScriptedLlm>,
}

fn eiffel_transcript() -> serde_json::Value {
    json!({"content": [
        {"text": "Hello!", "offset": 10},
        {"text": "Look at the Eiffel Tower.", "offset": 45}
    ]})
}

fn harness(store: Arc<dyn BlueprintStore>, places: Arc<StubPlaces>, transcript: serde_json::Value) -> Harness {
    let llm = ScriptedLlm::new(EIFFEL_REPLY);
    let enricher = PlaceEnricher::new(places);
    let assembler = Arc::new(BlueprintAssembler::new(
        enricher.clone(),
        store.clone(),
        BlueprintDefaults::default(),
        4,
    ));
    let extractor = PoiExtractor::new(llm.clone(), LLMConfig::default());
    let processor = VideoProcessor::new(
        TranscriptAssembler::new(Arc::new(FixedTranscripts { body: transcript }), "pl"),
        extractor,
        assembler.clone(),
        store.clone(),
    );
    let verifier = Verifier::new(enricher.clone(), enricher, assembler.clone())
        .with_extractor(Arc::new(PoiExtractor::new(llm.clone(), LLMConfig::default())));

    Harness {
        store,
        assembler,
        processor,
        verifier,
        llm,
    }
}

async fn seed_video(store: &Arc<dyn BlueprintStore>) -> String {
    let creator = Creator::new("Wanderlust");
    let creator_id = store.insert_creator(creator).await.unwrap();
    store
        .insert_video(TripVideo {
            id: trip_blueprint::models::new_record_id(),
            creator_id,
            platform_video_id: "dQw4w9WgXcQ".into(),
            title: "Paryż w weekend".into(),
            thumbnail_url: "thumb.jpg".into(),
            duration: "12:04".into(),
            duration_seconds: 724,
            published_at: "2025-01-01T00:00:00Z".into(),
            status: VideoStatus::Pending,
            transcript: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_eiffel_end_to_end() {
    let store: Arc<dyn BlueprintStore> = Arc::new(LocalStore::in_memory());
    let h = harness(store, StubPlaces::new(false), eiffel_transcript());
    let video_id = seed_video(&h.store).await;

    let outcome = assert_ok!(h.processor.process_video(&video_id).await);
    assert_eq!(outcome.points_count, 1);

    let sent = h.llm.requests.lock().unwrap()[0].user_text.clone();
    assert!(sent.contains("[10] Hello!\n[45] Look at the Eiffel Tower."));

    let video = h.store.get_video(&video_id).await.unwrap().unwrap();
    assert_eq!(video.status, VideoStatus::Completed);
    assert!(video.transcript.unwrap().starts_with("[10] Hello!"));

    let blueprint = h.assembler.load(&outcome.blueprint_id).await.unwrap();
    assert_eq!(blueprint.status, BlueprintStatus::Draft);
    assert_eq!(blueprint.points.len(), 1);
    let point = &blueprint.points[0];
    assert_eq!(point.name, "Eiffel Tower");
    assert_eq!(point.timestamp, Some(45));
    assert_eq!(point.coordinates(), Some((48.8584, 2.2945)));
    assert_eq!(point.place_id.as_deref(), Some("abc"));
    assert!(!point.verified);

    // Sequential review through to a verified publish
    let session = h
        .verifier
        .start_verification(VerificationSource::Blueprint(outcome.blueprint_id.clone()))
        .await;
    let session = h.verifier.approve(session).await;
    assert_eq!(session.phase(), &SessionPhase::Complete);
    assert!(session.verified()[0].verified);

    let session = h.verifier.finalize(session, true).await;
    assert_eq!(session.phase(), &SessionPhase::Published);

    let published = h.assembler.load(&outcome.blueprint_id).await.unwrap();
    assert_eq!(published.status, BlueprintStatus::Published);
    assert_eq!(published.creator_verified, Some(true));
    assert_eq!(published.points.len(), 1);
}

#[tokio::test]
async fn test_enrichment_failure_still_produces_draft() {
    let store: Arc<dyn BlueprintStore> = Arc::new(LocalStore::in_memory());
    let places = StubPlaces::new(true);
    let h = harness(store, places.clone(), eiffel_transcript());
    let video_id = seed_video(&h.store).await;

    let outcome = assert_ok!(h.processor.process_video(&video_id).await);
    assert_eq!(places.calls.load(Ordering::SeqCst), 1);

    let blueprint = h.assembler.load(&outcome.blueprint_id).await.unwrap();
    assert_eq!(blueprint.points.len(), 1);
    assert_eq!(blueprint.points[0].coordinates(), None);
    assert_eq!(blueprint.points[0].place_id, None);
}

#[tokio::test]
async fn test_unavailable_transcript_marks_video_failed() {
    let store: Arc<dyn BlueprintStore> = Arc::new(LocalStore::in_memory());
    let h = harness(
        store,
        StubPlaces::new(false),
        json!({"error": "transcript-unavailable", "message": "Transcript Unavailable"}),
    );
    let video_id = seed_video(&h.store).await;

    let err = assert_err!(h.processor.process_video(&video_id).await);
    assert!(matches!(err, PipelineError::TranscriptUnavailable));
    assert_eq!(err.to_string(), "Transkrypcja video niedostępna na YouTube (brak napisów).");

    let video = h.store.get_video(&video_id).await.unwrap().unwrap();
    assert_eq!(video.status, VideoStatus::Failed);
    assert!(h.llm.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_publish_as_ai_draft() {
    let store: Arc<dyn BlueprintStore> = Arc::new(LocalStore::in_memory());
    let h = harness(store, StubPlaces::new(false), eiffel_transcript());
    let video_id = seed_video(&h.store).await;
    let outcome = h.processor.process_video(&video_id).await.unwrap();

    let session = h
        .verifier
        .start_verification(VerificationSource::Blueprint(outcome.blueprint_id.clone()))
        .await;
    let session = h.verifier.finalize(session, false).await;
    assert_eq!(session.phase(), &SessionPhase::Published);

    let published = h.assembler.load(&outcome.blueprint_id).await.unwrap();
    assert_eq!(published.status, BlueprintStatus::Published);
    assert_eq!(published.creator_verified, Some(false));
    assert_eq!(published.points.len(), 1);

    // A second publish cannot flip the trust flag
    let again = h
        .verifier
        .start_verification(VerificationSource::Blueprint(outcome.blueprint_id.clone()))
        .await;
    assert!(matches!(again.phase(), SessionPhase::Failed { .. }));
    assert_eq!(
        h.assembler.load(&outcome.blueprint_id).await.unwrap().creator_verified,
        Some(false)
    );
}

#[tokio::test]
async fn test_rejecting_every_point_publishes_nothing() {
    let store: Arc<dyn BlueprintStore> = Arc::new(LocalStore::in_memory());
    let h = harness(store, StubPlaces::new(false), eiffel_transcript());
    let video_id = seed_video(&h.store).await;
    let outcome = h.processor.process_video(&video_id).await.unwrap();

    let session = h
        .verifier
        .start_verification(VerificationSource::Blueprint(outcome.blueprint_id.clone()))
        .await;
    let session = h.verifier.reject(session);
    assert_eq!(session.phase(), &SessionPhase::Complete);
    assert!(session.points_to_publish().is_empty());

    let session = h.verifier.finalize(session, true).await;
    assert!(matches!(
        session.phase(),
        SessionPhase::Failed { origin: FailureOrigin::Publishing, .. }
    ));

    let draft = h.assembler.load(&outcome.blueprint_id).await.unwrap();
    assert_eq!(draft.status, BlueprintStatus::Draft);
    assert_eq!(draft.points.len(), 1);
    assert_eq!(draft.creator_verified, None);
}

#[tokio::test]
async fn test_publish_failure_keeps_edits() {
    let flaky = Arc::new(FlakyStore {
        inner: LocalStore::in_memory(),
        fail_blueprint_writes: AtomicBool::new(false),
    });
    let store: Arc<dyn BlueprintStore> = flaky.clone();
    let h = harness(store, StubPlaces::new(false), eiffel_transcript());
    let video_id = seed_video(&h.store).await;
    let outcome = h.processor.process_video(&video_id).await.unwrap();

    let session = h
        .verifier
        .start_verification(VerificationSource::Blueprint(outcome.blueprint_id.clone()))
        .await;
    let session = h.verifier.edit(
        session,
        PointUpdate {
            name: Some("Tour Eiffel".into()),
            day: Some(2),
            ..PointUpdate::default()
        },
    );
    let session = h.verifier.save_edit(session);
    let session = h.verifier.approve(session).await;

    flaky.fail_blueprint_writes.store(true, Ordering::SeqCst);
    let session = h.verifier.finalize(session, true).await;
    assert!(matches!(session.phase(), SessionPhase::Failed { .. }));
    assert_eq!(session.verified()[0].name, "Tour Eiffel");
    assert_eq!(
        h.assembler.load(&outcome.blueprint_id).await.unwrap().status,
        BlueprintStatus::Draft
    );

    flaky.fail_blueprint_writes.store(false, Ordering::SeqCst);
    let session = session.apply(trip_blueprint::SessionAction::Retry);
    assert_eq!(session.phase(), &SessionPhase::Complete);
    let session = h.verifier.finalize(session, true).await;
    assert_eq!(session.phase(), &SessionPhase::Published);

    let published = h.assembler.load(&outcome.blueprint_id).await.unwrap();
    assert_eq!(published.points[0].name, "Tour Eiffel");
    assert_eq!(published.points[0].day, 2);
    assert_eq!(published.creator_verified, Some(true));
}

#[tokio::test]
async fn test_map_mode_add_place_and_publish() {
    let store: Arc<dyn BlueprintStore> = Arc::new(LocalStore::in_memory());
    let h = harness(store, StubPlaces::new(false), eiffel_transcript());
    let video_id = seed_video(&h.store).await;
    let outcome = h.processor.process_video(&video_id).await.unwrap();

    let session = h
        .verifier
        .start_verification(VerificationSource::Blueprint(outcome.blueprint_id.clone()))
        .await;
    let session = h.verifier.switch_to_map_mode(session);
    assert_eq!(session.mode(), ReviewMode::Map);

    let session = h.verifier.add_place(session, "Louvre").await;
    let added = session.working().last().unwrap().clone();
    assert_eq!(added.name, "Louvre");
    assert_eq!(added.description, "Newly added place.");
    assert_eq!(added.day, 1);
    assert!(added.verified);
    assert_eq!(added.place_id.as_deref(), Some("abc"));

    let first_id = session.working()[0].id.clone();
    let session = h.verifier.remove_point(session, &first_id);
    let session = h.verifier.finalize(session, true).await;
    assert_eq!(session.phase(), &SessionPhase::Published);

    let published = h.assembler.load(&outcome.blueprint_id).await.unwrap();
    let names: Vec<&str> = published.points.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Louvre"]);
}

#[tokio::test]
async fn test_free_text_review_creates_blueprint() {
    let store: Arc<dyn BlueprintStore> = Arc::new(LocalStore::in_memory());
    let h = harness(store, StubPlaces::new(false), eiffel_transcript());
    let creator_id = h.store.insert_creator(Creator::new("Wanderlust")).await.unwrap();

    let session = h
        .verifier
        .start_verification(VerificationSource::FreeText {
            creator_id: creator_id.clone(),
            title: "Paryż".into(),
            text: "Start at the Eiffel Tower.".into(),
        })
        .await;
    assert_eq!(session.candidates().len(), 1);
    assert!(!session.candidates()[0].is_enriched());

    let session = h.verifier.approve(session).await;
    assert_eq!(session.verified()[0].place_id.as_deref(), Some("abc"));

    let session = h.verifier.finalize(session, true).await;
    assert_eq!(session.phase(), &SessionPhase::Published);

    let blueprints = h.store.list_blueprints(&creator_id).await.unwrap();
    assert_eq!(blueprints.len(), 1);
    assert_eq!(blueprints[0].video_id, None);
    assert_eq!(blueprints[0].creator_verified, Some(true));
}

#[tokio::test]
async fn test_channel_ingest_filters_shorts_and_is_idempotent() {
    let store: Arc<dyn BlueprintStore> = Arc::new(LocalStore::in_memory());
    let creator_id = store.insert_creator(Creator::new("Wanderlust")).await.unwrap();
    let platform = Arc::new(StubPlatform {
        items: vec![("long1", "PT12M4S"), ("short", "PT45S"), ("edge", "PT1M"), ("long2", "PT1H2M3S")],
    });
    let ingestor = ChannelIngestor::new(platform, store.clone());

    let outcome = ingestor.connect_channel(&creator_id, "@wanderlust", false).await.unwrap();
    assert_eq!(outcome.count, 2);
    assert!(!outcome.has_more);

    let videos = store.list_videos(&creator_id).await.unwrap();
    let ids: Vec<&str> = videos.iter().map(|v| v.platform_video_id.as_str()).collect();
    assert_eq!(ids, vec!["long1", "long2"]);
    assert_eq!(videos[1].duration, "1:02:03");

    // Same page again leaves one record per platform id
    ingestor.connect_channel(&creator_id, "wanderlust", false).await.unwrap();
    assert_eq!(store.list_videos(&creator_id).await.unwrap().len(), 2);

    let creator = store.get_creator(&creator_id).await.unwrap().unwrap();
    assert_eq!(creator.channel_handle.as_deref(), Some("wanderlust"));
    assert!(!creator.has_more_videos());
}

#[tokio::test]
async fn test_delete_makes_video_reprocessable() {
    let temp_dir = TempDir::new().unwrap();
    let store: Arc<dyn BlueprintStore> = Arc::new(LocalStore::open(temp_dir.path()).await.unwrap());
    let h = harness(store, StubPlaces::new(false), eiffel_transcript());
    let video_id = seed_video(&h.store).await;
    let outcome = h.processor.process_video(&video_id).await.unwrap();

    assert_ok!(h.assembler.delete(&outcome.blueprint_id).await);

    let reopened = LocalStore::open(temp_dir.path()).await.unwrap();
    assert!(reopened.get_blueprint(&outcome.blueprint_id).await.unwrap().is_none());
    let video = reopened.get_video(&video_id).await.unwrap().unwrap();
    assert_eq!(video.status, VideoStatus::Pending);
}

#[test]
fn test_config_builder_feeds_assembler() {
    let config = ConfigBuilder::new().with_price(79.0).with_max_concurrent_lookups(2).build();
    assert_eq!(config.blueprint.price, 79.0);
    assert_eq!(config.places.max_concurrent_lookups, 2);
    assert!(config.validate().is_ok());
}
