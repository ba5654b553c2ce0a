//! Creator review of extracted points.
//!
//! [`VerificationSession`] is a pure state machine. [`Verifier`] runs the
//! side effects around it (extraction, place lookups, persistence) and feeds
//! their results back in as actions.

pub mod session;

pub use session::{
    EditDraft, FailureOrigin, PointUpdate, PublishTarget, ReviewMode, SessionAction, SessionPhase,
    VerificationSession,
};

use crate::blueprint::BlueprintAssembler;
use crate::error::{PipelineError, Result};
use crate::llm::PoiExtractor;
use crate::models::{PointCategory, TripPoint};
use crate::places::PlaceEnricher;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Description given to points added by hand in map mode
pub const ADDED_POINT_DESCRIPTION: &str = "Newly added place.";

/// What a review starts from
#[derive(Debug, Clone)]
pub enum VerificationSource {
    /// Candidates of a stored draft blueprint
    Blueprint(String),
    /// A description or caption run through free-text extraction
    FreeText {
        creator_id: String,
        title: String,
        text: String,
    },
}

pub struct Verifier {
    /// Needed only for free-text sources
    extractor: Option<Arc<PoiExtractor>>,
    /// Backend used to enrich a candidate on approve
    approval: PlaceEnricher,
    /// Backend used by map-mode place search
    search: PlaceEnricher,
    assembler: Arc<BlueprintAssembler>,
}

impl Verifier {
    pub fn new(approval: PlaceEnricher, search: PlaceEnricher, assembler: Arc<BlueprintAssembler>) -> Self {
        Self {
            extractor: None,
            approval,
            search,
            assembler,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<PoiExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Load candidates into a fresh session. Failures end in
    /// `Failed { origin: Loading }` rather than an error.
    pub async fn start_verification(&self, source: VerificationSource) -> VerificationSession {
        let session = VerificationSession::new().apply(SessionAction::BeginLoading);
        let generation = session.generation();

        match self.load_candidates(source).await {
            Ok((target, points)) => {
                info!("🔎 Review started with {} candidates", points.len());
                session.apply(SessionAction::CandidatesLoaded {
                    generation,
                    target,
                    points,
                })
            }
            Err(e) => {
                warn!("Could not load review candidates: {}", e);
                session.apply(SessionAction::LoadFailed {
                    generation,
                    message: e.to_string(),
                })
            }
        }
    }

    async fn load_candidates(&self, source: VerificationSource) -> Result<(PublishTarget, Vec<TripPoint>)> {
        match source {
            VerificationSource::Blueprint(blueprint_id) => {
                let blueprint = self.assembler.load(&blueprint_id).await?;
                if blueprint.is_published() {
                    return Err(PipelineError::AlreadyPublished(blueprint_id));
                }
                Ok((PublishTarget::Existing { blueprint_id }, blueprint.points))
            }
            VerificationSource::FreeText {
                creator_id,
                title,
                text,
            } => {
                let extractor = self
                    .extractor
                    .as_ref()
                    .ok_or(PipelineError::MissingCredential("GEMINI_API_KEY"))?;
                let pois = extractor.extract_from_description(&text).await?;
                let points = pois.into_iter().map(|poi| poi.into_point()).collect();
                Ok((PublishTarget::New { creator_id, title }, points))
            }
        }
    }

    /// Approve the current card, enriching it first when it has no place match.
    pub async fn approve(&self, session: VerificationSession) -> VerificationSession {
        if !session.can_decide() {
            return session;
        }

        let index = session.current_index();
        let query = session
            .current_candidate()
            .filter(|candidate| !candidate.is_enriched())
            .map(|candidate| candidate.name.clone());
        let enrichment = match query {
            Some(query) => Some(self.approval.search_place(&query).await).filter(|info| !info.is_empty()),
            None => None,
        };

        session.apply(SessionAction::Approve { index, enrichment })
    }

    pub fn reject(&self, session: VerificationSession) -> VerificationSession {
        session.apply(SessionAction::Reject)
    }

    /// Open the editor on the current card and stage the given field changes.
    pub fn edit(&self, session: VerificationSession, fields: PointUpdate) -> VerificationSession {
        let mut session = session.apply(SessionAction::StartEdit);
        if let Some(name) = fields.name {
            session = session.apply(SessionAction::EditName(name));
        }
        if let Some(description) = fields.description {
            session = session.apply(SessionAction::EditDescription(description));
        }
        if let Some(day) = fields.day {
            session = session.apply(SessionAction::EditDay(day));
        }
        if let Some(timestamp) = fields.timestamp {
            session = session.apply(SessionAction::EditTimestamp(timestamp));
        }
        if let Some(category) = fields.category {
            session = session.apply(SessionAction::EditCategory(category));
        }
        session
    }

    pub fn save_edit(&self, session: VerificationSession) -> VerificationSession {
        session.apply(SessionAction::SaveEdit)
    }

    pub fn cancel_edit(&self, session: VerificationSession) -> VerificationSession {
        session.apply(SessionAction::CancelEdit)
    }

    pub fn switch_to_map_mode(&self, session: VerificationSession) -> VerificationSession {
        session.apply(SessionAction::SwitchToMapMode)
    }

    pub fn switch_to_sequential_mode(&self, session: VerificationSession) -> VerificationSession {
        session.apply(SessionAction::SwitchToSequentialMode)
    }

    /// Search for a place and add it to the map collection as a verified point.
    pub async fn add_place(&self, session: VerificationSession, query: &str) -> VerificationSession {
        if session.mode() != ReviewMode::Map || query.trim().is_empty() {
            return session;
        }

        let info = self.search.search_place(query).await;
        let name = info
            .name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| query.trim().to_string());

        let mut point = TripPoint::new(name, PointCategory::Activity);
        point.description = ADDED_POINT_DESCRIPTION.to_string();
        point.verified = true;
        info.apply_to(&mut point);

        session.apply(SessionAction::AddPoint(point))
    }

    pub fn remove_point(&self, session: VerificationSession, id: &str) -> VerificationSession {
        session.apply(SessionAction::RemovePoint { id: id.to_string() })
    }

    pub fn update_point(&self, session: VerificationSession, id: &str, update: PointUpdate) -> VerificationSession {
        session.apply(SessionAction::UpdatePoint {
            id: id.to_string(),
            update,
        })
    }

    /// Move a map point by re-searching its place. A lookup with no match
    /// leaves the point where it was.
    pub async fn relocate_point(&self, session: VerificationSession, id: &str, query: &str) -> VerificationSession {
        let place = self.search.search_place(query).await;
        if place.is_empty() {
            return session;
        }
        session.apply(SessionAction::RelocatePoint {
            id: id.to_string(),
            place,
        })
    }

    /// Write the authoritative point list and publish with the given trust
    /// flag. On failure the session keeps every collected point and can be
    /// retried.
    pub async fn finalize(&self, session: VerificationSession, verified: bool) -> VerificationSession {
        let mut session = session.apply(SessionAction::BeginPublish { verified });
        if session.phase() != &SessionPhase::Publishing {
            return session;
        }
        let generation = session.generation();
        let points = session.points_to_publish();

        let result = match session.target().cloned() {
            _ if points.is_empty() => Err(PipelineError::NothingToPublish),
            Some(PublishTarget::Existing { blueprint_id }) => self.write_and_publish(&blueprint_id, &points, verified).await,
            Some(PublishTarget::New { creator_id, title }) => {
                match self.assembler.insert_unsourced(&creator_id, &title, points).await {
                    Ok(blueprint) => {
                        session = session.apply(SessionAction::DraftCreated {
                            generation,
                            blueprint_id: blueprint.id.clone(),
                        });
                        self.assembler.publish(&blueprint.id, verified).await.map(|_| ())
                    }
                    Err(e) => Err(e),
                }
            }
            None => Err(PipelineError::NothingToPublish),
        };

        match result {
            Ok(()) => session.apply(SessionAction::PublishSucceeded { generation }),
            Err(e) => {
                error!("❌ Publish failed: {}", e);
                session.apply(SessionAction::PublishFailed {
                    generation,
                    message: e.to_string(),
                })
            }
        }
    }

    async fn write_and_publish(&self, blueprint_id: &str, points: &[TripPoint], verified: bool) -> Result<()> {
        self.assembler.replace_points(blueprint_id, points).await?;
        self.assembler.publish(blueprint_id, verified).await?;
        Ok(())
    }
}
