//! Review session state machine.
//!
//! Every transition is `apply(session, action) -> session`. Actions that do
//! not fit the current phase or mode leave the session unchanged. Results of
//! async work carry the generation they were started under and are dropped
//! when the session has moved on.

use crate::models::{PointCategory, TripPoint};
use crate::places::PlaceInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOrigin {
    Loading,
    Publishing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionPhase {
    /// No candidates yet
    Empty,
    /// Extraction or blueprint load in flight
    Loading,
    Reviewing,
    /// Every sequential candidate has been approved or rejected
    Complete,
    Publishing,
    Published,
    Failed { origin: FailureOrigin, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewMode {
    /// One card at a time, approve or reject
    #[default]
    Sequential,
    /// The whole collection is edited at once
    Map,
}

/// Where a finalized point list is written
#[derive(Debug, Clone, PartialEq)]
pub enum PublishTarget {
    Existing { blueprint_id: String },
    /// Free-text sessions create their blueprint on finalize
    New { creator_id: String, title: String },
}

/// Scratch copy of the fields editable on a card
#[derive(Debug, Clone, PartialEq)]
pub struct EditDraft {
    pub name: String,
    pub description: String,
    pub day: u32,
    pub timestamp: Option<u64>,
    pub category: PointCategory,
}

impl EditDraft {
    fn from_point(point: &TripPoint) -> Self {
        Self {
            name: point.name.clone(),
            description: point.description.clone(),
            day: point.day,
            timestamp: point.timestamp,
            category: point.category,
        }
    }

    fn commit(self, point: &mut TripPoint) {
        point.name = self.name;
        point.description = self.description;
        point.day = self.day.max(1);
        point.timestamp = self.timestamp;
        point.category = self.category;
    }
}

/// Per-point field changes in map mode. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub day: Option<u32>,
    pub timestamp: Option<Option<u64>>,
    pub category: Option<PointCategory>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    BeginLoading,
    CandidatesLoaded {
        generation: u64,
        target: PublishTarget,
        points: Vec<TripPoint>,
    },
    LoadFailed {
        generation: u64,
        message: String,
    },

    StartEdit,
    EditName(String),
    EditDescription(String),
    EditDay(u32),
    EditTimestamp(Option<u64>),
    EditCategory(PointCategory),
    SaveEdit,
    CancelEdit,

    /// Approve the card at `index` with an optional lookup result
    Approve {
        index: usize,
        enrichment: Option<PlaceInfo>,
    },
    Reject,

    SwitchToMapMode,
    SwitchToSequentialMode,
    AddPoint(TripPoint),
    RemovePoint { id: String },
    UpdatePoint { id: String, update: PointUpdate },
    RelocatePoint { id: String, place: PlaceInfo },

    BeginPublish { verified: bool },
    /// A free-text draft was stored and now has an id
    DraftCreated { generation: u64, blueprint_id: String },
    PublishSucceeded { generation: u64 },
    PublishFailed { generation: u64, message: String },

    Retry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationSession {
    phase: SessionPhase,
    mode: ReviewMode,
    generation: u64,
    target: Option<PublishTarget>,
    candidates: Vec<TripPoint>,
    current_index: usize,
    verified: Vec<TripPoint>,
    working: Vec<TripPoint>,
    draft: Option<EditDraft>,
    map_edited: bool,
    publish_verified: Option<bool>,
}

impl Default for VerificationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationSession {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Empty,
            mode: ReviewMode::Sequential,
            generation: 0,
            target: None,
            candidates: Vec::new(),
            current_index: 0,
            verified: Vec::new(),
            working: Vec::new(),
            draft: None,
            map_edited: false,
            publish_verified: None,
        }
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn mode(&self) -> ReviewMode {
        self.mode
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn target(&self) -> Option<&PublishTarget> {
        self.target.as_ref()
    }

    pub fn candidates(&self) -> &[TripPoint] {
        &self.candidates
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// The card under the cursor while reviewing sequentially
    pub fn current_candidate(&self) -> Option<&TripPoint> {
        if self.phase != SessionPhase::Reviewing || self.mode != ReviewMode::Sequential {
            return None;
        }
        self.candidates.get(self.current_index)
    }

    pub fn verified(&self) -> &[TripPoint] {
        &self.verified
    }

    /// Map-mode collection
    pub fn working(&self) -> &[TripPoint] {
        &self.working
    }

    pub fn draft(&self) -> Option<&EditDraft> {
        self.draft.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        self.draft.is_some()
    }

    pub fn map_edited(&self) -> bool {
        self.map_edited
    }

    /// Flag requested by the publish in flight
    pub fn publish_verified(&self) -> Option<bool> {
        self.publish_verified
    }

    pub fn is_complete(&self) -> bool {
        !self.candidates.is_empty() && self.current_index >= self.candidates.len()
    }

    pub fn last_error(&self) -> Option<&str> {
        match &self.phase {
            SessionPhase::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Whether approve/reject would currently do anything
    pub fn can_decide(&self) -> bool {
        self.draft.is_none() && self.current_candidate().is_some()
    }

    /// Points a finalize would write. In map mode the working collection is
    /// authoritative, falling back to the verified list when emptied. In
    /// sequential mode the verified list is, even when every card was
    /// rejected. The working collection stands in only when no card has been
    /// decided yet (publish as draft) or the map editor changed it.
    pub fn points_to_publish(&self) -> Vec<TripPoint> {
        match self.mode {
            ReviewMode::Map if self.working.is_empty() => self.verified.clone(),
            ReviewMode::Map => self.working.clone(),
            ReviewMode::Sequential if !self.verified.is_empty() => self.verified.clone(),
            ReviewMode::Sequential if self.current_index == 0 || self.map_edited => self.working.clone(),
            ReviewMode::Sequential => Vec::new(),
        }
    }

    fn review_phase(&self) -> SessionPhase {
        if self.mode == ReviewMode::Sequential && self.is_complete() {
            SessionPhase::Complete
        } else {
            SessionPhase::Reviewing
        }
    }

    fn in_review(&self) -> bool {
        matches!(self.phase, SessionPhase::Reviewing | SessionPhase::Complete)
    }

    fn editing_map(&self) -> bool {
        self.mode == ReviewMode::Map && self.phase == SessionPhase::Reviewing
    }

    fn advance(&mut self) {
        self.current_index += 1;
        self.phase = self.review_phase();
    }

    /// Apply one action and return the next session.
    pub fn apply(mut self, action: SessionAction) -> Self {
        match action {
            SessionAction::BeginLoading => {
                if matches!(self.phase, SessionPhase::Loading | SessionPhase::Publishing) {
                    return self;
                }
                let generation = self.generation + 1;
                self = Self::new();
                self.generation = generation;
                self.phase = SessionPhase::Loading;
            }

            SessionAction::CandidatesLoaded { generation, target, points } => {
                if self.phase != SessionPhase::Loading || generation != self.generation {
                    return self;
                }
                let candidates: Vec<TripPoint> = points.into_iter().filter(|p| !p.verified).collect();
                self.working = candidates.clone();
                self.candidates = candidates;
                self.target = Some(target);
                self.phase = SessionPhase::Reviewing;
            }

            SessionAction::LoadFailed { generation, message } => {
                if self.phase == SessionPhase::Loading && generation == self.generation {
                    self.phase = SessionPhase::Failed { origin: FailureOrigin::Loading, message };
                }
            }

            SessionAction::StartEdit => {
                if self.draft.is_none() {
                    if let Some(point) = self.current_candidate() {
                        self.draft = Some(EditDraft::from_point(point));
                    }
                }
            }

            SessionAction::EditName(name) => {
                if let Some(draft) = self.draft.as_mut() {
                    draft.name = name;
                }
            }

            SessionAction::EditDescription(description) => {
                if let Some(draft) = self.draft.as_mut() {
                    draft.description = description;
                }
            }

            SessionAction::EditDay(day) => {
                if let Some(draft) = self.draft.as_mut() {
                    draft.day = day.max(1);
                }
            }

            SessionAction::EditTimestamp(timestamp) => {
                if let Some(draft) = self.draft.as_mut() {
                    draft.timestamp = timestamp;
                }
            }

            SessionAction::EditCategory(category) => {
                if let Some(draft) = self.draft.as_mut() {
                    draft.category = category;
                }
            }

            SessionAction::SaveEdit => {
                if let Some(draft) = self.draft.take() {
                    if let Some(point) = self.candidates.get_mut(self.current_index) {
                        draft.commit(point);
                    }
                }
            }

            SessionAction::CancelEdit => {
                self.draft = None;
            }

            SessionAction::Approve { index, enrichment } => {
                if !self.can_decide() || index != self.current_index {
                    return self;
                }
                let mut point = self.candidates[index].clone();
                if !point.is_enriched() {
                    if let Some(info) = enrichment {
                        info.apply_to(&mut point);
                    }
                }
                point.verified = true;
                self.verified.push(point);
                self.advance();
            }

            SessionAction::Reject => {
                if self.can_decide() {
                    self.advance();
                }
            }

            SessionAction::SwitchToMapMode => {
                if self.in_review() && self.mode != ReviewMode::Map {
                    self.draft = None;
                    if !self.map_edited {
                        self.working = self.candidates.clone();
                    }
                    self.mode = ReviewMode::Map;
                    self.phase = SessionPhase::Reviewing;
                }
            }

            SessionAction::SwitchToSequentialMode => {
                if self.in_review() && self.mode != ReviewMode::Sequential {
                    self.mode = ReviewMode::Sequential;
                    self.phase = self.review_phase();
                }
            }

            SessionAction::AddPoint(mut point) => {
                if self.editing_map() {
                    point.verified = true;
                    self.working.push(point);
                    self.map_edited = true;
                }
            }

            SessionAction::RemovePoint { id } => {
                if self.editing_map() {
                    let before = self.working.len();
                    self.working.retain(|p| p.id != id);
                    self.map_edited |= self.working.len() != before;
                }
            }

            SessionAction::UpdatePoint { id, update } => {
                if self.editing_map() {
                    if let Some(point) = self.working.iter_mut().find(|p| p.id == id) {
                        if let Some(name) = update.name {
                            point.name = name;
                        }
                        if let Some(description) = update.description {
                            point.description = description;
                        }
                        if let Some(day) = update.day {
                            point.day = day.max(1);
                        }
                        if let Some(timestamp) = update.timestamp {
                            point.timestamp = timestamp;
                        }
                        if let Some(category) = update.category {
                            point.category = category;
                        }
                        self.map_edited = true;
                    }
                }
            }

            SessionAction::RelocatePoint { id, place } => {
                if self.editing_map() {
                    if let Some(point) = self.working.iter_mut().find(|p| p.id == id) {
                        place.replace_on(point);
                        self.map_edited = true;
                    }
                }
            }

            SessionAction::BeginPublish { verified } => {
                if self.in_review() && self.draft.is_none() {
                    self.generation += 1;
                    self.publish_verified = Some(verified);
                    self.phase = SessionPhase::Publishing;
                }
            }

            SessionAction::DraftCreated { generation, blueprint_id } => {
                if self.phase == SessionPhase::Publishing && generation == self.generation {
                    self.target = Some(PublishTarget::Existing { blueprint_id });
                }
            }

            SessionAction::PublishSucceeded { generation } => {
                if self.phase == SessionPhase::Publishing && generation == self.generation {
                    self.phase = SessionPhase::Published;
                }
            }

            SessionAction::PublishFailed { generation, message } => {
                if self.phase == SessionPhase::Publishing && generation == self.generation {
                    self.phase = SessionPhase::Failed { origin: FailureOrigin::Publishing, message };
                }
            }

            SessionAction::Retry => {
                if let SessionPhase::Failed { origin, .. } = &self.phase {
                    self.phase = match origin {
                        FailureOrigin::Loading => SessionPhase::Empty,
                        FailureOrigin::Publishing => self.review_phase(),
                    };
                    self.publish_verified = None;
                }
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(name: &str) -> TripPoint {
        TripPoint::new(name, PointCategory::Activity)
    }

    fn loaded(names: &[&str]) -> VerificationSession {
        let session = VerificationSession::new().apply(SessionAction::BeginLoading);
        let generation = session.generation();
        session.apply(SessionAction::CandidatesLoaded {
            generation,
            target: PublishTarget::Existing { blueprint_id: "bp".into() },
            points: names.iter().map(|n| point(n)).collect(),
        })
    }

    fn approve(session: VerificationSession) -> VerificationSession {
        let index = session.current_index();
        session.apply(SessionAction::Approve { index, enrichment: None })
    }

    #[test]
    fn test_loading_to_reviewing() {
        let session = VerificationSession::new();
        assert_eq!(session.phase(), &SessionPhase::Empty);
        let session = loaded(&["A", "B"]);
        assert_eq!(session.phase(), &SessionPhase::Reviewing);
        assert_eq!(session.current_candidate().map(|p| p.name.as_str()), Some("A"));
        assert_eq!(session.working().len(), 2);
    }

    #[test]
    fn test_stale_results_are_ignored() {
        let session = VerificationSession::new().apply(SessionAction::BeginLoading);
        let stale = session.generation();
        let session = session
            .apply(SessionAction::LoadFailed { generation: stale, message: "boom".into() })
            .apply(SessionAction::Retry)
            .apply(SessionAction::BeginLoading);
        let session = session.apply(SessionAction::CandidatesLoaded {
            generation: stale,
            target: PublishTarget::Existing { blueprint_id: "old".into() },
            points: vec![point("late")],
        });
        assert_eq!(session.phase(), &SessionPhase::Loading);
        assert!(session.candidates().is_empty());
    }

    #[test]
    fn test_approve_reject_completes() {
        let mut session = loaded(&["A", "B", "C"]);
        session = approve(session);
        session = session.apply(SessionAction::Reject);
        assert_eq!(session.phase(), &SessionPhase::Reviewing);
        session = approve(session);

        assert_eq!(session.phase(), &SessionPhase::Complete);
        assert!(session.is_complete());
        let names: Vec<&str> = session.verified().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
        assert!(session.verified().iter().all(|p| p.verified));
    }

    #[test]
    fn test_decisions_after_complete_are_noops() {
        let session = approve(loaded(&["A"]));
        let after = session.clone().apply(SessionAction::Reject);
        assert_eq!(after, session);
        let after = approve(session.clone());
        assert_eq!(after.verified().len(), 1);
    }

    #[test]
    fn test_edit_guards_decisions() {
        let session = loaded(&["A", "B"])
            .apply(SessionAction::StartEdit)
            .apply(SessionAction::EditName("A+".into()));
        assert!(session.is_editing());

        let blocked = approve(session.clone()).apply(SessionAction::Reject);
        assert_eq!(blocked.current_index(), 0);
        assert!(blocked.verified().is_empty());

        let saved = session
            .apply(SessionAction::EditDay(0))
            .apply(SessionAction::EditTimestamp(Some(42)))
            .apply(SessionAction::SaveEdit);
        let saved = approve(saved);
        assert_eq!(saved.verified()[0].name, "A+");
        assert_eq!(saved.verified()[0].day, 1);
        assert_eq!(saved.verified()[0].timestamp, Some(42));
    }

    #[test]
    fn test_cancel_discards_scratch() {
        let session = loaded(&["A"])
            .apply(SessionAction::StartEdit)
            .apply(SessionAction::EditDescription("changed".into()))
            .apply(SessionAction::CancelEdit);
        assert!(!session.is_editing());
        assert_eq!(session.candidates()[0].description, "");
    }

    #[test]
    fn test_enrichment_applied_only_when_missing() {
        let place = PlaceInfo {
            lat: Some(1.0),
            lng: Some(2.0),
            place_id: Some("new".into()),
            ..PlaceInfo::default()
        };
        let session = loaded(&["A"]).apply(SessionAction::Approve { index: 0, enrichment: Some(place.clone()) });
        assert_eq!(session.verified()[0].place_id.as_deref(), Some("new"));

        let mut enriched = point("B");
        enriched.place_id = Some("kept".into());
        let session = VerificationSession::new().apply(SessionAction::BeginLoading);
        let generation = session.generation();
        let session = session
            .apply(SessionAction::CandidatesLoaded {
                generation,
                target: PublishTarget::Existing { blueprint_id: "bp".into() },
                points: vec![enriched],
            })
            .apply(SessionAction::Approve { index: 0, enrichment: Some(place) });
        assert_eq!(session.verified()[0].place_id.as_deref(), Some("kept"));
    }

    #[test]
    fn test_stale_approve_index() {
        let session = loaded(&["A", "B"]).apply(SessionAction::Approve { index: 1, enrichment: None });
        assert!(session.verified().is_empty());
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn test_map_mode_operations() {
        let session = loaded(&["A", "B"]).apply(SessionAction::SwitchToMapMode);
        assert_eq!(session.mode(), ReviewMode::Map);
        assert!(session.current_candidate().is_none());

        let target_id = session.working()[0].id.clone();
        let removed_id = session.working()[1].id.clone();
        let session = session
            .apply(SessionAction::AddPoint(point("C")))
            .apply(SessionAction::RemovePoint { id: removed_id })
            .apply(SessionAction::UpdatePoint {
                id: target_id.clone(),
                update: PointUpdate { name: Some("A2".into()), ..PointUpdate::default() },
            })
            .apply(SessionAction::RelocatePoint {
                id: target_id,
                place: PlaceInfo { lat: Some(5.0), lng: Some(6.0), ..PlaceInfo::default() },
            });

        let names: Vec<&str> = session.working().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A2", "C"]);
        assert!(session.map_edited());
        assert!(session.working()[1].verified);
        assert_eq!(session.working()[0].coordinates(), Some((5.0, 6.0)));
    }

    #[test]
    fn test_relocate_replaces_previous_place() {
        let mut stale = point("Cafe");
        stale.lat = Some(1.0);
        stale.lng = Some(2.0);
        stale.address = Some("Old street 1".into());
        stale.photo_reference = Some("old-photo".into());
        stale.place_id = Some("old-place".into());
        stale.website = Some("https://old.example".into());

        let session = VerificationSession::new().apply(SessionAction::BeginLoading);
        let generation = session.generation();
        let session = session
            .apply(SessionAction::CandidatesLoaded {
                generation,
                target: PublishTarget::Existing { blueprint_id: "bp".into() },
                points: vec![stale],
            })
            .apply(SessionAction::SwitchToMapMode);
        let id = session.working()[0].id.clone();

        let session = session.apply(SessionAction::RelocatePoint {
            id,
            place: PlaceInfo {
                lat: Some(35.0),
                lng: Some(135.7),
                address: Some("New street 9".into()),
                ..PlaceInfo::default()
            },
        });

        let moved = &session.working()[0];
        assert_eq!(moved.coordinates(), Some((35.0, 135.7)));
        assert_eq!(moved.address.as_deref(), Some("New street 9"));
        assert_eq!(moved.photo_reference, None);
        assert_eq!(moved.place_id, None);
        assert_eq!(moved.website, None);
        assert_eq!(moved.name, "Cafe");
    }

    #[test]
    fn test_map_operations_ignored_in_sequential_mode() {
        let session = loaded(&["A"]);
        let after = session.clone().apply(SessionAction::AddPoint(point("X")));
        assert_eq!(after, session);
    }

    #[test]
    fn test_finalize_tie_break() {
        // Sequential with approvals: the verified list wins
        let session = approve(loaded(&["A", "B"])).apply(SessionAction::Reject);
        let names: Vec<String> = session.points_to_publish().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["A"]);

        // Map mode: the working collection wins even with approvals
        let session = approve(loaded(&["A", "B"]))
            .apply(SessionAction::SwitchToMapMode)
            .apply(SessionAction::AddPoint(point("C")));
        let names: Vec<String> = session.points_to_publish().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["A", "B", "C"]);

        // Map mode with everything removed falls back to the verified list
        let mut session = approve(loaded(&["A", "B"])).apply(SessionAction::SwitchToMapMode);
        let ids: Vec<String> = session.working().iter().map(|p| p.id.clone()).collect();
        for id in ids {
            session = session.apply(SessionAction::RemovePoint { id });
        }
        let names: Vec<String> = session.points_to_publish().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["A"]);

        // No review at all: the untouched candidates are published as a draft
        let session = loaded(&["A", "B"]);
        assert_eq!(session.points_to_publish().len(), 2);

        // Every card rejected: nothing is published
        let session = loaded(&["A", "B"]).apply(SessionAction::Reject).apply(SessionAction::Reject);
        assert_eq!(session.phase(), &SessionPhase::Complete);
        assert!(session.points_to_publish().is_empty());

        // Map edits survive a return to sequential mode with no approvals
        let session = loaded(&["A"])
            .apply(SessionAction::Reject)
            .apply(SessionAction::SwitchToMapMode)
            .apply(SessionAction::AddPoint(point("D")))
            .apply(SessionAction::SwitchToSequentialMode);
        let names: Vec<String> = session.points_to_publish().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["A", "D"]);
    }

    #[test]
    fn test_publish_failure_keeps_data_and_retries() {
        let session = approve(loaded(&["A"])).apply(SessionAction::BeginPublish { verified: true });
        assert_eq!(session.phase(), &SessionPhase::Publishing);
        assert_eq!(session.publish_verified(), Some(true));

        let generation = session.generation();
        let failed = session.apply(SessionAction::PublishFailed { generation, message: "disk full".into() });
        assert_eq!(failed.last_error(), Some("disk full"));
        assert_eq!(failed.verified().len(), 1);

        let retried = failed.apply(SessionAction::Retry);
        assert_eq!(retried.phase(), &SessionPhase::Complete);
        assert_eq!(retried.verified().len(), 1);

        let retried = retried.apply(SessionAction::BeginPublish { verified: true });
        let generation = retried.generation();
        let done = retried.apply(SessionAction::PublishSucceeded { generation });
        assert_eq!(done.phase(), &SessionPhase::Published);
    }

    #[test]
    fn test_load_failure_retry_returns_to_empty() {
        let session = VerificationSession::new().apply(SessionAction::BeginLoading);
        let generation = session.generation();
        let session = session
            .apply(SessionAction::LoadFailed { generation, message: "no transcript".into() })
            .apply(SessionAction::Retry);
        assert_eq!(session.phase(), &SessionPhase::Empty);
    }

    #[test]
    fn test_cannot_publish_while_editing() {
        let session = loaded(&["A"])
            .apply(SessionAction::StartEdit)
            .apply(SessionAction::BeginPublish { verified: true });
        assert_eq!(session.phase(), &SessionPhase::Reviewing);
    }
}
