//! Core records shared by the pipeline: trip points, blueprints, ingested
//! videos and the creator record that carries the channel cursor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of point categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PointCategory {
    Food,
    Stay,
    #[default]
    Activity,
    Insta,
    Tip,
}

impl PointCategory {
    pub const ALL: [PointCategory; 5] = [
        PointCategory::Food,
        PointCategory::Stay,
        PointCategory::Activity,
        PointCategory::Insta,
        PointCategory::Tip,
    ];

    /// Coerce an open category string (as returned by the model) into the
    /// closed set. Anything unrecognized becomes `Activity`.
    pub fn coerce(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "food" => PointCategory::Food,
            "stay" => PointCategory::Stay,
            "activity" => PointCategory::Activity,
            "insta" => PointCategory::Insta,
            "tip" => PointCategory::Tip,
            _ => PointCategory::Activity,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PointCategory::Food => "food",
            PointCategory::Stay => "stay",
            PointCategory::Activity => "activity",
            PointCategory::Insta => "insta",
            PointCategory::Tip => "tip",
        }
    }
}

impl fmt::Display for PointCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a grounding citation came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceKind {
    Maps,
    Search,
    Web,
}

/// Citation backing an enriched fact
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
    pub kind: SourceKind,
}

/// A single point of interest, either an unreviewed candidate or a verified point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripPoint {
    /// Unique within the owning blueprint
    pub id: String,
    pub name: String,
    pub category: PointCategory,
    /// Creator-voice tip shown to travellers
    pub description: String,
    /// Trip day, always >= 1
    pub day: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// External map navigation link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maps_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Opaque photo reference. Never a resolved URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    /// Offset into the source video, whole seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub is_generic: bool,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grounding_sources: Vec<GroundingSource>,
}

impl TripPoint {
    /// A bare point with a fresh identifier and nothing resolved yet.
    pub fn new(name: impl Into<String>, category: PointCategory) -> Self {
        Self {
            id: new_point_id(),
            name: name.into(),
            category,
            description: String::new(),
            day: 1,
            lat: None,
            lng: None,
            address: None,
            maps_url: None,
            website: None,
            photo_reference: None,
            place_id: None,
            timestamp: None,
            is_generic: false,
            verified: false,
            grounding_sources: Vec::new(),
        }
    }

    /// True once a place lookup has resolved an identity or coordinates.
    pub fn is_enriched(&self) -> bool {
        self.place_id.is_some() || (self.lat.is_some() && self.lng.is_some())
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lng)
    }

    /// Shape stored on a blueprint: session-only flags dropped, day clamped.
    pub fn to_persisted(&self) -> TripPoint {
        let mut point = self.clone();
        point.verified = false;
        point.day = point.day.max(1);
        point
    }
}

pub fn new_point_id() -> String {
    format!("point_{}", uuid::Uuid::new_v4().simple())
}

pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlueprintStatus {
    #[default]
    Draft,
    PendingReview,
    Published,
}

impl BlueprintStatus {
    /// Status changes only move forward towards `Published`.
    pub fn can_transition_to(&self, next: BlueprintStatus) -> bool {
        matches!(
            (self, next),
            (BlueprintStatus::Draft, BlueprintStatus::PendingReview)
                | (BlueprintStatus::Draft, BlueprintStatus::Published)
                | (BlueprintStatus::PendingReview, BlueprintStatus::Published)
        )
    }
}

/// A named, priced, ordered collection of trip points.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Blueprint {
    pub id: String,
    pub creator_id: String,
    /// Store id of the source video record
    #[serde(default)]
    pub video_id: Option<String>,
    /// Platform id of the source video
    #[serde(default)]
    pub platform_video_id: Option<String>,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub region: String,
    pub tags: Vec<String>,
    pub price: f64,
    pub currency: String,
    pub rating: f64,
    pub review_count: u32,
    /// Order drives timeline day grouping
    pub points: Vec<TripPoint>,
    pub status: BlueprintStatus,
    /// Some(true) once a human reviewed it, Some(false) for a published AI draft
    #[serde(default)]
    pub creator_verified: Option<bool>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl Blueprint {
    pub fn is_published(&self) -> bool {
        self.status == BlueprintStatus::Published
    }

    /// Group points by day, keeping each day's points in blueprint order.
    pub fn points_by_day(&self) -> Vec<(u32, Vec<&TripPoint>)> {
        let mut days: Vec<(u32, Vec<&TripPoint>)> = Vec::new();
        for point in &self.points {
            match days.iter_mut().find(|(day, _)| *day == point.day) {
                Some((_, points)) => points.push(point),
                None => days.push((point.day, vec![point])),
            }
        }
        days.sort_by_key(|(day, _)| *day);
        days
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

/// An ingested long-form video belonging to a creator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripVideo {
    pub id: String,
    pub creator_id: String,
    pub platform_video_id: String,
    pub title: String,
    pub thumbnail_url: String,
    /// Human readable clock string, e.g. "12:04"
    pub duration: String,
    pub duration_seconds: u64,
    pub published_at: String,
    pub status: VideoStatus,
    #[serde(default)]
    pub transcript: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TripVideo {
    pub fn watch_url(&self) -> String {
        format!("https://youtube.com/watch?v={}", self.platform_video_id)
    }
}

/// Creator account, including the channel ingestion cursor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Creator {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub channel_handle: Option<String>,
    /// Uploads list resolved together with the channel id
    #[serde(default)]
    pub uploads_list_id: Option<String>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Creator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_record_id(),
            name: name.into(),
            avatar_url: None,
            channel_id: None,
            channel_handle: None,
            uploads_list_id: None,
            next_page_token: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.channel_handle.is_some()
    }

    pub fn has_more_videos(&self) -> bool {
        self.next_page_token.is_some()
    }
}
