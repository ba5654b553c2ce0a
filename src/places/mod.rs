//! Best-effort place enrichment.
//!
//! The server resolves identity and coordinates eagerly but only ever keeps
//! the opaque photo reference. Turning a reference into an image URL needs a
//! client-scoped key and happens at the edge through [`client_photo_url`].

pub mod google;

use crate::models::{GroundingSource, TripPoint};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

pub use google::GooglePlacesClient;

/// Partial place record. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceInfo {
    pub name: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub address: Option<String>,
    pub maps_url: Option<String>,
    pub website: Option<String>,
    pub photo_reference: Option<String>,
    pub place_id: Option<String>,
    #[serde(default)]
    pub grounding_sources: Vec<GroundingSource>,
}

impl PlaceInfo {
    pub fn is_empty(&self) -> bool {
        self.lat.is_none()
            && self.lng.is_none()
            && self.address.is_none()
            && self.maps_url.is_none()
            && self.website.is_none()
            && self.photo_reference.is_none()
            && self.place_id.is_none()
            && self.grounding_sources.is_empty()
    }

    /// Merge resolved fields into a point. Absent fields leave the point untouched.
    pub fn apply_to(&self, point: &mut TripPoint) {
        if let (Some(lat), Some(lng)) = (self.lat, self.lng) {
            point.lat = Some(lat);
            point.lng = Some(lng);
        }
        if let Some(address) = &self.address {
            point.address = Some(address.clone());
        }
        if let Some(url) = &self.maps_url {
            point.maps_url = Some(url.clone());
        }
        if let Some(website) = &self.website {
            point.website = Some(website.clone());
        }
        if let Some(reference) = &self.photo_reference {
            point.photo_reference = Some(reference.clone());
        }
        if let Some(place_id) = &self.place_id {
            point.place_id = Some(place_id.clone());
        }
        if !self.grounding_sources.is_empty() {
            point.grounding_sources = self.grounding_sources.clone();
        }
    }

    /// Overwrite every place field of a point, clearing what this lookup lacks.
    pub fn replace_on(&self, point: &mut TripPoint) {
        let (lat, lng) = match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => (Some(lat), Some(lng)),
            _ => (None, None),
        };
        point.lat = lat;
        point.lng = lng;
        point.address = self.address.clone();
        point.maps_url = self.maps_url.clone();
        point.website = self.website.clone();
        point.photo_reference = self.photo_reference.clone();
        point.place_id = self.place_id.clone();
        point.grounding_sources = self.grounding_sources.clone();
    }
}

/// A place lookup backend. Failures are reported, the enricher absorbs them.
#[async_trait]
pub trait PlaceSearch: Send + Sync {
    async fn text_search(&self, query: &str) -> anyhow::Result<PlaceInfo>;
    fn backend_name(&self) -> &'static str;
}

/// Wraps a backend so that lookups never fail.
#[derive(Clone)]
pub struct PlaceEnricher {
    backend: Arc<dyn PlaceSearch>,
}

impl PlaceEnricher {
    pub fn new(backend: Arc<dyn PlaceSearch>) -> Self {
        Self { backend }
    }

    /// Best match for a free-text query, or an empty record on any failure.
    pub async fn search_place(&self, query: &str) -> PlaceInfo {
        let query = query.trim();
        if query.is_empty() {
            return PlaceInfo::default();
        }

        match self.backend.text_search(query).await {
            Ok(info) => {
                debug!(
                    "{} lookup for [{}]: resolved={}",
                    self.backend.backend_name(),
                    query,
                    !info.is_empty()
                );
                info
            }
            Err(e) => {
                warn!("⚠️ {} lookup failed for [{}]: {}", self.backend.backend_name(), query, e);
                PlaceInfo::default()
            }
        }
    }

    /// Enrich a point in place and return whether anything was resolved.
    pub async fn enrich_point(&self, point: &mut TripPoint, query: &str) -> bool {
        let info = self.search_place(query).await;
        info.apply_to(point);
        !info.is_empty()
    }
}

/// Browser-side photo URL built from a stored reference and a restricted,
/// caller-supplied key. Not called on any server path.
pub fn client_photo_url(photo_reference: &str, client_key: &str, max_width: u32) -> String {
    format!(
        "https://maps.googleapis.com/maps/api/place/photo?maxwidth={}&photo_reference={}&key={}",
        max_width,
        urlencoding::encode(photo_reference),
        urlencoding::encode(client_key)
    )
}
