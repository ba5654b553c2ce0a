use super::{PlaceInfo, PlaceSearch};
use crate::config::PlacesConfig;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Google Places text search client
pub struct GooglePlacesClient {
    config: PlacesConfig,
    client: reqwest::Client,
}

impl GooglePlacesClient {
    pub fn new(config: PlacesConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl PlaceSearch for GooglePlacesClient {
    async fn text_search(&self, query: &str) -> Result<PlaceInfo> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            warn!("No Places API key configured, skipping enrichment");
            return Ok(PlaceInfo::default());
        };

        let url = format!("{}/textsearch/json", self.config.base_url.trim_end_matches('/'));
        debug!("Searching Google Places: {}", query);

        let response = self
            .client
            .get(&url)
            .query(&[("query", query), ("key", api_key)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Places API error {}", response.status()));
        }

        let body: Value = response.json().await?;
        Ok(parse_text_search(&body))
    }

    fn backend_name(&self) -> &'static str {
        "places"
    }
}

/// First result of a text search body, or an empty record for any non-OK status.
pub fn parse_text_search(body: &Value) -> PlaceInfo {
    let status = body.get("status").and_then(Value::as_str).unwrap_or("UNKNOWN");
    if status != "OK" {
        let message = body.get("error_message").and_then(Value::as_str).unwrap_or("");
        debug!("Places API returned status {} {}", status, message);
        return PlaceInfo::default();
    }

    let Some(result) = body
        .get("results")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
    else {
        return PlaceInfo::default();
    };

    let location = result.pointer("/geometry/location");
    let place_id = result.get("place_id").and_then(Value::as_str).map(str::to_string);

    PlaceInfo {
        name: result.get("name").and_then(Value::as_str).map(str::to_string),
        lat: location.and_then(|l| l.get("lat")).and_then(Value::as_f64),
        lng: location.and_then(|l| l.get("lng")).and_then(Value::as_f64),
        address: result
            .get("formatted_address")
            .and_then(Value::as_str)
            .map(str::to_string),
        maps_url: place_id
            .as_ref()
            .map(|id| format!("https://www.google.com/maps/place/?q=place_id:{}", id)),
        website: None,
        photo_reference: result
            .pointer("/photos/0/photo_reference")
            .and_then(Value::as_str)
            .map(str::to_string),
        place_id,
        grounding_sources: Vec::new(),
    }
}
