use super::{clean_llm_response, GenerationOptions, GenerationRequest, LLMConfig, LLM};
use crate::error::{PipelineError, Result};
use crate::models::{PointCategory, TripPoint};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

/// A point of interest as returned by the model, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPoi {
    pub name: String,
    pub description: String,
    /// Open category string, coerced later
    pub category: String,
    pub day: u32,
    /// Seconds taken from the nearest bracket tag
    pub timestamp: Option<u64>,
    pub search_query: String,
    pub is_generic: bool,
}

impl RawPoi {
    /// Unenriched trip point with a fresh id and a coerced category.
    pub fn into_point(self) -> TripPoint {
        let mut point = TripPoint::new(self.name, PointCategory::coerce(&self.category));
        point.description = self.description;
        point.day = self.day.max(1);
        point.timestamp = self.timestamp;
        point.is_generic = self.is_generic;
        point
    }
}

/// Instruction for bracket-tagged transcripts
fn transcript_instruction(language: &str) -> String {
    format!(
        r#"You are an expert travel content analyzer.
I will provide a YouTube transcript where every line begins with a timestamp in brackets, for example: "[120] This is a beautiful beach".
The number inside the brackets [120] represents the total seconds from the start of the video.

CRITICAL TASK:
For each Point of Interest (POI), you MUST extract the exact number from the brackets [ ] corresponding to when that place is first mentioned.

Output a JSON array of objects with these fields:
- "name": Name of the place.
- "description": A short tip (1-2 sentences). Address the viewer directly. IMPORTANT: Provide all descriptions in {language} language.
- "type": "food", "stay", "activity", "insta", or "tip".
- "day": Trip day (number).
- "timestamp": The start time as an INTEGER (e.g., 120). This is the number from the brackets.
- "searchQuery": String for Google Maps.
- "isGeneric": boolean.

Example Input:
[10] Hello!
[45] Look at the Eiffel Tower.

Example Output:
[{{"name": "Eiffel Tower", "type": "activity", "description": "Beautiful view!", "day": 1, "timestamp": 45, "searchQuery": "Eiffel Tower", "isGeneric": false}}]

Return ONLY valid JSON."#
    )
}

/// Instruction for free-text descriptions without reliable timing
fn description_instruction(language: &str) -> String {
    format!(
        r#"You are an expert travel assistant. Analyze the travel video description or transcript you are given.
Identify key Points of Interest (POIs) mentioned.
Classify them into: "food", "stay", "activity", "insta" (Instagram spot) or "tip".
Write a short description for each that addresses the viewer directly, in {language} language.
Extract the start timestamp (in seconds) only if it is given as a [SS] tag, otherwise omit it.

Return ONLY a JSON array of objects with fields: "name", "type", "description", "day", "timestamp", "searchQuery", "isGeneric"."#
    )
}

/// Sends text to the model under a fixed extraction contract and validates the result.
pub struct PoiExtractor {
    llm: Arc<dyn LLM>,
    config: LLMConfig,
}

impl PoiExtractor {
    pub fn new(llm: Arc<dyn LLM>, config: LLMConfig) -> Self {
        Self { llm, config }
    }

    /// Extract POIs from a bracket-tagged transcript. Zero POIs is a valid result.
    pub async fn extract(&self, transcript: &str) -> Result<Vec<RawPoi>> {
        let request = GenerationRequest {
            system_instruction: Some(transcript_instruction(&self.config.description_language)),
            user_text: format!(
                "Analyze this travel video transcript and extract all POIs:\n\n{}",
                transcript
            ),
            options: GenerationOptions::from_config(&self.config).json(),
        };
        self.run(request).await
    }

    /// Extract POIs from free text such as a video description.
    pub async fn extract_from_description(&self, text: &str) -> Result<Vec<RawPoi>> {
        let request = GenerationRequest {
            system_instruction: Some(description_instruction(&self.config.description_language)),
            user_text: format!("Input Text: \"{}\"", text),
            options: GenerationOptions::from_config(&self.config).json(),
        };
        self.run(request).await
    }

    async fn run(&self, request: GenerationRequest) -> Result<Vec<RawPoi>> {
        info!("🤖 Sending {} chars to {:?} for POI extraction", request.user_text.len(), self.llm.provider_type());

        let response = self.llm.generate(request).await.map_err(|e| {
            error!("Extraction request failed: {}", e);
            PipelineError::ExtractionFailed(e.to_string())
        })?;

        if let Some(tokens) = response.tokens_used {
            debug!("Extraction used {} tokens", tokens);
        }

        let pois = parse_extraction_response(&response.content)?;
        info!("📍 Extracted {} POIs", pois.len());
        Ok(pois)
    }
}

/// Parse a model response into raw POIs. The body must be a JSON array of
/// objects once code fences are stripped.
pub fn parse_extraction_response(content: &str) -> Result<Vec<RawPoi>> {
    let cleaned = clean_llm_response(content);

    let value: Value = serde_json::from_str(&cleaned).map_err(|e| {
        error!("Failed to parse AI response: {}", content);
        PipelineError::ExtractionParseError(e.to_string())
    })?;

    let items = value.as_array().ok_or_else(|| {
        PipelineError::ExtractionParseError("expected a JSON array of POIs".to_string())
    })?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_object().map(raw_poi_from_object).ok_or_else(|| {
                PipelineError::ExtractionParseError(format!("item {} is not an object", index))
            })
        })
        .collect()
}

fn raw_poi_from_object(object: &Map<String, Value>) -> RawPoi {
    let text = |keys: &[&str]| {
        keys.iter()
            .filter_map(|key| object.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    };

    let name = text(&["name"]).unwrap_or_else(|| "Unknown".to_string());
    let search_query = text(&["searchQuery", "search_query"]).unwrap_or_else(|| name.clone());

    RawPoi {
        description: text(&["description"]).unwrap_or_default(),
        category: text(&["type", "category"]).unwrap_or_else(|| "activity".to_string()),
        day: object
            .get("day")
            .and_then(as_number)
            .filter(|day| *day >= 1.0)
            .map(|day| day.floor() as u32)
            .unwrap_or(1),
        timestamp: object
            .get("timestamp")
            .and_then(as_number)
            .filter(|ts| *ts >= 0.0)
            .map(|ts| ts.floor() as u64),
        is_generic: match object.get("isGeneric").or_else(|| object.get("is_generic")) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        },
        name,
        search_query,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}
