pub mod extraction;
pub mod grounding;
pub mod providers;

use crate::models::GroundingSource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use extraction::{PoiExtractor, RawPoi};
pub use grounding::GroundedPlaceSearch;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Error types for LLM operations
#[derive(thiserror::Error, Debug)]
pub enum LLMError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{provider:?} API error {status}: {body}")]
    Api {
        provider: LLMProvider,
        status: u16,
        body: String,
    },

    #[error("No response from {0:?}")]
    EmptyResponse(LLMProvider),
}

/// LLM provider types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LLMProvider {
    LMStudio,
    Gemini,
    OpenAI,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    pub provider: LLMProvider,

    /// API endpoint (for LMStudio and custom providers)
    pub endpoint: Option<String>,

    /// API key (for cloud providers)
    pub api_key: Option<String>,

    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature for generation (low favors recall over creativity)
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Language every extracted description is written in
    pub description_language: String,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::Gemini,
            endpoint: None,
            api_key: None,
            model: "gemini-3-flash-preview".to_string(),
            max_tokens: 8192,
            temperature: 0.2,
            timeout_seconds: 120,
            description_language: "POLISH".to_string(),
        }
    }
}

/// Per-call generation settings
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the provider for a JSON-only response
    pub json_mode: bool,
    /// Enable map and web-search grounding tools where the provider has them
    pub grounding: bool,
}

impl GenerationOptions {
    pub fn from_config(config: &LLMConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            json_mode: false,
            grounding: false,
        }
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    pub fn grounded(mut self) -> Self {
        self.grounding = true;
        self
    }
}

/// A single generation call: system instruction plus one user turn
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_instruction: Option<String>,
    pub user_text: String,
    pub options: GenerationOptions,
}

/// LLM response
#[derive(Debug, Clone, Default)]
pub struct LLMResponse {
    pub content: String,
    pub tokens_used: Option<u32>,
    /// Citations returned by grounded calls
    pub grounding_sources: Vec<GroundingSource>,
}

/// Trait for LLM providers
#[async_trait]
pub trait LLM: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<LLMResponse>;
    async fn is_available(&self) -> bool;
    fn provider_type(&self) -> LLMProvider;
}

/// Create LLM instance based on configuration
pub fn create_llm(config: &LLMConfig) -> Result<Box<dyn LLM>> {
    match config.provider {
        LLMProvider::Gemini => Ok(Box::new(providers::GeminiProvider::new(config.clone())?)),
        LLMProvider::OpenAI | LLMProvider::LMStudio => Ok(Box::new(
            providers::OpenAICompatibleProvider::new(config.clone())?,
        )),
    }
}

/// Strip incidental markdown code fences around a model response.
pub fn clean_llm_response(content: &str) -> String {
    let content = content.trim();

    // Remove markdown code blocks (```json ... ``` or ``` ... ```)
    if content.starts_with("```") {
        if let Some(start) = content.find('\n') {
            if let Some(end) = content.rfind("```") {
                if end > start {
                    return content[start + 1..end].trim().to_string();
                }
            }
        }
    }

    content.replace("```json", "").replace("```", "").trim().to_string()
}
