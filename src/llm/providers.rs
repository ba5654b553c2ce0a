use super::{GenerationRequest, LLMConfig, LLMError, LLMProvider, LLMResponse, Result, LLM};
use crate::models::{GroundingSource, SourceKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

fn build_client(config: &LLMConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()?)
}

/// Gemini provider implementation
pub struct GeminiProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
    grounding_metadata: Option<GeminiGroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GeminiGroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GeminiGroundingChunk {
    web: Option<GeminiChunkSource>,
    maps: Option<GeminiChunkSource>,
}

#[derive(Debug, Deserialize)]
struct GeminiChunkSource {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    total_token_count: u32,
}

impl GeminiProvider {
    pub fn new(config: LLMConfig) -> Result<Self> {
        if config.api_key.is_none() {
            return Err(LLMError::Configuration("Gemini API key required".to_string()));
        }

        let client = build_client(&config)?;
        Ok(Self { config, client })
    }

    fn build_request(&self, request: GenerationRequest) -> GeminiRequest {
        let tools = if request.options.grounding {
            vec![
                serde_json::json!({ "googleMaps": {} }),
                serde_json::json!({ "googleSearch": {} }),
            ]
        } else {
            Vec::new()
        };

        GeminiRequest {
            system_instruction: request.system_instruction.map(|text| GeminiContent {
                parts: vec![GeminiPart { text }],
            }),
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: request.user_text }],
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: request.options.max_tokens,
                temperature: request.options.temperature,
                response_mime_type: request.options.json_mode.then_some("application/json"),
            },
            tools,
        }
    }

    fn endpoint(&self) -> String {
        let base = self.config.endpoint.as_deref().unwrap_or(GEMINI_BASE);
        format!("{}/models/{}:generateContent", base.trim_end_matches('/'), self.config.model)
    }
}

/// Pull text, token usage and grounding citations out of a Gemini response body.
pub fn parse_gemini_response(body: &str) -> Result<LLMResponse> {
    let response: GeminiResponse = serde_json::from_str(body)?;

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(LLMError::EmptyResponse(LLMProvider::Gemini))?;

    let content = candidate
        .content
        .parts
        .iter()
        .map(|part| part.text.as_str())
        .collect::<Vec<_>>()
        .join("");

    let grounding_sources = candidate
        .grounding_metadata
        .map(|metadata| {
            metadata
                .grounding_chunks
                .into_iter()
                .filter_map(|chunk| {
                    if let Some(web) = chunk.web {
                        let uri = web.uri?;
                        Some(GroundingSource {
                            title: web.title.unwrap_or_else(|| "Web Source".to_string()),
                            uri,
                            kind: SourceKind::Search,
                        })
                    } else if let Some(maps) = chunk.maps {
                        let uri = maps.uri?;
                        Some(GroundingSource {
                            title: maps.title.unwrap_or_else(|| "Google Maps".to_string()),
                            uri,
                            kind: SourceKind::Maps,
                        })
                    } else {
                        None
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(LLMResponse {
        content,
        tokens_used: response.usage_metadata.map(|u| u.total_token_count),
        grounding_sources,
    })
}

#[async_trait]
impl LLM for GeminiProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<LLMResponse> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| LLMError::Configuration("Gemini API key not configured".to_string()))?;

        let grounded = request.options.grounding;
        let body = self.build_request(request);

        debug!("Sending request to Gemini API (model {}, grounded: {})", self.config.model, grounded);

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LLMError::Api {
                provider: LLMProvider::Gemini,
                status: status.as_u16(),
                body: text,
            });
        }

        let text = response.text().await?;
        let parsed = parse_gemini_response(&text)?;
        debug!("Gemini response received, length: {}", parsed.content.len());
        Ok(parsed)
    }

    async fn is_available(&self) -> bool {
        // Simple check by trying to list models
        if let Some(api_key) = &self.config.api_key {
            let base = self.config.endpoint.as_deref().unwrap_or(GEMINI_BASE);
            let url = format!("{}/models", base.trim_end_matches('/'));

            match self.client.get(&url).query(&[("key", api_key)]).send().await {
                Ok(response) => response.status().is_success(),
                Err(_) => false,
            }
        } else {
            false
        }
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::Gemini
    }
}

/// Chat message for chat-completions style providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// OpenAI and LMStudio share the chat-completions wire format
pub struct OpenAICompatibleProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

impl OpenAICompatibleProvider {
    pub fn new(config: LLMConfig) -> Result<Self> {
        match config.provider {
            LLMProvider::OpenAI if config.api_key.is_none() => {
                return Err(LLMError::Configuration("OpenAI API key required".to_string()));
            }
            LLMProvider::LMStudio if config.endpoint.is_none() => {
                return Err(LLMError::Configuration("LMStudio endpoint not configured".to_string()));
            }
            _ => {}
        }

        let client = build_client(&config)?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> &str {
        self.config.endpoint.as_deref().unwrap_or(OPENAI_ENDPOINT)
    }
}

/// Pull the first choice out of a chat-completions response body.
pub fn parse_chat_response(provider: LLMProvider, body: &str) -> Result<LLMResponse> {
    let response: ChatResponse = serde_json::from_str(body)?;

    let content = response
        .choices
        .into_iter()
        .next()
        .ok_or(LLMError::EmptyResponse(provider))?
        .message
        .content;

    Ok(LLMResponse {
        content,
        tokens_used: response.usage.map(|u| u.total_tokens),
        grounding_sources: Vec::new(),
    })
}

#[async_trait]
impl LLM for OpenAICompatibleProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<LLMResponse> {
        if request.options.grounding {
            debug!("{:?} has no grounding tools, sending a plain request", self.config.provider);
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system_instruction {
            messages.push(ChatMessage { role: "system".to_string(), content: system });
        }
        messages.push(ChatMessage { role: "user".to_string(), content: request.user_text });

        let body = ChatRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: request.options.max_tokens,
            temperature: request.options.temperature,
        };

        debug!("Sending request to {:?} at {}", self.config.provider, self.endpoint());

        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LLMError::Api {
                provider: self.config.provider,
                status: status.as_u16(),
                body: text,
            });
        }

        let text = response.text().await?;
        parse_chat_response(self.config.provider, &text)
    }

    async fn is_available(&self) -> bool {
        let models_endpoint = self.endpoint().replace("/chat/completions", "/models");

        let mut builder = self.client.get(&models_endpoint);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        match builder.send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn provider_type(&self) -> LLMProvider {
        self.config.provider
    }
}
