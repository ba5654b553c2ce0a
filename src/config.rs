use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use crate::llm::{LLMConfig, LLMProvider};

/// Configuration for the trip blueprint pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Generative model used for extraction and grounded lookups
    pub llm: LLMConfig,

    /// Transcript provider settings
    pub transcript: TranscriptConfig,

    /// Place search settings
    pub places: PlacesConfig,

    /// Video platform metadata API
    pub youtube: YouTubeConfig,

    /// Defaults stamped onto new blueprints
    pub blueprint: BlueprintDefaults,

    /// Review session settings
    pub verification: VerificationConfig,

    /// Local store settings
    pub storage: StorageConfig,

    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    pub api_key: Option<String>,

    /// Base URL of the transcript API
    pub base_url: String,

    /// Language requested from the provider
    pub language: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.supadata.ai/v1".to_string(),
            language: "pl".to_string(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacesConfig {
    /// Server-side key. Never used to build client photo URLs.
    pub api_key: Option<String>,

    pub base_url: String,

    pub timeout_seconds: u64,

    /// Upper bound on concurrent place lookups during assembly
    pub max_concurrent_lookups: usize,
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://maps.googleapis.com/maps/api/place".to_string(),
            timeout_seconds: 30,
            max_concurrent_lookups: num_cpus::get().min(8), // Use available cores, max 8
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueprintDefaults {
    pub price: f64,
    pub currency: String,
    pub region: String,
    pub tags: Vec<String>,

    /// Prepended to the video title to form the description
    pub description_prefix: String,
}

impl Default for BlueprintDefaults {
    fn default() -> Self {
        Self {
            price: 49.0,
            currency: "PLN".to_string(),
            region: "Asia".to_string(),
            tags: vec!["Travel".to_string(), "AI Generated".to_string()],
            description_prefix: "Plan podróży: ".to_string(),
        }
    }
}

/// Backend used to enrich a point when it is approved
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentBackend {
    /// Text search against the place provider
    #[default]
    Places,
    /// Generative model with map and search grounding
    Grounded,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub enrichment: EnrichmentBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the store snapshot
    pub state_dir: PathBuf,

    /// Write a snapshot after every change
    pub persist: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".trip_blueprint_state"),
            persist: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "trip_blueprint=info,warn".to_string(),
        }
    }
}

/// Which provider credentials are configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialReport {
    pub llm: bool,
    pub transcript: bool,
    pub youtube: bool,
    pub places: bool,
}

impl CredentialReport {
    pub fn all_present(&self) -> bool {
        self.llm && self.transcript && self.youtube && self.places
    }

    pub fn entries(&self) -> [(&'static str, bool); 4] {
        [
            ("GEMINI_API_KEY", self.llm),
            ("SUPADATA_API_KEY", self.transcript),
            ("YOUTUBE_API_KEY", self.youtube),
            ("GOOGLE_PLACES_API_KEY", self.places),
        ]
    }
}

impl Config {
    /// Load configuration from file, then apply environment overrides
    pub fn load() -> Result<Self> {
        let config_paths = [
            "trip-blueprint.toml",
            "config/trip-blueprint.toml",
            "/etc/trip-blueprint/config.toml",
        ];

        let mut config = None;
        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(parsed) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        config = Some(parsed);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        let mut config = config.unwrap_or_default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from process environment variables
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Override fields from an arbitrary variable source
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.llm.api_key = Some(key);
        }

        if let Some(key) = lookup("SUPADATA_API_KEY") {
            self.transcript.api_key = Some(key);
        }

        if let Some(key) = lookup("YOUTUBE_API_KEY") {
            // Places falls back to the platform key when it has none of its own
            if self.places.api_key.is_none() {
                self.places.api_key = Some(key.clone());
            }
            self.youtube.api_key = Some(key);
        }

        if let Some(key) = lookup("GOOGLE_PLACES_API_KEY") {
            self.places.api_key = Some(key);
        }

        if let Some(dir) = lookup("TRIP_BLUEPRINT_STATE_DIR") {
            self.storage.state_dir = PathBuf::from(dir);
        }

        if let Some(level) = lookup("TRIP_BLUEPRINT_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Validate numeric settings. Credentials are checked where they are used.
    pub fn validate(&self) -> Result<()> {
        if self.places.max_concurrent_lookups == 0 {
            return Err(anyhow!("max_concurrent_lookups must be greater than 0"));
        }

        if self.blueprint.price < 0.0 || !self.blueprint.price.is_finite() {
            return Err(anyhow!("blueprint price must be a non-negative number"));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow!("llm temperature must be within 0.0..=2.0"));
        }

        if self.llm.max_tokens == 0 {
            return Err(anyhow!("llm max_tokens must be greater than 0"));
        }

        if self.llm.provider == LLMProvider::LMStudio && self.llm.endpoint.is_none() {
            return Err(anyhow!("LMStudio provider requires an endpoint"));
        }

        if self.transcript.language.trim().is_empty() {
            return Err(anyhow!("transcript language must not be empty"));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Report which provider keys are set
    pub fn credential_report(&self) -> CredentialReport {
        CredentialReport {
            llm: self.llm.api_key.is_some() || self.llm.provider == LLMProvider::LMStudio,
            transcript: self.transcript.api_key.is_some(),
            youtube: self.youtube.api_key.is_some(),
            places: self.places.api_key.is_some(),
        }
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Trip Blueprint Configuration:\n\
            - LLM Provider: {:?} ({})\n\
            - Transcript Language: {}\n\
            - Place Lookups: {} concurrent\n\
            - Approve Enrichment: {:?}\n\
            - Default Price: {} {}\n\
            - State Directory: {}",
            self.llm.provider,
            self.llm.model,
            self.transcript.language,
            self.places.max_concurrent_lookups,
            self.verification.enrichment,
            self.blueprint.price,
            self.blueprint.currency,
            self.storage.state_dir.display(),
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_llm_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.llm.api_key = Some(api_key.into());
        self
    }

    pub fn with_places_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.places.api_key = Some(api_key.into());
        self
    }

    pub fn with_max_concurrent_lookups(mut self, lookups: usize) -> Self {
        self.config.places.max_concurrent_lookups = lookups;
        self
    }

    pub fn with_state_dir(mut self, dir: PathBuf) -> Self {
        self.config.storage.state_dir = dir;
        self
    }

    pub fn with_persistence(mut self, persist: bool) -> Self {
        self.config.storage.persist = persist;
        self
    }

    pub fn with_enrichment(mut self, backend: EnrichmentBackend) -> Self {
        self.config.verification.enrichment = backend;
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.config.blueprint.price = price;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
