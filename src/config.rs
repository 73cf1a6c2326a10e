//! Configuration loaded from `veritas.toml` with environment overrides.
//!
//! Every tunable the orchestrator consults (acceptance threshold,
//! revision bound, retry policy, stage timeouts, per-stage model tiers)
//! lives here and is fixed at session-construction time. There is no
//! process-wide mutable default.

use crate::types::{AppError, Result, StageKind};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VeritasConfig {
    pub server: ServerConfig,
    pub orchestrator: OrchestratorConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Minimum review score (1-10) for a draft to be accepted
    pub quality_threshold: u8,
    /// Maximum number of revision attempts after the initial draft
    pub max_revisions: u32,
    /// Retries for a stage reporting a transient failure
    pub stage_retries: u32,
    /// Bounded wait per stage invocation; exceeding it counts as transient
    pub stage_timeout_secs: u64,
    /// Root directory for per-session artifact directories
    pub results_dir: PathBuf,
    /// Directory where uploaded data files land
    pub uploads_dir: PathBuf,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 7,
            max_revisions: 2,
            stage_retries: 2,
            stage_timeout_secs: 120,
            results_dir: PathBuf::from("results"),
            uploads_dir: PathBuf::from("uploads"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint base
    pub api_base: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Model used when a stage has no tier override
    pub default_model: String,
    pub temperature: f32,
    /// Per-stage model overrides, keyed by stage name
    /// (e.g. `draft = "gpt-4-turbo"`, `citation = "gpt-3.5-turbo"`)
    pub tiers: HashMap<String, String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            default_model: "gpt-4.1".to_string(),
            temperature: 0.1,
            tiers: HashMap::new(),
        }
    }
}

impl LlmConfig {
    /// Resolve the model for a stage, falling back to the default.
    pub fn model_for(&self, stage: StageKind) -> &str {
        self.tiers
            .get(stage.as_str())
            .map(String::as_str)
            .unwrap_or(&self.default_model)
    }

    pub fn api_key(&self) -> Option<String> {
        env::var(&self.api_key_env).ok()
    }
}

impl VeritasConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file is absent, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new("veritas.toml"));

        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)
                .map_err(|e| AppError::InvalidInput(format!("invalid config {}: {}", path.display(), e)))?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            VeritasConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = env::var("VERITAS_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("VERITAS_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(base) = env::var("VERITAS_LLM_API_BASE") {
            self.llm.api_base = base;
        }
        if let Ok(model) = env::var("VERITAS_LLM_MODEL") {
            self.llm.default_model = model;
        }
        if let Ok(dir) = env::var("VERITAS_RESULTS_DIR") {
            self.orchestrator.results_dir = PathBuf::from(dir);
        }
    }
}
