//! # Pipeline Configuration
//!
//! Runtime settings for the coordinator, workers and tools. Loaded from
//! `.ideaforge/config.json`; every field falls back to its default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{LlmProvider, ModelConfig};
use crate::tools::fetch::FetchOptions;

/// Default location of the persisted configuration
pub const CONFIG_PATH: &str = ".ideaforge/config.json";

/// Configuration for the pipeline service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Global LLM provider
    pub global_provider: LlmProvider,
    /// Global model to use for all agents
    pub global_model: Option<String>,
    /// Base URL override for LLM API (for OpenAI-compatible endpoints)
    pub base_url: Option<String>,
    /// Per-agent model overrides (agent id -> model name)
    pub per_agent_models: HashMap<String, String>,
    /// Per-agent provider overrides (agent id -> provider)
    pub per_agent_providers: HashMap<String, LlmProvider>,
    /// Directory that receives the generated documents
    pub output_dir: PathBuf,
    /// Characters kept per fetched page
    pub fetch_max_chars: usize,
    /// Per-URL fetch timeout in seconds
    pub fetch_timeout_secs: u64,
    /// Upper bound on concurrent page fetches
    pub fetch_max_parallel: usize,
    /// URLs kept from each approved search query
    pub results_per_query: usize,
    /// Queries the searcher proposes for approval
    pub max_proposed_queries: usize,
    /// Timeout for opening the output filesystem session
    pub fs_connect_timeout_secs: u64,
    /// Suspended runs older than this are evicted
    pub run_ttl_secs: u64,
    /// How often the eviction sweep runs
    pub sweep_interval_secs: u64,
    /// Custom SearXNG instance URL (tried before public instances)
    pub searxng_url: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            global_provider: LlmProvider::OpenAI,
            global_model: None,
            base_url: None,
            per_agent_models: HashMap::new(),
            per_agent_providers: HashMap::new(),
            output_dir: PathBuf::from("output"),
            fetch_max_chars: 5000,
            fetch_timeout_secs: 10,
            fetch_max_parallel: 8,
            results_per_query: 3,
            max_proposed_queries: 5,
            fs_connect_timeout_secs: 30,
            run_ttl_secs: 60 * 60,
            sweep_interval_secs: 60,
            searxng_url: None,
        }
    }
}

impl PipelineConfig {
    /// Load from the default path, falling back to defaults when absent or unreadable
    pub fn load() -> Self {
        let path = Path::new(CONFIG_PATH);
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring {}: {:#}", CONFIG_PATH, e);
                Self::default()
            }
        }
    }

    /// Apply `IDEAFORGE_PROVIDER` and `IDEAFORGE_MODEL` from the environment
    pub fn with_env_overrides(self) -> Self {
        let provider = std::env::var("IDEAFORGE_PROVIDER").ok();
        let model = std::env::var("IDEAFORGE_MODEL").ok();
        self.with_overrides(provider.as_deref(), model.as_deref())
    }

    fn with_overrides(mut self, provider: Option<&str>, model: Option<&str>) -> Self {
        if let Some(name) = provider.filter(|p| !p.trim().is_empty()) {
            match name.parse::<LlmProvider>() {
                Ok(provider) => self.global_provider = provider,
                Err(e) => tracing::warn!("Ignoring IDEAFORGE_PROVIDER: {}", e),
            }
        }
        if let Some(model) = model.map(str::trim).filter(|m| !m.is_empty()) {
            self.global_model = Some(model.to_string());
        }
        self
    }

    /// Load from an explicit JSON file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Get model config for a specific agent
    pub fn model_config(&self, agent_id: &str) -> ModelConfig {
        // Provider: per-agent override -> global
        let provider = self
            .per_agent_providers
            .get(agent_id)
            .copied()
            .unwrap_or(self.global_provider);

        // Model: per-agent override -> global -> provider default
        let model = self
            .per_agent_models
            .get(agent_id)
            .or(self.global_model.as_ref())
            .cloned()
            .unwrap_or_else(|| provider.default_model().to_string());

        let config = ModelConfig::with_provider(provider, model);
        match &self.base_url {
            Some(url) => config.with_base_url(url),
            None => config,
        }
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            max_chars: self.fetch_max_chars,
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_parallel: self.fetch_max_parallel.max(1),
        }
    }

    pub fn fs_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.fs_connect_timeout_secs)
    }

    pub fn run_ttl(&self) -> Duration {
        Duration::from_secs(self.run_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
