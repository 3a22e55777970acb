//! # Language Model Seam
//!
//! Workers talk to the model through [`LanguageModel`]. Production runs use
//! [`RadkitModel`]; tests plug in scripted implementations.

pub mod helpers;
pub mod prompts;

use async_trait::async_trait;
use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;

/// One model call made on behalf of an agent
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Agent id used for per-agent model overrides ("planner", "writer", ...)
    pub agent: &'static str,
    /// System instructions
    pub system: &'static str,
    /// User prompt
    pub prompt: String,
}

impl ModelRequest {
    pub fn new(agent: &'static str, system: &'static str, prompt: impl Into<String>) -> Self {
        Self {
            agent,
            system,
            prompt: prompt.into(),
        }
    }
}

/// Freeform text completion
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: ModelRequest) -> anyhow::Result<String>;
}

/// Structured reply wrapper so every provider returns plain text the same way
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct TextReply {
    /// The complete answer, without commentary
    pub text: String,
}

/// Radkit-backed model resolving provider and model per agent
pub struct RadkitModel {
    config: PipelineConfig,
}

impl RadkitModel {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LanguageModel for RadkitModel {
    async fn complete(&self, request: ModelRequest) -> anyhow::Result<String> {
        let model_config = self.config.model_config(request.agent);
        tracing::debug!(
            agent = request.agent,
            provider = model_config.provider.display_name(),
            model = %model_config.model,
            "Calling language model"
        );

        let reply = crate::run_llm_function!(
            &model_config,
            TextReply,
            request.system,
            request.prompt
        )
        .map_err(|e| {
            anyhow::anyhow!(
                "{} call failed (provider: {}, model: {}): {}",
                request.agent,
                model_config.provider.display_name(),
                model_config.model,
                e
            )
        })?;

        Ok(reply.text)
    }
}
