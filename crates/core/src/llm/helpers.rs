//! # LLM Helpers
//!
//! Provider dispatch for radkit's `LlmFunction`. Provider client types differ,
//! so dispatch happens in a macro rather than through a trait object.

/// Run one structured `LlmFunction` call against the provider named in a
/// [`crate::models::ModelConfig`].
///
/// Expands inside an async fn returning `anyhow::Result`; missing API keys
/// return early through `?`.
#[macro_export]
macro_rules! run_llm_function {
    (@call $llm:expr, $output_type:ty, $system_prompt:expr, $input:expr) => {{
        radkit::agent::LlmFunction::<$output_type>::new_with_system_instructions(
            $llm,
            $system_prompt,
        )
        .run($input)
        .await
        .map_err(::anyhow::Error::from)
    }};
    ($config:expr, $output_type:ty, $system_prompt:expr, $input:expr) => {{
        use radkit::models::providers::{
            AnthropicLlm, DeepSeekLlm, GeminiLlm, GrokLlm, OpenAILlm, OpenRouterLlm,
        };
        use $crate::models::LlmProvider;

        let config = $config;
        let result: anyhow::Result<$output_type> = match config.provider {
            LlmProvider::OpenAI => {
                let llm = match &config.base_url {
                    Some(url) => OpenAILlm::from_env(&config.model)?.with_base_url(url),
                    None => OpenAILlm::from_env(&config.model)?,
                };
                $crate::run_llm_function!(@call llm, $output_type, $system_prompt, $input)
            }
            LlmProvider::Anthropic => $crate::run_llm_function!(
                @call AnthropicLlm::from_env(&config.model)?, $output_type, $system_prompt, $input
            ),
            LlmProvider::Gemini => $crate::run_llm_function!(
                @call GeminiLlm::from_env(&config.model)?, $output_type, $system_prompt, $input
            ),
            LlmProvider::OpenRouter => $crate::run_llm_function!(
                @call OpenRouterLlm::from_env(&config.model)?, $output_type, $system_prompt, $input
            ),
            LlmProvider::Grok => $crate::run_llm_function!(
                @call GrokLlm::from_env(&config.model)?, $output_type, $system_prompt, $input
            ),
            LlmProvider::DeepSeek => $crate::run_llm_function!(
                @call DeepSeekLlm::from_env(&config.model)?, $output_type, $system_prompt, $input
            ),
        };
        result
    }};
}
