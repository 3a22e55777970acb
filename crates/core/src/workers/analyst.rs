//! # Analyst
//!
//! Market analysis over the fetched sources, steered by the plan's focus.

use anyhow::Context;
use std::sync::Arc;

use super::{WorkContext, WorkerResult};
use crate::llm::{prompts, LanguageModel, ModelRequest};

pub struct Analyst {
    model: Arc<dyn LanguageModel>,
}

impl Analyst {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub(crate) async fn produce_result(
        &mut self,
        task: &str,
        cx: &WorkContext<'_>,
    ) -> anyhow::Result<WorkerResult> {
        let content = self
            .model
            .complete(ModelRequest::new(
                "analyst",
                prompts::ANALYST,
                analysis_prompt(task, &cx.plan.analysis_focus),
            ))
            .await
            .context("Analyst failed to produce the market analysis")?;

        Ok(WorkerResult::Completed { content })
    }
}

fn analysis_prompt(task: &str, focus: &[String]) -> String {
    let mut prompt = String::new();
    if !focus.is_empty() {
        prompt.push_str("Answer these questions:\n");
        for item in focus {
            prompt.push_str(&format!("- {}\n", item));
        }
        prompt.push('\n');
    }
    prompt.push_str(task);
    prompt
}
