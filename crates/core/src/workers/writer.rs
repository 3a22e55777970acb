//! # Writer
//!
//! Writes every planned document through the run's filesystem session.

use anyhow::Context;
use std::sync::Arc;

use super::{WorkContext, WorkerResult};
use crate::llm::{prompts, LanguageModel, ModelRequest};
use crate::pipeline::validator::is_roadmap;

pub struct Writer {
    model: Arc<dyn LanguageModel>,
    brief: String,
}

impl Writer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            brief: String::new(),
        }
    }

    pub(crate) async fn produce_result(
        &mut self,
        task: &str,
        cx: &WorkContext<'_>,
    ) -> anyhow::Result<WorkerResult> {
        self.brief = task.to_string();

        let mut written = Vec::with_capacity(cx.plan.output_files.len());
        for filename in &cx.plan.output_files {
            let prompt = format!("Write the document `{}`.\n\n{}", filename, self.brief);
            let content = self
                .model
                .complete(ModelRequest::new("writer", system_for(filename), prompt))
                .await
                .with_context(|| format!("Writer failed on {}", filename))?;

            cx.session.write_file(filename, &content).await?;
            tracing::info!(%filename, bytes = content.len(), "Document written");
            written.push(filename.as_str());
        }

        Ok(WorkerResult::Completed {
            content: format!("Created {} documents: {}", written.len(), written.join(", ")),
        })
    }

    /// Rewrite one document following a correction instruction
    pub async fn rewrite(
        &mut self,
        filename: &str,
        instruction: &str,
        cx: &WorkContext<'_>,
    ) -> anyhow::Result<()> {
        let current = match cx.session.read_file(filename).await {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!(%filename, error = %e, "Rewriting without the current version");
                String::new()
            }
        };
        let prompt = format!(
            "{}\n\nCurrent version of `{}`:\n{}\n\nBackground:\n{}",
            instruction, filename, current, self.brief
        );

        let content = self
            .model
            .complete(ModelRequest::new("writer", system_for(filename), prompt))
            .await
            .with_context(|| format!("Writer failed to rewrite {}", filename))?;

        cx.session.write_file(filename, &content).await?;
        tracing::info!(%filename, "Document rewritten");
        Ok(())
    }
}

fn system_for(filename: &str) -> &'static str {
    if is_roadmap(filename) {
        prompts::ROADMAP
    } else {
        prompts::WRITER
    }
}
