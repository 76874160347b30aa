//! Planner that asks the model directly. Runs inside the backend.

use async_trait::async_trait;
use std::sync::Arc;

use super::prompts::{decompose_prompt, decompose_schema, stuck_prompt, stuck_schema};
use super::{parse_clarification, parse_steps, ClarificationResult, Step, StepPlanner};
use crate::error::CoachError;
use crate::llm::{LlmClient, StructuredRequest};
use crate::preferences::UserPreferences;
use crate::sanitize::Sanitizer;

/// [`StepPlanner`] over an [`LlmClient`]. Sanitizes every task before it is
/// put into a prompt, whatever the caller already did.
pub struct LlmPlanner {
    llm: Arc<dyn LlmClient>,
    sanitizer: Sanitizer,
}

impl LlmPlanner {
    pub fn new(llm: Arc<dyn LlmClient>, sanitizer: Sanitizer) -> Self {
        Self { llm, sanitizer }
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }
}

#[async_trait]
impl StepPlanner for LlmPlanner {
    async fn decompose(
        &self,
        task: &str,
        prefs: &UserPreferences,
    ) -> Result<Vec<Step>, CoachError> {
        let clean_task = self.sanitizer.sanitize(task);
        let request = StructuredRequest::new(decompose_prompt(&clean_task, prefs), decompose_schema());

        let body = self.llm.generate_json(request).await.map_err(|e| {
            tracing::error!("Decompose error: {}", e);
            CoachError::DecompositionFailed(e.to_string())
        })?;

        let steps = parse_steps(&body)?;
        tracing::debug!(steps = steps.len(), "Task decomposed");
        Ok(steps)
    }

    async fn clarify(&self, step_text: &str) -> Result<ClarificationResult, CoachError> {
        let request = StructuredRequest::new(stuck_prompt(step_text), stuck_schema());

        let body = self.llm.generate_json(request).await.map_err(|e| {
            tracing::error!("Stuck error: {}", e);
            CoachError::ClarificationFailed(e.to_string())
        })?;

        parse_clarification(&body)
    }
}
