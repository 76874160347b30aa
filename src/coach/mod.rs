//! Task decomposition and "stuck" clarification.
//!
//! [`StepPlanner`] is the seam between the session state machine and whatever
//! produces steps:
//! - [`HttpPlanner`] talks to the backend (`/api/decompose`, `/api/stuck`)
//! - [`LlmPlanner`] talks to the model directly (used by the backend itself)
//!
//! Both return the same types and the same error taxonomy.

mod http;
mod llm_planner;
pub mod prompts;

pub use http::HttpPlanner;
pub use llm_planner::LlmPlanner;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::CoachError;
use crate::preferences::UserPreferences;

/// Upper bound requested from the model.
pub const MAX_STEPS: usize = 8;
/// Micro-actions in a clarification.
pub const MICRO_ACTION_COUNT: usize = 3;

/// One atomic, time-boxed unit of a decomposed task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    #[serde(rename = "step")]
    pub text: String,
    /// Estimated duration in minutes.
    #[serde(rename = "time")]
    pub estimated_minutes: f64,
}

impl Step {
    pub fn new(text: impl Into<String>, estimated_minutes: f64) -> Self {
        Self {
            text: text.into(),
            estimated_minutes,
        }
    }
}

/// Smaller actions for a step the user is stuck on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClarificationResult {
    #[serde(rename = "smallerSteps")]
    pub micro_actions: Vec<String>,
    /// `(continue label, skip label)`
    pub options: (String, String),
    pub encouragement: String,
}

impl ClarificationResult {
    pub fn continue_label(&self) -> &str {
        &self.options.0
    }

    pub fn skip_label(&self) -> &str {
        &self.options.1
    }

    /// Reject answers that ignored the requested shape.
    pub fn validate(self) -> Result<Self, CoachError> {
        if self.micro_actions.len() != MICRO_ACTION_COUNT {
            return Err(CoachError::ClarificationFailed(format!(
                "expected {} micro-actions, got {}",
                MICRO_ACTION_COUNT,
                self.micro_actions.len()
            )));
        }
        if self.micro_actions.iter().any(|a| a.trim().is_empty()) {
            return Err(CoachError::ClarificationFailed(
                "empty micro-action".to_string(),
            ));
        }
        Ok(self)
    }
}

/// `POST /api/decompose` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecomposeRequest {
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub prefs: UserPreferences,
}

/// `POST /api/decompose` success body. Only this object shape is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecomposeResponse {
    pub steps: Vec<Step>,
}

/// `POST /api/stuck` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StuckRequest {
    #[serde(default)]
    pub current_step_text: String,
}

/// Produces steps for tasks and micro-actions for stuck steps.
#[async_trait]
pub trait StepPlanner: Send + Sync {
    /// Break `task` into ordered steps. `task` is expected to be sanitized.
    async fn decompose(
        &self,
        task: &str,
        prefs: &UserPreferences,
    ) -> Result<Vec<Step>, CoachError>;

    /// Split one step into three micro-actions plus continue/skip labels.
    async fn clarify(&self, step_text: &str) -> Result<ClarificationResult, CoachError>;
}

pub type SharedPlanner = Arc<dyn StepPlanner>;

/// Parse a decomposition body (`{"steps": [...]}`).
pub fn parse_steps(body: &str) -> Result<Vec<Step>, CoachError> {
    let parsed: DecomposeResponse = serde_json::from_str(body)
        .map_err(|e| CoachError::DecompositionFailed(format!("malformed response: {}", e)))?;
    Ok(parsed.steps)
}

/// Parse and validate a clarification body.
pub fn parse_clarification(body: &str) -> Result<ClarificationResult, CoachError> {
    let parsed: ClarificationResult = serde_json::from_str(body)
        .map_err(|e| CoachError::ClarificationFailed(format!("malformed response: {}", e)))?;
    parsed.validate()
}

#[cfg(test)]
pub(crate) mod stub {
    //! Scripted planner for tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct ScriptedPlanner {
        decompositions: Mutex<VecDeque<Result<Vec<Step>, CoachError>>>,
        clarifications: Mutex<VecDeque<Result<ClarificationResult, CoachError>>>,
        pub decompose_calls: Mutex<Vec<(String, UserPreferences)>>,
        pub clarify_calls: Mutex<Vec<String>>,
    }

    impl ScriptedPlanner {
        pub fn with_decomposition(self, result: Result<Vec<Step>, CoachError>) -> Self {
            self.decompositions.lock().unwrap().push_back(result);
            self
        }

        pub fn with_clarification(self, result: Result<ClarificationResult, CoachError>) -> Self {
            self.clarifications.lock().unwrap().push_back(result);
            self
        }
    }

    #[async_trait]
    impl StepPlanner for ScriptedPlanner {
        async fn decompose(
            &self,
            task: &str,
            prefs: &UserPreferences,
        ) -> Result<Vec<Step>, CoachError> {
            self.decompose_calls
                .lock()
                .unwrap()
                .push((task.to_string(), prefs.clone()));
            self.decompositions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CoachError::DecompositionFailed("unscripted".into())))
        }

        async fn clarify(&self, step_text: &str) -> Result<ClarificationResult, CoachError> {
            self.clarify_calls.lock().unwrap().push(step_text.to_string());
            self.clarifications
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CoachError::ClarificationFailed("unscripted".into())))
        }
    }

    pub fn steps(texts: &[&str]) -> Vec<Step> {
        texts.iter().map(|t| Step::new(*t, 2.0)).collect()
    }

    pub fn clarification() -> ClarificationResult {
        ClarificationResult {
            micro_actions: vec![
                "Open the notes app".to_string(),
                "Type the company name".to_string(),
                "Write one question".to_string(),
            ],
            options: (
                "Continue for 2 minutes".to_string(),
                "Skip this step".to_string(),
            ),
            encouragement: "Tiny moves still count.".to_string(),
        }
    }
}
