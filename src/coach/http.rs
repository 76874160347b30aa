//! Planner that calls the backend over HTTP.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{
    parse_clarification, parse_steps, ClarificationResult, DecomposeRequest, Step, StepPlanner,
    StuckRequest,
};
use crate::error::CoachError;
use crate::preferences::UserPreferences;

/// [`StepPlanner`] backed by `POST /api/decompose` and `POST /api/stuck`.
///
/// One request per call, no retries.
pub struct HttpPlanner {
    client: Client,
    base_url: String,
}

/// Error body the backend sends with non-200 responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpPlanner {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CoachError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            CoachError::UnsupportedCapability(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `path`; returns the raw success body or a description
    /// of what went wrong.
    async fn post<B: serde::Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<String, String> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    format!("Request timeout: {}", e)
                } else if e.is_connect() {
                    format!("Connection failed: {}", e)
                } else {
                    format!("Request failed: {}", e)
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response: {}", e))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or(text);
            return Err(format!("HTTP {}: {}", status.as_u16(), detail));
        }
        Ok(text)
    }
}

#[async_trait]
impl StepPlanner for HttpPlanner {
    async fn decompose(
        &self,
        task: &str,
        prefs: &UserPreferences,
    ) -> Result<Vec<Step>, CoachError> {
        let request = DecomposeRequest {
            task: task.to_string(),
            prefs: prefs.clone(),
        };
        let body = self
            .post("/api/decompose", &request)
            .await
            .map_err(CoachError::DecompositionFailed)?;
        parse_steps(&body)
    }

    async fn clarify(&self, step_text: &str) -> Result<ClarificationResult, CoachError> {
        let request = StuckRequest {
            current_step_text: step_text.to_string(),
        };
        let body = self
            .post("/api/stuck", &request)
            .await
            .map_err(CoachError::ClarificationFailed)?;
        parse_clarification(&body)
    }
}
