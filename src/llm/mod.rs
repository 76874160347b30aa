//! LLM client module for schema-constrained text generation.
//!
//! The coach only ever needs one thing from a model: a JSON document shaped
//! by a response schema. This module provides a trait-based abstraction over
//! that, with Google Gemini as the primary implementation.

mod error;
mod gemini;

pub use error::{classify_http_status, LlmError, LlmErrorKind};
pub use gemini::{GeminiClient, GeminiClientConfig, DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL};

use async_trait::async_trait;

/// A single-turn request whose answer must be JSON matching `schema`.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    /// The full user prompt.
    pub prompt: String,
    /// Response schema (Gemini/OpenAPI subset).
    pub schema: serde_json::Value,
}

impl StructuredRequest {
    pub fn new(prompt: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            prompt: prompt.into(),
            schema,
        }
    }
}

/// Trait for LLM clients.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one structured-output request and return the raw JSON text.
    ///
    /// Exactly one upstream request is made; callers decide about retries.
    async fn generate_json(&self, request: StructuredRequest) -> Result<String, LlmError>;

    /// Model identifier, for logs and health output.
    fn model(&self) -> &str;
}

#[cfg(test)]
pub(crate) mod stub {
    //! Canned LLM for planner and API tests.

    use super::*;
    use std::sync::Mutex;

    pub struct CannedLlm {
        responses: Mutex<Vec<Result<String, LlmError>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl CannedLlm {
        /// Responses are returned in order.
        pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            let mut responses = responses;
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn generate_json(&self, request: StructuredRequest) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(request.prompt);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(LlmError::server_error(500, "no canned response".into())))
        }

        fn model(&self) -> &str {
            "canned"
        }
    }
}
