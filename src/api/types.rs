//! API request and response types.
//!
//! Request bodies are shared with the HTTP planner and live in
//! [`crate::coach`]; this file only holds server-side responses.

use serde::{Deserialize, Serialize};

pub use crate::coach::{ClarificationResult, DecomposeRequest, DecomposeResponse, StuckRequest};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Model the backend forwards to
    pub model: String,
}

/// Body of every non-200 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
