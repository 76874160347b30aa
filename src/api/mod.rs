//! HTTP API for the Smart Companion backend.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `POST /api/decompose` - Break a task into micro-steps
//! - `POST /api/stuck` - Split the current step into three micro-actions

mod routes;
pub mod types;

pub use routes::{router, serve, AppState};
pub use types::*;
