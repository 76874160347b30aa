//! # Smart Companion
//!
//! Micro-step task coach for people who find starting hard.
//!
//! A task goes in, an ordered list of small time-boxed steps comes out, and
//! the user walks through them one at a time with a timer, spoken prompts and
//! a "stuck" button that splits the current step into three micro-actions.
//!
//! ## Architecture
//!
//! ```text
//!   companion (terminal)                    smart-companion (HTTP)
//!  ┌─────────────────────────┐            ┌───────────────────────────┐
//!  │ StepSession             │            │ axum router               │
//!  │  ├─ Sanitizer           │  /api/*    │  └─ LlmPlanner            │
//!  │  ├─ HttpPlanner ────────┼───────────▶│      ├─ Sanitizer         │
//!  │  ├─ PreferenceStore ─┐  │            │      └─ GeminiClient ─────┼──▶ Gemini
//!  │  ├─ StreakTracker ───┤  │            └───────────────────────────┘
//!  │  └─ SpeechOutput     │  │
//!  └──────────────────────┼──┘
//!                         ▼
//!                 JsonFileStore ({data_dir}/{key}.json)
//! ```
//!
//! ## Modules
//! - `sanitize`: best-effort PII scrubbing
//! - `coach`: `StepPlanner` trait with HTTP and LLM implementations
//! - `session`: step-progression state machine
//! - `streak`, `preferences`, `storage`: local persisted state
//! - `speech`, `timer`: per-step capabilities
//! - `llm`: Gemini structured-output client
//! - `api`: backend routes

pub mod api;
pub mod coach;
pub mod config;
pub mod error;
pub mod llm;
pub mod preferences;
pub mod sanitize;
pub mod session;
pub mod speech;
pub mod storage;
pub mod streak;
pub mod timer;

pub use coach::{ClarificationResult, HttpPlanner, LlmPlanner, Step, StepPlanner};
pub use config::{ClientConfig, Config};
pub use error::CoachError;
pub use preferences::{PreferenceStore, UserPreferences};
pub use sanitize::{sanitize, Sanitizer};
pub use session::{Phase, StepSession};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use streak::{get_badge, StreakTracker};
