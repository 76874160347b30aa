//! Drives a `StepSession` through the real HTTP backend, with a scripted
//! model standing in for Gemini.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use smart_companion::api::{self, AppState};
use smart_companion::coach::HttpPlanner;
use smart_companion::error::CoachError;
use smart_companion::llm::{LlmClient, LlmError, StructuredRequest};
use smart_companion::preferences::PreferenceStore;
use smart_companion::session::{Advance, Phase, StepSession};
use smart_companion::speech::SilentSpeech;
use smart_companion::storage::{JsonFileStore, KeyValueStore, MemoryStore, STREAK_DATA_KEY};
use smart_companion::streak::StreakTracker;
use smart_companion::Sanitizer;

struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(responses: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LlmClient for ScriptedModel {
    async fn generate_json(&self, request: StructuredRequest) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(request.prompt);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::server_error(500, "script exhausted".to_string())))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

async fn spawn_backend(model: Arc<ScriptedModel>) -> SocketAddr {
    let state = Arc::new(AppState::with_llm(model, Sanitizer::default()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, api::router(state)).await.unwrap();
    });
    addr
}

fn session_against(addr: SocketAddr, kv: Arc<dyn KeyValueStore>) -> (StepSession, Arc<AtomicUsize>) {
    let planner = HttpPlanner::new(format!("http://{}", addr), Duration::from_secs(5)).unwrap();
    let completions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&completions);
    let streak = StreakTracker::with_clock(
        Arc::clone(&kv),
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
        }),
    );
    let session = StepSession::new(
        Arc::new(planner),
        Arc::new(SilentSpeech),
        PreferenceStore::new(kv),
        streak,
    );
    (session, completions)
}

const FOUR_STEPS: &str = r#"{"steps":[
    {"step":"Open the job description","time":2},
    {"step":"Write three strengths","time":5},
    {"step":"Pick an outfit","time":3},
    {"step":"Set an alarm","time":1}
]}"#;

const CLARIFICATION: &str = r#"{
    "smallerSteps":["Grab a pen","Open a blank note","Write one word"],
    "options":["Continue for 2 minutes","Skip this step"],
    "encouragement":"Small is still moving."
}"#;

#[tokio::test]
async fn test_full_flow_over_http() {
    let model = ScriptedModel::new(vec![
        Ok(FOUR_STEPS.to_string()),
        Ok(CLARIFICATION.to_string()),
    ]);
    let addr = spawn_backend(Arc::clone(&model)).await;
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let (mut session, completions) = session_against(addr, Arc::clone(&kv));

    session
        .submit(Some("Prep for the interview with Priya"))
        .await
        .unwrap();
    assert_eq!(session.phase(), Phase::Active);
    assert_eq!(session.progress().steps().len(), 4);
    assert!(!model.prompts.lock().unwrap()[0].contains("Priya"));

    session.advance().unwrap();
    session.enter_stuck().await.unwrap();
    let clarification = session.clarification().unwrap();
    assert_eq!(clarification.micro_actions.len(), 3);
    assert_eq!(clarification.skip_label(), "Skip this step");

    assert_eq!(session.resolve_skip().unwrap(), Advance::Next(2));
    assert_eq!(session.advance().unwrap(), Advance::Next(3));
    let Advance::Completed(record) = session.advance().unwrap() else {
        panic!("expected completion");
    };

    assert_eq!(record.count, 1);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(session.phase(), Phase::Idle);
    assert!(kv.get(STREAK_DATA_KEY).unwrap().contains("2026-06-01"));
}

#[tokio::test]
async fn test_provider_failure_surfaces_as_decomposition_failure() {
    let model = ScriptedModel::new(vec![Err(LlmError::rate_limited("quota".to_string()))]);
    let addr = spawn_backend(model).await;
    let (mut session, _) = session_against(addr, Arc::new(MemoryStore::new()));

    let err = session.submit(Some("Do taxes")).await.unwrap_err();
    match err {
        CoachError::DecompositionFailed(detail) => {
            assert!(detail.contains("500"), "{}", detail);
            assert!(detail.contains("Failed to break down task."), "{}", detail);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(session.task_draft(), "Do taxes");
}

#[tokio::test]
async fn test_validation_and_health_endpoints() {
    let model = ScriptedModel::new(vec![]);
    let addr = spawn_backend(Arc::clone(&model)).await;
    let client = reqwest::Client::new();

    let health: serde_json::Value = client
        .get(format!("http://{}/api/health", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["model"], "scripted");

    for body in [serde_json::json!({"task": ""}), serde_json::json!({})] {
        let response = client
            .post(format!("http://{}/api/decompose", addr))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["error"].is_string());
    }

    let response = client
        .post(format!("http://{}/api/stuck", addr))
        .json(&serde_json::json!({"currentStepText": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    assert!(model.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_streak_persists_across_file_store_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![Ok(r#"{"steps":[{"step":"Drink water","time":1}]}"#
        .to_string())]);
    let addr = spawn_backend(model).await;

    {
        let kv: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(dir.path()));
        let (mut session, _) = session_against(addr, kv);
        session.submit(Some("Hydrate")).await.unwrap();
        assert!(matches!(session.advance().unwrap(), Advance::Completed(_)));
    }

    let reopened: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(dir.path()));
    let streak = StreakTracker::new(reopened).get();
    assert_eq!(streak.count, 1);
    assert_eq!(streak.last_completion_date, NaiveDate::from_ymd_opt(2026, 6, 1));
}
