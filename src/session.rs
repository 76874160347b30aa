//! Step-progression state machine.
//!
//! ```text
//!            submit                 success (non-empty)
//!   Idle ───────────────▶ Loading ─────────────────────▶ Active ◀──┐ advance
//!    ▲                      │ failure                     │  │ └────┘ (not last)
//!    │◀─────────────────────┘                             │  │
//!    │◀─────────────── advance on last step ──────────────┘  │ enter_stuck
//!    │                                                        ▼
//!    │                            resolve_continue ◀──── Stuck
//!    └──── (last step) ◀── resolve_skip = advance ◀─────────┘
//! ```
//!
//! Requests run in two phases so a driver can keep handling input while they
//! are in flight: `begin_*` hands out a [`Ticket`] and the request payload,
//! `finish_*` applies the result. A result whose ticket no longer matches the
//! current `Loading`/`Stuck` state is discarded. [`StepSession::submit`] and
//! [`StepSession::enter_stuck`] run both phases back to back.
//!
//! Every change of the active step recreates the step timer and announces the
//! step through the speech output (stopping any announcement in progress).

use std::sync::Arc;

use crate::coach::{ClarificationResult, SharedPlanner, Step};
use crate::error::CoachError;
use crate::preferences::{PreferenceStore, UserPreferences};
use crate::sanitize::Sanitizer;
use crate::speech::SpeechOutput;
use crate::streak::{StreakRecord, StreakTracker};
use crate::timer::MicroTimer;

/// Externally visible state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No active task.
    Idle,
    /// A decomposition request is in flight.
    Loading,
    /// Walking through steps.
    Active,
    /// The stuck panel is open over the active step.
    Stuck,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Loading => write!(f, "loading"),
            Phase::Active => write!(f, "active"),
            Phase::Stuck => write!(f, "stuck"),
        }
    }
}

/// Identifies one in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

/// Steps plus the active index. `active_index` is `None` exactly when
/// `steps` is empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepProgress {
    steps: Vec<Step>,
    active_index: Option<usize>,
}

impl StepProgress {
    fn start(steps: Vec<Step>) -> Self {
        let active_index = if steps.is_empty() { None } else { Some(0) };
        Self {
            steps,
            active_index,
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active_index
    }

    pub fn active_step(&self) -> Option<&Step> {
        self.active_index.and_then(|i| self.steps.get(i))
    }

    /// Whether the index/steps invariant holds.
    pub fn is_valid(&self) -> bool {
        match self.active_index {
            None => self.steps.is_empty(),
            Some(i) => i < self.steps.len(),
        }
    }

    /// `(index + 1) / len`, 0.0 when idle.
    pub fn fraction_complete(&self) -> f64 {
        match self.active_index {
            Some(i) if !self.steps.is_empty() => (i + 1) as f64 / self.steps.len() as f64,
            _ => 0.0,
        }
    }
}

/// Payload for a decomposition started by [`StepSession::begin_submit`].
#[derive(Debug, Clone)]
pub struct PendingDecomposition {
    pub ticket: Ticket,
    /// Sanitized task text.
    pub task: String,
    pub prefs: UserPreferences,
}

/// Payload for a clarification started by [`StepSession::begin_stuck`].
#[derive(Debug, Clone)]
pub struct PendingClarification {
    pub ticket: Ticket,
    pub step_text: String,
}

/// What happened to a request result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    /// The session had moved on; the result was dropped.
    Discarded,
}

/// Outcome of completing a step.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// Moved on to this index.
    Next(usize),
    /// That was the last step; the streak was updated.
    Completed(StreakRecord),
}

#[derive(Debug)]
enum State {
    Idle,
    Loading {
        ticket: Ticket,
    },
    Active,
    Stuck {
        ticket: Ticket,
        clarification: Option<ClarificationResult>,
    },
}

/// One user's focus session.
pub struct StepSession {
    planner: SharedPlanner,
    speech: Arc<dyn SpeechOutput>,
    preferences: PreferenceStore,
    streak: StreakTracker,
    sanitizer: Sanitizer,
    state: State,
    progress: StepProgress,
    task_draft: String,
    timer: Option<MicroTimer>,
    notice: Option<String>,
    next_ticket: u64,
}

impl StepSession {
    pub fn new(
        planner: SharedPlanner,
        speech: Arc<dyn SpeechOutput>,
        preferences: PreferenceStore,
        streak: StreakTracker,
    ) -> Self {
        Self {
            planner,
            speech,
            preferences,
            streak,
            sanitizer: Sanitizer::default(),
            state: State::Idle,
            progress: StepProgress::default(),
            task_draft: String::new(),
            timer: None,
            notice: None,
            next_ticket: 0,
        }
    }

    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Idle => Phase::Idle,
            State::Loading { .. } => Phase::Loading,
            State::Active => Phase::Active,
            State::Stuck { .. } => Phase::Stuck,
        }
    }

    pub fn progress(&self) -> &StepProgress {
        &self.progress
    }

    pub fn active_step(&self) -> Option<&Step> {
        self.progress.active_step()
    }

    /// The next `limit` steps starting at the active one.
    pub fn upcoming(&self, limit: usize) -> &[Step] {
        match self.progress.active_index {
            Some(i) => {
                let end = i.saturating_add(limit).min(self.progress.steps.len());
                &self.progress.steps[i..end]
            }
            None => &[],
        }
    }

    /// Clarification being shown in the stuck panel, once it has arrived.
    pub fn clarification(&self) -> Option<&ClarificationResult> {
        match &self.state {
            State::Stuck { clarification, .. } => clarification.as_ref(),
            _ => None,
        }
    }

    /// Text typed (or dictated) for the next submission.
    pub fn task_draft(&self) -> &str {
        &self.task_draft
    }

    pub fn set_task_draft(&mut self, text: impl Into<String>) {
        self.task_draft = text.into();
    }

    pub fn timer(&self) -> Option<&MicroTimer> {
        self.timer.as_ref()
    }

    pub fn timer_mut(&mut self) -> Option<&mut MicroTimer> {
        self.timer.as_mut()
    }

    /// Pending user-visible notice from the last failed request.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    pub fn streak(&self) -> &StreakTracker {
        &self.streak
    }

    /// Idle → Loading. `task` of `None` submits the current draft.
    pub fn begin_submit(&mut self, task: Option<&str>) -> Result<PendingDecomposition, CoachError> {
        self.require(Phase::Idle, "submit a task")?;

        let raw = task.map(str::to_string).unwrap_or_else(|| self.task_draft.clone());
        if raw.trim().is_empty() {
            return Err(CoachError::Validation(
                "Tell me what you want to do first.".to_string(),
            ));
        }

        let clean = self.sanitizer.sanitize(raw.trim());
        self.task_draft = raw;
        let ticket = self.issue_ticket();
        self.state = State::Loading { ticket };
        tracing::debug!(?ticket, "Decomposition requested");

        Ok(PendingDecomposition {
            ticket,
            task: clean,
            prefs: self.preferences.get(),
        })
    }

    /// Loading → Active(0) on success, Loading → Idle on failure.
    pub fn finish_submit(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<Step>, CoachError>,
    ) -> Result<Applied, CoachError> {
        if !matches!(self.state, State::Loading { ticket: current } if current == ticket) {
            tracing::debug!(?ticket, "Discarding stale decomposition result");
            return Ok(Applied::Discarded);
        }

        match result {
            Ok(steps) if !steps.is_empty() => {
                tracing::info!(steps = steps.len(), "Task decomposed, starting steps");
                self.progress = StepProgress::start(steps);
                self.state = State::Active;
                self.on_step_changed();
                Ok(Applied::Applied)
            }
            Ok(_) => self.fail_loading(CoachError::DecompositionFailed(
                "no steps returned".to_string(),
            )),
            Err(e) => self.fail_loading(e),
        }
    }

    /// Submit and wait for the decomposition.
    pub async fn submit(&mut self, task: Option<&str>) -> Result<(), CoachError> {
        let pending = self.begin_submit(task)?;
        let result = self.planner.decompose(&pending.task, &pending.prefs).await;
        self.finish_submit(pending.ticket, result).map(|_| ())
    }

    /// Complete the active step.
    pub fn advance(&mut self) -> Result<Advance, CoachError> {
        self.require(Phase::Active, "complete a step")?;
        Ok(self.advance_active())
    }

    /// Active → Stuck.
    pub fn begin_stuck(&mut self) -> Result<PendingClarification, CoachError> {
        self.require(Phase::Active, "ask for smaller steps")?;

        let step_text = self
            .progress
            .active_step()
            .map(|s| s.text.clone())
            .unwrap_or_default();
        let ticket = self.issue_ticket();
        self.state = State::Stuck {
            ticket,
            clarification: None,
        };
        tracing::debug!(?ticket, "Clarification requested");

        Ok(PendingClarification { ticket, step_text })
    }

    /// Show the clarification, or fall back to Active on failure.
    pub fn finish_stuck(
        &mut self,
        ticket: Ticket,
        result: Result<ClarificationResult, CoachError>,
    ) -> Result<Applied, CoachError> {
        let waiting = matches!(
            &self.state,
            State::Stuck { ticket: current, clarification: None } if *current == ticket
        );
        if !waiting {
            tracing::debug!(?ticket, "Discarding stale clarification result");
            return Ok(Applied::Discarded);
        }

        match result {
            Ok(clarification) => {
                self.state = State::Stuck {
                    ticket,
                    clarification: Some(clarification),
                };
                Ok(Applied::Applied)
            }
            Err(e) => {
                tracing::warn!("Clarification failed: {}", e);
                self.state = State::Active;
                self.notice = Some(e.notice());
                Err(e)
            }
        }
    }

    /// Open the stuck panel and wait for the clarification.
    pub async fn enter_stuck(&mut self) -> Result<(), CoachError> {
        let pending = self.begin_stuck()?;
        let result = self.planner.clarify(&pending.step_text).await;
        self.finish_stuck(pending.ticket, result).map(|_| ())
    }

    /// Stuck → Active on the same step. Also used to close the panel.
    pub fn resolve_continue(&mut self) -> Result<(), CoachError> {
        self.require(Phase::Stuck, "continue")?;
        self.state = State::Active;
        Ok(())
    }

    /// Stuck → Active, then complete the step as if it were done.
    pub fn resolve_skip(&mut self) -> Result<Advance, CoachError> {
        self.require(Phase::Stuck, "skip")?;
        self.state = State::Active;
        Ok(self.advance_active())
    }

    fn advance_active(&mut self) -> Advance {
        let next = self.progress.active_index.map_or(0, |i| i + 1);
        if next < self.progress.steps.len() {
            self.progress.active_index = Some(next);
            self.on_step_changed();
            return Advance::Next(next);
        }

        let record = self.streak.record_completion();
        tracing::info!(streak = record.count, "Step sequence complete");
        self.state = State::Idle;
        self.progress = StepProgress::default();
        self.task_draft.clear();
        self.timer = None;
        self.speech.stop();
        Advance::Completed(record)
    }

    fn on_step_changed(&mut self) {
        let Some(step) = self.progress.active_step() else {
            return;
        };
        self.timer = Some(MicroTimer::new(step.estimated_minutes));

        let rate = self.preferences.get().energy_level.speech_rate();
        self.speech.stop();
        self.speech.speak(&step.text, rate);
    }

    fn fail_loading(&mut self, error: CoachError) -> Result<Applied, CoachError> {
        tracing::warn!("Decomposition failed: {}", error);
        self.state = State::Idle;
        self.notice = Some(error.notice());
        Err(error)
    }

    fn require(&self, phase: Phase, action: &'static str) -> Result<(), CoachError> {
        let current = self.phase();
        if current == phase {
            Ok(())
        } else {
            Err(CoachError::InvalidTransition {
                action,
                phase: current,
            })
        }
    }

    fn issue_ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        Ticket(self.next_ticket)
    }
}
