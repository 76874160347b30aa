//! companion - terminal front-end.
//!
//! One step on screen at a time, a per-step timer, spoken prompts and an
//! "I'm stuck" panel. Talks to the `smart-companion` backend over HTTP.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use smart_companion::coach::{ClarificationResult, SharedPlanner, Step};
use smart_companion::config::ClientConfig;
use smart_companion::error::CoachError;
use smart_companion::preferences::{PreferenceStore, PreferencesUpdate, UserPreferences};
use smart_companion::session::{Advance, Phase, StepSession, Ticket};
use smart_companion::speech::{
    CommandDictation, CommandSpeech, SilentSpeech, SpeechInput, SpeechOutput,
};
use smart_companion::storage::{JsonFileStore, SharedKeyValueStore};
use smart_companion::streak::{get_badge, StreakTracker};
use smart_companion::HttpPlanner;

/// Results delivered back to the UI loop.
enum UiEvent {
    Decomposed(Ticket, Result<Vec<Step>, CoachError>),
    Clarified(Ticket, Result<ClarificationResult, CoachError>),
    Transcript(String),
    DictationFailed(CoachError),
}

const HELP: &str = "\
  <task>          break a task into steps (or Enter to resubmit the draft)
  voice           dictate a task
  done | d        finish the current step
  stuck | s       ask for smaller steps
  continue | c    keep going on this step (closes the stuck panel)
  skip | k        skip this step
  timer | t       start/pause the timer
  reset           reset the timer
  prefs [k=v..]   show or change preferences (energy, dyslexia, style, steps, voice)
  streak          show the streak
  help            this text
  quit | q        exit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smart_companion=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ClientConfig::from_env()?;

    let kv: SharedKeyValueStore = Arc::new(JsonFileStore::new(config.data_dir.clone()));
    let preferences = PreferenceStore::new(Arc::clone(&kv));
    let streak = StreakTracker::new(Arc::clone(&kv));

    let planner: SharedPlanner = Arc::new(
        HttpPlanner::new(config.api_url.clone(), config.request_timeout)
            .context("Failed to create backend client")?,
    );

    let speech: Arc<dyn SpeechOutput> = match config.tts_command.as_deref() {
        Some(program) => Arc::new(CommandSpeech::new(program)),
        None => Arc::new(SilentSpeech),
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<UiEvent>();

    let mut dictation = CommandDictation::new(config.stt_command.as_deref());
    let result_tx = tx.clone();
    dictation.on_result(Box::new(move |text| {
        let _ = result_tx.send(UiEvent::Transcript(text));
    }));
    let error_tx = tx.clone();
    dictation.on_error(Box::new(move |e| {
        let _ = error_tx.send(UiEvent::DictationFailed(e));
    }));

    let mut session = StepSession::new(Arc::clone(&planner), speech, preferences, streak);

    print_header(&session);
    println!("What are we doing today? (type 'help' for commands)");
    if dictation.is_supported() {
        println!("Say it instead: type 'voice'.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(line.trim(), &mut session, &planner, &mut dictation, &tx) {
                    break;
                }
            }
            Some(event) = rx.recv() => {
                handle_event(event, &mut session, &planner, &tx);
            }
            _ = tick.tick() => {
                if let Some(timer) = session.timer_mut() {
                    if timer.tick() {
                        println!("⏰ Time's up. Done? ('d') Or need a hand? ('s')");
                    }
                }
            }
        }
    }

    dictation.stop_listening();
    println!("See you next time.");
    Ok(())
}

const NO_STEP_YET: &str = "No step yet. Type a task to get started.";
const STILL_THINKING: &str = "Still thinking...";
const FINISH_FIRST: &str = "Finish the current step first ('d'), or 'help'.";
const STUCK_CHOICES: &str = "'c' to keep going on this step, 'k' to skip it.";

/// Words that only mean something while a step is on screen.
const STEP_WORDS: &[&str] = &[
    "done", "d", "stuck", "s", "continue", "c", "skip", "k", "timer", "t", "reset",
];

/// One line of input, read in the context of the current phase.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Quit,
    Help,
    Streak,
    Prefs(String),
    Voice,
    /// Submit this task, or the saved draft when `None`
    Submit(Option<String>),
    Done,
    Stuck,
    Continue,
    Skip,
    ToggleTimer,
    ResetTimer,
    ShowStep,
    Hint(&'static str),
}

/// Commands are a single word (plus arguments for `prefs`). Anything else
/// typed while idle is a task.
fn parse_command(line: &str, phase: Phase) -> Command {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let word = word.to_lowercase();
    let rest = rest.trim();

    if word == "prefs" {
        return Command::Prefs(rest.to_string());
    }
    let single = rest.is_empty();
    if single {
        match word.as_str() {
            "quit" | "q" | "exit" => return Command::Quit,
            "help" | "?" => return Command::Help,
            "streak" => return Command::Streak,
            "voice" => return Command::Voice,
            _ => {}
        }
    }

    match phase {
        Phase::Idle if single && STEP_WORDS.contains(&word.as_str()) => {
            Command::Hint(NO_STEP_YET)
        }
        Phase::Idle if line.is_empty() => Command::Submit(None),
        Phase::Idle => Command::Submit(Some(line.to_string())),
        Phase::Loading => Command::Hint(STILL_THINKING),
        Phase::Active if single => match word.as_str() {
            "done" | "d" => Command::Done,
            "stuck" | "s" => Command::Stuck,
            "timer" | "t" => Command::ToggleTimer,
            "reset" => Command::ResetTimer,
            "" => Command::ShowStep,
            _ => Command::Hint(FINISH_FIRST),
        },
        Phase::Active => Command::Hint(FINISH_FIRST),
        Phase::Stuck if single => match word.as_str() {
            "continue" | "c" => Command::Continue,
            "skip" | "k" => Command::Skip,
            _ => Command::Hint(STUCK_CHOICES),
        },
        Phase::Stuck => Command::Hint(STUCK_CHOICES),
    }
}

/// Returns `false` when the user wants to quit.
fn handle_line(
    line: &str,
    session: &mut StepSession,
    planner: &SharedPlanner,
    dictation: &mut CommandDictation,
    tx: &mpsc::UnboundedSender<UiEvent>,
) -> bool {
    match parse_command(line, session.phase()) {
        Command::Quit => return false,
        Command::Help => println!("{}", HELP),
        Command::Streak => print_header(session),
        Command::Prefs(args) => handle_prefs(&args, session),
        Command::Voice => {
            if dictation.is_listening() {
                println!("🎙  Already listening...");
            } else {
                match dictation.start_listening() {
                    Ok(()) => println!("🎙  Listening..."),
                    Err(e) => println!("{}", e.notice()),
                }
            }
        }
        Command::Submit(task) => {
            if let Some(task) = task {
                session.set_task_draft(task);
            }
            start_decomposition(session, planner, tx);
        }
        Command::Done => report_advance(session.advance(), session),
        Command::Stuck => start_clarification(session, planner, tx),
        Command::Continue => {
            if session.resolve_continue().is_ok() {
                print_active(session);
            }
        }
        Command::Skip => report_advance(session.resolve_skip(), session),
        Command::ToggleTimer => {
            if let Some(timer) = session.timer_mut() {
                timer.toggle();
                let state = if timer.is_running() { "running" } else { "paused" };
                println!("⏱  {} ({})", timer.display(), state);
            }
        }
        Command::ResetTimer => {
            if let Some(timer) = session.timer_mut() {
                timer.reset();
                println!("⏱  {}", timer.display());
            }
        }
        Command::ShowStep => print_active(session),
        Command::Hint(text) => println!("{}", text),
    }
    true
}

fn handle_prefs(args: &str, session: &mut StepSession) {
    if !args.is_empty() {
        match args.parse::<PreferencesUpdate>() {
            Ok(update) => {
                session.preferences().update(&update);
            }
            Err(e) => {
                println!("{}", e);
                return;
            }
        }
    }
    let prefs = session.preferences().get();
    println!(
        "energy={:?} dyslexia={} style={:?} steps={} voice={}",
        prefs.energy_level,
        on_off(prefs.dyslexia_mode),
        prefs.motivation_style,
        prefs.max_steps_visible,
        on_off(prefs.prefers_voice),
    );
}

fn handle_event(
    event: UiEvent,
    session: &mut StepSession,
    planner: &SharedPlanner,
    tx: &mpsc::UnboundedSender<UiEvent>,
) {
    match event {
        UiEvent::Decomposed(ticket, result) => match session.finish_submit(ticket, result) {
            Ok(_) => {
                if session.phase() == Phase::Active {
                    print_active(session);
                }
            }
            Err(_) => {
                if let Some(notice) = session.take_notice() {
                    println!("⚠  {}", notice);
                }
                println!("Press Enter to try \"{}\" again.", session.task_draft());
            }
        },
        UiEvent::Clarified(ticket, result) => match session.finish_stuck(ticket, result) {
            Ok(_) => {
                if let Some(clarification) = session.clarification() {
                    print_clarification(clarification, &session.preferences().get());
                }
            }
            Err(_) => {
                if let Some(notice) = session.take_notice() {
                    println!("⚠  {}", notice);
                }
            }
        },
        UiEvent::Transcript(text) => {
            println!("🎙  \"{}\"", text);
            if session.phase() == Phase::Idle {
                session.set_task_draft(text);
                start_decomposition(session, planner, tx);
            }
        }
        UiEvent::DictationFailed(e) => println!("🎙  {}", e.notice()),
    }
}

fn start_decomposition(
    session: &mut StepSession,
    planner: &SharedPlanner,
    tx: &mpsc::UnboundedSender<UiEvent>,
) {
    match session.begin_submit(None) {
        Ok(pending) => {
            println!("Tailoring steps for your energy...");
            let planner = Arc::clone(planner);
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = planner.decompose(&pending.task, &pending.prefs).await;
                let _ = tx.send(UiEvent::Decomposed(pending.ticket, result));
            });
        }
        Err(e) => println!("{}", e.notice()),
    }
}

fn start_clarification(
    session: &mut StepSession,
    planner: &SharedPlanner,
    tx: &mpsc::UnboundedSender<UiEvent>,
) {
    match session.begin_stuck() {
        Ok(pending) => {
            println!("Let's make it smaller...");
            let planner = Arc::clone(planner);
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = planner.clarify(&pending.step_text).await;
                let _ = tx.send(UiEvent::Clarified(pending.ticket, result));
            });
        }
        Err(e) => println!("{}", e.notice()),
    }
}

fn report_advance(result: Result<Advance, CoachError>, session: &StepSession) {
    match result {
        Ok(Advance::Next(_)) => print_active(session),
        Ok(Advance::Completed(record)) => {
            println!("🎉 All done! Streak: 🔥 {}", record.count);
            if let Some(badge) = get_badge(record.count) {
                println!("   {}", badge.label);
            }
            println!("What's next?");
        }
        Err(e) => println!("{}", e.notice()),
    }
}

fn print_header(session: &StepSession) {
    let record = session.streak().get();
    match get_badge(record.count) {
        Some(badge) => println!("SmartCompanion  🔥 {}  [{}]", record.count, badge.label),
        None => println!("SmartCompanion  🔥 {}", record.count),
    }
}

fn print_active(session: &StepSession) {
    let progress = session.progress();
    let (Some(index), Some(step)) = (progress.active_index(), progress.active_step()) else {
        return;
    };
    let prefs = session.preferences().get();
    let total = progress.steps().len();

    println!();
    println!("{}", progress_bar(progress.fraction_complete(), 24));
    println!("Step {} of {}", index + 1, total);
    println!("▶ {}", spaced(&step.text, &prefs));
    if let Some(timer) = session.timer() {
        println!("⏱  {}  ('t' to start)", timer.display());
    }

    let limit = prefs.max_steps_visible.max(1) as usize;
    for (offset, next) in session.upcoming(limit).iter().enumerate().skip(1) {
        println!("  {}. {}", index + offset + 1, spaced(&next.text, &prefs));
    }
    println!("'d' done · 's' stuck");
}

fn print_clarification(clarification: &ClarificationResult, prefs: &UserPreferences) {
    println!();
    println!("“{}”", spaced(&clarification.encouragement, prefs));
    for (i, action) in clarification.micro_actions.iter().enumerate() {
        println!("  {}. {}", i + 1, spaced(action, prefs));
    }
    println!(
        "'c' {} · 'k' {}",
        clarification.continue_label(),
        clarification.skip_label()
    );
}

/// Wider word spacing in dyslexia mode.
fn spaced(text: &str, prefs: &UserPreferences) -> String {
    if prefs.dyslexia_mode {
        text.split_whitespace().collect::<Vec<_>>().join("   ")
    } else {
        text.to_string()
    }
}

fn progress_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use smart_companion::coach::StepPlanner;
    use smart_companion::speech::SilentSpeech;
    use smart_companion::storage::MemoryStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingPlanner {
        tasks: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StepPlanner for CountingPlanner {
        async fn decompose(
            &self,
            task: &str,
            _prefs: &UserPreferences,
        ) -> Result<Vec<Step>, CoachError> {
            self.tasks.lock().unwrap().push(task.to_string());
            Ok(vec![Step::new("Pick up one thing", 2.0), Step::new("Put it away", 2.0)])
        }

        async fn clarify(&self, _step_text: &str) -> Result<ClarificationResult, CoachError> {
            Err(CoachError::ClarificationFailed("not scripted".to_string()))
        }
    }

    fn session_with(planner: &Arc<CountingPlanner>) -> (StepSession, SharedPlanner) {
        let planner: SharedPlanner = Arc::clone(planner) as SharedPlanner;
        let kv: SharedKeyValueStore = Arc::new(MemoryStore::new());
        let session = StepSession::new(
            Arc::clone(&planner),
            Arc::new(SilentSpeech),
            PreferenceStore::new(Arc::clone(&kv)),
            StreakTracker::new(kv),
        );
        (session, planner)
    }

    #[test]
    fn test_step_words_while_idle_only_hint() {
        for word in ["d", "done", "s", "c", "k", "t", "reset", "SKIP"] {
            assert_eq!(
                parse_command(word, Phase::Idle),
                Command::Hint(NO_STEP_YET),
                "{}",
                word
            );
        }
        assert_eq!(
            parse_command("done with laundry", Phase::Idle),
            Command::Submit(Some("done with laundry".to_string()))
        );
        assert_eq!(parse_command("  ", Phase::Idle), Command::Submit(None));
    }

    #[test]
    fn test_global_commands_are_single_words() {
        assert_eq!(parse_command("Q", Phase::Active), Command::Quit);
        assert_eq!(parse_command("help", Phase::Stuck), Command::Help);
        assert_eq!(parse_command("voice", Phase::Idle), Command::Voice);
        assert_eq!(
            parse_command("help me plan a party", Phase::Idle),
            Command::Submit(Some("help me plan a party".to_string()))
        );
        assert_eq!(
            parse_command("prefs energy=low  steps=2", Phase::Loading),
            Command::Prefs("energy=low  steps=2".to_string())
        );
    }

    #[test]
    fn test_commands_by_phase() {
        assert_eq!(parse_command("d", Phase::Active), Command::Done);
        assert_eq!(parse_command("stuck", Phase::Active), Command::Stuck);
        assert_eq!(parse_command("t", Phase::Active), Command::ToggleTimer);
        assert_eq!(parse_command("reset", Phase::Active), Command::ResetTimer);
        assert_eq!(parse_command("", Phase::Active), Command::ShowStep);
        assert_eq!(parse_command("k", Phase::Active), Command::Hint(FINISH_FIRST));
        assert_eq!(parse_command("d", Phase::Loading), Command::Hint(STILL_THINKING));
        assert_eq!(parse_command("c", Phase::Stuck), Command::Continue);
        assert_eq!(parse_command("skip", Phase::Stuck), Command::Skip);
        assert_eq!(parse_command("d", Phase::Stuck), Command::Hint(STUCK_CHOICES));
    }

    #[tokio::test]
    async fn test_done_at_idle_prompt_does_not_submit() {
        let counting = Arc::new(CountingPlanner::default());
        let (mut session, planner) = session_with(&counting);
        let mut dictation = CommandDictation::new(None);
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(handle_line("d", &mut session, &planner, &mut dictation, &tx));

        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.task_draft(), "");
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
        assert!(counting.tasks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_task_line_runs_through_to_first_step() {
        let counting = Arc::new(CountingPlanner::default());
        let (mut session, planner) = session_with(&counting);
        let mut dictation = CommandDictation::new(None);
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(handle_line(
            "clean my room",
            &mut session,
            &planner,
            &mut dictation,
            &tx
        ));
        assert_eq!(session.phase(), Phase::Loading);

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        handle_event(event, &mut session, &planner, &tx);

        assert_eq!(session.phase(), Phase::Active);
        assert_eq!(
            *counting.tasks.lock().unwrap(),
            vec!["Clean a personal room".to_string()]
        );

        assert!(handle_line("d", &mut session, &planner, &mut dictation, &tx));
        assert_eq!(session.progress().active_index(), Some(1));
        assert!(!handle_line("quit", &mut session, &planner, &mut dictation, &tx));
    }
}
