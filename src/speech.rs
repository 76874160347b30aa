//! Voice capabilities: step announcements and dictated task input.
//!
//! Both are injectable so the session never talks to a platform speech engine
//! directly. The production backends shell out to command-line tools; when the
//! tool is missing the capability reports itself unsupported and the feature
//! is hidden instead of failing the flow.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::error::CoachError;

/// Words per minute at rate 1.0 (espeak's default speed).
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// Text-to-speech output.
pub trait SpeechOutput: Send + Sync {
    fn is_supported(&self) -> bool;

    /// Speak `text` at `rate` (1.0 = normal). Fire-and-forget.
    fn speak(&self, text: &str, rate: f32);

    /// Cancel whatever is being spoken.
    fn stop(&self);
}

pub type ResultCallback = Box<dyn FnMut(String) + Send>;
pub type ErrorCallback = Box<dyn FnMut(CoachError) + Send>;

/// Speech-to-text input.
pub trait SpeechInput: Send {
    fn is_supported(&self) -> bool;

    /// Begin capturing one phrase. The transcript arrives via `on_result`.
    fn start_listening(&mut self) -> Result<(), CoachError>;

    fn stop_listening(&mut self);

    fn on_result(&mut self, callback: ResultCallback);

    fn on_error(&mut self, callback: ErrorCallback);
}

/// Output that never speaks.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSpeech;

impl SpeechOutput for SilentSpeech {
    fn is_supported(&self) -> bool {
        false
    }

    fn speak(&self, _text: &str, _rate: f32) {}

    fn stop(&self) {}
}

/// Speaks through an espeak-compatible program (`<program> -s <wpm> <text>`).
///
/// Each utterance runs on a runtime task that waits on the child, so a
/// finished program is reaped straight away. Dropping the cancel sender kills
/// the child.
pub struct CommandSpeech {
    program: Option<PathBuf>,
    current: Mutex<Option<oneshot::Sender<()>>>,
}

impl CommandSpeech {
    /// Look `program` up on `PATH`; unsupported when it is not installed.
    pub fn new(program: &str) -> Self {
        let program_path = find_in_path(program);
        if program_path.is_none() {
            tracing::warn!("Speech output disabled: {} not found on PATH", program);
        }
        Self {
            program: program_path,
            current: Mutex::new(None),
        }
    }
}

impl SpeechOutput for CommandSpeech {
    fn is_supported(&self) -> bool {
        self.program.is_some()
    }

    fn speak(&self, text: &str, rate: f32) {
        self.stop();

        let Some(program) = &self.program else {
            return;
        };
        if text.trim().is_empty() {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("Speech output needs an async runtime");
            return;
        };

        let wpm = (BASE_WORDS_PER_MINUTE * rate).round().max(80.0) as u32;
        let spawned = {
            let _guard = runtime.enter();
            tokio::process::Command::new(program)
                .arg("-s")
                .arg(wpm.to_string())
                .arg(text)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
        };

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!("Failed to start {}: {}", program.display(), e);
                return;
            }
        };

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        runtime.spawn(async move {
            let cancelled = tokio::select! {
                status = child.wait() => {
                    if let Err(e) = status {
                        tracing::debug!("Speech program wait failed: {}", e);
                    }
                    false
                }
                _ = cancel_rx => true,
            };
            if cancelled {
                let _ = child.kill().await;
            }
        });

        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = Some(cancel_tx);
    }

    fn stop(&self) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cancel) = current.take() {
            let _ = cancel.send(());
        }
    }
}

#[cfg(test)]
impl CommandSpeech {
    fn is_speaking(&self) -> bool {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.as_ref().is_some_and(|cancel| !cancel.is_closed())
    }
}

impl Drop for CommandSpeech {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Dictation through a speech-to-text program that records one phrase and
/// prints the transcript on stdout.
pub struct CommandDictation {
    program: Option<PathBuf>,
    on_result: Arc<Mutex<Option<ResultCallback>>>,
    on_error: Arc<Mutex<Option<ErrorCallback>>>,
    listening: Option<tokio::task::JoinHandle<()>>,
}

impl CommandDictation {
    /// `program` of `None` means dictation is not configured.
    pub fn new(program: Option<&str>) -> Self {
        let program_path = program.and_then(find_in_path);
        if let (Some(program), None) = (program, &program_path) {
            tracing::warn!("Voice input disabled: {} not found on PATH", program);
        }
        Self {
            program: program_path,
            on_result: Arc::new(Mutex::new(None)),
            on_error: Arc::new(Mutex::new(None)),
            listening: None,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl SpeechInput for CommandDictation {
    fn is_supported(&self) -> bool {
        self.program.is_some()
    }

    fn start_listening(&mut self) -> Result<(), CoachError> {
        let Some(program) = self.program.clone() else {
            return Err(CoachError::UnsupportedCapability(
                "Voice input is not available here.".to_string(),
            ));
        };
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            CoachError::UnsupportedCapability("Voice input needs an async runtime.".to_string())
        })?;

        self.stop_listening();

        let on_result = Arc::clone(&self.on_result);
        let on_error = Arc::clone(&self.on_error);
        self.listening = Some(runtime.spawn(async move {
            let output = tokio::process::Command::new(&program)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output()
                .await;

            let outcome = match output {
                Ok(out) if out.status.success() => {
                    let transcript = String::from_utf8_lossy(&out.stdout).trim().to_string();
                    if transcript.is_empty() {
                        Err("no speech detected".to_string())
                    } else {
                        Ok(transcript)
                    }
                }
                Ok(out) => Err(format!("{} exited with {}", program.display(), out.status)),
                Err(e) => Err(format!("failed to run {}: {}", program.display(), e)),
            };

            match outcome {
                Ok(transcript) => {
                    let mut callback = on_result.lock().unwrap_or_else(|e| e.into_inner());
                    if let Some(callback) = callback.as_mut() {
                        callback(transcript);
                    }
                }
                Err(message) => {
                    tracing::warn!("Dictation failed: {}", message);
                    let mut callback = on_error.lock().unwrap_or_else(|e| e.into_inner());
                    if let Some(callback) = callback.as_mut() {
                        callback(CoachError::UnsupportedCapability(message));
                    }
                }
            }
        }));
        Ok(())
    }

    fn stop_listening(&mut self) {
        if let Some(handle) = self.listening.take() {
            handle.abort();
        }
    }

    fn on_result(&mut self, callback: ResultCallback) {
        *self.on_result.lock().unwrap_or_else(|e| e.into_inner()) = Some(callback);
    }

    fn on_error(&mut self, callback: ErrorCallback) {
        *self.on_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(callback);
    }
}

/// Resolve `program` to an executable path, searching `PATH` for bare names.
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let program = program.trim();
    if program.is_empty() {
        return None;
    }
    if program.contains(std::path::MAIN_SEPARATOR) {
        let path = Path::new(program);
        return path.is_file().then(|| path.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
pub(crate) mod stub {
    //! Recording speech output for tests.

    use super::SpeechOutput;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum SpeechCall {
        Speak(String, f32),
        Stop,
    }

    #[derive(Debug, Default)]
    pub struct RecordingSpeech {
        calls: Mutex<Vec<SpeechCall>>,
    }

    impl RecordingSpeech {
        pub fn calls(&self) -> Vec<SpeechCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn spoken(&self) -> Vec<(String, f32)> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    SpeechCall::Speak(text, rate) => Some((text, rate)),
                    SpeechCall::Stop => None,
                })
                .collect()
        }
    }

    impl SpeechOutput for RecordingSpeech {
        fn is_supported(&self) -> bool {
            true
        }

        fn speak(&self, text: &str, rate: f32) {
            self.calls
                .lock()
                .unwrap()
                .push(SpeechCall::Speak(text.to_string(), rate));
        }

        fn stop(&self) {
            self.calls.lock().unwrap().push(SpeechCall::Stop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_missing_program_is_unsupported() {
        let speech = CommandSpeech::new("definitely-not-a-real-tts-binary");
        assert!(!speech.is_supported());
        speech.speak("hello", 1.0);
        speech.stop();
    }

    #[test]
    fn test_dictation_unconfigured() {
        let mut dictation = CommandDictation::new(None);
        assert!(!dictation.is_supported());
        assert!(matches!(
            dictation.start_listening(),
            Err(CoachError::UnsupportedCapability(_))
        ));
    }

    #[test]
    fn test_find_in_path_rejects_empty() {
        assert_eq!(find_in_path("  "), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dictation_delivers_transcript() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let script = temp_dir.path().join("fake-stt");
        std::fs::write(&script, "#!/bin/sh\necho '  clean my room  '\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut dictation = CommandDictation::new(script.to_str());
        assert!(dictation.is_supported());

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        dictation.on_result(Box::new(move |text| {
            let _ = tx.send(text);
        }));
        dictation.start_listening().unwrap();
        assert!(dictation.is_listening());

        let transcript = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(transcript, "clean my room");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_finished_speech_program_is_reaped() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let script = temp_dir.path().join("fake-tts");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let speech = CommandSpeech::new(script.to_str().unwrap());
        assert!(speech.is_supported());

        speech.speak("Open the laptop", 1.0);
        assert!(speech.is_speaking());

        tokio::time::timeout(Duration::from_secs(5), async {
            while speech.is_speaking() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_cancels_running_speech() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let script = temp_dir.path().join("slow-tts");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let speech = CommandSpeech::new(script.to_str().unwrap());
        speech.speak("Write one line", 1.0);
        assert!(speech.is_speaking());
        speech.stop();
        assert!(!speech.is_speaking());
    }
}
