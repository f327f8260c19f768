//! On-device engine that runs an external synthesizer process.
//!
//! Each utterance is one child process (`espeak-ng` by default) that speaks
//! the paragraph on the default audio device and exits. On Unix the child
//! leads its own process group, so pause, resume and cancel reach every
//! process a wrapper script starts. The process gives no word timing, so this
//! engine reports no word boundaries and the controller estimates them.

use super::VoiceParams;
use super::local::{EngineCallback, EngineEvent, EngineFailure, SpeechEngine};
use crate::config::LocalConfig;
use crate::defaults;
use crate::error::{ReadAloudError, Result};
use std::io::Read;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// Engine backed by a synthesizer command line.
pub struct CommandEngine {
    program: String,
    voice: String,
    words_per_minute: u32,
    current: Option<RunningUtterance>,
    /// Cancelled utterances whose process has not been reaped yet.
    draining: Vec<RunningUtterance>,
    paused: bool,
}

/// State shared between the engine and the thread waiting on the child.
struct RunningUtterance {
    child: Arc<Mutex<Child>>,
    pid: u32,
    running: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl RunningUtterance {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Send `signal` to the process group led by `pid`.
#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) -> std::io::Result<()> {
    // SAFETY: kill has no memory-safety preconditions. The group is led by a
    // child we spawned with `process_group(0)`; once every member is gone
    // kill fails with ESRCH.
    let rc = unsafe { libc::kill(-(pid as libc::pid_t), signal) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

impl CommandEngine {
    pub fn new(config: &LocalConfig) -> Self {
        Self {
            program: config.command.clone(),
            voice: config.voice.clone(),
            words_per_minute: config.words_per_minute,
            current: None,
            draining: Vec::new(),
            paused: false,
        }
    }

    /// Arguments for an espeak-compatible synthesizer.
    pub fn arguments(&self, text: &str, voice: &VoiceParams) -> Vec<String> {
        let voice_name = if voice.voice.is_empty() {
            self.voice.clone()
        } else {
            voice.voice.clone()
        };
        let rate = (self.words_per_minute as f32 * voice.speed).round().max(80.0) as u32;
        // espeak pitch is 0-99 with 50 as default; amplitude 0-200 with 100 as default.
        let pitch = (voice.pitch * 50.0).round().clamp(0.0, 99.0) as u32;
        let amplitude = (voice.volume * 100.0).round().clamp(0.0, 200.0) as u32;

        vec![
            "-v".to_string(),
            voice_name,
            "-s".to_string(),
            rate.to_string(),
            "-p".to_string(),
            pitch.to_string(),
            "-a".to_string(),
            amplitude.to_string(),
            "--".to_string(),
            text.to_string(),
        ]
    }

    #[cfg(unix)]
    fn signal(&self, signal: libc::c_int) -> Result<()> {
        let Some(current) = self.current.as_ref() else {
            return Ok(());
        };
        signal_group(current.pid, signal).map_err(|e| ReadAloudError::Engine {
            message: format!(
                "failed to signal {} (pid {}): {}",
                self.program, current.pid, e
            ),
        })
    }

    /// Spawn `command` as the current utterance and watch it on a waiter
    /// thread that reports how it ended.
    fn start(&mut self, mut command: Command, mut on_event: EngineCallback) -> Result<()> {
        self.cancel();
        self.draining.retain(RunningUtterance::is_running);

        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ReadAloudError::EngineNotFound {
                    engine: self.program.clone(),
                }
            } else {
                ReadAloudError::Engine {
                    message: format!("failed to start {}: {}", self.program, e),
                }
            }
        })?;

        let pid = child.id();
        let child = Arc::new(Mutex::new(child));
        let running = Arc::new(AtomicBool::new(true));
        let cancelled = Arc::new(AtomicBool::new(false));

        on_event(EngineEvent::Started);

        let waiter_child = child.clone();
        let waiter_running = running.clone();
        let waiter_cancelled = cancelled.clone();
        let program = self.program.clone();
        thread::spawn(move || {
            let poll_interval = Duration::from_millis(defaults::FRAME_INTERVAL_MS);
            let event = loop {
                let status = waiter_child
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .try_wait();
                match status {
                    Ok(Some(_)) if waiter_cancelled.load(Ordering::SeqCst) => {
                        break EngineEvent::Failed(EngineFailure::Canceled);
                    }
                    Ok(Some(status)) if status.success() => break EngineEvent::Finished,
                    Ok(Some(status)) => {
                        let stderr = read_stderr(&waiter_child);
                        break EngineEvent::Failed(EngineFailure::SynthesisFailed(format!(
                            "{program} exited with {status}: {stderr}"
                        )));
                    }
                    Ok(None) => thread::sleep(poll_interval),
                    Err(e) => {
                        break EngineEvent::Failed(EngineFailure::Other(format!(
                            "failed to wait for {program}: {e}"
                        )));
                    }
                }
            };
            waiter_running.store(false, Ordering::SeqCst);
            on_event(event);
        });

        self.current = Some(RunningUtterance {
            child,
            pid,
            running,
            cancelled,
        });
        self.paused = false;
        Ok(())
    }

    #[cfg(unix)]
    fn kill(&self, utterance: &RunningUtterance) {
        if let Err(e) = signal_group(utterance.pid, libc::SIGKILL)
            && e.raw_os_error() != Some(libc::ESRCH)
        {
            eprintln!("readaloud: failed to stop {}: {e}", self.program);
        }
    }

    #[cfg(not(unix))]
    fn kill(&self, utterance: &RunningUtterance) {
        let mut child = utterance.child.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = child.kill()
            && e.kind() != std::io::ErrorKind::InvalidInput
        {
            eprintln!("readaloud: failed to stop {}: {e}", self.program);
        }
    }
}

impl SpeechEngine for CommandEngine {
    fn name(&self) -> &'static str {
        "command-engine"
    }

    fn supports_word_boundaries(&self) -> bool {
        false
    }

    fn speak(&mut self, text: &str, voice: &VoiceParams, on_event: EngineCallback) -> Result<()> {
        let mut command = Command::new(&self.program);
        command.args(self.arguments(text, voice));
        self.start(command, on_event)
    }

    #[cfg(unix)]
    fn pause(&mut self) -> Result<()> {
        self.signal(libc::SIGSTOP)?;
        self.paused = true;
        Ok(())
    }

    #[cfg(not(unix))]
    fn pause(&mut self) -> Result<()> {
        Err(ReadAloudError::Engine {
            message: "pausing an external synthesizer is only supported on Unix".to_string(),
        })
    }

    #[cfg(unix)]
    fn resume(&mut self) -> Result<()> {
        self.signal(libc::SIGCONT)?;
        self.paused = false;
        Ok(())
    }

    #[cfg(not(unix))]
    fn resume(&mut self) -> Result<()> {
        Ok(())
    }

    /// Kill the current utterance. It keeps counting as speaking until the
    /// waiter has reaped the process.
    fn cancel(&mut self) {
        let Some(current) = self.current.take() else {
            return;
        };
        current.cancelled.store(true, Ordering::SeqCst);

        #[cfg(unix)]
        {
            if self.paused
                && let Err(e) = signal_group(current.pid, libc::SIGCONT)
                && e.raw_os_error() != Some(libc::ESRCH)
            {
                // A stopped process only dies once continued.
                eprintln!("readaloud: failed to continue {}: {e}", self.program);
            }
        }
        self.paused = false;

        if current.is_running() {
            self.kill(&current);
            self.draining.push(current);
        }
    }

    fn is_speaking(&self) -> bool {
        self.current
            .iter()
            .chain(self.draining.iter())
            .any(RunningUtterance::is_running)
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

impl Drop for CommandEngine {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn read_stderr(child: &Arc<Mutex<Child>>) -> String {
    let mut child = child.lock().unwrap_or_else(PoisonError::into_inner);
    let mut message = String::new();
    if let Some(stderr) = child.stderr.as_mut()
        && stderr.read_to_string(&mut message).is_err()
    {
        return String::new();
    }
    message.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel as channel;
    use std::time::Instant;

    fn engine(program: &str) -> CommandEngine {
        CommandEngine::new(&LocalConfig {
            command: program.to_string(),
            ..LocalConfig::default()
        })
    }

    #[test]
    fn test_arguments_follow_voice_params() {
        let engine = engine("espeak-ng");
        let voice = VoiceParams {
            voice: String::new(),
            speed: 2.0,
            pitch: 1.0,
            volume: 0.5,
        };
        let args = engine.arguments("Hello there", &voice);
        assert_eq!(
            args,
            vec!["-v", "en", "-s", "350", "-p", "50", "-a", "50", "--", "Hello there"]
        );
    }

    #[test]
    fn test_voice_param_overrides_config_voice() {
        let engine = engine("espeak-ng");
        let voice = VoiceParams {
            voice: "de".to_string(),
            ..VoiceParams::default()
        };
        let args = engine.arguments("Hallo", &voice);
        assert_eq!(args[1], "de");
    }

    #[test]
    fn test_rate_has_lower_bound() {
        let engine = engine("espeak-ng");
        let voice = VoiceParams {
            speed: 0.25,
            ..VoiceParams::default()
        };
        let args = engine.arguments("slow", &voice);
        assert_eq!(args[3], "80");
    }

    #[test]
    fn test_missing_program_is_engine_not_found() {
        let mut engine = engine("readaloud-no-such-synthesizer");
        let result = engine.speak("text", &VoiceParams::default(), Box::new(|_| {}));
        assert!(matches!(
            result,
            Err(ReadAloudError::EngineNotFound { .. })
        ));
        assert!(!engine.is_speaking());
    }

    #[test]
    fn test_idle_engine_controls_are_noops() {
        let mut engine = engine("espeak-ng");
        engine.cancel();
        assert!(!engine.is_speaking());
        assert!(!engine.is_paused());
    }

    #[cfg(unix)]
    #[test]
    fn test_process_exit_reports_finished() {
        // `true` ignores its arguments and exits successfully.
        let mut engine = engine("true");
        let (tx, rx) = channel::unbounded();
        engine
            .speak(
                "text",
                &VoiceParams::default(),
                Box::new(move |event| {
                    let _ = tx.send(event);
                }),
            )
            .unwrap();

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            EngineEvent::Started
        );
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            EngineEvent::Finished
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_process_is_recoverable_failure() {
        let mut engine = engine("false");
        let (tx, rx) = channel::unbounded();
        engine
            .speak(
                "text",
                &VoiceParams::default(),
                Box::new(move |event| {
                    let _ = tx.send(event);
                }),
            )
            .unwrap();

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            EngineEvent::Started
        );
        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            EngineEvent::Failed(EngineFailure::SynthesisFailed(msg)) => {
                assert!(msg.contains("false"), "unexpected message: {msg}");
            }
            other => panic!("Expected SynthesisFailed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    fn start_script(engine: &mut CommandEngine, script: &str) -> channel::Receiver<EngineEvent> {
        let (tx, rx) = channel::unbounded();
        let mut command = Command::new("sh");
        command.args(["-c", script]);
        engine
            .start(
                command,
                Box::new(move |event| {
                    let _ = tx.send(event);
                }),
            )
            .unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            EngineEvent::Started
        );
        rx
    }

    #[cfg(unix)]
    #[test]
    fn test_cancel_paused_process_reports_canceled() {
        let mut engine = engine("sh");
        let rx = start_script(&mut engine, "sleep 30");

        assert!(engine.is_speaking());
        engine.pause().unwrap();
        assert!(engine.is_paused());
        engine.cancel();
        assert!(!engine.is_paused());

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            EngineEvent::Failed(EngineFailure::Canceled)
        );
        assert!(!engine.is_speaking());
    }

    #[cfg(target_os = "linux")]
    fn is_alive(pid: u32) -> bool {
        // A zombie has exited and only waits for its parent to reap it.
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .is_some_and(|(_, rest)| !rest.trim_start().starts_with('Z')),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_cancel_keeps_speaking_until_reaped_and_kills_group() {
        let dir = tempfile::TempDir::new().unwrap();
        let pid_file = dir.path().join("grandchild.pid");
        let mut engine = engine("sh");
        let rx = start_script(
            &mut engine,
            &format!("sleep 30 & echo $! > '{}'; wait", pid_file.display()),
        );

        let deadline = Instant::now() + Duration::from_secs(5);
        let grandchild = loop {
            if let Ok(pid) = std::fs::read_to_string(&pid_file)
                .unwrap_or_default()
                .trim()
                .parse::<u32>()
            {
                break pid;
            }
            assert!(Instant::now() < deadline, "script never wrote its pid");
            thread::sleep(Duration::from_millis(10));
        };

        // Holding the child keeps the waiter from reaping it.
        let child = engine.current.as_ref().unwrap().child.clone();
        let guard = child.lock().unwrap();
        engine.cancel();
        assert!(engine.is_speaking());
        drop(guard);

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            EngineEvent::Failed(EngineFailure::Canceled)
        );
        assert!(!engine.is_speaking());

        let deadline = Instant::now() + Duration::from_secs(5);
        while is_alive(grandchild) {
            assert!(Instant::now() < deadline, "sleep {grandchild} survived cancel");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_speak_after_cancel_prunes_reaped_utterances() {
        let mut engine = engine("sh");
        let rx = start_script(&mut engine, "sleep 30");
        engine.cancel();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            EngineEvent::Failed(EngineFailure::Canceled)
        );

        let _rx = start_script(&mut engine, "exit 0");
        assert_eq!(engine.draining.len(), 0);
    }
}
