//! Read-aloud application entry points.
//!
//! Wires the configuration, the selected speech service and the terminal
//! host into a [`PlaybackController`], and feeds it keyboard commands.

use crate::backend::ServiceBackends;
use crate::config::{Config, SpeechService};
use crate::error::{ReadAloudError, Result};
use crate::playback::{Command, DocumentHost, PlaybackController, PlayerEvent};
use crate::report::{ErrorReporter, LogReporter};
use crate::terminal::{TerminalHost, describe_event};
use crate::text::{Paragraph, Word, clean_document, segment_paragraphs, segment_words};
use crossbeam_channel::{Receiver, Sender};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::io::{BufRead, IsTerminal, Read};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub service: Option<SpeechService>,
    pub voice: Option<String>,
    pub speed: Option<f32>,
    pub timeout: Option<Duration>,
}

impl Overrides {
    pub fn apply(self, config: &mut Config) {
        if let Some(service) = self.service {
            config.voice.service = service;
        }
        // After the service, so the voice lands on the service actually used.
        if let Some(voice) = self.voice {
            config.set_service_voice(voice);
        }
        if let Some(speed) = self.speed {
            config.voice.speed = speed;
        }
        if let Some(timeout) = self.timeout {
            let secs = timeout.as_secs();
            config.remote.request_timeout_secs = if secs == 0 && !timeout.is_zero() {
                1
            } else {
                secs
            };
        }
    }
}

/// Read the document from `file`, or from stdin when no file is given.
pub fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

/// Map one typed character to a playback command.
pub fn parse_key(key: char) -> Option<Command> {
    match key {
        'n' | 'N' => Some(Command::Next),
        'p' | 'P' => Some(Command::Previous),
        ' ' | '.' => Some(Command::TogglePause),
        's' | 'S' | 'q' | 'Q' => Some(Command::Stop),
        _ => None,
    }
}

/// Forward commands typed on stdin until it closes.
fn spawn_command_reader(tx: Sender<Command>) {
    let spawned = thread::Builder::new()
        .name("commands".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                for command in line.chars().filter_map(parse_key) {
                    if tx.send(command).is_err() {
                        return;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        LogReporter.report("commands", &e);
    }
}

/// Print playback progress to stderr until the controller goes away.
fn spawn_event_printer(events: Receiver<PlayerEvent>, paragraphs: usize) {
    let spawned = thread::Builder::new()
        .name("events".to_string())
        .spawn(move || {
            for event in events {
                if let Some(line) = describe_event(&event, paragraphs) {
                    eprintln!("\n{}", line.dimmed());
                }
            }
        });
    if let Err(e) = spawned {
        LogReporter.report("events", &e);
    }
}

/// Read `text` aloud, rendering highlights to the terminal. Blocks until the
/// session ends, so call it off the async runtime.
///
/// Keyboard controls are read from stdin when it is a terminal and the
/// document came from a file.
pub fn run_read(
    config: Config,
    text: &str,
    #[cfg(feature = "remote")] runtime: tokio::runtime::Handle,
    interactive: bool,
    quiet: bool,
    verbosity: u8,
) -> Result<()> {
    config.validate()?;
    let reporter: Arc<dyn ErrorReporter> = Arc::new(LogReporter);
    let color = std::io::stdout().is_terminal();
    let host = TerminalHost::stdout(text, color)
        .with_paragraph_style(&config.highlight.paragraph_style);

    let paragraphs = segment_paragraphs(clean_document(text).text()).len();
    if !quiet {
        eprintln!(
            "Reading {} paragraph(s) with the {} service",
            paragraphs,
            config.voice.service.to_string().green()
        );
        if interactive {
            eprintln!(
                "{}",
                "Controls: n next, p previous, space or . pause/resume, s or q stop (then Enter)"
                    .dimmed()
            );
        }
    }

    #[cfg(feature = "remote")]
    let provider = ServiceBackends::new(runtime, reporter.clone());
    #[cfg(not(feature = "remote"))]
    let provider = ServiceBackends::new(reporter.clone());

    let mut controller =
        PlaybackController::new(config, Box::new(provider), host).with_reporter(reporter);

    if verbosity >= 1 {
        let (tx, rx) = crossbeam_channel::unbounded();
        controller = controller.with_observer(tx);
        spawn_event_printer(rx, paragraphs);
    }

    let (commands_tx, commands_rx) = crossbeam_channel::unbounded();
    if interactive {
        spawn_command_reader(commands_tx);
    } else {
        drop(commands_tx);
    }

    controller.play(text);
    controller.run_until_idle(&commands_rx);
    controller.host_mut().finish_line()?;
    session_result(&controller)
}

/// Error for a session that could not start or was halted, so the exit
/// status reflects it. A stop request or an empty document is not a failure.
fn session_result<H: DocumentHost>(controller: &PlaybackController<H>) -> Result<()> {
    match controller.failure() {
        Some(notice) => Err(ReadAloudError::Other(notice.to_string())),
        None => Ok(()),
    }
}

#[derive(Debug, Serialize)]
struct ParagraphReport<'a> {
    #[serde(flatten)]
    paragraph: &'a Paragraph,
    source_start: usize,
    source_end: usize,
    words: Vec<Word>,
}

/// Segmentation of `text` as pretty-printed JSON, with offsets both in the
/// cleaned text and in the source document.
pub fn paragraphs_json(text: &str) -> Result<String> {
    let document = clean_document(text);
    let paragraphs = segment_paragraphs(document.text());
    let reports: Vec<ParagraphReport<'_>> = paragraphs
        .iter()
        .map(|paragraph| {
            let (source_start, source_end) =
                document.to_source_range(paragraph.start_offset, paragraph.end_offset);
            ParagraphReport {
                paragraph,
                source_start,
                source_end,
                words: segment_words(&paragraph.text),
            }
        })
        .collect();
    serde_json::to_string_pretty(&reports).map_err(|e| ReadAloudError::Other(e.to_string()))
}

/// Write a default configuration file. Refuses to overwrite unless `force`.
pub fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(ReadAloudError::Other(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, Config::default().to_toml()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendProvider, SpeechBackend};
    use crate::playback::MemoryHost;
    use crate::report::CollectingNotifier;
    use tempfile::TempDir;

    struct NoBackends;

    impl BackendProvider for NoBackends {
        fn create(&self, _config: &Config) -> Result<Box<dyn SpeechBackend>> {
            Err(ReadAloudError::Other("no speech service".to_string()))
        }
    }

    fn controller(config: Config, text: &str) -> PlaybackController<MemoryHost> {
        PlaybackController::new(config, Box::new(NoBackends), MemoryHost::new(text))
            .with_notifier(Arc::new(CollectingNotifier::new()))
            .with_reporter(Arc::new(crate::report::CollectingReporter::new()))
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key('n'), Some(Command::Next));
        assert_eq!(parse_key('p'), Some(Command::Previous));
        assert_eq!(parse_key(' '), Some(Command::TogglePause));
        assert_eq!(parse_key('.'), Some(Command::TogglePause));
        assert_eq!(parse_key('s'), Some(Command::Stop));
        assert_eq!(parse_key('q'), Some(Command::Stop));
        assert_eq!(parse_key('x'), None);
    }

    #[test]
    fn test_overrides_apply_voice_to_overridden_service() {
        let mut config = Config::default();
        Overrides {
            service: Some(SpeechService::OpenAi),
            voice: Some("nova".to_string()),
            speed: Some(1.5),
            timeout: Some(Duration::from_secs(30)),
        }
        .apply(&mut config);

        assert_eq!(config.voice.service, SpeechService::OpenAi);
        assert_eq!(config.openai.voice, "nova");
        assert_eq!(config.local.voice, Config::default().local.voice);
        assert_eq!(config.voice.speed, 1.5);
        assert_eq!(config.remote.request_timeout_secs, 30);
    }

    #[test]
    fn test_sub_second_timeout_rounds_up() {
        let mut config = Config::default();
        Overrides {
            timeout: Some(Duration::from_millis(300)),
            ..Default::default()
        }
        .apply(&mut config);
        assert_eq!(config.remote.request_timeout_secs, 1);
    }

    #[test]
    fn test_empty_overrides_keep_config() {
        let mut config = Config::default();
        Overrides::default().apply(&mut config);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_paragraphs_json_has_source_offsets() {
        let text = "---\ntitle: x\n---\nHello world\n\nBye";
        let json = paragraphs_json(text).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let paragraphs = value.as_array().unwrap();

        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0]["text"], "Hello world");
        assert_eq!(paragraphs[0]["start_offset"], 0);
        assert_eq!(paragraphs[0]["source_start"], 17);
        assert_eq!(paragraphs[0]["words"].as_array().unwrap().len(), 2);
        assert_eq!(paragraphs[1]["words"][0]["text"], "Bye");
    }

    #[test]
    fn test_read_input_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "One.\n\nTwo.").unwrap();
        assert_eq!(read_input(Some(&path)).unwrap(), "One.\n\nTwo.");
    }

    #[test]
    fn test_read_input_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = read_input(Some(&dir.path().join("missing.txt")));
        assert!(matches!(result, Err(ReadAloudError::Io(_))));
    }

    #[test]
    fn test_init_config_writes_loadable_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        init_config(&path, false).unwrap();

        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[voice]\nspeed = 2.0\n").unwrap();

        assert!(init_config(&path, false).is_err());
        assert_eq!(Config::load(&path).unwrap().voice.speed, 2.0);

        init_config(&path, true).unwrap();
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_session_that_cannot_start_is_an_error() {
        let mut config = Config::default();
        config.voice.speed = 0.0;
        let mut controller = controller(config, "Hello.");
        controller.play("Hello.");

        let err = session_result(&controller).unwrap_err();
        assert!(err.to_string().contains("not configured"), "{err}");
    }

    #[test]
    fn test_halted_session_is_an_error() {
        let mut controller = controller(Config::default(), "Hello.");
        controller.play("Hello.");

        let err = session_result(&controller).unwrap_err();
        assert!(err.to_string().contains("no speech service"), "{err}");
    }

    #[test]
    fn test_empty_document_is_not_an_error() {
        let mut controller = controller(Config::default(), "");
        controller.play("");
        assert!(session_result(&controller).is_ok());
    }
}
