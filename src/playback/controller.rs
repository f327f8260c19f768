//! Playback Controller: the state machine that reads a document paragraph by
//! paragraph.
//!
//! ```text
//! Idle ──play──▶ Loading ──ready──▶ Speaking ⇄ Paused
//!                  ▲                    │
//!                  └──paragraph end─────┘──last paragraph──▶ Idle
//!     Loading | Speaking | Paused ──terminal error──▶ Error ──▶ Idle
//! ```
//!
//! The controller is single-threaded. Backends deliver events on a channel
//! and everything else happens in [`PlaybackController::tick`], which the
//! host calls once per frame (or lets [`PlaybackController::run_until_idle`]
//! call). Events are tagged with their utterance id, so anything left over
//! from a cancelled utterance is recognised and dropped.

use super::clock::{Clock, SystemClock};
use super::highlight::{DocumentHost, HighlightSpan, Highlighter};
use super::state::{Command, PlaybackState, PlayerEvent};
use super::timing::TimingEstimator;
use crate::backend::{
    BackendError, BackendEvent, BackendEventKind, BackendProvider, EventEmitter, Severity,
    SpeakRequest, SpeechBackend, UtteranceId, VoiceParams, event_channel,
};
use crate::config::Config;
use crate::defaults;
use crate::report::{ErrorReporter, LogReporter, Notice, Notifier, StderrNotifier};
use crate::text::{CleanedText, Paragraph, Word, clean_document, segment_paragraphs, segment_words};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Navigation waiting for the cancelled utterance to go quiet.
#[derive(Debug, Clone, Copy)]
struct Drain {
    target: usize,
    started: Instant,
    next_poll: Instant,
}

/// State of one play-through. Dropped on stop, completion or error.
struct Session {
    id: u64,
    /// Text frozen at session start; all offsets refer to it.
    document: CleanedText,
    paragraphs: Vec<Paragraph>,
    current: usize,
    words: Vec<Word>,
    voice: VoiceParams,
    /// Emitter of the live utterance. Events of any other utterance are stale.
    emitter: Option<EventEmitter>,
    sequence: u64,
    estimator: Option<TimingEstimator>,
    drain: Option<Drain>,
}

impl Session {
    /// Make `index` the current paragraph and build its request.
    fn prepare(
        &mut self,
        index: usize,
        events: &Sender<BackendEvent>,
    ) -> (SpeakRequest, EventEmitter) {
        self.current = index;
        self.words = segment_words(&self.paragraphs[index].text);
        self.estimator = None;
        self.drain = None;
        self.sequence += 1;

        let utterance = UtteranceId {
            session: self.id,
            paragraph: index,
            sequence: self.sequence,
        };
        let emitter = EventEmitter::new(utterance, events.clone());
        self.emitter = Some(emitter.clone());

        let request = SpeakRequest {
            utterance,
            text: self.paragraphs[index].text.clone(),
            voice: self.voice.clone(),
        };
        (request, emitter)
    }

    fn live_utterance(&self) -> Option<UtteranceId> {
        self.emitter.as_ref().map(EventEmitter::utterance)
    }

    fn close_utterance(&mut self) {
        if let Some(emitter) = self.emitter.take() {
            emitter.close();
        }
        self.estimator = None;
    }
}

/// Drives one document through a speech backend and keeps the highlight in
/// step with it.
pub struct PlaybackController<H: DocumentHost> {
    config: Config,
    provider: Box<dyn BackendProvider>,
    highlighter: Highlighter<H>,
    clock: Arc<dyn Clock>,
    reporter: Arc<dyn ErrorReporter>,
    notifier: Arc<dyn Notifier>,
    events_tx: Sender<BackendEvent>,
    events_rx: Receiver<BackendEvent>,
    observer: Option<Sender<PlayerEvent>>,
    state: PlaybackState,
    session: Option<Session>,
    backend: Option<Box<dyn SpeechBackend>>,
    next_session_id: u64,
    /// Why the last session failed to start or was halted.
    failure: Option<Notice>,
}

impl<H: DocumentHost> PlaybackController<H> {
    /// Create a controller logging to stderr and using the system clock.
    pub fn new(config: Config, provider: Box<dyn BackendProvider>, host: H) -> Self {
        let reporter: Arc<dyn ErrorReporter> = Arc::new(LogReporter);
        let highlighter = Highlighter::new(host, config.highlight.clone(), reporter.clone());
        let (events_tx, events_rx) = event_channel();
        Self {
            config,
            provider,
            highlighter,
            clock: Arc::new(SystemClock),
            reporter,
            notifier: Arc::new(StderrNotifier),
            events_tx,
            events_rx,
            observer: None,
            state: PlaybackState::Idle,
            session: None,
            backend: None,
            next_session_id: 0,
            failure: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.highlighter.set_reporter(reporter.clone());
        self.reporter = reporter;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Publish [`PlayerEvent`]s on `observer`.
    pub fn with_observer(mut self, observer: Sender<PlayerEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Settings for the next session. A running session keeps its snapshot.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == PlaybackState::Idle
    }

    /// Index of the paragraph being read, if a session is running.
    pub fn current_paragraph(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.current)
    }

    /// The configuration or playback notice that ended the last session,
    /// if it did not end normally or by request.
    pub fn failure(&self) -> Option<&Notice> {
        self.failure.as_ref()
    }

    pub fn paragraph_count(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.paragraphs.len())
    }

    pub fn host(&self) -> &H {
        self.highlighter.host()
    }

    pub fn host_mut(&mut self) -> &mut H {
        self.highlighter.host_mut()
    }

    pub fn active_highlights(&self) -> Vec<HighlightSpan> {
        self.highlighter.active()
    }

    /// Primary control. Starts reading `text` when idle, asks the user to wait
    /// while a paragraph is loading and stops an active session otherwise.
    pub fn play(&mut self, text: &str) {
        match self.state {
            PlaybackState::Idle | PlaybackState::Error => self.start_session(text),
            PlaybackState::Loading => self.notifier.notify(Notice::PleaseWait),
            PlaybackState::Speaking | PlaybackState::Paused => self.stop(),
        }
    }

    /// [`play`](Self::play) with the host's current text.
    pub fn toggle(&mut self) {
        let text = if self.state.is_active() {
            String::new()
        } else {
            self.highlighter.host().text()
        };
        self.play(&text);
    }

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Speaking {
            return;
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.pause();
        }
        self.set_state(PlaybackState::Paused);
    }

    pub fn resume(&mut self) {
        if self.state != PlaybackState::Paused {
            return;
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.resume();
        }
        self.set_state(PlaybackState::Speaking);
    }

    pub fn toggle_pause(&mut self) {
        match self.state {
            PlaybackState::Speaking => self.pause(),
            PlaybackState::Paused => self.resume(),
            _ => {}
        }
    }

    /// Stop the session. Valid in every state, including `Loading`.
    pub fn stop(&mut self) {
        if self.session.is_none() && self.backend.is_none() {
            return;
        }
        self.teardown();
        self.set_state(PlaybackState::Idle);
        self.publish(PlayerEvent::Stopped);
    }

    pub fn next(&mut self) {
        self.navigate(1);
    }

    pub fn previous(&mut self) {
        self.navigate(-1);
    }

    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Next => self.next(),
            Command::Previous => self.previous(),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::TogglePause => self.toggle_pause(),
            Command::Stop => self.stop(),
        }
    }

    /// One frame: deliver backend events, poll a pending drain and advance
    /// the word estimate.
    pub fn tick(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }
        self.poll_drain();
        self.advance_estimator();
    }

    /// Tick on the frame clock, applying commands as they arrive, until the
    /// session ends. Returns immediately when idle.
    pub fn run_until_idle(&mut self, commands: &Receiver<Command>) {
        let frame = Duration::from_millis(defaults::FRAME_INTERVAL_MS);
        let mut commands = Some(commands);
        while !self.is_idle() {
            match commands {
                Some(rx) => match rx.recv_timeout(frame) {
                    Ok(command) => self.apply(command),
                    Err(RecvTimeoutError::Timeout) => {}
                    // Keep reading without controls.
                    Err(RecvTimeoutError::Disconnected) => commands = None,
                },
                None => thread::sleep(frame),
            }
            self.tick();
        }
    }

    fn start_session(&mut self, text: &str) {
        self.failure = None;
        if let Err(e) = self.config.validate() {
            self.halt(Notice::Configuration(e.to_string()));
            return;
        }

        let document = clean_document(text);
        let paragraphs = segment_paragraphs(document.text());
        if paragraphs.is_empty() {
            self.notifier.notify(Notice::NothingToRead);
            return;
        }

        let backend = match self.provider.create(&self.config) {
            Ok(backend) => backend,
            Err(e) if e.is_configuration() => {
                self.halt(Notice::Configuration(e.to_string()));
                return;
            }
            Err(e) => {
                self.reporter.report("playback", &e);
                self.halt(Notice::Playback(e.to_string()));
                return;
            }
        };

        self.highlighter.set_config(self.config.highlight.clone());
        self.next_session_id += 1;
        self.session = Some(Session {
            id: self.next_session_id,
            document,
            paragraphs,
            current: 0,
            words: Vec::new(),
            voice: self.config.voice_params(),
            emitter: None,
            sequence: 0,
            estimator: None,
            drain: None,
        });
        self.backend = Some(backend);
        self.begin_paragraph(0);
    }

    fn begin_paragraph(&mut self, index: usize) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let (request, emitter) = session.prepare(index, &self.events_tx);

        self.set_state(PlaybackState::Loading);
        self.publish(PlayerEvent::ParagraphStarted(index));

        let result = match self.backend.as_mut() {
            Some(backend) => backend.speak(request, emitter),
            None => return,
        };
        if let Err(e) = result {
            self.fail(&e);
        }
    }

    fn navigate(&mut self, delta: isize) {
        match self.state {
            PlaybackState::Speaking | PlaybackState::Paused => {}
            PlaybackState::Loading => {
                self.notifier.notify(Notice::PleaseWait);
                return;
            }
            PlaybackState::Idle | PlaybackState::Error => return,
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let last = session.paragraphs.len().saturating_sub(1);
        let target = session.current.saturating_add_signed(delta).min(last);
        session.close_utterance();
        let now = self.clock.now();
        session.drain = Some(Drain {
            target,
            started: now,
            next_poll: now,
        });

        self.highlighter.clear_all();
        if let Some(backend) = self.backend.as_mut() {
            backend.cancel();
        }
        self.set_state(PlaybackState::Loading);
    }

    fn poll_drain(&mut self) {
        let Some(drain) = self.session.as_ref().and_then(|s| s.drain) else {
            return;
        };
        let now = self.clock.now();
        if now < drain.next_poll {
            return;
        }

        let speaking = self.backend.as_ref().is_some_and(|b| b.is_speaking());
        if speaking {
            let waited = now.saturating_duration_since(drain.started);
            if waited < Duration::from_millis(defaults::DRAIN_TIMEOUT_MS) {
                if let Some(session) = self.session.as_mut() {
                    session.drain = Some(Drain {
                        next_poll: now + Duration::from_millis(defaults::DRAIN_POLL_MS),
                        ..drain
                    });
                }
                return;
            }
            self.reporter.report(
                "playback",
                &format!(
                    "backend still speaking after {}ms, starting paragraph {} anyway",
                    waited.as_millis(),
                    drain.target + 1
                ),
            );
        }
        self.begin_paragraph(drain.target);
    }

    fn handle_event(&mut self, event: BackendEvent) {
        let live = self.session.as_ref().and_then(Session::live_utterance);
        if live != Some(event.utterance) {
            return;
        }
        match event.kind {
            BackendEventKind::Ready { clip_duration } => self.on_ready(clip_duration),
            BackendEventKind::WordBoundary { char_index, .. } => self.on_word_boundary(char_index),
            BackendEventKind::ParagraphEnd => self.on_paragraph_end(),
            BackendEventKind::Error(error) => self.on_backend_error(error),
        }
    }

    fn on_ready(&mut self, clip_duration: Option<Duration>) {
        if self.state != PlaybackState::Loading {
            return;
        }
        let native_words = self
            .backend
            .as_ref()
            .is_some_and(|b| b.has_word_boundaries());
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let paragraph = &session.paragraphs[session.current];
        self.highlighter.show_paragraph(&session.document, paragraph);
        if !native_words && self.highlighter.word_enabled() && !session.words.is_empty() {
            session.estimator = Some(TimingEstimator::for_paragraph(
                &paragraph.text,
                session.words.len(),
                session.voice.speed,
                clip_duration,
            ));
        }
        self.set_state(PlaybackState::Speaking);
    }

    fn on_word_boundary(&mut self, char_index: usize) {
        if !matches!(self.state, PlaybackState::Speaking | PlaybackState::Paused) {
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if let Some(word) = session.words.iter().find(|w| w.end() > char_index) {
            self.highlighter
                .show_word(&session.document, &session.paragraphs[session.current], word);
        }
    }

    fn on_paragraph_end(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.close_utterance();
        let finished = session.current;
        let next = finished + 1;
        let has_next = next < session.paragraphs.len();

        self.highlighter.clear_word();
        self.publish(PlayerEvent::ParagraphFinished(finished));
        if has_next {
            self.begin_paragraph(next);
        } else {
            self.teardown();
            self.set_state(PlaybackState::Idle);
            self.publish(PlayerEvent::Finished);
        }
    }

    fn on_backend_error(&mut self, error: BackendError) {
        match error.severity() {
            Severity::Transient => {}
            Severity::Recoverable => {
                let paragraph = self.current_paragraph().map_or(0, |i| i + 1);
                self.reporter.report(
                    "playback",
                    &format!("skipping paragraph {paragraph}: {error}"),
                );
                self.on_paragraph_end();
            }
            Severity::Terminal => self.fail(&error),
        }
    }

    /// Halt the session after a terminal failure and tell the user once.
    fn fail(&mut self, error: &dyn fmt::Display) {
        self.reporter.report("playback", error);
        self.teardown();
        self.set_state(PlaybackState::Error);
        self.halt(Notice::Playback(error.to_string()));
        self.set_state(PlaybackState::Idle);
    }

    fn halt(&mut self, notice: Notice) {
        self.notifier.notify(notice.clone());
        self.failure = Some(notice);
    }

    fn advance_estimator(&mut self) {
        if !matches!(self.state, PlaybackState::Speaking | PlaybackState::Paused) {
            return;
        }
        let paused = self.state == PlaybackState::Paused
            || self.backend.as_ref().is_some_and(|b| b.is_paused());
        let now = self.clock.now();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(estimator) = session.estimator.as_mut() else {
            return;
        };

        let due = estimator.advance(now, paused);
        let finished = estimator.is_finished();
        if let Some(&index) = due.last() {
            self.highlighter.show_word(
                &session.document,
                &session.paragraphs[session.current],
                &session.words[index],
            );
        }
        if finished {
            session.estimator = None;
        }
    }

    /// Clear highlights, close the live utterance and drop the backend.
    fn teardown(&mut self) {
        self.highlighter.clear_all();
        if let Some(mut session) = self.session.take() {
            session.close_utterance();
        }
        if let Some(mut backend) = self.backend.take() {
            backend.cancel();
        }
        while self.events_rx.try_recv().is_ok() {}
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            self.state = state;
            self.publish(PlayerEvent::StateChanged(state));
        }
    }

    fn publish(&mut self, event: PlayerEvent) {
        if let Some(observer) = self.observer.as_ref()
            && observer.send(event).is_err()
        {
            self.observer = None;
        }
    }
}

impl<H: DocumentHost> Drop for PlaybackController<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::local::{EngineEvent, EngineFailure, LocalBackend, MockEngine};
    use crate::config::SpeechService;
    use crate::error::{ReadAloudError, Result};
    use crate::playback::clock::ManualClock;
    use crate::playback::highlight::MemoryHost;
    use crate::report::{CollectingNotifier, CollectingReporter};

    const DOC: &str = "Para one.\n\nPara two.\n\nPara three.";

    struct MockProvider {
        engine: MockEngine,
        reporter: Arc<CollectingReporter>,
    }

    impl BackendProvider for MockProvider {
        fn create(&self, config: &Config) -> Result<Box<dyn SpeechBackend>> {
            if config.voice.service != SpeechService::Local {
                return Err(ReadAloudError::MissingCredential {
                    service: config.voice.service.to_string(),
                    variable: "TEST_KEY".to_string(),
                });
            }
            Ok(Box::new(LocalBackend::new(
                self.engine.clone(),
                self.reporter.clone(),
            )))
        }
    }

    struct Harness {
        controller: PlaybackController<MemoryHost>,
        engine: MockEngine,
        host: MemoryHost,
        clock: ManualClock,
        notifier: Arc<CollectingNotifier>,
        reporter: Arc<CollectingReporter>,
        events: Receiver<PlayerEvent>,
    }

    impl Harness {
        fn new(engine: MockEngine, text: &str) -> Self {
            Self::with_config(engine, text, Config::default())
        }

        fn with_config(engine: MockEngine, text: &str, config: Config) -> Self {
            let host = MemoryHost::new(text);
            let clock = ManualClock::new();
            let notifier = Arc::new(CollectingNotifier::new());
            let reporter = Arc::new(CollectingReporter::new());
            let (tx, events) = crossbeam_channel::unbounded();
            let provider = MockProvider {
                engine: engine.clone(),
                reporter: reporter.clone(),
            };
            let controller = PlaybackController::new(config, Box::new(provider), host.clone())
                .with_clock(Arc::new(clock.clone()))
                .with_reporter(reporter.clone())
                .with_notifier(notifier.clone())
                .with_observer(tx);
            Self {
                controller,
                engine,
                host,
                clock,
                notifier,
                reporter,
                events,
            }
        }

        /// Fire an engine event and let the controller process it.
        fn fire(&mut self, event: EngineEvent) {
            self.engine.fire(event);
            self.controller.tick();
        }

        fn frame(&mut self, millis: u64) {
            self.clock.advance(Duration::from_millis(millis));
            self.controller.tick();
        }

        fn player_events(&self) -> Vec<PlayerEvent> {
            self.events.try_iter().collect()
        }
    }

    #[test]
    fn test_reads_paragraphs_in_order_then_idles() {
        let mut h = Harness::new(MockEngine::new(), DOC);
        h.controller.toggle();
        assert_eq!(h.controller.state(), PlaybackState::Loading);

        for _ in 0..3 {
            h.fire(EngineEvent::Started);
            assert_eq!(h.controller.state(), PlaybackState::Speaking);
            h.fire(EngineEvent::Finished);
        }

        assert_eq!(h.engine.spoken(), vec!["Para one.", "Para two.", "Para three."]);
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert!(h.host.highlights().is_empty());
        let events = h.player_events();
        assert_eq!(events.last(), Some(&PlayerEvent::Finished));
        let finished: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                PlayerEvent::ParagraphFinished(i) => Some(*i),
                _ => None,
            })
            .collect();
        assert_eq!(finished, vec![0, 1, 2]);
    }

    #[test]
    fn test_ready_shows_paragraph_highlight() {
        let mut h = Harness::new(MockEngine::new(), DOC);
        h.controller.toggle();
        h.fire(EngineEvent::Started);

        assert_eq!(h.host.highlighted_text("paragraph").as_deref(), Some("Para one."));
    }

    #[test]
    fn test_native_word_boundaries_drive_word_highlight() {
        let engine = MockEngine::new().with_word_boundaries(true);
        let mut h = Harness::new(engine, "Hello brave world");
        h.controller.toggle();
        h.fire(EngineEvent::Started);
        h.fire(EngineEvent::Word {
            char_index: 6,
            char_length: 5,
        });

        assert_eq!(h.host.highlighted_text("word").as_deref(), Some("brave"));

        // No estimator runs alongside native boundaries.
        h.frame(5000);
        assert_eq!(h.host.highlighted_text("word").as_deref(), Some("brave"));
    }

    #[test]
    fn test_estimated_words_follow_frame_clock() {
        let mut h = Harness::new(MockEngine::new(), "Hello world");
        h.controller.toggle();
        h.fire(EngineEvent::Started);

        h.frame(0);
        assert_eq!(h.host.highlighted_text("word").as_deref(), Some("Hello"));
        h.frame(320);
        assert_eq!(h.host.highlighted_text("word").as_deref(), Some("Hello"));
        h.frame(16);
        assert_eq!(h.host.highlighted_text("word").as_deref(), Some("world"));
        assert_eq!(h.host.created_count(), 3);
    }

    #[test]
    fn test_pause_freezes_estimated_words() {
        let mut h = Harness::new(MockEngine::new(), "Hello world");
        h.controller.toggle();
        h.fire(EngineEvent::Started);
        h.frame(0);

        h.controller.pause();
        h.frame(1000);
        assert_eq!(h.host.highlighted_text("word").as_deref(), Some("Hello"));

        h.controller.resume();
        h.frame(16);
        assert_eq!(h.host.highlighted_text("word").as_deref(), Some("Hello"));
        h.frame(320);
        assert_eq!(h.host.highlighted_text("word").as_deref(), Some("world"));
    }

    #[test]
    fn test_pause_twice_is_idempotent() {
        let mut h = Harness::new(MockEngine::new(), DOC);
        h.controller.toggle();
        h.fire(EngineEvent::Started);

        h.controller.pause();
        h.controller.pause();

        assert_eq!(h.controller.state(), PlaybackState::Paused);
        assert_eq!(h.engine.pause_calls(), 1);

        h.controller.toggle_pause();
        assert_eq!(h.controller.state(), PlaybackState::Speaking);
        assert_eq!(h.engine.resume_calls(), 1);
    }

    #[test]
    fn test_play_while_loading_asks_to_wait() {
        let mut h = Harness::new(MockEngine::new(), DOC);
        h.controller.toggle();
        h.controller.toggle();

        assert_eq!(h.controller.state(), PlaybackState::Loading);
        assert_eq!(h.notifier.notices(), vec![Notice::PleaseWait]);
        assert_eq!(h.engine.spoken().len(), 1);
    }

    #[test]
    fn test_skip_while_loading_is_noop() {
        let mut h = Harness::new(MockEngine::new(), DOC);
        h.controller.toggle();
        let cancels = h.engine.cancel_calls();

        h.controller.next();

        assert_eq!(h.controller.state(), PlaybackState::Loading);
        assert_eq!(h.controller.current_paragraph(), Some(0));
        assert_eq!(h.engine.cancel_calls(), cancels);
        assert_eq!(h.notifier.notices(), vec![Notice::PleaseWait]);
    }

    #[test]
    fn test_play_while_speaking_stops() {
        let mut h = Harness::new(MockEngine::new(), DOC);
        h.controller.toggle();
        h.fire(EngineEvent::Started);

        h.controller.toggle();

        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert!(h.host.highlights().is_empty());
        assert_eq!(h.controller.current_paragraph(), None);
        assert!(h.player_events().contains(&PlayerEvent::Stopped));
    }

    #[test]
    fn test_next_waits_for_drain() {
        let mut h = Harness::new(MockEngine::new(), DOC);
        h.controller.toggle();
        h.fire(EngineEvent::Started);

        h.controller.next();
        assert_eq!(h.controller.state(), PlaybackState::Loading);
        assert!(h.host.highlights().is_empty());
        assert_eq!(h.engine.spoken().len(), 1);

        // The mock engine is quiet right after cancel: the first poll starts
        // the target paragraph.
        h.frame(0);
        assert_eq!(h.controller.current_paragraph(), Some(1));
        assert_eq!(h.engine.spoken(), vec!["Para one.", "Para two."]);
    }

    #[test]
    fn test_previous_clamps_at_first_paragraph() {
        let mut h = Harness::new(MockEngine::new(), DOC);
        h.controller.toggle();
        h.fire(EngineEvent::Started);

        h.controller.previous();
        h.frame(0);

        assert_eq!(h.controller.current_paragraph(), Some(0));
        assert_eq!(h.engine.spoken(), vec!["Para one.", "Para one."]);
    }

    #[test]
    fn test_next_on_last_paragraph_restarts_it() {
        let mut h = Harness::new(MockEngine::new(), "Only one.");
        h.controller.toggle();
        h.fire(EngineEvent::Started);

        h.controller.next();
        h.frame(0);

        assert_eq!(h.controller.current_paragraph(), Some(0));
        assert_eq!(h.engine.spoken().len(), 2);
    }

    #[test]
    fn test_target_paragraph_highlights_after_navigation() {
        let mut h = Harness::new(MockEngine::new(), DOC);
        h.controller.toggle();
        h.fire(EngineEvent::Started);
        h.controller.next();
        h.frame(0);

        h.fire(EngineEvent::Started);
        assert_eq!(h.host.highlighted_text("paragraph").as_deref(), Some("Para two."));
        assert!(h.reporter.entries().is_empty());
    }

    #[test]
    fn test_recoverable_failure_skips_paragraph() {
        let mut h = Harness::new(MockEngine::new(), DOC);
        h.controller.toggle();
        h.fire(EngineEvent::Failed(EngineFailure::SynthesisFailed(
            "unsupported glyph".to_string(),
        )));

        assert_eq!(h.controller.current_paragraph(), Some(1));
        assert_eq!(h.controller.state(), PlaybackState::Loading);
        assert!(h.notifier.notices().is_empty());
        let entries = h.reporter.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].1.contains("skipping paragraph 1"));
    }

    #[test]
    fn test_transient_interruption_is_silent() {
        let mut h = Harness::new(MockEngine::new(), DOC);
        h.controller.toggle();
        h.fire(EngineEvent::Started);
        h.fire(EngineEvent::Failed(EngineFailure::Interrupted));

        assert_eq!(h.controller.state(), PlaybackState::Speaking);
        assert!(h.notifier.notices().is_empty());
        assert!(h.reporter.entries().is_empty());
    }

    #[test]
    fn test_terminal_failure_notifies_once_and_idles() {
        let mut h = Harness::new(MockEngine::new(), DOC);
        h.controller.toggle();
        h.fire(EngineEvent::Started);
        h.fire(EngineEvent::Failed(EngineFailure::Other("device lost".to_string())));

        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert!(h.host.highlights().is_empty());
        let notices = h.notifier.notices();
        assert_eq!(notices.len(), 1);
        assert!(matches!(&notices[0], Notice::Playback(msg) if msg.contains("device lost")));
        assert_eq!(h.controller.failure(), Some(&notices[0]));
        let states: Vec<PlayerEvent> = h
            .player_events()
            .into_iter()
            .filter(|e| matches!(e, PlayerEvent::StateChanged(_)))
            .collect();
        assert_eq!(
            &states[states.len() - 2..],
            &[
                PlayerEvent::StateChanged(PlaybackState::Error),
                PlayerEvent::StateChanged(PlaybackState::Idle)
            ]
        );
    }

    #[test]
    fn test_speak_failure_is_terminal() {
        let mut h = Harness::new(MockEngine::new().with_speak_failure(), DOC);
        h.controller.toggle();

        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert_eq!(h.notifier.notices().len(), 1);
    }

    #[test]
    fn test_configuration_error_starts_nothing() {
        let mut config = Config::default();
        config.voice.service = SpeechService::Cloud;
        let mut h = Harness::with_config(MockEngine::new(), DOC, config);

        h.controller.toggle();

        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert!(h.engine.spoken().is_empty());
        assert!(matches!(
            h.notifier.notices().as_slice(),
            [Notice::Configuration(_)]
        ));
        assert!(matches!(
            h.controller.failure(),
            Some(Notice::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_speed_is_configuration_notice() {
        let mut config = Config::default();
        config.voice.speed = 0.0;
        let mut h = Harness::with_config(MockEngine::new(), DOC, config);

        h.controller.toggle();

        assert!(matches!(
            h.notifier.notices().as_slice(),
            [Notice::Configuration(_)]
        ));
    }

    #[test]
    fn test_empty_document_has_nothing_to_read() {
        let mut h = Harness::new(MockEngine::new(), "---\ntitle: x\n---\n\n  \n");
        h.controller.toggle();

        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert_eq!(h.notifier.notices(), vec![Notice::NothingToRead]);
        assert_eq!(h.controller.failure(), None);
    }

    #[test]
    fn test_new_session_clears_previous_failure() {
        let mut h = Harness::new(MockEngine::new(), DOC);
        h.controller.toggle();
        h.fire(EngineEvent::Started);
        h.fire(EngineEvent::Failed(EngineFailure::Other("device lost".to_string())));
        assert!(h.controller.failure().is_some());

        h.controller.toggle();
        assert_eq!(h.controller.state(), PlaybackState::Loading);
        assert_eq!(h.controller.failure(), None);

        h.controller.stop();
        assert_eq!(h.controller.failure(), None);
    }

    #[test]
    fn test_commands_in_idle_are_noops() {
        let mut h = Harness::new(MockEngine::new(), DOC);
        for command in [
            Command::Next,
            Command::Previous,
            Command::Pause,
            Command::Resume,
            Command::TogglePause,
            Command::Stop,
        ] {
            h.controller.apply(command);
        }
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert!(h.notifier.notices().is_empty());
        assert!(h.player_events().is_empty());
    }

    #[test]
    fn test_stop_during_loading_is_allowed() {
        let mut h = Harness::new(MockEngine::new(), DOC);
        h.controller.toggle();
        let cancels = h.engine.cancel_calls();
        h.controller.stop();

        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert_eq!(h.engine.cancel_calls(), cancels + 1);
    }

    #[test]
    fn test_new_session_after_completion_uses_fresh_text() {
        let mut h = Harness::new(MockEngine::new(), "First.");
        h.controller.toggle();
        h.fire(EngineEvent::Started);
        h.fire(EngineEvent::Finished);
        assert!(h.controller.is_idle());

        h.host.set_text("Second.");
        h.controller.toggle();
        assert_eq!(h.engine.spoken(), vec!["First.", "Second."]);
    }
}
