//! Local-Engine backend: wraps an on-device speech engine.

use super::{BackendError, EventEmitter, SpeakRequest, SpeechBackend, VoiceParams};
use crate::error::{ReadAloudError, Result};
use crate::report::ErrorReporter;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Failure codes an engine reports through its callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineFailure {
    /// Speech was cut short by another request or by the system.
    Interrupted,
    /// Speech was cancelled by us.
    Canceled,
    /// This text could not be synthesized.
    SynthesisFailed(String),
    /// Anything else.
    Other(String),
}

impl From<EngineFailure> for BackendError {
    fn from(failure: EngineFailure) -> Self {
        match failure {
            EngineFailure::Interrupted | EngineFailure::Canceled => BackendError::Interrupted,
            EngineFailure::SynthesisFailed(msg) => BackendError::SynthesisFailed(msg),
            EngineFailure::Other(msg) => BackendError::Unknown(msg),
        }
    }
}

/// Callback events of an on-device engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Started,
    Word { char_index: usize, char_length: usize },
    Finished,
    Failed(EngineFailure),
}

pub type EngineCallback = Box<dyn FnMut(EngineEvent) + Send>;

/// Trait for on-device speech engines.
///
/// The engine reports progress of the current utterance through the callback
/// passed to `speak`. Starting a new utterance replaces the previous one.
pub trait SpeechEngine: Send {
    fn name(&self) -> &'static str;

    fn supports_word_boundaries(&self) -> bool;

    fn speak(&mut self, text: &str, voice: &VoiceParams, on_event: EngineCallback) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn resume(&mut self) -> Result<()>;

    fn cancel(&mut self);

    fn is_speaking(&self) -> bool;

    fn is_paused(&self) -> bool;
}

/// Backend over a [`SpeechEngine`].
pub struct LocalBackend<E: SpeechEngine> {
    engine: E,
    active: Option<EventEmitter>,
    reporter: Arc<dyn ErrorReporter>,
}

impl<E: SpeechEngine> LocalBackend<E> {
    pub fn new(engine: E, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            engine,
            active: None,
            reporter,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

impl<E: SpeechEngine> SpeechBackend for LocalBackend<E> {
    fn name(&self) -> &'static str {
        "local"
    }

    fn has_word_boundaries(&self) -> bool {
        self.engine.supports_word_boundaries()
    }

    fn speak(&mut self, request: SpeakRequest, emitter: EventEmitter) -> Result<()> {
        self.cancel();

        let events = emitter.clone();
        let callback: EngineCallback = Box::new(move |event| {
            match event {
                EngineEvent::Started => events.ready(None),
                EngineEvent::Word {
                    char_index,
                    char_length,
                } => events.word_boundary(char_index, char_length),
                EngineEvent::Finished => events.paragraph_end(),
                EngineEvent::Failed(failure) => events.error(failure.into()),
            };
        });

        self.active = Some(emitter);
        self.engine.speak(&request.text, &request.voice, callback)
    }

    fn pause(&mut self) {
        if self.engine.is_paused() || !self.engine.is_speaking() {
            return;
        }
        if let Err(e) = self.engine.pause() {
            self.reporter.report(self.engine.name(), &e);
        }
    }

    fn resume(&mut self) {
        if !self.engine.is_paused() {
            return;
        }
        if let Err(e) = self.engine.resume() {
            self.reporter.report(self.engine.name(), &e);
        }
    }

    fn cancel(&mut self) {
        if let Some(emitter) = self.active.take() {
            emitter.close();
        }
        self.engine.cancel();
    }

    fn is_speaking(&self) -> bool {
        self.engine.is_speaking()
    }

    fn is_paused(&self) -> bool {
        self.engine.is_paused()
    }
}

#[derive(Default)]
struct MockEngineState {
    callback: Option<EngineCallback>,
    spoken: Vec<String>,
    speaking: bool,
    paused: bool,
    pause_calls: usize,
    resume_calls: usize,
    cancel_calls: usize,
    word_boundaries: bool,
    fail_speak: bool,
}

/// Scriptable engine for tests: records calls and lets the test fire events.
///
/// Clones share state, so a test keeps one clone while the backend owns
/// the other.
#[derive(Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<MockEngineState>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure whether the engine reports word boundaries.
    pub fn with_word_boundaries(self, enabled: bool) -> Self {
        self.lock().word_boundaries = enabled;
        self
    }

    /// Configure the engine to refuse every utterance.
    pub fn with_speak_failure(self) -> Self {
        self.lock().fail_speak = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockEngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivers an event through the current utterance's callback.
    pub fn fire(&self, event: EngineEvent) {
        let mut state = self.lock();
        if matches!(event, EngineEvent::Finished | EngineEvent::Failed(_)) {
            state.speaking = false;
        }
        if let Some(callback) = state.callback.as_mut() {
            callback(event);
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.lock().spoken.clone()
    }

    pub fn pause_calls(&self) -> usize {
        self.lock().pause_calls
    }

    pub fn resume_calls(&self) -> usize {
        self.lock().resume_calls
    }

    pub fn cancel_calls(&self) -> usize {
        self.lock().cancel_calls
    }
}

impl SpeechEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock-engine"
    }

    fn supports_word_boundaries(&self) -> bool {
        self.lock().word_boundaries
    }

    fn speak(&mut self, text: &str, _voice: &VoiceParams, on_event: EngineCallback) -> Result<()> {
        let mut state = self.lock();
        if state.fail_speak {
            return Err(ReadAloudError::Engine {
                message: "mock engine failure".to_string(),
            });
        }
        state.spoken.push(text.to_string());
        state.callback = Some(on_event);
        state.speaking = true;
        state.paused = false;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.pause_calls += 1;
        state.paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.resume_calls += 1;
        state.paused = false;
        Ok(())
    }

    fn cancel(&mut self) {
        let mut state = self.lock();
        state.cancel_calls += 1;
        state.speaking = false;
        state.paused = false;
        // Real engines report the cancellation through the callback.
        if let Some(callback) = state.callback.as_mut() {
            callback(EngineEvent::Failed(EngineFailure::Canceled));
        }
    }

    fn is_speaking(&self) -> bool {
        self.lock().speaking
    }

    fn is_paused(&self) -> bool {
        self.lock().paused
    }
}
