//! Speech backends behind one capability interface.
//!
//! Three variants satisfy the same event contract:
//! - [`local::LocalBackend`] over an on-device [`local::SpeechEngine`]
//!   (native word boundaries when the engine reports them)
//! - [`remote::RemoteBackend`] with the [`cloud`] client (remote service A)
//! - [`remote::RemoteBackend`] with the [`openai`] client (remote service B)
//!
//! Remote variants fetch one complete clip per paragraph and only report
//! ready / end / error.

#[cfg(feature = "remote")]
pub mod cloud;
pub mod command;
pub mod emitter;
pub mod error;
pub mod local;
#[cfg(feature = "remote")]
pub mod openai;
pub mod remote;

pub use emitter::{EventEmitter, event_channel};
pub use error::{BackendError, Severity};

use crate::config::{Config, SpeechService};
use crate::error::Result;
use crate::report::ErrorReporter;
use std::sync::Arc;
use std::time::Duration;

/// Identifies one paragraph request within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId {
    pub session: u64,
    pub paragraph: usize,
    /// Increases with every request of the session, so a restarted
    /// paragraph never matches events of its earlier attempt.
    pub sequence: u64,
}

/// Voice settings for one service, read from the config at session start.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceParams {
    pub voice: String,
    pub speed: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            voice: String::new(),
            speed: crate::defaults::SPEED,
            pitch: crate::defaults::PITCH,
            volume: crate::defaults::VOLUME,
        }
    }
}

/// One paragraph to synthesize and play.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakRequest {
    pub utterance: UtteranceId,
    pub text: String,
    pub voice: VoiceParams,
}

/// Lifecycle events of an utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEventKind {
    /// Audio is actually sounding. Remote backends include the clip length
    /// when the decoder knows it.
    Ready { clip_duration: Option<Duration> },
    /// Character range (relative to the paragraph) of the word being spoken.
    WordBoundary { char_index: usize, char_length: usize },
    ParagraphEnd,
    Error(BackendError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendEvent {
    pub utterance: UtteranceId,
    pub kind: BackendEventKind,
}

/// Uniform contract over heterogeneous speech services.
///
/// `pause`, `resume` and `cancel` are idempotent and valid in any state.
/// After `cancel` returns the utterance's emitter is closed, so no further
/// event of it is delivered.
pub trait SpeechBackend: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether the backend emits native word-boundary events.
    fn has_word_boundaries(&self) -> bool;

    /// Starts synthesizing and playing one paragraph. Returns once the
    /// request is issued; progress arrives through `emitter`.
    fn speak(&mut self, request: SpeakRequest, emitter: EventEmitter) -> Result<()>;

    fn pause(&mut self);

    fn resume(&mut self);

    fn cancel(&mut self);

    /// Whether anything is currently audible or about to be.
    fn is_speaking(&self) -> bool;

    fn is_paused(&self) -> bool;
}

/// Builds the backend for a session from the configuration snapshot.
///
/// Precondition failures (missing credentials, missing endpoint) are returned
/// as configuration errors before any request is issued.
pub trait BackendProvider: Send {
    fn create(&self, config: &Config) -> Result<Box<dyn SpeechBackend>>;
}

/// Provider for the real services selected by `voice.service`.
pub struct ServiceBackends {
    #[cfg(feature = "remote")]
    runtime: tokio::runtime::Handle,
    reporter: Arc<dyn ErrorReporter>,
}

impl ServiceBackends {
    /// Remote backends run their requests on `runtime`.
    #[cfg(feature = "remote")]
    pub fn new(runtime: tokio::runtime::Handle, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self { runtime, reporter }
    }

    #[cfg(not(feature = "remote"))]
    pub fn new(reporter: Arc<dyn ErrorReporter>) -> Self {
        Self { reporter }
    }

    #[cfg(feature = "remote")]
    fn remote(&self, client: Arc<dyn remote::SynthesisClient>) -> Result<Box<dyn SpeechBackend>> {
        let player = crate::audio::default_player()?;
        Ok(Box::new(remote::RemoteBackend::new(
            client,
            player,
            self.runtime.clone(),
        )))
    }
}

impl BackendProvider for ServiceBackends {
    fn create(&self, config: &Config) -> Result<Box<dyn SpeechBackend>> {
        match config.voice.service {
            SpeechService::Local => {
                let engine = command::CommandEngine::new(&config.local);
                Ok(Box::new(local::LocalBackend::new(
                    engine,
                    self.reporter.clone(),
                )))
            }
            #[cfg(feature = "remote")]
            SpeechService::Cloud => {
                let client =
                    cloud::CloudClient::new(&config.cloud, config.remote.request_timeout())?;
                self.remote(Arc::new(client))
            }
            #[cfg(feature = "remote")]
            SpeechService::OpenAi => {
                let client =
                    openai::OpenAiClient::new(&config.openai, config.remote.request_timeout())?;
                self.remote(Arc::new(client))
            }
            #[cfg(not(feature = "remote"))]
            service => Err(crate::error::ReadAloudError::ConfigInvalidValue {
                key: "voice.service".to_string(),
                message: format!("{service} requires a build with the `remote` feature"),
            }),
        }
    }
}
