//! Remote-service backend: one synthesis request per paragraph, played as a
//! single clip.
//!
//! The service reports no word timing, so the backend only emits ready,
//! paragraph end and error. The request runs on the tokio runtime; playback
//! goes through an [`AudioPlayer`].

use super::{EventEmitter, SpeakRequest, SpeechBackend, VoiceParams};
use crate::audio::{AudioClip, AudioPlayer};
use crate::defaults;
use crate::error::{ReadAloudError, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Client for a text-to-speech HTTP service.
#[async_trait]
pub trait SynthesisClient: Send + Sync {
    /// Short service name for logs and errors.
    fn service(&self) -> &'static str;

    /// Synthesize `text` into one complete audio clip.
    async fn synthesize(&self, text: &str, voice: &VoiceParams) -> Result<AudioClip>;
}

/// Turn a service response into a clip, mapping non-success statuses.
#[cfg(feature = "remote")]
pub(crate) async fn read_clip(response: reqwest::Response) -> Result<AudioClip> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ReadAloudError::ServiceStatus {
            status: status.as_u16(),
            message: if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string()
            } else {
                body.trim().to_string()
            },
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response.bytes().await.map_err(request_error)?;
    Ok(AudioClip::new(bytes.to_vec(), content_type))
}

#[cfg(feature = "remote")]
pub(crate) fn request_error(error: reqwest::Error) -> ReadAloudError {
    let message = if error.is_timeout() {
        format!("timed out: {error}")
    } else {
        error.to_string()
    };
    ReadAloudError::Request { message }
}

#[cfg(feature = "remote")]
pub(crate) fn http_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|e| ReadAloudError::Request {
        message: format!("failed to build HTTP client: {e}"),
    })
}

struct ActiveRequest {
    emitter: EventEmitter,
    task: JoinHandle<()>,
}

/// Backend over a [`SynthesisClient`].
pub struct RemoteBackend {
    client: Arc<dyn SynthesisClient>,
    player: Arc<dyn AudioPlayer>,
    runtime: Handle,
    active: Option<ActiveRequest>,
}

impl RemoteBackend {
    pub fn new(client: Arc<dyn SynthesisClient>, player: Arc<dyn AudioPlayer>, runtime: Handle) -> Self {
        Self {
            client,
            player,
            runtime,
            active: None,
        }
    }
}

impl SpeechBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        self.client.service()
    }

    fn has_word_boundaries(&self) -> bool {
        false
    }

    fn speak(&mut self, request: SpeakRequest, emitter: EventEmitter) -> Result<()> {
        self.cancel();

        let client = self.client.clone();
        let player = self.player.clone();
        let events = emitter.clone();
        let task = self.runtime.spawn(async move {
            let clip = match client.synthesize(&request.text, &request.voice).await {
                Ok(clip) => clip,
                Err(e) => {
                    events.error(e.into());
                    return;
                }
            };

            player.set_volume(request.voice.volume);
            // Starting playback and closing the emitter are mutually
            // exclusive, so a cancelled request never starts sounding.
            let duration = match events.run_if_open(|| player.play(clip)) {
                None => return,
                Some(Err(e)) => {
                    events.error(e.into());
                    return;
                }
                Some(Ok(duration)) => duration,
            };
            events.ready(duration);

            let poll_interval = Duration::from_millis(defaults::FRAME_INTERVAL_MS);
            while !events.is_closed() && !player.is_finished() {
                tokio::time::sleep(poll_interval).await;
            }
            events.paragraph_end();
        });

        self.active = Some(ActiveRequest { emitter, task });
        Ok(())
    }

    fn pause(&mut self) {
        if !self.player.is_paused() {
            self.player.pause();
        }
    }

    fn resume(&mut self) {
        if self.player.is_paused() {
            self.player.resume();
        }
    }

    fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            active.emitter.close();
            active.task.abort();
        }
        self.player.stop();
    }

    fn is_speaking(&self) -> bool {
        let pending = self
            .active
            .as_ref()
            .is_some_and(|active| !active.task.is_finished());
        pending || !self.player.is_finished()
    }

    fn is_paused(&self) -> bool {
        self.player.is_paused()
    }
}

impl Drop for RemoteBackend {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[derive(Debug, Default)]
struct MockClientState {
    requests: Vec<(String, VoiceParams)>,
}

/// Mock synthesis client for testing.
#[derive(Debug, Clone)]
pub struct MockSynthesisClient {
    state: Arc<Mutex<MockClientState>>,
    clip: AudioClip,
    delay: Option<Duration>,
    failure: Option<(u16, String)>,
}

impl MockSynthesisClient {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockClientState::default())),
            clip: AudioClip::new(vec![0u8; 64], Some("audio/mpeg".to_string())),
            delay: None,
            failure: None,
        }
    }

    /// Configure a delay before every response
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Configure the mock to answer every request with an error status
    pub fn with_status_failure(mut self, status: u16, message: &str) -> Self {
        self.failure = Some((status, message.to_string()));
        self
    }

    fn state(&self) -> MutexGuard<'_, MockClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Texts requested so far, in order.
    pub fn requested_texts(&self) -> Vec<String> {
        self.state().requests.iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn request_count(&self) -> usize {
        self.state().requests.len()
    }
}

impl Default for MockSynthesisClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SynthesisClient for MockSynthesisClient {
    fn service(&self) -> &'static str {
        "mock-service"
    }

    async fn synthesize(&self, text: &str, voice: &VoiceParams) -> Result<AudioClip> {
        self.state()
            .requests
            .push((text.to_string(), voice.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some((status, message)) => Err(ReadAloudError::ServiceStatus {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(self.clip.clone()),
        }
    }
}
