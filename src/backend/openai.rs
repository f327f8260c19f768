//! Client for an OpenAI-compatible `/audio/speech` endpoint (remote service B).

use super::VoiceParams;
use super::remote::{SynthesisClient, http_client, read_clip, request_error};
use crate::audio::AudioClip;
use crate::config::OpenAiConfig;
use crate::defaults;
use crate::error::{ReadAloudError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// The endpoint accepts speeds in this range only.
const SPEED_RANGE: (f32, f32) = (0.25, 4.0);

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
    response_format: &'static str,
}

pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    voice: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig, timeout: Option<Duration>) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ReadAloudError::MissingCredential {
                service: "openai".to_string(),
                variable: defaults::OPENAI_API_KEY_ENV.to_string(),
            });
        }
        if config.endpoint.trim().is_empty() {
            return Err(ReadAloudError::ConfigInvalidValue {
                key: "openai.endpoint".to_string(),
                message: "endpoint must not be empty".to_string(),
            });
        }

        Ok(Self {
            http: http_client(timeout)?,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            voice: config.voice.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn body<'a>(&'a self, text: &'a str, voice: &'a VoiceParams) -> SpeechRequest<'a> {
        SpeechRequest {
            model: &self.model,
            input: text,
            voice: if voice.voice.is_empty() {
                &self.voice
            } else {
                &voice.voice
            },
            speed: voice.speed.clamp(SPEED_RANGE.0, SPEED_RANGE.1),
            response_format: "mp3",
        }
    }
}

#[async_trait]
impl SynthesisClient for OpenAiClient {
    fn service(&self) -> &'static str {
        "openai"
    }

    async fn synthesize(&self, text: &str, voice: &VoiceParams) -> Result<AudioClip> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.body(text, voice))
            .send()
            .await
            .map_err(request_error)?;
        read_clip(response).await
    }
}
