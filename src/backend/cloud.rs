//! Client for a generic cloud speech endpoint (remote service A).
//!
//! POSTs `{"text", "voice", "speed"}` as JSON with a bearer token and expects
//! the synthesized audio as the response body.

use super::VoiceParams;
use super::remote::{SynthesisClient, http_client, read_clip, request_error};
use crate::audio::AudioClip;
use crate::config::CloudConfig;
use crate::defaults;
use crate::error::{ReadAloudError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize, PartialEq)]
struct SynthesisRequest<'a> {
    text: &'a str,
    voice: &'a str,
    speed: f32,
}

pub struct CloudClient {
    http: reqwest::Client,
    endpoint: String,
    voice: String,
    api_key: String,
}

impl CloudClient {
    /// Checks the endpoint and credential before any request is made.
    pub fn new(config: &CloudConfig, timeout: Option<Duration>) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ReadAloudError::MissingCredential {
                service: "cloud".to_string(),
                variable: defaults::CLOUD_API_KEY_ENV.to_string(),
            });
        }
        if config.endpoint.trim().is_empty() {
            return Err(ReadAloudError::ConfigInvalidValue {
                key: "cloud.endpoint".to_string(),
                message: "an endpoint URL is required for the cloud service".to_string(),
            });
        }

        Ok(Self {
            http: http_client(timeout)?,
            endpoint: config.endpoint.clone(),
            voice: config.voice.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn body<'a>(&'a self, text: &'a str, voice: &'a VoiceParams) -> SynthesisRequest<'a> {
        SynthesisRequest {
            text,
            voice: if voice.voice.is_empty() {
                &self.voice
            } else {
                &voice.voice
            },
            speed: voice.speed,
        }
    }
}

#[async_trait]
impl SynthesisClient for CloudClient {
    fn service(&self) -> &'static str {
        "cloud"
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

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CloudConfig {
        CloudConfig {
            endpoint: "https://tts.example.com/v1/synthesize".to_string(),
            voice: "narrator".to_string(),
            api_key: "secret".to_string(),
        }
    }

    #[test]
    fn test_missing_api_key_names_variable() {
        let config = CloudConfig {
            api_key: "  ".to_string(),
            ..config()
        };
        let err = CloudClient::new(&config, None).err().unwrap();
        match err {
            ReadAloudError::MissingCredential { service, variable } => {
                assert_eq!(service, "cloud");
                assert_eq!(variable, "READALOUD_CLOUD_API_KEY");
            }
            other => panic!("Expected MissingCredential, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_endpoint_is_invalid_value() {
        let config = CloudConfig {
            endpoint: String::new(),
            ..config()
        };
        let err = CloudClient::new(&config, None).err().unwrap();
        assert!(matches!(err, ReadAloudError::ConfigInvalidValue { .. }));
    }

    #[test]
    fn test_request_body_uses_configured_voice() {
        let client = CloudClient::new(&config(), Some(Duration::from_secs(10))).unwrap();
        let params = VoiceParams {
            speed: 1.5,
            ..VoiceParams::default()
        };
        let json = serde_json::to_value(client.body("Hi there", &params)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"text": "Hi there", "voice": "narrator", "speed": 1.5})
        );
    }

    #[test]
    fn test_request_body_prefers_session_voice() {
        let client = CloudClient::new(&config(), None).unwrap();
        let params = VoiceParams {
            voice: "calm".to_string(),
            ..VoiceParams::default()
        };
        assert_eq!(client.body("x", &params).voice, "calm");
    }
}
