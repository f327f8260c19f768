use crate::backend::VoiceParams;
use crate::defaults;
use crate::error::{ReadAloudError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub voice: VoiceConfig,
    pub local: LocalConfig,
    pub cloud: CloudConfig,
    pub openai: OpenAiConfig,
    pub remote: RemoteConfig,
    pub highlight: HighlightConfig,
}

/// Speech service selection and voice shaping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VoiceConfig {
    pub service: SpeechService,
    pub speed: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// On-device synthesizer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocalConfig {
    pub command: String,
    pub voice: String,
    pub words_per_minute: u32,
}

/// Remote service A configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CloudConfig {
    pub endpoint: String,
    pub voice: String,
    pub api_key: String,
}

/// Remote service B (OpenAI-compatible) configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub endpoint: String,
    pub voice: String,
    pub model: String,
    pub api_key: String,
}

/// Transport settings shared by remote services
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct RemoteConfig {
    /// 0 disables the timeout.
    pub request_timeout_secs: u64,
}

/// Highlight rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HighlightConfig {
    pub paragraph: bool,
    pub word: bool,
    pub paragraph_style: String,
    pub word_style: String,
}

/// Speech service enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeechService {
    #[default]
    Local,
    Cloud,
    OpenAi,
}

impl SpeechService {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeechService::Local => "local",
            SpeechService::Cloud => "cloud",
            SpeechService::OpenAi => "openai",
        }
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, SpeechService::Local)
    }
}

impl fmt::Display for SpeechService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpeechService {
    type Err = ReadAloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(SpeechService::Local),
            "cloud" => Ok(SpeechService::Cloud),
            "openai" => Ok(SpeechService::OpenAi),
            other => Err(ReadAloudError::ConfigInvalidValue {
                key: "voice.service".to_string(),
                message: format!("unknown service '{other}' (expected local, cloud or openai)"),
            }),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            service: SpeechService::Local,
            speed: defaults::SPEED,
            pitch: defaults::PITCH,
            volume: defaults::VOLUME,
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            command: defaults::LOCAL_COMMAND.to_string(),
            voice: defaults::LOCAL_VOICE.to_string(),
            words_per_minute: defaults::LOCAL_WORDS_PER_MINUTE,
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            voice: defaults::CLOUD_VOICE.to_string(),
            api_key: String::new(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::OPENAI_ENDPOINT.to_string(),
            voice: defaults::OPENAI_VOICE.to_string(),
            model: defaults::OPENAI_MODEL.to_string(),
            api_key: String::new(),
        }
    }
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            paragraph: true,
            word: true,
            paragraph_style: defaults::PARAGRAPH_STYLE.to_string(),
            word_style: defaults::WORD_STYLE.to_string(),
        }
    }
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ReadAloudError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ReadAloudError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(ReadAloudError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - READALOUD_SERVICE → voice.service
    /// - READALOUD_VOICE → voice of the selected service
    /// - READALOUD_CLOUD_API_KEY → cloud.api_key
    /// - READALOUD_OPENAI_API_KEY → openai.api_key
    ///
    /// An unknown service name is ignored and the file value kept.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(service) = std::env::var("READALOUD_SERVICE")
            && !service.is_empty()
        {
            match service.parse() {
                Ok(service) => self.voice.service = service,
                Err(e) => eprintln!("readaloud: ignoring READALOUD_SERVICE: {e}"),
            }
        }

        if let Ok(voice) = std::env::var("READALOUD_VOICE")
            && !voice.is_empty()
        {
            self.set_service_voice(voice);
        }

        if let Ok(key) = std::env::var(defaults::CLOUD_API_KEY_ENV)
            && !key.is_empty()
        {
            self.cloud.api_key = key;
        }

        if let Ok(key) = std::env::var(defaults::OPENAI_API_KEY_ENV)
            && !key.is_empty()
        {
            self.openai.api_key = key;
        }

        self
    }

    /// Set the voice identifier of the currently selected service.
    pub fn set_service_voice(&mut self, voice: String) {
        match self.voice.service {
            SpeechService::Local => self.local.voice = voice,
            SpeechService::Cloud => self.cloud.voice = voice,
            SpeechService::OpenAi => self.openai.voice = voice,
        }
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/readaloud/config.toml on Linux
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("readaloud").join("config.toml"))
            .ok_or_else(|| ReadAloudError::Other("could not determine config directory".to_string()))
    }

    /// Check value ranges the TOML types cannot express.
    pub fn validate(&self) -> Result<()> {
        check_range("voice.speed", self.voice.speed, defaults::MIN_SPEED, defaults::MAX_SPEED)?;
        check_range("voice.pitch", self.voice.pitch, 0.0, 2.0)?;
        check_range("voice.volume", self.voice.volume, 0.0, 1.0)?;

        if self.local.command.trim().is_empty() {
            return Err(ReadAloudError::ConfigInvalidValue {
                key: "local.command".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.local.words_per_minute == 0 {
            return Err(ReadAloudError::ConfigInvalidValue {
                key: "local.words_per_minute".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Voice parameters for the selected service.
    pub fn voice_params(&self) -> VoiceParams {
        let voice = match self.voice.service {
            SpeechService::Local => &self.local.voice,
            SpeechService::Cloud => &self.cloud.voice,
            SpeechService::OpenAi => &self.openai.voice,
        };
        VoiceParams {
            voice: voice.clone(),
            speed: self.voice.speed,
            pitch: self.voice.pitch,
            volume: self.voice.volume,
        }
    }

    /// Copy with API keys masked, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        for key in [&mut config.cloud.api_key, &mut config.openai.api_key] {
            if !key.is_empty() {
                *key = "********".to_string();
            }
        }
        config
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ReadAloudError::ConfigParse {
            message: e.to_string(),
        })
    }
}

fn check_range(key: &str, value: f32, min: f32, max: f32) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ReadAloudError::ConfigInvalidValue {
            key: key.to_string(),
            message: format!("{value} is outside {min}..={max}"),
        })
    }
}
