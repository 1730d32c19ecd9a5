//! Application configuration.
//!
//! Settings come from environment variables (a `.env` file, loaded by the
//! binary at startup, feeds the same names), with sensible defaults for
//! everything except the recognizer API key. Priority: actual ENV vars >
//! `.env` values > defaults.

use std::env;
use std::time::Duration;

use url::Url;

use crate::core::dispatch::{NetworkTarget, TargetType};
use crate::core::stt::{DEFAULT_RECOGNIZER_URL, RecognizerEndpoint, StreamingConfig};

/// Environment variable names.
const ENV_RECOGNIZER_URL: &str = "RCP_VOICE_RECOGNIZER_URL";
const ENV_RECOGNIZER_API_KEY: &str = "RCP_VOICE_RECOGNIZER_API_KEY";
const ENV_LANGUAGE_CODE: &str = "RCP_VOICE_LANGUAGE_CODE";
const ENV_SAMPLE_RATE: &str = "RCP_VOICE_SAMPLE_RATE";
const ENV_CONFIDENCE_THRESHOLD: &str = "RCP_VOICE_CONFIDENCE_THRESHOLD";
const ENV_TARGET_TYPE: &str = "RCP_VOICE_TARGET_TYPE";
const ENV_TARGET_HOST: &str = "RCP_VOICE_TARGET_HOST";
const ENV_TARGET_PORT: &str = "RCP_VOICE_TARGET_PORT";
const ENV_DISPATCH_TIMEOUT_MS: &str = "RCP_VOICE_DISPATCH_TIMEOUT_MS";

/// Resolved application settings.
///
/// Read once at startup; the pipeline treats everything here as immutable.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub recognizer_url: Url,
    pub recognizer_api_key: Option<String>,
    pub language_code: String,
    pub sample_rate: u32,
    pub confidence_threshold: f32,
    pub target_type: TargetType,
    pub target_host: String,
    pub target_port: Option<u16>,
    pub dispatch_timeout: Option<Duration>,
}

impl AppSettings {
    /// Load settings from the environment, applying defaults for anything
    /// unset.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let recognizer_url = match env::var(ENV_RECOGNIZER_URL) {
            Ok(raw) => Url::parse(&raw)
                .map_err(|e| format!("invalid {ENV_RECOGNIZER_URL} ({raw}): {e}"))?,
            Err(_) => Url::parse(DEFAULT_RECOGNIZER_URL)?,
        };

        let target_type = match env::var(ENV_TARGET_TYPE).ok().as_deref() {
            None | Some("console") => TargetType::Console,
            Some("testing_gui") | Some("testing-gui") => TargetType::TestingGui,
            Some(other) => {
                return Err(format!(
                    "invalid {ENV_TARGET_TYPE}: {other} (expected console or testing_gui)"
                )
                .into());
            }
        };

        Ok(Self {
            recognizer_url,
            recognizer_api_key: env::var(ENV_RECOGNIZER_API_KEY).ok(),
            language_code: env::var(ENV_LANGUAGE_CODE).unwrap_or_else(|_| "en-US".to_string()),
            sample_rate: parse_env(ENV_SAMPLE_RATE)?.unwrap_or(16_000),
            confidence_threshold: parse_env(ENV_CONFIDENCE_THRESHOLD)?.unwrap_or(0.5),
            target_type,
            target_host: env::var(ENV_TARGET_HOST).unwrap_or_default(),
            target_port: parse_env(ENV_TARGET_PORT)?,
            dispatch_timeout: parse_env::<u64>(ENV_DISPATCH_TIMEOUT_MS)?
                .map(Duration::from_millis),
        })
    }

    /// Recognizer endpoint, with the API key attached when configured.
    pub fn recognizer_endpoint(&self) -> RecognizerEndpoint {
        RecognizerEndpoint {
            url: self.recognizer_url.clone(),
            api_key: self.recognizer_api_key.clone(),
        }
    }

    /// Streaming configuration derived from these settings.
    pub fn streaming_config(&self) -> StreamingConfig {
        StreamingConfig {
            language_code: self.language_code.clone(),
            sample_rate: self.sample_rate,
            confidence_threshold: self.confidence_threshold,
            ..StreamingConfig::default()
        }
    }

    /// Dispatch target derived from these settings. The port defaults to
    /// the target type's standard port when unset.
    pub fn network_target(&self) -> NetworkTarget {
        let mut target = match self.target_type {
            TargetType::Console => NetworkTarget::console(self.target_host.clone()),
            TargetType::TestingGui => NetworkTarget::testing_gui(self.target_host.clone()),
        };
        if let Some(port) = self.target_port {
            target = target.with_port(port);
        }
        if let Some(timeout) = self.dispatch_timeout {
            target = target.with_timeout(timeout);
        }
        target
    }
}

/// Parse an optional environment variable, erroring only when it is set but
/// unparseable.
fn parse_env<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| format!("invalid {name} ({raw}): {e}").into()),
        Err(_) => Ok(None),
    }
}
