//! Configuration types for the streaming transcription session.
//!
//! A [`StreamingConfig`] is created once per session start and is immutable
//! thereafter; [`RecognizerEndpoint`] identifies the remote recognition
//! service and is fixed at client construction.

use std::time::Duration;

use url::Url;

use super::types::{StreamingError, StreamingResult};

/// Sample rates the recognizer accepts, in Hz.
pub const ALLOWED_SAMPLE_RATES: [u32; 5] = [8000, 16000, 22050, 44100, 48000];

/// Default websocket endpoint of the real-time recognition service.
pub const DEFAULT_RECOGNIZER_URL: &str = "wss://api.assemblyai.com/v2/realtime/ws";

// =============================================================================
// Recognizer Endpoint
// =============================================================================

/// Address and credentials of the remote recognition service.
#[derive(Debug, Clone)]
pub struct RecognizerEndpoint {
    /// Websocket URL of the streaming API
    pub url: Url,
    /// API key sent as the `Authorization` header, when required
    pub api_key: Option<String>,
}

impl Default for RecognizerEndpoint {
    fn default() -> Self {
        Self {
            // The constant is a valid URL; parse cannot fail.
            url: Url::parse(DEFAULT_RECOGNIZER_URL).expect("default recognizer URL is valid"),
            api_key: None,
        }
    }
}

impl RecognizerEndpoint {
    /// Endpoint with an API key against the default service URL.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Endpoint against a custom URL (local recognizer, test server).
    pub fn with_url(url: Url) -> Self {
        Self { url, api_key: None }
    }
}

// =============================================================================
// Streaming Configuration
// =============================================================================

/// Immutable per-session configuration for the streaming client.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// BCP-47 language code sent in the session config frame
    pub language_code: String,
    /// PCM sample rate in Hz; must be one of [`ALLOWED_SAMPLE_RATES`]
    pub sample_rate: u32,
    /// Ask the recognizer to punctuate transcripts
    pub punctuate: bool,
    /// Ask the recognizer to format transcript text (numbers, casing)
    pub format_text: bool,
    /// Minimum confidence for a partial result to be acted upon (0.0 to 1.0)
    pub confidence_threshold: f32,
    /// Domain vocabulary hints biasing recognition (word boost)
    pub word_boost: Vec<String>,
    /// Bound on the connect handshake wait
    pub speech_timeout: Duration,
    /// Idle window after which a silent socket is considered dead
    pub silence_timeout: Duration,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            language_code: "en-US".to_string(),
            sample_rate: 16000,
            punctuate: true,
            format_text: true,
            confidence_threshold: 0.5,
            word_boost: Vec::new(),
            speech_timeout: Duration::from_secs(10),
            silence_timeout: Duration::from_secs(60),
        }
    }
}

impl StreamingConfig {
    /// Validate the configuration before a session is started.
    ///
    /// Invariants: sample rate in the allowed set, confidence threshold in
    /// [0, 1], both timeouts strictly positive.
    pub fn validate(&self) -> StreamingResult<()> {
        if !ALLOWED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(StreamingError::ConfigurationError(format!(
                "Sample rate {} Hz is not supported (allowed: {:?})",
                self.sample_rate, ALLOWED_SAMPLE_RATES
            )));
        }

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(StreamingError::ConfigurationError(format!(
                "Confidence threshold {} is outside [0.0, 1.0]",
                self.confidence_threshold
            )));
        }

        if self.speech_timeout.is_zero() || self.silence_timeout.is_zero() {
            return Err(StreamingError::ConfigurationError(
                "Speech and silence timeouts must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Add vocabulary hints for domain-specific terms.
    pub fn with_word_boost<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.word_boost = words.into_iter().map(Into::into).collect();
        self
    }
}
