//! Value types shared across the streaming transcription pipeline.
//!
//! These types carry no behavior beyond constructors and accessors. They are
//! produced by the [`StreamingClient`](super::StreamingClient) and consumed by
//! the pipeline coordinator and external UI subscribers.

use std::time::SystemTime;

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during streaming transcription operations.
#[derive(Debug, Error)]
pub enum StreamingError {
    /// `start()` was called while a connect attempt is already in flight
    #[error("a connect attempt is already in flight")]
    AlreadyStarting,

    /// Connection to the recognizer failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid streaming configuration
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    /// Socket-level read/write failure
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Outbound message could not be serialized
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

/// Result type for streaming operations.
pub type StreamingResult<T> = Result<T, StreamingError>;

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle state of a streaming transcription session.
///
/// Exactly one session is alive at a time; transitions are serialized through
/// the session-owning task. `Disconnected` (clean) and `Error` (after retry
/// exhaustion) are the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session active (clean terminal state)
    #[default]
    Disconnected,
    /// Socket handshake in progress (initial connect or reconnect)
    Connecting,
    /// Socket open, audio accepted
    Connected,
    /// Stop requested; audio disabled, socket held open for the final transcript
    GracefulShutdown,
    /// Transport failure; terminal once the reconnection budget is exhausted
    Error,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::GracefulShutdown => write!(f, "graceful-shutdown"),
            SessionState::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Transcription Result
// =============================================================================

/// One transcription result emitted by the recognizer.
///
/// Partial results are superseded by later partial or final results for the
/// same utterance; a result is never mutated after construction. Results with
/// empty text are filtered before they reach subscribers.
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    /// Transcribed text (never empty when delivered downstream)
    pub text: String,
    /// Whether this is the final result for the utterance
    pub is_final: bool,
    /// Confidence score (0.0 to 1.0)
    pub confidence: f32,
    /// Wall-clock time the result was received
    pub timestamp: SystemTime,
    /// Recognizer session identifier, when known
    pub session_id: Option<String>,
    /// Recognizer message identifier, when provided
    pub message_id: Option<String>,
    /// Start of the audio segment in milliseconds, when provided
    pub audio_start_ms: Option<u64>,
    /// End of the audio segment in milliseconds, when provided
    pub audio_end_ms: Option<u64>,
}

impl TranscriptionResult {
    /// Create a result stamped with the current time.
    pub fn new(text: impl Into<String>, is_final: bool, confidence: f32) -> Self {
        Self {
            text: text.into(),
            is_final,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp: SystemTime::now(),
            session_id: None,
            message_id: None,
            audio_start_ms: None,
            audio_end_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::Disconnected.to_string(), "disconnected");
        assert_eq!(SessionState::GracefulShutdown.to_string(), "graceful-shutdown");
        assert_eq!(SessionState::Error.to_string(), "error");
    }

    #[test]
    fn test_default_state_is_disconnected() {
        assert_eq!(SessionState::default(), SessionState::Disconnected);
    }

    #[test]
    fn test_result_clamps_confidence() {
        let result = TranscriptionResult::new("hello", true, 1.7);
        assert_eq!(result.confidence, 1.0);

        let result = TranscriptionResult::new("hello", false, -0.3);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_error_display() {
        let err = StreamingError::ConnectionFailed("refused".to_string());
        assert_eq!(err.to_string(), "Connection failed: refused");

        assert_eq!(
            StreamingError::AlreadyStarting.to_string(),
            "a connect attempt is already in flight"
        );
    }
}
