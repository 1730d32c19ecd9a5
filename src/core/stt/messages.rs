//! Wire message types for the streaming recognition socket.
//!
//! The protocol is JSON text frames over a persistent full-duplex websocket.
//!
//! - **Incoming messages**: discriminated by a `message_type` field
//!   - [`SessionBeginsMessage`]: session established, carries the session id
//!   - [`TranscriptMessage`]: partial or final transcript for an utterance
//!   - [`SessionEndedMessage`]: server-side courtesy notice; the transport
//!     stays open
//! - **Outgoing messages**:
//!   - [`SessionConfigMessage`]: sent once, immediately after connect
//!   - [`AudioFrameMessage`]: one base64-encoded PCM16LE frame
//!   - [`TerminateSessionMessage`]: graceful session termination request

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use super::config::StreamingConfig;

// =============================================================================
// Incoming Messages (Server to Client)
// =============================================================================

/// Session establishment notice.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionBeginsMessage {
    /// Unique session identifier assigned by the recognizer
    pub session_id: String,
    /// Session expiration timestamp, when provided
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// Partial or final transcript for one utterance.
///
/// The same shape is used for `PartialTranscript` and `FinalTranscript`
/// frames; the discriminator decides finality. The confidence is a
/// string-encoded decimal on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptMessage {
    /// Transcribed text; may be empty for silence-only windows
    #[serde(default)]
    pub text: String,
    /// String-encoded confidence (e.g. "0.87")
    #[serde(default)]
    pub confidence: Option<String>,
    /// Start of the audio segment in milliseconds
    #[serde(default)]
    pub audio_start: Option<u64>,
    /// End of the audio segment in milliseconds
    #[serde(default)]
    pub audio_end: Option<u64>,
    /// Message identifier, when the session was opened with extra
    /// session information enabled
    #[serde(default)]
    pub message_id: Option<String>,
    /// Whether punctuation has been applied (final transcripts only)
    #[serde(default)]
    pub punctuated: Option<bool>,
    /// Whether text formatting has been applied (final transcripts only)
    #[serde(default)]
    pub text_formatted: Option<bool>,
}

impl TranscriptMessage {
    /// Parse the string-encoded confidence, falling back to 0.0 on a missing
    /// or malformed value.
    pub fn confidence_value(&self) -> f32 {
        self.confidence
            .as_deref()
            .and_then(|raw| raw.trim().parse::<f32>().ok())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(0.0)
    }

    /// Whether the recognizer has finished post-processing this transcript.
    ///
    /// An absent flag counts as formatted: older service versions omit the
    /// field entirely, and waiting on it would stall graceful shutdown.
    pub fn formatting_complete(&self) -> bool {
        self.text_formatted.unwrap_or(true)
    }
}

/// Server-initiated end-of-session notice.
///
/// This clears the listening flag but is not a transport-level close; the
/// socket remains open until the client terminates it.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionEndedMessage {
    #[serde(default)]
    pub session_id: Option<String>,
}

// =============================================================================
// Outgoing Messages (Client to Server)
// =============================================================================

/// Session configuration frame, sent exactly once after the socket opens.
#[derive(Debug, Clone, Serialize)]
pub struct SessionConfigMessage {
    pub sample_rate: u32,
    pub language_code: String,
    pub punctuate: bool,
    pub format_text: bool,
    /// Always true: the pipeline relies on session/message identifiers
    pub enable_extra_session_information: bool,
    pub word_boost: Vec<String>,
}

impl SessionConfigMessage {
    pub fn from_config(config: &StreamingConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            language_code: config.language_code.clone(),
            punctuate: config.punctuate,
            format_text: config.format_text,
            enable_extra_session_information: true,
            word_boost: config.word_boost.clone(),
        }
    }
}

/// One audio frame: base64-encoded PCM16LE samples.
#[derive(Debug, Clone, Serialize)]
pub struct AudioFrameMessage {
    pub audio_data: String,
}

impl AudioFrameMessage {
    /// Encode a raw PCM frame into its wire representation.
    pub fn encode(frame: &[u8]) -> Self {
        Self {
            audio_data: BASE64.encode(frame),
        }
    }
}

/// Graceful session termination request.
#[derive(Debug, Clone, Serialize)]
pub struct TerminateSessionMessage {
    pub terminate_session: bool,
}

impl Default for TerminateSessionMessage {
    fn default() -> Self {
        Self {
            terminate_session: true,
        }
    }
}

// =============================================================================
// Message Enum and Parsing
// =============================================================================

/// All inbound frames the recognizer can send.
///
/// Use [`InboundMessage::parse`] to deserialize websocket text frames.
#[derive(Debug)]
pub enum InboundMessage {
    /// Session established; carries the session id
    SessionBegins(SessionBeginsMessage),
    /// In-progress transcript, superseded by later results
    PartialTranscript(TranscriptMessage),
    /// Authoritative transcript for the utterance
    FinalTranscript(TranscriptMessage),
    /// Server stopped listening without closing the socket
    SessionEnded(SessionEndedMessage),
    /// Unrecognized discriminator (forward compatibility)
    Unknown(String),
}

impl InboundMessage {
    /// Parse a websocket text frame into the appropriate type.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        // Peek at the discriminator first
        #[derive(Deserialize)]
        struct TypePeek {
            message_type: String,
        }

        let peek: TypePeek = serde_json::from_str(text)?;

        match peek.message_type.as_str() {
            "SessionBegins" => {
                let msg: SessionBeginsMessage = serde_json::from_str(text)?;
                Ok(InboundMessage::SessionBegins(msg))
            }
            "PartialTranscript" => {
                let msg: TranscriptMessage = serde_json::from_str(text)?;
                Ok(InboundMessage::PartialTranscript(msg))
            }
            "FinalTranscript" => {
                let msg: TranscriptMessage = serde_json::from_str(text)?;
                Ok(InboundMessage::FinalTranscript(msg))
            }
            "SessionEnded" => {
                let msg: SessionEndedMessage = serde_json::from_str(text)?;
                Ok(InboundMessage::SessionEnded(msg))
            }
            _ => Ok(InboundMessage::Unknown(peek.message_type)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_begins() {
        let json = r#"{"message_type":"SessionBegins","session_id":"sess-42","expires_at":"2025-01-01T00:00:00Z"}"#;
        let msg = InboundMessage::parse(json).unwrap();

        match msg {
            InboundMessage::SessionBegins(begin) => {
                assert_eq!(begin.session_id, "sess-42");
                assert!(begin.expires_at.is_some());
            }
            _ => panic!("Expected SessionBegins"),
        }
    }

    #[test]
    fn test_parse_partial_transcript() {
        let json = r#"{"message_type":"PartialTranscript","text":"set channel","confidence":"0.4","audio_start":0,"audio_end":900}"#;
        let msg = InboundMessage::parse(json).unwrap();

        match msg {
            InboundMessage::PartialTranscript(t) => {
                assert_eq!(t.text, "set channel");
                assert!((t.confidence_value() - 0.4).abs() < f32::EPSILON);
                assert_eq!(t.audio_end, Some(900));
            }
            _ => panic!("Expected PartialTranscript"),
        }
    }

    #[test]
    fn test_parse_final_transcript() {
        let json = r#"{"message_type":"FinalTranscript","text":"set channel one mute on","confidence":"0.95","punctuated":true,"text_formatted":true,"message_id":"m-1"}"#;
        let msg = InboundMessage::parse(json).unwrap();

        match msg {
            InboundMessage::FinalTranscript(t) => {
                assert_eq!(t.text, "set channel one mute on");
                assert!(t.formatting_complete());
                assert_eq!(t.message_id.as_deref(), Some("m-1"));
            }
            _ => panic!("Expected FinalTranscript"),
        }
    }

    #[test]
    fn test_parse_session_ended() {
        let json = r#"{"message_type":"SessionEnded","session_id":"sess-42"}"#;
        let msg = InboundMessage::parse(json).unwrap();
        assert!(matches!(msg, InboundMessage::SessionEnded(_)));
    }

    #[test]
    fn test_parse_unknown_type() {
        let json = r#"{"message_type":"FutureFrame","data":1}"#;
        let msg = InboundMessage::parse(json).unwrap();
        assert!(matches!(msg, InboundMessage::Unknown(t) if t == "FutureFrame"));
    }

    #[test]
    fn test_parse_missing_discriminator_is_error() {
        assert!(InboundMessage::parse(r#"{"text":"hello"}"#).is_err());
        assert!(InboundMessage::parse("not json").is_err());
    }

    #[test]
    fn test_confidence_fallback_on_garbage() {
        let json = r#"{"message_type":"FinalTranscript","text":"x","confidence":"high"}"#;
        match InboundMessage::parse(json).unwrap() {
            InboundMessage::FinalTranscript(t) => assert_eq!(t.confidence_value(), 0.0),
            _ => panic!("Expected FinalTranscript"),
        }
    }

    #[test]
    fn test_confidence_fallback_on_missing() {
        let json = r#"{"message_type":"PartialTranscript","text":"x"}"#;
        match InboundMessage::parse(json).unwrap() {
            InboundMessage::PartialTranscript(t) => assert_eq!(t.confidence_value(), 0.0),
            _ => panic!("Expected PartialTranscript"),
        }
    }

    #[test]
    fn test_formatting_complete_defaults_true_when_absent() {
        let json = r#"{"message_type":"FinalTranscript","text":"x","confidence":"0.9"}"#;
        match InboundMessage::parse(json).unwrap() {
            InboundMessage::FinalTranscript(t) => assert!(t.formatting_complete()),
            _ => panic!("Expected FinalTranscript"),
        }
    }

    #[test]
    fn test_formatting_incomplete_when_flag_false() {
        let json = r#"{"message_type":"FinalTranscript","text":"x","text_formatted":false}"#;
        match InboundMessage::parse(json).unwrap() {
            InboundMessage::FinalTranscript(t) => assert!(!t.formatting_complete()),
            _ => panic!("Expected FinalTranscript"),
        }
    }

    #[test]
    fn test_audio_frame_encoding() {
        let frame = AudioFrameMessage::encode(&[0u8, 1, 2, 3]);
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"audio_data":"AAECAw=="}"#);
    }

    #[test]
    fn test_terminate_message_serialization() {
        let json = serde_json::to_string(&TerminateSessionMessage::default()).unwrap();
        assert_eq!(json, r#"{"terminate_session":true}"#);
    }

    #[test]
    fn test_config_frame_serialization() {
        let config = StreamingConfig::default().with_word_boost(["fader", "mute"]);
        let frame = SessionConfigMessage::from_config(&config);
        let json = serde_json::to_string(&frame).unwrap();

        assert!(json.contains(r#""sample_rate":16000"#));
        assert!(json.contains(r#""language_code":"en-US""#));
        assert!(json.contains(r#""punctuate":true"#));
        assert!(json.contains(r#""format_text":true"#));
        assert!(json.contains(r#""enable_extra_session_information":true"#));
        assert!(json.contains(r#""word_boost":["fader","mute"]"#));
    }
}
