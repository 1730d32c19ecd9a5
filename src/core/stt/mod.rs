//! Speech-to-text streaming layer.
//!
//! Wraps the recognizer's realtime websocket protocol: JSON text frames with
//! a `message_type` discriminator inbound, base64 audio frames outbound. The
//! public surface is [`StreamingClient`] plus the configuration and result
//! types it produces.

pub mod client;
pub mod config;
pub mod messages;
pub mod types;

pub use client::{
    MAX_RECONNECT_ATTEMPTS, RECONNECT_BASE_DELAY, SHUTDOWN_TIMEOUT, StreamingClient,
};
pub use config::{ALLOWED_SAMPLE_RATES, DEFAULT_RECOGNIZER_URL, RecognizerEndpoint, StreamingConfig};
pub use messages::InboundMessage;
pub use types::{SessionState, StreamingError, StreamingResult, TranscriptionResult};
