pub mod config;
pub mod core;

// Re-export commonly used items for convenience
pub use config::AppSettings;
pub use core::dispatch::{
    CommandResult, ConnectionState, DispatchStatistics, NetworkDispatcher, NetworkTarget,
    TargetType,
};
pub use core::pipeline::{CommandParser, PipelineCoordinator, PipelineOptions};
pub use core::rcp::{
    ChannelOperation, CommandCategory, GlobalOperation, RcpCommand, SceneOperation, VoiceCommand,
    translate,
};
pub use core::stt::{
    RecognizerEndpoint, SessionState, StreamingClient, StreamingConfig, StreamingError,
    StreamingResult, TranscriptionResult,
};
