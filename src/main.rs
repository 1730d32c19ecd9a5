//! Streams raw PCM16LE audio from stdin through the recognition pipeline
//! and dispatches the resulting console commands.
//!
//! Configuration comes from the environment (or a `.env` file); see
//! `config::AppSettings` for the variable names. Ctrl-C triggers graceful
//! shutdown: audio stops immediately, the session waits briefly for the
//! final transcript, then closes.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use rcp_voice::core::pipeline::{PipelineCoordinator, PipelineOptions};
use rcp_voice::core::rcp::{
    ChannelOperation, GlobalOperation, SceneOperation, VoiceCommand,
};
use rcp_voice::{AppSettings, NetworkDispatcher, SessionState, StreamingClient};

/// 100 ms of 16 kHz mono PCM16LE per frame.
const FRAME_BYTES: usize = 3200;

/// Minimal phrase matcher standing in for a full grammar. Anything it does
/// not recognize maps to [`VoiceCommand::Unknown`], which the translator
/// turns into a harmless status query.
fn parse_phrase(text: &str) -> VoiceCommand {
    let lower = text.to_lowercase();
    let number = lower
        .split_whitespace()
        .find_map(|word| word.trim_matches(|c: char| !c.is_ascii_digit()).parse().ok())
        .unwrap_or(1u32);

    if lower.contains("unmute") {
        if lower.contains("all") {
            VoiceCommand::Global {
                operation: GlobalOperation::UnmuteAll,
            }
        } else {
            VoiceCommand::Channel {
                number,
                operation: ChannelOperation::MuteOff,
                value: None,
            }
        }
    } else if lower.contains("mute") {
        if lower.contains("all") {
            VoiceCommand::Global {
                operation: GlobalOperation::MuteAll,
            }
        } else {
            VoiceCommand::Channel {
                number,
                operation: ChannelOperation::MuteOn,
                value: None,
            }
        }
    } else if lower.contains("recall") {
        VoiceCommand::Scene {
            number,
            operation: SceneOperation::Recall,
        }
    } else if lower.contains("status") {
        VoiceCommand::Global {
            operation: GlobalOperation::StatusQuery,
        }
    } else {
        VoiceCommand::Unknown
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if it exists (must be done before settings loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let settings = AppSettings::from_env()?;

    let dispatcher = Arc::new(NetworkDispatcher::new());
    let target = settings.network_target();

    // Validate the target before any speech flows.
    let probe = dispatcher.test_connection(&target).await;
    if !probe.success {
        warn!(
            error = probe.error_message.as_deref().unwrap_or("unknown"),
            "dispatch target unreachable; commands will fail until it comes up"
        );
    }

    let client = StreamingClient::new(settings.recognizer_endpoint());
    let mut pipeline = PipelineCoordinator::new(
        client,
        Arc::new(parse_phrase),
        dispatcher.clone(),
        target,
    )
    .with_options(PipelineOptions::default());

    pipeline.start(settings.streaming_config()).await?;
    let mut states = pipeline.session_states();

    let mut results = pipeline
        .take_command_results()
        .ok_or("command result stream unavailable")?;
    tokio::spawn(async move {
        while let Some(result) = results.recv().await {
            if result.success {
                info!(
                    command = %result.command,
                    elapsed_ms = result.execution_time_ms,
                    "command delivered"
                );
            } else {
                warn!(
                    command = %result.command,
                    error = result.error_message.as_deref().unwrap_or("unknown"),
                    "command failed"
                );
            }
        }
    });

    info!("streaming audio from stdin; Ctrl-C to stop");
    let mut stdin = tokio::io::stdin();
    let mut buf = vec![0u8; FRAME_BYTES];

    loop {
        tokio::select! {
            read = stdin.read(&mut buf) => match read {
                Ok(0) => {
                    info!("audio input ended; stopping");
                    pipeline.stop();
                    break;
                }
                Ok(n) => pipeline.push_audio(Bytes::copy_from_slice(&buf[..n])),
                Err(e) => {
                    warn!("audio input error: {e}; stopping");
                    pipeline.stop();
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received; stopping");
                pipeline.stop();
                break;
            }
        }
    }

    // Wait for graceful shutdown to run its course.
    while states.changed().await.is_ok() {
        let state = *states.borrow();
        info!(%state, "session state");
        if matches!(state, SessionState::Disconnected | SessionState::Error) {
            break;
        }
    }

    let stats = dispatcher.statistics();
    info!(
        sent = stats.sent,
        succeeded = stats.succeeded,
        failed = stats.failed,
        success_rate = stats.success_rate,
        "dispatch statistics"
    );

    Ok(())
}
