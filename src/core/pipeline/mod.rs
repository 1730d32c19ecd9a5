//! End-to-end pipeline composition.
//!
//! [`PipelineCoordinator`] wires the streaming client, the command parser,
//! the translator, and the dispatcher together. It holds no transport logic
//! of its own; its job is forwarding transcripts through the parse →
//! translate → dispatch chain and republishing results for UI subscribers.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::core::dispatch::{CommandResult, NetworkDispatcher, NetworkTarget};
use crate::core::rcp::{VoiceCommand, translate};
use crate::core::stt::{
    SessionState, StreamingClient, StreamingConfig, StreamingResult, TranscriptionResult,
};

/// Queue depth for republished command results; slow UI subscribers drop
/// rather than stall the forwarder.
const RESULT_QUEUE_DEPTH: usize = 64;

// =============================================================================
// Command Parser Seam
// =============================================================================

/// Turns raw transcript text into a parsed intent.
///
/// Parsing is a separate collaborator so grammar changes never touch the
/// transport layers. Total by construction: unparseable text maps to
/// [`VoiceCommand::Unknown`], never an error.
pub trait CommandParser: Send + Sync {
    fn parse(&self, text: &str) -> VoiceCommand;
}

impl<F> CommandParser for F
where
    F: Fn(&str) -> VoiceCommand + Send + Sync,
{
    fn parse(&self, text: &str) -> VoiceCommand {
        self(text)
    }
}

// =============================================================================
// PipelineCoordinator
// =============================================================================

/// Forwarding policy for the transcript stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Dispatch partial transcripts that clear the confidence threshold, in
    /// addition to finals. Off by default; partials are noisy.
    pub dispatch_partials: bool,
}

/// Owns the full speech → command → console chain.
pub struct PipelineCoordinator {
    client: StreamingClient,
    parser: Arc<dyn CommandParser>,
    dispatcher: Arc<NetworkDispatcher>,
    target: NetworkTarget,
    options: PipelineOptions,
    result_rx: Option<mpsc::Receiver<CommandResult>>,
    forward_handle: Option<tokio::task::JoinHandle<()>>,
}

impl PipelineCoordinator {
    pub fn new(
        client: StreamingClient,
        parser: Arc<dyn CommandParser>,
        dispatcher: Arc<NetworkDispatcher>,
        target: NetworkTarget,
    ) -> Self {
        Self {
            client,
            parser,
            dispatcher,
            target,
            options: PipelineOptions::default(),
            result_rx: None,
            forward_handle: None,
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Start listening and forwarding. Suspends until the recognizer
    /// handshake completes or fails.
    pub async fn start(&mut self, config: StreamingConfig) -> StreamingResult<()> {
        let threshold = config.confidence_threshold;
        self.client.start(config).await?;

        let Some(transcripts) = self.client.take_transcripts() else {
            // Idempotent start while connected: the forward task from the
            // first start is still running.
            debug!("pipeline already forwarding; start() reused the session");
            return Ok(());
        };

        if let Some(handle) = self.forward_handle.take() {
            handle.abort();
        }

        let (result_tx, result_rx) = mpsc::channel(RESULT_QUEUE_DEPTH);
        self.result_rx = Some(result_rx);

        self.forward_handle = Some(tokio::spawn(forward_transcripts(
            transcripts,
            self.parser.clone(),
            self.dispatcher.clone(),
            self.target.clone(),
            self.options,
            threshold,
            result_tx,
        )));

        info!(target = %self.target.endpoint_url(), "pipeline started");
        Ok(())
    }

    /// Begin graceful shutdown of the speech session. Non-blocking; watch
    /// the state stream for completion.
    pub fn stop(&self) {
        self.client.stop();
    }

    /// Hard stop for app-termination paths.
    pub async fn force_cleanup(&mut self) {
        self.client.force_cleanup().await;
        if let Some(handle) = self.forward_handle.take() {
            handle.abort();
        }
    }

    /// Enqueue one audio frame for recognition.
    pub fn push_audio(&self, frame: bytes::Bytes) {
        self.client.push_audio(frame);
    }

    /// Take the stream of dispatch outcomes for the current session.
    pub fn take_command_results(&mut self) -> Option<mpsc::Receiver<CommandResult>> {
        self.result_rx.take()
    }

    /// Subscribe to speech session state changes.
    pub fn session_states(&self) -> watch::Receiver<SessionState> {
        self.client.session_states()
    }

    pub fn session_state(&self) -> SessionState {
        self.client.state()
    }

    pub fn dispatcher(&self) -> &Arc<NetworkDispatcher> {
        &self.dispatcher
    }
}

/// Pump transcripts through parse → translate → dispatch until the session's
/// transcript stream ends.
async fn forward_transcripts(
    mut transcripts: mpsc::Receiver<TranscriptionResult>,
    parser: Arc<dyn CommandParser>,
    dispatcher: Arc<NetworkDispatcher>,
    target: NetworkTarget,
    options: PipelineOptions,
    threshold: f32,
    result_tx: mpsc::Sender<CommandResult>,
) {
    while let Some(transcript) = transcripts.recv().await {
        let eligible = transcript.is_final
            || (options.dispatch_partials && transcript.confidence >= threshold);
        if !eligible {
            debug!(
                confidence = transcript.confidence,
                "partial transcript held back"
            );
            continue;
        }

        let intent = parser.parse(&transcript.text);
        if matches!(intent, VoiceCommand::Unknown) {
            debug!(text = %transcript.text, "no command recognized in transcript");
        }

        let command = translate(&intent, transcript.confidence);
        info!(command = %command.command, description = %command.description, "dispatching voice command");

        let result = dispatcher.dispatch(&command, &target).await;
        if result_tx.try_send(result).is_err() {
            warn!("command result dropped: subscriber lagging or gone");
        }
    }

    debug!("transcript stream ended; forwarder exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rcp::{ChannelOperation, GlobalOperation};

    struct FixedParser(VoiceCommand);

    impl CommandParser for FixedParser {
        fn parse(&self, _text: &str) -> VoiceCommand {
            self.0.clone()
        }
    }

    #[test]
    fn test_closure_parser_impl() {
        let parser = |text: &str| {
            if text.contains("mute") {
                VoiceCommand::Channel {
                    number: 1,
                    operation: ChannelOperation::MuteOn,
                    value: None,
                }
            } else {
                VoiceCommand::Unknown
            }
        };

        assert!(matches!(
            CommandParser::parse(&parser, "mute channel one"),
            VoiceCommand::Channel { .. }
        ));
        assert!(matches!(
            CommandParser::parse(&parser, "hello"),
            VoiceCommand::Unknown
        ));
    }

    #[tokio::test]
    async fn test_forwarder_skips_low_confidence_partials() {
        let (transcript_tx, transcript_rx) = mpsc::channel(8);
        let (result_tx, mut result_rx) = mpsc::channel(8);

        let parser: Arc<dyn CommandParser> = Arc::new(FixedParser(VoiceCommand::Global {
            operation: GlobalOperation::StatusQuery,
        }));
        let dispatcher = Arc::new(NetworkDispatcher::new());
        // Blank host makes each dispatch fail fast without touching a socket.
        let target = NetworkTarget::console("");
        let options = PipelineOptions {
            dispatch_partials: true,
        };

        let handle = tokio::spawn(forward_transcripts(
            transcript_rx,
            parser,
            dispatcher.clone(),
            target,
            options,
            0.5,
            result_tx,
        ));

        transcript_tx
            .send(TranscriptionResult::new("status", false, 0.2))
            .await
            .unwrap();
        transcript_tx
            .send(TranscriptionResult::new("status", false, 0.9))
            .await
            .unwrap();
        transcript_tx
            .send(TranscriptionResult::new("status", true, 0.1))
            .await
            .unwrap();
        drop(transcript_tx);
        handle.await.unwrap();

        // Low-confidence partial is held back; high-confidence partial and
        // the final both go through.
        assert!(result_rx.recv().await.is_some());
        assert!(result_rx.recv().await.is_some());
        assert!(result_rx.recv().await.is_none());
        assert_eq!(dispatcher.statistics().sent, 2);
    }

    #[tokio::test]
    async fn test_forwarder_ignores_partials_by_default() {
        let (transcript_tx, transcript_rx) = mpsc::channel(8);
        let (result_tx, mut result_rx) = mpsc::channel(8);

        let parser: Arc<dyn CommandParser> = Arc::new(FixedParser(VoiceCommand::Unknown));
        let dispatcher = Arc::new(NetworkDispatcher::new());
        let target = NetworkTarget::console("");

        let handle = tokio::spawn(forward_transcripts(
            transcript_rx,
            parser,
            dispatcher.clone(),
            target,
            PipelineOptions::default(),
            0.5,
            result_tx,
        ));

        transcript_tx
            .send(TranscriptionResult::new("anything", false, 0.99))
            .await
            .unwrap();
        drop(transcript_tx);
        handle.await.unwrap();

        assert!(result_rx.recv().await.is_none());
        assert_eq!(dispatcher.statistics().sent, 0);
    }
}
