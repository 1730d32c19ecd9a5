//! HTTP command dispatch with health tracking.
//!
//! [`NetworkDispatcher`] delivers one console command per call as an HTTP
//! POST and classifies the outcome; it never retries on its own — retry
//! policy belongs to the caller. Cumulative counters and the last test
//! result are kept for the lifetime of the dispatcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::target::NetworkTarget;
use crate::core::rcp::RcpCommand;

/// Body content type for console commands.
const RCP_CONTENT_TYPE: &str = "application/x-rcp";

// =============================================================================
// Result & State Types
// =============================================================================

/// Dispatcher-side connection health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Testing,
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Testing => "testing",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Outcome of one dispatch or connectivity test. Never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// The wire command that was attempted (empty for connectivity tests).
    pub command: String,
    pub success: bool,
    pub response_code: Option<u16>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
    pub timestamp: SystemTime,
}

impl CommandResult {
    fn success(command: String, code: u16, body: Option<String>, elapsed: Duration) -> Self {
        Self {
            command,
            success: true,
            response_code: Some(code),
            response_body: body,
            error_message: None,
            execution_time_ms: elapsed.as_millis() as u64,
            timestamp: SystemTime::now(),
        }
    }

    fn failure(
        command: String,
        code: Option<u16>,
        message: String,
        elapsed: Duration,
    ) -> Self {
        Self {
            command,
            success: false,
            response_code: code,
            response_body: None,
            error_message: Some(message),
            execution_time_ms: elapsed.as_millis() as u64,
            timestamp: SystemTime::now(),
        }
    }
}

/// Read-only snapshot of dispatcher health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchStatistics {
    pub sent: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// succeeded / sent, or 0.0 before the first dispatch.
    pub success_rate: f64,
    pub state: ConnectionState,
    pub last_connection: Option<SystemTime>,
    pub last_test_result: Option<CommandResult>,
}

// =============================================================================
// NetworkDispatcher
// =============================================================================

/// Delivers console commands over HTTP and tracks delivery health.
pub struct NetworkDispatcher {
    http: reqwest::Client,
    state: RwLock<ConnectionState>,
    sent: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    last_connection: RwLock<Option<SystemTime>>,
    last_test_result: RwLock<Option<CommandResult>>,
}

impl Default for NetworkDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkDispatcher {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            state: RwLock::new(ConnectionState::Disconnected),
            sent: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            last_connection: RwLock::new(None),
            last_test_result: RwLock::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Deliver one command to the target. One request per call, no
    /// pipelining, no automatic retry.
    ///
    /// Success requires transport-level delivery and a 2xx status; timeouts,
    /// refused connections, and non-2xx responses all count as ordinary
    /// failures with a populated `error_message`.
    pub async fn dispatch(&self, command: &RcpCommand, target: &NetworkTarget) -> CommandResult {
        self.sent.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        if !target.has_host() {
            // Configuration error, not a network one; fail before touching
            // the socket.
            self.failed.fetch_add(1, Ordering::Relaxed);
            warn!("dispatch refused: no target IP configured");
            return CommandResult::failure(
                command.command.clone(),
                None,
                "No target IP configured".to_string(),
                started.elapsed(),
            );
        }

        debug!(target = %target.endpoint_url(), command = %command.command, "dispatching");

        let request = self
            .http
            .post(target.endpoint_url())
            .header(reqwest::header::CONTENT_TYPE, RCP_CONTENT_TYPE)
            .body(command.command.clone())
            .timeout(target.timeout);

        let result = match request.send().await {
            Ok(response) => {
                let code = response.status().as_u16();
                let body = response.text().await.ok();
                if (200..=299).contains(&code) {
                    CommandResult::success(command.command.clone(), code, body, started.elapsed())
                } else {
                    CommandResult::failure(
                        command.command.clone(),
                        Some(code),
                        format!("Receiver returned status {code}"),
                        started.elapsed(),
                    )
                }
            }
            Err(e) if e.is_timeout() => CommandResult::failure(
                command.command.clone(),
                None,
                format!("Request timed out after {:?}", target.timeout),
                started.elapsed(),
            ),
            Err(e) if e.is_connect() => CommandResult::failure(
                command.command.clone(),
                None,
                format!("Connection failed: {e}"),
                started.elapsed(),
            ),
            Err(e) => CommandResult::failure(
                command.command.clone(),
                None,
                format!("Request failed: {e}"),
                started.elapsed(),
            ),
        };

        if result.success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
            *self.state.write() = ConnectionState::Connected;
            *self.last_connection.write() = Some(SystemTime::now());
            debug!(
                elapsed_ms = result.execution_time_ms,
                code = ?result.response_code,
                "command delivered"
            );
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
            *self.state.write() = ConnectionState::Error;
            warn!(
                error = result.error_message.as_deref().unwrap_or("unknown"),
                "dispatch failed"
            );
        }

        result
    }

    /// Probe the target by opening and closing a raw socket, without sending
    /// any command. Used to validate settings before real traffic flows.
    pub async fn test_connection(&self, target: &NetworkTarget) -> CommandResult {
        let started = Instant::now();
        *self.state.write() = ConnectionState::Testing;

        let result = if !target.has_host() {
            CommandResult::failure(
                String::new(),
                None,
                "No target IP configured".to_string(),
                started.elapsed(),
            )
        } else {
            match timeout(target.timeout, TcpStream::connect(target.socket_addr_string())).await {
                Ok(Ok(stream)) => {
                    drop(stream);
                    info!(target = %target.socket_addr_string(), "connectivity test passed");
                    CommandResult::success(String::new(), 200, None, started.elapsed())
                }
                Ok(Err(e)) => CommandResult::failure(
                    String::new(),
                    None,
                    format!("Connection failed: {e}"),
                    started.elapsed(),
                ),
                Err(_elapsed) => CommandResult::failure(
                    String::new(),
                    None,
                    format!("Connection test timed out after {:?}", target.timeout),
                    started.elapsed(),
                ),
            }
        };

        *self.state.write() = if result.success {
            *self.last_connection.write() = Some(SystemTime::now());
            ConnectionState::Connected
        } else {
            ConnectionState::Error
        };
        *self.last_test_result.write() = Some(result.clone());

        result
    }

    /// Snapshot of cumulative counters and last known health.
    pub fn statistics(&self) -> DispatchStatistics {
        let sent = self.sent.load(Ordering::Relaxed);
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let success_rate = if sent == 0 {
            0.0
        } else {
            succeeded as f64 / sent as f64
        };

        DispatchStatistics {
            sent,
            succeeded,
            failed,
            success_rate,
            state: self.state(),
            last_connection: *self.last_connection.read(),
            last_test_result: self.last_test_result.read().clone(),
        }
    }

    /// Zero the counters and forget the last test result. Connection state
    /// is left as-is.
    pub fn reset_statistics(&self) {
        self.sent.store(0, Ordering::Relaxed);
        self.succeeded.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        *self.last_connection.write() = None;
        *self.last_test_result.write() = None;
    }
}
