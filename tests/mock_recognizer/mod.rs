//! Scriptable mock recognition service.
//!
//! Accepts a single websocket connection and records every text frame the
//! client sends; tests drive the server side by pushing JSON messages
//! through [`MockRecognizer::send`].

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub struct MockRecognizer {
    pub url: String,
    script_tx: mpsc::UnboundedSender<Value>,
    frames: Arc<Mutex<Vec<Value>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockRecognizer {
    /// Bind an ephemeral port and serve one websocket connection.
    pub async fn spawn() -> Self {
        Self::spawn_with_upgrade_delay(Duration::ZERO).await
    }

    /// Like [`spawn`](Self::spawn), but hold the accepted TCP connection for
    /// `delay` before completing the websocket upgrade. Lets tests make the
    /// handshake outlive a client-side wait.
    pub async fn spawn_with_upgrade_delay(delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock recognizer");
        let addr = listener.local_addr().expect("local addr");
        let url = format!("ws://{addr}");

        let (script_tx, mut script_rx) = mpsc::unbounded_channel::<Value>();
        let frames: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let frames_server = frames.clone();

        let handle = tokio::spawn(async move {
            let Ok((stream, _peer)) = listener.accept().await else {
                return;
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let Ok(ws) = accept_async(stream).await else {
                return;
            };
            let (mut write, mut read) = ws.split();

            loop {
                tokio::select! {
                    scripted = script_rx.recv() => match scripted {
                        Some(value) => {
                            if write
                                .send(Message::Text(value.to_string().into()))
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        None => break,
                    },
                    incoming = read.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                                frames_server.lock().push(value);
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    },
                }
            }
        });

        Self {
            url,
            script_tx,
            frames,
            handle,
        }
    }

    /// Queue one message for delivery to the client.
    pub fn send(&self, message: Value) {
        self.script_tx.send(message).expect("mock server gone");
    }

    /// Snapshot of every JSON text frame received so far.
    pub fn received_frames(&self) -> Vec<Value> {
        self.frames.lock().clone()
    }

    /// Block until a frame matching `predicate` has arrived.
    pub async fn wait_for_frame<F>(&self, predicate: F, deadline: Duration)
    where
        F: Fn(&Value) -> bool,
    {
        let poll = async {
            loop {
                if self.frames.lock().iter().any(&predicate) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(deadline, poll)
            .await
            .expect("expected frame never arrived");
    }

    /// Wait until the client has pushed at least `count` audio frames.
    pub async fn wait_for_audio(&self, count: usize, deadline: Duration) {
        let poll = async {
            loop {
                let seen = self
                    .frames
                    .lock()
                    .iter()
                    .filter(|f| f.get("audio_data").is_some())
                    .count();
                if seen >= count {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(deadline, poll)
            .await
            .expect("expected audio frames never arrived");
    }

    /// Wait for the client's session-termination message.
    pub async fn wait_for_terminate(&self, deadline: Duration) {
        self.wait_for_frame(|f| f.get("terminate_session").is_some(), deadline)
            .await;
    }
}

impl Drop for MockRecognizer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// =============================================================================
// Message Builders
// =============================================================================

pub fn session_begins(session_id: &str) -> Value {
    json!({
        "message_type": "SessionBegins",
        "session_id": session_id,
        "expires_at": "2026-01-01T00:00:00Z",
    })
}

pub fn partial_transcript(text: &str, confidence: &str) -> Value {
    json!({
        "message_type": "PartialTranscript",
        "text": text,
        "confidence": confidence,
        "audio_start": 0,
        "audio_end": 500,
    })
}

pub fn final_transcript(text: &str, confidence: &str, formatted: bool) -> Value {
    json!({
        "message_type": "FinalTranscript",
        "text": text,
        "confidence": confidence,
        "audio_start": 0,
        "audio_end": 1200,
        "punctuated": true,
        "text_formatted": formatted,
    })
}

pub fn session_ended() -> Value {
    json!({
        "message_type": "SessionEnded",
        "session_id": "mock-session",
    })
}
