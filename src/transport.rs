//! The opaque messaging-protocol capability the session drives.
//!
//! Framing, encryption handshake and device-pairing cryptography all live
//! behind [`Transport`]; the session only sees connect/send/disconnect plus
//! an asynchronous event stream.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::credentials::Credentials;

/// Events a connected transport emits, in arrival order.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A pairing QR payload was issued (supersedes any previous one).
    QrIssued(String),
    /// The connection is open and authenticated.
    Opened,
    /// The connection closed. The event stream ends after this.
    Closed(CloseReason),
    /// The remote rotated key material; persist it or lose the session on
    /// the next restart.
    CredentialsUpdated(Credentials),
}

/// Why a connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The user unlinked this device. Reconnecting is pointless until a
    /// fresh QR pairing happens.
    LoggedOut,
    ConnectionLost,
    StreamError(String),
}

impl CloseReason {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CloseReason::LoggedOut)
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::LoggedOut => write!(f, "logged out"),
            CloseReason::ConnectionLost => write!(f, "connection lost"),
            CloseReason::StreamError(detail) => write!(f, "stream error: {detail}"),
        }
    }
}

/// Provider acknowledgement for a sent message.
#[derive(Debug, Clone, Default)]
pub struct SendReceipt {
    /// Provider-assigned message id, when the provider supplied one.
    pub message_id: Option<String>,
}

/// A live connection: the send handle plus its event stream.
pub struct TransportSession {
    pub handle: Arc<dyn TransportHandle>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Factory for connections. One `connect` call yields at most one live
/// connection; the session guarantees the previous one is torn down first.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, creds: Option<Credentials>) -> Result<TransportSession>;
}

/// Send side of a live connection.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Deliver a text message to a fully-qualified JID.
    async fn send_text(&self, jid: &str, body: &str) -> Result<SendReceipt>;

    /// Tear the connection down. Idempotent.
    async fn disconnect(&self);
}

// ── Loopback transport ───────────────────────────────────────────

/// In-process transport for development and end-to-end exercising of the
/// control API: unpaired sessions get a QR and "scan" themselves after a
/// short delay, paired sessions open immediately, and sends are
/// acknowledged with generated ids.
#[derive(Default)]
pub struct LoopbackTransport;

/// How long the loopback QR stays on screen before the fake scan completes.
const LOOPBACK_PAIR_DELAY_MS: u64 = 2_000;

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(&self, creds: Option<Credentials>) -> Result<TransportSession> {
        let (tx, rx) = mpsc::channel(16);

        let feeder = tokio::spawn(async move {
            if creds.is_none() {
                let payload = format!("loopback-pairing:{}", uuid::Uuid::new_v4());
                if tx.send(TransportEvent::QrIssued(payload)).await.is_err() {
                    return;
                }
                tokio::time::sleep(std::time::Duration::from_millis(LOOPBACK_PAIR_DELAY_MS)).await;
                let creds = Credentials::new(
                    format!("loopback-{}", uuid::Uuid::new_v4()),
                    uuid::Uuid::new_v4().as_bytes(),
                );
                if tx
                    .send(TransportEvent::CredentialsUpdated(creds))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            let _ = tx.send(TransportEvent::Opened).await;
            // Keep the channel open for the lifetime of the handle; the
            // session synthesizes a close when the stream ends.
            tx.closed().await;
        });

        Ok(TransportSession {
            handle: Arc::new(LoopbackHandle { feeder }),
            events: rx,
        })
    }
}

struct LoopbackHandle {
    feeder: tokio::task::JoinHandle<()>,
}

#[async_trait]
impl TransportHandle for LoopbackHandle {
    async fn send_text(&self, jid: &str, body: &str) -> Result<SendReceipt> {
        tracing::info!("loopback: delivered {} bytes to {jid}", body.len());
        Ok(SendReceipt {
            message_id: Some(uuid::Uuid::new_v4().to_string()),
        })
    }

    async fn disconnect(&self) {
        self.feeder.abort();
    }
}
