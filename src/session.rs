//! Session lifecycle state machine.
//!
//! One process, one session. All state transitions go through a single
//! `parking_lot::Mutex`, the transport event loop runs one event at a time,
//! and reconnects are scheduled through generation-checked timers so a
//! superseded timer can never resurrect a stale connection.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::credentials::CredentialStore;
use crate::error::BridgeError;
use crate::transport::{CloseReason, Transport, TransportEvent, TransportHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
        }
    }
}

/// Point-in-time view of the session, shaped for the `/status` route.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusSnapshot {
    pub connected: bool,
    pub status: ConnectionStatus,
}

/// Flat reconnect delays. The close-triggered delay is short; the
/// startup-failure delay is longer so a persistent misconfiguration
/// does not crash-loop against the remote service.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub close_retry: Duration,
    pub start_retry: Duration,
}

/// How recipients are turned into transport addresses.
#[derive(Debug, Clone)]
pub struct Addressing {
    pub country_prefix: String,
    pub jid_suffix: String,
}

struct SessionState {
    status: ConnectionStatus,
    pending_qr: Option<String>,
    reconnect_attempt: u32,
    /// Bumped on every transport start or shutdown. Events and timers carry
    /// the generation they were created under; a mismatch means they belong
    /// to a transport that no longer exists.
    generation: u64,
    handle: Option<Arc<dyn TransportHandle>>,
}

/// Owns the session state machine and arbitrates all access to the single
/// transport instance.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    store: CredentialStore,
    policy: ReconnectPolicy,
    addressing: Addressing,
    state: Mutex<SessionState>,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: CredentialStore,
        policy: ReconnectPolicy,
        addressing: Addressing,
    ) -> Self {
        Self {
            transport,
            store,
            policy,
            addressing,
            state: Mutex::new(SessionState {
                status: ConnectionStatus::Disconnected,
                pending_qr: None,
                reconnect_attempt: 0,
                generation: 0,
                handle: None,
            }),
        }
    }

    /// Connect the transport and begin processing its events.
    ///
    /// Idempotent: a no-op when the session is already connecting or
    /// connected. Replacing the transport on every call risks transient
    /// double-connections; callers who really want a fresh transport
    /// should `shutdown()` first.
    ///
    /// Failures are absorbed: a connect error logs, leaves the session
    /// disconnected, and schedules a retry after the startup delay.
    pub async fn start(self: Arc<Self>) {
        let generation = {
            let mut st = self.state.lock();
            if st.status != ConnectionStatus::Disconnected {
                tracing::debug!("start ignored: session already {}", st.status);
                return;
            }
            st.status = ConnectionStatus::Connecting;
            st.pending_qr = None;
            st.generation += 1;
            st.generation
        };

        let creds = match self.store.load().await {
            Ok(creds) => creds,
            Err(e) => {
                tracing::warn!("failed to load stored credentials, pairing from scratch: {e:#}");
                None
            }
        };
        if creds.is_some() {
            tracing::info!("resuming session from stored credentials");
        } else {
            tracing::info!("no stored credentials, QR pairing required");
        }

        match self.transport.connect(creds).await {
            Ok(session) => {
                let handle = session.handle.clone();
                let superseded = {
                    let mut st = self.state.lock();
                    if st.generation != generation {
                        true
                    } else {
                        st.handle = Some(handle.clone());
                        false
                    }
                };
                if superseded {
                    // Shutdown raced us while connecting; this transport
                    // must not outlive its generation.
                    handle.disconnect().await;
                    return;
                }
                let mgr = self.clone();
                tokio::spawn(async move { mgr.run_event_loop(generation, session.events).await });
            }
            Err(cause) => {
                let err = BridgeError::TransportStartFailed(cause);
                tracing::error!("{err}");
                {
                    let mut st = self.state.lock();
                    if st.generation == generation {
                        st.status = ConnectionStatus::Disconnected;
                    }
                }
                let delay = self.policy.start_retry;
                self.schedule_reconnect(generation, delay);
            }
        }
    }

    /// Current status. Never blocks on I/O.
    pub fn status(&self) -> StatusSnapshot {
        let st = self.state.lock();
        StatusSnapshot {
            connected: st.status == ConnectionStatus::Connected,
            status: st.status,
        }
    }

    /// The pairing QR payload, if one is on screen.
    pub fn pending_qr(&self) -> Option<String> {
        self.state.lock().pending_qr.clone()
    }

    /// Send a text message. The session lock is held only for the
    /// status/handle snapshot, never across the network call.
    pub async fn send(&self, recipient: &str, body: &str) -> Result<String, BridgeError> {
        let handle = {
            let st = self.state.lock();
            if st.status != ConnectionStatus::Connected {
                return Err(BridgeError::NotConnected(st.status));
            }
            st.handle
                .clone()
                .ok_or(BridgeError::NotConnected(st.status))?
        };

        let jid = self.normalize_recipient(recipient);
        tracing::debug!("sending message to {jid}");
        let receipt = handle
            .send_text(&jid, body)
            .await
            .map_err(BridgeError::SendFailed)?;
        Ok(receipt.message_id.unwrap_or_else(|| "unknown".into()))
    }

    /// Normalize a recipient into the transport's addressing format: keep
    /// only digits, prepend the country prefix when missing, append the
    /// domain suffix.
    pub fn normalize_recipient(&self, recipient: &str) -> String {
        normalize_recipient(
            recipient,
            &self.addressing.country_prefix,
            &self.addressing.jid_suffix,
        )
    }

    /// Close the active transport, if any, and stop all pending reconnects.
    pub async fn shutdown(&self) {
        let handle = {
            let mut st = self.state.lock();
            st.generation += 1;
            st.status = ConnectionStatus::Disconnected;
            st.pending_qr = None;
            st.handle.take()
        };
        if let Some(handle) = handle {
            handle.disconnect().await;
            tracing::info!("transport disconnected");
        }
    }

    async fn run_event_loop(
        self: Arc<Self>,
        generation: u64,
        mut events: mpsc::Receiver<TransportEvent>,
    ) {
        while let Some(event) = events.recv().await {
            if self.state.lock().generation != generation {
                // A newer transport owns the session now.
                return;
            }
            match event {
                TransportEvent::QrIssued(payload) => {
                    match crate::qr::terminal(&payload) {
                        Ok(rendered) => {
                            eprintln!();
                            eprintln!("Pairing QR (scan in WhatsApp > Linked Devices):");
                            eprintln!("{rendered}");
                        }
                        Err(e) => tracing::warn!("failed to render pairing QR in terminal: {e:#}"),
                    }
                    let mut st = self.state.lock();
                    st.status = ConnectionStatus::Connecting;
                    st.pending_qr = Some(payload);
                    tracing::info!("pairing QR issued, waiting for scan");
                }
                TransportEvent::Opened => {
                    let mut st = self.state.lock();
                    st.status = ConnectionStatus::Connected;
                    st.pending_qr = None;
                    st.reconnect_attempt = 0;
                    tracing::info!("session connected");
                }
                TransportEvent::CredentialsUpdated(creds) => {
                    if let Err(e) = self.store.save(&creds).await {
                        // The session keeps running, but will not resume
                        // after a restart.
                        tracing::warn!(
                            "failed to persist credential update, session may not resume after restart: {e:#}"
                        );
                    }
                }
                TransportEvent::Closed(reason) => {
                    self.clone().handle_close(generation, reason).await;
                    return;
                }
            }
        }

        // Event stream ended without a close event: treat it as a lost
        // connection so the reconnect path still runs.
        let still_current = self.state.lock().generation == generation;
        if still_current {
            self.clone()
                .handle_close(generation, CloseReason::ConnectionLost)
                .await;
        }
    }

    async fn handle_close(self: Arc<Self>, generation: u64, reason: CloseReason) {
        let handle = {
            let mut st = self.state.lock();
            if st.generation != generation {
                return;
            }
            st.status = ConnectionStatus::Disconnected;
            st.pending_qr = None;
            st.handle.take()
        };
        if let Some(handle) = handle {
            handle.disconnect().await;
        }

        if reason.is_retryable() {
            let attempt = {
                let mut st = self.state.lock();
                st.reconnect_attempt += 1;
                st.reconnect_attempt
            };
            tracing::warn!(
                "connection closed ({reason}); reconnect attempt {attempt} in {}s",
                self.policy.close_retry.as_secs_f64()
            );
            let delay = self.policy.close_retry;
            self.schedule_reconnect(generation, delay);
        } else {
            tracing::warn!("logged out by the remote service; call start() to pair a new QR");
        }
    }

    /// Arm a reconnect timer for `generation`. When it fires, the timer
    /// re-checks that nothing superseded it: a manual `start()` or a newer
    /// close bumps the generation and the timer becomes a no-op.
    fn schedule_reconnect(self: Arc<Self>, generation: u64, delay: Duration) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let st = self.state.lock();
                if st.generation != generation || st.status != ConnectionStatus::Disconnected {
                    return;
                }
            }
            self.start().await;
        });
    }
}

/// Strip every non-digit, prepend `country_prefix` unless the digits already
/// start with it, then append `jid_suffix`.
pub fn normalize_recipient(recipient: &str, country_prefix: &str, jid_suffix: &str) -> String {
    let digits: String = recipient.chars().filter(|c| c.is_ascii_digit()).collect();
    let number = if digits.starts_with(country_prefix) {
        digits
    } else {
        format!("{country_prefix}{digits}")
    };
    format!("{number}{jid_suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credentials;
    use crate::transport::{SendReceipt, TransportSession};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    // ── Scripted transport ───────────────────────────────────

    /// Transport whose events are pushed by the test. Tracks connection
    /// attempts and how many handles are live at once.
    struct ScriptedTransport {
        event_tx: Mutex<Option<mpsc::Sender<TransportEvent>>>,
        last_creds: Mutex<Option<Credentials>>,
        attempts: AtomicUsize,
        connects: AtomicUsize,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
        fail_connect: AtomicBool,
        fail_send: Arc<AtomicBool>,
        sent: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl ScriptedTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                event_tx: Mutex::new(None),
                last_creds: Mutex::new(None),
                attempts: AtomicUsize::new(0),
                connects: AtomicUsize::new(0),
                active: Arc::new(AtomicUsize::new(0)),
                max_active: Arc::new(AtomicUsize::new(0)),
                fail_connect: AtomicBool::new(false),
                fail_send: Arc::new(AtomicBool::new(false)),
                sent: Arc::new(Mutex::new(Vec::new())),
            })
        }

        async fn emit(&self, event: TransportEvent) {
            let tx = self
                .event_tx
                .lock()
                .clone()
                .expect("transport not connected");
            tx.send(event).await.expect("event loop gone");
        }

        fn connects(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        fn max_active(&self) -> usize {
            self.max_active.load(Ordering::SeqCst)
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn connect(&self, creds: Option<Credentials>) -> anyhow::Result<TransportSession> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_connect.load(Ordering::SeqCst) {
                anyhow::bail!("scripted connect failure");
            }
            self.connects.fetch_add(1, Ordering::SeqCst);
            let live = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(live, Ordering::SeqCst);
            *self.last_creds.lock() = creds;

            let (tx, rx) = mpsc::channel(16);
            *self.event_tx.lock() = Some(tx);
            let handle = Arc::new(ScriptedHandle {
                active: self.active.clone(),
                fail_send: self.fail_send.clone(),
                sent: self.sent.clone(),
                closed: AtomicBool::new(false),
            });
            Ok(TransportSession { handle, events: rx })
        }
    }

    struct ScriptedHandle {
        active: Arc<AtomicUsize>,
        fail_send: Arc<AtomicBool>,
        sent: Arc<Mutex<Vec<(String, String)>>>,
        closed: AtomicBool,
    }

    #[async_trait]
    impl TransportHandle for ScriptedHandle {
        async fn send_text(&self, jid: &str, body: &str) -> anyhow::Result<SendReceipt> {
            if self.fail_send.load(Ordering::SeqCst) {
                anyhow::bail!("scripted send failure");
            }
            self.sent.lock().push((jid.to_string(), body.to_string()));
            Ok(SendReceipt {
                message_id: Some("MOCK-MSG-1".into()),
            })
        }

        async fn disconnect(&self) {
            if !self.closed.swap(true, Ordering::SeqCst) {
                self.active.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────

    fn manager(
        transport: Arc<ScriptedTransport>,
        dir: &tempfile::TempDir,
    ) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            transport,
            CredentialStore::new(dir.path().join("credentials.json")),
            ReconnectPolicy {
                close_retry: Duration::from_millis(100),
                start_retry: Duration::from_millis(200),
            },
            Addressing {
                country_prefix: "55".into(),
                jid_suffix: "@s.whatsapp.net".into(),
            },
        ))
    }

    async fn wait_until(what: &str, cond: impl Fn() -> bool) {
        for _ in 0..300 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for: {what}");
    }

    // ── Normalization ────────────────────────────────────────

    #[test]
    fn normalization_strips_punctuation_and_applies_prefix_suffix() {
        assert_eq!(
            normalize_recipient("(11) 98888-7777", "55", "@x"),
            "5511988887777@x"
        );
    }

    #[test]
    fn normalization_keeps_existing_prefix() {
        assert_eq!(
            normalize_recipient("5511988887777", "55", "@s.whatsapp.net"),
            "5511988887777@s.whatsapp.net"
        );
    }

    #[test]
    fn normalization_is_idempotent_on_its_own_digits() {
        let first = normalize_recipient("+55 (11) 98888-7777", "55", "@x");
        let digits: String = first.chars().filter(|c| c.is_ascii_digit()).collect();
        assert_eq!(normalize_recipient(&digits, "55", "@x"), first);
    }

    #[test]
    fn normalization_ignores_letters() {
        assert_eq!(normalize_recipient("tel:11 9 8888 7777", "55", "@x"), "5511988887777@x");
    }

    // ── Lifecycle ────────────────────────────────────────────

    #[tokio::test]
    async fn fresh_start_goes_connecting_then_qr_then_connected() {
        let transport = ScriptedTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(transport.clone(), &dir);

        mgr.clone().start().await;
        assert_eq!(mgr.status().status, ConnectionStatus::Connecting);
        assert_eq!(mgr.pending_qr(), None);
        assert!(transport.last_creds.lock().is_none());

        transport
            .emit(TransportEvent::QrIssued("payload-1".into()))
            .await;
        wait_until("QR visible", || mgr.pending_qr().is_some()).await;
        assert_eq!(mgr.pending_qr().as_deref(), Some("payload-1"));

        transport.emit(TransportEvent::Opened).await;
        wait_until("connected", || mgr.status().connected).await;
        assert_eq!(mgr.status().status, ConnectionStatus::Connected);
        assert_eq!(mgr.pending_qr(), None);
    }

    #[tokio::test]
    async fn newer_qr_supersedes_pending_one() {
        let transport = ScriptedTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(transport.clone(), &dir);

        mgr.clone().start().await;
        transport
            .emit(TransportEvent::QrIssued("payload-1".into()))
            .await;
        transport
            .emit(TransportEvent::QrIssued("payload-2".into()))
            .await;
        wait_until("second QR", || {
            mgr.pending_qr().as_deref() == Some("payload-2")
        })
        .await;
        assert_eq!(mgr.status().status, ConnectionStatus::Connecting);
    }

    #[tokio::test]
    async fn start_is_a_noop_while_connecting_or_connected() {
        let transport = ScriptedTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(transport.clone(), &dir);

        mgr.clone().start().await;
        mgr.clone().start().await;
        assert_eq!(transport.connects(), 1);

        transport.emit(TransportEvent::Opened).await;
        wait_until("connected", || mgr.status().connected).await;
        mgr.clone().start().await;
        assert_eq!(transport.connects(), 1);
    }

    #[tokio::test]
    async fn stored_credentials_are_passed_to_the_transport() {
        let transport = ScriptedTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(transport.clone(), &dir);

        let creds = Credentials::new("device-7", b"keys");
        mgr.store.save(&creds).await.unwrap();

        mgr.clone().start().await;
        assert_eq!(transport.last_creds.lock().clone(), Some(creds));
    }

    #[tokio::test]
    async fn credential_updates_are_persisted() {
        let transport = ScriptedTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(transport.clone(), &dir);

        mgr.clone().start().await;
        let creds = Credentials::new("device-9", b"rotated");
        transport
            .emit(TransportEvent::CredentialsUpdated(creds.clone()))
            .await;

        let store = CredentialStore::new(dir.path().join("credentials.json"));
        for _ in 0..300 {
            if let Ok(Some(got)) = store.load().await {
                assert_eq!(got, creds);
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("credential update never reached disk");
    }

    // ── Close handling ───────────────────────────────────────

    #[tokio::test]
    async fn logout_close_disables_auto_reconnect() {
        let transport = ScriptedTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(transport.clone(), &dir);

        mgr.clone().start().await;
        transport.emit(TransportEvent::Opened).await;
        wait_until("connected", || mgr.status().connected).await;

        transport
            .emit(TransportEvent::Closed(CloseReason::LoggedOut))
            .await;
        wait_until("disconnected", || {
            mgr.status().status == ConnectionStatus::Disconnected
        })
        .await;

        // Well past the retry delay: still exactly one connect.
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(transport.connects(), 1);
        assert_eq!(mgr.status().status, ConnectionStatus::Disconnected);

        // Manual start pairs again.
        mgr.clone().start().await;
        assert_eq!(transport.connects(), 2);
    }

    #[tokio::test]
    async fn retryable_close_schedules_exactly_one_reconnect() {
        let transport = ScriptedTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(transport.clone(), &dir);

        mgr.clone().start().await;
        transport.emit(TransportEvent::Opened).await;
        wait_until("connected", || mgr.status().connected).await;

        transport
            .emit(TransportEvent::Closed(CloseReason::ConnectionLost))
            .await;
        wait_until("reconnected", || transport.connects() == 2).await;

        // No further attempts pile up, and handles never overlapped.
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(transport.connects(), 2);
        assert_eq!(transport.max_active(), 1);
    }

    #[tokio::test]
    async fn manual_start_supersedes_a_pending_reconnect_timer() {
        let transport = ScriptedTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(transport.clone(), &dir);

        mgr.clone().start().await;
        transport.emit(TransportEvent::Opened).await;
        wait_until("connected", || mgr.status().connected).await;

        transport
            .emit(TransportEvent::Closed(CloseReason::ConnectionLost))
            .await;
        wait_until("disconnected", || {
            mgr.status().status == ConnectionStatus::Disconnected
        })
        .await;

        // Beat the 100ms timer with a manual start.
        mgr.clone().start().await;
        assert_eq!(transport.connects(), 2);

        // The stale timer fires into a newer generation and does nothing.
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(transport.connects(), 2);
        assert_eq!(transport.max_active(), 1);
    }

    #[tokio::test]
    async fn dropped_event_stream_counts_as_connection_loss() {
        let transport = ScriptedTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(transport.clone(), &dir);

        mgr.clone().start().await;
        transport.emit(TransportEvent::Opened).await;
        wait_until("connected", || mgr.status().connected).await;

        // Drop the sender: the event loop synthesizes a close and reconnects.
        *transport.event_tx.lock() = None;
        wait_until("reconnected", || transport.connects() == 2).await;
    }

    #[tokio::test]
    async fn startup_failure_retries_after_the_longer_delay() {
        let transport = ScriptedTransport::new();
        transport.fail_connect.store(true, Ordering::SeqCst);
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(transport.clone(), &dir);

        mgr.clone().start().await;
        assert_eq!(mgr.status().status, ConnectionStatus::Disconnected);
        assert_eq!(transport.attempts(), 1);
        assert_eq!(transport.connects(), 0);

        transport.fail_connect.store(false, Ordering::SeqCst);
        wait_until("recovered", || transport.connects() == 1).await;
        assert_eq!(mgr.status().status, ConnectionStatus::Connecting);
    }

    #[tokio::test]
    async fn shutdown_tears_down_and_ignores_later_events() {
        let transport = ScriptedTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(transport.clone(), &dir);

        mgr.clone().start().await;
        transport.emit(TransportEvent::Opened).await;
        wait_until("connected", || mgr.status().connected).await;

        mgr.shutdown().await;
        assert_eq!(mgr.status().status, ConnectionStatus::Disconnected);
        assert_eq!(transport.active.load(Ordering::SeqCst), 0);

        // An event from the dead transport must not resurrect the session.
        transport.emit(TransportEvent::Opened).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(mgr.status().status, ConnectionStatus::Disconnected);
    }

    // ── Send path ────────────────────────────────────────────

    #[tokio::test]
    async fn send_rejected_unless_connected() {
        let transport = ScriptedTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(transport.clone(), &dir);

        let err = mgr.send("11988887777", "hi").await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::NotConnected(ConnectionStatus::Disconnected)
        ));
        // No transport involvement at all.
        assert_eq!(transport.attempts(), 0);
        assert!(transport.sent().is_empty());

        mgr.clone().start().await;
        let err = mgr.send("11988887777", "hi").await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::NotConnected(ConnectionStatus::Connecting)
        ));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn send_normalizes_recipient_and_returns_provider_id() {
        let transport = ScriptedTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(transport.clone(), &dir);

        mgr.clone().start().await;
        transport.emit(TransportEvent::Opened).await;
        wait_until("connected", || mgr.status().connected).await;

        let id = mgr.send("(11) 98888-7777", "hello").await.unwrap();
        assert_eq!(id, "MOCK-MSG-1");
        assert_eq!(
            transport.sent(),
            vec![("5511988887777@s.whatsapp.net".into(), "hello".into())]
        );
    }

    #[tokio::test]
    async fn transport_send_errors_surface_as_send_failed() {
        let transport = ScriptedTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(transport.clone(), &dir);

        mgr.clone().start().await;
        transport.emit(TransportEvent::Opened).await;
        wait_until("connected", || mgr.status().connected).await;

        transport.fail_send.store(true, Ordering::SeqCst);
        let err = mgr.send("11988887777", "hi").await.unwrap_err();
        assert!(matches!(err, BridgeError::SendFailed(_)));
    }
}
