//! Connection supervisor for the event stream.
//!
//! One connection exists per resident board while a credential is known.
//! [`ConnectionSupervisor::sync`] is called whenever either changes and
//! opens, replaces or closes the connection to match. Each connection runs
//! on its own task:
//!
//! ```text
//! Disconnected ──► Connecting ──► Open ──► Closed
//!                      ▲            │
//!                      └─ backoff ◄─┘   (only when reconnect is enabled)
//! ```
//!
//! Every inbound text message goes to the [`EventIngestor`]. Malformed
//! messages are logged and dropped; they never end the connection.
//!
//! A reopened stream starts with a [`BoardResync`] of the board, since
//! anything broadcast while disconnected is gone. The task also follows
//! the store's change feed and closes once its board is no longer resident.
//!
//! Dropping a [`SupervisorHandle`] signals its task to close the stream, so
//! the connection is released on every exit path of the owning view.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use taskboard_common::BoardId;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{Instrument, debug, info, warn};

use tokio::sync::broadcast::{self, error::RecvError};

use crate::config::Credential;
use crate::errors::{ClientError, ConnectionError};
use crate::events::{EventIngestor, IngestOutcome};
use crate::logging::connection_span;
use crate::store::{StoreChange, StoreHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closed,
}

/// Why a connection task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionExit {
    /// Closed on request (board changed, credential cleared, view torn down).
    Requested,
    /// The resident board was deleted remotely.
    BoardDeleted,
    /// The board stopped being resident locally (deleted, or replaced by
    /// another board).
    Evicted,
    /// The stream ended or failed and no reconnect attempts remain.
    Lost(String),
}

/// Bounded exponential backoff. `max_attempts = 0` disables reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    #[serde(default)]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Delay before reconnect attempt `attempt` (0-based), or `None` once
    /// the budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let millis = self.initial_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Some(Duration::from_millis(millis))
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.max_attempts > 0 && self.initial_delay_ms == 0 {
            warnings.push("reconnect.initial_delay_ms is 0; reconnects will spin".to_string());
        }
        if self.max_delay_ms < self.initial_delay_ms {
            warnings.push(format!(
                "reconnect.max_delay_ms ({}) is below initial_delay_ms ({})",
                self.max_delay_ms, self.initial_delay_ms
            ));
        }
        warnings
    }
}

/// Opens event streams. The seam tests replace with an in-memory fake.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn EventStream>, ConnectionError>;
}

#[async_trait]
pub trait EventStream: Send {
    /// The next text message. `None` once the peer has closed.
    async fn next_message(&mut self) -> Option<Result<String, ConnectionError>>;

    async fn close(&mut self);
}

/// Reloads a board after its stream was re-established.
#[async_trait]
pub trait BoardResync: Send + Sync {
    async fn resync(&self, board_id: BoardId) -> Result<(), ClientError>;
}

/// `<base>?boardID=<id>&token=<credential>`.
pub fn stream_endpoint(
    base: &str,
    board_id: BoardId,
    credential: &Credential,
) -> Result<String, ConnectionError> {
    let mut url = Url::parse(base).map_err(|e| ConnectionError::InvalidEndpoint {
        url: base.to_string(),
        message: e.to_string(),
    })?;
    url.query_pairs_mut()
        .append_pair("boardID", &board_id.to_string())
        .append_pair("token", credential.expose());
    Ok(url.to_string())
}

/// The endpoint with its token removed, for logs.
fn redacted(url: &str) -> String {
    match url.split_once("token=") {
        Some((head, _)) => format!("{head}token=***"),
        None => url.to_string(),
    }
}

// ── WebSocket transport ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteTransport;

struct TungsteniteStream {
    inner: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
}

#[async_trait]
impl EventTransport for TungsteniteTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn EventStream>, ConnectionError> {
        let (inner, _response) =
            tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| ConnectionError::Connect {
                    url: redacted(url),
                    message: e.to_string(),
                })?;
        Ok(Box::new(TungsteniteStream { inner }))
    }
}

#[async_trait]
impl EventStream for TungsteniteStream {
    async fn next_message(&mut self) -> Option<Result<String, ConnectionError>> {
        loop {
            let message = match self.inner.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(ConnectionError::Stream(e.to_string()))),
            };
            match message {
                Message::Text(text) => return Some(Ok(text.as_str().to_owned())),
                Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => debug!(len = bytes.len(), "ignoring non-UTF-8 binary frame"),
                },
                Message::Close(_) => return None,
                // Pings are answered by tungstenite itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.inner.close(None).await {
            debug!(error = %e, "error closing event stream");
        }
    }
}

// ── Connection task ─────────────────────────────────────────────────────

/// Handle to one running connection task.
pub struct SupervisorHandle {
    board_id: BoardId,
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<ConnectionState>,
    task: Option<JoinHandle<ConnectionExit>>,
}

impl SupervisorHandle {
    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Ask the task to close and wait for it.
    pub async fn close(mut self) -> ConnectionExit {
        let _ = self.shutdown.send(true);
        self.join_inner().await
    }

    /// Wait for the task to end on its own.
    pub async fn join(mut self) -> ConnectionExit {
        self.join_inner().await
    }

    async fn join_inner(&mut self) -> ConnectionExit {
        match self.task.take() {
            Some(task) => task
                .await
                .unwrap_or_else(|e| ConnectionExit::Lost(format!("connection task failed: {e}"))),
            None => ConnectionExit::Requested,
        }
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

struct ConnectionTask {
    board_id: BoardId,
    url: String,
    transport: Arc<dyn EventTransport>,
    store: StoreHandle,
    ingestor: EventIngestor,
    resync: Option<Arc<dyn BoardResync>>,
    reconnect: ReconnectPolicy,
    shutdown: watch::Receiver<bool>,
    state: watch::Sender<ConnectionState>,
}

enum PumpEnd {
    Shutdown,
    BoardDeleted,
    Evicted,
    Ended(String),
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also means stop.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

impl ConnectionTask {
    async fn run(mut self) -> ConnectionExit {
        let mut changes = self.store.subscribe();
        let mut attempt = 0u32;
        let mut opened = false;
        loop {
            self.state.send_replace(ConnectionState::Connecting);
            let connected = tokio::select! {
                biased;
                _ = shutdown_requested(&mut self.shutdown) => {
                    self.state.send_replace(ConnectionState::Closed);
                    return ConnectionExit::Requested;
                }
                result = self.transport.connect(&self.url) => result,
            };

            let reason = match connected {
                Ok(mut stream) => {
                    attempt = 0;
                    self.state.send_replace(ConnectionState::Open);
                    info!(url = %redacted(&self.url), "event stream open");
                    if opened && !self.resync().await {
                        stream.close().await;
                        self.state.send_replace(ConnectionState::Closed);
                        return ConnectionExit::Requested;
                    }
                    opened = true;
                    let end = self.pump(stream.as_mut(), &mut changes).await;
                    match end {
                        PumpEnd::Shutdown => {
                            stream.close().await;
                            self.state.send_replace(ConnectionState::Closed);
                            info!("event stream closed");
                            return ConnectionExit::Requested;
                        }
                        PumpEnd::BoardDeleted => {
                            stream.close().await;
                            self.state.send_replace(ConnectionState::Closed);
                            info!("board deleted, event stream closed");
                            return ConnectionExit::BoardDeleted;
                        }
                        PumpEnd::Evicted => {
                            stream.close().await;
                            self.state.send_replace(ConnectionState::Closed);
                            info!("board no longer resident, event stream closed");
                            return ConnectionExit::Evicted;
                        }
                        PumpEnd::Ended(reason) => reason,
                    }
                }
                Err(e) => e.to_string(),
            };

            let Some(delay) = self.reconnect.delay_for(attempt) else {
                warn!(%reason, "event stream lost");
                self.state.send_replace(ConnectionState::Closed);
                return ConnectionExit::Lost(reason);
            };
            if self.store.current_board_id() != Some(self.board_id) {
                self.state.send_replace(ConnectionState::Closed);
                info!(%reason, "event stream lost after board left the store");
                return ConnectionExit::Evicted;
            }
            attempt += 1;
            self.state.send_replace(ConnectionState::Disconnected);
            warn!(%reason, attempt, delay_ms = delay.as_millis() as u64, "event stream lost, reconnecting");
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut self.shutdown) => {
                    self.state.send_replace(ConnectionState::Closed);
                    return ConnectionExit::Requested;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Reload the board on a reopened stream. False if shutdown was
    /// requested meanwhile. A failed reload is logged and the stream kept.
    async fn resync(&mut self) -> bool {
        let Some(resync) = self.resync.clone() else {
            return true;
        };
        info!(board_id = self.board_id, "event stream reopened, reloading board");
        tokio::select! {
            biased;
            _ = shutdown_requested(&mut self.shutdown) => false,
            result = resync.resync(self.board_id) => {
                if let Err(e) = result {
                    warn!(error = %e, "board reload after reconnect failed");
                }
                true
            }
        }
    }

    async fn pump(
        &mut self,
        stream: &mut dyn EventStream,
        changes: &mut broadcast::Receiver<StoreChange>,
    ) -> PumpEnd {
        loop {
            let message = tokio::select! {
                biased;
                _ = shutdown_requested(&mut self.shutdown) => return PumpEnd::Shutdown,
                change = changes.recv() => {
                    if left_store(self.board_id, &self.store, change) {
                        return PumpEnd::Evicted;
                    }
                    continue;
                }
                message = stream.next_message() => message,
            };
            let text = match message {
                None => return PumpEnd::Ended("closed by server".to_string()),
                Some(Err(e)) => return PumpEnd::Ended(e.to_string()),
                Some(Ok(text)) => text,
            };
            match self.ingestor.handle_message(&text) {
                Ok(IngestOutcome::BoardDeleted) => return PumpEnd::BoardDeleted,
                Ok(outcome) => debug!(?outcome, "event ingested"),
                Err(e) => warn!(error = %e, "dropping malformed event"),
            }
        }
    }
}

/// Whether a store change means `board_id` is no longer resident.
fn left_store(board_id: BoardId, store: &StoreHandle, change: Result<StoreChange, RecvError>) -> bool {
    match change {
        Ok(StoreChange::BoardEvicted { board_id: evicted }) => evicted == board_id,
        Ok(StoreChange::BoardLoaded { board_id: loaded }) => loaded != board_id,
        Ok(_) => false,
        Err(RecvError::Lagged(_)) => store.current_board_id() != Some(board_id),
        Err(RecvError::Closed) => false,
    }
}

// ── Supervisor ──────────────────────────────────────────────────────────

/// Keeps at most one connection open, for the resident board.
pub struct ConnectionSupervisor {
    stream_url: String,
    transport: Arc<dyn EventTransport>,
    store: StoreHandle,
    reconnect: ReconnectPolicy,
    resync: Option<Arc<dyn BoardResync>>,
    active: Option<(Credential, SupervisorHandle)>,
}

impl ConnectionSupervisor {
    pub fn new(
        stream_url: impl Into<String>,
        transport: Arc<dyn EventTransport>,
        store: StoreHandle,
        reconnect: ReconnectPolicy,
    ) -> Self {
        Self {
            stream_url: stream_url.into(),
            transport,
            store,
            reconnect,
            resync: None,
            active: None,
        }
    }

    /// Reload the board through `resync` whenever a stream is reopened.
    pub fn with_resync(mut self, resync: Arc<dyn BoardResync>) -> Self {
        self.resync = Some(resync);
        self
    }

    /// Bring the connection in line with the resident board and credential.
    ///
    /// Opens when both are present, closes when either is absent, and
    /// replaces the connection when either changed. A connection whose task
    /// already ended is replaced as well. Must run inside a tokio runtime.
    ///
    /// The running task closes itself when its board leaves the store, but
    /// opening a stream for a newly loaded board still takes a `sync`.
    pub fn sync(
        &mut self,
        board_id: Option<BoardId>,
        credential: Option<&Credential>,
    ) -> Result<(), ConnectionError> {
        let desired = board_id.zip(credential);

        if let Some((active_credential, handle)) = &self.active {
            let unchanged = desired.is_some_and(|(board_id, credential)| {
                handle.board_id() == board_id && active_credential == credential
            });
            if unchanged && !handle.is_finished() {
                return Ok(());
            }
        }
        // Dropping the old handle signals its task to close.
        if let Some((_, handle)) = self.active.take() {
            debug!(board_id = handle.board_id(), "closing event stream");
        }

        if let Some((board_id, credential)) = desired {
            let handle = self.open(board_id, credential)?;
            self.active = Some((credential.clone(), handle));
        }
        Ok(())
    }

    fn open(
        &self,
        board_id: BoardId,
        credential: &Credential,
    ) -> Result<SupervisorHandle, ConnectionError> {
        let url = stream_endpoint(&self.stream_url, board_id, credential)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let task = ConnectionTask {
            board_id,
            url,
            transport: Arc::clone(&self.transport),
            store: self.store.clone(),
            ingestor: EventIngestor::new(self.store.clone()),
            resync: self.resync.clone(),
            reconnect: self.reconnect,
            shutdown: shutdown_rx,
            state: state_tx,
        };
        let join = tokio::spawn(task.run().instrument(connection_span(board_id)));

        Ok(SupervisorHandle {
            board_id,
            shutdown: shutdown_tx,
            state: state_rx,
            task: Some(join),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.active
            .as_ref()
            .map_or(ConnectionState::Disconnected, |(_, handle)| handle.state())
    }

    pub fn active_board(&self) -> Option<BoardId> {
        self.active.as_ref().map(|(_, handle)| handle.board_id())
    }

    pub fn watch_state(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.active.as_ref().map(|(_, handle)| handle.watch_state())
    }

    /// Take the running connection out, e.g. to await its exit.
    pub fn take_handle(&mut self) -> Option<SupervisorHandle> {
        self.active.take().map(|(_, handle)| handle)
    }

    /// Close the connection, if any, and wait for it to finish.
    pub async fn shutdown(&mut self) -> Option<ConnectionExit> {
        match self.take_handle() {
            Some(handle) => Some(handle.close().await),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use taskboard_common::{Board, Card, List};
    use tokio::sync::mpsc;

    struct FakeStream {
        rx: mpsc::UnboundedReceiver<String>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl EventStream for FakeStream {
        async fn next_message(&mut self) -> Option<Result<String, ConnectionError>> {
            self.rx.recv().await.map(Ok)
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Hands out queued connections; records every URL it was asked for.
    #[derive(Default)]
    struct FakeTransport {
        queued: Mutex<VecDeque<Result<FakeStream, ConnectionError>>>,
        urls: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        /// Queue a healthy connection; returns its sender and close flag.
        fn queue_stream(&self) -> (mpsc::UnboundedSender<String>, Arc<AtomicBool>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let closed = Arc::new(AtomicBool::new(false));
            self.queued.lock().unwrap().push_back(Ok(FakeStream {
                rx,
                closed: Arc::clone(&closed),
            }));
            (tx, closed)
        }

        fn queue_failure(&self) {
            self.queued
                .lock()
                .unwrap()
                .push_back(Err(ConnectionError::Stream("refused".into())));
        }

        fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventTransport for FakeTransport {
        async fn connect(&self, url: &str) -> Result<Box<dyn EventStream>, ConnectionError> {
            self.urls.lock().unwrap().push(url.to_string());
            let next = self.queued.lock().unwrap().pop_front();
            match next {
                Some(Ok(stream)) => Ok(Box::new(stream)),
                Some(Err(e)) => Err(e),
                None => Err(ConnectionError::Stream("no stream queued".into())),
            }
        }
    }

    /// Reloads a fixed server-side board and counts the reloads.
    struct FakeResync {
        store: StoreHandle,
        server: Board,
        calls: Mutex<Vec<BoardId>>,
    }

    #[async_trait]
    impl BoardResync for FakeResync {
        async fn resync(&self, board_id: BoardId) -> Result<(), ClientError> {
            self.calls.lock().unwrap().push(board_id);
            self.store.update(|s| s.load_board(self.server.clone()));
            Ok(())
        }
    }

    fn store() -> StoreHandle {
        let handle = StoreHandle::default();
        handle.update(|s| {
            s.load_board(Board::new(1, "b").with_lists(vec![
                List::new(1, 1, "L1", 1).with_cards(vec![Card::new(100, 1, "A", 1)]),
            ]))
        });
        handle
    }

    fn credential() -> Credential {
        Credential::new("tok").unwrap()
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    fn supervisor(transport: &Arc<FakeTransport>, store: &StoreHandle, policy: ReconnectPolicy) -> ConnectionSupervisor {
        ConnectionSupervisor::new(
            "ws://localhost:8080/ws",
            Arc::clone(transport) as Arc<dyn EventTransport>,
            store.clone(),
            policy,
        )
    }

    #[test]
    fn test_stream_endpoint_carries_board_and_token() {
        let url = stream_endpoint("ws://h:1/ws", 7, &Credential::new("a b").unwrap()).unwrap();
        assert_eq!(url, "ws://h:1/ws?boardID=7&token=a+b");
        assert!(!redacted(&url).contains("a+b"));
        assert!(matches!(
            stream_endpoint("::", 1, &credential()),
            Err(ConnectionError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_reconnect_delays_grow_and_cap() {
        let policy = ReconnectPolicy {
            max_attempts: 5,
            initial_delay_ms: 100,
            max_delay_ms: 350,
        };
        assert_eq!(policy.delay_for(0), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(350)));
        assert_eq!(policy.delay_for(5), None);
        assert_eq!(ReconnectPolicy::disabled().delay_for(0), None);
    }

    #[tokio::test]
    async fn test_ingests_and_survives_malformed_messages() {
        let transport = Arc::new(FakeTransport::default());
        let (tx, _closed) = transport.queue_stream();
        let store = store();
        let mut sup = supervisor(&transport, &store, ReconnectPolicy::disabled());

        sup.sync(Some(1), Some(&credential())).unwrap();
        tx.send("garbage".into()).unwrap();
        tx.send(r#"{"type": "CARD_DELETED", "payload": {"id": 100, "listId": 1, "boardId": 1}}"#.into())
            .unwrap();

        eventually(|| store.read(|s| s.card(100).is_none())).await;
        assert_eq!(sup.state(), ConnectionState::Open);
        assert_eq!(transport.urls(), vec!["ws://localhost:8080/ws?boardID=1&token=tok"]);
    }

    #[tokio::test]
    async fn test_no_connection_without_credential_or_board() {
        let transport = Arc::new(FakeTransport::default());
        let store = store();
        let mut sup = supervisor(&transport, &store, ReconnectPolicy::disabled());

        sup.sync(Some(1), None).unwrap();
        sup.sync(None, Some(&credential())).unwrap();
        assert!(sup.active_board().is_none());
        assert!(transport.urls().is_empty());
    }

    #[tokio::test]
    async fn test_credential_loss_closes_stream() {
        let transport = Arc::new(FakeTransport::default());
        let (_tx, closed) = transport.queue_stream();
        let store = store();
        let mut sup = supervisor(&transport, &store, ReconnectPolicy::disabled());

        sup.sync(Some(1), Some(&credential())).unwrap();
        let mut state = sup.watch_state().unwrap();
        state.wait_for(|s| *s == ConnectionState::Open).await.unwrap();

        sup.sync(Some(1), None).unwrap();
        state.wait_for(|s| *s == ConnectionState::Closed).await.unwrap();
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_board_change_replaces_connection() {
        let transport = Arc::new(FakeTransport::default());
        let (_tx1, closed1) = transport.queue_stream();
        let (_tx2, closed2) = transport.queue_stream();
        let store = store();
        let mut sup = supervisor(&transport, &store, ReconnectPolicy::disabled());

        sup.sync(Some(1), Some(&credential())).unwrap();
        let mut state = sup.watch_state().unwrap();
        state.wait_for(|s| *s == ConnectionState::Open).await.unwrap();
        sup.sync(Some(1), Some(&credential())).unwrap();
        sup.sync(Some(2), Some(&credential())).unwrap();

        eventually(|| closed1.load(Ordering::SeqCst)).await;
        eventually(|| transport.urls().len() == 2).await;
        assert!(transport.urls()[1].contains("boardID=2"));
        assert_eq!(sup.active_board(), Some(2));

        assert_eq!(sup.shutdown().await, Some(ConnectionExit::Requested));
        assert!(closed2.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_board_deleted_ends_connection() {
        let transport = Arc::new(FakeTransport::default());
        let (tx, closed) = transport.queue_stream();
        let store = store();
        let mut sup = supervisor(&transport, &store, ReconnectPolicy::disabled());

        sup.sync(Some(1), Some(&credential())).unwrap();
        tx.send(r#"{"type": "BOARD_DELETED", "payload": {"id": 1}}"#.into()).unwrap();

        let exit = sup.take_handle().unwrap().join().await;
        assert_eq!(exit, ConnectionExit::BoardDeleted);
        assert!(closed.load(Ordering::SeqCst));
        assert!(store.read(|s| s.current().is_none()));
    }

    #[tokio::test]
    async fn test_without_reconnect_a_lost_stream_stays_closed() {
        let transport = Arc::new(FakeTransport::default());
        let (tx, _closed) = transport.queue_stream();
        let store = store();
        let mut sup = supervisor(&transport, &store, ReconnectPolicy::disabled());

        sup.sync(Some(1), Some(&credential())).unwrap();
        drop(tx);

        let exit = sup.take_handle().unwrap().join().await;
        assert!(matches!(exit, ConnectionExit::Lost(_)));
        assert_eq!(transport.urls().len(), 1);
    }

    #[tokio::test]
    async fn test_reconnects_with_backoff() {
        let transport = Arc::new(FakeTransport::default());
        transport.queue_failure();
        let (tx, _closed) = transport.queue_stream();
        let store = store();
        let policy = ReconnectPolicy {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
        };
        let mut sup = supervisor(&transport, &store, policy);

        sup.sync(Some(1), Some(&credential())).unwrap();
        let mut state = sup.watch_state().unwrap();
        state.wait_for(|s| *s == ConnectionState::Open).await.unwrap();
        assert_eq!(transport.urls().len(), 2);

        tx.send(r#"{"type": "CARD_DELETED", "payload": {"id": 100, "listId": 1}}"#.into())
            .unwrap();
        eventually(|| store.read(|s| s.card(100).is_none())).await;
    }

    #[tokio::test]
    async fn test_reopened_stream_reloads_board() {
        let transport = Arc::new(FakeTransport::default());
        let (tx1, _c1) = transport.queue_stream();
        let (_tx2, _c2) = transport.queue_stream();
        let store = store();
        // Card 100 was deleted while the client was disconnected.
        let resync = Arc::new(FakeResync {
            store: store.clone(),
            server: Board::new(1, "b").with_lists(vec![List::new(1, 1, "L1", 1).with_cards(vec![])]),
            calls: Mutex::new(Vec::new()),
        });
        let policy = ReconnectPolicy {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
        };
        let mut sup = supervisor(&transport, &store, policy)
            .with_resync(Arc::clone(&resync) as Arc<dyn BoardResync>);

        sup.sync(Some(1), Some(&credential())).unwrap();
        let mut state = sup.watch_state().unwrap();
        state.wait_for(|s| *s == ConnectionState::Open).await.unwrap();
        assert!(resync.calls.lock().unwrap().is_empty());
        assert!(store.read(|s| s.card(100).is_some()));

        drop(tx1);
        eventually(|| transport.urls().len() == 2).await;
        eventually(|| resync.calls.lock().unwrap().len() == 1).await;
        assert_eq!(*resync.calls.lock().unwrap(), vec![1]);
        assert!(store.read(|s| s.card(100).is_none()));
        assert_eq!(sup.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_local_eviction_closes_stream() {
        let transport = Arc::new(FakeTransport::default());
        let (_tx, closed) = transport.queue_stream();
        let store = store();
        let mut sup = supervisor(&transport, &store, ReconnectPolicy::disabled());

        sup.sync(Some(1), Some(&credential())).unwrap();
        let mut state = sup.watch_state().unwrap();
        state.wait_for(|s| *s == ConnectionState::Open).await.unwrap();

        store.update(|s| s.evict_board(1));
        let exit = tokio::time::timeout(Duration::from_secs(2), sup.take_handle().unwrap().join())
            .await
            .unwrap();
        assert_eq!(exit, ConnectionExit::Evicted);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_finished_connection_is_reopened_on_sync() {
        let transport = Arc::new(FakeTransport::default());
        let (tx, _c1) = transport.queue_stream();
        let (_tx2, _c2) = transport.queue_stream();
        let store = store();
        let mut sup = supervisor(&transport, &store, ReconnectPolicy::disabled());

        sup.sync(Some(1), Some(&credential())).unwrap();
        drop(tx);
        let mut state = sup.watch_state().unwrap();
        state.wait_for(|s| *s == ConnectionState::Closed).await.unwrap();
        eventually(|| sup.active.as_ref().is_some_and(|(_, h)| h.is_finished())).await;

        sup.sync(Some(1), Some(&credential())).unwrap();
        eventually(|| transport.urls().len() == 2).await;
    }
}
