//! The collaboration session: revision state machine plus socket wrapper.
//!
//! [`SessionCore`] is the state machine proper — connection states, the
//! per-file revision counters, the global FIFO operation queue and the
//! single in-flight slot. It does no I/O: every method consumes an event
//! and returns what to transmit, which keeps the ordering and backoff
//! contracts directly testable.
//!
//! [`CollaborationSession`] wraps the core in a tokio connection loop over
//! tokio-tungstenite: a writer task fed by an mpsc channel, a read loop
//! that feeds server frames back into the core, and linear-backoff
//! reconnects until the attempt budget is spent.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::offsets::{self, Utf16Change};
use crate::protocol::{ClientMessage, EditChange, RemoteFile, ServerMessage, ServerPayload};

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Terminal: the attempt budget is spent. Requires an explicit
    /// [`SessionCore::reset`] before anything reconnects.
    Failed,
}

/// Events emitted to the application.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// `InitOk` received; per-file baselines are seeded.
    Initialized { files: Vec<RemoteFile> },
    EditAcknowledged { path: String, revision: u64 },
    OpenAcknowledged { revision: u64 },
    /// The reconnect budget is spent; external intervention required.
    Failed,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub server_url: String,
    pub project_id: String,
    pub max_reconnect_attempts: u32,
    /// Delay before reconnect attempt `k` is `k * base_delay` (linear).
    pub base_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:9393".to_string(),
            project_id: "default".to_string(),
            max_reconnect_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Per-file revision counter plus the last-synchronized content.
///
/// The content is the shadow every subsequent edit is translated against —
/// not the live buffer, which may already contain unacknowledged edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSyncState {
    pub revision: u64,
    pub content: String,
}

/// A queued, not-yet-acknowledged outbound edit (codepoint units).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub path: String,
    pub change: EditChange,
}

/// What the connection loop should do after a socket close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    Retry { delay: Duration },
    GiveUp,
    Disposed,
}

/// The session state machine. No I/O.
#[derive(Debug)]
pub struct SessionCore {
    client_id: Uuid,
    project_id: String,
    state: SessionState,
    attempts: u32,
    max_attempts: u32,
    base_delay: Duration,
    files: HashMap<String, FileSyncState>,
    /// One global FIFO across all files: strict total ordering over
    /// cross-file concurrency.
    queue: VecDeque<PendingOperation>,
    in_flight: Option<PendingOperation>,
    disposed: bool,
}

impl SessionCore {
    pub fn new(project_id: &str, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            client_id: Uuid::new_v4(),
            project_id: project_id.to_string(),
            state: SessionState::Disconnected,
            attempts: 0,
            max_attempts,
            base_delay,
            files: HashMap::new(),
            queue: VecDeque::new(),
            in_flight: None,
            disposed: false,
        }
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn revision_of(&self, path: &str) -> Option<u64> {
        self.files.get(path).map(|f| f.revision)
    }

    pub fn shadow_of(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(|f| f.content.as_str())
    }

    /// A connection attempt is starting.
    pub fn on_connecting(&mut self) {
        self.state = SessionState::Connecting;
    }

    /// Socket opened: reset the attempt counter and announce the project.
    pub fn on_open(&mut self) -> ClientMessage {
        self.state = SessionState::Connected;
        self.attempts = 0;
        ClientMessage::init(self.client_id, &self.project_id)
    }

    /// Socket closed or errored. Requeues the unacknowledged in-flight
    /// operation at the front so ordering survives the reconnect.
    pub fn on_closed(&mut self) -> ReconnectDecision {
        if self.disposed {
            return ReconnectDecision::Disposed;
        }
        if let Some(op) = self.in_flight.take() {
            self.queue.push_front(op);
        }
        if self.attempts >= self.max_attempts {
            self.state = SessionState::Failed;
            return ReconnectDecision::GiveUp;
        }
        self.attempts += 1;
        self.state = SessionState::Reconnecting;
        ReconnectDecision::Retry {
            delay: self.base_delay * self.attempts,
        }
    }

    /// External intervention out of `Failed`.
    pub fn reset(&mut self) {
        self.attempts = 0;
        if self.state == SessionState::Failed {
            self.state = SessionState::Disconnected;
        }
    }

    /// Synchronous: a stale close event arriving afterwards schedules
    /// nothing.
    pub fn dispose(&mut self) {
        self.disposed = true;
    }

    /// Start tracking a file outside of `InitOk`, e.g. one just created
    /// locally, so later edits translate against its real content.
    pub fn track_file(&mut self, path: &str, content: &str, revision: u64) {
        self.files.insert(
            path.to_string(),
            FileSyncState {
                revision,
                content: content.to_string(),
            },
        );
    }

    /// Translate an editor change (UTF-16 units) against the file's shadow
    /// content, advance the shadow, and enqueue. Never transmits.
    ///
    /// Returns the translated change so callers can forward the same
    /// codepoint-space edit elsewhere (e.g. to the compiler).
    pub fn queue_edit(&mut self, path: &str, change: &Utf16Change) -> EditChange {
        let file = self
            .files
            .entry(path.to_string())
            .or_insert_with(|| FileSyncState {
                revision: 0,
                content: String::new(),
            });
        let translated = offsets::translate_change(&file.content, change);
        file.content = offsets::apply_change(&file.content, &translated);
        self.queue.push_back(PendingOperation {
            path: path.to_string(),
            change: translated.clone(),
        });
        translated
    }

    /// Drain step: pull the queue head if connected and nothing is in
    /// flight. The returned message must actually be transmitted.
    pub fn next_transmission(&mut self) -> Option<ClientMessage> {
        if self.state != SessionState::Connected || self.in_flight.is_some() {
            return None;
        }
        let op = self.queue.pop_front()?;
        let revision = self.revision_of(&op.path).unwrap_or(0);
        let msg = ClientMessage::edit_file(
            self.client_id,
            &op.path,
            vec![op.change.clone()],
            revision,
        );
        self.in_flight = Some(op);
        Some(msg)
    }

    /// Build an `OpenFile` frame carrying the file's current revision.
    /// Sent immediately, outside the edit queue.
    pub fn open_file(&self, path: &str) -> Option<ClientMessage> {
        if self.state != SessionState::Connected {
            return None;
        }
        let revision = self.revision_of(path).unwrap_or(0);
        Some(ClientMessage::open_file(self.client_id, path, revision))
    }

    /// Apply a server frame; returns an event for the application.
    pub fn on_server_message(&mut self, msg: &ServerMessage) -> Option<SessionEvent> {
        match &msg.payload {
            ServerPayload::InitOk { files } => {
                for file in files {
                    self.files.insert(
                        file.path.clone(),
                        FileSyncState {
                            revision: file.revision,
                            content: file.content.clone(),
                        },
                    );
                }
                log::info!("initialized with {} file(s)", files.len());
                Some(SessionEvent::Initialized {
                    files: files.clone(),
                })
            }
            ServerPayload::EditFileOk { path } => {
                if let Some(file) = self.files.get_mut(path) {
                    file.revision = msg.revision;
                } else {
                    log::warn!("ack for untracked file `{path}`");
                }
                self.in_flight = None;
                Some(SessionEvent::EditAcknowledged {
                    path: path.clone(),
                    revision: msg.revision,
                })
            }
            ServerPayload::OpenFileOk => Some(SessionEvent::OpenAcknowledged {
                revision: msg.revision,
            }),
        }
    }
}

/// Websocket wrapper around [`SessionCore`].
pub struct CollaborationSession {
    core: Arc<Mutex<SessionCore>>,
    config: SessionConfig,
    client_id: Uuid,
    event_tx: mpsc::Sender<SessionEvent>,
    event_rx: Option<mpsc::Receiver<SessionEvent>>,
    outgoing: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
}

impl CollaborationSession {
    pub fn new(config: SessionConfig) -> Self {
        let core = SessionCore::new(
            &config.project_id,
            config.max_reconnect_attempts,
            config.base_delay,
        );
        let client_id = core.client_id();
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            core: Arc::new(Mutex::new(core)),
            config,
            client_id,
            event_tx,
            event_rx: Some(event_rx),
            outgoing: Arc::new(Mutex::new(None)),
        }
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.event_rx.take()
    }

    pub fn state(&self) -> SessionState {
        self.core
            .lock()
            .map(|core| core.state())
            .unwrap_or(SessionState::Failed)
    }

    pub fn revision_of(&self, path: &str) -> Option<u64> {
        self.core.lock().ok().and_then(|core| core.revision_of(path))
    }

    /// Operations queued but not yet transmitted.
    pub fn queue_len(&self) -> usize {
        self.core.lock().map(|core| core.queue_len()).unwrap_or(0)
    }

    /// Whether an operation was sent and awaits its acknowledgement.
    pub fn has_in_flight(&self) -> bool {
        self.core
            .lock()
            .map(|core| core.has_in_flight())
            .unwrap_or(false)
    }

    /// Spawn the connection loop: connect, run, and on close either retry
    /// after `attempt * base_delay` or give up into `Failed`.
    pub fn connect(&self) {
        let core = self.core.clone();
        let event_tx = self.event_tx.clone();
        let url = self.config.server_url.clone();
        let outgoing_slot = self.outgoing.clone();

        tokio::spawn(async move {
            loop {
                {
                    let Ok(mut core) = core.lock() else { break };
                    if core.is_disposed() {
                        break;
                    }
                    core.on_connecting();
                }
                let _ = event_tx
                    .send(SessionEvent::StateChanged(SessionState::Connecting))
                    .await;

                match tokio_tungstenite::connect_async(&url).await {
                    Ok((ws_stream, _)) => {
                        let (mut ws_writer, mut ws_reader) = ws_stream.split();

                        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
                        if let Ok(mut slot) = outgoing_slot.lock() {
                            *slot = Some(out_tx.clone());
                        }

                        let writer_task = tokio::spawn(async move {
                            while let Some(text) = out_rx.recv().await {
                                if ws_writer.send(Message::Text(text.into())).await.is_err() {
                                    break;
                                }
                            }
                        });

                        // Announce the project; resets the attempt counter.
                        if let Ok(mut core) = core.lock() {
                            match core.on_open().encode() {
                                Ok(text) => {
                                    let _ = out_tx.send(text);
                                }
                                Err(e) => log::error!("failed to encode Init: {e}"),
                            }
                        }
                        let _ = event_tx
                            .send(SessionEvent::StateChanged(SessionState::Connected))
                            .await;

                        while let Some(msg) = ws_reader.next().await {
                            match msg {
                                Ok(Message::Text(text)) => {
                                    match ServerMessage::decode(text.as_str()) {
                                        Ok(server_msg) => {
                                            let (event, next) = {
                                                match core.lock() {
                                                    Ok(mut core) => {
                                                        let event =
                                                            core.on_server_message(&server_msg);
                                                        (event, core.next_transmission())
                                                    }
                                                    Err(_) => (None, None),
                                                }
                                            };
                                            if let Some(msg) = next {
                                                match msg.encode() {
                                                    Ok(text) => {
                                                        let _ = out_tx.send(text);
                                                    }
                                                    Err(e) => log::error!(
                                                        "failed to encode operation: {e}"
                                                    ),
                                                }
                                            }
                                            if let Some(event) = event {
                                                let _ = event_tx.send(event).await;
                                            }
                                        }
                                        Err(e) => {
                                            log::warn!("undecodable server frame: {e}");
                                        }
                                    }
                                }
                                Ok(Message::Close(_)) | Err(_) => break,
                                _ => {}
                            }
                        }

                        if let Ok(mut slot) = outgoing_slot.lock() {
                            *slot = None;
                        }
                        writer_task.abort();
                        log::debug!("socket closed");
                    }
                    Err(e) => {
                        log::warn!("connect to {url} failed: {e}");
                    }
                }

                let decision = match core.lock() {
                    Ok(mut core) => core.on_closed(),
                    Err(_) => break,
                };
                match decision {
                    ReconnectDecision::Retry { delay } => {
                        let _ = event_tx
                            .send(SessionEvent::StateChanged(SessionState::Reconnecting))
                            .await;
                        log::info!("reconnecting in {delay:?}");
                        tokio::time::sleep(delay).await;
                    }
                    ReconnectDecision::GiveUp => {
                        log::error!("reconnect budget spent; session failed");
                        let _ = event_tx
                            .send(SessionEvent::StateChanged(SessionState::Failed))
                            .await;
                        let _ = event_tx.send(SessionEvent::Failed).await;
                        break;
                    }
                    ReconnectDecision::Disposed => break,
                }
            }
        });
    }

    /// Queue local editor changes for a file and drain if nothing is in
    /// flight. Returns the codepoint-space translations.
    pub fn edit(&self, path: &str, changes: &[Utf16Change]) -> Vec<EditChange> {
        let Ok(mut core) = self.core.lock() else {
            return Vec::new();
        };
        let translated = changes
            .iter()
            .map(|change| core.queue_edit(path, change))
            .collect();
        let next = core.next_transmission();
        drop(core);
        if let Some(msg) = next {
            self.transmit(msg);
        }
        translated
    }

    pub fn open_file(&self, path: &str) {
        let msg = self.core.lock().ok().and_then(|core| core.open_file(path));
        if let Some(msg) = msg {
            self.transmit(msg);
        }
    }

    /// See [`SessionCore::track_file`].
    pub fn track_file(&self, path: &str, content: &str, revision: u64) {
        if let Ok(mut core) = self.core.lock() {
            core.track_file(path, content, revision);
        }
    }

    /// Synchronous close. A stale socket close arriving later schedules no
    /// reconnect.
    pub fn dispose(&self) {
        if let Ok(mut core) = self.core.lock() {
            core.dispose();
        }
        if let Ok(mut slot) = self.outgoing.lock() {
            *slot = None;
        }
    }

    fn transmit(&self, msg: ClientMessage) {
        match msg.encode() {
            Ok(text) => {
                if let Ok(slot) = self.outgoing.lock() {
                    if let Some(tx) = slot.as_ref() {
                        let _ = tx.send(text);
                    }
                }
            }
            Err(e) => log::error!("failed to encode outbound message: {e}"),
        }
    }
}
