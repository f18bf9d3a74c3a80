//! # vellum-collab — Revision-gated collaboration client
//!
//! Keeps the remote peer view of a project current over a persistent
//! websocket. Local edits are translated from the editor's UTF-16 offsets
//! into codepoint units, queued in one global FIFO, and released one at a
//! time: an operation is transmitted only after its predecessor was
//! acknowledged by the revision server.
//!
//! ```text
//! ┌────────────────┐   JSON frames    ┌─────────────────┐
//! │ Collaboration  │ ◄──────────────► │ revision server │
//! │ Session        │                  │ (remote)        │
//! └──────┬─────────┘                  └─────────────────┘
//!        │
//!        ▼
//! SessionCore: states, per-file revisions, FIFO queue, in-flight slot
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — the JSON wire protocol
//! - [`offsets`] — UTF-16 → codepoint translation against shadow content
//! - [`session`] — state machine + websocket wrapper with linear backoff

pub mod offsets;
pub mod protocol;
pub mod session;

pub use offsets::{apply_change, codepoint_len, codepoint_offset, translate_change, Utf16Change};
pub use protocol::{
    Action, ClientMessage, EditChange, ProtocolError, RemoteFile, Revision, ServerMessage,
    ServerPayload,
};
pub use session::{
    CollaborationSession, FileSyncState, PendingOperation, ReconnectDecision, SessionConfig,
    SessionCore, SessionEvent, SessionState,
};
