//! # vellum-compiler — Background compiler conduit
//!
//! Keeps an isolated compiler process fed with the editor's view of the
//! project and answers compile/completion/definition queries.
//!
//! ```text
//! ┌──────────────┐   CompilerRequest    ┌─────────────────┐
//! │ CompilerBridge│ ───────────────────► │ background unit │
//! │ (per project) │ ◄─────────────────── │ (compiler task) │
//! └──────┬───────┘   CompilerResponse   └─────────────────┘
//!        │
//!        ▼
//!  per-request oneshot futures, keyed by correlation id
//! ```
//!
//! ## Modules
//!
//! - [`channel`] — generic typed request/response conduit with an ordered
//!   observer list
//! - [`protocol`] — tagged request/response unions and diagnostics
//! - [`bridge`] — compiler-specific operations and response demultiplexing

pub mod bridge;
pub mod channel;
pub mod protocol;

pub use bridge::{BridgeError, CompileOutput, CompilerBridge};
pub use channel::{ChannelError, WorkerChannel};
pub use protocol::{
    CompilerOp, CompilerPayload, CompilerRequest, CompilerResponse, CompletionItem,
    DefinitionLocation, Diagnostic, Severity, SpanRange,
};
