//! # vellum-sync — Mutation fan-out for the Vellum editor
//!
//! Ties the other crates together behind one mutation surface. The
//! [`SyncCoordinator`] owns the file tree and routes every local change to
//! the storage backend, the background compiler, and the collaboration
//! session, and applies remote baselines without echoing them back.
//!
//! ```text
//!                ┌──────────────────┐
//!  editor ─────► │ SyncCoordinator  │ ─────► FileTree (vellum-vfs)
//!                │  (one per open   │ ─────► StorageBackend
//!                │   project)       │ ─────► CompilerBridge (vellum-compiler)
//!                └──────────────────┘ ─────► CollaborationSession (vellum-collab)
//! ```

pub mod coordinator;

pub use coordinator::{SyncCoordinator, SyncError};
