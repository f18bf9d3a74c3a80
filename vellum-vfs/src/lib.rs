//! # vellum-vfs — Virtual file tree for the Vellum editor
//!
//! The in-memory model of "what files exist and where". The tree is the
//! single source of truth for the editor surface; the storage backend is
//! consulted for content and mirrored on every local mutation.
//!
//! ## Modules
//!
//! - [`path`] — slash-delimited project paths, parsed once and compared
//!   segment-wise
//! - [`tree`] — id-indexed ownership tree of file/folder nodes
//! - [`storage`] — the external CRUD backend seam

pub mod error;
pub mod path;
pub mod storage;
pub mod tree;

pub use error::{PathError, TreeError};
pub use path::ProjectPath;
pub use storage::{EntryDescriptor, StorageBackend, StorageError};
pub use tree::{FileKind, FileNode, FileTree, ROOT_ID};
