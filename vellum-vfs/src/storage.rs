//! The external CRUD backend seam.
//!
//! The tree treats the storage backend as the authoritative content source
//! and mirrors every local mutation back to it. Real implementations live
//! outside this crate (the product talks to an object-storage HTTP API);
//! tests use an in-memory one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tree::FileKind;

/// Node descriptor as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDescriptor {
    pub id: String,
    pub name: String,
    pub kind: FileKind,
    /// Root-anchored path string.
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("no entry at `{0}`")]
    NotFound(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Storage operations the tree issues on local mutation.
///
/// Paths are root-anchored strings as produced by
/// [`ProjectPath::rooted`](crate::path::ProjectPath::rooted).
#[allow(async_fn_in_trait)]
pub trait StorageBackend {
    async fn list_entries(&self) -> Result<Vec<EntryDescriptor>, StorageError>;
    async fn read_file(&self, path: &str) -> Result<String, StorageError>;
    async fn write_file(&self, path: &str, content: &str) -> Result<EntryDescriptor, StorageError>;
    async fn delete_file(&self, path: &str) -> Result<(), StorageError>;
    async fn rename_file(&self, path: &str, new_name: &str) -> Result<EntryDescriptor, StorageError>;
    async fn move_file(&self, path: &str, new_parent: &str) -> Result<EntryDescriptor, StorageError>;
    async fn add_directory(&self, path: &str) -> Result<EntryDescriptor, StorageError>;
}
