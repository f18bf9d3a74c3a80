//! Error types for path parsing and tree mutation.

use thiserror::Error;

use crate::tree::FileNode;

/// Path parsing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    /// Input was empty or contained only separators.
    #[error("path is empty after normalization")]
    Empty,
}

/// Tree mutation errors.
///
/// `NameCollision` carries the conflicting node so callers can recover,
/// e.g. treat "already exists" as idempotent success by reusing it.
#[derive(Debug, Clone, Error)]
pub enum TreeError {
    #[error("no node with id `{0}`")]
    NotFound(String),

    #[error("a sibling named `{}` already exists", existing.name)]
    NameCollision { existing: Box<FileNode> },

    #[error("the root node cannot be deleted, renamed or moved")]
    RootImmutable,

    #[error("node `{0}` is not a directory")]
    NotADirectory(String),

    #[error("node `{0}` is not a file")]
    NotAFile(String),

    #[error("`{0}` is not a valid entry name")]
    InvalidName(String),

    #[error("cannot move `{0}` into its own subtree")]
    IntoOwnSubtree(String),
}
