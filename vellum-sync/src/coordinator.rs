//! Fan-out of editor mutations to the three sinks.
//!
//! Every local mutation flows through here exactly once: the storage
//! backend is mirrored first and the tree mutates only after the mirror
//! succeeds, then the compiler's view is kept current and text edits are
//! queued on the collaboration session. The coordinator is the only writer
//! of the tree, so consumer state can never diverge from it.
//!
//! Remote content arriving from the session is applied under a guard flag;
//! while it is set, editor-change notifications are dropped instead of
//! being echoed back to the server.

use vellum_collab::{self as collab, CollaborationSession, RemoteFile, Utf16Change};
use vellum_compiler::{ChannelError, CompilerBridge};
use vellum_vfs::{
    FileNode, FileTree, PathError, ProjectPath, StorageBackend, StorageError, TreeError, ROOT_ID,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no tree entry with id `{0}`")]
    UnknownNode(String),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Compiler(#[from] ChannelError),
}

/// Single mutation entry point for one open project.
pub struct SyncCoordinator<S: StorageBackend> {
    tree: FileTree,
    storage: S,
    bridge: CompilerBridge,
    session: CollaborationSession,
    /// Set while remote content is being written into the tree.
    applying_remote: bool,
}

impl<S: StorageBackend> SyncCoordinator<S> {
    pub fn new(storage: S, bridge: CompilerBridge, session: CollaborationSession) -> Self {
        Self {
            tree: FileTree::new(),
            storage,
            bridge,
            session,
            applying_remote: false,
        }
    }

    pub fn tree(&self) -> &FileTree {
        &self.tree
    }

    pub fn bridge(&self) -> &CompilerBridge {
        &self.bridge
    }

    pub fn session(&self) -> &CollaborationSession {
        &self.session
    }

    /// Route a buffer change from the editor widget.
    ///
    /// Offsets arrive in UTF-16 code units; the session translates them to
    /// codepoints against its shadow content, and the same translated
    /// changes feed the compiler and the tree node. No-op while remote
    /// content is being applied.
    pub fn on_editor_change(
        &mut self,
        node_id: &str,
        changes: &[Utf16Change],
    ) -> Result<(), SyncError> {
        if self.applying_remote {
            log::trace!("editor change for `{node_id}` suppressed (remote apply)");
            return Ok(());
        }
        let path = self
            .tree
            .path(node_id)
            .ok_or_else(|| SyncError::UnknownNode(node_id.to_string()))?;

        let translated = self.session.edit(&path.rooted(), changes);

        let mut content = self
            .tree
            .get(node_id)
            .and_then(|node| node.content.clone())
            .unwrap_or_default();
        for change in &translated {
            self.bridge.edit(
                &path,
                &change.text,
                change.range_offset,
                change.range_offset + change.range_length,
            )?;
            content = collab::apply_change(&content, change);
        }
        self.tree.write_content(node_id, content)?;
        Ok(())
    }

    /// Seed the tree and the compiler from the server's `InitOk` baseline.
    ///
    /// The session already tracks these files itself; the guard flag keeps
    /// the resulting buffer updates from being queued as local edits.
    pub fn apply_initial_files(&mut self, files: &[RemoteFile]) -> Result<(), SyncError> {
        self.applying_remote = true;
        let result = self.apply_initial_files_inner(files);
        self.applying_remote = false;
        result
    }

    fn apply_initial_files_inner(&mut self, files: &[RemoteFile]) -> Result<(), SyncError> {
        for file in files {
            let path = ProjectPath::parse(&file.path)?;
            let node_id = match self.tree.find_by_path(&path) {
                Some(node) => node.id.clone(),
                None => {
                    let parent_id = self.ensure_directories(&path)?;
                    // Remote-seeded nodes have no backend descriptor yet;
                    // the rooted path serves as a stable id.
                    let node = FileNode::file(path.rooted(), path.name());
                    let id = node.id.clone();
                    self.tree.add_child(&parent_id, node, false)?;
                    id
                }
            };
            self.tree.write_content(&node_id, file.content.clone())?;
            self.bridge.add_file(&path, &file.content)?;
        }
        log::info!("applied {} remote file(s)", files.len());
        Ok(())
    }

    /// Create a file under `parent_id` and register it everywhere.
    /// Returns the backend-assigned node id.
    pub async fn create_file(
        &mut self,
        parent_id: &str,
        name: &str,
        content: &str,
    ) -> Result<String, SyncError> {
        let path = self.child_path(parent_id, name)?;
        let descriptor = self.storage.write_file(&path.rooted(), content).await?;

        let node = FileNode::file(descriptor.id.clone(), name);
        self.tree.add_child(parent_id, node, false)?;
        self.tree.write_content(&descriptor.id, content)?;

        self.bridge.add_file(&path, content)?;
        self.session.track_file(&path.rooted(), content, 0);
        Ok(descriptor.id)
    }

    /// Create a directory under `parent_id`. Directories exist only in the
    /// tree and the backend; neither the compiler nor the session tracks
    /// them until a file appears inside.
    pub async fn create_directory(
        &mut self,
        parent_id: &str,
        name: &str,
    ) -> Result<String, SyncError> {
        let path = self.child_path(parent_id, name)?;
        let descriptor = self.storage.add_directory(&path.rooted()).await?;

        let node = FileNode::directory(descriptor.id.clone(), name);
        self.tree.add_child(parent_id, node, false)?;
        Ok(descriptor.id)
    }

    /// Rename an entry in place.
    pub async fn rename(&mut self, node_id: &str, new_name: &str) -> Result<(), SyncError> {
        let old_path = self
            .tree
            .path(node_id)
            .ok_or_else(|| SyncError::UnknownNode(node_id.to_string()))?;
        let is_file = self.tree.get(node_id).is_some_and(|n| !n.is_directory());

        self.storage.rename_file(&old_path.rooted(), new_name).await?;
        self.tree.rename(node_id, new_name)?;

        if is_file {
            if let Some(new_path) = self.tree.path(node_id) {
                self.bridge.move_file(&old_path, &new_path)?;
            }
        }
        Ok(())
    }

    /// Reattach an entry under a new parent directory.
    pub async fn move_entry(&mut self, node_id: &str, new_parent_id: &str) -> Result<(), SyncError> {
        let old_path = self
            .tree
            .path(node_id)
            .ok_or_else(|| SyncError::UnknownNode(node_id.to_string()))?;
        let is_file = self.tree.get(node_id).is_some_and(|n| !n.is_directory());
        let new_parent = match self.tree.path(new_parent_id) {
            Some(path) => path.rooted(),
            None if new_parent_id == ROOT_ID => "/".to_string(),
            None => return Err(SyncError::UnknownNode(new_parent_id.to_string())),
        };

        self.storage.move_file(&old_path.rooted(), &new_parent).await?;
        self.tree.move_node(node_id, new_parent_id)?;

        if is_file {
            if let Some(new_path) = self.tree.path(node_id) {
                self.bridge.move_file(&old_path, &new_path)?;
            }
        }
        Ok(())
    }

    /// Detach an entry from the tree and delete it from the backend.
    pub async fn delete(&mut self, node_id: &str) -> Result<(), SyncError> {
        let path = self
            .tree
            .path(node_id)
            .ok_or_else(|| SyncError::UnknownNode(node_id.to_string()))?;
        self.storage.delete_file(&path.rooted()).await?;
        self.tree.delete(node_id)?;
        Ok(())
    }

    /// Shut everything down. Queued, untransmitted edits are dropped.
    pub fn dispose(&self) {
        self.session.dispose();
        self.bridge.dispose();
    }

    fn child_path(&self, parent_id: &str, name: &str) -> Result<ProjectPath, SyncError> {
        match self.tree.path(parent_id) {
            Some(parent) => Ok(parent.append(name)),
            None if parent_id == ROOT_ID => Ok(ProjectPath::parse(name)?),
            None => Err(SyncError::UnknownNode(parent_id.to_string())),
        }
    }

    /// Materialize the directory chain above `path`, creating missing
    /// nodes with path-derived ids. Returns the immediate parent's id.
    fn ensure_directories(&mut self, path: &ProjectPath) -> Result<String, SyncError> {
        let Some(parent) = path.parent() else {
            return Ok(ROOT_ID.to_string());
        };
        let mut parent_id = ROOT_ID.to_string();
        let mut prefix: Option<ProjectPath> = None;
        for segment in parent.segments() {
            let next = match &prefix {
                Some(p) => p.append(segment),
                None => ProjectPath::parse(segment)?,
            };
            parent_id = match self.tree.find_by_path(&next) {
                Some(node) => node.id.clone(),
                None => {
                    let node = FileNode::directory(next.rooted(), segment.clone());
                    let id = node.id.clone();
                    self.tree.add_child(&parent_id, node, false)?;
                    id
                }
            };
            prefix = Some(next);
        }
        Ok(parent_id)
    }
}
