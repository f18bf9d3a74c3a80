//! Id-indexed ownership tree of file and folder nodes.
//!
//! Nodes live in one `HashMap` keyed by their backend-assigned id; parents
//! hold child id lists and children hold a parent back-reference. Parent
//! pointers are only ever touched by the tree's own operations, which keeps
//! them acyclic: a node is attached exactly once, to exactly one parent.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::path::ProjectPath;

/// The fixed id of the tree root.
pub const ROOT_ID: &str = "root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    File,
    Directory,
}

/// A file or directory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileNode {
    /// Opaque backend id, stable across renames and moves.
    pub id: String,
    pub name: String,
    pub kind: FileKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Present only for files; `None` means not loaded yet.
    pub content: Option<String>,
    /// Only the tree's own operations touch these two; exposing them
    /// mutably would let a node be attached under two parents.
    parent: Option<String>,
    children: Vec<String>,
    /// Placeholder entry still waiting for its first name.
    pub pending_input: bool,
    /// Entry currently being renamed in place.
    pub renaming: bool,
}

impl FileNode {
    pub fn file(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, FileKind::File)
    }

    pub fn directory(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, FileKind::Directory)
    }

    fn new(id: impl Into<String>, name: impl Into<String>, kind: FileKind) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            created_at: now,
            updated_at: now,
            content: None,
            parent: None,
            children: Vec::new(),
            pending_input: false,
            renaming: false,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Id of the containing directory; `None` for the root and for
    /// detached nodes.
    pub fn parent_id(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Ids of the direct children, in insertion order (unsorted — see
    /// [`FileTree::children`] for display order).
    pub fn child_ids(&self) -> &[String] {
        &self.children
    }
}

/// The virtual file tree.
///
/// Single source of truth for what files exist and where. Mutation happens
/// only through the methods below; there is no way to reach a parent
/// pointer from outside.
#[derive(Debug)]
pub struct FileTree {
    nodes: HashMap<String, FileNode>,
}

impl FileTree {
    /// Create a tree containing only the root directory.
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_ID.to_string(), FileNode::directory(ROOT_ID, ROOT_ID));
        Self { nodes }
    }

    pub fn get(&self, id: &str) -> Option<&FileNode> {
        self.nodes.get(id)
    }

    pub fn root(&self) -> &FileNode {
        // The root is inserted at construction and never removed.
        &self.nodes[ROOT_ID]
    }

    /// Attach `node` under `parent_id`.
    ///
    /// Fails with `NameCollision` if a sibling carries the same name,
    /// unless `force` is set: then the collider is detached from the
    /// parent's child list but kept in the id map — purging any external
    /// store is the caller's responsibility.
    pub fn add_child(&mut self, parent_id: &str, mut node: FileNode, force: bool) -> Result<(), TreeError> {
        Self::check_name(&node.name)?;
        let parent = self
            .nodes
            .get(parent_id)
            .ok_or_else(|| TreeError::NotFound(parent_id.to_string()))?;
        if !parent.is_directory() {
            return Err(TreeError::NotADirectory(parent_id.to_string()));
        }

        let collider = parent
            .children
            .iter()
            .filter_map(|cid| self.nodes.get(cid))
            .find(|child| child.name == node.name)
            .cloned();

        if let Some(existing) = collider {
            if !force {
                return Err(TreeError::NameCollision {
                    existing: Box::new(existing),
                });
            }
            log::debug!(
                "force-add replacing `{}` under `{parent_id}` (old id {})",
                existing.name,
                existing.id
            );
            let old_id = existing.id;
            if let Some(parent) = self.nodes.get_mut(parent_id) {
                parent.children.retain(|cid| cid != &old_id);
            }
            if let Some(old) = self.nodes.get_mut(&old_id) {
                old.parent = None;
            }
        }

        // A freshly attached node starts with no links of its own, even if
        // it was deserialized with some; attachment happens one edge at a
        // time through this method.
        node.children.clear();
        node.parent = Some(parent_id.to_string());
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        if let Some(parent) = self.nodes.get_mut(parent_id) {
            parent.children.push(id);
        }
        Ok(())
    }

    /// Detach `child_id` from `parent_id`'s child mapping. Does not recurse
    /// and does not purge the node from the id map.
    pub fn remove_child(&mut self, parent_id: &str, child_id: &str) -> Result<(), TreeError> {
        let parent = self
            .nodes
            .get_mut(parent_id)
            .ok_or_else(|| TreeError::NotFound(parent_id.to_string()))?;
        parent.children.retain(|cid| cid != child_id);
        if let Some(child) = self.nodes.get_mut(child_id) {
            child.parent = None;
        }
        Ok(())
    }

    /// Children of `parent_id` in display order.
    ///
    /// Sort contract (the UI depends on it): pending-input entries that are
    /// not mid-rename sort last, directories come before files, ties break
    /// lexicographically by name.
    pub fn children(&self, parent_id: &str) -> Vec<&FileNode> {
        let Some(parent) = self.nodes.get(parent_id) else {
            return Vec::new();
        };
        let mut out: Vec<&FileNode> = parent
            .children
            .iter()
            .filter_map(|cid| self.nodes.get(cid))
            .collect();
        out.sort_by(|a, b| {
            let a_last = a.pending_input && !a.renaming;
            let b_last = b.pending_input && !b.renaming;
            a_last
                .cmp(&b_last)
                .then_with(|| (!a.is_directory()).cmp(&!b.is_directory()))
                .then_with(|| a.name.cmp(&b.name))
        });
        out
    }

    /// Detach a node from its parent. The root is not deletable.
    pub fn delete(&mut self, id: &str) -> Result<(), TreeError> {
        if id == ROOT_ID {
            return Err(TreeError::RootImmutable);
        }
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
        if let Some(parent_id) = node.parent.clone() {
            self.remove_child(&parent_id, id)?;
        }
        Ok(())
    }

    /// Rename a node in place. Rejects the root and sibling collisions.
    pub fn rename(&mut self, id: &str, new_name: &str) -> Result<(), TreeError> {
        if id == ROOT_ID {
            return Err(TreeError::RootImmutable);
        }
        Self::check_name(new_name)?;
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
        if let Some(parent_id) = node.parent.clone() {
            if let Some(existing) = self
                .children(&parent_id)
                .into_iter()
                .find(|sibling| sibling.id != id && sibling.name == new_name)
            {
                return Err(TreeError::NameCollision {
                    existing: Box::new(existing.clone()),
                });
            }
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.name = new_name.to_string();
            node.updated_at = Utc::now();
        }
        Ok(())
    }

    /// Reattach a node under a new parent. Rejects the root, non-directory
    /// targets, sibling collisions, and moves into the node's own subtree.
    pub fn move_node(&mut self, id: &str, new_parent_id: &str) -> Result<(), TreeError> {
        if id == ROOT_ID {
            return Err(TreeError::RootImmutable);
        }
        let target = self
            .nodes
            .get(new_parent_id)
            .ok_or_else(|| TreeError::NotFound(new_parent_id.to_string()))?;
        if !target.is_directory() {
            return Err(TreeError::NotADirectory(new_parent_id.to_string()));
        }

        // Walk the target's ancestry; finding `id` there would create a cycle.
        let mut cursor = Some(new_parent_id.to_string());
        while let Some(cur) = cursor {
            if cur == id {
                return Err(TreeError::IntoOwnSubtree(id.to_string()));
            }
            cursor = self.nodes.get(&cur).and_then(|n| n.parent.clone());
        }

        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
        let name = node.name.clone();
        let old_parent = node.parent.clone();

        if let Some(existing) = self
            .children(new_parent_id)
            .into_iter()
            .find(|sibling| sibling.id != id && sibling.name == name)
        {
            return Err(TreeError::NameCollision {
                existing: Box::new(existing.clone()),
            });
        }

        if let Some(old_parent_id) = old_parent {
            self.remove_child(&old_parent_id, id)?;
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = Some(new_parent_id.to_string());
            node.updated_at = Utc::now();
        }
        if let Some(parent) = self.nodes.get_mut(new_parent_id) {
            parent.children.push(id.to_string());
        }
        Ok(())
    }

    /// Replace a file's content in place.
    pub fn write_content(&mut self, id: &str, text: impl Into<String>) -> Result<(), TreeError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
        if node.is_directory() {
            return Err(TreeError::NotAFile(id.to_string()));
        }
        node.content = Some(text.into());
        node.updated_at = Utc::now();
        Ok(())
    }

    /// Derived path of a node, computed by walking parent references.
    /// Returns `None` for the root, unknown ids, and detached nodes.
    pub fn path(&self, id: &str) -> Option<ProjectPath> {
        if id == ROOT_ID {
            return None;
        }
        let mut names = Vec::new();
        let mut cursor = self.nodes.get(id)?;
        loop {
            names.push(cursor.name.clone());
            match cursor.parent.as_deref() {
                Some(ROOT_ID) => break,
                Some(parent_id) => cursor = self.nodes.get(parent_id)?,
                None => return None,
            }
        }
        names.reverse();
        ProjectPath::from_segments(names).ok()
    }

    /// Resolve a path to a node by walking child names from the root.
    pub fn find_by_path(&self, path: &ProjectPath) -> Option<&FileNode> {
        let mut cursor = self.root();
        for segment in path.segments() {
            cursor = cursor
                .children
                .iter()
                .filter_map(|cid| self.nodes.get(cid))
                .find(|child| &child.name == segment)?;
        }
        Some(cursor)
    }

    fn check_name(name: &str) -> Result<(), TreeError> {
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(TreeError::InvalidName(name.to_string()));
        }
        Ok(())
    }
}

impl Default for FileTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(tree: &mut FileTree, parent: &str, node: FileNode) {
        tree.add_child(parent, node, false).unwrap();
    }

    #[test]
    fn test_root_exists() {
        let tree = FileTree::new();
        assert_eq!(tree.root().id, ROOT_ID);
        assert!(tree.root().parent.is_none());
        assert!(tree.root().is_directory());
    }

    #[test]
    fn test_add_and_lookup() {
        let mut tree = FileTree::new();
        add(&mut tree, ROOT_ID, FileNode::directory("d1", "docs"));
        add(&mut tree, "d1", FileNode::file("f1", "main.typ"));

        let node = tree.get("f1").unwrap();
        assert_eq!(node.parent.as_deref(), Some("d1"));
        assert_eq!(tree.path("f1").unwrap().rooted(), "/docs/main.typ");
        assert_eq!(
            tree.find_by_path(&ProjectPath::parse("docs/main.typ").unwrap()).unwrap().id,
            "f1"
        );
    }

    #[test]
    fn test_name_collision_carries_existing() {
        let mut tree = FileTree::new();
        add(&mut tree, ROOT_ID, FileNode::file("f1", "main.typ"));

        let err = tree
            .add_child(ROOT_ID, FileNode::file("f2", "main.typ"), false)
            .unwrap_err();
        match err {
            TreeError::NameCollision { existing } => assert_eq!(existing.id, "f1"),
            other => panic!("expected NameCollision, got {other:?}"),
        }
    }

    #[test]
    fn test_force_add_replaces_mapping_keeps_backing_entry() {
        let mut tree = FileTree::new();
        add(&mut tree, ROOT_ID, FileNode::file("f1", "main.typ"));
        tree.add_child(ROOT_ID, FileNode::file("f2", "main.typ"), true)
            .unwrap();

        let names: Vec<_> = tree.children(ROOT_ID).iter().map(|n| n.id.clone()).collect();
        assert_eq!(names, vec!["f2"]);
        // The collider stays in the id map, detached.
        let old = tree.get("f1").unwrap();
        assert!(old.parent.is_none());
    }

    #[test]
    fn test_add_child_discards_preseeded_links() {
        let mut tree = FileTree::new();
        add(&mut tree, ROOT_ID, FileNode::file("f1", "main.typ"));

        // A node arriving with links already filled in (e.g. built from
        // serialized data) must not graft an existing node under a second
        // parent.
        let mut dir = FileNode::directory("d1", "docs");
        dir.parent = Some("stale".to_string());
        dir.children = vec!["f1".to_string()];
        add(&mut tree, ROOT_ID, dir);

        assert!(tree.children("d1").is_empty());
        assert_eq!(tree.get("d1").unwrap().parent_id(), Some(ROOT_ID));
        // f1 still has exactly one parent: the root.
        assert_eq!(tree.get("f1").unwrap().parent_id(), Some(ROOT_ID));
        let root_children: Vec<&str> =
            tree.children(ROOT_ID).iter().map(|n| n.id.as_str()).collect();
        assert_eq!(root_children, vec!["d1", "f1"]);
    }

    #[test]
    fn test_children_sort_order() {
        let mut tree = FileTree::new();
        // A pending-input file named earlier alphabetically than its siblings.
        let mut pending = FileNode::file("p", "aaa.typ");
        pending.pending_input = true;
        add(&mut tree, ROOT_ID, pending);
        add(&mut tree, ROOT_ID, FileNode::file("f1", "zzz.typ"));
        add(&mut tree, ROOT_ID, FileNode::file("f2", "main.typ"));
        add(&mut tree, ROOT_ID, FileNode::directory("d1", "images"));
        add(&mut tree, ROOT_ID, FileNode::directory("d2", "chapters"));

        let names: Vec<&str> = tree.children(ROOT_ID).iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["chapters", "images", "main.typ", "zzz.typ", "aaa.typ"]);
    }

    #[test]
    fn test_pending_but_renaming_sorts_normally() {
        let mut tree = FileTree::new();
        let mut node = FileNode::file("p", "aaa.typ");
        node.pending_input = true;
        node.renaming = true;
        add(&mut tree, ROOT_ID, node);
        add(&mut tree, ROOT_ID, FileNode::file("f1", "bbb.typ"));

        let names: Vec<&str> = tree.children(ROOT_ID).iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["aaa.typ", "bbb.typ"]);
    }

    #[test]
    fn test_delete_root_fails() {
        let mut tree = FileTree::new();
        assert!(matches!(tree.delete(ROOT_ID), Err(TreeError::RootImmutable)));
        assert!(matches!(tree.rename(ROOT_ID, "x"), Err(TreeError::RootImmutable)));
    }

    #[test]
    fn test_delete_detaches_node() {
        let mut tree = FileTree::new();
        add(&mut tree, ROOT_ID, FileNode::file("f1", "main.typ"));
        tree.delete("f1").unwrap();
        assert!(tree.children(ROOT_ID).is_empty());
        // Logically removed, not purged.
        assert!(tree.get("f1").is_some());
    }

    #[test]
    fn test_add_remove_round_trip() {
        let mut tree = FileTree::new();
        add(&mut tree, ROOT_ID, FileNode::file("f1", "a.typ"));
        let before: Vec<String> = tree.children(ROOT_ID).iter().map(|n| n.id.clone()).collect();

        add(&mut tree, ROOT_ID, FileNode::file("f2", "b.typ"));
        tree.remove_child(ROOT_ID, "f2").unwrap();

        let after: Vec<String> = tree.children(ROOT_ID).iter().map(|n| n.id.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_rename_updates_path() {
        let mut tree = FileTree::new();
        add(&mut tree, ROOT_ID, FileNode::directory("d1", "docs"));
        add(&mut tree, "d1", FileNode::file("f1", "draft.typ"));

        tree.rename("f1", "final.typ").unwrap();
        assert_eq!(tree.path("f1").unwrap().rooted(), "/docs/final.typ");
        // Id is stable across the rename.
        assert_eq!(tree.get("f1").unwrap().id, "f1");
    }

    #[test]
    fn test_rename_collision() {
        let mut tree = FileTree::new();
        add(&mut tree, ROOT_ID, FileNode::file("f1", "a.typ"));
        add(&mut tree, ROOT_ID, FileNode::file("f2", "b.typ"));
        assert!(matches!(
            tree.rename("f2", "a.typ"),
            Err(TreeError::NameCollision { .. })
        ));
    }

    #[test]
    fn test_move_node() {
        let mut tree = FileTree::new();
        add(&mut tree, ROOT_ID, FileNode::directory("d1", "docs"));
        add(&mut tree, ROOT_ID, FileNode::file("f1", "main.typ"));

        tree.move_node("f1", "d1").unwrap();
        assert_eq!(tree.path("f1").unwrap().rooted(), "/docs/main.typ");
        assert_eq!(tree.children(ROOT_ID).len(), 1);
    }

    #[test]
    fn test_move_into_own_subtree_rejected() {
        let mut tree = FileTree::new();
        add(&mut tree, ROOT_ID, FileNode::directory("d1", "a"));
        add(&mut tree, "d1", FileNode::directory("d2", "b"));
        assert!(matches!(
            tree.move_node("d1", "d2"),
            Err(TreeError::IntoOwnSubtree(_))
        ));
    }

    #[test]
    fn test_move_into_file_rejected() {
        let mut tree = FileTree::new();
        add(&mut tree, ROOT_ID, FileNode::file("f1", "a.typ"));
        add(&mut tree, ROOT_ID, FileNode::file("f2", "b.typ"));
        assert!(matches!(
            tree.move_node("f2", "f1"),
            Err(TreeError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_write_content() {
        let mut tree = FileTree::new();
        add(&mut tree, ROOT_ID, FileNode::file("f1", "main.typ"));
        tree.write_content("f1", "= Hello").unwrap();
        assert_eq!(tree.get("f1").unwrap().content.as_deref(), Some("= Hello"));

        add(&mut tree, ROOT_ID, FileNode::directory("d1", "docs"));
        assert!(matches!(tree.write_content("d1", "x"), Err(TreeError::NotAFile(_))));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut tree = FileTree::new();
        assert!(matches!(
            tree.add_child(ROOT_ID, FileNode::file("f1", "a/b"), false),
            Err(TreeError::InvalidName(_))
        ));
        assert!(matches!(
            tree.add_child(ROOT_ID, FileNode::file("f1", ""), false),
            Err(TreeError::InvalidName(_))
        ));
    }
}
