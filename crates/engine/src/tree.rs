use hashbrown::HashMap;
use log::debug;

use crate::{
    error::Result,
    index::{
        FileIndexManager, ListType,
        helpers::{path_components, strip_root, trim_trailing_sep},
    },
    node::FileNodeInfo,
};

#[derive(Debug, Default)]
pub struct FileTreeNode {
    name: String,
    info: Option<FileNodeInfo>,
    children: HashMap<String, FileTreeNode>,
}

impl FileTreeNode {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn info(&self) -> Option<&FileNodeInfo> {
        self.info.as_ref()
    }

    pub fn child(&self, name: &str) -> Option<&FileTreeNode> {
        self.children.get(name)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Children ordered by name.
    pub fn children(&self) -> Vec<&FileTreeNode> {
        let mut out: Vec<&FileTreeNode> = self.children.values().collect();
        out.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        self.children
            .values()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }
}

/// Directory tree rebuilt from a flat manifest.
#[derive(Debug)]
pub struct FileTree {
    root_path: String,
    root: FileTreeNode,
}

impl FileTree {
    /// Empty tree; manifest paths are resolved relative to `root_path`.
    pub fn new(root_path: &str) -> Self {
        let root_path = trim_trailing_sep(root_path).to_owned();
        Self {
            root: FileTreeNode::new(&root_path),
            root_path,
        }
    }

    /// Build from a manifest: directories first so every file finds its
    /// parent, then files.
    pub fn from_index(index: &mut FileIndexManager, root_path: &str) -> Result<Self> {
        let mut tree = FileTree::new(root_path);
        for list in [ListType::Dirs, ListType::Files] {
            for node in index.nodes(list, 0)? {
                tree.add_node(node?);
            }
        }
        Ok(tree)
    }

    pub fn from_nodes(
        root_path: &str,
        dirs: impl IntoIterator<Item = FileNodeInfo>,
        files: impl IntoIterator<Item = FileNodeInfo>,
    ) -> Self {
        let mut tree = FileTree::new(root_path);
        for node in dirs.into_iter().chain(files) {
            tree.add_node(node);
        }
        tree
    }

    #[inline]
    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    #[inline]
    pub fn root(&self) -> &FileTreeNode {
        &self.root
    }

    /// Attach `info` at its path, creating missing intermediate nodes.
    /// Returns false for paths outside the tree's root.
    pub fn add_node(&mut self, info: FileNodeInfo) -> bool {
        let Some(rel) = strip_root(info.path(), &self.root_path) else {
            debug!(
                "[tree] {} is outside {:?}, skipped",
                info.path(),
                self.root_path
            );
            return false;
        };

        let mut cur = &mut self.root;
        for name in path_components(rel) {
            cur = cur
                .children
                .entry_ref(name)
                .or_insert_with(|| FileTreeNode::new(name));
        }
        cur.info = Some(info);
        true
    }

    /// Component-wise lookup; `None` for a missing path.
    pub fn node_by_path(&self, path: &str) -> Option<&FileTreeNode> {
        let rel = strip_root(path, &self.root_path).unwrap_or(path);
        path_components(rel).try_fold(&self.root, |node, name| node.child(name))
    }
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
