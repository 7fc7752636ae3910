//! Flattened listing of the tree used for search, quick access, and breadcrumbs.

use crate::app::tree::PathTree;
use crate::domain::model::{IndexEntry, join_path};

/// Snapshot of every node in pre-order, tagged with the tree revision it was built from.
#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    entries: Vec<IndexEntry>,
    revision: Option<u64>,
}

impl TreeIndex {
    /// Create an empty index that is stale against any tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index for `tree`.
    pub fn build(tree: &PathTree) -> Self {
        let mut index = Self::new();
        index.rebuild(tree);
        index
    }

    /// Replace the listing with a fresh pre-order traversal of `tree`.
    pub fn rebuild(&mut self, tree: &PathTree) -> &[IndexEntry] {
        self.entries = tree
            .walk()
            .into_iter()
            .map(|(path, node)| IndexEntry {
                name: node.name().to_string(),
                path,
                kind: node.kind(),
                icon: node.icon().map(ToString::to_string),
            })
            .collect();
        self.revision = Some(tree.revision());
        tracing::debug!(entries = self.entries.len(), "tree index rebuilt");
        &self.entries
    }

    /// Whether the tree has changed structurally since the last rebuild.
    pub fn is_stale(&self, tree: &PathTree) -> bool {
        self.revision != Some(tree.revision())
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive substring match on name or path, in tree order.
    pub fn search(&self, query: &str, limit: Option<usize>) -> Vec<IndexEntry> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|entry| {
                entry.name.to_lowercase().contains(&needle)
                    || entry.path.to_lowercase().contains(&needle)
            })
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Entries of the top-level mapping, up to `limit`.
    pub fn top_level(&self, limit: usize) -> Vec<IndexEntry> {
        self.at_depth(1, limit)
    }

    /// Direct children of the top-level entries, in tree order, up to `limit`.
    pub fn root_children(&self, limit: usize) -> Vec<IndexEntry> {
        self.at_depth(2, limit)
    }

    fn at_depth(&self, depth: usize, limit: usize) -> Vec<IndexEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.path.split('/').count() == depth)
            .take(limit)
            .cloned()
            .collect()
    }
}

/// `(name, path)` for each ancestor of `path` and the path itself.
pub fn breadcrumbs(path: &str) -> Vec<(String, String)> {
    let mut crumbs = Vec::new();
    let mut prefix = String::new();
    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
        prefix = join_path(&prefix, segment);
        crumbs.push((segment.to_string(), prefix.clone()));
    }
    crumbs
}
