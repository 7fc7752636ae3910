//! Persistence of tree snapshots on disk.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::app::tree::PathTree;

/// Reads and writes the snapshot file backing a [`PathTree`].
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored tree, falling back to the default layout when no snapshot exists yet.
    pub fn load(&self) -> Result<PathTree> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no snapshot yet, using default layout");
                return Ok(PathTree::with_default_layout());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read snapshot: {}", self.path.display()));
            }
        };
        let mut tree = PathTree::new();
        tree.deserialize(&text)
            .with_context(|| format!("invalid snapshot: {}", self.path.display()))?;
        Ok(tree)
    }

    /// Write `tree` through a sibling temp file so a failed write leaves the old snapshot intact.
    pub fn save(&self, tree: &PathTree) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, tree.serialize())
            .with_context(|| format!("failed to write {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), nodes = tree.len(), "snapshot saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::NodeTemplate;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_default_layout() -> Result<()> {
        let dir = tempdir()?;
        let store = SnapshotStore::new(dir.path().join("absent.json"));
        let tree = store.load()?;
        assert!(tree.contains("Workspace/Documents/Welcome"));
        Ok(())
    }

    #[test]
    fn save_creates_parent_dirs_and_reloads() -> Result<()> {
        let dir = tempdir()?;
        let store = SnapshotStore::new(dir.path().join("nested/state/tree.json"));
        let mut tree = PathTree::with_default_layout();
        tree.add("Workspace", "Notes", &NodeTemplate::folder())?;

        store.save(&tree)?;
        let loaded = store.load()?;
        assert_eq!(loaded.serialize(), tree.serialize());
        assert!(!store.path().with_extension("json.tmp").exists());
        Ok(())
    }

    #[test]
    fn corrupt_snapshot_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("tree.json");
        fs::write(&path, "[1, 2")?;
        let err = SnapshotStore::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("invalid snapshot"));
        Ok(())
    }

    #[test]
    fn deep_tree_survives_save_and_load() -> Result<()> {
        let dir = tempdir()?;
        let store = SnapshotStore::new(dir.path().join("tree.json"));
        let mut tree = PathTree::new();
        let mut path = String::new();
        for level in 0..70 {
            path = tree.add(&path, &format!("L{level}"), &NodeTemplate::folder())?;
        }

        store.save(&tree)?;
        assert!(store.load()?.contains(&path));
        Ok(())
    }
}
