//! Composition root tying the tree, its index, the view, and editing sessions together.
//!
//! Every structural mutation goes through here so the index is rebuilt and the
//! selection and open session follow renames and removals.

use std::sync::Arc;

use crate::app::gateway::ExternalToolGateway;
use crate::app::index::{TreeIndex, breadcrumbs};
use crate::app::session::{Committed, EditingSession, EditingSessionCoordinator, EditorOptions};
use crate::app::tree::PathTree;
use crate::app::view::{Presentation, ViewController};
use crate::domain::errors::{SessionError, TreeError};
use crate::domain::model::{IndexEntry, NodeTemplate};

#[derive(Debug)]
pub struct Workbench {
    tree: PathTree,
    index: TreeIndex,
    view: ViewController,
    editing: EditingSessionCoordinator,
}

impl Workbench {
    pub fn new(tree: PathTree, gateway: Arc<ExternalToolGateway>, options: EditorOptions) -> Self {
        let index = TreeIndex::build(&tree);
        Self {
            tree,
            index,
            view: ViewController::new(),
            editing: EditingSessionCoordinator::new(gateway, options),
        }
    }

    pub fn tree(&self) -> &PathTree {
        &self.tree
    }

    pub fn index(&self) -> &TreeIndex {
        &self.index
    }

    pub fn view(&self) -> &ViewController {
        &self.view
    }

    pub fn session(&self) -> Option<&EditingSession> {
        self.editing.active()
    }

    pub async fn select(&mut self, path: &str) -> &Presentation {
        self.view.select(&self.tree, &mut self.editing, path).await
    }

    /// Select an index entry; entries that no longer resolve are ignored.
    pub async fn open_entry(&mut self, entry: &IndexEntry) -> Option<&Presentation> {
        if !self.tree.contains(&entry.path) {
            tracing::debug!(path = %entry.path, "ignoring stale index entry");
            return None;
        }
        Some(self.select(&entry.path).await)
    }

    pub fn search(&self, query: &str, limit: Option<usize>) -> Vec<IndexEntry> {
        self.index.search(query, limit)
    }

    pub fn list_top_level(&self, limit: usize) -> Vec<IndexEntry> {
        self.index.top_level(limit)
    }

    pub fn list_root_children(&self, limit: usize) -> Vec<IndexEntry> {
        self.index.root_children(limit)
    }

    /// Breadcrumbs for the current selection.
    pub fn breadcrumbs(&self) -> Vec<(String, String)> {
        self.view.selected().map(breadcrumbs).unwrap_or_default()
    }

    pub fn add(
        &mut self,
        parent_path: &str,
        name: &str,
        template: &NodeTemplate,
    ) -> Result<String, TreeError> {
        let path = self.tree.add(parent_path, name, template)?;
        self.after_structural_change();
        Ok(path)
    }

    pub fn duplicate(&mut self, path: &str) -> Result<String, TreeError> {
        let copy = self.tree.duplicate(path)?;
        self.after_structural_change();
        Ok(copy)
    }

    /// Remove `path`; a session or selection inside the removed subtree is dropped.
    pub async fn remove(&mut self, path: &str) -> bool {
        if !self.tree.contains(path) {
            return false;
        }
        self.editing.discard_within(path).await;
        self.view.forget_within(path);
        let removed = self.tree.remove(path);
        self.after_structural_change();
        removed
    }

    pub fn rename(&mut self, path: &str, new_name: &str) -> Result<String, TreeError> {
        let new_path = self.tree.rename(path, new_name)?;
        self.editing.rebind(path, &new_path);
        self.view.rebind(&self.tree, path, &new_path);
        self.after_structural_change();
        Ok(new_path)
    }

    pub fn export_snapshot(&self) -> String {
        self.tree.serialize()
    }

    /// Replace the whole tree; the open session and selection are dropped on success.
    pub async fn import_snapshot(&mut self, text: &str) -> Result<(), TreeError> {
        let mut next = self.tree.clone();
        next.deserialize(text)?;
        self.editing.cancel().await;
        self.view.reset();
        self.tree = next;
        self.after_structural_change();
        Ok(())
    }

    /// Open an editing session; on tool failure the view falls back to the raw payload.
    pub async fn enter_edit(&mut self, path: &str) -> Result<&EditingSession, SessionError> {
        match self.editing.enter_edit(&self.tree, path).await {
            Ok(_) => {}
            Err(err @ SessionError::ToolUnavailable(_)) => {
                self.view.degrade(&self.tree, path);
                return Err(err);
            }
            Err(err) => return Err(err),
        }
        self.editing.active().ok_or(SessionError::NoActiveSession)
    }

    pub async fn save(&mut self) -> Result<Committed, SessionError> {
        let committed = self.editing.save(&mut self.tree, &mut self.index).await?;
        self.view.refresh(&self.tree);
        Ok(committed)
    }

    pub async fn cancel(&mut self) {
        self.editing.cancel().await;
    }

    pub async fn import_diagram(&mut self, xml: &str) -> Result<(), SessionError> {
        self.editing.import_diagram(&mut self.tree, xml).await?;
        self.view.refresh(&self.tree);
        Ok(())
    }

    pub async fn export_diagram(&mut self) -> Result<String, SessionError> {
        let xml = self.editing.export_diagram(&mut self.tree).await?;
        self.view.refresh(&self.tree);
        Ok(xml)
    }

    pub async fn reset_diagram(&mut self) -> Result<(), SessionError> {
        self.editing.reset_diagram(&mut self.tree).await?;
        self.view.refresh(&self.tree);
        Ok(())
    }

    fn after_structural_change(&mut self) {
        self.index.rebuild(&self.tree);
        self.view.refresh(&self.tree);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::gateway::testing::{MockLoader, gateway};
    use crate::app::view::ViewState;
    use crate::domain::errors::ToolError;

    fn workbench() -> Workbench {
        let (loader, _) = MockLoader::new();
        Workbench::new(
            PathTree::with_default_layout(),
            gateway(loader),
            EditorOptions::default(),
        )
    }

    #[tokio::test]
    async fn mutations_keep_index_fresh() {
        let mut bench = workbench();
        let path = bench
            .add("Workspace/Documents", "Guide", &NodeTemplate::document())
            .unwrap();
        assert!(!bench.index().is_stale(bench.tree()));
        assert_eq!(bench.search("guide", None)[0].path, path);

        let copy = bench.duplicate(&path).unwrap();
        assert_eq!(copy, "Workspace/Documents/Guide (1)");
        assert_eq!(bench.search("guide", None).len(), 2);

        assert!(bench.remove(&copy).await);
        assert_eq!(bench.search("guide", None).len(), 1);
    }

    #[tokio::test]
    async fn top_level_and_root_children_are_separate_listings() {
        let mut bench = workbench();
        bench.add("", "Archive", &NodeTemplate::folder()).unwrap();

        let top: Vec<_> = bench.list_top_level(10).into_iter().map(|e| e.path).collect();
        assert_eq!(top, ["Workspace", "Archive"]);
        let children: Vec<_> = bench
            .list_root_children(10)
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(
            children,
            ["Workspace/Documents", "Workspace/Processes", "Workspace/Organigram"]
        );
    }

    #[tokio::test]
    async fn stale_entries_are_inert() {
        let mut bench = workbench();
        let entry = bench.search("welcome", None).remove(0);
        assert!(bench.remove(&entry.path).await);

        assert!(bench.open_entry(&entry).await.is_none());
        assert_eq!(bench.view().state(), ViewState::NoSelection);
    }

    #[tokio::test]
    async fn removing_edited_node_drops_session_and_selection() {
        let mut bench = workbench();
        bench.select("Workspace/Documents/Welcome").await;
        bench.enter_edit("Workspace/Documents/Welcome").await.unwrap();

        assert!(bench.remove("Workspace/Documents").await);
        assert!(bench.session().is_none());
        assert_eq!(bench.view().state(), ViewState::NoSelection);
    }

    #[tokio::test]
    async fn renaming_ancestor_rebinds_session() {
        let mut bench = workbench();
        bench.select("Workspace/Documents/Welcome").await;
        bench.enter_edit("Workspace/Documents/Welcome").await.unwrap();

        bench.rename("Workspace/Documents", "Docs").unwrap();
        assert_eq!(
            bench.session().map(EditingSession::path),
            Some("Workspace/Docs/Welcome")
        );
        assert_eq!(bench.view().selected(), Some("Workspace/Docs/Welcome"));

        let committed = bench.save().await.unwrap();
        assert_eq!(committed.path, "Workspace/Docs/Welcome");
        assert_eq!(
            bench.breadcrumbs(),
            vec![
                ("Workspace".to_string(), "Workspace".to_string()),
                ("Docs".to_string(), "Workspace/Docs".to_string()),
                ("Welcome".to_string(), "Workspace/Docs/Welcome".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn tool_failure_degrades_to_raw_view() {
        let (loader, script) = MockLoader::new();
        script.load_failures.lock().push_back(ToolError::Missing("diagram tool"));
        let mut bench = Workbench::new(
            PathTree::with_default_layout(),
            gateway(loader),
            EditorOptions::default(),
        );
        bench.select("Workspace/Processes/Onboarding").await;

        let err = bench
            .enter_edit("Workspace/Processes/Onboarding")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ToolUnavailable(_)));
        assert!(matches!(
            bench.view().presentation(),
            Presentation::Raw { .. }
        ));
    }

    #[tokio::test]
    async fn import_snapshot_is_atomic() {
        let mut bench = workbench();
        let before = bench.export_snapshot();

        assert!(bench.import_snapshot("{ broken").await.is_err());
        assert_eq!(bench.export_snapshot(), before);

        bench
            .import_snapshot(r#"{"Root": {"type": "root", "children": {"Only": {"type": "folder", "children": {}}}}}"#)
            .await
            .unwrap();
        assert_eq!(bench.index().len(), 2);
        assert!(bench.tree().contains("Root/Only"));
        assert!(!bench.tree().contains("Workspace"));
    }

    #[tokio::test]
    async fn diagram_export_refreshes_process_view() {
        let mut bench = workbench();
        bench.select("Workspace/Processes/Onboarding").await;
        bench.enter_edit("Workspace/Processes/Onboarding").await.unwrap();

        let xml = bench.export_diagram().await.unwrap();
        assert_eq!(
            bench.view().presentation(),
            &Presentation::Process {
                path: "Workspace/Processes/Onboarding".into(),
                xml: Some(xml),
            }
        );
    }
}
