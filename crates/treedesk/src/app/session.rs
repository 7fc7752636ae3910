//! Editing sessions binding one node to one live external tool.
//!
//! At most one session exists at a time. Document edits are deferred until an
//! explicit [`EditingSessionCoordinator::save`]; diagram import, export, and
//! reset persist into the node immediately because the modeler's content is
//! the source of truth for layout.

use std::fmt;
use std::sync::Arc;

use crate::app::gateway::ExternalToolGateway;
use crate::app::index::TreeIndex;
use crate::app::tools::{DiagramTool, RichTextConfig, RichTextTool, SaveXmlOptions, SurfaceRef};
use crate::app::tree::PathTree;
use crate::domain::errors::{SessionError, ToolError};
use crate::domain::model::{NodeKind, NodeTemplate};

/// Minimal diagram with a single start event, loaded on reset and for empty processes.
pub const STARTER_DIAGRAM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL" xmlns:bpmndi="http://www.omg.org/spec/BPMN/20100524/DI" xmlns:dc="http://www.omg.org/spec/DD/20100524/DC" id="Definitions_1" targetNamespace="http://bpmn.io/schema/bpmn">
  <bpmn:process id="Process_1" isExecutable="false">
    <bpmn:startEvent id="StartEvent_1"/>
  </bpmn:process>
  <bpmndi:BPMNDiagram id="BPMNDiagram_1">
    <bpmndi:BPMNPlane id="BPMNPlane_1" bpmnElement="Process_1">
      <bpmndi:BPMNShape id="StartEvent_1_di" bpmnElement="StartEvent_1">
        <dc:Bounds x="173" y="102" width="36" height="36"/>
      </bpmndi:BPMNShape>
    </bpmndi:BPMNPlane>
  </bpmndi:BPMNDiagram>
</bpmn:definitions>
"#;

/// Settings applied to every session the coordinator opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorOptions {
    /// Block kinds enabled in the rich-text tool.
    pub block_kinds: Vec<String>,
    /// Whether diagram exports are pretty-printed.
    pub pretty_export: bool,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            block_kinds: vec![
                "header".into(),
                "paragraph".into(),
                "list".into(),
                "checklist".into(),
                "quote".into(),
                "table".into(),
            ],
            pretty_export: true,
        }
    }
}

/// Which tool a session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Document,
    Process,
}

enum BoundTool {
    RichText(Box<dyn RichTextTool>),
    Diagram(Box<dyn DiagramTool>),
}

impl BoundTool {
    async fn release(self) {
        match self {
            BoundTool::RichText(tool) => tool.destroy().await,
            BoundTool::Diagram(tool) => tool.destroy(),
        }
    }
}

/// The binding between one node path and one live tool instance.
pub struct EditingSession {
    path: String,
    tool: BoundTool,
}

impl fmt::Debug for EditingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditingSession")
            .field("path", &self.path)
            .field("kind", &self.kind())
            .finish()
    }
}

impl EditingSession {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> SessionKind {
        match self.tool {
            BoundTool::RichText(_) => SessionKind::Document,
            BoundTool::Diagram(_) => SessionKind::Process,
        }
    }
}

/// Outcome of a successful [`EditingSessionCoordinator::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub path: String,
    pub kind: SessionKind,
}

/// Owns the single active editing session and mediates it against the tree.
pub struct EditingSessionCoordinator {
    gateway: Arc<ExternalToolGateway>,
    options: EditorOptions,
    session: Option<EditingSession>,
}

impl fmt::Debug for EditingSessionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditingSessionCoordinator")
            .field("options", &self.options)
            .field("session", &self.session)
            .finish()
    }
}

impl EditingSessionCoordinator {
    pub fn new(gateway: Arc<ExternalToolGateway>, options: EditorOptions) -> Self {
        Self {
            gateway,
            options,
            session: None,
        }
    }

    pub fn active(&self) -> Option<&EditingSession> {
        self.session.as_ref()
    }

    /// Path of the node bound to the open session, if any.
    pub fn active_path(&self) -> Option<&str> {
        self.session.as_ref().map(EditingSession::path)
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    /// Open a session for the document or process at `path`.
    ///
    /// Re-entering the path of the open session returns it unchanged. A session
    /// bound to another path is discarded without writing anything back.
    pub async fn enter_edit(
        &mut self,
        tree: &PathTree,
        path: &str,
    ) -> Result<&EditingSession, SessionError> {
        let node = tree.resolve(path)?;
        let kind = node.kind();
        if !kind.is_editable() {
            return Err(SessionError::WrongType {
                path: path.to_string(),
                kind,
            });
        }

        if self.active_path() == Some(path) {
            return self.session.as_ref().ok_or(SessionError::NoActiveSession);
        }
        self.discard().await;

        let session = match kind {
            NodeKind::Document => {
                let content = node
                    .editor_data()
                    .cloned()
                    .or_else(|| NodeTemplate::document().editor_data)
                    .unwrap_or_default();
                self.open_document(path, content).await?
            }
            _ => {
                let xml = node
                    .content()
                    .and_then(|content| content.xml.clone())
                    .unwrap_or_else(|| STARTER_DIAGRAM.to_string());
                self.open_process(path, &xml).await?
            }
        };
        tracing::info!(%path, kind = ?session.kind(), "editing session opened");
        Ok(self.session.insert(session))
    }

    /// Commit the tool's current content into the bound node and close the session.
    ///
    /// When the tool rejects the save the session stays open and the tree is untouched.
    pub async fn save(
        &mut self,
        tree: &mut PathTree,
        index: &mut TreeIndex,
    ) -> Result<Committed, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        let path = session.path.clone();
        let kind = session.kind();

        match &mut session.tool {
            BoundTool::RichText(tool) => {
                let data = tool.save().await.map_err(save_error)?;
                if let Err(err) = tree.set_editor_data(&path, data) {
                    self.discard().await;
                    return Err(err.into());
                }
            }
            BoundTool::Diagram(tool) => {
                let saved = tool
                    .save_xml(SaveXmlOptions {
                        format: self.options.pretty_export,
                    })
                    .await
                    .map_err(save_error)?;
                if let Err(err) = tree.set_diagram(&path, saved.xml) {
                    self.discard().await;
                    return Err(err.into());
                }
            }
        }

        index.rebuild(tree);
        if let Some(session) = self.session.take() {
            session.tool.release().await;
        }
        tracing::info!(%path, ?kind, "editing session committed");
        Ok(Committed { path, kind })
    }

    /// Release the open session without writing anything back. No-op without a session.
    pub async fn cancel(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::info!(path = %session.path, "editing session cancelled");
            session.tool.release().await;
        }
    }

    /// Replace the modeler's diagram with `xml` and persist it to the node immediately.
    pub async fn import_diagram(
        &mut self,
        tree: &mut PathTree,
        xml: &str,
    ) -> Result<(), SessionError> {
        let (path, tool) = self.diagram_session()?;
        tool.import_xml(xml).await.map_err(import_error)?;
        tree.set_diagram(&path, xml)?;
        tracing::info!(%path, bytes = xml.len(), "diagram imported");
        Ok(())
    }

    /// Read the modeler's current diagram, persist it to the node, and return it.
    pub async fn export_diagram(&mut self, tree: &mut PathTree) -> Result<String, SessionError> {
        let format = self.options.pretty_export;
        let (path, tool) = self.diagram_session()?;
        let saved = tool
            .save_xml(SaveXmlOptions { format })
            .await
            .map_err(save_error)?;
        tree.set_diagram(&path, saved.xml.clone())?;
        tracing::info!(%path, bytes = saved.xml.len(), "diagram exported");
        Ok(saved.xml)
    }

    /// Load the starter diagram into the modeler and persist it to the node.
    pub async fn reset_diagram(&mut self, tree: &mut PathTree) -> Result<(), SessionError> {
        self.import_diagram(tree, STARTER_DIAGRAM).await
    }

    /// Drop the open session unless it is bound to `path`.
    pub async fn discard_unless(&mut self, path: &str) {
        if self.active_path().is_some_and(|active| active != path) {
            self.discard().await;
        }
    }

    /// Drop the open session when its node is `path` or lies beneath it.
    pub async fn discard_within(&mut self, path: &str) {
        if self
            .active_path()
            .is_some_and(|active| is_within(active, path))
        {
            self.discard().await;
        }
    }

    /// Follow a rename of `from` (or one of its ancestors) to `to`.
    pub fn rebind(&mut self, from: &str, to: &str) {
        if let Some(session) = self.session.as_mut()
            && let Some(rebased) = rebase(&session.path, from, to)
        {
            tracing::debug!(from = %session.path, to = %rebased, "editing session rebound");
            session.path = rebased;
        }
    }

    async fn discard(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::warn!(path = %session.path, "discarding open editing session without saving");
            session.tool.release().await;
        }
    }

    async fn open_document(
        &self,
        path: &str,
        content: serde_json::Value,
    ) -> Result<EditingSession, SessionError> {
        let factory = self
            .gateway
            .acquire_rich_text_tool()
            .await
            .map_err(unavailable)?;
        let tool = factory
            .create(RichTextConfig {
                content,
                block_kinds: self.options.block_kinds.clone(),
            })
            .await
            .map_err(unavailable)?;
        Ok(EditingSession {
            path: path.to_string(),
            tool: BoundTool::RichText(tool),
        })
    }

    async fn open_process(&self, path: &str, xml: &str) -> Result<EditingSession, SessionError> {
        let factory = self
            .gateway
            .acquire_diagram_tool()
            .await
            .map_err(unavailable)?;
        let mut tool = factory
            .create(SurfaceRef::for_path(path))
            .map_err(unavailable)?;
        if let Err(err) = tool.import_xml(xml).await {
            tool.destroy();
            return Err(import_error(err));
        }
        Ok(EditingSession {
            path: path.to_string(),
            tool: BoundTool::Diagram(tool),
        })
    }

    fn diagram_session(&mut self) -> Result<(String, &mut Box<dyn DiagramTool>), SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        match &mut session.tool {
            BoundTool::Diagram(tool) => Ok((session.path.clone(), tool)),
            BoundTool::RichText(_) => Err(SessionError::WrongType {
                path: session.path.clone(),
                kind: NodeKind::Document,
            }),
        }
    }
}

/// Whether `path` equals `ancestor` or lies beneath it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    path == ancestor
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Rewrite `path` after `from` was renamed to `to`; `None` when unaffected.
pub fn rebase(path: &str, from: &str, to: &str) -> Option<String> {
    if path == from {
        return Some(to.to_string());
    }
    path.strip_prefix(from)
        .filter(|rest| rest.starts_with('/'))
        .map(|rest| format!("{to}{rest}"))
}

fn unavailable(err: ToolError) -> SessionError {
    SessionError::ToolUnavailable(err.to_string())
}

fn save_error(err: ToolError) -> SessionError {
    tracing::warn!(error = %err, "editing tool failed to save");
    SessionError::ToolSaveError(err.to_string())
}

fn import_error(err: ToolError) -> SessionError {
    tracing::warn!(error = %err, "diagram rejected by modeler");
    SessionError::MalformedImport(err.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde_json::json;

    use super::*;
    use crate::app::gateway::testing::{MockLoader, gateway};

    fn fixture() -> (PathTree, TreeIndex) {
        let mut tree = PathTree::new();
        tree.add("", "A", &NodeTemplate::folder()).unwrap();
        tree.add("A", "B", &NodeTemplate::document()).unwrap();
        tree.add("A", "C", &NodeTemplate::document()).unwrap();
        tree.add("A", "Flow", &NodeTemplate::process()).unwrap();
        let index = TreeIndex::build(&tree);
        (tree, index)
    }

    #[tokio::test]
    async fn cancel_leaves_editor_data_unchanged() {
        let (tree, _) = fixture();
        let (loader, script) = MockLoader::new();
        let mut coordinator = EditingSessionCoordinator::new(gateway(loader), EditorOptions::default());

        coordinator.enter_edit(&tree, "A/B").await.unwrap();
        *script.rich_text_output.lock() = Some(json!({ "blocks": ["changed"] }));
        coordinator.cancel().await;
        coordinator.cancel().await;

        assert!(coordinator.active().is_none());
        assert_eq!(
            tree.resolve("A/B").unwrap().editor_data(),
            Some(&json!({ "blocks": [] }))
        );
        assert_eq!(script.destroyed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn save_writes_tool_output_and_closes_session() {
        let (mut tree, mut index) = fixture();
        let (loader, script) = MockLoader::new();
        let mut coordinator = EditingSessionCoordinator::new(gateway(loader), EditorOptions::default());

        let session = coordinator.enter_edit(&tree, "A/B").await.unwrap();
        assert_eq!(session.kind(), SessionKind::Document);

        let output = json!({ "blocks": [{ "type": "paragraph", "data": { "text": "hello" } }] });
        *script.rich_text_output.lock() = Some(output.clone());
        let committed = coordinator.save(&mut tree, &mut index).await.unwrap();

        assert_eq!(committed.path, "A/B");
        assert_eq!(tree.resolve("A/B").unwrap().editor_data(), Some(&output));
        assert!(coordinator.active().is_none());
        assert_eq!(script.destroyed.load(Ordering::SeqCst), 1);
        assert!(!index.is_stale(&tree));
    }

    #[tokio::test]
    async fn rich_text_tool_receives_content_and_block_kinds() {
        let (tree, _) = fixture();
        let (loader, script) = MockLoader::new();
        let options = EditorOptions {
            block_kinds: vec!["paragraph".into()],
            pretty_export: false,
        };
        let mut coordinator = EditingSessionCoordinator::new(gateway(loader), options);

        coordinator.enter_edit(&tree, "A/C").await.unwrap();
        let created = script.created_with.lock().clone();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].content, json!({ "blocks": [] }));
        assert_eq!(created[0].block_kinds, ["paragraph"]);
    }

    #[tokio::test]
    async fn failed_save_keeps_session_open_and_tree_untouched() {
        let (mut tree, mut index) = fixture();
        let (loader, script) = MockLoader::new();
        let mut coordinator = EditingSessionCoordinator::new(gateway(loader), EditorOptions::default());

        coordinator.enter_edit(&tree, "A/B").await.unwrap();
        *script.rich_text_output.lock() = Some(json!({ "blocks": ["lost?"] }));
        *script.fail_saves.lock() = true;

        let err = coordinator.save(&mut tree, &mut index).await.unwrap_err();
        assert!(matches!(err, SessionError::ToolSaveError(_)));
        assert_eq!(coordinator.active_path(), Some("A/B"));
        assert_eq!(
            tree.resolve("A/B").unwrap().editor_data(),
            Some(&json!({ "blocks": [] }))
        );

        *script.fail_saves.lock() = false;
        coordinator.save(&mut tree, &mut index).await.unwrap();
        assert_eq!(
            tree.resolve("A/B").unwrap().editor_data(),
            Some(&json!({ "blocks": ["lost?"] }))
        );
    }

    #[tokio::test]
    async fn entering_another_path_discards_previous_session() {
        let (mut tree, mut index) = fixture();
        let (loader, script) = MockLoader::new();
        let mut coordinator = EditingSessionCoordinator::new(gateway(loader), EditorOptions::default());

        coordinator.enter_edit(&tree, "A/B").await.unwrap();
        *script.rich_text_output.lock() = Some(json!({ "blocks": ["draft"] }));
        coordinator.enter_edit(&tree, "A/C").await.unwrap();
        assert_eq!(coordinator.active_path(), Some("A/C"));
        assert_eq!(script.destroyed.load(Ordering::SeqCst), 1);

        coordinator.save(&mut tree, &mut index).await.unwrap();
        assert_eq!(
            tree.resolve("A/B").unwrap().editor_data(),
            Some(&json!({ "blocks": [] }))
        );
        assert_eq!(
            tree.resolve("A/C").unwrap().editor_data(),
            Some(&json!({ "blocks": ["draft"] }))
        );
    }

    #[tokio::test]
    async fn reentering_same_path_keeps_session() {
        let (tree, _) = fixture();
        let (loader, script) = MockLoader::new();
        let mut coordinator = EditingSessionCoordinator::new(gateway(loader), EditorOptions::default());

        coordinator.enter_edit(&tree, "A/B").await.unwrap();
        coordinator.enter_edit(&tree, "A/B").await.unwrap();
        assert_eq!(script.created_with.lock().len(), 1);
        assert_eq!(script.destroyed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn enter_edit_rejects_non_editable_and_missing_nodes() {
        let (tree, _) = fixture();
        let (loader, _) = MockLoader::new();
        let mut coordinator = EditingSessionCoordinator::new(gateway(loader), EditorOptions::default());

        let err = coordinator.enter_edit(&tree, "A").await.unwrap_err();
        assert_eq!(
            err,
            SessionError::WrongType {
                path: "A".into(),
                kind: NodeKind::Folder
            }
        );
        let err = coordinator.enter_edit(&tree, "A/Missing").await.unwrap_err();
        assert_eq!(err, SessionError::NotFound("A/Missing".into()));
    }

    #[tokio::test]
    async fn tool_load_failure_creates_no_session() {
        let (tree, _) = fixture();
        let (loader, script) = MockLoader::new();
        script.load_failures.lock().push_back(ToolError::Load {
            tool: "rich-text tool",
            reason: "offline".into(),
        });
        let mut coordinator = EditingSessionCoordinator::new(gateway(loader), EditorOptions::default());

        let err = coordinator.enter_edit(&tree, "A/B").await.unwrap_err();
        assert!(matches!(err, SessionError::ToolUnavailable(_)));
        assert!(coordinator.active().is_none());

        coordinator.enter_edit(&tree, "A/B").await.expect("retry loads the tool");
    }

    #[tokio::test]
    async fn save_without_session_is_reported() {
        let (mut tree, mut index) = fixture();
        let (loader, _) = MockLoader::new();
        let mut coordinator = EditingSessionCoordinator::new(gateway(loader), EditorOptions::default());
        assert_eq!(
            coordinator.save(&mut tree, &mut index).await,
            Err(SessionError::NoActiveSession)
        );
    }

    #[tokio::test]
    async fn process_session_starts_from_starter_diagram() {
        let (tree, _) = fixture();
        let (loader, script) = MockLoader::new();
        let mut coordinator = EditingSessionCoordinator::new(gateway(loader), EditorOptions::default());

        let session = coordinator.enter_edit(&tree, "A/Flow").await.unwrap();
        assert_eq!(session.kind(), SessionKind::Process);
        assert_eq!(script.diagram_xml.lock().as_deref(), Some(STARTER_DIAGRAM));
        assert_eq!(tree.resolve("A/Flow").unwrap().content().unwrap().xml, None);
    }

    #[tokio::test]
    async fn diagram_import_export_and_reset_persist_eagerly() {
        let (mut tree, _) = fixture();
        let (loader, _) = MockLoader::new();
        let mut coordinator = EditingSessionCoordinator::new(gateway(loader), EditorOptions::default());
        coordinator.enter_edit(&tree, "A/Flow").await.unwrap();

        coordinator
            .import_diagram(&mut tree, "<definitions id=\"imported\"/>")
            .await
            .unwrap();
        assert_eq!(
            tree.resolve("A/Flow").unwrap().content().unwrap().xml.as_deref(),
            Some("<definitions id=\"imported\"/>")
        );

        let exported = coordinator.export_diagram(&mut tree).await.unwrap();
        assert_eq!(exported, "<definitions id=\"imported\"/>");

        coordinator.reset_diagram(&mut tree).await.unwrap();
        assert_eq!(
            tree.resolve("A/Flow").unwrap().content().unwrap().xml.as_deref(),
            Some(STARTER_DIAGRAM)
        );
        assert_eq!(coordinator.active_path(), Some("A/Flow"));
    }

    #[tokio::test]
    async fn malformed_diagram_import_leaves_node_untouched() {
        let (mut tree, _) = fixture();
        tree.set_diagram("A/Flow", "<definitions/>").unwrap();
        let (loader, _) = MockLoader::new();
        let mut coordinator = EditingSessionCoordinator::new(gateway(loader), EditorOptions::default());
        coordinator.enter_edit(&tree, "A/Flow").await.unwrap();

        let err = coordinator
            .import_diagram(&mut tree, "definitely not xml")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::MalformedImport(_)));
        assert_eq!(
            tree.resolve("A/Flow").unwrap().content().unwrap().xml.as_deref(),
            Some("<definitions/>")
        );
    }

    #[tokio::test]
    async fn diagram_operations_require_a_process_session() {
        let (mut tree, _) = fixture();
        let (loader, _) = MockLoader::new();
        let mut coordinator = EditingSessionCoordinator::new(gateway(loader), EditorOptions::default());

        assert_eq!(
            coordinator.export_diagram(&mut tree).await,
            Err(SessionError::NoActiveSession)
        );
        coordinator.enter_edit(&tree, "A/B").await.unwrap();
        assert!(matches!(
            coordinator.reset_diagram(&mut tree).await,
            Err(SessionError::WrongType { .. })
        ));
    }

    #[tokio::test]
    async fn save_after_node_removed_reports_not_found() {
        let (mut tree, mut index) = fixture();
        let (loader, _) = MockLoader::new();
        let mut coordinator = EditingSessionCoordinator::new(gateway(loader), EditorOptions::default());

        coordinator.enter_edit(&tree, "A/B").await.unwrap();
        tree.remove("A/B");
        assert_eq!(
            coordinator.save(&mut tree, &mut index).await,
            Err(SessionError::NotFound("A/B".into()))
        );
        assert!(coordinator.active().is_none());
    }

    #[tokio::test]
    async fn save_onto_replaced_node_of_other_kind_is_rejected() {
        let (mut tree, mut index) = fixture();
        let (loader, _) = MockLoader::new();
        let mut coordinator = EditingSessionCoordinator::new(gateway(loader), EditorOptions::default());

        coordinator.enter_edit(&tree, "A/B").await.unwrap();
        tree.remove("A/B");
        tree.add("A", "B", &NodeTemplate::folder()).unwrap();

        assert_eq!(
            coordinator.save(&mut tree, &mut index).await,
            Err(SessionError::WrongType {
                path: "A/B".into(),
                kind: NodeKind::Folder,
            })
        );
        assert!(coordinator.active().is_none());
        assert!(tree.resolve("A/B").unwrap().editor_data().is_none());

        let mut restored = PathTree::new();
        restored.deserialize(&tree.serialize()).unwrap();
    }

    #[test]
    fn rebase_follows_renamed_ancestors() {
        assert_eq!(rebase("A/B", "A", "X"), Some("X/B".into()));
        assert_eq!(rebase("A", "A", "X"), Some("X".into()));
        assert_eq!(rebase("AB/C", "A", "X"), None);
        assert!(is_within("A/B", "A"));
        assert!(!is_within("AB", "A"));
    }
}
