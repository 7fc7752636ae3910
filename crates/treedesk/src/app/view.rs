//! Maps the current selection to exactly one presentation mode.

use crate::app::session::{EditingSessionCoordinator, is_within, rebase};
use crate::app::tree::PathTree;
use crate::domain::model::{EditorData, IndexEntry, NodeKind, join_path};

/// Presentation modes the controller moves between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    NoSelection,
    ShowingFolder,
    ShowingDocument,
    ShowingProcess,
    ShowingOrganigram,
}

/// What the front end should render for the current state.
#[derive(Debug, Clone, PartialEq)]
pub enum Presentation {
    /// Default page shown without a (resolvable) selection and for unmodeled types.
    Welcome,
    Folder {
        path: String,
        entries: Vec<IndexEntry>,
    },
    Document {
        path: String,
        editor_data: Option<EditorData>,
    },
    Process {
        path: String,
        xml: Option<String>,
    },
    Organigram {
        path: String,
        members: Vec<IndexEntry>,
    },
    /// Degraded view of the stored payload when the editing tool could not be acquired.
    Raw {
        path: String,
        payload: String,
    },
}

/// State machine over the current selection. Lives for the whole application.
#[derive(Debug, Clone)]
pub struct ViewController {
    state: ViewState,
    selected: Option<String>,
    presentation: Presentation,
}

impl Default for ViewController {
    fn default() -> Self {
        Self {
            state: ViewState::NoSelection,
            selected: None,
            presentation: Presentation::Welcome,
        }
    }
}

impl ViewController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    /// Path of the resolved selection, if any.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    /// Move to the presentation matching the node at `path`.
    ///
    /// An open editing session bound to any other path is discarded without saving.
    /// Unresolvable paths fall back to the welcome page.
    pub async fn select(
        &mut self,
        tree: &PathTree,
        editing: &mut EditingSessionCoordinator,
        path: &str,
    ) -> &Presentation {
        editing.discard_unless(path).await;
        self.show(tree, path);
        &self.presentation
    }

    /// Re-render the current selection from the tree.
    pub fn refresh(&mut self, tree: &PathTree) -> &Presentation {
        match self.selected.clone() {
            Some(path) => self.show(tree, &path),
            None => self.reset(),
        }
        &self.presentation
    }

    /// Show the raw stored payload of `path` in place of its editor.
    pub fn degrade(&mut self, tree: &PathTree, path: &str) -> &Presentation {
        let Ok(node) = tree.resolve(path) else {
            self.reset();
            return &self.presentation;
        };
        let payload = match node.kind() {
            NodeKind::Document => node
                .editor_data()
                .and_then(|data| serde_json::to_string_pretty(data).ok())
                .unwrap_or_default(),
            NodeKind::Process => node
                .content()
                .and_then(|content| content.xml.clone())
                .unwrap_or_default(),
            _ => String::new(),
        };
        tracing::debug!(%path, "showing raw content");
        self.selected = Some(path.to_string());
        self.presentation = Presentation::Raw {
            path: path.to_string(),
            payload,
        };
        &self.presentation
    }

    /// Return to the welcome page without a selection.
    pub fn reset(&mut self) {
        self.state = ViewState::NoSelection;
        self.selected = None;
        self.presentation = Presentation::Welcome;
    }

    /// Follow a rename of `from` (or one of its ancestors) to `to`.
    pub fn rebind(&mut self, tree: &PathTree, from: &str, to: &str) {
        if let Some(rebased) = self
            .selected
            .as_deref()
            .and_then(|selected| rebase(selected, from, to))
        {
            self.show(tree, &rebased);
        }
    }

    /// Clear the selection when it is `path` or lies beneath it.
    pub fn forget_within(&mut self, path: &str) {
        if self
            .selected
            .as_deref()
            .is_some_and(|selected| is_within(selected, path))
        {
            self.reset();
        }
    }

    fn show(&mut self, tree: &PathTree, path: &str) {
        let Ok(node) = tree.resolve(path) else {
            tracing::debug!(%path, "selection does not resolve");
            self.reset();
            return;
        };

        let (state, presentation) = match node.kind() {
            NodeKind::Folder => (
                ViewState::ShowingFolder,
                Presentation::Folder {
                    path: path.to_string(),
                    entries: children_of(tree, path),
                },
            ),
            NodeKind::Document => (
                ViewState::ShowingDocument,
                Presentation::Document {
                    path: path.to_string(),
                    editor_data: node.editor_data().cloned(),
                },
            ),
            NodeKind::Process => (
                ViewState::ShowingProcess,
                Presentation::Process {
                    path: path.to_string(),
                    xml: node.content().and_then(|content| content.xml.clone()),
                },
            ),
            NodeKind::Organigram => (
                ViewState::ShowingOrganigram,
                Presentation::Organigram {
                    path: path.to_string(),
                    members: children_of(tree, path),
                },
            ),
            NodeKind::Root => (ViewState::NoSelection, Presentation::Welcome),
        };
        self.state = state;
        self.selected = Some(path.to_string());
        self.presentation = presentation;
    }
}

fn children_of(tree: &PathTree, path: &str) -> Vec<IndexEntry> {
    tree.child_names(path)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|name| {
            let child_path = join_path(path, name);
            let node = tree.resolve(&child_path).ok()?;
            Some(IndexEntry {
                name: name.to_string(),
                icon: node.icon().map(ToString::to_string),
                kind: node.kind(),
                path: child_path,
            })
        })
        .collect()
}
