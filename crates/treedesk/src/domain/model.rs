//! Domain models for nodes, templates, and index entries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque block payload owned by the rich-text tool.
pub type EditorData = serde_json::Value;

/// Type tag carried by every node in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Root,
    Folder,
    Document,
    Process,
    Organigram,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Folder => "folder",
            NodeKind::Document => "document",
            NodeKind::Process => "process",
            NodeKind::Organigram => "organigram",
        }
    }

    /// Glyph used when a node does not carry its own icon.
    pub fn default_icon(&self) -> &'static str {
        match self {
            NodeKind::Root => "🏠",
            NodeKind::Folder => "📁",
            NodeKind::Document => "📄",
            NodeKind::Process => "🔀",
            NodeKind::Organigram => "👥",
        }
    }

    /// Whether an external editing tool can be bound to nodes of this kind.
    pub fn is_editable(&self) -> bool {
        matches!(self, NodeKind::Document | NodeKind::Process)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = NodeKindParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "root" => Ok(NodeKind::Root),
            "folder" | "dir" => Ok(NodeKind::Folder),
            "document" | "doc" => Ok(NodeKind::Document),
            "process" | "diagram" => Ok(NodeKind::Process),
            "organigram" | "org" => Ok(NodeKind::Organigram),
            other => Err(NodeKindParseError::Unknown(other.to_string())),
        }
    }
}

/// Error returned when parsing a [`NodeKind`] fails.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum NodeKindParseError {
    #[error("unknown node type '{0}'")]
    Unknown(String),
}

/// Tagged wrapper around the diagram serialization of a process node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessContent {
    pub xml: Option<String>,
}

impl ProcessContent {
    pub fn with_xml(xml: impl Into<String>) -> Self {
        Self {
            xml: Some(xml.into()),
        }
    }
}

/// Id-less description of a subtree, used to create, duplicate, and compare nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTemplate {
    pub kind: NodeKind,
    pub icon: Option<String>,
    pub editor_data: Option<EditorData>,
    pub content: Option<ProcessContent>,
    /// `None` for leaves; `Some` once the node holds a children mapping.
    pub children: Option<Vec<(String, NodeTemplate)>>,
}

impl NodeTemplate {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            icon: None,
            editor_data: None,
            content: None,
            children: None,
        }
    }

    pub fn root() -> Self {
        Self::new(NodeKind::Root)
            .with_icon(NodeKind::Root.default_icon())
            .with_children(Vec::new())
    }

    pub fn folder() -> Self {
        Self::new(NodeKind::Folder)
            .with_icon(NodeKind::Folder.default_icon())
            .with_children(Vec::new())
    }

    /// Empty document: `{ "blocks": [] }`.
    pub fn document() -> Self {
        let mut template = Self::new(NodeKind::Document).with_icon(NodeKind::Document.default_icon());
        template.editor_data = Some(serde_json::json!({ "blocks": [] }));
        template
    }

    /// Process without a diagram yet: `{ "xml": null }`.
    pub fn process() -> Self {
        let mut template = Self::new(NodeKind::Process).with_icon(NodeKind::Process.default_icon());
        template.content = Some(ProcessContent::default());
        template
    }

    pub fn organigram() -> Self {
        Self::new(NodeKind::Organigram).with_icon(NodeKind::Organigram.default_icon())
    }

    /// Template matching the "new item" menu entry for `kind`.
    pub fn for_kind(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Root => Self::root(),
            NodeKind::Folder => Self::folder(),
            NodeKind::Document => Self::document(),
            NodeKind::Process => Self::process(),
            NodeKind::Organigram => Self::organigram(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_editor_data(mut self, data: EditorData) -> Self {
        self.editor_data = Some(data);
        self
    }

    pub fn with_content(mut self, content: ProcessContent) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_children(mut self, children: Vec<(String, NodeTemplate)>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn with_child(mut self, name: impl Into<String>, child: NodeTemplate) -> Self {
        self.children
            .get_or_insert_with(Vec::new)
            .push((name.into(), child));
        self
    }
}

/// One row of the flattened tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub icon: Option<String>,
}

impl IndexEntry {
    pub fn display_icon(&self) -> &str {
        self.icon.as_deref().unwrap_or_else(|| self.kind.default_icon())
    }
}

/// Joins a parent path and a child name; an empty parent denotes the top-level mapping.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Splits `path` into its parent path and final segment.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    }
}
