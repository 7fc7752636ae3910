//! Contracts for the external editing tools consumed by editing sessions.
//!
//! Both tools are black boxes: the core hands them content, asks them to
//! materialize their current state, and releases them. Loading happens through
//! a [`ToolLoader`], memoized by the [`ExternalToolGateway`].
//!
//! [`ExternalToolGateway`]: crate::app::gateway::ExternalToolGateway

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::ToolError;
use crate::domain::model::EditorData;

/// Construction input for a rich-text editor instance.
#[derive(Debug, Clone, PartialEq)]
pub struct RichTextConfig {
    pub content: EditorData,
    pub block_kinds: Vec<String>,
}

/// Reference to the surface a diagram tool renders into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceRef(pub String);

impl SurfaceRef {
    /// Surface dedicated to the process node at `path`.
    pub fn for_path(path: &str) -> Self {
        Self(format!("diagram:{path}"))
    }
}

impl fmt::Display for SurfaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveXmlOptions {
    pub format: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedXml {
    pub xml: String,
}

/// A live rich-text editor bound to one document.
#[async_trait]
pub trait RichTextTool: Send {
    /// Materialize the current block content. Calling it twice yields the same content.
    async fn save(&mut self) -> Result<EditorData, ToolError>;

    /// Release the editor and its resources.
    async fn destroy(self: Box<Self>);
}

/// A live diagram modeler bound to one process.
#[async_trait]
pub trait DiagramTool: Send {
    /// Replace the displayed diagram with `xml`.
    async fn import_xml(&mut self, xml: &str) -> Result<(), ToolError>;

    /// Serialize the displayed diagram.
    async fn save_xml(&mut self, options: SaveXmlOptions) -> Result<SavedXml, ToolError>;

    fn destroy(self: Box<Self>);
}

/// Loaded rich-text capability able to construct editors.
#[async_trait]
pub trait RichTextFactory: Send + Sync {
    async fn create(&self, config: RichTextConfig) -> Result<Box<dyn RichTextTool>, ToolError>;
}

/// Loaded diagram capability able to construct modelers.
pub trait DiagramFactory: Send + Sync {
    fn create(&self, surface: SurfaceRef) -> Result<Box<dyn DiagramTool>, ToolError>;
}

/// Performs the one-time load of each capability and its optional extension modules.
///
/// `Ok(None)` means the load finished but the required capability was not provided.
#[async_trait]
pub trait ToolLoader: Send + Sync {
    async fn load_rich_text(
        &self,
        extensions: &[String],
    ) -> Result<Option<Arc<dyn RichTextFactory>>, ToolError>;

    async fn load_diagram(
        &self,
        extensions: &[String],
    ) -> Result<Option<Arc<dyn DiagramFactory>>, ToolError>;
}
