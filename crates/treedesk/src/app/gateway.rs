//! Lazy, memoized acquisition of the external editing tools.

use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::app::tools::{DiagramFactory, RichTextFactory, ToolLoader};
use crate::domain::errors::ToolError;

/// Extension modules requested when each capability is loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayOptions {
    pub rich_text_extensions: Vec<String>,
    pub diagram_extensions: Vec<String>,
}

/// Owns the loaded tool factories for the lifetime of the process.
///
/// Each capability is loaded at most once; concurrent first callers await the
/// same in-flight load. A failed load is not cached, so a later call retries.
pub struct ExternalToolGateway {
    loader: Arc<dyn ToolLoader>,
    options: GatewayOptions,
    rich_text: OnceCell<Arc<dyn RichTextFactory>>,
    diagram: OnceCell<Arc<dyn DiagramFactory>>,
}

impl fmt::Debug for ExternalToolGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalToolGateway")
            .field("loader", &"<dyn ToolLoader>")
            .field("options", &self.options)
            .field("rich_text_loaded", &self.rich_text.initialized())
            .field("diagram_loaded", &self.diagram.initialized())
            .finish()
    }
}

impl ExternalToolGateway {
    pub fn new(loader: Arc<dyn ToolLoader>, options: GatewayOptions) -> Self {
        Self {
            loader,
            options,
            rich_text: OnceCell::new(),
            diagram: OnceCell::new(),
        }
    }

    /// Return the rich-text factory, loading it on first use.
    pub async fn acquire_rich_text_tool(&self) -> Result<Arc<dyn RichTextFactory>, ToolError> {
        self.rich_text
            .get_or_try_init(|| async {
                tracing::debug!(extensions = ?self.options.rich_text_extensions, "loading rich-text tool");
                self.loader
                    .load_rich_text(&self.options.rich_text_extensions)
                    .await
                    .and_then(|loaded| loaded.ok_or(ToolError::Missing("rich-text tool")))
            })
            .await
            .cloned()
            .inspect_err(|err| tracing::warn!(error = %err, "rich-text tool unavailable"))
    }

    /// Return the diagram factory, loading it on first use.
    pub async fn acquire_diagram_tool(&self) -> Result<Arc<dyn DiagramFactory>, ToolError> {
        self.diagram
            .get_or_try_init(|| async {
                tracing::debug!(extensions = ?self.options.diagram_extensions, "loading diagram tool");
                self.loader
                    .load_diagram(&self.options.diagram_extensions)
                    .await
                    .and_then(|loaded| loaded.ok_or(ToolError::Missing("diagram tool")))
            })
            .await
            .cloned()
            .inspect_err(|err| tracing::warn!(error = %err, "diagram tool unavailable"))
    }

    pub fn is_rich_text_loaded(&self) -> bool {
        self.rich_text.initialized()
    }

    pub fn is_diagram_loaded(&self) -> bool {
        self.diagram.initialized()
    }
}
