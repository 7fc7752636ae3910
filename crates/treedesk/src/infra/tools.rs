//! Built-in capability providers so sessions work without external engines.
//!
//! The block editor keeps editor data as JSON and drops blocks whose kind is
//! not enabled. The diagram engine keeps the XML document it was given and
//! re-serializes it through `quick_xml`, rejecting input that is not well formed.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use serde_json::Value;

use crate::app::tools::{
    DiagramFactory, DiagramTool, RichTextConfig, RichTextFactory, RichTextTool, SaveXmlOptions,
    SavedXml, SurfaceRef, ToolLoader,
};
use crate::domain::errors::ToolError;
use crate::domain::model::EditorData;

const RICH_TEXT_EXTENSIONS: &[&str] = &["header", "list", "checklist", "quote", "table", "code"];
const DIAGRAM_EXTENSIONS: &[&str] = &["bpmn"];

/// Loads the in-process block editor and diagram engine.
#[derive(Debug, Default)]
pub struct BuiltinToolLoader {
    activated: Mutex<Vec<String>>,
}

impl BuiltinToolLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Extension modules activated by completed loads, in load order.
    pub fn activated_extensions(&self) -> Vec<String> {
        self.activated.lock().clone()
    }

    fn activate(&self, requested: &[String], known: &[&str]) {
        let mut activated = self.activated.lock();
        for name in requested {
            if !known.contains(&name.as_str()) {
                tracing::warn!(extension = %name, "unknown extension skipped");
                continue;
            }
            if !activated.contains(name) {
                activated.push(name.clone());
            }
        }
    }
}

#[async_trait]
impl ToolLoader for BuiltinToolLoader {
    async fn load_rich_text(
        &self,
        extensions: &[String],
    ) -> Result<Option<Arc<dyn RichTextFactory>>, ToolError> {
        self.activate(extensions, RICH_TEXT_EXTENSIONS);
        Ok(Some(Arc::new(BlockEditorFactory)))
    }

    async fn load_diagram(
        &self,
        extensions: &[String],
    ) -> Result<Option<Arc<dyn DiagramFactory>>, ToolError> {
        self.activate(extensions, DIAGRAM_EXTENSIONS);
        Ok(Some(Arc::new(XmlDiagramFactory)))
    }
}

struct BlockEditorFactory;

#[async_trait]
impl RichTextFactory for BlockEditorFactory {
    async fn create(&self, config: RichTextConfig) -> Result<Box<dyn RichTextTool>, ToolError> {
        if !config.content.is_object() {
            return Err(ToolError::Rejected(
                "editor data must be a JSON object".into(),
            ));
        }
        Ok(Box::new(BlockEditor {
            content: config.content,
            block_kinds: config.block_kinds,
        }))
    }
}

#[derive(Debug)]
struct BlockEditor {
    content: EditorData,
    block_kinds: Vec<String>,
}

#[async_trait]
impl RichTextTool for BlockEditor {
    async fn save(&mut self) -> Result<EditorData, ToolError> {
        let mut data = self.content.clone();
        if let Some(Value::Array(blocks)) = data.get_mut("blocks") {
            blocks.retain(|block| {
                block
                    .get("type")
                    .and_then(Value::as_str)
                    .is_some_and(|kind| self.block_kinds.iter().any(|enabled| enabled == kind))
            });
        }
        Ok(data)
    }

    async fn destroy(self: Box<Self>) {
        tracing::trace!("block editor released");
    }
}

struct XmlDiagramFactory;

impl DiagramFactory for XmlDiagramFactory {
    fn create(&self, surface: SurfaceRef) -> Result<Box<dyn DiagramTool>, ToolError> {
        Ok(Box::new(XmlDiagram {
            surface,
            xml: None,
        }))
    }
}

#[derive(Debug)]
struct XmlDiagram {
    surface: SurfaceRef,
    xml: Option<String>,
}

#[async_trait]
impl DiagramTool for XmlDiagram {
    async fn import_xml(&mut self, xml: &str) -> Result<(), ToolError> {
        // Validate by re-serializing; the stored text stays as given.
        reformat(xml, false)?;
        self.xml = Some(xml.to_string());
        Ok(())
    }

    async fn save_xml(&mut self, options: SaveXmlOptions) -> Result<SavedXml, ToolError> {
        let xml = self
            .xml
            .as_deref()
            .ok_or_else(|| ToolError::Rejected(format!("{} has no diagram loaded", self.surface)))?;
        Ok(SavedXml {
            xml: reformat(xml, options.format)?,
        })
    }

    fn destroy(self: Box<Self>) {
        tracing::trace!(surface = %self.surface, "diagram engine released");
    }
}

/// Re-serialize `xml`, indented when `pretty`. Fails unless it is a single well-formed element tree.
fn reformat(xml: &str, pretty: bool) -> Result<String, ToolError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut writer = if pretty {
        Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2)
    } else {
        Writer::new(Cursor::new(Vec::new()))
    };

    let mut depth = 0usize;
    let mut elements = 0usize;
    loop {
        let event = reader.read_event().map_err(|err| {
            ToolError::Rejected(format!(
                "malformed diagram at byte {}: {err}",
                reader.buffer_position()
            ))
        })?;
        match &event {
            Event::Eof => break,
            Event::Start(_) => {
                if depth == 0 {
                    elements += 1;
                }
                depth += 1;
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Empty(_) if depth == 0 => elements += 1,
            _ => {}
        }
        writer
            .write_event(event)
            .map_err(|err| ToolError::Rejected(format!("failed to write diagram: {err}")))?;
    }

    if depth != 0 {
        return Err(ToolError::Rejected("malformed diagram: unclosed element".into()));
    }
    if elements != 1 {
        return Err(ToolError::Rejected(format!(
            "malformed diagram: expected one root element, found {elements}"
        )));
    }
    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|err| ToolError::Rejected(format!("diagram is not UTF-8: {err}")))
}
