//! Path-addressed hierarchical store.
//!
//! Nodes live in an arena and reference each other by key; a path is resolved
//! by walking child lists from the top-level mapping, matching one name per
//! segment. Nodes never store their own path.

use slotmap::{SlotMap, new_key_type};
use uuid::Uuid;

use crate::app::snapshot::{self, SnapshotNode};
use crate::domain::errors::TreeError;
use crate::domain::model::{
    EditorData, NodeKind, NodeTemplate, ProcessContent, join_path, split_path,
};

new_key_type! { pub struct NodeKey; }

/// Deepest level a node may sit at, counting top-level entries as 1.
pub const MAX_DEPTH: usize = 128;

/// A named entry of the hierarchy.
#[derive(Debug, Clone)]
pub struct Node {
    id: String,
    name: String,
    kind: NodeKind,
    icon: Option<String>,
    parent: Option<NodeKey>,
    children: Option<Vec<NodeKey>>,
    editor_data: Option<EditorData>,
    content: Option<ProcessContent>,
}

impl Node {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn editor_data(&self) -> Option<&EditorData> {
        self.editor_data.as_ref()
    }

    pub fn content(&self) -> Option<&ProcessContent> {
        self.content.as_ref()
    }

    /// Whether the node holds a children mapping (possibly empty).
    pub fn is_container(&self) -> bool {
        self.children.is_some()
    }

    pub fn child_count(&self) -> usize {
        self.children.as_ref().map_or(0, Vec::len)
    }
}

/// In-memory tree addressed by slash-delimited paths.
#[derive(Debug, Clone, Default)]
pub struct PathTree {
    arena: SlotMap<NodeKey, Node>,
    roots: Vec<NodeKey>,
    revision: u64,
}

impl PathTree {
    /// Create an empty tree without any top-level entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tree seeded with the default workspace layout.
    pub fn with_default_layout() -> Self {
        let mut tree = Self::new();
        let layout = NodeTemplate::root()
            .with_child(
                "Documents",
                NodeTemplate::folder().with_child("Welcome", NodeTemplate::document()),
            )
            .with_child(
                "Processes",
                NodeTemplate::folder().with_child("Onboarding", NodeTemplate::process()),
            )
            .with_child("Organigram", NodeTemplate::organigram());
        let key = tree.instantiate("Workspace".into(), &layout, None);
        tree.roots.push(key);
        tree
    }

    /// Monotonic counter bumped by every structural mutation and import.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of nodes reachable from the top-level mapping.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Look up the node at `path`.
    pub fn resolve(&self, path: &str) -> Result<&Node, TreeError> {
        self.lookup(path)
            .map(|key| &self.arena[key])
            .ok_or_else(|| TreeError::NotFound(path.to_string()))
    }

    /// Whether `path` resolves to a node.
    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    /// Names of the entries directly below `path`, or of the top-level mapping when empty.
    pub fn child_names(&self, path: &str) -> Result<Vec<&str>, TreeError> {
        let keys = self.sibling_keys(path)?;
        Ok(keys
            .iter()
            .map(|key| self.arena[*key].name.as_str())
            .collect())
    }

    /// Id-less copy of the subtree at `path`.
    pub fn extract(&self, path: &str) -> Result<NodeTemplate, TreeError> {
        let key = self
            .lookup(path)
            .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        Ok(self.template_of(key))
    }

    /// Deep-copy `template` under `parent_path` as `name`, disambiguating on collision.
    ///
    /// Returns the final path, which carries a ` (n)` suffix when `name` was taken.
    pub fn add(
        &mut self,
        parent_path: &str,
        name: &str,
        template: &NodeTemplate,
    ) -> Result<String, TreeError> {
        validate_name(name)?;
        let depth = path_depth(parent_path) + template_height(template);
        if depth > MAX_DEPTH {
            return Err(TreeError::TooDeep {
                path: join_path(parent_path, name),
                limit: MAX_DEPTH,
            });
        }
        let parent = if parent_path.is_empty() {
            None
        } else {
            Some(
                self.lookup(parent_path)
                    .ok_or_else(|| TreeError::ParentNotFound(parent_path.to_string()))?,
            )
        };

        let final_name = {
            let siblings = match parent {
                Some(key) => self.arena[key].children.as_deref().unwrap_or_default(),
                None => self.roots.as_slice(),
            };
            self.free_name(siblings, name)
        };

        let key = self.instantiate(final_name.clone(), template, parent);
        match parent {
            Some(parent) => self.arena[parent]
                .children
                .get_or_insert_with(Vec::new)
                .push(key),
            None => self.roots.push(key),
        }
        self.bump();

        let path = join_path(parent_path, &final_name);
        tracing::debug!(%path, kind = %template.kind, "node added");
        Ok(path)
    }

    /// Delete the entry at `path` together with its subtree.
    pub fn remove(&mut self, path: &str) -> bool {
        let Some(key) = self.lookup(path) else {
            return false;
        };
        match self.arena[key].parent {
            Some(parent) => {
                if let Some(children) = self.arena[parent].children.as_mut() {
                    children.retain(|child| *child != key);
                }
            }
            None => self.roots.retain(|root| *root != key),
        }
        self.drop_subtree(key);
        self.bump();
        tracing::debug!(%path, "node removed");
        true
    }

    /// Rename the entry at `path`, keeping its identity, position, and subtree.
    pub fn rename(&mut self, path: &str, new_name: &str) -> Result<String, TreeError> {
        let key = self
            .lookup(path)
            .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        validate_name(new_name)?;

        let (parent_path, current) = split_path(path);
        if current == new_name {
            return Ok(path.to_string());
        }
        let siblings = self.siblings_of(key);
        if self.child_named(siblings, new_name).is_some() {
            return Err(TreeError::Conflict(new_name.to_string()));
        }

        self.arena[key].name = new_name.to_string();
        self.bump();

        let new_path = join_path(parent_path, new_name);
        tracing::debug!(from = %path, to = %new_path, "node renamed");
        Ok(new_path)
    }

    /// Clone the subtree at `path` next to itself under a disambiguated name.
    pub fn duplicate(&mut self, path: &str) -> Result<String, TreeError> {
        let template = self.extract(path)?;
        let (parent_path, name) = split_path(path);
        self.add(parent_path, name, &template)
    }

    /// Replace the block payload of the document at `path`.
    pub fn set_editor_data(&mut self, path: &str, data: EditorData) -> Result<(), TreeError> {
        let key = self.payload_target(path, NodeKind::Document)?;
        self.arena[key].editor_data = Some(data);
        Ok(())
    }

    /// Store `xml` as the diagram payload of the process at `path`.
    pub fn set_diagram(&mut self, path: &str, xml: impl Into<String>) -> Result<(), TreeError> {
        let key = self.payload_target(path, NodeKind::Process)?;
        self.arena[key]
            .content
            .get_or_insert_with(ProcessContent::default)
            .xml = Some(xml.into());
        Ok(())
    }

    /// Deterministic textual snapshot of the whole tree.
    pub fn serialize(&self) -> String {
        let entries: Vec<(String, SnapshotNode)> = self
            .roots
            .iter()
            .map(|key| (self.arena[*key].name.clone(), self.snapshot_of(*key)))
            .collect();
        // Snapshot nodes hold only strings and JSON values, so encoding cannot fail.
        snapshot::write(&entries).unwrap_or_default()
    }

    /// Replace the whole tree with the parsed snapshot; on failure nothing changes.
    pub fn deserialize(&mut self, text: &str) -> Result<(), TreeError> {
        let entries = snapshot::read(text).map_err(|err| {
            tracing::warn!(error = %err, "rejected malformed snapshot");
            TreeError::MalformedImport(err.to_string())
        })?;

        let mut next = PathTree::new();
        let mut seen_ids = std::collections::HashSet::new();
        for (name, node) in entries {
            validate_name(&name).map_err(|_| malformed(format!("invalid name '{name}'")))?;
            let key = next.import_node(name, node, None, 1, &mut seen_ids)?;
            next.roots.push(key);
        }
        next.revision = self.revision.wrapping_add(1);
        *self = next;
        tracing::info!(nodes = self.len(), "snapshot imported");
        Ok(())
    }

    /// Pre-order walk yielding `(path, node)` for every node.
    pub fn walk(&self) -> Vec<(String, &Node)> {
        let mut out = Vec::with_capacity(self.arena.len());
        let mut stack: Vec<(String, NodeKey)> = self
            .roots
            .iter()
            .rev()
            .map(|key| (self.arena[*key].name.clone(), *key))
            .collect();
        while let Some((path, key)) = stack.pop() {
            let node = &self.arena[key];
            if let Some(children) = &node.children {
                for child in children.iter().rev() {
                    stack.push((join_path(&path, &self.arena[*child].name), *child));
                }
            }
            out.push((path, node));
        }
        out
    }

    fn lookup(&self, path: &str) -> Option<NodeKey> {
        let mut current: Option<NodeKey> = None;
        for segment in path.split('/') {
            let siblings = match current {
                Some(key) => self.arena[key].children.as_deref()?,
                None => self.roots.as_slice(),
            };
            current = Some(self.child_named(siblings, segment)?);
        }
        current
    }

    fn payload_target(&self, path: &str, expected: NodeKind) -> Result<NodeKey, TreeError> {
        let key = self
            .lookup(path)
            .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        let kind = self.arena[key].kind;
        if kind != expected {
            return Err(TreeError::WrongType {
                path: path.to_string(),
                kind,
            });
        }
        Ok(key)
    }

    fn sibling_keys(&self, path: &str) -> Result<&[NodeKey], TreeError> {
        if path.is_empty() {
            return Ok(&self.roots);
        }
        let key = self
            .lookup(path)
            .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        Ok(self.arena[key].children.as_deref().unwrap_or_default())
    }

    fn siblings_of(&self, key: NodeKey) -> &[NodeKey] {
        match self.arena[key].parent {
            Some(parent) => self.arena[parent].children.as_deref().unwrap_or_default(),
            None => &self.roots,
        }
    }

    fn child_named(&self, siblings: &[NodeKey], name: &str) -> Option<NodeKey> {
        siblings
            .iter()
            .copied()
            .find(|key| self.arena[*key].name == name)
    }

    fn free_name(&self, siblings: &[NodeKey], name: &str) -> String {
        if self.child_named(siblings, name).is_none() {
            return name.to_string();
        }
        (1u64..)
            .map(|n| format!("{name} ({n})"))
            .find(|candidate| self.child_named(siblings, candidate).is_none())
            .unwrap_or_else(|| name.to_string())
    }

    fn instantiate(
        &mut self,
        name: String,
        template: &NodeTemplate,
        parent: Option<NodeKey>,
    ) -> NodeKey {
        let key = self.arena.insert(Node {
            id: fresh_id(),
            name,
            kind: template.kind,
            icon: template.icon.clone(),
            parent,
            children: template.children.as_ref().map(|_| Vec::new()),
            editor_data: template.editor_data.clone(),
            content: template.content.clone(),
        });
        if let Some(children) = &template.children {
            let keys: Vec<NodeKey> = children
                .iter()
                .map(|(child_name, child)| self.instantiate(child_name.clone(), child, Some(key)))
                .collect();
            self.arena[key].children = Some(keys);
        }
        key
    }

    fn import_node(
        &mut self,
        name: String,
        node: SnapshotNode,
        parent: Option<NodeKey>,
        depth: usize,
        seen_ids: &mut std::collections::HashSet<String>,
    ) -> Result<NodeKey, TreeError> {
        if depth > MAX_DEPTH {
            return Err(malformed(format!("'{name}' nests deeper than {MAX_DEPTH} levels")));
        }
        if node.editor_data.is_some() && node.kind != NodeKind::Document {
            return Err(malformed(format!("'{name}' is a {} but carries editorData", node.kind)));
        }
        if node.content.is_some() && node.kind != NodeKind::Process {
            return Err(malformed(format!("'{name}' is a {} but carries content", node.kind)));
        }
        let id = node.id.unwrap_or_else(fresh_id);
        if !seen_ids.insert(id.clone()) {
            return Err(malformed(format!("duplicate id '{id}'")));
        }

        let key = self.arena.insert(Node {
            id,
            name,
            kind: node.kind,
            icon: node.icon,
            parent,
            children: node.children.as_ref().map(|_| Vec::new()),
            editor_data: node.editor_data,
            content: node.content,
        });
        if let Some(children) = node.children {
            let mut keys = Vec::with_capacity(children.len());
            for (child_name, child) in children {
                validate_name(&child_name)
                    .map_err(|_| malformed(format!("invalid name '{child_name}'")))?;
                keys.push(self.import_node(child_name, child, Some(key), depth + 1, seen_ids)?);
            }
            self.arena[key].children = Some(keys);
        }
        Ok(key)
    }

    fn template_of(&self, key: NodeKey) -> NodeTemplate {
        let node = &self.arena[key];
        NodeTemplate {
            kind: node.kind,
            icon: node.icon.clone(),
            editor_data: node.editor_data.clone(),
            content: node.content.clone(),
            children: node.children.as_ref().map(|children| {
                children
                    .iter()
                    .map(|child| (self.arena[*child].name.clone(), self.template_of(*child)))
                    .collect()
            }),
        }
    }

    fn snapshot_of(&self, key: NodeKey) -> SnapshotNode {
        let node = &self.arena[key];
        SnapshotNode {
            id: Some(node.id.clone()),
            kind: node.kind,
            icon: node.icon.clone(),
            children: node.children.as_ref().map(|children| {
                children
                    .iter()
                    .map(|child| (self.arena[*child].name.clone(), self.snapshot_of(*child)))
                    .collect()
            }),
            editor_data: node.editor_data.clone(),
            content: node.content.clone(),
        }
    }

    fn drop_subtree(&mut self, key: NodeKey) {
        if let Some(node) = self.arena.remove(key) {
            for child in node.children.unwrap_or_default() {
                self.drop_subtree(child);
            }
        }
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

/// Number of path segments in `path`; the top-level mapping has depth 0.
fn path_depth(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.split('/').count()
    }
}

/// Levels a template occupies once instantiated, counting itself.
fn template_height(template: &NodeTemplate) -> usize {
    1 + template
        .children
        .iter()
        .flatten()
        .map(|(_, child)| template_height(child))
        .max()
        .unwrap_or(0)
}

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

fn malformed(reason: String) -> TreeError {
    tracing::warn!(%reason, "rejected malformed snapshot");
    TreeError::MalformedImport(reason)
}

fn validate_name(name: &str) -> Result<(), TreeError> {
    if name.trim().is_empty() || name.contains('/') {
        return Err(TreeError::InvalidName(name.to_string()));
    }
    Ok(())
}
