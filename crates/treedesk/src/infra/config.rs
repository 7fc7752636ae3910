//! Configuration management utilities.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::app::gateway::GatewayOptions;
use crate::app::session::EditorOptions;

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".treedesk/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub editor: Editor,
    #[serde(default)]
    pub diagram: Diagram,
    #[serde(default)]
    pub export: Export,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "Defaults::default_snapshot_path")]
    pub snapshot_path: PathBuf,
    #[serde(default = "Defaults::default_top_level_limit")]
    pub top_level_limit: usize,
    #[serde(default = "Defaults::default_search_limit")]
    pub search_limit: usize,
}

impl Defaults {
    fn default_snapshot_path() -> PathBuf {
        PathBuf::from(".treedesk/tree.json")
    }

    fn default_top_level_limit() -> usize {
        6
    }

    fn default_search_limit() -> usize {
        20
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            snapshot_path: Self::default_snapshot_path(),
            top_level_limit: Self::default_top_level_limit(),
            search_limit: Self::default_search_limit(),
        }
    }
}

/// Rich-text editor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Editor {
    #[serde(default)]
    pub block_kinds: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Diagram {
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pretty_export: Option<bool>,
}

impl Diagram {
    pub fn pretty_export(&self) -> bool {
        self.pretty_export.unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Export {
    #[serde(default)]
    directory: Option<PathBuf>,
}

impl Export {
    fn default_directory() -> PathBuf {
        PathBuf::from("exports")
    }

    pub fn directory(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(Self::default_directory)
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    snapshot_path: Option<PathBuf>,
    top_level_limit: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            snapshot_path: env::var_os("TREEDESK_SNAPSHOT").map(PathBuf::from),
            top_level_limit: env::var("TREEDESK_TOP_LEVEL_LIMIT").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(snapshot_path: &str, top_level_limit: &str) -> Self {
        Self {
            snapshot_path: Some(PathBuf::from(snapshot_path)),
            top_level_limit: Some(top_level_limit.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config, and env overrides.
    pub fn load() -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path()?;
        Self::load_with_layers(global, workspace, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        apply_env_overrides(merged, env_overrides)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            defaults: merge_defaults(self.defaults, other.defaults),
            editor: merge_editor(self.editor, other.editor),
            diagram: merge_diagram(self.diagram, other.diagram),
            export: merge_export(self.export, other.export),
        }
    }

    /// Settings for sessions opened by the editing coordinator.
    pub fn editor_options(&self) -> EditorOptions {
        let mut options = EditorOptions {
            pretty_export: self.diagram.pretty_export(),
            ..EditorOptions::default()
        };
        if !self.editor.block_kinds.is_empty() {
            options.block_kinds = self.editor.block_kinds.clone();
        }
        options
    }

    /// Extensions requested when the capability providers are loaded.
    pub fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions {
            rich_text_extensions: self.editor.extensions.clone(),
            diagram_extensions: self.diagram.extensions.clone(),
        }
    }
}

fn merge_defaults(base: Defaults, overlay: Defaults) -> Defaults {
    Defaults {
        snapshot_path: if overlay.snapshot_path != Defaults::default_snapshot_path() {
            overlay.snapshot_path
        } else {
            base.snapshot_path
        },
        top_level_limit: if overlay.top_level_limit != Defaults::default_top_level_limit() {
            overlay.top_level_limit
        } else {
            base.top_level_limit
        },
        search_limit: if overlay.search_limit != Defaults::default_search_limit() {
            overlay.search_limit
        } else {
            base.search_limit
        },
    }
}

// Block kinds replace the inherited list so a layer can disable kinds;
// extensions accumulate.
fn merge_editor(base: Editor, overlay: Editor) -> Editor {
    let block_kinds = if overlay.block_kinds.is_empty() {
        base.block_kinds
    } else {
        overlay.block_kinds
    };
    Editor {
        block_kinds,
        extensions: union(base.extensions, overlay.extensions),
    }
}

fn merge_diagram(base: Diagram, overlay: Diagram) -> Diagram {
    Diagram {
        extensions: union(base.extensions, overlay.extensions),
        pretty_export: overlay.pretty_export.or(base.pretty_export),
    }
}

fn merge_export(mut base: Export, overlay: Export) -> Export {
    if let Some(value) = overlay.directory {
        base.directory = Some(value);
    }
    base
}

fn union(base: Vec<String>, overlay: Vec<String>) -> Vec<String> {
    let mut merged: BTreeSet<String> = base.into_iter().collect();
    merged.extend(overlay);
    merged.into_iter().collect()
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("treedesk/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    let root = find_workspace_root(&cwd).unwrap_or(cwd);
    Ok(Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH)))
}

/// Nearest ancestor holding a `.treedesk` directory or a git checkout.
fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".treedesk").is_dir() || dir.join(".git").exists())
        .map(Path::to_path_buf)
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Result<Config> {
    if let Some(path) = env.snapshot_path {
        config.defaults.snapshot_path = path;
    }
    if let Some(limit) = env.top_level_limit {
        config.defaults.top_level_limit = limit
            .trim()
            .parse()
            .with_context(|| format!("TREEDESK_TOP_LEVEL_LIMIT is not a number: {limit}"))?;
    }
    Ok(config)
}
