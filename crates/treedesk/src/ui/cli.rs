//! Argument parsing and command dispatch for the `treedesk` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::app::gateway::ExternalToolGateway;
use crate::app::outline::render_outline;
use crate::app::workbench::Workbench;
use crate::domain::model::{NodeKind, NodeTemplate, split_path};
use crate::infra::config::Config;
use crate::infra::store::SnapshotStore;
use crate::infra::tools::BuiltinToolLoader;
use crate::ui::render::{render_entries, render_presentation};

#[derive(Debug, Parser)]
#[command(author, version, about = "Browse and edit a tree of documents and process diagrams", long_about = None)]
pub struct Cli {
    /// Snapshot file to operate on instead of the configured one
    #[arg(long, global = true, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the whole tree as an outline
    Tree,
    /// Show the node at PATH the way the viewer presents it
    Show { path: String },
    /// Find nodes whose name or path contains QUERY
    Search {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List the top-level entries
    Top {
        #[arg(long)]
        limit: Option<usize>,
        /// List the children of the top-level entries instead
        #[arg(long)]
        children: bool,
    },
    /// Add a new node under PARENT
    Add {
        parent: String,
        name: String,
        #[arg(long = "type", value_name = "KIND", default_value = "folder")]
        kind: NodeKind,
        #[arg(long)]
        icon: Option<String>,
    },
    /// Remove the node at PATH with its subtree
    Remove { path: String },
    /// Rename the node at PATH
    Rename { path: String, name: String },
    /// Copy the node at PATH next to itself
    Duplicate { path: String },
    /// Replace the tree with a snapshot file
    Import { file: PathBuf },
    /// Write the tree snapshot to FILE, or into the export directory
    Export { file: Option<PathBuf> },
    /// Work with the diagram of a process node
    Diagram {
        #[command(subcommand)]
        action: DiagramCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum DiagramCommand {
    /// Load FILE into the process at PATH
    Import { path: String, file: PathBuf },
    /// Write the diagram of PATH to FILE, or into the export directory
    Export { path: String, file: Option<PathBuf> },
    /// Replace the diagram of PATH with the starter diagram
    Reset { path: String },
}

impl Command {
    fn mutates(&self) -> bool {
        !matches!(
            self,
            Command::Tree
                | Command::Show { .. }
                | Command::Search { .. }
                | Command::Top { .. }
                | Command::Export { .. }
        )
    }
}

/// Execute `cli` against the configured snapshot, persisting it after mutating commands.
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let store = SnapshotStore::new(
        cli.snapshot
            .clone()
            .unwrap_or_else(|| config.defaults.snapshot_path.clone()),
    );
    let tree = store.load()?;
    let loader = BuiltinToolLoader::new();
    let gateway = Arc::new(ExternalToolGateway::new(
        loader.clone(),
        config.gateway_options(),
    ));
    let mut bench = Workbench::new(tree, gateway, config.editor_options());

    let mutates = cli.command.mutates();
    execute(cli.command, &mut bench, &config).await?;

    if mutates {
        store.save(bench.tree())?;
    }
    let extensions = loader.activated_extensions();
    if !extensions.is_empty() {
        tracing::debug!(?extensions, "tool extensions activated");
    }
    Ok(())
}

async fn execute(command: Command, bench: &mut Workbench, config: &Config) -> Result<()> {
    match command {
        Command::Tree => print!("{}", render_outline(bench.tree())),
        Command::Show { path } => {
            if !bench.tree().contains(&path) {
                bail!("no node at '{path}'");
            }
            let presentation = bench.select(&path).await.clone();
            let trail: Vec<String> = bench
                .breadcrumbs()
                .into_iter()
                .map(|(name, _)| name)
                .collect();
            println!("{}", trail.join(" › "));
            print!("{}", render_presentation(&presentation));
        }
        Command::Search { query, limit } => {
            let hits = bench.search(&query, Some(limit.unwrap_or(config.defaults.search_limit)));
            print!("{}", render_entries(&hits));
        }
        Command::Top { limit, children } => {
            let limit = limit.unwrap_or(config.defaults.top_level_limit);
            let entries = if children {
                bench.list_root_children(limit)
            } else {
                bench.list_top_level(limit)
            };
            print!("{}", render_entries(&entries));
        }
        Command::Add {
            parent,
            name,
            kind,
            icon,
        } => {
            let mut template = NodeTemplate::for_kind(kind);
            if let Some(icon) = icon {
                template = template.with_icon(icon);
            }
            println!("{}", bench.add(&parent, &name, &template)?);
        }
        Command::Remove { path } => {
            if !bench.remove(&path).await {
                bail!("no node at '{path}'");
            }
        }
        Command::Rename { path, name } => println!("{}", bench.rename(&path, &name)?),
        Command::Duplicate { path } => println!("{}", bench.duplicate(&path)?),
        Command::Import { file } => {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            bench.import_snapshot(&text).await?;
            println!("imported {} nodes", bench.index().len());
        }
        Command::Export { file } => {
            let target = match file {
                Some(file) => file,
                None => timestamped(&config.export.directory(), "tree", "json")?,
            };
            write_file(&target, &bench.export_snapshot())?;
            tracing::info!(path = %target.display(), "tree snapshot exported");
            println!("{}", target.display());
        }
        Command::Diagram { action } => diagram(action, bench, config).await?,
    }
    Ok(())
}

async fn diagram(action: DiagramCommand, bench: &mut Workbench, config: &Config) -> Result<()> {
    let path = match &action {
        DiagramCommand::Import { path, .. }
        | DiagramCommand::Export { path, .. }
        | DiagramCommand::Reset { path } => path.clone(),
    };
    bench.select(&path).await;
    bench.enter_edit(&path).await?;

    let outcome = match action {
        DiagramCommand::Import { file, .. } => {
            let xml = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            bench.import_diagram(&xml).await.map_err(anyhow::Error::from)
        }
        DiagramCommand::Export { file, .. } => match bench.export_diagram().await {
            Ok(xml) => {
                let (_, name) = split_path(&path);
                let target = match file {
                    Some(file) => file,
                    None => timestamped(&config.export.directory(), name, "bpmn")?,
                };
                write_file(&target, &xml).map(|()| println!("{}", target.display()))
            }
            Err(err) => Err(err.into()),
        },
        DiagramCommand::Reset { .. } => bench.reset_diagram().await.map_err(anyhow::Error::from),
    };
    bench.cancel().await;
    outcome
}

fn timestamped(directory: &Path, stem: &str, extension: &str) -> Result<PathBuf> {
    let timestamp = OffsetDateTime::now_utc().format(format_description!(
        "[year][month][day]-[hour][minute][second]"
    ))?;
    Ok(directory.join(format!("{stem}-{timestamp}.{extension}")))
}

fn write_file(target: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = target.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(target, contents).with_context(|| format!("failed to write {}", target.display()))
}
