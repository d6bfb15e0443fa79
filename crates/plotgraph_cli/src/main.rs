// SPDX-License-Identifier: MIT OR Apache-2.0
//! Plot graph command-line host.
//!
//! Loads serialized plot graphs, initializes them against the plot node
//! library and writes the step export consumed by the script runtime:
//! - `export` writes the JSON and Lua forms
//! - `check` validates graphs without writing anything
//! - `init` writes a default settings file

mod settings;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use plotgraph_graph::graphs::plot::{export_dict, export_graph, plot_registry, to_lua, StepIdPolicy};
use plotgraph_graph::{load_dict, load_graph, GraphDict, NodeCategory};
use settings::ExportSettings;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default log directives when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "plotgraph_graph=info,plotgraph_cli=info";

/// Plot graph validation and export
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file
    #[arg(short, long, default_value = ExportSettings::FILE_NAME)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export graphs for the script runtime
    Export {
        /// Graph dictionary files (name to graph)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Read inputs as single graph files instead of dictionaries
        #[arg(long)]
        single: bool,

        /// JSON output path, overriding the settings
        #[arg(long)]
        json: Option<PathBuf>,

        /// Lua output path, overriding the settings
        #[arg(long)]
        lua: Option<PathBuf>,

        /// Lua table name, overriding the settings
        #[arg(long)]
        table: Option<String>,
    },

    /// Load and validate graphs
    Check {
        /// Graph dictionary files (name to graph)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Read inputs as single graph files instead of dictionaries
        #[arg(long)]
        single: bool,
    },

    /// Write a settings file with the default values
    Init,
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("plotgraph_graph=debug,plotgraph_cli=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load every input and bind the graphs to the plot node library
fn load_graphs(inputs: &[PathBuf], single: bool) -> Result<GraphDict> {
    let mut graphs = GraphDict::new();
    for path in inputs {
        let loaded = if single {
            let graph = load_graph(path).with_context(|| format!("failed to load {}", path.display()))?;
            GraphDict::from([(graph.display_name.clone(), graph)])
        } else {
            load_dict(path).with_context(|| format!("failed to load {}", path.display()))?
        };
        for (name, graph) in loaded {
            if graphs.contains_key(&name) {
                tracing::warn!(graph = %name, path = %path.display(), "Graph loaded twice, keeping the later one");
            }
            graphs.insert(name, graph);
        }
    }

    let registry = plot_registry().context("plot node library is invalid")?;
    for (name, graph) in &mut graphs {
        let report = graph.initialize(registry.clone(), Arc::new(StepIdPolicy));
        if !report.is_clean() {
            tracing::warn!(
                graph = %name,
                dropped = ?report.dropped_nodes,
                pruned = ?report.pruned_edges,
                "Graph repaired on load"
            );
        }
    }
    Ok(graphs)
}

fn write_output(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "Wrote export");
    Ok(())
}

fn export(
    settings: ExportSettings,
    inputs: &[PathBuf],
    single: bool,
    json: Option<PathBuf>,
    lua: Option<PathBuf>,
    table: Option<String>,
) -> Result<()> {
    let graphs = load_graphs(inputs, single)?;
    let exported = export_dict(&graphs).context("export aborted")?;

    if let Some(path) = json.or(settings.json_output) {
        let text = if settings.pretty {
            serde_json::to_string_pretty(&exported)?
        } else {
            serde_json::to_string(&exported)?
        };
        write_output(&path, &text)?;
    }
    if let Some(path) = lua.or(settings.lua_output) {
        let table = table.unwrap_or(settings.lua_table);
        write_output(&path, &to_lua(&table, &exported))?;
    }

    tracing::info!(graphs = exported.len(), "Export finished");
    Ok(())
}

fn check(inputs: &[PathBuf], single: bool) -> Result<()> {
    let graphs = load_graphs(inputs, single)?;
    let mut failed = 0;
    for (name, graph) in &graphs {
        let steps = graph.nodes().filter(|n| n.is(NodeCategory::Step)).count();
        match export_graph(graph) {
            Ok(_) => println!(
                "{name}: {} nodes, {} edges, {steps} steps",
                graph.node_count(),
                graph.edge_count()
            ),
            Err(e) => {
                println!("{name}: {e}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} graphs cannot be exported", graphs.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Export {
            inputs,
            single,
            json,
            lua,
            table,
        } => {
            let settings = ExportSettings::load(&args.config)?;
            export(settings, &inputs, single, json, lua, table)
        }
        Command::Check { inputs, single } => check(&inputs, single),
        Command::Init => {
            if args.config.exists() {
                bail!("{} already exists", args.config.display());
            }
            ExportSettings::default().save(&args.config)?;
            tracing::info!(path = %args.config.display(), "Wrote default settings");
            Ok(())
        }
    }
}
