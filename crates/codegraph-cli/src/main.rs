// ABOUTME: CLI entry point: wires the Source Frontend, the eight-stage pipeline and the
// ABOUTME: Snapshot Store behind four subcommands. Exit codes: 0 success, 1 generic
// ABOUTME: failure, 2 configuration error, 3 migration failure (spec §6).
mod git;
mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use codegraph_core::{CodeGraphError, ProjectConfig, TypeDefinition, TypeMember, TypeRelationship};
use codegraph_graph::{run_pipeline, AnalysisState};
use codegraph_parser::project::Project;
use codegraph_store::SnapshotStore;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "codegraph")]
#[command(about = "Staged call-graph resolution engine for TypeScript", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "pretty")]
    output: OutputFormat,

    /// Path to the snapshot store's database file
    #[arg(long, global = true, env = "CODEGRAPH_STORAGE")]
    storage: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a project, run the resolution pipeline and commit a new snapshot.
    Measure {
        /// Human-readable label for the snapshot
        #[arg(long)]
        label: Option<String>,

        /// Project root to scan (defaults to the config's configured root)
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Query functions from a stored snapshot.
    Inspect {
        /// Snapshot to query (defaults to the latest committed snapshot)
        #[arg(long)]
        snapshot: Option<Uuid>,

        /// Glob-style substring match against the function's file path
        #[arg(long)]
        file: Option<String>,

        /// Substring match against the function's name
        #[arg(long)]
        name: Option<String>,
    },

    /// Snapshot management operations.
    #[command(subcommand)]
    Manage(ManageCommands),

    /// Aggregate quality-metric summary for a snapshot.
    Assess {
        /// Snapshot to assess (defaults to the latest committed snapshot)
        #[arg(long)]
        snapshot: Option<Uuid>,
    },
}

#[derive(Subcommand)]
enum ManageCommands {
    /// Diff two snapshots' function and edge sets.
    Diff {
        #[arg(long)]
        from: Uuid,
        #[arg(long)]
        to: Uuid,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(&cli) {
        Ok(value) => {
            if let Err(e) = print_output(&cli.output, &value) {
                eprintln!("{} {e}", "Error:".red().bold());
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            std::process::exit(exit_code_for(&e));
        }
    }
}

fn exit_code_for(e: &anyhow::Error) -> i32 {
    if let Some(err) = e.downcast_ref::<CodeGraphError>() {
        return match err {
            CodeGraphError::Config(_) => 2,
            CodeGraphError::Migration(_) => 3,
            _ => 1,
        };
    }
    1
}

fn run(cli: &Cli) -> Result<serde_json::Value> {
    let config = ProjectConfig::load(None).context("failed to load configuration")?;
    let storage_path = cli.storage.clone().unwrap_or(config.storage_path.clone());

    match &cli.command {
        Commands::Measure { label, root } => measure(&config, &storage_path, label.clone(), root.clone()),
        Commands::Inspect { snapshot, file, name } => {
            inspect(&storage_path, *snapshot, file.as_deref(), name.as_deref())
        }
        Commands::Manage(ManageCommands::Diff { from, to }) => diff(&storage_path, *from, *to),
        Commands::Assess { snapshot } => assess(&storage_path, *snapshot),
    }
}

fn measure(
    config: &ProjectConfig,
    storage_path: &PathBuf,
    label: Option<String>,
    root_override: Option<PathBuf>,
) -> Result<serde_json::Value> {
    let root = root_override.unwrap_or_else(|| config.root.clone());
    info!(root = %root.display(), "scanning project");
    let project = Project::load(&root, &config.include_globs, &config.exclude_globs)
        .context("failed to scan project")?;
    let skipped_files = project.diagnostics.skipped_files.len() as u64;

    let salt = config.config_hash();
    let mut state = AnalysisState::new(project, salt).context("failed to build analysis state")?;

    let mut store = SnapshotStore::open(storage_path).context("failed to open snapshot store")?;
    let cancel = Arc::new(AtomicBool::new(false));

    let summary = {
        // `store` is only read here (Stage 8's prior-snapshot lookup); the mutable
        // `begin_snapshot` borrow below starts once this immutable borrow has ended.
        let prior = &store;
        run_pipeline(&mut state, prior, &cancel).context("pipeline run failed")?
    };

    let git = git::read_metadata(&root);
    let source_root = root.to_string_lossy().into_owned();
    let pending = store
        .begin_snapshot(label, &source_root, &config.config_hash(), git)
        .context("failed to begin snapshot")?;
    let snapshot_id = pending.snapshot_id();

    let functions: Vec<_> = state.registry.all().cloned().collect();
    pending.save_functions(&functions).context("failed to save functions")?;
    pending.save_edges(&state.edges).context("failed to save edges")?;

    let types: Vec<TypeDefinition> = state.type_graph.types.values().cloned().collect();
    let members: Vec<TypeMember> = state.type_graph.members.values().flatten().cloned().collect();
    let relationships: Vec<TypeRelationship> = state.type_graph.relationships.clone();
    pending
        .save_type_system(&types, &members, &relationships)
        .context("failed to save type system")?;

    let counts = codegraph_core::SnapshotCounts {
        functions: functions.len() as u64,
        edges: state.edges.len() as u64,
        types: types.len() as u64,
        members: members.len() as u64,
        relationships: relationships.len() as u64,
        unresolved: state.unresolved.len() as u64,
        skipped_files,
    };
    pending.commit(counts.clone()).context("failed to commit snapshot")?;
    info!(snapshot = %snapshot_id, functions = counts.functions, edges = counts.edges, "snapshot committed");

    Ok(serde_json::json!({
        "snapshot_id": snapshot_id.to_string(),
        "cancelled": summary.cancelled,
        "functions": counts.functions,
        "edges": counts.edges,
        "types": counts.types,
        "unresolved": counts.unresolved,
        "skipped_files": counts.skipped_files,
        "warnings": state.warnings.len(),
    }))
}

fn resolve_snapshot(store: &SnapshotStore, requested: Option<Uuid>) -> Result<Uuid> {
    if let Some(id) = requested {
        return Ok(id);
    }
    store
        .latest_snapshot_id()
        .context("failed to read latest snapshot")?
        .ok_or_else(|| anyhow::anyhow!("no committed snapshot found"))
}

#[derive(Tabled)]
struct FunctionRow {
    name: String,
    file: String,
    line: u32,
    kind: String,
    complexity: u32,
}

fn inspect(
    storage_path: &PathBuf,
    snapshot: Option<Uuid>,
    file_filter: Option<&str>,
    name_filter: Option<&str>,
) -> Result<serde_json::Value> {
    let store = SnapshotStore::open(storage_path).context("failed to open snapshot store")?;
    let snapshot_id = resolve_snapshot(&store, snapshot)?;

    let functions = store
        .functions_by_snapshot(snapshot_id)
        .context("failed to query functions")?;

    let matched: Vec<_> = functions
        .into_iter()
        .filter(|f| file_filter.map(|p| f.location.file_path.contains(p)).unwrap_or(true))
        .filter(|f| name_filter.map(|p| f.name.contains(p)).unwrap_or(true))
        .collect();

    Ok(serde_json::json!({
        "snapshot_id": snapshot_id.to_string(),
        "functions": matched
            .iter()
            .map(|f| serde_json::json!({
                "name": f.name,
                "qualified_name": f.qualified_name(),
                "file": f.location.file_path,
                "line": f.location.start_line,
                "kind": format!("{:?}", f.kind),
                "complexity": f.metrics.cyclomatic_complexity,
            }))
            .collect::<Vec<_>>(),
    }))
}

fn diff(storage_path: &PathBuf, from: Uuid, to: Uuid) -> Result<serde_json::Value> {
    let store = SnapshotStore::open(storage_path).context("failed to open snapshot store")?;

    let from_functions = store.functions_by_snapshot(from).context("failed to load 'from' snapshot")?;
    let to_functions = store.functions_by_snapshot(to).context("failed to load 'to' snapshot")?;

    let from_ids: std::collections::HashSet<_> = from_functions.iter().map(|f| f.semantic_id).collect();
    let to_ids: std::collections::HashSet<_> = to_functions.iter().map(|f| f.semantic_id).collect();

    let added: Vec<_> = to_functions
        .iter()
        .filter(|f| !from_ids.contains(&f.semantic_id))
        .map(|f| f.qualified_name())
        .collect();
    let removed: Vec<_> = from_functions
        .iter()
        .filter(|f| !to_ids.contains(&f.semantic_id))
        .map(|f| f.qualified_name())
        .collect();
    let changed_body: Vec<_> = to_functions
        .iter()
        .filter_map(|to_fn| {
            from_functions
                .iter()
                .find(|from_fn| from_fn.semantic_id == to_fn.semantic_id)
                .filter(|from_fn| from_fn.content_id != to_fn.content_id)
                .map(|_| to_fn.qualified_name())
        })
        .collect();

    Ok(serde_json::json!({
        "from": from.to_string(),
        "to": to.to_string(),
        "added_functions": added,
        "removed_functions": removed,
        "changed_functions": changed_body,
    }))
}

fn assess(storage_path: &PathBuf, snapshot: Option<Uuid>) -> Result<serde_json::Value> {
    let store = SnapshotStore::open(storage_path).context("failed to open snapshot store")?;
    let snapshot_id = resolve_snapshot(&store, snapshot)?;
    let functions = store
        .functions_by_snapshot(snapshot_id)
        .context("failed to query functions")?;

    let count = functions.len().max(1) as f64;
    let avg_cyclomatic = functions.iter().map(|f| f.metrics.cyclomatic_complexity as f64).sum::<f64>() / count;
    let avg_cognitive = functions.iter().map(|f| f.metrics.cognitive_complexity as f64).sum::<f64>() / count;
    let avg_maintainability = functions.iter().map(|f| f.metrics.maintainability_index).sum::<f64>() / count;
    let max_cyclomatic = functions.iter().map(|f| f.metrics.cyclomatic_complexity).max().unwrap_or(0);
    let total_loc = functions.iter().map(|f| f.metrics.lines_of_code as u64).sum::<u64>();

    Ok(serde_json::json!({
        "snapshot_id": snapshot_id.to_string(),
        "function_count": functions.len(),
        "average_cyclomatic_complexity": avg_cyclomatic,
        "average_cognitive_complexity": avg_cognitive,
        "average_maintainability_index": avg_maintainability,
        "max_cyclomatic_complexity": max_cyclomatic,
        "total_lines_of_code": total_loc,
    }))
}

fn print_output(format: &OutputFormat, value: &serde_json::Value) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Pretty => print_pretty(value),
        OutputFormat::Table => print_table(value)?,
    }
    Ok(())
}

fn print_pretty(value: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                let key_colored = key.cyan().bold();
                match val {
                    serde_json::Value::String(s) => println!("{key_colored}: {}", s.green()),
                    serde_json::Value::Number(n) => println!("{key_colored}: {}", n.to_string().yellow()),
                    serde_json::Value::Bool(b) => {
                        println!("{key_colored}: {}", if *b { "true".green() } else { "false".red() });
                    }
                    serde_json::Value::Array(arr) if arr.is_empty() => {
                        println!("{key_colored}: (none)");
                    }
                    serde_json::Value::Array(arr) => {
                        println!("{key_colored}:");
                        for item in arr {
                            println!("  - {}", compact(item));
                        }
                    }
                    _ => println!("{key_colored}: {val}"),
                }
            }
        }
        _ => println!("{}", serde_json::to_string_pretty(value).unwrap_or_default()),
    }
}

fn compact(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn print_table(value: &serde_json::Value) -> Result<()> {
    let serde_json::Value::Object(map) = value else {
        print_pretty(value);
        return Ok(());
    };

    if let Some(serde_json::Value::Array(functions)) = map.get("functions") {
        let rows: Vec<FunctionRow> = functions
            .iter()
            .map(|f| FunctionRow {
                name: f["qualified_name"].as_str().unwrap_or_default().to_string(),
                file: f["file"].as_str().unwrap_or_default().to_string(),
                line: f["line"].as_u64().unwrap_or(0) as u32,
                kind: f["kind"].as_str().unwrap_or_default().to_string(),
                complexity: f["complexity"].as_u64().unwrap_or(0) as u32,
            })
            .collect();
        println!("{}", Table::new(rows));
        return Ok(());
    }

    print_pretty(value);
    Ok(())
}
