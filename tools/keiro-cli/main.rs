use clap::{Parser, ValueEnum};
use keiro::prelude::*;
use std::fs;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Define a CLI-specific enum for clap to parse.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LayoutCli {
    Layered,
    Force,
}

/// Imports a workflow document against a schema, optionally lays it out and
/// overlays an execution log, then writes the document back out.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the schema source file
    #[arg(short, long)]
    schema: String,

    /// Name to register the schema under
    #[arg(long, default_value = "default")]
    schema_name: String,

    /// Path to the workflow document JSON file
    workflow: String,

    /// Re-position the graph with the chosen layout
    #[arg(short, long, value_enum)]
    layout: Option<LayoutCli>,

    /// Optional JSON file with layout options
    #[arg(long)]
    layout_config: Option<String>,

    /// Optional execution event log (JSON array) to overlay
    #[arg(short, long)]
    events: Option<String>,

    /// Write the exported document here instead of stdout
    #[arg(short, long)]
    output: Option<String>,

    /// Write an editor snapshot of the final graph here
    #[arg(long)]
    snapshot: Option<String>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(cli);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "keiro=debug,warn" } else { "keiro=info,warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) {
    let total_start = Instant::now();

    // --- 1. Schema ---
    let schema_text = fs::read_to_string(&cli.schema).unwrap_or_else(|e| {
        exit_with_error(&format!("Failed to read schema file '{}': {}", cli.schema, e))
    });
    let mut registry = SchemaRegistry::new();
    registry
        .register_strict(&cli.schema_name, &schema_text)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to register schema: {}", e)));
    let model_count = registry
        .get(&cli.schema_name)
        .map(|s| s.models().count())
        .unwrap_or(0);
    eprintln!("Parsed schema '{}': {} models", cli.schema_name, model_count);

    // --- 2. Import ---
    let workflow_text = fs::read_to_string(&cli.workflow).unwrap_or_else(|e| {
        exit_with_error(&format!("Failed to read workflow file '{}': {}", cli.workflow, e))
    });
    let import_start = Instant::now();
    let importer = WorkflowImporter::new(&registry, &cli.schema_name)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to create importer: {}", e)));
    let outcome = importer
        .import_str(&workflow_text)
        .unwrap_or_else(|e| exit_with_error(&format!("Import failed: {}", e)));
    let import_duration = import_start.elapsed();

    let mut graph = outcome.graph;
    eprintln!(
        "Imported {} nodes and {} edges in {:?}",
        graph.node_count(),
        graph.edge_count(),
        import_duration
    );
    for diagnostic in &outcome.diagnostics {
        eprintln!("  -> {}", diagnostic);
    }

    // --- 3. Layout ---
    if let Some(layout) = cli.layout {
        let choice = match layout {
            LayoutCli::Layered => LayoutChoice::Layered,
            LayoutCli::Force => LayoutChoice::ForceDirected,
        };
        let options = match &cli.layout_config {
            Some(path) => {
                let text = fs::read_to_string(path).unwrap_or_else(|e| {
                    exit_with_error(&format!("Failed to read layout config '{}': {}", path, e))
                });
                LayoutOptions::from_json(&text)
                    .unwrap_or_else(|e| exit_with_error(&format!("Invalid layout config: {}", e)))
            }
            None => LayoutOptions::default(),
        };
        let layout_start = Instant::now();
        graph.apply_layout(choice, &options);
        eprintln!("Applied {} layout in {:?}", choice, layout_start.elapsed());
    }

    // --- 4. Execution overlay ---
    if let Some(path) = &cli.events {
        let log = EventLog::from_file(path).unwrap_or_else(|e| {
            exit_with_error(&format!("Failed to load event log from '{}': {}", path, e))
        });
        let mut overlay = ExecutionOverlay::new();
        let skipped = overlay.apply_log(&mut graph, &log);
        eprintln!(
            "Applied {} events ({} skipped)",
            log.events.len(),
            skipped.len()
        );
        if let Some(status) = overlay.workflow_status() {
            eprintln!("  -> Workflow status: {}", status);
        }
        for node in graph.nodes() {
            if let Some(status) = node.display.status {
                eprintln!("  -> [{}] {}: {}", node.id, node.title(), status);
            }
        }
    }

    // --- 5. Output ---
    if let Some(path) = &cli.snapshot {
        GraphSnapshot::capture(&graph)
            .save(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to save snapshot: {}", e)));
        eprintln!("Saved editor snapshot to '{}'", path);
    }

    let exported = WorkflowExporter::export_string(&graph)
        .unwrap_or_else(|e| exit_with_error(&format!("Export failed: {}", e)));
    match &cli.output {
        Some(path) => {
            fs::write(path, exported)
                .unwrap_or_else(|e| exit_with_error(&format!("Failed to write '{}': {}", path, e)));
            eprintln!("Wrote workflow document to '{}'", path);
        }
        None => println!("{}", exported),
    }

    eprintln!("Total: {:?}", total_start.elapsed());
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
