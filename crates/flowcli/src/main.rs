// crates/flowcli/src/main.rs

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use flowcore::{ChannelSink, Condition, Edge, GraphDef, NodeDef, Operator, RunStatus, State};
use flowruntime::{GraphEngine, RuntimeConfig, ToolRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Flow Engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a graph file
    Run {
        /// Path to graph JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Initial state as a JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a graph file
    Validate {
        /// Path to graph JSON file
        file: PathBuf,
    },

    /// List available tools
    Tools,

    /// Create an example code review graph
    Init {
        /// Output file path
        #[arg(short, long, default_value = "graph.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            verbose,
        } => {
            let default_level = if verbose { "debug" } else { "warn" };
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new(default_level)),
                )
                .init();

            run_graph(&file, input).await?;
        }

        Commands::Validate { file } => {
            validate_graph(&file)?;
        }

        Commands::Tools => {
            list_tools();
        }

        Commands::Init { output } => {
            create_example_graph(&output)?;
        }
    }

    Ok(())
}

fn standard_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    flownodes::register_all(&registry);
    registry
}

fn load_graph(file: &Path) -> Result<GraphDef> {
    let json = std::fs::read_to_string(file)?;
    Ok(serde_json::from_str(&json)?)
}

fn parse_state(input: Option<String>) -> Result<State> {
    let Some(input) = input else {
        return Ok(State::new());
    };
    match serde_json::from_str::<serde_json::Value>(&input)? {
        serde_json::Value::Object(state) => Ok(state),
        _ => bail!("Input must be a JSON object"),
    }
}

async fn run_graph(file: &Path, input: Option<String>) -> Result<()> {
    println!("🚀 Loading graph from: {}", file.display());

    let def = load_graph(file)?;
    let initial_state = parse_state(input)?;

    let engine = GraphEngine::with_registry(Arc::new(standard_registry()), RuntimeConfig::from_env());
    let graph = engine.create_graph(def);

    println!("📋 Graph: {}", graph.id);
    println!("   Nodes: {}", graph.nodes.len());
    println!(
        "   Start: {}",
        graph.start_node.as_deref().unwrap_or("(none)")
    );
    println!();

    // Attach the printer before the run can log anything
    let (sink, mut lines) = ChannelSink::channel(64);
    let (run_id, subscription) =
        engine.start_run_with_subscriber(&graph.id, initial_state, Arc::new(sink))?;

    let printer = tokio::spawn(async move {
        while let Some(line) = lines.recv().await {
            println!("  {}", line);
        }
    });

    let run = engine.wait(&run_id).await?;
    // Dropping the subscription closes the channel and ends the printer
    engine.store().unsubscribe(&run_id, subscription);
    printer.await?;

    println!();
    println!("📊 Run Summary:");
    println!("   Run ID: {}", run.run_id);
    println!("   Status: {}", run.status);
    println!("   Log lines: {}", run.log.len());

    if !run.state.is_empty() {
        println!();
        println!("📤 Final state:");
        println!("{}", serde_json::to_string_pretty(&run.state)?);
    }

    if run.status != RunStatus::Finished {
        bail!("Run {} ended with status {}", run.run_id, run.status);
    }

    Ok(())
}

fn validate_graph(file: &Path) -> Result<()> {
    println!("🔍 Validating graph: {}", file.display());

    let def = load_graph(file)?;
    let graph = flowcore::Graph::from_def("g_local".to_string(), def);
    let registry = standard_registry();
    let issues = flowruntime::validate_graph(&graph, Some(&registry));

    if issues.is_empty() {
        println!("✅ Graph is valid:");
        println!("   Nodes: {}", graph.nodes.len());
        println!("   Edges: {}", graph.edge_targets().count());
        return Ok(());
    }

    println!("❌ Found {} issue(s):", issues.len());
    for issue in &issues {
        println!("   • {}", issue);
    }
    bail!("Graph is invalid")
}

fn list_tools() {
    println!("📦 Available Tools:");
    println!();

    let registry = standard_registry();

    for name in registry.list_tools() {
        if let Some(metadata) = registry.get_metadata(&name) {
            println!("  • {} ({:?})", name, metadata.arity);
            println!("    {}", metadata.description);
        } else {
            println!("  • {}", name);
        }
    }
}

fn create_example_graph(output: &Path) -> Result<()> {
    let def = GraphDef::new()
        .node(NodeDef::new("extract", "extract_functions"))
        .node(NodeDef::new("complexity", "check_complexity"))
        .node(NodeDef::new("issues", "detect_issues"))
        .node(NodeDef::new("suggest", "suggest_improvements"))
        .node(NodeDef::new("approve", "noop"))
        .node(NodeDef::new("reject", "noop"))
        .edge("extract", Edge::Target("complexity".to_string()))
        .edge("complexity", Edge::Target("issues".to_string()))
        .edge("issues", Edge::Target("suggest".to_string()))
        .edge(
            "suggest",
            Edge::branch(
                Condition::new("quality_score", Operator::Gte, 70),
                "approve",
                "reject",
            ),
        )
        .start("extract");

    let json = serde_json::to_string_pretty(&def)?;
    std::fs::write(output, json)?;

    println!("✨ Created example graph: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  flow run --file {} --input '{{\"code\": \"def main():\\n    pass\\n\"}}'",
        output.display()
    );

    Ok(())
}
