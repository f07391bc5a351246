//! Red packet CLI
//!
//! Drives the detection engine offline against recorded UI trees.
//!
//! Usage from workspace root:
//!   cargo run --bin redpacket -- replay trace.json           # Replay a recorded event trace
//!   cargo run --bin redpacket -- inspect tree.json           # Show what the searches match in a tree
//!   cargo run --bin redpacket -- config                      # Print the effective configuration

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use redpacket::{
    AccessibilityEngine, AccessibilityEvent, AutomationEngine, EngineConfig, ManualScheduler,
    NodeSearch, ScreenGeometry, SnapshotEngine, UINode,
};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "redpacket")]
#[command(about = "Red packet detection engine, offline tools")]
struct Cli {
    /// JSON engine configuration; defaults apply to missing fields
    #[clap(long, short = 'c', global = true, env = "REDPACKET_CONFIG")]
    config: Option<PathBuf>,

    /// Override the target application package
    #[clap(long, global = true)]
    target_package: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a recorded trace through the engine on a virtual clock
    Replay(ReplayArgs),
    /// Run both tree searches over a single UI tree
    Inspect(InspectArgs),
    /// Print the effective configuration as JSON
    Config,
}

#[derive(Parser, Debug)]
struct ReplayArgs {
    /// Trace file: {"screen": {...}, "steps": [{"event": {...}, "tree": {...}}]}
    trace: PathBuf,

    /// Seed for the tap delay generator
    #[clap(long)]
    seed: Option<u64>,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// UI tree JSON file
    tree: PathBuf,

    #[clap(long, default_value_t = 1080)]
    width: u32,

    #[clap(long, default_value_t = 2340)]
    height: u32,
}

/// A recorded session: screen size plus the events in delivery order
#[derive(Debug, Deserialize)]
struct Trace {
    screen: ScreenGeometry,
    steps: Vec<TraceStep>,
}

#[derive(Debug, Deserialize)]
struct TraceStep {
    event: AccessibilityEvent,
    /// Active window tree from this step on; the previous one is kept when absent
    #[serde(default)]
    tree: Option<UINode>,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.target_package)?;

    match cli.command {
        Commands::Replay(args) => replay(config, &args),
        Commands::Inspect(args) => inspect(config, &args),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>, target_package: Option<String>) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(package) = target_package {
        config.target_package = package;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn replay(config: EngineConfig, args: &ReplayArgs) -> Result<()> {
    let trace: Trace = read_json(&args.trace)?;
    if trace.steps.is_empty() {
        bail!("Trace {} has no steps", args.trace.display());
    }

    let host = Arc::new(SnapshotEngine::new());
    host.set_screen(Some(trace.screen));
    let scheduler = Arc::new(ManualScheduler::new());
    let mut engine = AutomationEngine::new(config, host.clone(), scheduler.clone())?;
    if let Some(seed) = args.seed {
        engine = engine.with_seed(seed);
    }
    engine.on_service_connected();

    // Virtual clock starts at the first event
    let mut clock_ms = trace.steps[0].event.event_time_ms;
    for (index, step) in trace.steps.into_iter().enumerate() {
        let at = step.event.event_time_ms;
        if at < clock_ms {
            bail!("Step {index} goes back in time ({at} ms < {clock_ms} ms)");
        }
        let fired = scheduler.advance(Duration::from_millis(at - clock_ms));
        clock_ms = at;
        if fired > 0 {
            debug!(fired, at, "deferred taps ran");
        }

        if let Some(tree) = step.tree {
            host.set_tree(Some(tree));
        }
        let outcome = engine.on_event(&step.event);
        println!(
            "{at:>10} ms  {:<32} {outcome:?}",
            step.event.event_type.to_string()
        );
    }

    let remaining = scheduler.run_all();
    debug!(remaining, "flushed pending taps");
    engine.on_interrupt();

    for gesture in host.gestures() {
        if let Some(point) = gesture.origin() {
            println!("tap ({:.1}, {:.1})", point.x, point.y);
        }
    }
    for intent in host.intents() {
        println!("intent {}", intent.intent_id);
    }
    println!("{}", serde_json::to_string_pretty(&engine.stats())?);
    Ok(())
}

fn inspect(config: EngineConfig, args: &InspectArgs) -> Result<()> {
    let tree: UINode = read_json(&args.tree)?;
    let screen = ScreenGeometry::new(args.width, args.height);
    let host = SnapshotEngine::from_tree(tree, screen);
    let search = NodeSearch::new(config.search.clone());

    let Some(root) = host.get_active_root()? else {
        bail!("Tree {} is empty", args.tree.display());
    };
    info!(root_class = ?root.class_name(), "inspecting tree");

    match search.find_open_button(&root, screen)? {
        Some(candidate) => println!(
            "open button  identity={} at ({:.1}, {:.1})",
            candidate.identity, candidate.point.x, candidate.point.y
        ),
        None => println!("open button  none"),
    }
    match search.find_reward_element(&root, &config.keywords)? {
        Some(candidate) => println!(
            "reward       identity={} at ({:.1}, {:.1})",
            candidate.identity, candidate.point.x, candidate.point.y
        ),
        None => println!("reward       none"),
    }
    Ok(())
}
