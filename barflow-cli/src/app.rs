use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use barflow_config::{BarflowConfig, ConfigLoader};
use barflow_indicators::graph::KINDS;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::candles::read_candles;
use crate::replay::{run_replay, write_outputs, ParamOverride, ReplayPlan};
use crate::telemetry::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "barflow", author, version, about = "Replay candle data through revision-safe indicator graphs")]
pub struct Cli {
    /// Configuration environment, loads `{config-dir}/{env}.toml` over the defaults
    #[arg(long, default_value = "default", global = true)]
    env: String,
    /// Directory holding `default.toml` and the environment overlays
    #[arg(long, default_value = "config", global = true)]
    config_dir: PathBuf,
    /// Extra configuration file merged on top of the directory layers
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a candle CSV through the configured graph and print node outputs
    Replay(ReplayArgs),
    /// Show evaluation order and parameters of the configured graph
    Graph,
    /// List the node kinds a graph may use
    Kinds,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Candle CSV with `timestamp,open,high,low,close[,volume]` columns
    candles: PathBuf,
    /// Write the result to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Tentative updates per bar, overrides `replay.revisions_per_bar`
    #[arg(long)]
    revisions: Option<usize>,
    /// Parameter write as NODE.PARAM=VALUE (repeatable)
    #[arg(long = "set", value_name = "NODE.PARAM=VALUE")]
    overrides: Vec<ParamOverride>,
    /// Apply `--set` writes just before this bar instead of up front
    #[arg(long, requires = "overrides")]
    at_bar: Option<usize>,
    /// Node ids to print, defaults to every node
    #[arg(long, value_delimiter = ',')]
    nodes: Vec<String>,
    /// Round printed values to this many decimal places
    #[arg(long)]
    precision: Option<u32>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut loader = ConfigLoader::new(&cli.config_dir).env(&cli.env);
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    let config = loader.load()?;
    init_tracing(&config.log, cli.verbose)?;

    match cli.command {
        Commands::Replay(args) => replay(&config, args),
        Commands::Graph => describe_graph(&config),
        Commands::Kinds => {
            let mut stdout = io::stdout().lock();
            for kind in KINDS {
                writeln!(stdout, "{kind}")?;
            }
            Ok(())
        }
    }
}

fn replay(config: &BarflowConfig, args: ReplayArgs) -> Result<()> {
    if config.graph.nodes.is_empty() {
        bail!("configuration defines no graph nodes");
    }
    let mut graph = config.build_graph()?;
    let candles = read_candles(&args.candles)?;
    info!(
        candles = candles.len(),
        nodes = graph.len(),
        path = %args.candles.display(),
        "starting replay"
    );

    let plan = ReplayPlan {
        revisions_per_bar: args
            .revisions
            .unwrap_or(config.replay.revisions_per_bar),
        sessions: config.replay.session,
        overrides: args.overrides,
        change_at: args.at_bar,
    };
    let (host, _) = run_replay(&mut graph, &candles, &plan)?;

    let columns: Vec<String> = if args.nodes.is_empty() {
        graph.ids().map(str::to_string).collect()
    } else {
        args.nodes
    };
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_outputs(&graph, &host, &columns, args.precision, BufWriter::new(file))
        }
        None => write_outputs(&graph, &host, &columns, args.precision, io::stdout().lock()),
    }
}

fn describe_graph(config: &BarflowConfig) -> Result<()> {
    let graph = config.build_graph()?;
    let mut stdout = io::stdout().lock();
    for id in graph.execution_order() {
        let params = graph
            .parameters(id)?
            .into_iter()
            .map(|param| format!("{}={}", param.name, param.value))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(stdout, "{id}\t{params}")?;
    }
    Ok(())
}
