//! `sweep-harness` command line

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sweep_harness::analysis::Analyzer;
use sweep_harness::editor::{ConfigEditor, ParameterTarget};
use sweep_harness::experiment::ResultStore;
use sweep_harness::sweep::{SweepController, SweepPlan};
use sweep_harness::{FallbackPolicy, HarnessConfig};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sweep-harness", version, about = "Resumable parameter sweeps over an external simulation")]
struct Cli {
    /// Log at debug level (child output included)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the sweep, skipping values that already have a result
    Run(RunArgs),
    /// Analyze an existing result store
    Analyze(AnalyzeArgs),
    /// Reset the external configuration artifact to known-good defaults
    ResetConfig(CommonArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Harness settings file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// External program's configuration artifact
    #[arg(long, value_name = "FILE")]
    artifact: Option<PathBuf>,

    /// Result store
    #[arg(long, value_name = "FILE")]
    results: Option<PathBuf>,
}

impl CommonArgs {
    fn load(&self) -> anyhow::Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => HarnessConfig::default(),
        };
        if let Some(path) = &self.artifact {
            config.config_path.clone_from(path);
        }
        if let Some(path) = &self.results {
            config.results_path.clone_from(path);
        }
        Ok(config)
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Clear existing results before running
    #[arg(long)]
    clear_results: bool,

    /// Rerun values that already have a result
    #[arg(long)]
    force_rerun: bool,

    /// Run only these parameter values
    #[arg(long, num_args = 1.., value_name = "N")]
    specific: Vec<u32>,

    /// Smallest parameter value
    #[arg(long, value_name = "N")]
    min: Option<u32>,

    /// Largest parameter value
    #[arg(long, value_name = "N")]
    max: Option<u32>,

    /// Per-run timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Record UNKNOWN instead of the step budget when no completion line appears
    #[arg(long)]
    unknown_on_silent_exit: bool,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Also write the JSON report (including the fitted curve) to this file
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Analyze(args) => analyze(&args),
        Command::ResetConfig(args) => reset_config(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = args.common.load()?;
    if let Some(min) = args.min {
        config.min_parameter = min;
    }
    if let Some(max) = args.max {
        config.max_parameter = max;
    }
    if let Some(secs) = args.timeout_secs {
        config.timeout_secs = secs;
    }
    if args.unknown_on_silent_exit {
        config.fallback_policy = FallbackPolicy::MarkUnknown;
    }

    let plan = if args.specific.is_empty() {
        SweepPlan::from_config(&config)
    } else {
        SweepPlan::specific(args.specific)
    }
    .force_rerun(args.force_rerun)
    .clear_results(args.clear_results);

    let mut controller = SweepController::from_config(&config)?;
    let summary = controller.run(&plan).await.context("sweep aborted")?;

    println!("\n--- Results Summary ---");
    println!("Runs this session: {}", summary.launched);
    println!("Successful: {}", summary.succeeded);
    println!("Failed: {}", summary.failed);
    if summary.unknown > 0 {
        println!("Unknown: {}", summary.unknown);
    }
    if summary.recoveries > 0 {
        println!("Configuration resets: {}", summary.recoveries);
    }

    let store = controller.into_store();
    println!("Total configurations recorded: {}", store.len());
    match Analyzer::new().analyze(store.records()) {
        Ok(report) => {
            println!(
                "Fastest: {} ({} steps)",
                report.fastest.parameter, report.fastest.steps
            );
            println!(
                "Most efficient: {} ({} steps)",
                report.most_efficient.parameter, report.most_efficient.steps
            );
        }
        Err(e) => println!("No successful runs to summarize ({e})"),
    }
    Ok(())
}

fn analyze(args: &AnalyzeArgs) -> anyhow::Result<()> {
    let config = args.common.load()?;
    let store = ResultStore::open_existing(&config.results_path)?;
    let report = Analyzer::new().analyze(store.records())?;

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

fn reset_config(args: &CommonArgs) -> anyhow::Result<()> {
    let config = args.load()?;
    let editor = ConfigEditor::new(&config.config_path);
    editor.reset_to_defaults()?;
    println!("Configuration reset: {}", editor.path().display());
    Ok(())
}
