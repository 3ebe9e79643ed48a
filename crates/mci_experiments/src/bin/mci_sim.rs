//! Mass-casualty ED flow simulator CLI
//!
//! ```bash
//! # One 72-hour run with a fixed seed, dumping snapshots and patients
//! mci-sim run --seed 1 --output run.json
//!
//! # 500 replications of a scenario file on 8 threads
//! mci-sim --config night.json monte-carlo --runs 500 --threads 8 --output report.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mci_core::runner::SimulationRun;
use mci_core::scenario::{Scenario, ScenarioConfig};
use mci_experiments::metrics::RunSummary;
use mci_experiments::{
    export_report_json, export_run_output_json, run_monte_carlo, MonteCarloOptions,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mci-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Scenario configuration (camelCase JSON). Defaults are used when omitted.
    #[arg(long, global = true, env = "MCI_SIM_CONFIG")]
    config: Option<PathBuf>,

    /// Override the staffing scenario from the config.
    #[arg(long, global = true, value_parser = parse_scenario)]
    scenario: Option<Scenario>,

    /// Override the horizon (hours).
    #[arg(long, global = true)]
    horizon_hours: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single simulation and print its summary.
    Run {
        /// Random seed. When omitted, a random seed is used.
        #[arg(long)]
        seed: Option<u64>,

        /// Write the full run output (snapshots, deaths, patients) as JSON.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run independent replications in parallel and aggregate them.
    MonteCarlo {
        /// Number of replications. Defaults to the config's monteCarloRuns.
        #[arg(long)]
        runs: Option<usize>,

        /// Seed of replication 0; replication i uses base + i.
        #[arg(long)]
        base_seed: Option<u64>,

        /// Worker threads (rayon default when omitted).
        #[arg(long)]
        threads: Option<usize>,

        /// Write the report as JSON.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Hide the progress bar.
        #[arg(long)]
        quiet: bool,
    },
}

fn parse_scenario(value: &str) -> Result<Scenario, String> {
    match value {
        "daytime" => Ok(Scenario::Daytime),
        "nighttime" => Ok(Scenario::Nighttime),
        other => Err(format!("unknown scenario `{other}` (expected daytime or nighttime)")),
    }
}

fn load_config(path: Option<&Path>) -> Result<ScenarioConfig> {
    let Some(path) = path else {
        return Ok(ScenarioConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,mci_core=info,mci_experiments=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(scenario) = args.scenario {
        config = config.with_scenario(scenario);
    }
    if let Some(hours) = args.horizon_hours {
        config = config.with_horizon_hours(hours);
    }

    match args.command {
        Command::Run { seed, output } => {
            let seed = seed.unwrap_or_else(rand::random);
            let started = std::time::Instant::now();
            let run_output = SimulationRun::new(&config, seed)
                .and_then(SimulationRun::run)
                .context("simulation run failed")?;
            let summary = RunSummary::from_output(0, &config, &run_output, started.elapsed());

            println!("seed:                {}", summary.seed);
            println!("scenario:            {}", summary.scenario.as_str());
            println!("patients:            {}", summary.total_patients);
            println!("deaths:              {}", summary.total_deaths);
            println!("avg wait (min):      {:.2}", summary.avg_wait_time);
            println!("bottleneck episodes: {}", summary.bottleneck_episodes);
            for (rank, total) in summary.top_bottlenecks.iter().enumerate() {
                println!(
                    "  {}. {:<22} {:.1}h red",
                    rank + 1,
                    total.node.as_str(),
                    total.minutes / 60.0
                );
            }
            println!("events processed:    {}", run_output.events_processed);
            println!("duration (ms):       {}", summary.duration_ms);

            if let Some(path) = output {
                export_run_output_json(&run_output, &path)
                    .with_context(|| format!("writing {}", path.display()))?;
                info!(path = %path.display(), "run output written");
            }
        }
        Command::MonteCarlo {
            runs,
            base_seed,
            threads,
            output,
            quiet,
        } => {
            let runs = runs.unwrap_or(config.monte_carlo_runs);
            let base_seed = base_seed.unwrap_or_else(rand::random);
            let mut options = MonteCarloOptions::new(runs, base_seed).with_progress_bar(!quiet);
            if let Some(threads) = threads {
                options = options.with_threads(threads);
            }

            let report = run_monte_carlo(&config, &options).context("monte carlo batch failed")?;
            let aggregate = &report.aggregate;
            println!("base seed:                {}", report.base_seed);
            println!(
                "replications:             {} completed, {} failed, {} cancelled",
                aggregate.completed, aggregate.failed, aggregate.cancelled
            );
            println!("mean patients:            {:.1}", aggregate.mean_total_patients);
            println!("mean deaths:              {:.2}", aggregate.mean_total_deaths);
            println!("mean avg wait (min):      {:.2}", aggregate.mean_avg_wait_time);
            println!("mean bottleneck episodes: {:.2}", aggregate.mean_bottleneck_episodes);

            if let Some(path) = output {
                export_report_json(&report, &path)
                    .with_context(|| format!("writing {}", path.display()))?;
                info!(path = %path.display(), "report written");
            }
        }
    }
    Ok(())
}
