//! Parallel Monte Carlo execution using rayon.
//!
//! Every replication builds and owns its own world; nothing is shared between
//! them except the read-only config, the cancellation flag and the progress
//! counter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use mci_core::error::SimError;
use mci_core::runner::SimulationRun;
use mci_core::scenario::ScenarioConfig;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::ExperimentError;
use crate::metrics::{MonteCarloReport, ReplicationStatus, RunSummary};

/// Seed of replication `run_index`: `base_seed + run_index`, wrapping.
pub fn derive_seed(base_seed: u64, run_index: usize) -> u64 {
    base_seed.wrapping_add(run_index as u64)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonteCarloOptions {
    pub runs: usize,
    pub base_seed: u64,
    /// Worker threads; `None` uses rayon's default.
    pub num_threads: Option<usize>,
    pub show_progress: bool,
}

impl MonteCarloOptions {
    pub fn new(runs: usize, base_seed: u64) -> Self {
        Self {
            runs,
            base_seed,
            num_threads: None,
            show_progress: false,
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = Some(threads);
        self
    }

    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

/// Runs replication `run_index` of a batch to completion.
///
/// A set `cancel` flag skips the replication, or abandons it between events if
/// it is already running.
pub fn run_replication(
    config: &ScenarioConfig,
    run_index: usize,
    base_seed: u64,
    cancel: &AtomicBool,
) -> ReplicationStatus {
    let seed = derive_seed(base_seed, run_index);
    if cancel.load(Ordering::Relaxed) {
        return ReplicationStatus::Cancelled { run_index, seed };
    }

    let started = Instant::now();
    match SimulationRun::new(config, seed).and_then(|run| run.run_with_cancel(cancel)) {
        Ok(output) => ReplicationStatus::Completed(RunSummary::from_output(
            run_index,
            config,
            &output,
            started.elapsed(),
        )),
        Err(SimError::Cancelled) => ReplicationStatus::Cancelled { run_index, seed },
        Err(err) => {
            warn!(run_index, seed, error = %err, "replication failed");
            ReplicationStatus::Failed {
                run_index,
                seed,
                message: err.to_string(),
            }
        }
    }
}

pub fn run_monte_carlo(
    config: &ScenarioConfig,
    options: &MonteCarloOptions,
) -> Result<MonteCarloReport, ExperimentError> {
    run_monte_carlo_with(config, options, &AtomicBool::new(false), |_| {})
}

/// Runs `options.runs` replications in parallel.
///
/// `progress` receives the completed fraction after every replication, in
/// non-decreasing order, ending at 1.0.
pub fn run_monte_carlo_with<P>(
    config: &ScenarioConfig,
    options: &MonteCarloOptions,
    cancel: &AtomicBool,
    progress: P,
) -> Result<MonteCarloReport, ExperimentError>
where
    P: Fn(f64) + Sync,
{
    config.validate_batch(options.runs)?;
    let runs = options.runs;
    info!(
        runs,
        base_seed = options.base_seed,
        scenario = config.scenario.as_str(),
        "monte carlo batch started"
    );

    let bar = options.show_progress.then(|| progress_bar(runs as u64));

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = options.num_threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build()?;

    let completed = Mutex::new(0usize);
    let replications: Vec<ReplicationStatus> = pool.install(|| {
        (0..runs)
            .into_par_iter()
            .map(|run_index| {
                let status = run_replication(config, run_index, options.base_seed, cancel);
                {
                    // Reporting under the lock keeps fractions ordered.
                    let mut done = completed.lock().unwrap_or_else(PoisonError::into_inner);
                    *done += 1;
                    progress(*done as f64 / runs as f64);
                }
                if let Some(bar) = &bar {
                    bar.inc(1);
                }
                status
            })
            .collect()
    });

    if let Some(bar) = &bar {
        bar.finish_with_message("Completed");
    }

    let report = MonteCarloReport::new(config.clone(), options.base_seed, replications);
    info!(
        completed = report.aggregate.completed,
        failed = report.aggregate.failed,
        cancelled = report.aggregate.cancelled,
        mean_deaths = report.aggregate.mean_total_deaths,
        "monte carlo batch finished"
    );
    Ok(report)
}

fn progress_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    bar.set_style(style);
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_are_offsets_of_the_base() {
        assert_eq!(derive_seed(100, 0), 100);
        assert_eq!(derive_seed(100, 7), 107);
        assert_eq!(derive_seed(u64::MAX, 1), 0);
    }

    #[test]
    fn cancelled_flag_skips_replication() {
        let cancel = AtomicBool::new(true);
        let status = run_replication(&ScenarioConfig::default(), 3, 10, &cancel);
        assert_eq!(
            status,
            ReplicationStatus::Cancelled {
                run_index: 3,
                seed: 13
            }
        );
    }

    #[test]
    fn zero_runs_is_a_config_error() {
        let err = run_monte_carlo(&ScenarioConfig::default(), &MonteCarloOptions::new(0, 1))
            .unwrap_err();
        assert!(matches!(err, ExperimentError::Config(_)));
    }
}
