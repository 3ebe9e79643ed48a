//! Monte Carlo experiments for the mass-casualty ED flow simulator.
//!
//! Replications of one [mci_core::scenario::ScenarioConfig] run in parallel,
//! each with its own world and a seed derived from the batch's base seed.
//! Per-run summaries are aggregated into a [MonteCarloReport].
//!
//! ```no_run
//! use mci_core::scenario::ScenarioConfig;
//! use mci_experiments::{run_monte_carlo, MonteCarloOptions};
//!
//! let config = ScenarioConfig::default().with_horizon_hours(24.0);
//! let report = run_monte_carlo(&config, &MonteCarloOptions::new(50, 1)).unwrap();
//! println!("mean deaths: {}", report.aggregate.mean_total_deaths);
//! ```
//!
//! - [`runner`]: parallel replication with progress and cancellation
//! - [`metrics`]: per-run summaries and aggregation
//! - [`batch`]: off-thread batch execution with a message channel
//! - [`export`]: JSON export of reports and run outputs

pub mod batch;
pub mod error;
pub mod export;
pub mod metrics;
pub mod runner;

pub use batch::{spawn_batch, BatchHandle, BatchMessage, BatchRequest};
pub use error::ExperimentError;
pub use export::{export_report_json, export_run_output_json};
pub use metrics::{
    AggregateMetrics, MonteCarloReport, NodeRedDuration, ReplicationStatus, RunSummary,
};
pub use runner::{derive_seed, run_monte_carlo, run_monte_carlo_with, run_replication, MonteCarloOptions};
