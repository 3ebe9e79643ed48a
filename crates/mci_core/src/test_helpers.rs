//! Shared setup for tests and benchmarks.

use crate::runner::{RunOutput, SimulationRun};
use crate::scenario::{Scenario, ScenarioConfig};

/// The reference daytime scenario: 100 patients/day, k = 10 / 4 / 1.5,
/// 72 hours, a snapshot every 5 minutes.
pub fn reference_config() -> ScenarioConfig {
    ScenarioConfig::default()
        .with_scenario(Scenario::Daytime)
        .with_baseline_ed_daily(100.0)
        .with_multipliers(10.0, 4.0, 1.5)
        .with_horizon_hours(72.0)
        .with_snapshot_interval(5.0)
}

/// A few hours of light demand; quick enough for unit-level checks.
pub fn short_config() -> ScenarioConfig {
    ScenarioConfig::default()
        .with_baseline_ed_daily(48.0)
        .with_multipliers(2.0, 1.0, 1.0)
        .with_horizon_hours(4.0)
        .with_snapshot_interval(15.0)
}

/// Builds and runs `config` with `seed`.
///
/// # Panics
///
/// Panics if the run fails.
pub fn run_to_completion(config: &ScenarioConfig, seed: u64) -> RunOutput {
    SimulationRun::new(config, seed)
        .and_then(SimulationRun::run)
        .expect("simulation run should succeed")
}
