//! Scenario setup: configuration, validation, and world construction.

mod build;
mod params;

pub use build::build_scenario;
pub use params::{
    Policies, PolicyToggle, Scenario, ScenarioConfig, SimulationEndTime, DEFAULT_HORIZON_HOURS,
    EARLY_PHASE_END_HOURS, FIRST_DAY_END_HOURS,
};
