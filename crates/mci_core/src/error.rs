//! Error types for configuration, sampling, scheduling and whole runs.

use thiserror::Error;

use crate::ecs::{FacilityNode, PatientId, StaffState};

/// Configuration rejected before any event is scheduled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("horizon must be positive, got {0} hours")]
    NonPositiveHorizon(f64),

    #[error("snapshot interval must be at least 1 minute, got {0}")]
    InvalidSnapshotInterval(f64),

    #[error("demand multiplier {name} must be positive, got {value}")]
    NonPositiveMultiplier { name: &'static str, value: f64 },

    #[error("baseline daily ED demand must be positive, got {0}")]
    NonPositiveBaseline(f64),

    #[error("monte carlo run count must be at least 1")]
    NoRuns,

    #[error("mortality rate must be within [0, 1], got {0}")]
    MortalityRateOutOfRange(f64),

    #[error("policy {name} activation time must be a non-negative number of hours, got {value}")]
    InvalidPolicyTime { name: &'static str, value: f64 },

    #[error("triangular bounds for {what} are malformed: min={min}, mode={mode}, max={max}")]
    MalformedTriangular {
        what: String,
        min: f64,
        mode: f64,
        max: f64,
    },
}

/// Sampler called with parameters outside its numeric domain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplingError {
    #[error("uniform range is inverted or non-finite: [{min}, {max}]")]
    InvalidUniformRange { min: f64, max: f64 },

    #[error("triangular parameters are degenerate: min={min}, mode={mode}, max={max}")]
    InvalidTriangular { min: f64, mode: f64, max: f64 },

    #[error("log-normal parameters are invalid: mu={mu}, sigma={sigma}")]
    InvalidLogNormal { mu: f64, sigma: f64 },

    #[error("poisson rate must be finite and non-negative, got {0}")]
    InvalidPoissonRate(f64),

    #[error("{0} sampler produced a non-finite value")]
    NonFinite(&'static str),
}

/// Attempt to break the scheduler's time ordering.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClockError {
    #[error("event scheduled at {at} which is before the current time {now}")]
    InThePast { at: f64, now: f64 },

    #[error("event scheduled at non-finite time {0}")]
    NonFinite(f64),
}

/// Anything that aborts a single simulation run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("sampling failed: {0}")]
    Sampling(#[from] SamplingError),

    #[error("scheduler invariant violated: {0}")]
    Clock(#[from] ClockError),

    #[error("queue length at {node} would become negative")]
    NegativeQueue { node: FacilityNode },

    #[error("staff agent {agent} cannot move from {from:?} to {to:?}")]
    StaffTransition {
        agent: String,
        from: StaffState,
        to: StaffState,
    },

    #[error("{0} already left the system and cannot be routed again")]
    PatientTerminal(PatientId),

    #[error("event refers to an entity that has no {0} component")]
    MissingEntity(&'static str),

    #[error("world is missing the {0} resource")]
    MissingResource(&'static str),

    #[error("run was cancelled")]
    Cancelled,
}

pub type SimResult<T> = Result<T, SimError>;
