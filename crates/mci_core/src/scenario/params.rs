use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::clock::MINUTES_PER_HOUR;
use crate::distributions::GeneratorKind;
use crate::ecs::StaffRole;
use crate::error::ConfigError;
use crate::mortality::DEFAULT_MORTALITY_RATE;

/// The event horizon: 72 hours after the earthquake.
pub const DEFAULT_HORIZON_HOURS: f64 = 72.0;

/// Demand bucket boundaries, in hours since the event.
pub const EARLY_PHASE_END_HOURS: f64 = 6.0;
pub const FIRST_DAY_END_HOURS: f64 = 24.0;

/// When present, the runner stops before any event later than this time (minutes).
#[derive(Debug, Clone, Copy, PartialEq, Resource)]
pub struct SimulationEndTime(pub f64);

/// Which staffing and capacity profile the hospital starts from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    #[default]
    Daytime,
    Nighttime,
}

impl Scenario {
    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::Daytime => "daytime",
            Scenario::Nighttime => "nighttime",
        }
    }
}

/// Intervention switch. Recorded with every run; interventions themselves do
/// not yet alter routing or capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyToggle {
    pub active: bool,
    /// Hours after the event at which the policy takes effect.
    pub time: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policies {
    pub p1: PolicyToggle,
    pub p2: PolicyToggle,
    pub p3: PolicyToggle,
    pub p4: PolicyToggle,
}

impl Policies {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &PolicyToggle)> {
        [
            ("p1", &self.p1),
            ("p2", &self.p2),
            ("p3", &self.p3),
            ("p4", &self.p4),
        ]
        .into_iter()
    }

    /// Labels of the active policies, e.g. `["p1", "p3"]`.
    pub fn active_labels(&self) -> Vec<String> {
        self.iter()
            .filter(|(_, toggle)| toggle.active)
            .map(|(name, _)| name.to_string())
            .collect()
    }
}

/// Everything a run or a batch of runs is parameterized by.
#[derive(Debug, Clone, PartialEq, Resource, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenarioConfig {
    pub scenario: Scenario,
    #[serde(rename = "baselineEDDaily")]
    pub baseline_ed_daily: f64,
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub policies: Policies,
    /// Minutes between snapshots.
    pub snapshot_interval: f64,
    pub monte_carlo_runs: usize,
    pub horizon_hours: f64,
    /// Per-transition death probability.
    pub mortality_rate: f64,
    pub generator: GeneratorKind,
    /// Stop draining at the horizon instead of running every patient to completion.
    pub stop_at_horizon: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            scenario: Scenario::Daytime,
            baseline_ed_daily: 100.0,
            k1: 10.0,
            k2: 4.0,
            k3: 1.5,
            policies: Policies::default(),
            snapshot_interval: 5.0,
            monte_carlo_runs: 100,
            horizon_hours: DEFAULT_HORIZON_HOURS,
            mortality_rate: DEFAULT_MORTALITY_RATE,
            generator: GeneratorKind::Lcg,
            stop_at_horizon: false,
        }
    }
}

impl ScenarioConfig {
    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = scenario;
        self
    }

    pub fn with_baseline_ed_daily(mut self, patients_per_day: f64) -> Self {
        self.baseline_ed_daily = patients_per_day;
        self
    }

    /// Demand multipliers for the <6h, 6–24h and ≥24h buckets.
    pub fn with_multipliers(mut self, k1: f64, k2: f64, k3: f64) -> Self {
        self.k1 = k1;
        self.k2 = k2;
        self.k3 = k3;
        self
    }

    pub fn with_snapshot_interval(mut self, minutes: f64) -> Self {
        self.snapshot_interval = minutes;
        self
    }

    pub fn with_horizon_hours(mut self, hours: f64) -> Self {
        self.horizon_hours = hours;
        self
    }

    pub fn with_monte_carlo_runs(mut self, runs: usize) -> Self {
        self.monte_carlo_runs = runs;
        self
    }

    pub fn with_mortality_rate(mut self, rate: f64) -> Self {
        self.mortality_rate = rate;
        self
    }

    pub fn with_generator(mut self, generator: GeneratorKind) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_stop_at_horizon(mut self, stop: bool) -> Self {
        self.stop_at_horizon = stop;
        self
    }

    pub fn with_policies(mut self, policies: Policies) -> Self {
        self.policies = policies;
        self
    }

    pub fn horizon_minutes(&self) -> f64 {
        self.horizon_hours * MINUTES_PER_HOUR
    }

    /// Demand multiplier for the minute `minute` after the event.
    pub fn multiplier_at(&self, minute: f64) -> f64 {
        let hour = minute / MINUTES_PER_HOUR;
        if hour < EARLY_PHASE_END_HOURS {
            self.k1
        } else if hour < FIRST_DAY_END_HOURS {
            self.k2
        } else {
            self.k3
        }
    }

    /// Expected arrivals during the minute starting at `minute`.
    pub fn arrival_rate_at(&self, minute: f64) -> f64 {
        self.baseline_ed_daily / 24.0 * self.multiplier_at(minute)
    }

    /// Checks everything a single run needs. Called before anything is scheduled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.horizon_hours.is_finite() && self.horizon_hours > 0.0) {
            return Err(ConfigError::NonPositiveHorizon(self.horizon_hours));
        }
        if !(self.snapshot_interval.is_finite() && self.snapshot_interval >= 1.0) {
            return Err(ConfigError::InvalidSnapshotInterval(self.snapshot_interval));
        }
        if !(self.baseline_ed_daily.is_finite() && self.baseline_ed_daily > 0.0) {
            return Err(ConfigError::NonPositiveBaseline(self.baseline_ed_daily));
        }
        for (name, value) in [("k1", self.k1), ("k2", self.k2), ("k3", self.k3)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositiveMultiplier { name, value });
            }
        }
        if !(0.0..=1.0).contains(&self.mortality_rate) {
            return Err(ConfigError::MortalityRateOutOfRange(self.mortality_rate));
        }
        for (name, toggle) in self.policies.iter() {
            if !(toggle.time.is_finite() && toggle.time >= 0.0) {
                return Err(ConfigError::InvalidPolicyTime {
                    name,
                    value: toggle.time,
                });
            }
        }
        for role in StaffRole::ALL {
            let travel = role.travel_time();
            if !(travel.max > travel.min && (travel.min..=travel.max).contains(&travel.mode)) {
                return Err(ConfigError::MalformedTriangular {
                    what: role.label().to_string(),
                    min: travel.min,
                    mode: travel.mode,
                    max: travel.max,
                });
            }
        }
        Ok(())
    }

    /// [ScenarioConfig::validate] plus the batch-only checks.
    pub fn validate_batch(&self, runs: usize) -> Result<(), ConfigError> {
        if runs == 0 {
            return Err(ConfigError::NoRuns);
        }
        self.validate()
    }
}
