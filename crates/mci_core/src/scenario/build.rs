use bevy_ecs::prelude::World;

use crate::clock::SimulationClock;
use crate::distributions::RandomStream;
use crate::error::SimResult;
use crate::mortality::MortalityModel;
use crate::resources::ResourceLedger;
use crate::scenario::params::{ScenarioConfig, SimulationEndTime};
use crate::staff::spawn_roster;
use crate::systems::{PatientCounter, RunFault};
use crate::telemetry::{DeathLog, NodeStats, SimSnapshots};

/// Validates `config` and populates `world` with every resource a run needs,
/// then spawns the staff roster (which draws from the stream and may schedule
/// staff arrivals).
pub fn build_scenario(world: &mut World, config: &ScenarioConfig, seed: u64) -> SimResult<()> {
    config.validate()?;

    world.insert_resource(config.clone());
    world.insert_resource(SimulationClock::default());
    world.insert_resource(RandomStream::with_generator(seed, config.generator));
    world.insert_resource(ResourceLedger::for_scenario(config.scenario));
    world.insert_resource(MortalityModel::flat(config.mortality_rate));
    world.insert_resource(NodeStats::default());
    world.insert_resource(SimSnapshots::default());
    world.insert_resource(DeathLog::default());
    world.insert_resource(PatientCounter::default());
    world.insert_resource(RunFault::default());
    if config.stop_at_horizon {
        world.insert_resource(SimulationEndTime(config.horizon_minutes()));
    }

    spawn_roster(world, config.scenario)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, SimError};

    #[test]
    fn invalid_config_leaves_world_empty() {
        let mut world = World::new();
        let config = ScenarioConfig::default().with_snapshot_interval(0.0);
        let err = build_scenario(&mut world, &config, 1).unwrap_err();
        assert_eq!(
            err,
            SimError::Config(ConfigError::InvalidSnapshotInterval(0.0))
        );
        assert!(world.get_resource::<SimulationClock>().is_none());
    }

    #[test]
    fn build_inserts_run_resources() {
        let mut world = World::new();
        build_scenario(&mut world, &ScenarioConfig::default(), 1).expect("build");
        assert!(world.get_resource::<ResourceLedger>().is_some());
        assert!(world.get_resource::<SimSnapshots>().is_some());
        assert_eq!(world.resource::<PatientCounter>().total(), 0);
        assert!(world.get_resource::<SimulationEndTime>().is_none());
    }

    #[test]
    fn stop_at_horizon_sets_end_time() {
        let mut world = World::new();
        let config = ScenarioConfig::default()
            .with_horizon_hours(2.0)
            .with_stop_at_horizon(true);
        build_scenario(&mut world, &config, 1).expect("build");
        assert_eq!(world.resource::<SimulationEndTime>().0, 120.0);
    }
}
