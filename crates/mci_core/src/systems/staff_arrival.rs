use bevy_ecs::prelude::{Query, Res, ResMut};

use crate::clock::{CurrentEvent, EventKind};
use crate::ecs::StaffAgent;
use crate::error::SimError;
use crate::resources::ResourceLedger;
use crate::staff::report_for_duty;
use crate::systems::RunFault;

pub fn staff_arrival_system(
    event: Res<CurrentEvent>,
    mut ledger: ResMut<ResourceLedger>,
    mut agents: Query<&mut StaffAgent>,
    mut fault: ResMut<RunFault>,
) {
    let EventKind::StaffArrival(entity) = event.0.kind else {
        return;
    };
    let Ok(mut agent) = agents.get_mut(entity) else {
        fault.record(SimError::MissingEntity("StaffAgent"));
        return;
    };
    if let Err(err) = report_for_duty(&mut agent, &mut ledger) {
        fault.record(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::{Schedule, World};

    use crate::clock::SimulationClock;
    use crate::ecs::{StaffId, StaffRole, StaffState};
    use crate::resources::ResourcePool;
    use crate::scenario::Scenario;

    fn run_arrival(world: &mut World, agent: bevy_ecs::prelude::Entity) {
        let mut clock = SimulationClock::default();
        let event = clock
            .schedule_at(42.0, EventKind::StaffArrival(agent))
            .expect("schedule");
        clock.pop_next().expect("advance");
        world.insert_resource(clock);
        world.insert_resource(CurrentEvent(event));

        let mut schedule = Schedule::default();
        schedule.add_systems(staff_arrival_system);
        schedule.run(world);
    }

    #[test]
    fn arriving_nurse_opens_a_triage_slot() {
        let mut world = World::new();
        world.insert_resource(ResourceLedger::for_scenario(Scenario::Nighttime));
        world.insert_resource(RunFault::default());
        let nurse = world
            .spawn(StaffAgent {
                id: StaffId {
                    role: StaffRole::EdNurse,
                    index: 0,
                },
                state: StaffState::Traveling,
                show_probability: 0.9,
                arrival_time: Some(42.0),
            })
            .id();

        run_arrival(&mut world, nurse);

        assert!(!world.resource::<RunFault>().is_set());
        assert_eq!(
            world.get::<StaffAgent>(nurse).map(|a| a.state),
            Some(StaffState::OnDuty)
        );
        assert_eq!(
            world.resource::<ResourceLedger>().capacity(ResourcePool::Triage),
            2
        );
    }

    #[test]
    fn agent_already_on_duty_faults_the_run() {
        let mut world = World::new();
        world.insert_resource(ResourceLedger::for_scenario(Scenario::Daytime));
        world.insert_resource(RunFault::default());
        let doctor = world
            .spawn(StaffAgent {
                id: StaffId {
                    role: StaffRole::EdDoctor,
                    index: 4,
                },
                state: StaffState::OnDuty,
                show_probability: 0.9,
                arrival_time: None,
            })
            .id();

        run_arrival(&mut world, doctor);

        assert!(matches!(
            world.resource_mut::<RunFault>().take(),
            Some(SimError::StaffTransition { .. })
        ));
        assert_eq!(world.resource::<ResourceLedger>().capacity(ResourcePool::Ed), 20);
    }
}
