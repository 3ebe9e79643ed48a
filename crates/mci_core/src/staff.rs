//! Staff roster: who is on duty, who is on the way, and what their arrival adds.

use bevy_ecs::prelude::World;
use tracing::debug;

use crate::clock::{EventKind, SimulationClock};
use crate::distributions::RandomStream;
use crate::ecs::{StaffAgent, StaffId, StaffRole, StaffState};
use crate::error::{SimError, SimResult};
use crate::resources::{ResourceLedger, ResourcePool};
use crate::scenario::Scenario;

/// Show-up probability bounds for off-duty staff.
pub const SHOW_PROBABILITY_MIN: f64 = 0.85;
pub const SHOW_PROBABILITY_MAX: f64 = 0.95;

/// Minutes from call-in to arrival, as (min, mode, max).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelTime {
    pub min: f64,
    pub mode: f64,
    pub max: f64,
}

impl StaffRole {
    pub fn headcount(self, scenario: Scenario) -> u32 {
        match scenario {
            Scenario::Daytime => 10,
            Scenario::Nighttime => 2,
        }
    }

    pub fn travel_time(self) -> TravelTime {
        let (min, mode, max) = match self {
            StaffRole::EdDoctor => (20.0, 45.0, 120.0),
            StaffRole::EdNurse => (15.0, 40.0, 100.0),
            StaffRole::Surgeon => (30.0, 60.0, 180.0),
            StaffRole::Anesthetist => (30.0, 60.0, 180.0),
            StaffRole::RadiologyTech => (30.0, 75.0, 180.0),
            StaffRole::Porter => (20.0, 50.0, 150.0),
            StaffRole::IcuNurse => (20.0, 50.0, 150.0),
            StaffRole::WardNurse => (20.0, 50.0, 150.0),
        };
        TravelTime { min, mode, max }
    }

    /// Pool that gains one unit of capacity when an agent of this role goes on duty.
    ///
    /// Only the ED roles are coupled to capacity in the current model.
    pub fn capacity_pool(self) -> Option<ResourcePool> {
        match self {
            StaffRole::EdDoctor => Some(ResourcePool::Ed),
            StaffRole::EdNurse => Some(ResourcePool::Triage),
            StaffRole::Surgeon
            | StaffRole::Anesthetist
            | StaffRole::IcuNurse
            | StaffRole::WardNurse
            | StaffRole::RadiologyTech
            | StaffRole::Porter => None,
        }
    }
}

impl StaffAgent {
    pub fn transition(&mut self, next: StaffState) -> SimResult<()> {
        if !self.state.can_become(next) {
            return Err(SimError::StaffTransition {
                agent: self.id.to_string(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

/// Spawns every staff agent for `scenario` and schedules arrivals for those who will show.
///
/// Draw order per agent (role order, then index): show-up probability, then
/// for off-duty agents the show/no-show draw and, if showing, the travel time.
pub fn spawn_roster(world: &mut World, scenario: Scenario) -> SimResult<()> {
    let on_duty_at_start = scenario == Scenario::Daytime;
    let mut agents = Vec::new();
    {
        let mut rng = world
            .get_resource_mut::<RandomStream>()
            .ok_or(SimError::MissingResource("RandomStream"))?;
        for role in StaffRole::ALL {
            for index in 0..role.headcount(scenario) {
                let show_probability = rng.uniform(SHOW_PROBABILITY_MIN, SHOW_PROBABILITY_MAX)?;
                let mut agent = StaffAgent {
                    id: StaffId { role, index },
                    state: if on_duty_at_start {
                        StaffState::OnDuty
                    } else {
                        StaffState::Home
                    },
                    show_probability,
                    arrival_time: None,
                };
                if agent.state == StaffState::Home {
                    if rng.next_f64() < show_probability {
                        let travel = role.travel_time();
                        agent.arrival_time =
                            Some(rng.triangular(travel.min, travel.mode, travel.max)?);
                        agent.transition(StaffState::Traveling)?;
                    } else {
                        agent.transition(StaffState::Unavailable)?;
                    }
                }
                agents.push(agent);
            }
        }
    }

    for agent in agents {
        let arrival_time = agent.arrival_time;
        let entity = world.spawn(agent).id();
        if let Some(at) = arrival_time {
            world
                .get_resource_mut::<SimulationClock>()
                .ok_or(SimError::MissingResource("SimulationClock"))?
                .schedule_at(at, EventKind::StaffArrival(entity))?;
        }
    }
    Ok(())
}

/// Puts a travelling agent on duty and credits the coupled pool.
pub fn report_for_duty(agent: &mut StaffAgent, ledger: &mut ResourceLedger) -> SimResult<()> {
    agent.transition(StaffState::OnDuty)?;
    if let Some(pool) = agent.id.role.capacity_pool() {
        ledger.increment(pool);
    }
    debug!(agent = %agent.id, "staff on duty");
    Ok(())
}
