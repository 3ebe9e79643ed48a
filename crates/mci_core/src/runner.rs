//! Simulation runner: advances the clock and routes events into the ECS.
//!
//! Clock progression and event routing happen here, outside systems. Each step
//! pops the next event from [SimulationClock], inserts it as [CurrentEvent],
//! then runs the schedule. [SimulationRun] drives one complete horizon.

use std::sync::atomic::{AtomicBool, Ordering};

use bevy_ecs::prelude::{Res, Resource, Schedule, World};
use bevy_ecs::schedule::{apply_deferred, IntoSystemConfigs};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{CurrentEvent, Event, EventKind, SimulationClock};
use crate::distributions::{RandomStream, LCG_MODULUS};
use crate::ecs::Patient;
use crate::error::{SimError, SimResult};
use crate::scenario::{build_scenario, ScenarioConfig, SimulationEndTime};
use crate::systems::{
    patient_flow::{patient_arrival_system, patient_transition_system},
    staff_arrival::staff_arrival_system,
    telemetry_snapshot::capture_snapshot_system,
    RunFault,
};
use crate::telemetry::{
    bottleneck_episodes, BottleneckEpisode, DeathLog, DeathRecord, SimSnapshot, SimSnapshots,
};

fn is_patient_arrival(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::PatientArrival)
        .unwrap_or(false)
}

fn is_patient_transition(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| matches!(e.0.kind, EventKind::PatientTransition(_)))
        .unwrap_or(false)
}

fn is_staff_arrival(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| matches!(e.0.kind, EventKind::StaffArrival(_)))
        .unwrap_or(false)
}

fn is_snapshot_tick(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::SnapshotTick)
        .unwrap_or(false)
}

/// Builds the simulation schedule: one system per event kind plus [apply_deferred]
/// so that patients spawned by an arrival exist before their first transition.
pub fn simulation_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            patient_arrival_system.run_if(is_patient_arrival),
            patient_transition_system.run_if(is_patient_transition),
            staff_arrival_system.run_if(is_staff_arrival),
            capture_snapshot_system.run_if(is_snapshot_tick),
            apply_deferred,
        )
            .chain(),
    );
    schedule
}

/// Pops the next event unless the clock is empty or the event lies beyond
/// [SimulationEndTime] (when that resource is present).
fn pop_due_event(world: &mut World) -> Option<Event> {
    let stop_at = world.get_resource::<SimulationEndTime>().map(|e| e.0);
    let mut clock = world.get_resource_mut::<SimulationClock>()?;
    if let (Some(end), Some(ts)) = (stop_at, clock.next_event_time()) {
        if ts > end {
            return None;
        }
    }
    clock.pop_next()
}

/// Runs one simulation step: pops the next event, inserts it as [CurrentEvent], then runs the schedule.
/// Returns `true` if an event was processed.
pub fn run_next_event(world: &mut World, schedule: &mut Schedule) -> bool {
    let Some(event) = pop_due_event(world) else {
        return false;
    };
    world.insert_resource(CurrentEvent(event));
    schedule.run(world);
    true
}

/// Runs one simulation step and invokes `hook` after the schedule completes.
pub fn run_next_event_with_hook<F>(world: &mut World, schedule: &mut Schedule, mut hook: F) -> bool
where
    F: FnMut(&World, &Event),
{
    let Some(event) = pop_due_event(world) else {
        return false;
    };
    world.insert_resource(CurrentEvent(event));
    schedule.run(world);
    hook(world, &event);
    true
}

/// Runs simulation steps until the event queue is empty or `max_steps` is reached.
/// Returns the number of steps executed.
pub fn run_until_empty(world: &mut World, schedule: &mut Schedule, max_steps: usize) -> usize {
    let mut steps = 0;
    while steps < max_steps && run_next_event(world, schedule) {
        steps += 1;
    }
    steps
}

/// Runs simulation steps until empty and invokes `hook` after each step.
pub fn run_until_empty_with_hook<F>(
    world: &mut World,
    schedule: &mut Schedule,
    max_steps: usize,
    mut hook: F,
) -> usize
where
    F: FnMut(&World, &Event),
{
    let mut steps = 0;
    while steps < max_steps && run_next_event_with_hook(world, schedule, &mut hook) {
        steps += 1;
    }
    steps
}

/// Schedules every snapshot tick up to and including the horizon, then the
/// patient arrivals of each minute in `[0, horizon)`.
///
/// Ticks go first so that a snapshot observes the state before same-time
/// arrivals. Returns the number of arrivals scheduled.
pub fn schedule_demand(world: &mut World) -> SimResult<u64> {
    let config = world
        .get_resource::<ScenarioConfig>()
        .ok_or(SimError::MissingResource("ScenarioConfig"))?
        .clone();
    let horizon = config.horizon_minutes();

    let ticks = (horizon / config.snapshot_interval).floor() as u64;
    {
        let mut clock = world
            .get_resource_mut::<SimulationClock>()
            .ok_or(SimError::MissingResource("SimulationClock"))?;
        for k in 0..=ticks {
            clock.schedule_at(k as f64 * config.snapshot_interval, EventKind::SnapshotTick)?;
        }
    }

    let mut arrivals = 0;
    let mut minute = 0u64;
    while (minute as f64) < horizon {
        let at = minute as f64;
        let count = world
            .get_resource_mut::<RandomStream>()
            .ok_or(SimError::MissingResource("RandomStream"))?
            .poisson(config.arrival_rate_at(at))?;
        let mut clock = world
            .get_resource_mut::<SimulationClock>()
            .ok_or(SimError::MissingResource("SimulationClock"))?;
        for _ in 0..count {
            clock.schedule_at(at, EventKind::PatientArrival)?;
        }
        arrivals += count;
        minute += 1;
    }
    debug!(snapshots = ticks + 1, arrivals, "demand scheduled");
    Ok(arrivals)
}

/// Lifecycle of a [SimulationRun]. Also kept in the world as a resource, so
/// hooks can read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Resource)]
pub enum RunPhase {
    Initializing,
    Scheduling,
    Draining,
    Complete,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub seed: u64,
    pub snapshots: Vec<SimSnapshot>,
    /// Red intervals derived from `snapshots`, ordered by start.
    pub bottlenecks: Vec<BottleneckEpisode>,
    pub deaths: Vec<DeathRecord>,
    /// Every generated patient, ordered by id.
    pub patients: Vec<Patient>,
    pub events_processed: u64,
    pub final_time: f64,
    /// Base draws consumed from the run's random stream.
    pub random_draws: u64,
}

impl RunOutput {
    pub fn discharged(&self) -> usize {
        self.patients.iter().filter(|p| p.is_discharged()).count()
    }

    pub fn in_flow(&self) -> usize {
        self.patients.iter().filter(|p| !p.is_terminal()).count()
    }
}

/// One simulation horizon over its own [World].
///
/// [SimulationRun::run] does everything at once. The stepwise API
/// ([SimulationRun::schedule], [SimulationRun::drain],
/// [SimulationRun::into_output]) exposes the phases in between.
pub struct SimulationRun {
    world: World,
    schedule: Schedule,
    seed: u64,
    events_processed: u64,
}

impl SimulationRun {
    /// Validates `config` and initializes the world (resources, staff roster).
    pub fn new(config: &ScenarioConfig, seed: u64) -> SimResult<Self> {
        let mut world = World::new();
        build_scenario(&mut world, config, seed)?;
        world.insert_resource(RunPhase::Initializing);
        Ok(Self {
            world,
            schedule: simulation_schedule(),
            seed,
            events_processed: 0,
        })
    }

    pub fn phase(&self) -> RunPhase {
        self.world
            .get_resource::<RunPhase>()
            .copied()
            .unwrap_or(RunPhase::Initializing)
    }

    fn set_phase(&mut self, phase: RunPhase) {
        self.world.insert_resource(phase);
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Schedules snapshot ticks and arrivals for the horizon and moves the run
    /// to [RunPhase::Draining]. Returns the number of arrivals; does nothing
    /// once the run is past [RunPhase::Initializing].
    pub fn schedule(&mut self) -> SimResult<u64> {
        if self.phase() != RunPhase::Initializing {
            return Ok(0);
        }
        let scenario = self.world.resource::<ScenarioConfig>().scenario;
        info!(seed = self.seed, scenario = scenario.as_str(), "simulation run started");

        self.set_phase(RunPhase::Scheduling);
        let arrivals = schedule_demand(&mut self.world)?;
        self.set_phase(RunPhase::Draining);
        Ok(arrivals)
    }

    /// Processes events until the clock is exhausted (or the end time is
    /// reached), invoking `hook` after each one, then moves the run to
    /// [RunPhase::Complete]. Schedules demand first if that has not happened.
    ///
    /// With `cancel` set the run stops between events with
    /// [SimError::Cancelled] and stays in [RunPhase::Draining].
    pub fn drain<F>(&mut self, cancel: Option<&AtomicBool>, mut hook: F) -> SimResult<u64>
    where
        F: FnMut(&World, &Event),
    {
        self.schedule()?;
        let before = self.events_processed;
        loop {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(SimError::Cancelled);
            }
            if !run_next_event_with_hook(&mut self.world, &mut self.schedule, &mut hook) {
                break;
            }
            self.events_processed += 1;
            if let Some(err) = self.world.resource_mut::<RunFault>().take() {
                return Err(err);
            }
        }
        self.set_phase(RunPhase::Complete);
        Ok(self.events_processed - before)
    }

    pub fn run(self) -> SimResult<RunOutput> {
        self.run_with_hook(None, |_, _| {})
    }

    /// Like [SimulationRun::run], but gives up with [SimError::Cancelled] once
    /// `cancel` is set. The flag is polled between events.
    pub fn run_with_cancel(self, cancel: &AtomicBool) -> SimResult<RunOutput> {
        self.run_with_hook(Some(cancel), |_, _| {})
    }

    /// Runs to completion, invoking `hook` after every processed event.
    pub fn run_with_hook<F>(mut self, cancel: Option<&AtomicBool>, hook: F) -> SimResult<RunOutput>
    where
        F: FnMut(&World, &Event),
    {
        self.drain(cancel, hook)?;
        Ok(self.into_output())
    }

    /// Collects the run's results out of the world.
    pub fn into_output(mut self) -> RunOutput {
        let snapshots = std::mem::take(&mut self.world.resource_mut::<SimSnapshots>().snapshots);
        let deaths = std::mem::take(&mut self.world.resource_mut::<DeathLog>().records);
        let mut patients: Vec<Patient> = self
            .world
            .query::<&Patient>()
            .iter(&self.world)
            .cloned()
            .collect();
        patients.sort_by_key(|p| p.id);

        let rng = self.world.resource::<RandomStream>();
        let random_draws = rng.draws();
        if rng.exceeded_period() {
            warn!(
                seed = self.seed,
                draws = random_draws,
                period = LCG_MODULUS,
                "lcg stream wrapped its period; use the splitmix64 generator for independent replications"
            );
        }

        let output = RunOutput {
            seed: self.seed,
            bottlenecks: bottleneck_episodes(&snapshots),
            snapshots,
            deaths,
            patients,
            events_processed: self.events_processed,
            final_time: self.world.resource::<SimulationClock>().now(),
            random_draws,
        };
        info!(
            seed = self.seed,
            events = output.events_processed,
            patients = output.patients.len(),
            deaths = output.deaths.len(),
            "simulation run complete"
        );
        output
    }
}
