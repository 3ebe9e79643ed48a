//! Patient generation and the per-step routing state machine.

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut, Resource};

use crate::clock::{CurrentEvent, EventKind, SimulationClock};
use crate::distributions::RandomStream;
use crate::ecs::{FacilityNode, InjuryType, Patient, PatientId, PatientOutcome};
use crate::error::{SimError, SimResult};
use crate::mortality::MortalityModel;
use crate::routing::{Route, MAX_STEP_MINUTES, MIN_STEP_MINUTES};
use crate::systems::RunFault;
use crate::telemetry::{DeathLog, DeathRecord, NodeStats};

/// Hands out patient ids in generation order, starting at 0.
#[derive(Debug, Default, Resource)]
pub struct PatientCounter {
    next: u64,
}

impl PatientCounter {
    pub fn next_id(&mut self) -> PatientId {
        let id = PatientId(self.next);
        self.next += 1;
        id
    }

    /// Patients generated so far.
    pub fn total(&self) -> u64 {
        self.next
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    Moved { to: FacilityNode, next_step_at: f64 },
    Died,
    Discharged,
}

/// Mutable run state a routing step touches.
pub struct FlowContext<'a> {
    pub clock: &'a mut SimulationClock,
    pub rng: &'a mut RandomStream,
    pub mortality: &'a MortalityModel,
    pub stats: &'a mut NodeStats,
    pub deaths: &'a mut DeathLog,
}

/// Advances `patient` by one step at the current clock time.
///
/// Draw order: mortality (skipped at exit nodes), then the branch draw if the
/// node branches, then the duration of the next step.
pub fn step_patient(
    entity: Entity,
    patient: &mut Patient,
    ctx: &mut FlowContext<'_>,
) -> SimResult<StepOutcome> {
    if patient.is_terminal() {
        return Err(SimError::PatientTerminal(patient.id));
    }
    let now = ctx.clock.now();
    let node = patient.current_node;
    let route = node.route();

    if route == Route::Exit {
        return discharge(patient, ctx.stats, now);
    }

    if ctx.mortality.patient_dies(ctx.rng) {
        patient.outcome = PatientOutcome::Dead {
            at: now,
            location: node,
            reason: ctx.mortality.reason.clone(),
        };
        ctx.deaths.records.push(DeathRecord {
            patient_id: patient.id,
            time: now,
            location: node,
            reason: ctx.mortality.reason.clone(),
        });
        ctx.stats.record_death(node);
        ctx.stats.leave(node)?;
        return Ok(StepOutcome::Died);
    }

    let Some(next) = route.resolve(ctx.rng) else {
        return discharge(patient, ctx.stats, now);
    };

    let dwell = now - patient.entered_node_at;
    ctx.stats.record_wait(node, dwell);
    if node.is_waiting_area() {
        patient.total_wait_time += dwell;
    }
    match node {
        FacilityNode::Ward => patient.los_ward = Some(dwell),
        FacilityNode::Icu => patient.los_icu = Some(dwell),
        _ => {}
    }

    ctx.stats.leave(node)?;
    ctx.stats.enter(next);
    patient.current_node = next;
    patient.entered_node_at = now;
    patient.path.push(next);

    let duration = ctx.rng.uniform(MIN_STEP_MINUTES, MAX_STEP_MINUTES)?;
    let event = ctx
        .clock
        .schedule_in(duration, EventKind::PatientTransition(entity))?;
    Ok(StepOutcome::Moved {
        to: next,
        next_step_at: event.timestamp,
    })
}

fn discharge(patient: &mut Patient, stats: &mut NodeStats, now: f64) -> SimResult<StepOutcome> {
    patient.outcome = PatientOutcome::Discharged { at: now };
    stats.leave(patient.current_node)?;
    Ok(StepOutcome::Discharged)
}

/// Creates a patient at `arrival` and takes its first step.
///
/// Draws the injury type, then the severity score, then whatever the first
/// step needs.
pub fn admit_patient(
    entity: Entity,
    counter: &mut PatientCounter,
    ctx: &mut FlowContext<'_>,
) -> SimResult<Patient> {
    let now = ctx.clock.now();
    let injury_type = InjuryType::from_unit(ctx.rng.next_f64());
    let severity = ctx.rng.uniform(0.0, 1.0)?;
    let mut patient = Patient::new(counter.next_id(), now, injury_type, severity);
    ctx.stats.enter(FacilityNode::Arrival);
    step_patient(entity, &mut patient, ctx)?;
    Ok(patient)
}

#[allow(clippy::too_many_arguments)]
pub fn patient_arrival_system(
    mut commands: Commands,
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    mut rng: ResMut<RandomStream>,
    mortality: Res<MortalityModel>,
    mut stats: ResMut<NodeStats>,
    mut deaths: ResMut<DeathLog>,
    mut counter: ResMut<PatientCounter>,
    mut fault: ResMut<RunFault>,
) {
    if event.0.kind != EventKind::PatientArrival {
        return;
    }

    let mut ctx = FlowContext {
        clock: &mut clock,
        rng: &mut rng,
        mortality: &mortality,
        stats: &mut stats,
        deaths: &mut deaths,
    };
    let entity = commands.spawn_empty().id();
    match admit_patient(entity, &mut counter, &mut ctx) {
        Ok(patient) => {
            commands.entity(entity).insert(patient);
        }
        Err(err) => fault.record(err),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn patient_transition_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    mut rng: ResMut<RandomStream>,
    mortality: Res<MortalityModel>,
    mut stats: ResMut<NodeStats>,
    mut deaths: ResMut<DeathLog>,
    mut patients: Query<&mut Patient>,
    mut fault: ResMut<RunFault>,
) {
    let EventKind::PatientTransition(entity) = event.0.kind else {
        return;
    };
    let Ok(mut patient) = patients.get_mut(entity) else {
        fault.record(SimError::MissingEntity("Patient"));
        return;
    };

    let mut ctx = FlowContext {
        clock: &mut clock,
        rng: &mut rng,
        mortality: &mortality,
        stats: &mut stats,
        deaths: &mut deaths,
    };
    if let Err(err) = step_patient(entity, &mut patient, &mut ctx) {
        fault.record(err);
    }
}
