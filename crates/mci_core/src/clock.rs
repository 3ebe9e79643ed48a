use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bevy_ecs::prelude::{Entity, Resource};

use crate::error::ClockError;

/// Simulation time is measured in minutes from the earthquake.
pub const MINUTES_PER_HOUR: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Generate one new patient at the event time.
    PatientArrival,
    /// Advance the patient to the next node of its route.
    PatientTransition(Entity),
    /// A staff member reaches the hospital and goes on duty.
    StaffArrival(Entity),
    /// Record a metrics snapshot.
    SnapshotTick,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub timestamp: f64,
    /// Insertion order; breaks ties between same-time events.
    pub sequence: u64,
    pub kind: EventKind,
}

impl Eq for Event {}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by (timestamp, sequence).
        other
            .timestamp
            .total_cmp(&self.timestamp)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The event being processed in the current runner step.
#[derive(Debug, Clone, Copy, Resource)]
pub struct CurrentEvent(pub Event);

#[derive(Debug, Default, Resource)]
pub struct SimulationClock {
    now: f64,
    next_sequence: u64,
    events: BinaryHeap<Event>,
}

impl SimulationClock {
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Schedules `kind` at absolute time `at` (minutes).
    pub fn schedule_at(&mut self, at: f64, kind: EventKind) -> Result<Event, ClockError> {
        if !at.is_finite() {
            return Err(ClockError::NonFinite(at));
        }
        if at < self.now {
            return Err(ClockError::InThePast { at, now: self.now });
        }
        let event = Event {
            timestamp: at,
            sequence: self.next_sequence,
            kind,
        };
        self.next_sequence += 1;
        self.events.push(event);
        Ok(event)
    }

    /// Schedules `kind` `delay` minutes after the current time.
    pub fn schedule_in(&mut self, delay: f64, kind: EventKind) -> Result<Event, ClockError> {
        self.schedule_at(self.now + delay, kind)
    }

    pub fn pop_next(&mut self) -> Option<Event> {
        let event = self.events.pop()?;
        debug_assert!(event.timestamp >= self.now, "time moved backward");
        self.now = event.timestamp;
        Some(event)
    }

    pub fn next_event_time(&self) -> Option<f64> {
        self.events.peek().map(|e| e.timestamp)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
