pub mod patient_flow;
pub mod staff_arrival;
pub mod telemetry_snapshot;

use bevy_ecs::prelude::Resource;

use crate::error::SimError;

pub use patient_flow::PatientCounter;

/// First error raised by a system during the current run.
///
/// Systems cannot return errors to the schedule, so they park them here and
/// the runner aborts the run after the step that recorded one.
#[derive(Debug, Default, Resource)]
pub struct RunFault(Option<SimError>);

impl RunFault {
    pub fn record(&mut self, err: SimError) {
        if self.0.is_none() {
            self.0 = Some(err);
        }
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    pub fn take(&mut self) -> Option<SimError> {
        self.0.take()
    }
}
