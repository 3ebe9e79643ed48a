//! Per-transition mortality check.
//!
//! The risk is flat: it ignores node congestion, severity class and location.

use bevy_ecs::prelude::Resource;

use crate::distributions::RandomStream;

pub const DEFAULT_MORTALITY_RATE: f64 = 0.01;
pub const OVERLOAD_REASON: &str = "Overload";

#[derive(Debug, Clone, PartialEq, Resource)]
pub struct MortalityModel {
    pub rate: f64,
    pub reason: String,
}

impl Default for MortalityModel {
    fn default() -> Self {
        Self::flat(DEFAULT_MORTALITY_RATE)
    }
}

impl MortalityModel {
    pub fn flat(rate: f64) -> Self {
        Self {
            rate,
            reason: OVERLOAD_REASON.to_string(),
        }
    }

    /// Consumes exactly one draw; `true` means the patient dies now.
    pub fn patient_dies(&self, rng: &mut RandomStream) -> bool {
        rng.next_f64() < self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_never_kills_but_still_draws() {
        let model = MortalityModel::flat(0.0);
        let mut rng = RandomStream::new(5);
        assert!((0..1000).all(|_| !model.patient_dies(&mut rng)));
        assert_eq!(rng.draws(), 1000);
    }

    #[test]
    fn certain_death_rate() {
        let model = MortalityModel::flat(1.0);
        let mut rng = RandomStream::new(5);
        assert!(model.patient_dies(&mut rng));
    }

    #[test]
    fn default_rate_is_about_one_percent() {
        let model = MortalityModel::default();
        let mut rng = RandomStream::new(2024);
        let deaths = (0..100_000).filter(|_| model.patient_dies(&mut rng)).count();
        assert!((700..1300).contains(&deaths), "deaths {deaths}");
    }
}
