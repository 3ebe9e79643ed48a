//! Seeded random stream and the samplers built on top of it.
//!
//! A run owns exactly one [RandomStream] and every stochastic decision draws
//! from it, so the order in which samplers are called is part of the model:
//! reordering two calls changes every downstream outcome. Each sampler
//! documents how many base draws it consumes.

use std::f64::consts::PI;

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::error::SamplingError;

/// LCG multiplier.
pub const LCG_MULTIPLIER: u64 = 9301;
/// LCG increment.
pub const LCG_INCREMENT: u64 = 49297;
/// LCG modulus; also the divisor that maps the state into [0, 1).
pub const LCG_MODULUS: u64 = 233_280;

const SPLITMIX_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Poisson rates at or above this use the rejection sampler.
pub const POISSON_REJECTION_THRESHOLD: f64 = 30.0;

/// Which Poisson sampler a rate is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoissonMethod {
    Multiplication,
    Rejection,
}

impl PoissonMethod {
    pub fn for_rate(lambda: f64) -> Self {
        if lambda < POISSON_REJECTION_THRESHOLD {
            PoissonMethod::Multiplication
        } else {
            PoissonMethod::Rejection
        }
    }
}

/// Base uniform generator behind a [RandomStream].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    /// `state = (state * 9301 + 49297) mod 233280`, returns `state / 233280`.
    #[default]
    Lcg,
    /// SplitMix64 counter-based generator; top 53 bits mapped to [0, 1).
    Splitmix64,
}

#[derive(Debug, Clone, Resource)]
pub struct RandomStream {
    kind: GeneratorKind,
    state: u64,
    draws: u64,
}

impl RandomStream {
    pub fn new(seed: u64) -> Self {
        Self::with_generator(seed, GeneratorKind::Lcg)
    }

    pub fn with_generator(seed: u64, kind: GeneratorKind) -> Self {
        let state = match kind {
            // (s mod M) * A + C ≡ s * A + C (mod M), and keeps the product in range.
            GeneratorKind::Lcg => seed % LCG_MODULUS,
            GeneratorKind::Splitmix64 => seed,
        };
        Self {
            kind,
            state,
            draws: 0,
        }
    }

    pub fn generator(&self) -> GeneratorKind {
        self.kind
    }

    /// Number of base draws consumed so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// True once an LCG stream has consumed more draws than its period, i.e.
    /// it has started repeating itself.
    pub fn exceeded_period(&self) -> bool {
        self.kind == GeneratorKind::Lcg && self.draws > LCG_MODULUS
    }

    /// One base draw in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.draws += 1;
        match self.kind {
            GeneratorKind::Lcg => {
                self.state = (self.state * LCG_MULTIPLIER + LCG_INCREMENT) % LCG_MODULUS;
                self.state as f64 / LCG_MODULUS as f64
            }
            GeneratorKind::Splitmix64 => {
                self.state = self.state.wrapping_add(SPLITMIX_GAMMA);
                let mut z = self.state;
                z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
                z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
                z ^= z >> 31;
                (z >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
            }
        }
    }

    /// Uniform in [min, max). One draw.
    pub fn uniform(&mut self, min: f64, max: f64) -> Result<f64, SamplingError> {
        if !min.is_finite() || !max.is_finite() || max < min {
            return Err(SamplingError::InvalidUniformRange { min, max });
        }
        Ok(min + (max - min) * self.next_f64())
    }

    /// Poisson count with rate `lambda`.
    ///
    /// Below [POISSON_REJECTION_THRESHOLD] this multiplies uniforms until the
    /// product drops to `e^-lambda` (k + 1 draws for a result of k). At or
    /// above it, a logistic proposal is rejection-sampled: each attempt costs
    /// one draw per proposal (retried while `x <= -0.5`) plus one acceptance
    /// draw.
    pub fn poisson(&mut self, lambda: f64) -> Result<u64, SamplingError> {
        if !lambda.is_finite() || lambda < 0.0 {
            return Err(SamplingError::InvalidPoissonRate(lambda));
        }

        if PoissonMethod::for_rate(lambda) == PoissonMethod::Multiplication {
            let limit = (-lambda).exp();
            let mut k: u64 = 0;
            let mut p = 1.0;
            loop {
                k += 1;
                p *= self.next_f64();
                if p <= limit {
                    break;
                }
            }
            return Ok(k - 1);
        }

        let c = 0.767 - 3.36 / lambda;
        let beta = PI / (3.0 * lambda).sqrt();
        let alpha = beta * lambda;
        let k = c.ln() - lambda - beta.ln();
        loop {
            let x = loop {
                let u = self.next_f64();
                // u == 0 gives ln(inf) and x = -inf, which is simply rejected.
                let x = (alpha - ((1.0 - u) / u).ln()) / beta;
                if x > -0.5 {
                    break x;
                }
            };
            let n = (x + 0.5).floor();
            let u = self.next_f64();
            if u < (-(k + beta * x).exp()).exp() {
                return Ok(n as u64);
            }
        }
    }

    /// Triangular via inverse CDF. One draw.
    pub fn triangular(&mut self, min: f64, mode: f64, max: f64) -> Result<f64, SamplingError> {
        let finite = min.is_finite() && mode.is_finite() && max.is_finite();
        if !finite || max <= min || mode < min || mode > max {
            return Err(SamplingError::InvalidTriangular { min, mode, max });
        }
        let u = self.next_f64();
        let split = (mode - min) / (max - min);
        let value = if u < split {
            min + (u * (max - min) * (mode - min)).sqrt()
        } else {
            max - ((1.0 - u) * (max - min) * (max - mode)).sqrt()
        };
        Ok(value)
    }

    /// Log-normal via the cosine branch of Box–Muller. Two draws, radius first.
    pub fn lognormal(&mut self, mu: f64, sigma: f64) -> Result<f64, SamplingError> {
        if !mu.is_finite() || !sigma.is_finite() || sigma < 0.0 {
            return Err(SamplingError::InvalidLogNormal { mu, sigma });
        }
        let radius = (-2.0 * self.next_f64().ln()).sqrt();
        let z = radius * (2.0 * PI * self.next_f64()).cos();
        let value = (mu + sigma * z).exp();
        if !z.is_finite() || !value.is_finite() {
            return Err(SamplingError::NonFinite("log-normal"));
        }
        Ok(value)
    }
}
