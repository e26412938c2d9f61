//! Deterministic random number generation.
//!
//! RULE: Nothing in the engine or in chain producers may call a platform
//! RNG. All randomness flows through SeededRng instances derived from the
//! master seed in `EngineConfig`.
//!
//! Each entity gets its own stream, seeded from (master_seed XOR mixed
//! entity id). Adding entities never changes existing entities' streams.

use crate::types::EntityId;
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for a single entity.
pub struct SeededRng {
    pub name: String,
    inner: Pcg64Mcg,
}

impl SeededRng {
    pub fn new(master_seed: u64, stream: u64) -> Self {
        let derived_seed = master_seed ^ (stream.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: format!("stream-{stream}"),
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a float in [low, high).
    pub fn range(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// Hands out per-entity streams for one engine run.
#[derive(Debug, Clone, Copy)]
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn seed(&self) -> u64 {
        self.master_seed
    }

    pub fn for_entity(&self, entity: EntityId) -> SeededRng {
        SeededRng::new(self.master_seed, entity.0).with_name(entity.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let bank = RngBank::new(42);
        let mut a = bank.for_entity(EntityId(3));
        let mut b = bank.for_entity(EntityId(3));
        for _ in 0..16 {
            assert_eq!(a.next_u64_below(1000), b.next_u64_below(1000));
        }
    }

    #[test]
    fn entities_get_distinct_streams() {
        let bank = RngBank::new(42);
        let a: Vec<u64> = {
            let mut rng = bank.for_entity(EntityId(1));
            (0..8).map(|_| rng.next_u64_below(u64::MAX)).collect()
        };
        let b: Vec<u64> = {
            let mut rng = bank.for_entity(EntityId(2));
            (0..8).map(|_| rng.next_u64_below(u64::MAX)).collect()
        };
        assert_ne!(a, b);
    }

    #[test]
    fn range_stays_in_bounds() {
        let mut rng = RngBank::new(7).for_entity(EntityId(1));
        for _ in 0..100 {
            let x = rng.range(0.5, 1.5);
            assert!((0.5..1.5).contains(&x));
        }
    }
}
