// src/world/random.rs
//! Seeded linear congruential stream. Every draw that has to reproduce from a
//! world seed (layout, building dimensions, scatter, player spawn) comes from here.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::core::WorldSeed;

const MULTIPLIER: u64 = 9301;
const INCREMENT: u64 = 49297;
const MODULUS: u64 = 233_280;

/// Upper bound (exclusive) of seeds drawn when no fixed seed is configured.
pub const RANDOM_SEED_RANGE: u64 = 10_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeededStream {
    seed: u64,
    state: u64,
}

impl SeededStream {
    pub fn new(seed: u64) -> Self {
        Self { seed, state: seed % MODULUS }
    }

    pub fn from_seed(seed: WorldSeed) -> Self { Self::new(seed.0) }

    pub fn seed(&self) -> u64 { self.seed }

    /// Rewind to the start of the sequence for `seed`.
    pub fn reseed(&mut self, seed: u64) {
        *self = Self::new(seed);
    }

    /// Next value in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        self.state = (self.state * MULTIPLIER + INCREMENT) % MODULUS;
        (self.state as f64 / MODULUS as f64) as f32
    }

    /// Uniform in `[min, max)`.
    #[inline]
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Uniform in `[-0.5, 0.5)`.
    #[inline]
    pub fn centered(&mut self) -> f32 { self.next_f32() - 0.5 }

    /// True when the next draw lands above `threshold`.
    #[inline]
    pub fn above(&mut self, threshold: f32) -> bool { self.next_f32() > threshold }

    /// True when the next draw lands below `p`.
    #[inline]
    pub fn chance(&mut self, p: f32) -> bool { self.next_f32() < p }

    /// Integer in `[min, min + span)`.
    pub fn int(&mut self, min: u32, span: u32) -> u32 {
        min + (self.next_f32() * span as f32) as u32
    }

    /// Index into a non-empty slice of `len` items.
    pub fn index(&mut self, len: usize) -> usize {
        ((self.next_f32() * len as f32) as usize).min(len.saturating_sub(1))
    }

    pub fn pick<T: Copy>(&mut self, pool: &[T]) -> Option<T> {
        if pool.is_empty() {
            return None;
        }
        Some(pool[self.index(pool.len())])
    }

    pub fn angle(&mut self) -> f32 { self.next_f32() * std::f32::consts::TAU }
}

/// Draw a fresh session seed from thread entropy.
pub fn random_seed() -> WorldSeed {
    WorldSeed(rand::rng().random_range(0..RANDOM_SEED_RANGE))
}

/// Deterministic sub-stream for one purpose, mixed from the world seed and a salt.
#[inline]
pub fn substream(seed: WorldSeed, salt: u64) -> ChaCha8Rng {
    let mix = seed.0 ^ (salt << 32) ^ 0x9E37_79B9_7F4A_7C15u64;
    ChaCha8Rng::seed_from_u64(mix)
}
