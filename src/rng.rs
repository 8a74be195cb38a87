//! Injected randomness
//!
//! Trace-number suffixes, identification numbers and micro-deposit amounts
//! all draw from a [`RandomSource`] handed in by the caller. Production code
//! uses [`ThreadRandom`]; tests use [`SeededRandom`] to replay a sequence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Source of pseudo-random values.
pub trait RandomSource: Send + Sync {
    /// Next raw 64-bit value
    fn next_u64(&self) -> u64;

    /// Value in `[min, max)`. Returns `min` when the range is empty.
    fn range(&self, min: u64, max: u64) -> u64 {
        if max <= min {
            return min;
        }
        min + self.next_u64() % (max - min)
    }
}

/// Thread-local OS-seeded generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_u64(&self) -> u64 {
        rand::thread_rng().r#gen()
    }

    fn range(&self, min: u64, max: u64) -> u64 {
        if max <= min {
            return min;
        }
        rand::thread_rng().gen_range(min..max)
    }
}

/// Deterministic generator: same seed, same sequence.
#[derive(Debug)]
pub struct SeededRandom {
    inner: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_u64(&self) -> u64 {
        match self.inner.lock() {
            Ok(mut rng) => rng.r#gen(),
            Err(poisoned) => poisoned.into_inner().r#gen(),
        }
    }
}

/// Fixed sequence of values, cycled. Useful when a test needs exact draws.
#[derive(Debug)]
pub struct ScriptedRandom {
    values: Vec<u64>,
    cursor: Mutex<usize>,
}

impl ScriptedRandom {
    pub fn new(values: Vec<u64>) -> Self {
        Self {
            values,
            cursor: Mutex::new(0),
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn next_u64(&self) -> u64 {
        if self.values.is_empty() {
            return 0;
        }
        let mut cursor = match self.cursor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let value = self.values[*cursor % self.values.len()];
        *cursor += 1;
        value
    }
}
