//! Random sampling helpers for the simulation.

use ispy_shared::config::UnitRange;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

// Stream offsets keep seeded generators for different holders independent
pub const STREAM_ORCHESTRATOR: u64 = 1;
pub const STREAM_PROVIDER: u64 = 2;
pub const STREAM_ASSISTANT: u64 = 3;
pub const STREAM_DEVICES: u64 = 4;
pub const STREAM_ANALYTICS: u64 = 5;

/// Seeded generator when a seed is configured, entropy otherwise
pub fn make_rng(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => {
            let mixed = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(stream);
            StdRng::seed_from_u64(mixed)
        }
        None => StdRng::from_entropy(),
    }
}

/// Uniform sample in `[min, max)`
pub fn sample_range(rng: &mut impl Rng, range: UnitRange) -> f64 {
    if range.max <= range.min {
        return range.min;
    }
    rng.gen_range(range.min..range.max)
}

/// Lock a std mutex, recovering the data if a holder panicked
pub fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
