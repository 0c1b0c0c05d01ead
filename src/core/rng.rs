//! The single random source
//!
//! Every probabilistic decision (breakage, misfire, jam, skill checks,
//! body-part re-rolls) draws from one injected generator so that a fixed
//! seed reproduces a fight exactly.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Build the seeded generator used by the world
pub fn seeded(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Roll against a probability in [0, 1].
///
/// A chance of zero or less never succeeds; one or more always does.
pub fn roll(rng: &mut dyn RngCore, chance: f64) -> bool {
    if chance <= 0.0 {
        return false;
    }
    if chance >= 1.0 {
        return true;
    }
    rng.gen::<f64>() < chance
}

/// Roll a percentile die (1-100 inclusive)
///
/// Drawn from a unit float rather than `gen_range` so that constant mock
/// generators cannot trap the rejection loop.
pub fn percentile(rng: &mut dyn RngCore) -> u32 {
    let unit: f64 = rng.gen();
    ((unit * 100.0) as u32 + 1).min(100)
}

/// Uniform float in [0, 1)
pub fn unit(rng: &mut dyn RngCore) -> f64 {
    rng.gen()
}
