// tandem_sim/src/simulation/core/prng.rs

use rand::rngs::OsRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A newtype wrapper around `ChaCha8Rng`.
/// This is the central, deterministic pseudo-random number generator of a scenario run.
pub struct ScenarioRng(pub ChaCha8Rng);

impl ScenarioRng {
    /// Seeds from `seed`, or draws a fresh seed from the OS when absent.
    ///
    /// # Returns
    /// The generator and the seed it was built from, so the run can be reproduced.
    pub fn new(seed: Option<u64>) -> (Self, u64) {
        let seed = seed.unwrap_or_else(|| OsRng.next_u64());
        (Self(ChaCha8Rng::seed_from_u64(seed)), seed)
    }
}
