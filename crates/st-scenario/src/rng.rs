//! Seedable scenario randomness.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Random source for sampling. Equal seeds give equal scenario sequences.
#[derive(Debug, Clone)]
pub struct ScenarioRng(pub ChaCha8Rng);

impl ScenarioRng {
    pub fn from_seed_u64(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self(ChaCha8Rng::from_entropy())
    }

    /// Seeded when a seed is given, entropy otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::from_seed_u64(seed),
            None => Self::from_entropy(),
        }
    }
}

impl RngCore for ScenarioRng {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.0.try_fill_bytes(dest)
    }
}
