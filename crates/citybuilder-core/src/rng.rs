//! Deterministic simulation randomness.
//!
//! Every roll (roaming choices, risk chances) comes from one [`SimRng`]
//! owned by the engine. Its full state is saved, so a reloaded run rolls
//! exactly what the uninterrupted run would have.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

pub type SimRng = ChaCha8Rng;

pub fn seeded(seed: u64) -> SimRng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Internal state of a [`SimRng`], enough to resume its stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    seed: [u8; 32],
    word_pos: u128,
    stream: u64,
}

impl RngState {
    pub fn capture(rng: &SimRng) -> Self {
        Self {
            seed: rng.get_seed(),
            word_pos: rng.get_word_pos(),
            stream: rng.get_stream(),
        }
    }

    pub fn resume(&self) -> SimRng {
        let mut rng = ChaCha8Rng::from_seed(self.seed);
        rng.set_stream(self.stream);
        rng.set_word_pos(self.word_pos);
        rng
    }
}
