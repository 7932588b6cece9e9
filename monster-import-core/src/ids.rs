//! Identifiers for freshly created records.

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// Length of a host document id.
pub const ID_LENGTH: usize = 16;

/// Hands out random 16-character alphanumeric ids, never repeating one it
/// has already issued. Create one per parse.
#[derive(Debug)]
pub struct IdGenerator {
    rng: StdRng,
    issued: HashSet<String>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            issued: HashSet::new(),
        }
    }

    /// Deterministic ids for tests and reproducible imports.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            issued: HashSet::new(),
        }
    }

    pub fn next_id(&mut self) -> String {
        loop {
            let id: String = (&mut self.rng)
                .sample_iter(&Alphanumeric)
                .take(ID_LENGTH)
                .map(char::from)
                .collect();
            if self.issued.insert(id.clone()) {
                return id;
            }
        }
    }

    pub fn issued(&self) -> usize {
        self.issued.len()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
