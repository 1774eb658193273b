//! Deterministic proposer selection.

use isaac_types::Address;

/// Round-robin proposer rotation over the sorted validator set.
///
/// Pure in `(height, round)`: every correct node configured with the same
/// validator set picks the same proposer, which is what lets
/// propose-or-wait decisions agree without communication.
#[derive(Debug, Clone)]
pub struct RoundRobinSelector {
    validators: Vec<Address>,
}

impl RoundRobinSelector {
    /// Build a selector over `validators`. Order and duplicates in the
    /// input do not matter; the set is sorted and deduplicated.
    ///
    /// # Panics
    ///
    /// Panics on an empty validator set.
    pub fn new(mut validators: Vec<Address>) -> Self {
        assert!(!validators.is_empty(), "validator set must not be empty");
        validators.sort();
        validators.dedup();
        Self { validators }
    }

    /// The proposer for `(height, round)`.
    pub fn select(&self, height: u64, round: u64) -> Address {
        let slot = height.wrapping_add(round) % self.validators.len() as u64;
        self.validators[slot as usize].clone()
    }
}
