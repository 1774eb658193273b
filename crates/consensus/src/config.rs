//! Consensus configuration.

use isaac_types::Address;
use std::time::Duration;

/// Configuration parameters for the ISAAC state manager.
#[derive(Debug, Clone)]
pub struct IsaacConfig {
    /// Network identifier mixed into every signature.
    pub network_id: Vec<u8>,

    /// Target block cadence the pacer converges on.
    pub block_time: Duration,

    /// How long to wait in INIT for a proposal before voting EXP.
    pub timeout_init: Duration,
    /// How long to wait in SIGN for agreement before voting EXP.
    pub timeout_sign: Duration,
    /// How long to wait in ACCEPT before advancing the round.
    pub timeout_accept: Duration,

    /// Maximum operations per transaction. Enforced upstream of this crate;
    /// carried here so proposal and test code share one source of truth.
    pub ops_limit: usize,

    /// Account receiving collected fees and inflation.
    pub common_account: Address,
    /// Initial currency supply; the inflation operation derives from it.
    pub initial_balance: u64,
}

impl Default for IsaacConfig {
    fn default() -> Self {
        Self {
            network_id: Vec::new(),
            block_time: Duration::from_secs(5),
            timeout_init: Duration::from_secs(2),
            timeout_sign: Duration::from_secs(2),
            timeout_accept: Duration::from_secs(2),
            ops_limit: 1000,
            common_account: Address::new(""),
            initial_balance: 0,
        }
    }
}
