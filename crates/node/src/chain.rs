//! Chain façade over storage.

use crate::selector::RoundRobinSelector;
use isaac_consensus::ChainReader;
use isaac_storage::RocksDbStorage;
use isaac_types::{Address, Block};
use std::sync::Arc;

/// Consensus view of the locally persisted chain.
///
/// Reads the latest confirmed block from storage and answers proposer
/// selection from the configured validator set.
pub struct LocalChain {
    storage: Arc<RocksDbStorage>,
    selector: RoundRobinSelector,
}

impl LocalChain {
    pub fn new(storage: Arc<RocksDbStorage>, selector: RoundRobinSelector) -> Self {
        Self { storage, selector }
    }
}

impl ChainReader for LocalChain {
    /// # Panics
    ///
    /// Panics if the database has not been bootstrapped with a genesis
    /// block; [`crate::Node::new`] guarantees that before consensus starts.
    fn latest_block(&self) -> Block {
        self.storage
            .latest_block()
            .expect("genesis is bootstrapped before consensus starts")
    }

    fn select_proposer(&self, height: u64, round: u64) -> Address {
        self.selector.select(height, round)
    }
}
