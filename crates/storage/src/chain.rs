//! Chain records: the genesis and latest confirmed block.
//!
//! Stored under well-known keys in the default keyspace. The consensus
//! layer reads these through its chain façade; only the block-confirmation
//! path writes them.

use crate::backend::{RocksDbStorage, StorageError};
use isaac_types::Block;

const KEY_GENESIS: &str = "block-genesis";
const KEY_LATEST: &str = "block-latest";

impl RocksDbStorage {
    /// Whether this database has been bootstrapped with a genesis block.
    pub fn has_genesis(&self) -> Result<bool, StorageError> {
        self.has(KEY_GENESIS)
    }

    /// Persist the genesis block and make it the latest block.
    ///
    /// Fails if a genesis is already present; bootstrapping happens exactly
    /// once per database.
    pub fn bootstrap_genesis(&self, block: &Block) -> Result<(), StorageError> {
        self.put_new(KEY_GENESIS, block)?;
        self.put(KEY_LATEST, block)
    }

    /// The genesis block.
    pub fn genesis_block(&self) -> Result<Block, StorageError> {
        self.get(KEY_GENESIS)
    }

    /// The latest confirmed block.
    pub fn latest_block(&self) -> Result<Block, StorageError> {
        self.get(KEY_LATEST)
    }

    /// Advance the latest confirmed block.
    pub fn set_latest_block(&self, block: &Block) -> Result<(), StorageError> {
        self.put(KEY_LATEST, block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn bootstrap_then_advance() {
        let dir = TempDir::new().unwrap();
        let st = RocksDbStorage::open(dir.path()).unwrap();

        assert!(!st.has_genesis().unwrap());
        assert!(matches!(
            st.latest_block().unwrap_err(),
            StorageError::NotFound(_)
        ));

        let genesis = Block::genesis(b"test-net", Utc::now());
        st.bootstrap_genesis(&genesis).unwrap();

        assert!(st.has_genesis().unwrap());
        assert_eq!(st.genesis_block().unwrap(), genesis);
        assert_eq!(st.latest_block().unwrap(), genesis);

        let next = Block {
            height: 2,
            hash: "next".into(),
            total_txs: 3,
            total_ops: 5,
            confirmed: Utc::now().to_rfc3339(),
        };
        st.set_latest_block(&next).unwrap();
        assert_eq!(st.latest_block().unwrap(), next);
        // Genesis stays put.
        assert_eq!(st.genesis_block().unwrap(), genesis);
    }

    #[test]
    fn double_bootstrap_is_rejected() {
        let dir = TempDir::new().unwrap();
        let st = RocksDbStorage::open(dir.path()).unwrap();

        let genesis = Block::genesis(b"test-net", Utc::now());
        st.bootstrap_genesis(&genesis).unwrap();
        assert!(matches!(
            st.bootstrap_genesis(&genesis).unwrap_err(),
            StorageError::AlreadyExists(_)
        ));
    }
}
