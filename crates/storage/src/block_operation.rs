//! Confirmed-operation index.
//!
//! Each [`BlockOperation`] is persisted under three keys:
//!
//! ```text
//! primary : "bo-h-"   || hash
//! tx-idx  : "bo-tx-"  || tx_hash || "-" || BE(height) || BE(seq_id) || uuid
//! src-idx : "bo-src-" || source  || "-" || BE(height) || BE(seq_id) || uuid
//! ```
//!
//! `BE` is the fixed-width 8-byte big-endian encoding, so lexicographic key
//! order matches numeric order and a prefix scan replays a transaction's or
//! an account's operations in confirmation order. The trailing UUID (v7,
//! time-ordered) breaks ties between operations of the same transaction.
//!
//! The primary record is authoritative: should a crash land between the
//! primary and secondary writes, the secondaries can be re-derived from a
//! scan of the `bo-h-` prefix, and the presence check on the primary key
//! keeps a replayed save idempotent at the `BlockAlreadyExists` boundary.

use crate::backend::{ListOptions, PrefixIter, RocksDbStorage, StorageError};
use crate::observer;
use isaac_types::BlockOperation;
use tracing::warn;
use uuid::Uuid;

/// Primary key prefix: lookup by operation hash.
pub const PREFIX_HASH: &str = "bo-h-";
/// Secondary key prefix: chronological within one transaction.
pub const PREFIX_TX_HASH: &str = "bo-tx-";
/// Secondary key prefix: chronological within one source account.
pub const PREFIX_SOURCE: &str = "bo-src-";

/// The primary storage key for a block-operation hash.
pub fn block_operation_key(hash: &str) -> String {
    format!("{PREFIX_HASH}{hash}")
}

fn tx_hash_prefix(tx_hash: &str) -> String {
    format!("{PREFIX_TX_HASH}{tx_hash}-")
}

fn source_prefix(source: &str) -> String {
    format!("{PREFIX_SOURCE}{source}-")
}

/// `BE(height) || BE(sequence_id) || uuid`: sorts by confirmation order,
/// ties broken by the time-ordered unique suffix.
fn chronological_suffix(bo: &BlockOperation) -> Vec<u8> {
    let mut suffix = Vec::with_capacity(32);
    suffix.extend_from_slice(&bo.height.to_be_bytes());
    suffix.extend_from_slice(&bo.sequence_id().to_be_bytes());
    suffix.extend_from_slice(Uuid::now_v7().as_bytes());
    suffix
}

fn tx_index_key(bo: &BlockOperation) -> Vec<u8> {
    let mut key = tx_hash_prefix(&bo.tx_hash).into_bytes();
    key.extend_from_slice(&chronological_suffix(bo));
    key
}

fn source_index_key(bo: &BlockOperation) -> Vec<u8> {
    let mut key = source_prefix(bo.source.as_str()).into_bytes();
    key.extend_from_slice(&chronological_suffix(bo));
    key
}

impl RocksDbStorage {
    /// Persist a confirmed operation under its primary key and both
    /// secondary index entries, then announce it on the observer bus.
    ///
    /// Fails with [`StorageError::AlreadySaved`] when called twice on the
    /// same record and [`StorageError::BlockAlreadyExists`] when another
    /// record with the same hash is already stored; neither failure touches
    /// the store.
    pub fn save_block_operation(&self, bo: &mut BlockOperation) -> Result<(), StorageError> {
        if bo.is_saved() {
            return Err(StorageError::AlreadySaved);
        }

        let key = block_operation_key(&bo.hash);
        if self.has(&key)? {
            return Err(StorageError::BlockAlreadyExists);
        }

        self.put_new(&key, bo)?;
        self.put_new(tx_index_key(bo), &bo.hash)?;
        self.put_new(source_index_key(bo), &bo.hash)?;
        bo.mark_saved();

        let event = format!(
            "saved source-{} hash-{} txhash-{} source-type-{}{}",
            bo.source, bo.hash, bo.tx_hash, bo.source, bo.op_type,
        );
        observer::block_operations().trigger(&event, bo);

        Ok(())
    }

    /// Load a block operation by hash. The returned record is marked saved.
    pub fn block_operation(&self, hash: &str) -> Result<BlockOperation, StorageError> {
        let mut bo: BlockOperation = self.get(block_operation_key(hash))?;
        bo.mark_saved();
        Ok(bo)
    }

    /// Primary-key presence check.
    pub fn block_operation_exists(&self, hash: &str) -> Result<bool, StorageError> {
        self.has(block_operation_key(hash))
    }

    /// Cursor over the operations of one transaction, ascending in
    /// `(height, sequence_id)` confirmation order.
    pub fn block_operations_by_tx_hash(
        &self,
        tx_hash: &str,
        options: ListOptions,
    ) -> BlockOperationCursor<'_> {
        BlockOperationCursor {
            storage: self,
            entries: self.iter_prefix(tx_hash_prefix(tx_hash), options),
        }
    }

    /// Cursor over the operations of one source account, ascending in
    /// `(height, sequence_id)` confirmation order.
    pub fn block_operations_by_source(
        &self,
        source: &str,
        options: ListOptions,
    ) -> BlockOperationCursor<'_> {
        BlockOperationCursor {
            storage: self,
            entries: self.iter_prefix(source_prefix(source), options),
        }
    }
}

/// Lazy cursor resolving secondary-index entries to their primary records.
///
/// Yields `(record, raw_key)`; the raw key can be fed back as a
/// [`ListOptions::cursor`] to paginate. A secondary entry whose primary
/// record cannot be read terminates the cursor instead of raising: callers
/// detect incompleteness by comparing against the secondary entry count.
pub struct BlockOperationCursor<'a> {
    storage: &'a RocksDbStorage,
    entries: PrefixIter,
}

impl Iterator for BlockOperationCursor<'_> {
    type Item = (BlockOperation, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next()?;

        let hash: String = match serde_json::from_slice(&entry.value) {
            Ok(hash) => hash,
            Err(err) => {
                warn!(%err, "undecodable secondary index entry, stopping cursor");
                return None;
            }
        };

        match self.storage.block_operation(&hash) {
            Ok(bo) => Some((bo, entry.key)),
            Err(err) => {
                warn!(%err, hash, "missing primary record for index entry, stopping cursor");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isaac_types::{Address, OperationType};
    use tempfile::TempDir;

    fn open() -> (TempDir, RocksDbStorage) {
        let dir = TempDir::new().unwrap();
        let storage = RocksDbStorage::open(dir.path()).unwrap();
        (dir, storage)
    }

    fn record(
        op_hash: &str,
        tx_hash: &str,
        source: &str,
        height: u64,
        seq_id: u64,
    ) -> BlockOperation {
        BlockOperation::new(
            op_hash,
            tx_hash,
            OperationType::Payment,
            Address::new(source),
            br#"{"type":"payment"}"#.to_vec(),
            height,
            seq_id,
        )
    }

    fn op_hashes(cursor: BlockOperationCursor<'_>) -> Vec<String> {
        cursor.map(|(bo, _)| bo.op_hash).collect()
    }

    #[test]
    fn save_then_read_by_tx_hash_in_order() {
        let (_dir, st) = open();

        // Saved deliberately out of chronological order; the index must
        // still replay them by (height, sequence_id).
        let mut o3 = record("c", "T", "S", 11, 1);
        let mut o1 = record("a", "T", "S", 10, 1);
        let mut o2 = record("b", "T", "S", 10, 2);
        st.save_block_operation(&mut o3).unwrap();
        st.save_block_operation(&mut o1).unwrap();
        st.save_block_operation(&mut o2).unwrap();

        let cursor = st.block_operations_by_tx_hash("T", ListOptions::default());
        assert_eq!(op_hashes(cursor), vec!["a", "b", "c"]);
    }

    #[test]
    fn read_by_source_in_order_across_transactions() {
        let (_dir, st) = open();

        let mut o1 = record("a", "T1", "S", 10, 1);
        let mut o2 = record("b", "T2", "S", 10, 2);
        let mut o3 = record("c", "T3", "S", 12, 1);
        let mut other = record("d", "T4", "OTHER", 9, 1);
        st.save_block_operation(&mut o2).unwrap();
        st.save_block_operation(&mut o3).unwrap();
        st.save_block_operation(&mut o1).unwrap();
        st.save_block_operation(&mut other).unwrap();

        let cursor = st.block_operations_by_source("S", ListOptions::default());
        assert_eq!(op_hashes(cursor), vec!["a", "b", "c"]);
    }

    #[test]
    fn duplicate_hash_is_rejected_and_store_unchanged() {
        let (_dir, st) = open();

        let mut original = record("a", "T", "S", 10, 1);
        st.save_block_operation(&mut original).unwrap();

        // Same (op_hash, tx_hash) pair from a different height/sequence.
        let mut duplicate = record("a", "T", "S", 11, 7);
        let err = st.save_block_operation(&mut duplicate).unwrap_err();
        assert!(matches!(err, StorageError::BlockAlreadyExists));
        assert!(!duplicate.is_saved());

        let entries: Vec<_> = st
            .block_operations_by_tx_hash("T", ListOptions::default())
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0.height, 10);
    }

    #[test]
    fn double_save_of_same_record_fails_without_touching_store() {
        let (_dir, st) = open();

        let mut bo = record("a", "T", "S", 10, 1);
        st.save_block_operation(&mut bo).unwrap();
        assert!(bo.is_saved());

        let err = st.save_block_operation(&mut bo).unwrap_err();
        assert!(matches!(err, StorageError::AlreadySaved));

        let entries: Vec<_> = st
            .block_operations_by_tx_hash("T", ListOptions::default())
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn index_consistency_per_saved_operation() {
        let (_dir, st) = open();

        let mut bo = record("a", "T", "S", 10, 1);
        st.save_block_operation(&mut bo).unwrap();

        assert!(st.block_operation_exists(&bo.hash).unwrap());

        // Exactly one entry under each secondary prefix, both pointing at
        // the primary hash.
        for prefix in ["bo-tx-T-", "bo-src-S-"] {
            let entries: Vec<_> = st.iter_prefix(prefix, ListOptions::default()).collect();
            assert_eq!(entries.len(), 1, "prefix {prefix}");
            let hash: String = serde_json::from_slice(&entries[0].value).unwrap();
            assert_eq!(hash, bo.hash);
        }
    }

    #[test]
    fn get_marks_record_saved_and_missing_is_not_found() {
        let (_dir, st) = open();

        let mut bo = record("a", "T", "S", 10, 1);
        st.save_block_operation(&mut bo).unwrap();

        let loaded = st.block_operation(&bo.hash).unwrap();
        assert!(loaded.is_saved());
        assert_eq!(loaded.hash, bo.hash);
        // Index-key material is transient and not persisted.
        assert_eq!(loaded.sequence_id(), 0);

        let err = st.block_operation("absent-hash").unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn cursor_pagination_by_raw_key() {
        let (_dir, st) = open();

        for (op_hash, seq) in [("a", 1u64), ("b", 2), ("c", 3)] {
            let mut bo = record(op_hash, "T", "S", 10, seq);
            st.save_block_operation(&mut bo).unwrap();
        }

        let mut first_page = st.block_operations_by_tx_hash("T", ListOptions::default().limit(2));
        let (first, _) = first_page.next().unwrap();
        let (second, last_key) = first_page.next().unwrap();
        assert_eq!(first.op_hash, "a");
        assert_eq!(second.op_hash, "b");
        assert!(first_page.next().is_none());

        let rest = st.block_operations_by_tx_hash("T", ListOptions::default().cursor(last_key));
        assert_eq!(op_hashes(rest), vec!["c"]);
    }

    #[test]
    fn reverse_iteration() {
        let (_dir, st) = open();

        for (op_hash, height) in [("a", 10u64), ("b", 11), ("c", 12)] {
            let mut bo = record(op_hash, "T", "S", height, 1);
            st.save_block_operation(&mut bo).unwrap();
        }

        let cursor = st.block_operations_by_tx_hash("T", ListOptions::default().reverse(true));
        assert_eq!(op_hashes(cursor), vec!["c", "b", "a"]);
    }

    #[test]
    fn uuid_suffix_breaks_ties_within_same_transaction() {
        let (_dir, st) = open();

        // Two operations at the same (height, sequence_id): the unique
        // suffix must keep both index entries alive.
        let mut first = record("a", "T", "S", 10, 1);
        let mut second = record("b", "T", "S", 10, 1);
        st.save_block_operation(&mut first).unwrap();
        st.save_block_operation(&mut second).unwrap();

        let mut hashes = op_hashes(st.block_operations_by_tx_hash("T", ListOptions::default()));
        hashes.sort();
        assert_eq!(hashes, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn save_announces_on_observer_bus() {
        let (_dir, st) = open();
        let mut events = observer::block_operations().subscribe();

        let mut bo = record("observed-op", "OBSERVED-TX", "OBS", 10, 1);
        st.save_block_operation(&mut bo).unwrap();

        // The bus is process-global, so skip events from concurrently
        // running tests until ours shows up.
        let event = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                let event = events.recv().await.unwrap();
                if event.operation.hash == bo.hash {
                    return event;
                }
            }
        })
        .await
        .unwrap();

        assert!(event.has_tag("saved"));
        assert!(event.has_tag("source-OBS"));
        assert!(event.has_tag(&format!("hash-{}", bo.hash)));
        assert!(event.has_tag("txhash-OBSERVED-TX"));
        assert!(event.has_tag("source-type-OBSpayment"));
    }
}
