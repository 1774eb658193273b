//! RocksDB-backed ordered KV adapter.
//!
//! A thin typed layer over RocksDB: JSON-encoded values, insert-if-absent
//! semantics, and snapshot-consistent prefix iteration in key order.

use parking_lot::Mutex;
use rocksdb::{Direction, IteratorMode, Options, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The in-memory record was already persisted.
    #[error("record already saved")]
    AlreadySaved,

    /// A block operation with this primary key is already in the store.
    #[error("block operation already exists in storage")]
    BlockAlreadyExists,

    /// Insert-if-absent hit an existing key.
    #[error("key already exists: {0}")]
    AlreadyExists(String),

    /// The requested key is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Value (de)serialization failed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Any lower-level backend failure, propagated verbatim.
    #[error("database error: {0}")]
    Backend(String),
}

impl From<rocksdb::Error> for StorageError {
    fn from(err: rocksdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Options for prefix iteration.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Iterate in descending key order.
    pub reverse: bool,
    /// Maximum number of entries to yield.
    pub limit: Option<usize>,
    /// Resume strictly after this raw key (strictly before it when
    /// `reverse` is set). Callers paginate by feeding back the last key a
    /// cursor yielded.
    pub cursor: Option<Vec<u8>>,
}

impl ListOptions {
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn cursor(mut self, cursor: Vec<u8>) -> Self {
        self.cursor = Some(cursor);
        self
    }
}

/// One raw entry yielded by a prefix iterator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Configuration for the RocksDB backend.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Maximum number of background jobs.
    pub max_background_jobs: i32,
    /// Write buffer size in bytes.
    pub write_buffer_size: usize,
    /// Block cache size in bytes (None to disable).
    pub block_cache_size: Option<usize>,
    /// Bloom filter bits per key (0 to disable).
    pub bloom_filter_bits: f64,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            max_background_jobs: 4,
            write_buffer_size: 64 * 1024 * 1024,
            block_cache_size: Some(128 * 1024 * 1024),
            bloom_filter_bits: 10.0,
        }
    }
}

/// RocksDB-based ordered KV storage.
///
/// Values are JSON; keys are raw bytes so that embedded big-endian integers
/// sort numerically. Safe for single-writer / many-reader use: reads go
/// straight to RocksDB, while check-then-insert sequences serialize on an
/// internal write mutex.
pub struct RocksDbStorage {
    db: Arc<DB>,
    /// Serializes `has` → insert inside [`RocksDbStorage::put_new`]. RocksDB
    /// offers no compare-and-set, so uniqueness of fresh keys depends on
    /// this lock.
    write_lock: Mutex<()>,
}

impl RocksDbStorage {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Self::open_with_config(path, RocksDbConfig::default())
    }

    /// Open with custom configuration.
    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        config: RocksDbConfig,
    ) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_background_jobs(config.max_background_jobs);
        opts.set_write_buffer_size(config.write_buffer_size);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        if let Some(cache_size) = config.block_cache_size {
            let cache = rocksdb::Cache::new_lru_cache(cache_size);
            block_opts.set_block_cache(&cache);
        }
        if config.bloom_filter_bits > 0.0 {
            block_opts.set_bloom_filter(config.bloom_filter_bits, false);
        }
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, path)?;
        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Whether `key` is present.
    pub fn has(&self, key: impl AsRef<[u8]>) -> Result<bool, StorageError> {
        Ok(self.db.get(key.as_ref())?.is_some())
    }

    /// Read and JSON-decode the value under `key`.
    pub fn get<T: DeserializeOwned>(&self, key: impl AsRef<[u8]>) -> Result<T, StorageError> {
        let key = key.as_ref();
        match self.db.get(key)? {
            Some(value) => Ok(serde_json::from_slice(&value)?),
            None => Err(StorageError::NotFound(String::from_utf8_lossy(key).into())),
        }
    }

    /// Insert the JSON-encoded `value` under `key`, failing if the key is
    /// already present.
    pub fn put_new<T: Serialize>(
        &self,
        key: impl AsRef<[u8]>,
        value: &T,
    ) -> Result<(), StorageError> {
        let key = key.as_ref();
        let encoded = serde_json::to_vec(value)?;

        let _guard = self.write_lock.lock();
        if self.db.get(key)?.is_some() {
            return Err(StorageError::AlreadyExists(
                String::from_utf8_lossy(key).into(),
            ));
        }
        self.db.put(key, encoded)?;
        Ok(())
    }

    /// Insert or overwrite the JSON-encoded `value` under `key`.
    pub fn put<T: Serialize>(&self, key: impl AsRef<[u8]>, value: &T) -> Result<(), StorageError> {
        let encoded = serde_json::to_vec(value)?;
        let _guard = self.write_lock.lock();
        self.db.put(key.as_ref(), encoded)?;
        Ok(())
    }

    /// Iterate entries whose keys start with `prefix`, in ascending key
    /// order (descending with `ListOptions::reverse`).
    ///
    /// The iterator reads from a point-in-time snapshot: writes that land
    /// while the cursor is being consumed neither appear nor cause skips.
    pub fn iter_prefix(&self, prefix: impl AsRef<[u8]>, options: ListOptions) -> PrefixIter {
        let prefix = prefix.as_ref();
        let snapshot = self.db.snapshot();

        // Collect within the snapshot so the cursor owns its entries and
        // the snapshot can be released on return.
        let mut entries: Vec<KvEntry> = snapshot
            .iterator(IteratorMode::From(prefix, Direction::Forward))
            .take_while(|item| match item {
                Ok((key, _)) => key.starts_with(prefix),
                Err(_) => false,
            })
            .filter_map(|item| {
                item.ok().map(|(key, value)| KvEntry {
                    key: key.to_vec(),
                    value: value.to_vec(),
                })
            })
            .collect();

        if options.reverse {
            entries.reverse();
        }
        if let Some(cursor) = options.cursor {
            entries.retain(|entry| {
                if options.reverse {
                    entry.key < cursor
                } else {
                    entry.key > cursor
                }
            });
        }
        if let Some(limit) = options.limit {
            entries.truncate(limit);
        }

        PrefixIter {
            entries: entries.into_iter(),
        }
    }
}

/// Snapshot cursor over one key prefix. Resources are released on drop.
pub struct PrefixIter {
    entries: std::vec::IntoIter<KvEntry>,
}

impl Iterator for PrefixIter {
    type Item = KvEntry;

    fn next(&mut self) -> Option<KvEntry> {
        self.entries.next()
    }
}

impl ExactSizeIterator for PrefixIter {
    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open() -> (TempDir, RocksDbStorage) {
        let dir = TempDir::new().unwrap();
        let storage = RocksDbStorage::open(dir.path()).unwrap();
        (dir, storage)
    }

    #[test]
    fn put_new_then_get() {
        let (_dir, st) = open();

        assert!(!st.has("k1").unwrap());
        st.put_new("k1", &"v1".to_string()).unwrap();
        assert!(st.has("k1").unwrap());
        assert_eq!(st.get::<String>("k1").unwrap(), "v1");
    }

    #[test]
    fn put_new_rejects_existing_key() {
        let (_dir, st) = open();

        st.put_new("k1", &1u64).unwrap();
        let err = st.put_new("k1", &2u64).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
        // The failed insert must not clobber the stored value.
        assert_eq!(st.get::<u64>("k1").unwrap(), 1);
    }

    #[test]
    fn get_missing_is_not_found() {
        let (_dir, st) = open();
        let err = st.get::<String>("absent").unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn prefix_iteration_is_ordered_and_scoped() {
        let (_dir, st) = open();

        st.put_new("p-b", &2u64).unwrap();
        st.put_new("p-a", &1u64).unwrap();
        st.put_new("p-c", &3u64).unwrap();
        st.put_new("q-a", &9u64).unwrap();

        let keys: Vec<Vec<u8>> = st
            .iter_prefix("p-", ListOptions::default())
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec![b"p-a".to_vec(), b"p-b".to_vec(), b"p-c".to_vec()]);
    }

    #[test]
    fn reverse_limit_and_cursor() {
        let (_dir, st) = open();
        for key in ["p-a", "p-b", "p-c", "p-d"] {
            st.put_new(key, &0u64).unwrap();
        }

        let reversed: Vec<Vec<u8>> = st
            .iter_prefix("p-", ListOptions::default().reverse(true).limit(2))
            .map(|e| e.key)
            .collect();
        assert_eq!(reversed, vec![b"p-d".to_vec(), b"p-c".to_vec()]);

        // Pagination: resume strictly after the cursor key.
        let page: Vec<Vec<u8>> = st
            .iter_prefix("p-", ListOptions::default().cursor(b"p-b".to_vec()))
            .map(|e| e.key)
            .collect();
        assert_eq!(page, vec![b"p-c".to_vec(), b"p-d".to_vec()]);

        let page: Vec<Vec<u8>> = st
            .iter_prefix(
                "p-",
                ListOptions::default().reverse(true).cursor(b"p-c".to_vec()),
            )
            .map(|e| e.key)
            .collect();
        assert_eq!(page, vec![b"p-b".to_vec(), b"p-a".to_vec()]);
    }

    #[test]
    fn iteration_is_a_snapshot() {
        let (_dir, st) = open();
        st.put_new("p-a", &0u64).unwrap();
        st.put_new("p-b", &0u64).unwrap();

        let mut iter = st.iter_prefix("p-", ListOptions::default());
        // A write landing mid-iteration is invisible to the open cursor.
        st.put_new("p-ab", &0u64).unwrap();

        let keys: Vec<Vec<u8>> = iter.by_ref().map(|e| e.key).collect();
        assert_eq!(keys, vec![b"p-a".to_vec(), b"p-b".to_vec()]);
    }

    #[test]
    fn big_endian_keys_sort_numerically() {
        let (_dir, st) = open();
        for height in [2u64, 10, 1, 256] {
            let mut key = b"h-".to_vec();
            key.extend_from_slice(&height.to_be_bytes());
            st.put_new(key, &height).unwrap();
        }

        let heights: Vec<u64> = st
            .iter_prefix("h-", ListOptions::default())
            .map(|e| u64::from_be_bytes(e.key[2..].try_into().unwrap()))
            .collect();
        assert_eq!(heights, vec![1, 2, 10, 256]);
    }
}
