//! # Storage for the ISAAC node
//!
//! RocksDB-backed persistence with the access patterns consensus needs:
//!
//! - [`backend`]: a typed ordered-KV adapter (`has`/`get`/`put_new` plus
//!   snapshot-consistent prefix iteration)
//! - [`block_operation`]: confirmed operations indexed by hash, by
//!   transaction, and by source account in chronological order
//! - [`chain`]: the genesis and latest confirmed block records
//! - [`observer`]: fan-out of save events to in-process subscribers
//!
//! All operations are synchronous blocking I/O. Callers in async contexts
//! should use `spawn_blocking` if needed to avoid blocking the runtime.

pub mod backend;
pub mod block_operation;
pub mod chain;
pub mod observer;

pub use backend::{KvEntry, ListOptions, PrefixIter, RocksDbConfig, RocksDbStorage, StorageError};
pub use block_operation::BlockOperationCursor;
pub use observer::{Observer, ObserverEvent};
