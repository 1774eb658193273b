//! Core types for the ISAAC consensus node.
//!
//! This crate provides the foundational types used throughout the node:
//!
//! - **Identity**: keypairs, signatures, node addresses
//! - **Consensus types**: ballot states, the ISAAC state triple, ballots and
//!   their voting basis
//! - **Chain types**: blocks, operations, transactions, and the persisted
//!   block-operation record
//!
//! # Design Philosophy
//!
//! This crate is self-contained and does not depend on any other workspace
//! crates, making it the foundation layer. All persisted types serialize as
//! JSON via serde; content hashes are SHA3-256 over the canonical JSON
//! encoding, hex-encoded.

mod ballot;
mod block;
mod crypto;
mod node;
mod operation;
mod state;
mod transaction;

pub use ballot::{Ballot, BallotBody, BallotHeader, Basis, ProposerTransaction, Vote};
pub use block::{now_iso8601, parse_iso8601, Block};
pub use crypto::{Address, KeyPair, PublicKey, Signature, SignatureError};
pub use node::LocalNode;
pub use operation::{BlockOperation, Operation, OperationType};
pub use state::{BallotState, IsaacState};
pub use transaction::Transaction;

/// Errors from encoding a value for hashing or persistence.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding failed.
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// SHA3-256 over `bytes`, hex-encoded.
///
/// All content hashes in the node (operations, transactions, ballots, blocks)
/// use this digest.
pub fn hash_hex(bytes: &[u8]) -> String {
    use sha3::{Digest, Sha3_256};
    hex::encode(Sha3_256::digest(bytes))
}
