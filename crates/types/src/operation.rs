//! Operations and the persisted block-operation record.
//!
//! An [`Operation`] is one effect inside a transaction. Once the containing
//! block is confirmed, each operation is flattened into a [`BlockOperation`]
//! record so it can be looked up by hash, by transaction, and by source
//! account in confirmation order.

use crate::ballot::Ballot;
use crate::crypto::Address;
use crate::transaction::Transaction;
use crate::{hash_hex, CodecError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-block inflation paid to the common account, as a fraction of the
/// initial supply (one unit per million).
const INFLATION_DENOMINATOR: u64 = 1_000_000;

/// The kind of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationType {
    CreateAccount,
    Payment,
    CollectTxFee,
    Inflation,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationType::CreateAccount => "create-account",
            OperationType::Payment => "payment",
            OperationType::CollectTxFee => "collect-tx-fee",
            OperationType::Inflation => "inflation",
        };
        f.write_str(name)
    }
}

/// A single operation inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Operation {
    CreateAccount {
        target: Address,
        amount: u64,
    },
    Payment {
        target: Address,
        amount: u64,
    },
    /// Moves the fees of a proposed block's transactions to the common
    /// account. Attached by the proposer, never submitted by clients.
    CollectTxFee {
        target: Address,
        amount: u64,
        txs: u64,
        block_height: u64,
    },
    /// Mints the per-block inflation into the common account. Attached by
    /// the proposer, never submitted by clients.
    Inflation {
        target: Address,
        amount: u64,
        block_height: u64,
    },
}

impl Operation {
    pub fn op_type(&self) -> OperationType {
        match self {
            Operation::CreateAccount { .. } => OperationType::CreateAccount,
            Operation::Payment { .. } => OperationType::Payment,
            Operation::CollectTxFee { .. } => OperationType::CollectTxFee,
            Operation::Inflation { .. } => OperationType::Inflation,
        }
    }

    /// The serialized form persisted as a block operation's body.
    pub fn serialize(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Content hash of this operation.
    pub fn hash(&self) -> String {
        let encoded = serde_json::to_vec(self).expect("operation is json-encodable");
        hash_hex(&encoded)
    }

    /// The collect-tx-fee operation a proposer attaches to a ballot.
    ///
    /// An expiration ballot carries no transactions, so the collected amount
    /// is zero; the operation is still attached so every ballot has the same
    /// proposer-transaction shape.
    pub fn collect_tx_fee_from_ballot(ballot: &Ballot, common_account: Address) -> Operation {
        Operation::CollectTxFee {
            target: common_account,
            amount: 0,
            txs: ballot.body.transactions.len() as u64,
            block_height: ballot.body.basis.height,
        }
    }

    /// The inflation operation a proposer attaches to a ballot.
    pub fn inflation_from_ballot(
        ballot: &Ballot,
        common_account: Address,
        initial_balance: u64,
    ) -> Operation {
        Operation::Inflation {
            target: common_account,
            amount: initial_balance / INFLATION_DENOMINATOR,
            block_height: ballot.body.basis.height,
        }
    }
}

/// A confirmed operation as persisted and indexed by the storage layer.
///
/// The storage layer keys this record three ways:
/// - by `hash` (primary)
/// - by `tx_hash` in confirmation order (secondary)
/// - by `source` in confirmation order (secondary)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockOperation {
    /// Composite primary key, `"{op_hash}-{tx_hash}"`. Unique: the same
    /// operation may appear in different transactions, but only once per
    /// transaction.
    pub hash: String,

    pub op_hash: String,
    pub tx_hash: String,

    #[serde(rename = "type")]
    pub op_type: OperationType,
    /// Source account of the originating transaction.
    pub source: Address,
    /// Opaque serialized operation payload.
    pub body: Vec<u8>,
    /// Height of the block that confirmed this operation.
    #[serde(rename = "block_height")]
    pub height: u64,

    /// Sequence id of the originating transaction. Needed only while
    /// building the chronological index keys at save time.
    #[serde(skip)]
    sequence_id: u64,
    /// Guards against double-save of the same in-memory record.
    #[serde(skip)]
    saved: bool,
}

impl BlockOperation {
    /// The composite primary key for an `(op_hash, tx_hash)` pair.
    pub fn key_for(op_hash: &str, tx_hash: &str) -> String {
        format!("{op_hash}-{tx_hash}")
    }

    /// Build a record from raw parts.
    ///
    /// Most callers go through [`BlockOperation::from_operation`]; this
    /// constructor exists for ingestion paths that already carry the hashes.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        op_hash: impl Into<String>,
        tx_hash: impl Into<String>,
        op_type: OperationType,
        source: Address,
        body: Vec<u8>,
        height: u64,
        sequence_id: u64,
    ) -> Self {
        let op_hash = op_hash.into();
        let tx_hash = tx_hash.into();
        Self {
            hash: Self::key_for(&op_hash, &tx_hash),
            op_hash,
            tx_hash,
            op_type,
            source,
            body,
            height,
            sequence_id,
            saved: false,
        }
    }

    /// Flatten an operation of a confirmed transaction into its persisted
    /// record.
    pub fn from_operation(
        op: &Operation,
        tx: &Transaction,
        block_height: u64,
    ) -> Result<Self, CodecError> {
        Ok(Self::new(
            op.hash(),
            tx.hash(),
            op.op_type(),
            tx.source.clone(),
            op.serialize()?,
            block_height,
            tx.sequence_id,
        ))
    }

    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    pub fn is_saved(&self) -> bool {
        self.saved
    }

    /// Mark the record as persisted. Called by the storage layer once the
    /// primary and both secondary index entries are written, and on load.
    pub fn mark_saved(&mut self) {
        self.saved = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment() -> Operation {
        Operation::Payment {
            target: Address::new("aa"),
            amount: 100,
        }
    }

    #[test]
    fn operation_hash_is_content_addressed() {
        assert_eq!(payment().hash(), payment().hash());
        let other = Operation::Payment {
            target: Address::new("aa"),
            amount: 101,
        };
        assert_ne!(payment().hash(), other.hash());
    }

    #[test]
    fn record_composite_key() {
        let tx = Transaction::new(Address::new("src"), 9, vec![payment()]);
        let op = &tx.operations[0];
        let bo = BlockOperation::from_operation(op, &tx, 42).unwrap();

        assert_eq!(bo.hash, format!("{}-{}", op.hash(), tx.hash()));
        assert_eq!(bo.height, 42);
        assert_eq!(bo.sequence_id(), 9);
        assert!(!bo.is_saved());
    }

    #[test]
    fn transient_fields_do_not_persist() {
        let tx = Transaction::new(Address::new("src"), 7, vec![payment()]);
        let mut bo = BlockOperation::from_operation(&tx.operations[0], &tx, 1).unwrap();
        bo.mark_saved();

        let json = serde_json::to_vec(&bo).unwrap();
        let decoded: BlockOperation = serde_json::from_slice(&json).unwrap();
        assert_eq!(decoded.sequence_id(), 0);
        assert!(!decoded.is_saved());
        assert_eq!(decoded.hash, bo.hash);
    }
}
