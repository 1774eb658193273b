//! Transactions grouping operations from one source account.

use crate::crypto::Address;
use crate::hash_hex;
use crate::operation::Operation;
use serde::{Deserialize, Serialize};

/// A transaction: an ordered list of operations from one source account.
///
/// Validation (signatures, balances, fees) happens upstream of this crate;
/// consensus and storage only need the identity and ordering facts carried
/// here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Account that issued the transaction.
    pub source: Address,
    /// Per-source monotonic counter; orders a source's transactions within
    /// a height.
    pub sequence_id: u64,
    pub operations: Vec<Operation>,
}

impl Transaction {
    pub fn new(source: Address, sequence_id: u64, operations: Vec<Operation>) -> Self {
        Self {
            source,
            sequence_id,
            operations,
        }
    }

    /// Content hash of this transaction.
    pub fn hash(&self) -> String {
        let encoded = serde_json::to_vec(self).expect("transaction is json-encodable");
        hash_hex(&encoded)
    }

    /// Whether the transaction respects the configured operations-per-
    /// transaction limit.
    pub fn within_ops_limit(&self, limit: usize) -> bool {
        self.operations.len() <= limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(seq: u64) -> Transaction {
        Transaction::new(
            Address::new("source-account"),
            seq,
            vec![Operation::Payment {
                target: Address::new("target-account"),
                amount: 5,
            }],
        )
    }

    #[test]
    fn hash_covers_sequence_id() {
        assert_ne!(sample(1).hash(), sample(2).hash());
        assert_eq!(sample(1).hash(), sample(1).hash());
    }

    #[test]
    fn ops_limit() {
        let tx = sample(1);
        assert!(tx.within_ops_limit(1));
        assert!(!tx.within_ops_limit(0));
    }
}
