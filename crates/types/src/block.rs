//! Confirmed block metadata.

use crate::hash_hex;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// The consensus snapshot of a confirmed block.
///
/// Only the metadata the consensus layer reads is carried here; the block
/// body lives with the subsystems that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Monotonically increasing block number. Genesis is height 1.
    pub height: u64,
    /// Content hash of the block.
    pub hash: String,
    /// Cumulative transaction count up to and including this block.
    pub total_txs: u64,
    /// Cumulative operation count up to and including this block.
    pub total_ops: u64,
    /// Confirmation time, ISO-8601 with timezone.
    pub confirmed: String,
}

impl Block {
    /// Build the genesis block for a network.
    ///
    /// The hash binds the network id so chains with different ids never share
    /// a genesis.
    pub fn genesis(network_id: &[u8], confirmed: DateTime<Utc>) -> Self {
        let mut seed = b"genesis-".to_vec();
        seed.extend_from_slice(network_id);
        Self {
            height: 1,
            hash: hash_hex(&seed),
            total_txs: 0,
            total_ops: 0,
            confirmed: confirmed.to_rfc3339(),
        }
    }

    /// The confirmation time as a timestamp.
    ///
    /// Falls back to the zero time when the stored string does not parse.
    pub fn confirmed_time(&self) -> DateTime<Utc> {
        parse_iso8601(&self.confirmed)
    }
}

/// Parse an ISO-8601 timestamp, yielding the Unix epoch zero time on failure.
///
/// The zero fallback makes a missing or corrupt `confirmed` field read as
/// "proposed arbitrarily long ago", which downstream pacing clamps to a zero
/// buffer.
pub fn parse_iso8601(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc.timestamp_opt(0, 0).unwrap())
}

/// The current time formatted the way `Block::confirmed` stores it.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmed_roundtrip() {
        let now = Utc::now();
        let block = Block::genesis(b"test-network", now);
        assert_eq!(block.height, 1);
        assert_eq!(block.confirmed_time().timestamp(), now.timestamp());
    }

    #[test]
    fn unparseable_confirmed_is_zero_time() {
        assert_eq!(parse_iso8601("not a timestamp").timestamp(), 0);
        assert_eq!(parse_iso8601("").timestamp(), 0);
    }

    #[test]
    fn genesis_hash_binds_network_id() {
        let now = Utc::now();
        let a = Block::genesis(b"net-a", now);
        let b = Block::genesis(b"net-b", now);
        assert_ne!(a.hash, b.hash);
    }
}
