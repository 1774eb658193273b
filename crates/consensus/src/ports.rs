//! Outbound interfaces driven by the state manager.
//!
//! The manager stays ignorant of storage engines and network transports:
//! it reads the chain through [`ChainReader`], asks the node to build
//! proposals through [`BallotProposer`], and hands finished ballots to a
//! [`BallotBroadcaster`]. Production wiring lives in the node crate; tests
//! substitute in-memory fakes.

use isaac_types::{Address, Ballot, Block};

/// Read access to the consensus view of the chain.
pub trait ChainReader: Send + Sync + 'static {
    /// The latest confirmed block as this node sees it.
    fn latest_block(&self) -> Block;

    /// The proposer for `(height, round)`.
    ///
    /// Must be a pure function of its inputs, identical across all correct
    /// nodes; propose-or-wait decisions diverge otherwise.
    fn select_proposer(&self, height: u64, round: u64) -> Address;
}

/// Builds and publishes the local node's proposal ballot for a round.
pub trait BallotProposer: Send + Sync + 'static {
    fn propose_new_ballot(&self, round: u64) -> Result<Ballot, ProposeError>;
}

/// Best-effort ballot fan-out. Must not block the caller.
pub trait BallotBroadcaster: Send + Sync + 'static {
    fn broadcast(&self, ballot: Ballot);
}

/// The node failed to build or publish a proposal ballot.
///
/// Never fatal: the state manager logs it and lets the round expire toward
/// an EXP vote.
#[derive(Debug, thiserror::Error)]
#[error("propose failed: {0}")]
pub struct ProposeError(pub String);
