//! The ISAAC consensus state triple and ballot states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four states a ballot moves through within one consensus round.
///
/// The derived ordering follows the protocol ordinals:
/// `Init (0) < Sign (1) < Accept (2) < AllConfirm (3)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum BallotState {
    /// Waiting for (or producing) a proposal.
    #[default]
    Init = 0,
    /// Pre-vote on a received proposal.
    Sign = 1,
    /// Commit vote.
    Accept = 2,
    /// Agreement reached for this height.
    AllConfirm = 3,
}

impl BallotState {
    /// The successor state within a round.
    ///
    /// `AllConfirm` has no successor; it saturates. Round progression out of
    /// `Accept` and height progression out of `AllConfirm` are driven by the
    /// state manager, not by this successor relation.
    pub fn next(self) -> BallotState {
        match self {
            BallotState::Init => BallotState::Sign,
            BallotState::Sign => BallotState::Accept,
            BallotState::Accept => BallotState::AllConfirm,
            BallotState::AllConfirm => BallotState::AllConfirm,
        }
    }
}

impl fmt::Display for BallotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BallotState::Init => "INIT",
            BallotState::Sign => "SIGN",
            BallotState::Accept => "ACCEPT",
            BallotState::AllConfirm => "ALLCONFIRM",
        };
        f.write_str(name)
    }
}

/// Where the local node stands in consensus: `(height, round, ballot state)`.
///
/// States are totally ordered lexicographically on that triple; the derived
/// `Ord` relies on field declaration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct IsaacState {
    /// Block height under agreement.
    pub height: u64,
    /// Per-height retry counter.
    pub round: u64,
    /// Position within the round.
    pub ballot_state: BallotState,
}

impl IsaacState {
    pub fn new(height: u64, round: u64, ballot_state: BallotState) -> Self {
        Self {
            height,
            round,
            ballot_state,
        }
    }

    /// True iff `target` is strictly later than `self`.
    ///
    /// This is the gate that keeps duplicate and stale transitions from
    /// regressing the state machine.
    pub fn is_later(&self, target: &IsaacState) -> bool {
        target > self
    }
}

impl fmt::Display for IsaacState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(height={}, round={}, state={})",
            self.height, self.round, self.ballot_state
        )
    }
}
