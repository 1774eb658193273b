//! In-process ballot fan-out.
//!
//! Stands behind the consensus crate's broadcaster port. Fan-out is local:
//! subscribers are in-process consumers (the network adapter, RPC
//! observers, tests). Delivery is best-effort and never blocks the sender.

use isaac_consensus::BallotBroadcaster;
use isaac_types::Ballot;
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 1024;

/// Broadcast-channel hub distributing outbound ballots.
pub struct BroadcastHub {
    sender: broadcast::Sender<Ballot>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe to every ballot broadcast from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Ballot> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BallotBroadcaster for BroadcastHub {
    fn broadcast(&self, ballot: Ballot) {
        debug!(
            source = %ballot.body.source,
            state = %ballot.body.ballot_state,
            vote = %ballot.body.vote,
            "broadcasting ballot"
        );
        crate::metrics::record_ballot_broadcast();
        // No subscribers is fine; the ballot is simply dropped.
        let _ = self.sender.send(ballot);
    }
}
