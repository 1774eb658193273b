//! The local node's ballot factory.

use crate::chain::LocalChain;
use crate::hub::BroadcastHub;
use isaac_consensus::{BallotBroadcaster, BallotProposer, ChainReader, IsaacConfig, ProposeError};
use isaac_types::{
    Ballot, BallotState, Basis, LocalNode, Operation, ProposerTransaction, Vote,
};
use std::sync::Arc;
use tracing::debug;

/// Builds, signs, and publishes the local node's proposal ballot for a
/// round. Invoked by the state manager when proposer selection lands on
/// this node.
pub struct BallotFactory {
    chain: Arc<LocalChain>,
    local_node: Arc<LocalNode>,
    hub: Arc<BroadcastHub>,
    config: IsaacConfig,
}

impl BallotFactory {
    pub fn new(
        chain: Arc<LocalChain>,
        local_node: Arc<LocalNode>,
        hub: Arc<BroadcastHub>,
        config: IsaacConfig,
    ) -> Self {
        Self {
            chain,
            local_node,
            hub,
            config,
        }
    }
}

impl BallotProposer for BallotFactory {
    fn propose_new_ballot(&self, round: u64) -> Result<Ballot, ProposeError> {
        let latest = self.chain.latest_block();
        let basis = Basis {
            round,
            height: latest.height,
            block_hash: latest.hash,
            total_txs: latest.total_txs,
            total_ops: latest.total_ops,
        };

        // Transaction selection belongs to the mempool; a proposal ballot
        // is valid with an empty list.
        let mut ballot = Ballot::new(
            self.local_node.address().clone(),
            self.local_node.address().clone(),
            basis,
            Vec::new(),
        );
        ballot.set_vote(BallotState::Sign, Vote::Yes);

        let collect_tx_fee =
            Operation::collect_tx_fee_from_ballot(&ballot, self.config.common_account.clone());
        let inflation = Operation::inflation_from_ballot(
            &ballot,
            self.config.common_account.clone(),
            self.config.initial_balance,
        );
        ballot.set_proposer_transaction(ProposerTransaction::from_ballot(
            &ballot,
            collect_tx_fee,
            inflation,
        ));

        let keypair = self.local_node.keypair();
        ballot.sign_by_proposer(keypair, &self.config.network_id);
        ballot.sign(keypair, &self.config.network_id);

        debug!(round, height = ballot.body.basis.height, "built proposal ballot");
        crate::metrics::record_ballot_proposed();
        self.hub.broadcast(ballot.clone());

        Ok(ballot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::RoundRobinSelector;
    use chrono::Utc;
    use isaac_storage::RocksDbStorage;
    use isaac_types::{Block, KeyPair};
    use tempfile::TempDir;

    #[tokio::test]
    async fn proposal_is_signed_and_published() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(RocksDbStorage::open(dir.path()).unwrap());
        storage
            .bootstrap_genesis(&Block::genesis(b"test-net", Utc::now()))
            .unwrap();

        let local_node = Arc::new(LocalNode::new(KeyPair::from_seed(&[5; 32])));
        let chain = Arc::new(LocalChain::new(
            storage,
            RoundRobinSelector::new(vec![local_node.address().clone()]),
        ));
        let hub = Arc::new(BroadcastHub::new());
        let mut published = hub.subscribe();

        let config = IsaacConfig {
            network_id: b"test-net".to_vec(),
            ..IsaacConfig::default()
        };
        let factory = BallotFactory::new(chain, local_node.clone(), hub, config);

        let ballot = factory.propose_new_ballot(2).unwrap();
        assert_eq!(ballot.body.basis.round, 2);
        assert_eq!(ballot.body.basis.height, 1);
        assert_eq!(ballot.body.ballot_state, BallotState::Sign);
        assert_eq!(ballot.body.vote, Vote::Yes);
        assert_eq!(ballot.body.proposer, *local_node.address());
        ballot.verify(b"test-net").unwrap();
        ballot.verify_proposer(b"test-net").unwrap();

        let seen = published.recv().await.unwrap();
        assert_eq!(seen, ballot);
    }
}
