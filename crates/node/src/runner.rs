//! Node assembly and lifecycle.

use crate::chain::LocalChain;
use crate::config::{ConfigError, NodeConfig};
use crate::hub::BroadcastHub;
use crate::metrics;
use crate::proposal::BallotFactory;
use crate::selector::RoundRobinSelector;
use chrono::Utc;
use isaac_consensus::StateManager;
use isaac_storage::{observer, RocksDbStorage, StorageError};
use isaac_types::{Address, BallotState, Block, LocalNode};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A fully wired ISAAC node: storage, chain façade, ballot factory,
/// broadcast hub, and the consensus state manager.
pub struct Node {
    storage: Arc<RocksDbStorage>,
    manager: Arc<StateManager>,
    hub: Arc<BroadcastHub>,
    local_node: Arc<LocalNode>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    /// Open storage, bootstrap genesis on first run, and wire the
    /// consensus stack. Nothing runs until [`Node::start`].
    pub fn new(config: &NodeConfig) -> Result<Self, NodeError> {
        let local_node = Arc::new(LocalNode::new(config.keypair()?));
        let isaac = config.isaac();

        let storage = Arc::new(RocksDbStorage::open(&config.node.data_dir)?);
        if !storage.has_genesis()? {
            let genesis = Block::genesis(&isaac.network_id, Utc::now());
            storage.bootstrap_genesis(&genesis)?;
            info!(hash = %genesis.hash, "bootstrapped genesis block");
        }
        let genesis_time = storage.genesis_block()?.confirmed_time();

        let selector = RoundRobinSelector::new(config.validators());
        let chain = Arc::new(LocalChain::new(Arc::clone(&storage), selector));
        let hub = Arc::new(BroadcastHub::new());
        let factory = Arc::new(BallotFactory::new(
            Arc::clone(&chain),
            Arc::clone(&local_node),
            Arc::clone(&hub),
            isaac.clone(),
        ));

        let manager = StateManager::new(
            chain,
            factory,
            Arc::clone(&hub) as Arc<dyn isaac_consensus::BallotBroadcaster>,
            Arc::clone(&local_node),
            isaac,
            genesis_time,
        );
        manager.set_transit_signal(metrics::record_state_transition);

        Ok(Self {
            storage,
            manager,
            hub,
            local_node,
            handle: Mutex::new(None),
        })
    }

    /// Start the consensus loop and enter the round for the next height.
    pub fn start(&self) -> Result<(), NodeError> {
        *self.handle.lock() = Some(self.manager.start());

        // Bridge saved-operation events into metrics.
        let mut saved = observer::block_operations().subscribe();
        tokio::spawn(async move {
            while saved.recv().await.is_ok() {
                metrics::record_block_operation_saved();
            }
        });

        let latest = self.storage.latest_block()?;
        info!(
            address = %self.local_node.address(),
            height = latest.height,
            "starting consensus"
        );
        self.manager
            .transit_to(latest.height + 1, 0, BallotState::Init);
        Ok(())
    }

    /// Stop the consensus loop and wait for it to wind down.
    pub async fn stop(&self) {
        self.manager.stop();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("node stopped");
    }

    pub fn local_address(&self) -> &Address {
        self.local_node.address()
    }

    pub fn manager(&self) -> &Arc<StateManager> {
        &self.manager
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn storage(&self) -> &Arc<RocksDbStorage> {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConsensusSection, MetricsSection, NodeSection};
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> NodeConfig {
        let seed = [7u8; 32];
        let address = isaac_types::KeyPair::from_seed(&seed).address();
        NodeConfig {
            node: NodeSection {
                data_dir: dir.path().to_path_buf(),
                key_seed: hex::encode(seed),
                validators: vec![address.as_str().to_string()],
            },
            consensus: ConsensusSection {
                network_id: "isaac-test".into(),
                block_time_ms: 1000,
                timeout_init_ms: 60_000,
                timeout_sign_ms: 60_000,
                timeout_accept_ms: 60_000,
                ops_limit: 1000,
                common_account: "common".into(),
                initial_balance: 10_000_000_000,
            },
            metrics: MetricsSection::default(),
        }
    }

    #[test]
    fn new_bootstraps_genesis_once() {
        let dir = TempDir::new().unwrap();

        let node = Node::new(&config(&dir)).unwrap();
        let genesis = node.storage().genesis_block().unwrap();
        assert_eq!(genesis.height, 1);
        drop(node);

        // Reopening keeps the original genesis.
        let node = Node::new(&config(&dir)).unwrap();
        assert_eq!(node.storage().genesis_block().unwrap(), genesis);
    }

    #[tokio::test]
    async fn start_and_stop() {
        let dir = TempDir::new().unwrap();
        let node = Node::new(&config(&dir)).unwrap();

        node.start().unwrap();
        // The sole validator is the local node, so the loop heads into the
        // pre-propose sleep; stop must cut through it promptly.
        tokio::time::sleep(Duration::from_millis(100)).await;
        tokio::time::timeout(Duration::from_secs(1), node.stop())
            .await
            .expect("stop timed out");
    }
}
