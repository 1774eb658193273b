//! The ISAAC state manager.
//!
//! A single long-running task owns the current `(height, round, ballot
//! state)` triple and multiplexes three event sources:
//!
//! 1. **Timer**: each ballot state has a bounded timeout. Expiry in ACCEPT
//!    advances the round; expiry elsewhere broadcasts an expiration ballot
//!    and moves to the successor state in place.
//! 2. **Transition channel**: externally observed progress (received
//!    ballots) arrives as target states. Only strictly-later targets pass
//!    the submission gate.
//! 3. **Stop signal**: terminates the loop; checked with priority so no
//!    transition lands after stop is observed.
//!
//! Everything else (expiration broadcasts, transition submission, stop
//! posting) runs as detached tasks over immutable snapshots, so the loop
//! never blocks on network I/O and callers never block on the loop.

use crate::block_time::{
    ballot_proposed_time, calculate_average_block_time, calculate_block_time_buffer,
};
use crate::config::IsaacConfig;
use crate::ports::{BallotBroadcaster, BallotProposer, ChainReader};
use chrono::{DateTime, Utc};
use isaac_types::{
    Ballot, BallotState, Basis, IsaacState, LocalNode, Operation, ProposerTransaction, Vote,
};
use parking_lot::{Mutex, RwLock};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant, Sleep};
use tracing::{debug, error, trace};

/// Stand-in for "no timeout": the timer is parked this far in the future
/// whenever the current state must not expire on its own.
const IDLE_TIMEOUT: Duration = Duration::from_secs(3600);

/// Pre-propose buffer used until the first recalculation.
const INITIAL_BLOCK_TIME_BUFFER: Duration = Duration::from_secs(2);

/// Correction step applied when the observed cadence drifts off-goal.
const BLOCK_TIME_DELTA: Duration = Duration::from_secs(1);

type TransitSignal = Box<dyn Fn(IsaacState) + Send + Sync>;

/// State shared between the event-loop task (writer) and external readers.
struct Shared {
    state: RwLock<IsaacState>,
    block_time_buffer: RwLock<Duration>,
    transit_signal: RwLock<Option<TransitSignal>>,
}

/// Drives the local node through ISAAC consensus states.
///
/// Construct with [`StateManager::new`], register a transit signal, then
/// [`StateManager::start`] the loop. External progress is submitted through
/// [`StateManager::transit_to`]; the current state is readable at any time
/// through [`StateManager::state`].
pub struct StateManager {
    shared: Shared,

    transit_tx: mpsc::Sender<IsaacState>,
    transit_rx: Mutex<Option<mpsc::Receiver<IsaacState>>>,
    stop_tx: mpsc::Sender<()>,
    stop_rx: Mutex<Option<mpsc::Receiver<()>>>,

    /// When the genesis block was confirmed; anchors average block time.
    genesis: DateTime<Utc>,
    config: IsaacConfig,

    chain: Arc<dyn ChainReader>,
    proposer: Arc<dyn BallotProposer>,
    broadcaster: Arc<dyn BallotBroadcaster>,
    local_node: Arc<LocalNode>,
}

impl StateManager {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        proposer: Arc<dyn BallotProposer>,
        broadcaster: Arc<dyn BallotBroadcaster>,
        local_node: Arc<LocalNode>,
        config: IsaacConfig,
        genesis: DateTime<Utc>,
    ) -> Arc<Self> {
        let (transit_tx, transit_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = mpsc::channel(1);

        Arc::new(Self {
            shared: Shared {
                state: RwLock::new(IsaacState::default()),
                block_time_buffer: RwLock::new(INITIAL_BLOCK_TIME_BUFFER),
                transit_signal: RwLock::new(None),
            },
            transit_tx,
            transit_rx: Mutex::new(Some(transit_rx)),
            stop_tx,
            stop_rx: Mutex::new(Some(stop_rx)),
            genesis,
            config,
            chain,
            proposer,
            broadcaster,
            local_node,
        })
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> IsaacState {
        *self.shared.state.read()
    }

    /// The currently cached pre-propose buffer.
    pub fn block_time_buffer(&self) -> Duration {
        *self.shared.block_time_buffer.read()
    }

    /// Register the callback invoked on every adopted state.
    ///
    /// The callback runs on the event-loop task and must not call
    /// `set_transit_signal` from within itself.
    pub fn set_transit_signal(&self, signal: impl Fn(IsaacState) + Send + Sync + 'static) {
        *self.shared.transit_signal.write() = Some(Box::new(signal));
    }

    fn emit_transit_signal(&self, state: IsaacState) {
        if let Some(signal) = self.shared.transit_signal.read().as_ref() {
            signal(state);
        }
    }

    /// Submit a transition toward `(height, round, ballot_state)`.
    ///
    /// Targets that are not strictly later than the current state are
    /// silently dropped; this gate is what keeps duplicate and stale
    /// ballots from regressing the machine. Accepted targets are sent to
    /// the event loop from a detached task so callers never block.
    pub fn transit_to(&self, height: u64, round: u64, ballot_state: BallotState) {
        let current = self.state();
        let target = IsaacState::new(height, round, ballot_state);

        if current.is_later(&target) {
            let transit_tx = self.transit_tx.clone();
            tokio::spawn(async move {
                let _ = transit_tx.send(target).await;
            });
        } else {
            trace!(%current, %target, "dropping non-later transition");
        }
    }

    fn increase_round(&self) {
        let state = self.state();
        debug!(height = state.height, round = state.round, "increase round");
        self.transit_to(state.height, state.round + 1, BallotState::Init);
    }

    fn next_height(&self) {
        let state = self.state();
        debug!(height = state.height, round = state.round, "next height");
        self.transit_to(state.height + 1, 0, BallotState::Init);
    }

    /// Spawn the event loop.
    ///
    /// # Panics
    ///
    /// Panics when called twice; the manager owns exactly one loop.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let transit_rx = self
            .transit_rx
            .lock()
            .take()
            .expect("state manager already started");
        let stop_rx = self
            .stop_rx
            .lock()
            .take()
            .expect("state manager already started");

        let manager = Arc::clone(self);
        tokio::spawn(manager.run(transit_rx, stop_rx))
    }

    /// Request the loop to terminate. Posted from a detached task so the
    /// caller never blocks, even if the loop is mid-iteration.
    pub fn stop(&self) {
        let stop_tx = self.stop_tx.clone();
        tokio::spawn(async move {
            let _ = stop_tx.send(()).await;
        });
    }

    async fn run(
        self: Arc<Self>,
        mut transit_rx: mpsc::Receiver<IsaacState>,
        mut stop_rx: mpsc::Receiver<()>,
    ) {
        debug!(state = %self.state(), "state manager started");

        let timer = sleep(IDLE_TIMEOUT);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                biased;

                // Stop has priority: once observed, no further transition
                // or timeout is processed.
                _ = stop_rx.recv() => {
                    debug!("stop signal received");
                    return;
                }

                () = &mut timer => {
                    let state = self.state();
                    debug!(%state, "ballot state timeout");

                    if state.ballot_state == BallotState::Accept {
                        // No agreement this round: re-pace and retry the
                        // height at the next round. No expiration ballot.
                        self.set_block_time_buffer();
                        self.increase_round();
                        timer.as_mut().reset(Instant::now() + IDLE_TIMEOUT);
                    } else {
                        self.spawn_expiration_broadcast(state);
                        let advanced = self.advance_ballot_state();
                        timer
                            .as_mut()
                            .reset(Instant::now() + self.ballot_timeout(advanced.ballot_state));
                        self.emit_transit_signal(advanced);
                    }
                }

                Some(target) = transit_rx.recv() => {
                    match target.ballot_state {
                        BallotState::Init => {
                            if self.propose_or_wait(timer.as_mut(), target, &mut stop_rx).await {
                                debug!("stop signal received during propose sleep");
                                return;
                            }
                        }
                        BallotState::Sign => {
                            self.adopt(target);
                            timer.as_mut().reset(Instant::now() + self.config.timeout_sign);
                        }
                        BallotState::Accept => {
                            self.adopt(target);
                            timer.as_mut().reset(Instant::now() + self.config.timeout_accept);
                        }
                        BallotState::AllConfirm => {
                            self.adopt(target);
                            self.set_block_time_buffer();
                            self.next_height();
                            // The INIT transition just requested re-arms the
                            // timer; park it meanwhile.
                            timer.as_mut().reset(Instant::now() + IDLE_TIMEOUT);
                        }
                    }
                }
            }
        }
    }

    /// Adopt `target` as the current state and notify observers.
    fn adopt(&self, target: IsaacState) {
        {
            let mut state = self.shared.state.write();
            trace!(current = %*state, %target, "adopting state");
            *state = target;
        }
        self.emit_transit_signal(target);
    }

    /// Advance only the ballot state, in place, returning the new state.
    fn advance_ballot_state(&self) -> IsaacState {
        let mut state = self.shared.state.write();
        state.ballot_state = state.ballot_state.next();
        *state
    }

    fn ballot_timeout(&self, state: BallotState) -> Duration {
        match state {
            BallotState::Init => self.config.timeout_init,
            BallotState::Sign => self.config.timeout_sign,
            BallotState::Accept => self.config.timeout_accept,
            // ALLCONFIRM never expires; it transitions synchronously into
            // the next height.
            BallotState::AllConfirm => IDLE_TIMEOUT,
        }
    }

    /// Entry into a round: propose if the local node is the selected
    /// proposer, otherwise wait for the proposer's ballot.
    ///
    /// Returns `true` when a stop signal arrived during the pre-propose
    /// sleep, in which case the caller must terminate without adopting
    /// `target`.
    async fn propose_or_wait(
        &self,
        mut timer: Pin<&mut Sleep>,
        target: IsaacState,
        stop_rx: &mut mpsc::Receiver<()>,
    ) -> bool {
        timer.as_mut().reset(Instant::now() + IDLE_TIMEOUT);

        let proposer = self.chain.select_proposer(target.height, target.round);
        debug!(%proposer, height = target.height, round = target.round, "selected proposer");

        if &proposer == self.local_node.address() {
            // The per-round timeout stays parked during this sleep; only a
            // stop signal may cut it short, and stop wins the race.
            let buffer = self.block_time_buffer();
            tokio::select! {
                biased;
                _ = stop_rx.recv() => return true,
                _ = sleep(buffer) => {}
            }

            match self.proposer.propose_new_ballot(target.round) {
                Ok(_) => {
                    debug!(round = target.round, "proposed new ballot");
                }
                Err(err) => {
                    // Not fatal: the timeout below expires the round toward
                    // an EXP vote.
                    error!(
                        %err,
                        height = self.chain.latest_block().height,
                        "failed to propose new ballot"
                    );
                }
            }
            timer.as_mut().reset(Instant::now() + self.config.timeout_init);
        } else {
            timer
                .as_mut()
                .reset(Instant::now() + self.block_time_buffer() + self.config.timeout_init);
        }

        self.adopt(target);
        false
    }

    /// Recompute the cached pre-propose buffer from the latest block.
    fn set_block_time_buffer(&self) {
        let latest = self.chain.latest_block();
        let now = Utc::now();

        let proposed = ballot_proposed_time(&latest.confirmed);
        let until_now = now.signed_duration_since(proposed).to_std().unwrap_or_default();
        let average = calculate_average_block_time(now, self.genesis, latest.height);
        let buffer = calculate_block_time_buffer(
            self.config.block_time,
            average,
            until_now,
            BLOCK_TIME_DELTA,
        );

        debug!(
            ?buffer,
            block_time = ?self.config.block_time,
            ?average,
            height = latest.height,
            confirmed = %latest.confirmed,
            "recalculated block time buffer"
        );
        *self.shared.block_time_buffer.write() = buffer;
    }

    /// Fire-and-forget broadcast of an expiration ballot for `state`.
    ///
    /// Runs detached so the loop keeps multiplexing during network I/O;
    /// the task receives everything it needs by value or behind `Arc`s.
    fn spawn_expiration_broadcast(&self, state: IsaacState) {
        let chain = Arc::clone(&self.chain);
        let broadcaster = Arc::clone(&self.broadcaster);
        let local_node = Arc::clone(&self.local_node);
        let network_id = self.config.network_id.clone();
        let common_account = self.config.common_account.clone();
        let initial_balance = self.config.initial_balance;

        tokio::spawn(async move {
            debug!(%state, "broadcasting expiration ballot");

            let latest = chain.latest_block();
            let basis = Basis {
                round: state.round,
                height: latest.height,
                block_hash: latest.hash,
                total_txs: latest.total_txs,
                total_ops: latest.total_ops,
            };
            let proposer_addr = chain.select_proposer(latest.height, state.round);

            let mut ballot = Ballot::new(
                local_node.address().clone(),
                proposer_addr,
                basis,
                Vec::new(),
            );
            ballot.set_vote(state.ballot_state.next(), Vote::Exp);

            let collect_tx_fee =
                Operation::collect_tx_fee_from_ballot(&ballot, common_account.clone());
            let inflation =
                Operation::inflation_from_ballot(&ballot, common_account, initial_balance);
            ballot.set_proposer_transaction(ProposerTransaction::from_ballot(
                &ballot,
                collect_tx_fee,
                inflation,
            ));

            let keypair = local_node.keypair();
            ballot.sign_by_proposer(keypair, &network_id);
            ballot.sign(keypair, &network_id);

            broadcaster.broadcast(ballot);
        });
    }
}
