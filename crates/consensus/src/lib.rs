//! ISAAC consensus state management.
//!
//! This crate drives a node's progression through consensus rounds:
//!
//! - [`StateManager`]: a cooperative event loop multiplexing the per-state
//!   timeout, externally submitted transitions, and the stop signal. It
//!   decides when the local node proposes, when it waits, when a round has
//!   expired, and broadcasts expiration ballots.
//! - [`block_time`]: the pacer computing the pre-propose sleep that keeps
//!   produced blocks converging on the configured cadence.
//! - [`ports`]: the outbound interfaces the manager drives (chain façade,
//!   ballot factory, broadcaster). Network transport and ballot aggregation
//!   live behind them.
//!
//! # Architecture
//!
//! All state mutation happens on the single event-loop task; external
//! callers read snapshots through a readers-writer lock and submit
//! transitions over a channel. Transitions that are not strictly later than
//! the current state are silently dropped at the submission gate, which is
//! what keeps duplicate and late ballots from regressing the machine.

pub mod block_time;
mod config;
pub mod ports;
mod state_manager;

pub use config::IsaacConfig;
pub use ports::{BallotBroadcaster, BallotProposer, ChainReader, ProposeError};
pub use state_manager::StateManager;
