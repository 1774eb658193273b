//! Node metrics using the native Prometheus client.
//!
//! Metrics are domain-specific rather than generic event counters; use
//! traces for event-level granularity during investigations.

use isaac_types::IsaacState;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, Counter, CounterVec, Encoder, Gauge,
    TextEncoder,
};
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Domain-specific metrics for node monitoring.
pub struct Metrics {
    /// State transitions observed via the transit signal, by ballot state.
    pub state_transitions: CounterVec,
    /// Current consensus height.
    pub consensus_height: Gauge,
    /// Current consensus round within the height.
    pub consensus_round: Gauge,

    /// Proposal ballots built by this node.
    pub ballots_proposed: Counter,
    /// Ballots handed to the broadcast hub (proposals and expirations).
    pub ballots_broadcast: Counter,

    /// Block operations persisted and indexed.
    pub block_operations_saved: Counter,
}

fn metrics() -> &'static Metrics {
    METRICS.get_or_init(|| Metrics {
        state_transitions: register_counter_vec!(
            "isaac_state_transitions_total",
            "State transitions by ballot state",
            &["ballot_state"]
        )
        .expect("metric registration"),
        consensus_height: register_gauge!("isaac_consensus_height", "Current consensus height")
            .expect("metric registration"),
        consensus_round: register_gauge!("isaac_consensus_round", "Current consensus round")
            .expect("metric registration"),
        ballots_proposed: register_counter!(
            "isaac_ballots_proposed_total",
            "Proposal ballots built by this node"
        )
        .expect("metric registration"),
        ballots_broadcast: register_counter!(
            "isaac_ballots_broadcast_total",
            "Ballots handed to the broadcast hub"
        )
        .expect("metric registration"),
        block_operations_saved: register_counter!(
            "isaac_block_operations_saved_total",
            "Block operations persisted and indexed"
        )
        .expect("metric registration"),
    })
}

/// Record an adopted consensus state.
pub fn record_state_transition(state: IsaacState) {
    let m = metrics();
    let ballot_state = state.ballot_state.to_string();
    m.state_transitions
        .with_label_values(&[ballot_state.as_str()])
        .inc();
    m.consensus_height.set(state.height as f64);
    m.consensus_round.set(state.round as f64);
}

pub fn record_ballot_proposed() {
    metrics().ballots_proposed.inc();
}

pub fn record_ballot_broadcast() {
    metrics().ballots_broadcast.inc();
}

pub fn record_block_operation_saved() {
    metrics().block_operations_saved.inc();
}

/// Render the default registry in Prometheus text exposition format.
pub fn render() -> String {
    // Touch the lazily registered metrics so a scrape before the first
    // event still sees them.
    let _ = metrics();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use isaac_types::BallotState;

    #[test]
    fn transitions_update_gauges_and_render() {
        record_state_transition(IsaacState::new(42, 3, BallotState::Sign));
        record_ballot_proposed();
        record_block_operation_saved();

        assert_eq!(metrics().consensus_height.get(), 42.0);
        assert_eq!(metrics().consensus_round.get(), 3.0);

        let rendered = render();
        assert!(rendered.contains("isaac_state_transitions_total"));
        assert!(rendered.contains("isaac_consensus_height"));
    }
}
