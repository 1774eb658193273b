//! Block-time pacing.
//!
//! The state manager sleeps for a computed buffer before proposing so that
//! produced blocks converge on the configured cadence: when the chain has
//! been running fast, the buffer stretches; when it lags, the buffer
//! shrinks. A small deadband keeps the correction from oscillating around
//! the goal.

use chrono::{DateTime, Utc};
use isaac_types::parse_iso8601;
use std::time::Duration;

/// Deadband within which the observed average counts as on-goal.
const EPSILON: Duration = Duration::from_millis(50);

/// Compute the pre-propose sleep buffer.
///
/// - `goal`: target block time from config
/// - `average`: observed average block time since genesis
/// - `until_now`: time elapsed since the previous ballot was proposed
/// - `delta`: correction step applied while outside the deadband
///
/// The result is clamped at zero: a node that is already late proposes
/// immediately.
pub fn calculate_block_time_buffer(
    goal: Duration,
    average: Duration,
    until_now: Duration,
    delta: Duration,
) -> Duration {
    let goal_ms = goal.as_millis() as i128;
    let average_ms = average.as_millis() as i128;
    let until_now_ms = until_now.as_millis() as i128;
    let delta_ms = delta.as_millis() as i128;
    let epsilon_ms = EPSILON.as_millis() as i128;

    let buffer_ms = if (average_ms - goal_ms).abs() < epsilon_ms {
        goal_ms - until_now_ms
    } else if average_ms > goal_ms {
        // Running slow: shave the correction step off the wait.
        goal_ms - delta_ms - until_now_ms
    } else {
        // Running fast: stretch the wait by the correction step.
        goal_ms + delta_ms - until_now_ms
    };

    Duration::from_millis(buffer_ms.max(0) as u64)
}

/// Observed average block time at `block_height`.
///
/// Genesis sits at height 1, so `height - 1` intervals have elapsed.
/// Heights 0 and 1 have no completed interval and fall back to the raw
/// time since genesis.
pub fn calculate_average_block_time(
    now: DateTime<Utc>,
    genesis: DateTime<Utc>,
    block_height: u64,
) -> Duration {
    let since_genesis = now.signed_duration_since(genesis).to_std().unwrap_or_default();

    let intervals = block_height.saturating_sub(1);
    if intervals == 0 {
        since_genesis
    } else {
        since_genesis / u32::try_from(intervals).unwrap_or(u32::MAX)
    }
}

/// When the previous ballot was proposed, from the latest block's
/// `confirmed` field. An unparseable value reads as the zero time, which
/// downstream clamping turns into "propose immediately".
pub fn ballot_proposed_time(confirmed: &str) -> DateTime<Utc> {
    parse_iso8601(confirmed)
}
