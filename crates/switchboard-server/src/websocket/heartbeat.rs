//! Heartbeat liveness monitoring.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use super::connection::WebConn;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// No inbound activity for `timeout`.
    TimedOut,
    /// The connection closed first.
    Cancelled,
}

/// Number of silent ticks tolerated before giving up.
fn max_missed(interval: Duration, timeout: Duration) -> u32 {
    let interval_ms = interval.as_millis().max(1);
    u32::try_from(timeout.as_millis() / interval_ms)
        .unwrap_or(u32::MAX)
        .max(1)
}

/// Watch a connection's alive flag.
///
/// At each `interval` tick the flag is read and cleared. Once
/// `timeout / interval` consecutive ticks pass without activity the loop
/// returns [`HeartbeatResult::TimedOut`].
pub async fn run_heartbeat(
    connection: Arc<WebConn>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    let _ = ticker.tick().await;

    let limit = max_missed(interval, timeout);
    let mut missed: u32 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if connection.check_alive() {
                    missed = 0;
                } else {
                    missed += 1;
                    if missed >= limit {
                        return HeartbeatResult::TimedOut;
                    }
                }
            }
            () = cancel.cancelled() => return HeartbeatResult::Cancelled,
        }
    }
}
