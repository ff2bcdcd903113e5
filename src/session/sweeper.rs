use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use super::memory::MemoryBackend;

/// Default sweep period.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Spawn the periodic sweep of expired records from the in-process map.
///
/// The cache expires its own keys and is not touched. Stops when `shutdown` is cancelled.
pub fn spawn_sweeper(
    sessions: Arc<MemoryBackend>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_sweeper(sessions, every, shutdown))
}

pub async fn run_sweeper(sessions: Arc<MemoryBackend>, every: Duration, shutdown: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "Starting session sweeper");
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                tracing::info!("Session sweeper stopped");
                break;
            }
            _ = ticker.tick() => {
                let removed = sessions.purge_expired(OffsetDateTime::now_utc()).await;
                if removed > 0 {
                    tracing::info!(removed, "Swept expired sessions");
                }
            }
        }
    }
}
