use std::sync::Arc;
use std::time::Duration;

use admit_limit::Sweep;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Periodically sweeps idle per-client state from `targets`.
///
/// Sweeping only drops entries that no longer influence any decision, so this bounds
/// memory without changing admission behaviour. Abort the returned handle to stop it.
///
/// # Panics
///
/// Panics if `every` is zero.
pub fn spawn_reaper(targets: Vec<Arc<dyn Sweep + Send + Sync>>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            let removed: usize = targets.iter().map(|target| target.sweep()).sum();
            debug!(removed, "swept idle admission state");
        }
    })
}
