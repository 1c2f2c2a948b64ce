//! Interval-driven backup runs.

use crate::archiver::Archiver;
use crate::executor::{BackupExecutor, BackupJob};
use crate::utils::errors::Result;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::info;

/// Run `job` immediately and then every `every`, until `shutdown` fires.
///
/// Runs never overlap: the next tick is only awaited after the previous run
/// has recorded its outcome. A shutdown that arrives during a run is honoured
/// before any further tick, even one that came due meanwhile. A failed backup
/// is recorded and the loop keeps going; a failure to write the log stops it.
pub async fn run_every<A: Archiver>(
    executor: &BackupExecutor<A>,
    job: &BackupJob,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Backing up {} every {:?}", job.source_dir.display(), every);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                info!("Stopping scheduled backups");
                return Ok(());
            }
            _ = interval.tick() => {}
        }

        let outcome = executor.execute(job).await?;
        info!("Scheduled run {}", outcome);
    }
}
