//! Drain the queue against the configured backend.

use anyhow::Result;
use std::path::Path;
use std::time::{Duration, Instant};

pub async fn run(data_dir: &Path, timeout: Duration) -> Result<()> {
    let engine = super::open_engine(data_dir).await?;

    let before = engine.list_queue().await.len();
    if before == 0 {
        println!("Nothing to sync");
        return Ok(());
    }
    let dead_before = engine.list_dead_letter().await.len();

    println!("Syncing {} records...", before);
    engine.start().await;
    engine.trigger_sync();

    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if engine.list_queue().await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    engine.stop().await;

    let pending = engine.list_queue().await.len();
    let dead = engine.list_dead_letter().await.len();
    let newly_dead = dead.saturating_sub(dead_before);
    let synced = before.saturating_sub(pending).saturating_sub(newly_dead);

    println!(
        "Synced {synced} of {before} records ({pending} pending, {newly_dead} dead-lettered)"
    );
    Ok(())
}
