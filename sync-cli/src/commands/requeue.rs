//! Move every dead-lettered record back to the queue.

use anyhow::Result;
use std::path::Path;

pub async fn run(data_dir: &Path) -> Result<()> {
    let store = super::open_queue_store(data_dir).await?;

    let dead = store.load_dead_letter().await?;
    if dead.is_empty() {
        println!("No dead-lettered records");
        return Ok(());
    }

    let mut queue = store.load_queue().await?;
    let count = dead.len();
    for mut record in dead {
        record.retry_count = 0;
        record.next_attempt_at = None;
        queue.push(record);
    }

    // Queue snapshot first: interrupted here, the records are still in
    // the dead-letter snapshot and load keeps that copy.
    store.save_queue(&queue).await?;
    store.clear_dead_letter().await?;

    println!("Requeued {count} records ({} queued)", queue.len());
    Ok(())
}
