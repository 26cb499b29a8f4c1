//! Clear the dead-letter store or the active queue.

use anyhow::Result;
use std::path::Path;

pub async fn run(data_dir: &Path, queue: bool) -> Result<()> {
    let store = super::open_queue_store(data_dir).await?;

    if queue {
        let count = store.load_queue().await?.len();
        store.save_queue(&[]).await?;
        println!("Cleared {count} queued records");
    } else {
        let count = store.load_dead_letter().await?.len();
        store.clear_dead_letter().await?;
        println!("Cleared {count} dead-lettered records");
    }

    Ok(())
}
