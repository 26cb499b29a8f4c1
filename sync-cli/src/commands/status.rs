//! Show both queues.

use anyhow::Result;
use std::path::Path;
use sync_types::MutationRecord;

pub async fn run(data_dir: &Path, verbose: bool) -> Result<()> {
    let store = super::open_queue_store(data_dir).await?;
    let queue = store.load_queue().await?;
    let dead = store.load_dead_letter().await?;

    println!("Queued:      {}", queue.len());
    if verbose {
        for record in &queue {
            print_record(record);
        }
    }

    println!("Dead-letter: {}", dead.len());
    if verbose {
        for record in &dead {
            print_record(record);
        }
    }

    Ok(())
}

fn print_record(record: &MutationRecord) {
    let schedule = match record.next_attempt_at {
        Some(due) => format!(" next_attempt_at={due}"),
        None => String::new(),
    };
    println!(
        "  {} {} local_id={} retries={}{}",
        record.id,
        record.kind(),
        record.local_id,
        record.retry_count,
        schedule
    );
}
