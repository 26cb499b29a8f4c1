//! Add a mutation to the queue without dispatching it.

use anyhow::{bail, Context, Result};
use std::path::Path;
use sync_types::{LocalId, Mutation, MutationRecord};

pub async fn run(data_dir: &Path, kind: &str, local_id: i64, payload: &str) -> Result<()> {
    let mutation = parse_mutation(kind, payload)?;
    let record = MutationRecord::new(mutation, LocalId::new(local_id));
    let id = record.id;

    let store = super::open_queue_store(data_dir).await?;
    let mut records = store.load_queue().await?;
    records.push(record);
    store.save_queue(&records).await?;

    println!("Enqueued {} ({} queued)", id, records.len());
    Ok(())
}

fn parse_mutation(kind: &str, payload: &str) -> Result<Mutation> {
    match kind {
        "workout" => Ok(Mutation::WorkoutUpsert(
            serde_json::from_str(payload).context("Invalid workout payload")?,
        )),
        "set" => Ok(Mutation::SetAppend(
            serde_json::from_str(payload).context("Invalid set payload")?,
        )),
        "recovery" => Ok(Mutation::RecoveryAssessmentCreate(
            serde_json::from_str(payload).context("Invalid recovery payload")?,
        )),
        other => bail!("Unknown mutation kind: {other} (expected workout, set or recovery)"),
    }
}
