//! One flush of a digest batch: pending records in, ranked digest out

use crate::digest_core::{
    split_key, CountingService, Digest, DigestBuilder, DigestError, DigestLog, GroupRepository,
    KeyError, ProjectId, ProjectRepository, Record, RuleRepository,
};
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Digest(#[from] DigestError),
}

/// Read the pending records for one project, newest first
///
/// Lines that fail to parse are logged and skipped.
pub async fn read_pending_records(
    path: impl AsRef<Path>,
    project_id: ProjectId,
) -> Result<Vec<Record>, FlushError> {
    let file = File::open(path.as_ref()).await?;
    let mut lines = BufReader::new(file).lines();

    let mut records = Vec::new();
    let mut skipped = 0usize;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match Record::from_jsonl(&line) {
            Ok(record) if record.value.event.project_id == project_id => records.push(record),
            Ok(_) => {}
            Err(e) => {
                skipped += 1;
                log::warn!("Failed to parse digest record: {} ({})", line, e);
            }
        }
    }

    records.sort_by(|a, b| b.timestamp.total_cmp(&a.timestamp));
    log::debug!(
        "📥 Read {} pending records for project {} ({} unparseable)",
        records.len(),
        project_id,
        skipped
    );
    Ok(records)
}

/// Resolve `key` and build the digest for its pending records
pub async fn flush_key<S>(
    store: &S,
    key: &str,
    records_path: impl AsRef<Path>,
    log: Arc<dyn DigestLog>,
) -> Result<Option<Digest>, FlushError>
where
    S: ProjectRepository + GroupRepository + RuleRepository + CountingService,
{
    let (project, target_type, _, _) = split_key(key, store)?;
    log::info!(
        "⏱️  Flushing {} (project {}, target {})",
        key,
        project.slug,
        target_type.as_str()
    );

    let records = read_pending_records(records_path, project.id).await?;
    let (digest, warnings) = DigestBuilder::from_store(store, log).build(&project, &records)?;
    for warning in &warnings {
        log::warn!("{}", warning);
    }

    Ok(digest)
}
