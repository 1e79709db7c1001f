use std::path::Path;

use tracing::{info, warn};

use super::write_json_file;
use crate::error::WriteError;
use crate::model::SubscriptionEntry;
use crate::storage::Workspace;

/// Write a JSON array of `{name, url}` records.
pub async fn write_report(path: &Path, entries: &[SubscriptionEntry]) -> Result<(), WriteError> {
    write_json_file(path, entries).await?;
    info!(path = %path.display(), count = entries.len(), "report written");
    Ok(())
}

/// Write `suc.jpg`, and `fa.jpg` when there was a verification pass. Returns how many reports
/// could not be written.
pub async fn write_reports(
    workspace: &Workspace,
    accepted: &[SubscriptionEntry],
    rejected: Option<&[SubscriptionEntry]>,
) -> usize {
    let mut reports = vec![(workspace.success_report(), accepted)];
    if let Some(rejected) = rejected {
        reports.push((workspace.failure_report(), rejected));
    }

    let mut failures = 0;
    for (path, entries) in reports {
        if let Err(err) = write_report(&path, entries).await {
            warn!(error = %err, "failed to write report");
            failures += 1;
        }
    }
    failures
}
