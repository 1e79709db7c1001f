use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::dedup::{deduplicate_counted, DedupReport, ExistingState};
use crate::extract::{ExtractReport, Extractor};
use crate::model::{AggregateStyle, SubscriptionEntry, Target};
use crate::output::{write_reports, writer_for, WriteSummary};
use crate::storage::Workspace;
use crate::verify::{ProbeSettings, VerificationOutcome, Verifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub target: Target,
    pub verify: bool,
    pub style: AggregateStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    NothingExtracted,
    NothingNew,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub extract: ExtractReport,
    pub dedup: DedupReport,
    pub accepted: Vec<SubscriptionEntry>,
    pub rejected: Vec<VerificationOutcome>,
    pub write: WriteSummary,
    pub report_failures: usize,
    pub stopped: Option<StopReason>,
}

/// Extract, deduplicate, optionally verify, then write reports and target state.
///
/// Stops before touching any file when nothing was extracted or nothing is new.
pub async fn run_pipeline(
    workspace: &Workspace,
    options: &RunOptions,
    probe: ProbeSettings,
) -> anyhow::Result<RunSummary> {
    run_pipeline_with(workspace, options, |_| Ok(probe)).await
}

/// Like [`run_pipeline`], but the probe settings are only resolved once there are new
/// entries to verify. `resolve_probe` receives the number of pending entries and is never
/// called for runs without verification or runs that stop early.
pub async fn run_pipeline_with<F>(
    workspace: &Workspace,
    options: &RunOptions,
    resolve_probe: F,
) -> anyhow::Result<RunSummary>
where
    F: FnOnce(usize) -> anyhow::Result<ProbeSettings>,
{
    let mut summary = RunSummary::default();

    let (candidates, extract) = Extractor::new()
        .extract_all(workspace)
        .await
        .context("failed to scan workspace")?;
    summary.extract = extract;
    if candidates.is_empty() {
        info!("no subscriptions found");
        summary.stopped = Some(StopReason::NothingExtracted);
        return Ok(summary);
    }

    let existing = ExistingState::load(workspace, options.target)
        .await
        .context("failed to load existing subscriptions")?;
    let (fresh, dedup) = deduplicate_counted(candidates, &existing);
    summary.dedup = dedup;
    if fresh.is_empty() {
        info!("every subscription is already known");
        summary.stopped = Some(StopReason::NothingNew);
        return Ok(summary);
    }

    if options.verify {
        let probe = resolve_probe(fresh.len())?;
        let verifier = Arc::new(Verifier::new(probe)?);
        info!(count = fresh.len(), "verifying subscriptions");
        let (alive, dead): (Vec<_>, Vec<_>) = verifier
            .verify_all(fresh)
            .await
            .into_iter()
            .partition(|outcome| outcome.success);
        info!(alive = alive.len(), dead = dead.len(), "verification finished");

        summary.accepted = alive.into_iter().map(|outcome| outcome.entry).collect();
        summary.rejected = dead;
        let rejected: Vec<_> = summary
            .rejected
            .iter()
            .map(|outcome| outcome.entry.clone())
            .collect();
        summary.report_failures =
            write_reports(workspace, &summary.accepted, Some(rejected.as_slice())).await;
    } else {
        summary.accepted = fresh;
        summary.report_failures = write_reports(workspace, &summary.accepted, None).await;
    }

    if !summary.accepted.is_empty() {
        let writer = writer_for(options.target, workspace.clone(), options.style);
        summary.write = writer.write(&summary.accepted).await;
        info!(
            target = %writer.target(),
            written = summary.write.written,
            failed = summary.write.failed,
            "state written"
        );
    }

    Ok(summary)
}
