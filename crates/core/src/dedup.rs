use std::collections::{HashMap, HashSet};

use serde_json::Value as JsonValue;
use serde_yaml::Value;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::extract::{json_url, record_list, record_url, SourceFormat};
use crate::model::{SubscriptionEntry, Target};
use crate::storage::Workspace;

/// URLs already recorded by a previous run, captured once before deduplication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingState {
    urls: HashSet<String>,
}

impl ExistingState {
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub async fn load(workspace: &Workspace, target: Target) -> anyhow::Result<Self> {
        let state = match target {
            Target::Nekobox => Self::from_entry_files(workspace).await?,
            Target::Singbox => Self::from_aggregated_file(workspace).await,
        };
        info!(target = %target, known = state.len(), "loaded existing subscriptions");
        Ok(state)
    }

    /// `url` of every per-entry JSON file in the workspace.
    pub async fn from_entry_files(workspace: &Workspace) -> anyhow::Result<Self> {
        let mut urls = HashSet::new();

        for path in workspace.list_files().await? {
            if SourceFormat::of(&path) != Some(SourceFormat::Json) || workspace.is_index_file(&path)
            {
                continue;
            }

            let raw = match fs::read_to_string(&path).await {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "cannot read existing entry file");
                    continue;
                }
            };
            match serde_json::from_str::<JsonValue>(&raw) {
                Ok(value) => {
                    if let Some(url) = json_url(&value) {
                        urls.insert(url.trim().to_string());
                    }
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "cannot parse existing entry file");
                }
            }
        }

        Ok(Self { urls })
    }

    /// `url` of every record in the aggregated YAML file. Missing or unreadable means empty.
    pub async fn from_aggregated_file(workspace: &Workspace) -> Self {
        let path = workspace.aggregated_file();
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot read aggregated file");
                return Self::default();
            }
        };

        let value: Value = match serde_yaml::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot parse aggregated file");
                return Self::default();
            }
        };

        let urls = record_list(&value)
            .map(|records| {
                records
                    .iter()
                    .filter_map(record_url)
                    .map(|url| url.trim().to_string())
                    .collect()
            })
            .unwrap_or_default();

        Self { urls }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupReport {
    /// Exact `(name, url)` repeats within the batch.
    pub duplicates: usize,
    /// Entries whose URL was already recorded.
    pub already_known: usize,
}

pub fn deduplicate(
    candidates: Vec<SubscriptionEntry>,
    existing: &ExistingState,
) -> Vec<SubscriptionEntry> {
    deduplicate_counted(candidates, existing).0
}

/// Keep the first occurrence of each `(name, url)` pair, then drop entries whose URL is
/// already known. Order of first occurrences is preserved.
pub fn deduplicate_counted(
    candidates: Vec<SubscriptionEntry>,
    existing: &ExistingState,
) -> (Vec<SubscriptionEntry>, DedupReport) {
    let mut report = DedupReport::default();
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for entry in candidates {
        if !seen.insert((entry.name.clone(), entry.url.clone())) {
            debug!(name = %entry.name, url = %entry.url, "skipping exact duplicate");
            report.duplicates += 1;
            continue;
        }
        if existing.contains(&entry.url) {
            debug!(name = %entry.name, url = %entry.url, "skipping known subscription");
            report.already_known += 1;
            continue;
        }
        out.push(entry);
    }

    info!(
        kept = out.len(),
        duplicates = report.duplicates,
        already_known = report.already_known,
        "deduplication finished"
    );
    (out, report)
}

/// Suffix repeated names with ` (N)`: the first occurrence keeps its name, the second
/// becomes `name (1)`, the third `name (2)`.
pub fn disambiguate_names(entries: &[SubscriptionEntry]) -> Vec<SubscriptionEntry> {
    let mut counts: HashMap<&str, usize> = HashMap::new();

    entries
        .iter()
        .map(|entry| {
            let seen = counts.entry(entry.name.as_str()).or_insert(0);
            let mut out = entry.clone();
            if *seen > 0 {
                out.name = format!("{} ({})", entry.name, seen);
            }
            *seen += 1;
            out
        })
        .collect()
}
