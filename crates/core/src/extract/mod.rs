//! Collects raw subscription entries from every text, JSON and YAML file of a workspace.
//!
//! Free-form text goes through an ordered list of [`TextMatcher`] tiers; the first tier
//! that finds anything wins for that file. JSON and YAML files are read structurally.
//! A file that cannot be read or parsed is logged and counted, never fatal.

use std::path::Path;

use tokio::fs;
use tracing::{debug, info, warn};

mod matcher;
mod structured;

pub use matcher::{default_matchers, BareUrlMatcher, LabeledPairMatcher, TextMatcher};
pub use structured::{entries_from_json, entries_from_yaml};
pub(crate) use structured::{json_url, record_list, record_url};

use crate::error::SourceError;
use crate::model::SubscriptionEntry;
use crate::storage::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Text,
    Json,
    Yaml,
}

impl SourceFormat {
    pub fn of(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "txt" => Some(SourceFormat::Text),
            "json" => Some(SourceFormat::Json),
            "yaml" | "yml" => Some(SourceFormat::Yaml),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SourceFormat::Text => "TXT",
            SourceFormat::Json => "JSON",
            SourceFormat::Yaml => "YAML",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatTally {
    pub files: usize,
    pub skipped: usize,
    pub entries: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub text: FormatTally,
    pub json: FormatTally,
    pub yaml: FormatTally,
}

impl ExtractReport {
    pub fn tally(&self, format: SourceFormat) -> &FormatTally {
        match format {
            SourceFormat::Text => &self.text,
            SourceFormat::Json => &self.json,
            SourceFormat::Yaml => &self.yaml,
        }
    }

    fn tally_mut(&mut self, format: SourceFormat) -> &mut FormatTally {
        match format {
            SourceFormat::Text => &mut self.text,
            SourceFormat::Json => &mut self.json,
            SourceFormat::Yaml => &mut self.yaml,
        }
    }

    pub fn total_entries(&self) -> usize {
        self.text.entries + self.json.entries + self.yaml.entries
    }

    pub fn skipped_files(&self) -> usize {
        self.text.skipped + self.json.skipped + self.yaml.skipped
    }
}

pub struct Extractor {
    matchers: Vec<Box<dyn TextMatcher>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self::with_matchers(default_matchers())
    }

    pub fn with_matchers(matchers: Vec<Box<dyn TextMatcher>>) -> Self {
        Self { matchers }
    }

    /// Run the text tiers in order and keep the first non-empty result.
    pub fn extract_text(&self, text: &str) -> Vec<SubscriptionEntry> {
        for matcher in &self.matchers {
            if let Some(entries) = matcher.try_match(text) {
                debug!(tier = matcher.label(), count = entries.len(), "text tier matched");
                return entries;
            }
        }
        Vec::new()
    }

    /// Scan the workspace (non-recursively). The result is unordered and may hold
    /// duplicates.
    pub async fn extract_all(
        &self,
        workspace: &Workspace,
    ) -> anyhow::Result<(Vec<SubscriptionEntry>, ExtractReport)> {
        let mut entries = Vec::new();
        let mut report = ExtractReport::default();

        for path in workspace.list_files().await? {
            let Some(format) = SourceFormat::of(&path) else {
                continue;
            };
            if format == SourceFormat::Json && workspace.is_index_file(&path) {
                continue;
            }

            let tally = report.tally_mut(format);
            tally.files += 1;

            match self.extract_file(&path, format).await {
                Ok(found) => {
                    if found.is_empty() {
                        debug!(path = %path.display(), "no subscriptions in file");
                    }
                    tally.entries += found.len();
                    entries.extend(found);
                }
                Err(err) => {
                    warn!(error = %err, "skipping input file");
                    tally.skipped += 1;
                }
            }
        }

        for format in [SourceFormat::Text, SourceFormat::Json, SourceFormat::Yaml] {
            let tally = report.tally(format);
            info!(
                format = format.label(),
                files = tally.files,
                skipped = tally.skipped,
                entries = tally.entries,
                "extraction finished"
            );
        }

        Ok((entries, report))
    }

    async fn extract_file(
        &self,
        path: &Path,
        format: SourceFormat,
    ) -> Result<Vec<SubscriptionEntry>, SourceError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| SourceError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        match format {
            SourceFormat::Text => Ok(self.extract_text(&content)),
            SourceFormat::Json => entries_from_json(&content).map_err(|source| SourceError::Json {
                path: path.to_path_buf(),
                source,
            }),
            SourceFormat::Yaml => entries_from_yaml(&content).map_err(|source| SourceError::Yaml {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
