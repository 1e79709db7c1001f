use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use super::{create_json_file, StateWriter, WriteSummary};
use crate::dedup::disambiguate_names;
use crate::error::WriteError;
use crate::index::{GroupIndex, IndexSource};
use crate::model::{SubscriptionEntry, Target};
use crate::storage::Workspace;

/// One group file as the client stores it. Field order is the on-disk key order.
#[derive(Debug, Serialize)]
struct GroupFile<'a> {
    archive: bool,
    front_proxy_id: i64,
    id: u64,
    info: &'a str,
    landing_proxy_id: i64,
    lastup: u64,
    manually_column_width: bool,
    name: &'a str,
    skip_auto_update: bool,
    url: &'a str,
}

impl<'a> GroupFile<'a> {
    fn new(id: u64, entry: &'a SubscriptionEntry) -> Self {
        Self {
            archive: false,
            front_proxy_id: -1,
            id,
            info: "",
            landing_proxy_id: -1,
            lastup: 0,
            manually_column_width: false,
            name: &entry.name,
            skip_auto_update: false,
            url: &entry.url,
        }
    }
}

/// Writes `<id>.json` per entry and registers the ids in `pm.json`.
pub struct NekoboxWriter {
    workspace: Workspace,
}

impl NekoboxWriter {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl StateWriter for NekoboxWriter {
    fn target(&self) -> Target {
        Target::Nekobox
    }

    async fn write(&self, entries: &[SubscriptionEntry]) -> WriteSummary {
        let index_path = self.workspace.index_file();
        let mut index = GroupIndex::load(&index_path).await;
        let mut summary = WriteSummary::default();

        // Ids cannot be allocated safely without the record of what is taken.
        if index.source() == IndexSource::Unreadable {
            warn!(
                path = %index_path.display(),
                skipped = entries.len(),
                "group index is unreadable, no group files written"
            );
            summary.failed = entries.len();
            return summary;
        }

        let mut ids = index.allocator();
        let mut new_ids = Vec::new();
        let named = disambiguate_names(entries);

        for (position, entry) in named.iter().enumerate() {
            // A failed write still consumes its id.
            let Some(id) = ids.allocate() else {
                let err = WriteError::Refused {
                    path: index_path.clone(),
                    reason: "no group ids left to allocate".into(),
                };
                warn!(error = %err, skipped = named.len() - position, "group id space exhausted");
                summary.failed += named.len() - position;
                break;
            };
            let path = self.workspace.entry_file(id);
            match create_json_file(&path, &GroupFile::new(id, entry)).await {
                Ok(()) => {
                    info!(id, name = %entry.name, path = %path.display(), "group file created");
                    new_ids.push(id);
                    summary.written += 1;
                }
                Err(err) => {
                    warn!(id, error = %err, "failed to create group file");
                    summary.failed += 1;
                }
            }
        }

        if new_ids.is_empty() {
            return summary;
        }

        index.extend(&new_ids);
        if let Err(err) = index.save(&index_path).await {
            warn!(error = %err, added = new_ids.len(), "failed to update group index");
            summary.failed += 1;
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value as JsonValue};
    use tempfile::TempDir;
    use tokio::fs;

    async fn read_json(path: &std::path::Path) -> JsonValue {
        serde_json::from_str(&fs::read_to_string(path).await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn writes_group_files_after_the_highest_id() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::new(temp_dir.path());
        fs::write(workspace.index_file(), r#"{"groups": [3, 7, 1], "active": 7}"#)
            .await
            .unwrap();

        let entries = vec![
            SubscriptionEntry::new("A", "http://u1.example"),
            SubscriptionEntry::new("A", "http://u2.example"),
            SubscriptionEntry::new("B", "http://u3.example"),
        ];
        let summary = NekoboxWriter::new(workspace.clone()).write(&entries).await;
        assert_eq!(summary, WriteSummary { written: 3, failed: 0 });

        assert_eq!(
            read_json(&workspace.entry_file(8)).await,
            json!({
                "archive": false,
                "front_proxy_id": -1,
                "id": 8,
                "info": "",
                "landing_proxy_id": -1,
                "lastup": 0,
                "manually_column_width": false,
                "name": "A",
                "skip_auto_update": false,
                "url": "http://u1.example"
            })
        );
        assert_eq!(read_json(&workspace.entry_file(9)).await["name"], "A (1)");
        assert_eq!(read_json(&workspace.entry_file(10)).await["name"], "B");

        let index = read_json(&workspace.index_file()).await;
        assert_eq!(index["groups"], json!([3, 7, 1, 8, 9, 10]));
        assert_eq!(index["active"], 7);
    }

    #[tokio::test]
    async fn group_file_keeps_client_key_order() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::new(temp_dir.path());

        NekoboxWriter::new(workspace.clone())
            .write(&[SubscriptionEntry::new("节点", "http://a.example")])
            .await;

        let raw = fs::read_to_string(workspace.entry_file(0)).await.unwrap();
        let keys: Vec<_> = raw
            .lines()
            .filter_map(|line| line.trim().strip_prefix('"'))
            .filter_map(|rest| rest.split('"').next())
            .collect();
        assert_eq!(
            keys,
            vec![
                "archive",
                "front_proxy_id",
                "id",
                "info",
                "landing_proxy_id",
                "lastup",
                "manually_column_width",
                "name",
                "skip_auto_update",
                "url"
            ]
        );
        assert!(raw.contains("\"name\": \"节点\""));
        assert!(raw.starts_with("{\n    \"archive\": false,"));
    }

    #[tokio::test]
    async fn nothing_written_leaves_index_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::new(temp_dir.path());

        let summary = NekoboxWriter::new(workspace.clone()).write(&[]).await;
        assert_eq!(summary, WriteSummary::default());
        assert!(!workspace.index_file().exists());
    }

    #[tokio::test]
    async fn unreadable_index_leaves_group_files_alone() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::new(temp_dir.path());
        fs::write(workspace.index_file(), "{ broken").await.unwrap();
        let old = r#"{"id": 0, "name": "Old", "url": "http://old.example"}"#;
        fs::write(workspace.entry_file(0), old).await.unwrap();

        let summary = NekoboxWriter::new(workspace.clone())
            .write(&[SubscriptionEntry::new("New", "http://new.example")])
            .await;

        assert_eq!(summary, WriteSummary { written: 0, failed: 1 });
        assert_eq!(fs::read_to_string(workspace.entry_file(0)).await.unwrap(), old);
        assert_eq!(
            fs::read_to_string(workspace.index_file()).await.unwrap(),
            "{ broken"
        );
    }

    #[tokio::test]
    async fn existing_group_file_is_never_overwritten() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::new(temp_dir.path());
        let stray = r#"{"name": "Stray"}"#;
        fs::write(workspace.entry_file(0), stray).await.unwrap();

        let summary = NekoboxWriter::new(workspace.clone())
            .write(&[
                SubscriptionEntry::new("A", "http://a.example"),
                SubscriptionEntry::new("B", "http://b.example"),
            ])
            .await;

        assert_eq!(summary, WriteSummary { written: 1, failed: 1 });
        assert_eq!(fs::read_to_string(workspace.entry_file(0)).await.unwrap(), stray);
        assert_eq!(read_json(&workspace.entry_file(1)).await["name"], "B");
        assert_eq!(read_json(&workspace.index_file()).await, json!({"groups": [1]}));
    }

    #[tokio::test]
    async fn exhausted_id_space_fails_cleanly() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::new(temp_dir.path());
        let index = r#"{"groups": [18446744073709551615]}"#;
        fs::write(workspace.index_file(), index).await.unwrap();

        let summary = NekoboxWriter::new(workspace.clone())
            .write(&[
                SubscriptionEntry::new("A", "http://a.example"),
                SubscriptionEntry::new("B", "http://b.example"),
            ])
            .await;

        assert_eq!(summary, WriteSummary { written: 0, failed: 2 });
        assert_eq!(fs::read_to_string(workspace.index_file()).await.unwrap(), index);
    }
}
