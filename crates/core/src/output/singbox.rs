use async_trait::async_trait;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tokio::fs;
use tracing::{info, warn};

use super::{StateWriter, WriteSummary};
use crate::dedup::disambiguate_names;
use crate::model::{AggregateStyle, SubscriptionEntry, Target};
use crate::storage::Workspace;

const PLACEHOLDER_SCRIPT: &str =
    "const onSubscribe = async (proxies, subscription) => {\n  return { proxies, subscription }\n}\n";

#[derive(Debug, Serialize, Default)]
struct RecordHeader {
    request: Mapping,
    response: Mapping,
}

/// A subscription record with every field the client fills in on import.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnrichedRecord<'a> {
    id: String,
    name: &'a str,
    upload: u64,
    download: u64,
    total: u64,
    expire: u64,
    update_time: u64,
    #[serde(rename = "type")]
    kind: &'static str,
    url: &'a str,
    website: &'static str,
    path: String,
    include: &'static str,
    exclude: &'static str,
    include_protocol: &'static str,
    exclude_protocol: &'static str,
    proxy_prefix: &'static str,
    disabled: bool,
    in_secure: bool,
    request_method: &'static str,
    header: RecordHeader,
    proxies: Vec<Value>,
    script: &'static str,
}

impl<'a> EnrichedRecord<'a> {
    fn new(entry: &'a SubscriptionEntry) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: format!("ID_{}", &id[..10]),
            name: &entry.name,
            upload: 0,
            download: 0,
            total: 0,
            expire: 0,
            update_time: 0,
            kind: "Http",
            url: &entry.url,
            website: "",
            path: format!("data/subscribes/{}.json", entry.name),
            include: "",
            exclude: "",
            include_protocol: "",
            exclude_protocol: "",
            proxy_prefix: "",
            disabled: false,
            in_secure: false,
            request_method: "GET",
            header: RecordHeader::default(),
            proxies: Vec::new(),
            script: PLACEHOLDER_SCRIPT,
        }
    }
}

/// Appends new records to `subscribes.yaml`, keeping whatever was already there.
pub struct SingboxWriter {
    workspace: Workspace,
    style: AggregateStyle,
}

impl SingboxWriter {
    pub fn new(workspace: Workspace, style: AggregateStyle) -> Self {
        Self { workspace, style }
    }

    fn record(&self, entry: &SubscriptionEntry) -> Result<Value, serde_yaml::Error> {
        match self.style {
            AggregateStyle::Plain => {
                let mut map = Mapping::new();
                map.insert(Value::from("name"), Value::from(entry.name.as_str()));
                map.insert(Value::from("url"), Value::from(entry.url.as_str()));
                Ok(Value::Mapping(map))
            }
            AggregateStyle::Enriched => serde_yaml::to_value(EnrichedRecord::new(entry)),
        }
    }

    async fn load_existing(&self) -> Option<Value> {
        let path = self.workspace.aggregated_file();
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot read aggregated file, starting a new one");
                return None;
            }
        };
        match serde_yaml::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot parse aggregated file, starting a new one");
                None
            }
        }
    }
}

/// Add records to an aggregated document while keeping its shape: a mapping keeps its other
/// keys and gains the records under `proxies`, a bare list is extended. Anything else is
/// replaced by a bare list.
pub fn merge_records(existing: Option<Value>, records: Vec<Value>) -> Value {
    match existing {
        Some(Value::Mapping(mut map)) if map.contains_key("proxies") => {
            match map.get_mut("proxies") {
                Some(Value::Sequence(list)) => list.extend(records),
                Some(other) => *other = Value::Sequence(records),
                None => {}
            }
            Value::Mapping(map)
        }
        Some(Value::Sequence(mut list)) => {
            list.extend(records);
            Value::Sequence(list)
        }
        Some(_) => {
            warn!("aggregated file has an unrecognised shape, writing a new list");
            Value::Sequence(records)
        }
        None => Value::Sequence(records),
    }
}

#[async_trait]
impl StateWriter for SingboxWriter {
    fn target(&self) -> Target {
        Target::Singbox
    }

    async fn write(&self, entries: &[SubscriptionEntry]) -> WriteSummary {
        let path = self.workspace.aggregated_file();
        let named = disambiguate_names(entries);

        let mut records = Vec::with_capacity(named.len());
        let mut summary = WriteSummary::default();
        for entry in &named {
            match self.record(entry) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(name = %entry.name, error = %err, "failed to encode record");
                    summary.failed += 1;
                }
            }
        }
        if records.is_empty() {
            return summary;
        }

        let added = records.len();
        let document = merge_records(self.load_existing().await, records);
        let result = match serde_yaml::to_string(&document) {
            Ok(yaml) => fs::write(&path, yaml).await.map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };

        match result {
            Ok(()) => {
                info!(path = %path.display(), added, "aggregated file updated");
                summary.written += added;
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to write aggregated file");
                summary.failed += added;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn yaml(raw: &str) -> Value {
        serde_yaml::from_str(raw).unwrap()
    }

    #[test]
    fn merge_keeps_mapping_shape_and_other_keys() {
        let existing = yaml("mode: rule\nproxies:\n  - name: X\n    url: http://b.example\n");
        let merged = merge_records(Some(existing), vec![yaml("name: Y\nurl: http://c.example\n")]);

        assert_eq!(merged["mode"], Value::from("rule"));
        let records = merged["proxies"].as_sequence().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["name"], Value::from("Y"));
    }

    #[test]
    fn merge_extends_bare_lists() {
        let merged = merge_records(Some(yaml("- url: http://a.example\n")), vec![yaml("url: b\n")]);
        assert_eq!(merged.as_sequence().map(|list| list.len()), Some(2));
    }

    #[test]
    fn merge_replaces_unknown_shapes() {
        let merged = merge_records(Some(yaml("port: 7890\n")), vec![yaml("url: b\n")]);
        assert_eq!(merged, yaml("- url: b\n"));

        let merged = merge_records(None, vec![yaml("url: c\n")]);
        assert_eq!(merged, yaml("- url: c\n"));
    }

    #[test]
    fn enriched_record_fields() {
        let entry = SubscriptionEntry::new("Foo", "http://a.example");
        let record = serde_yaml::to_value(EnrichedRecord::new(&entry)).unwrap();

        let id = record["id"].as_str().unwrap();
        assert!(id.starts_with("ID_"));
        assert_eq!(id.len(), 13);
        assert_eq!(record["name"], Value::from("Foo"));
        assert_eq!(record["url"], Value::from("http://a.example"));
        assert_eq!(record["type"], Value::from("Http"));
        assert_eq!(record["updateTime"], Value::from(0));
        assert_eq!(record["inSecure"], Value::from(false));
        assert_eq!(record["requestMethod"], Value::from("GET"));
        assert_eq!(record["path"], Value::from("data/subscribes/Foo.json"));
        assert_eq!(record["includeProtocol"], Value::from(""));
        assert!(record["header"]["request"].as_mapping().unwrap().is_empty());
        assert!(record["proxies"].as_sequence().unwrap().is_empty());
        assert_eq!(
            record["script"],
            Value::from(
                "const onSubscribe = async (proxies, subscription) => {\n  return { proxies, subscription }\n}\n"
            )
        );
    }

    #[tokio::test]
    async fn appends_plain_records_to_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::new(temp_dir.path());
        fs::write(
            workspace.aggregated_file(),
            "proxies:\n  - name: X\n    url: http://b.example\n",
        )
        .await
        .unwrap();

        let entries = vec![
            SubscriptionEntry::new("Y", "http://c.example"),
            SubscriptionEntry::new("Y", "http://d.example"),
        ];
        let summary = SingboxWriter::new(workspace.clone(), AggregateStyle::Plain)
            .write(&entries)
            .await;
        assert_eq!(summary, WriteSummary { written: 2, failed: 0 });

        let saved = yaml(&fs::read_to_string(workspace.aggregated_file()).await.unwrap());
        assert_eq!(
            saved,
            yaml(
                r#"
proxies:
  - name: X
    url: http://b.example
  - name: Y
    url: http://c.example
  - name: Y (1)
    url: http://d.example
"#
            )
        );
    }

    #[tokio::test]
    async fn creates_a_bare_list_of_enriched_records() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::new(temp_dir.path());

        let summary = SingboxWriter::new(workspace.clone(), AggregateStyle::Enriched)
            .write(&[SubscriptionEntry::new("机场", "http://a.example")])
            .await;
        assert_eq!(summary.written, 1);

        let raw = fs::read_to_string(workspace.aggregated_file()).await.unwrap();
        assert!(raw.contains("机场"));
        let saved = yaml(&raw);
        let records = saved.as_sequence().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["requestMethod"], Value::from("GET"));
    }
}
