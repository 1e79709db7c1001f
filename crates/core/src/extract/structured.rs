use serde_json::Value as JsonValue;
use serde_yaml::{Sequence, Value};

use crate::identity::resolve_display_name;
use crate::model::SubscriptionEntry;

/// A JSON file contributes one entry when it is an object with string `name` and `url`.
pub fn entries_from_json(raw: &str) -> Result<Vec<SubscriptionEntry>, serde_json::Error> {
    let value: JsonValue = serde_json::from_str(raw)?;
    let entry = value.as_object().and_then(|object| {
        let name = object.get("name")?.as_str()?;
        let url = object.get("url")?.as_str()?;
        Some(SubscriptionEntry::new(name.trim(), url.trim()))
    });
    Ok(entry.into_iter().collect())
}

/// A YAML file contributes either its `proxies` records (name and url required) or the
/// records of a bare top-level list (url required, name inferred when missing).
pub fn entries_from_yaml(raw: &str) -> Result<Vec<SubscriptionEntry>, serde_yaml::Error> {
    let value: Value = serde_yaml::from_str(raw)?;

    let entries = match &value {
        Value::Mapping(map) => match map.get("proxies") {
            Some(Value::Sequence(records)) => records.iter().filter_map(named_record).collect(),
            _ => Vec::new(),
        },
        Value::Sequence(records) => records.iter().filter_map(url_record).collect(),
        _ => Vec::new(),
    };

    Ok(entries)
}

/// The record list of an aggregated document in either accepted shape.
pub(crate) fn record_list(value: &Value) -> Option<&Sequence> {
    match value {
        Value::Mapping(map) => map.get("proxies").and_then(Value::as_sequence),
        Value::Sequence(records) => Some(records),
        _ => None,
    }
}

pub(crate) fn record_url(record: &Value) -> Option<&str> {
    record.as_mapping()?.get("url")?.as_str()
}

pub(crate) fn json_url(value: &JsonValue) -> Option<&str> {
    value.as_object()?.get("url")?.as_str()
}

fn named_record(record: &Value) -> Option<SubscriptionEntry> {
    let map = record.as_mapping()?;
    let name = map.get("name")?.as_str()?;
    let url = map.get("url")?.as_str()?;
    Some(SubscriptionEntry::new(name.trim(), url.trim()))
}

fn url_record(record: &Value) -> Option<SubscriptionEntry> {
    let map = record.as_mapping()?;
    let url = map.get("url")?.as_str()?.trim();
    match map.get("name").and_then(Value::as_str) {
        Some(name) => Some(SubscriptionEntry::new(name.trim(), url)),
        None => Some(SubscriptionEntry::inferred(resolve_display_name(url), url)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_object_with_name_and_url() {
        let raw = r#"{"id": 4, "name": " Foo ", "url": " https://foo.example/sub ", "lastup": 0}"#;
        let entries = entries_from_json(raw).unwrap();
        assert_eq!(entries, vec![SubscriptionEntry::new("Foo", "https://foo.example/sub")]);
    }

    #[test]
    fn json_of_other_shapes_is_ignored() {
        assert!(entries_from_json(r#"{"groups": [1, 2]}"#).unwrap().is_empty());
        assert!(entries_from_json(r#"[{"name": "a", "url": "b"}]"#).unwrap().is_empty());
        assert!(entries_from_json(r#"{"name": 3, "url": "b"}"#).unwrap().is_empty());
        assert!(entries_from_json("{not json").is_err());
    }

    #[test]
    fn yaml_proxies_mapping() {
        let raw = r#"
proxies:
  - name: X
    url: http://b.example
  - name: missing-url
  - just-a-string
  - name: Y
    url: " http://c.example "
"#;
        let entries = entries_from_yaml(raw).unwrap();
        assert_eq!(
            entries,
            vec![
                SubscriptionEntry::new("X", "http://b.example"),
                SubscriptionEntry::new("Y", "http://c.example"),
            ]
        );
    }

    #[test]
    fn yaml_bare_list_infers_missing_names() {
        let raw = r#"
- url: https://d.example/api
- name: Named
  url: https://e.example/api
- name: no-url
"#;
        let entries = entries_from_yaml(raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "d.example");
        assert!(entries[0].name_inferred);
        assert_eq!(entries[1], SubscriptionEntry::new("Named", "https://e.example/api"));
    }

    #[test]
    fn yaml_of_other_shapes_is_ignored() {
        assert!(entries_from_yaml("port: 7890\n").unwrap().is_empty());
        assert!(entries_from_yaml("just text").unwrap().is_empty());
        assert!(entries_from_yaml("proxies: [unclosed").is_err());
    }

    #[test]
    fn record_list_accepts_both_shapes() {
        let mapping: Value = serde_yaml::from_str("proxies:\n  - url: a\n").unwrap();
        let list: Value = serde_yaml::from_str("- url: b\n").unwrap();
        let other: Value = serde_yaml::from_str("rules: []\n").unwrap();

        assert_eq!(record_list(&mapping).map(|records| records.len()), Some(1));
        assert_eq!(record_list(&list).and_then(|r| record_url(&r[0])), Some("b"));
        assert!(record_list(&other).is_none());
    }
}
