//! The `pm.json` group index: the record of every allocated per-entry identifier.
//!
//! It is read once and written once per run. Concurrent runs against the same workspace
//! are not supported.

use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use tokio::fs;
use tracing::{info, warn};

use crate::error::WriteError;
use crate::output::encode_pretty_json;

const GROUPS_KEY: &str = "groups";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    Missing,
    Loaded,
    /// Present but not a JSON object; never overwritten.
    Unreadable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupIndex {
    raw: IndexMap<String, JsonValue>,
    source: IndexSource,
}

impl Default for GroupIndex {
    fn default() -> Self {
        Self {
            raw: IndexMap::new(),
            source: IndexSource::Missing,
        }
    }
}

impl GroupIndex {
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let raw: IndexMap<String, JsonValue> = serde_json::from_str(raw)?;
        Ok(Self {
            raw,
            source: IndexSource::Loaded,
        })
    }

    /// Never fails: a missing or broken index starts allocation at 0.
    pub async fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "group index not found, allocating from 0");
                return Self::default();
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot read group index, allocating from 0");
                return Self::unreadable();
            }
        };

        match Self::from_json_str(&raw) {
            Ok(index) => index,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot parse group index, allocating from 0");
                Self::unreadable()
            }
        }
    }

    fn unreadable() -> Self {
        Self {
            raw: IndexMap::new(),
            source: IndexSource::Unreadable,
        }
    }

    pub fn source(&self) -> IndexSource {
        self.source
    }

    /// Non-negative integer ids in the `groups` list; other values are ignored.
    pub fn ids(&self) -> Vec<u64> {
        self.raw
            .get(GROUPS_KEY)
            .and_then(JsonValue::as_array)
            .map(|groups| groups.iter().filter_map(JsonValue::as_u64).collect())
            .unwrap_or_default()
    }

    pub fn allocator(&self) -> IdAllocator {
        let next = match self.ids().into_iter().max() {
            Some(max) => max.checked_add(1),
            None => Some(0),
        };
        IdAllocator { next }
    }

    /// Append ids to `groups`, keeping existing entries and every other key in place.
    pub fn extend(&mut self, ids: &[u64]) {
        let groups = self
            .raw
            .entry(GROUPS_KEY.to_string())
            .or_insert_with(|| JsonValue::Array(Vec::new()));
        if !groups.is_array() {
            *groups = JsonValue::Array(Vec::new());
        }
        if let JsonValue::Array(list) = groups {
            list.extend(ids.iter().map(|id| JsonValue::from(*id)));
        }
    }

    pub async fn save(&self, path: &Path) -> Result<(), WriteError> {
        if self.source == IndexSource::Unreadable {
            return Err(WriteError::Refused {
                path: path.to_path_buf(),
                reason: "existing group index is unreadable".into(),
            });
        }

        let body = encode_pretty_json(path, &self.raw)?;
        fs::write(path, body).await.map_err(|source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "group index updated");
        Ok(())
    }
}

/// Hands out identifiers strictly greater than every recorded one, without reuse.
///
/// `None` from [`IdAllocator::allocate`] means the `u64` range is used up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    next: Option<u64>,
}

impl IdAllocator {
    pub fn starting_at(next: u64) -> Self {
        Self { next: Some(next) }
    }

    pub fn peek(&self) -> Option<u64> {
        self.next
    }

    pub fn allocate(&mut self) -> Option<u64> {
        let id = self.next?;
        self.next = id.checked_add(1);
        Some(id)
    }
}
