use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;

mod nekobox;
mod report;
mod singbox;

pub use nekobox::NekoboxWriter;
pub use report::{write_report, write_reports};
pub use singbox::{merge_records, SingboxWriter};

use crate::error::WriteError;
use crate::model::{AggregateStyle, SubscriptionEntry, Target};
use crate::storage::Workspace;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: usize,
    pub failed: usize,
}

/// Persists the accepted entries in a target client's format.
///
/// Implementations never abort on a single failed file; failures are logged and counted.
#[async_trait]
pub trait StateWriter: Send + Sync {
    fn target(&self) -> Target;

    async fn write(&self, entries: &[SubscriptionEntry]) -> WriteSummary;
}

pub fn writer_for(
    target: Target,
    workspace: Workspace,
    style: AggregateStyle,
) -> Box<dyn StateWriter> {
    match target {
        Target::Nekobox => Box::new(NekoboxWriter::new(workspace)),
        Target::Singbox => Box::new(SingboxWriter::new(workspace, style)),
    }
}

/// JSON with 4-space indentation and non-ASCII text left unescaped.
pub(crate) fn encode_pretty_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<Vec<u8>, WriteError> {
    let mut body = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut body, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|err| WriteError::Encode {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    Ok(body)
}

pub(crate) async fn write_json_file<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), WriteError> {
    let body = encode_pretty_json(path, value)?;
    fs::write(path, body).await.map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Like [`write_json_file`], but fails when the file already exists.
pub(crate) async fn create_json_file<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), WriteError> {
    let body = encode_pretty_json(path, value)?;
    let io_error = |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(io_error)?;
    file.write_all(&body).await.map_err(io_error)?;
    file.flush().await.map_err(io_error)
}
