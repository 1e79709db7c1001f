use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn one input file into entries. Never fatal for the batch.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Failure to produce one output file.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to encode {}: {message}", path.display())]
    Encode { path: PathBuf, message: String },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("refusing to write {}: {reason}", path.display())]
    Refused { path: PathBuf, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown value `{value}`, expected one of: {expected}")]
pub struct UnknownChoice {
    pub value: String,
    pub expected: &'static str,
}
