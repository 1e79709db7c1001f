use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::Context;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::model::{AggregateStyle, UserAgent};

pub const INDEX_FILE: &str = "pm.json";
pub const AGGREGATED_FILE: &str = "subscribes.yaml";
// Non-JSON extensions keep the reports out of the next run's input scan.
pub const SUCCESS_REPORT: &str = "suc.jpg";
pub const FAILURE_REPORT: &str = "fa.jpg";

/// The directory a run reads its inputs from and writes its outputs to.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn current() -> anyhow::Result<Self> {
        let root = std::env::current_dir().context("failed to resolve working directory")?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_file(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn aggregated_file(&self) -> PathBuf {
        self.root.join(AGGREGATED_FILE)
    }

    pub fn success_report(&self) -> PathBuf {
        self.root.join(SUCCESS_REPORT)
    }

    pub fn failure_report(&self) -> PathBuf {
        self.root.join(FAILURE_REPORT)
    }

    pub fn entry_file(&self, id: u64) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    pub fn is_index_file(&self, path: &Path) -> bool {
        path.file_name().and_then(|name| name.to_str()) == Some(INDEX_FILE)
    }

    /// Regular files directly inside the workspace, sorted by name.
    pub async fn list_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut dir = fs::read_dir(&self.root)
            .await
            .with_context(|| format!("failed to list {}", self.root.display()))?;

        let mut files = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let is_file = match entry.file_type().await {
                Ok(kind) => kind.is_file(),
                Err(err) => {
                    tracing::warn!(path = %entry.path().display(), error = %err, "cannot stat entry");
                    false
                }
            };
            if is_file {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Optional defaults read from YAML. Command line flags take precedence.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub workers: Option<NonZeroUsize>,

    #[serde(default)]
    pub proxies: Vec<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Replaces the built-in identity list when non-empty.
    #[serde(default)]
    pub user_agents: Vec<UserAgent>,

    #[serde(default)]
    pub aggregate_style: Option<AggregateStyle>,
}

pub fn default_config_path() -> Option<PathBuf> {
    let base = BaseDirs::new()?;
    Some(base.home_dir().join(".config/subgather/app.yaml"))
}

pub async fn load_app_config(path: &Path) -> anyhow::Result<AppConfig> {
    match fs::read_to_string(path).await {
        Ok(raw) => Ok(serde_yaml::from_str(&raw)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn workspace_paths() {
        let workspace = Workspace::new("/data/subs");

        assert_eq!(workspace.index_file(), PathBuf::from("/data/subs/pm.json"));
        assert_eq!(
            workspace.aggregated_file(),
            PathBuf::from("/data/subs/subscribes.yaml")
        );
        assert_eq!(workspace.entry_file(12), PathBuf::from("/data/subs/12.json"));
        assert_eq!(workspace.success_report(), PathBuf::from("/data/subs/suc.jpg"));
        assert_eq!(workspace.failure_report(), PathBuf::from("/data/subs/fa.jpg"));
        assert!(workspace.is_index_file(Path::new("/elsewhere/pm.json")));
        assert!(!workspace.is_index_file(Path::new("/data/subs/3.json")));
    }

    #[tokio::test]
    async fn list_files_skips_directories() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b.txt"), "").await.unwrap();
        fs::write(temp_dir.path().join("a.yaml"), "").await.unwrap();
        fs::create_dir(temp_dir.path().join("nested.json")).await.unwrap();

        let workspace = Workspace::new(temp_dir.path());
        let files = workspace.list_files().await.unwrap();

        assert_eq!(
            files,
            vec![temp_dir.path().join("a.yaml"), temp_dir.path().join("b.txt")]
        );
    }

    #[tokio::test]
    async fn missing_app_config_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_app_config(&temp_dir.path().join("app.yaml"))
            .await
            .unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn app_config_reads_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.yaml");
        let yaml = r#"
workers: 4
proxies:
  - socks5://127.0.0.1:1080
timeout_secs: 5
user_agents:
  - name: curl
    value: curl/8.0
aggregate_style: plain
"#;
        fs::write(&path, yaml).await.unwrap();

        let config = load_app_config(&path).await.unwrap();
        assert_eq!(config.workers.map(NonZeroUsize::get), Some(4));
        assert_eq!(config.proxies, vec!["socks5://127.0.0.1:1080"]);
        assert_eq!(config.timeout_secs, Some(5));
        assert_eq!(config.user_agents, vec![UserAgent::new("curl", "curl/8.0")]);
        assert_eq!(config.aggregate_style, Some(AggregateStyle::Plain));
    }

    #[tokio::test]
    async fn app_config_rejects_zero_workers() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.yaml");
        fs::write(&path, "workers: 0\n").await.unwrap();

        assert!(load_app_config(&path).await.is_err());
    }
}
