//! Vector store configuration.

use docqa_core::{AppConfig, AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the persisted collection inside the storage directory.
pub const DEFAULT_FILE_NAME: &str = "vector_db.bin";

/// What to do when the persisted collection was embedded by a provider
/// whose dimension differs from the active one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Refuse to open the store; the file is left untouched.
    #[default]
    Reject,
    /// Re-embed every stored text with the active provider.
    Reindex,
}

impl std::str::FromStr for MismatchPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(MismatchPolicy::Reject),
            "reindex" => Ok(MismatchPolicy::Reindex),
            other => Err(AppError::Config(format!(
                "Unknown mismatch policy: {}. Supported: reject, reindex",
                other
            ))),
        }
    }
}

/// Where and how the collection is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the persisted collection
    pub storage_dir: PathBuf,

    /// File name inside `storage_dir`
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Handling of provider-incompatible persisted collections
    #[serde(default)]
    pub on_mismatch: MismatchPolicy,
}

fn default_file_name() -> String {
    DEFAULT_FILE_NAME.to_string()
}

impl StoreConfig {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            file_name: default_file_name(),
            on_mismatch: MismatchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, on_mismatch: MismatchPolicy) -> Self {
        self.on_mismatch = on_mismatch;
        self
    }

    /// Build from application configuration.
    pub fn from_app_config(config: &AppConfig) -> AppResult<Self> {
        let on_mismatch = match config.embedding.on_mismatch {
            Some(ref policy) => policy.parse()?,
            None => MismatchPolicy::default(),
        };

        Ok(Self {
            storage_dir: config.storage_path(),
            file_name: default_file_name(),
            on_mismatch,
        })
    }

    /// Full path of the persisted collection.
    pub fn db_path(&self) -> PathBuf {
        self.storage_dir.join(&self.file_name)
    }

    /// Scratch file written before the atomic rename.
    pub fn tmp_path(&self) -> PathBuf {
        tmp_path_for(&self.db_path())
    }
}

pub(crate) fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
