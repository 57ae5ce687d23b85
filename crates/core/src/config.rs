//! Configuration management for docqa.
//!
//! Configuration is layered, later sources winning:
//! - Built-in defaults
//! - Config file (`docqa.yaml` in the workspace, or `DOCQA_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! The persisted vector collection lives under `storage_dir`, which is
//! resolved relative to the workspace unless absolute.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default config file name, looked up in the workspace root.
pub const CONFIG_FILE_NAME: &str = "docqa.yaml";

/// Default storage directory for the persisted collection.
pub const DEFAULT_STORAGE_DIR: &str = "vector_db";

/// Providers the embedding adapter knows how to build.
pub const KNOWN_PROVIDERS: [&str; 4] = ["gemini", "ollama", "trigram", "mock"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Directory holding the persisted collection
    pub storage_dir: PathBuf,

    /// Embedding provider settings
    pub embedding: EmbeddingSettings,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Embedding section of the configuration.
///
/// Everything is optional here; the store fills the gaps with
/// provider-specific defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// Preferred provider ("gemini", "ollama", "trigram", "mock")
    pub provider: Option<String>,

    /// Model identifier for the preferred provider
    pub model: Option<String>,

    /// Expected vector dimensions for the preferred provider
    pub dimensions: Option<usize>,

    /// Provider used when the preferred one is unavailable ("none" disables)
    pub fallback: Option<String>,

    /// Custom endpoint (Ollama base URL or hosted API base)
    pub endpoint: Option<String>,

    /// API key for hosted providers
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Per-call timeout in seconds
    pub timeout_secs: Option<u64>,

    /// What to do when the persisted collection was built by another
    /// provider: "reject" or "reindex"
    pub on_mismatch: Option<String>,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(rename = "storageDir")]
    storage_dir: Option<String>,
    embedding: Option<EmbeddingSettings>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            embedding: EmbeddingSettings::default(),
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and environment.
    ///
    /// Environment variables:
    /// - `DOCQA_WORKSPACE`: Override workspace path
    /// - `DOCQA_CONFIG`: Path to config file
    /// - `DOCQA_STORAGE_DIR`: Directory for the persisted collection
    /// - `DOCQA_EMBEDDING_PROVIDER`: Preferred embedding provider
    /// - `DOCQA_EMBEDDING_MODEL`: Embedding model identifier
    /// - `DOCQA_API_KEY` / `GOOGLE_API_KEY`: Hosted provider API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Like [`load`](Self::load), with an explicit workspace and config file
    /// taking precedence over the environment.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) =
            workspace.or_else(|| std::env::var("DOCQA_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("DOCQA_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.workspace.join(CONFIG_FILE_NAME));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(dir) = std::env::var("DOCQA_STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }

        if let Ok(provider) = std::env::var("DOCQA_EMBEDDING_PROVIDER") {
            config.embedding.provider = Some(provider);
        }

        if let Ok(model) = std::env::var("DOCQA_EMBEDDING_MODEL") {
            config.embedding.model = Some(model);
        }

        if let Some(key) = std::env::var("DOCQA_API_KEY")
            .ok()
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
        {
            config.embedding.api_key = Some(key);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(dir) = config_file.storage_dir {
            result.storage_dir = PathBuf::from(dir);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        storage_dir: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(storage_dir) = storage_dir {
            self.storage_dir = storage_dir;
        }

        if let Some(provider) = provider {
            self.embedding.provider = Some(provider);
        }

        if let Some(model) = model {
            self.embedding.model = Some(model);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Absolute path of the storage directory.
    pub fn storage_path(&self) -> PathBuf {
        if self.storage_dir.is_absolute() {
            self.storage_dir.clone()
        } else {
            self.workspace.join(&self.storage_dir)
        }
    }

    /// Preferred embedding provider.
    ///
    /// An explicit choice wins. Otherwise the hosted provider is used when
    /// an API key is available and the local one when it is not.
    pub fn embedding_provider(&self) -> String {
        resolve_provider(
            self.embedding.provider.as_deref(),
            self.embedding.api_key.is_some(),
        )
    }

    /// Validate the embedding section.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.embedding_provider();
        check_known_provider(&provider)?;

        if let Some(ref fallback) = self.embedding.fallback {
            if fallback != "none" {
                check_known_provider(fallback)?;
            }
        }

        if provider == "gemini" && self.embedding.api_key.is_none() {
            return Err(AppError::Config(
                "Provider 'gemini' requires DOCQA_API_KEY or GOOGLE_API_KEY".to_string(),
            ));
        }

        if let Some(ref policy) = self.embedding.on_mismatch {
            if policy != "reject" && policy != "reindex" {
                return Err(AppError::Config(format!(
                    "Unknown onMismatch policy: {}. Supported: reject, reindex",
                    policy
                )));
            }
        }

        Ok(())
    }
}

fn resolve_provider(explicit: Option<&str>, has_api_key: bool) -> String {
    match explicit {
        Some(provider) => provider.to_lowercase(),
        None if has_api_key => "gemini".to_string(),
        None => "ollama".to_string(),
    }
}

fn check_known_provider(provider: &str) -> AppResult<()> {
    if KNOWN_PROVIDERS.contains(&provider) {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "Unknown embedding provider: {}. Supported: {}",
            provider,
            KNOWN_PROVIDERS.join(", ")
        )))
    }
}
