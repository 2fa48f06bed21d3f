//! Client configuration.
//!
//! Values come from, in decreasing precedence: command-line flags, their
//! `TASKSYNC_*` environment variables, `~/.config/tasksync/config.toml`,
//! and built-in defaults. The default file may be absent; a file named with
//! `--config` must exist.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tasksync_model::codec::BlobFormat;
use tasksync_model::task::MAX_TASK_TITLE_LENGTH;

use crate::tasks::ServiceSettings;

/// Why a configuration file could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists (or was named explicitly) but could not be read.
    #[error("cannot read config file {path}: {source}")]
    ReadFile {
        /// File that was opened.
        path: PathBuf,
        /// I/O failure.
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("invalid config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// On-disk layout; every field optional so a file may set any subset
// ---------------------------------------------------------------------------

/// Parsed `config.toml`.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    storage: StorageFileConfig,
    sync: SyncFileConfig,
    tasks: TasksFileConfig,
}

/// `[storage]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StorageFileConfig {
    data_dir: Option<PathBuf>,
    secure_dir: Option<PathBuf>,
    format: Option<BlobFormat>,
}

/// `[sync]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncFileConfig {
    remote_dir: Option<PathBuf>,
    probe_addr: Option<String>,
    probe_timeout_ms: Option<u64>,
    poll_interval_secs: Option<u64>,
}

/// `[tasks]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct TasksFileConfig {
    max_title_len: Option<usize>,
    default_user: Option<String>,
}

// ---------------------------------------------------------------------------
// Effective configuration
// ---------------------------------------------------------------------------

/// Configuration after merging every source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    // -- Storage --
    /// Directory holding the task snapshot, action log and profile blobs.
    pub data_dir: PathBuf,
    /// Owner-only directory holding the session token.
    pub secure_dir: PathBuf,
    /// Encoding of persisted blobs.
    pub format: BlobFormat,

    // -- Sync --
    /// Shared directory used as the backend. `None` keeps everything local.
    pub remote_dir: Option<PathBuf>,
    /// `host:port` probed to decide whether the device is online.
    pub probe_addr: Option<String>,
    /// Timeout for one connectivity probe.
    pub probe_timeout: Duration,
    /// Interval between background connectivity probes.
    pub poll_interval: Duration,
    /// Treat the device as offline regardless of the probe.
    pub offline: bool,

    // -- Tasks --
    /// Maximum task title length in characters.
    pub max_title_len: usize,
    /// Owner of new tasks when nobody is signed in.
    pub default_user: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            secure_dir: data_dir.join("secure"),
            data_dir,
            format: BlobFormat::Json,
            remote_dir: None,
            probe_addr: None,
            probe_timeout: Duration::from_millis(2000),
            poll_interval: Duration::from_secs(30),
            offline: false,
            max_title_len: MAX_TASK_TITLE_LENGTH,
            default_user: "local".to_string(),
        }
    }
}

impl ClientConfig {
    /// Merge `cli` (which already carries environment overrides) with the
    /// config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicit `--config` file is missing, or
    /// any config file is unreadable or malformed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Configuration from `cli` and defaults alone, for when the config file
    /// is unusable.
    #[must_use]
    pub fn from_cli(cli: &CliArgs) -> Self {
        Self::resolve(cli, &ConfigFile::default())
    }

    /// CLI wins over the file, the file over defaults. An unset secure
    /// directory follows the resolved data directory.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        let data_dir = cli
            .data_dir
            .clone()
            .or_else(|| file.storage.data_dir.clone())
            .unwrap_or(defaults.data_dir);
        let secure_dir = file
            .storage
            .secure_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("secure"));

        Self {
            secure_dir,
            data_dir,
            format: file.storage.format.unwrap_or(defaults.format),
            remote_dir: cli
                .remote_dir
                .clone()
                .or_else(|| file.sync.remote_dir.clone()),
            probe_addr: file.sync.probe_addr.clone(),
            probe_timeout: file
                .sync
                .probe_timeout_ms
                .map_or(defaults.probe_timeout, Duration::from_millis),
            poll_interval: file
                .sync
                .poll_interval_secs
                .map_or(defaults.poll_interval, Duration::from_secs),
            offline: cli.offline,
            max_title_len: file
                .tasks
                .max_title_len
                .unwrap_or(defaults.max_title_len),
            default_user: cli
                .user
                .clone()
                .or_else(|| file.tasks.default_user.clone())
                .unwrap_or(defaults.default_user),
        }
    }

    /// Settings for a [`crate::tasks::TaskService`] acting for `user_id`.
    #[must_use]
    pub fn service_settings(&self, user_id: impl Into<String>) -> ServiceSettings {
        ServiceSettings {
            user_id: user_id.into(),
            format: self.format,
            max_title_len: self.max_title_len,
        }
    }
}

/// Options accepted before or after any `tasksync` subcommand.
#[derive(clap::Args, Debug, Default)]
pub struct CliArgs {
    /// Config file to read instead of `~/.config/tasksync/config.toml`.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for local task data.
    #[arg(long, env = "TASKSYNC_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Shared directory acting as the sync backend.
    #[arg(long, env = "TASKSYNC_REMOTE_DIR", global = true)]
    pub remote_dir: Option<PathBuf>,

    /// Queue every change instead of contacting the backend.
    #[arg(long, global = true)]
    pub offline: bool,

    /// Act as this user when nobody is signed in.
    #[arg(long, env = "TASKSYNC_USER", global = true)]
    pub user: Option<String>,

    /// `tracing` filter directive, e.g. `info` or `tasksync=debug`.
    #[arg(long, default_value = "warn", env = "TASKSYNC_LOG", global = true)]
    pub log_level: String,

    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn default_data_dir() -> PathBuf {
    dirs::data_dir().map_or_else(|| PathBuf::from(".tasksync"), |d| d.join("tasksync"))
}

/// Reads `explicit` if given, else the default file. Only the default file
/// may be missing.
fn load_config_file(explicit: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => match dirs::config_dir() {
            Some(dir) => (dir.join("tasksync").join("config.toml"), false),
            None => return Ok(ConfigFile::default()),
        },
    };

    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(source) if !required && source.kind() == ErrorKind::NotFound => {
            return Ok(ConfigFile::default());
        }
        Err(source) => return Err(ConfigError::ReadFile { path, source }),
    };
    Ok(toml::from_str(&text)?)
}
