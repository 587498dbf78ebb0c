//! Configuration for mount-download.
//!
//! Configuration is TOML. The file is looked up in this order:
//!
//! 1. `--config <path>`
//! 2. `$MOUNT_DOWNLOAD_CONFIG`
//! 3. the nearest `.mount-download.toml` in the working directory or one of
//!    its ancestors
//! 4. `<user config dir>/mount-download/config.toml`
//!
//! The project file is found by name alone, not through `local.project_marker`,
//! since the marker is itself configured there. Keep it at the project root
//! so both agree.
//!
//! A missing file is not an error; defaults apply.
//!
//! ```toml
//! [local]
//! shared_dir = ".platform/local/shared"
//!
//! [ssh]
//! connect_timeout = 10
//!
//! [[containers]]
//! name = "app"
//! kind = "app"
//! ssh_url = "abc123-main-7rqtwti--app@ssh.eu.platform.sh"
//!
//! [containers.mounts]
//! "web/uploads" = { source = "local", source_path = "uploads" }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::container::ContainerKind;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "MOUNT_DOWNLOAD_CONFIG";

/// Name of the per-project config file at the project root.
pub const PROJECT_CONFIG_FILE: &str = ".mount-download.toml";

/// Marker directory identifying a project root.
pub const DEFAULT_PROJECT_MARKER: &str = ".platform";

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid rsync.extra_args: {0}")]
    ExtraArgs(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub local: LocalConfig,
    pub ssh: SshConfig,
    pub rsync: RsyncConfig,
    /// Containers reachable without probing, keyed by name.
    pub containers: Vec<ContainerConfig>,
}

/// Local project conventions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Shared storage directory, relative to the project root.
    pub shared_dir: String,
    /// Directory whose presence marks a project root.
    pub project_marker: String,
    /// File name identifying an application directory.
    pub app_config_file: String,
    /// Applications list, relative to the project root.
    pub applications_file: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            shared_dir: ".platform/local/shared".into(),
            project_marker: DEFAULT_PROJECT_MARKER.into(),
            app_config_file: ".platform.app.yaml".into(),
            applications_file: ".platform/applications.yaml".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// ssh executable.
    pub command: String,
    /// Extra `-o` options passed to every ssh invocation.
    pub options: Vec<String>,
    /// Connection timeout in seconds.
    pub connect_timeout: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            command: "ssh".into(),
            options: vec![
                "BatchMode=yes".into(),
                "StrictHostKeyChecking=accept-new".into(),
            ],
            connect_timeout: 10,
        }
    }
}

impl SshConfig {
    /// Arguments preceding the destination in an ssh command line.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.options.len() * 2 + 2);
        for option in &self.options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        args.push("-o".to_string());
        args.push(format!("ConnectTimeout={}", self.connect_timeout));
        args
    }

    /// The full ssh command as a single shell string, for `rsync -e`.
    pub fn command_line(&self) -> String {
        let mut words = vec![self.command.clone()];
        words.extend(self.args());
        shell_words::join(words)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RsyncConfig {
    /// rsync executable (name on PATH or a path).
    pub binary: String,
    /// I/O timeout in seconds passed to rsync; 0 disables it.
    pub timeout: u64,
    /// Additional arguments, shell-quoted.
    pub extra_args: String,
}

impl Default for RsyncConfig {
    fn default() -> Self {
        Self {
            binary: "rsync".into(),
            timeout: 0,
            extra_args: String::new(),
        }
    }
}

impl RsyncConfig {
    pub fn extra_args(&self) -> Result<Vec<String>, ConfigError> {
        shell_words::split(&self.extra_args).map_err(|e| ConfigError::ExtraArgs(e.to_string()))
    }
}

/// A container declared in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub name: String,
    #[serde(default)]
    pub kind: ContainerKind,
    pub ssh_url: String,
    /// Raw mount declarations; validated when the catalog is built.
    #[serde(default)]
    pub mounts: BTreeMap<String, serde_json::Value>,
}

impl Config {
    /// Load from the first config file that applies (see module docs).
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self, ConfigError> {
        let Some(path) = Self::locate(explicit, cwd) else {
            tracing::debug!("no config file found, using defaults");
            return Ok(Self::default());
        };
        Self::load_from(&path)
    }

    /// Parse a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Which file would be loaded. An explicit path is returned even when
    /// it does not exist, so that a typo is reported instead of ignored.
    pub fn locate(explicit: Option<&Path>, cwd: &Path) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(path));
        }
        if let Some(candidate) = cwd
            .ancestors()
            .map(|dir| dir.join(PROJECT_CONFIG_FILE))
            .find(|candidate| candidate.is_file())
        {
            return Some(candidate);
        }
        Self::user_config_path().filter(|p| p.is_file())
    }

    /// `<config dir>/mount-download/config.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "mount-download").map(|d| d.config_dir().join("config.toml"))
    }

    /// Cache directory for probed container definitions.
    pub fn cache_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "mount-download").map(|d| d.cache_dir().to_path_buf())
    }
}
