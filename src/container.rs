//! Remote container selection.
//!
//! A container is found either among the containers declared in
//! configuration, or by probing an SSH URL given on the command line. The
//! probe reads the application definition the platform exposes in the
//! container's environment (`PLATFORM_APPLICATION`, base64-encoded JSON) and
//! caches it locally; `--refresh` skips the cache.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::{ContainerConfig, SshConfig};
use crate::interactive::{Interaction, InteractiveError, Prompt};

/// Environment variable holding the application definition on the remote.
const APPLICATION_ENV: &str = "PLATFORM_APPLICATION";

/// Errors from selecting a remote container.
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("No containers are configured; pass --ssh-url or add [[containers]] to the config")]
    NoneConfigured,

    #[error("No {kind} named {name:?} is configured")]
    NotFound { kind: ContainerKind, name: String },

    #[error("SSH connection failed: {0}")]
    SshFailed(String),

    #[error("Could not decode the application definition: {0}")]
    Decode(String),

    #[error("More than one container is configured; {0}")]
    Ambiguous(InteractiveError),

    #[error(transparent)]
    Prompt(#[from] InteractiveError),
}

/// What kind of container a mount lives on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    #[default]
    App,
    Worker,
    Service,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::App => write!(f, "app"),
            Self::Worker => write!(f, "worker"),
            Self::Service => write!(f, "service"),
        }
    }
}

/// Where to reach a container over SSH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub ssh_url: String,
}

/// A selected container with its raw mount declarations.
#[derive(Debug, Clone)]
pub struct Container {
    pub name: String,
    pub kind: ContainerKind,
    pub endpoint: RemoteEndpoint,
    pub raw_mounts: BTreeMap<String, Value>,
}

impl From<ContainerConfig> for Container {
    fn from(config: ContainerConfig) -> Self {
        Self {
            name: config.name,
            kind: config.kind,
            endpoint: RemoteEndpoint {
                ssh_url: config.ssh_url,
            },
            raw_mounts: config.mounts,
        }
    }
}

/// Command-line options choosing the remote container.
#[derive(Args, Debug, Clone, Default)]
pub struct RemoteContainerArgs {
    /// The remote application name
    #[arg(long, short = 'A', conflicts_with = "worker")]
    pub app: Option<String>,

    /// A worker name
    #[arg(long)]
    pub worker: Option<String>,

    /// Connect to this SSH URL and read the application definition from it
    #[arg(long, conflicts_with_all = ["app", "worker"])]
    pub ssh_url: Option<String>,

    /// Ignore the cached application definition
    #[arg(long)]
    pub refresh: bool,
}

/// Supplies the container a command operates on.
pub trait ContainerSelector {
    fn select(
        &self,
        args: &RemoteContainerArgs,
        interaction: Interaction,
        prompt: &dyn Prompt,
    ) -> Result<Container, ContainerError>;
}

// =============================================================================
// Configured containers
// =============================================================================

/// Containers listed in configuration, with an SSH probe for `--ssh-url`.
pub struct ContainerDirectory {
    configured: Vec<ContainerConfig>,
    probe: SshProbe,
}

impl ContainerDirectory {
    pub fn new(configured: Vec<ContainerConfig>, probe: SshProbe) -> Self {
        Self { configured, probe }
    }

    fn pick_configured(
        &self,
        args: &RemoteContainerArgs,
        interaction: Interaction,
        prompt: &dyn Prompt,
    ) -> Result<ContainerConfig, ContainerError> {
        let wanted = match (&args.app, &args.worker) {
            (Some(app), _) => Some((ContainerKind::App, app)),
            (None, Some(worker)) => Some((ContainerKind::Worker, worker)),
            (None, None) => None,
        };

        if let Some((kind, name)) = wanted {
            return self
                .configured
                .iter()
                .find(|c| c.kind == kind && &c.name == name)
                .cloned()
                .ok_or_else(|| ContainerError::NotFound {
                    kind,
                    name: name.clone(),
                });
        }

        match self.configured.as_slice() {
            [] => Err(ContainerError::NoneConfigured),
            [only] => Ok(only.clone()),
            many => {
                if !interaction.interactive {
                    return Err(ContainerError::Ambiguous(InteractiveError::Unavailable(
                        "--app or --worker",
                    )));
                }
                let labels: Vec<String> = many
                    .iter()
                    .map(|c| format!("{} ({})", c.name, c.kind))
                    .collect();
                let index = prompt.choose(&labels, "Enter a number to choose a container:")?;
                many.get(index)
                    .cloned()
                    .ok_or(ContainerError::Prompt(InteractiveError::Cancelled))
            }
        }
    }
}

impl ContainerSelector for ContainerDirectory {
    fn select(
        &self,
        args: &RemoteContainerArgs,
        interaction: Interaction,
        prompt: &dyn Prompt,
    ) -> Result<Container, ContainerError> {
        if let Some(ssh_url) = &args.ssh_url {
            return self.probe.container(ssh_url, args.refresh);
        }

        let container: Container = self.pick_configured(args, interaction, prompt)?.into();
        tracing::debug!(
            container = %container.name,
            kind = %container.kind,
            ssh_url = %container.endpoint.ssh_url,
            "selected configured container"
        );
        Ok(container)
    }
}

// =============================================================================
// SSH probe
// =============================================================================

/// The part of the remote application definition this tool reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationDefinition {
    pub name: String,
    #[serde(default)]
    pub mounts: BTreeMap<String, Value>,
}

/// Reads application definitions from containers over SSH.
pub struct SshProbe {
    ssh: SshConfig,
    cache_dir: Option<PathBuf>,
}

impl SshProbe {
    pub fn new(ssh: SshConfig, cache_dir: Option<PathBuf>) -> Self {
        Self { ssh, cache_dir }
    }

    /// Build the container for `ssh_url`, from cache unless `refresh`.
    pub fn container(&self, ssh_url: &str, refresh: bool) -> Result<Container, ContainerError> {
        let definition = match self.cached(ssh_url).filter(|_| !refresh) {
            Some(definition) => {
                tracing::debug!(ssh_url, "using cached application definition");
                definition
            }
            None => {
                let definition = self.fetch(ssh_url)?;
                self.store(ssh_url, &definition);
                definition
            }
        };

        Ok(Container {
            name: definition.name,
            kind: ContainerKind::App,
            endpoint: RemoteEndpoint {
                ssh_url: ssh_url.to_string(),
            },
            raw_mounts: definition.mounts,
        })
    }

    fn fetch(&self, ssh_url: &str) -> Result<ApplicationDefinition, ContainerError> {
        let output = Command::new(&self.ssh.command)
            .args(self.ssh.args())
            .arg("--")
            .arg(ssh_url)
            .arg(format!("printenv {APPLICATION_ENV}"))
            .output()
            .map_err(|e| ContainerError::SshFailed(format!("Failed to execute ssh: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ContainerError::SshFailed(format!(
                "Failed to read {APPLICATION_ENV}: {}",
                stderr.trim()
            )));
        }

        decode_definition(&String::from_utf8_lossy(&output.stdout))
    }

    fn cache_path(&self, ssh_url: &str) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join("applications").join(cache_file_name(ssh_url)))
    }

    fn cached(&self, ssh_url: &str) -> Option<ApplicationDefinition> {
        let path = self.cache_path(ssh_url)?;
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(definition) => Some(definition),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt cache entry");
                None
            }
        }
    }

    fn store(&self, ssh_url: &str, definition: &ApplicationDefinition) {
        let Some(path) = self.cache_path(ssh_url) else {
            return;
        };
        if let Err(e) = write_json(&path, definition) {
            tracing::warn!(path = %path.display(), error = %e, "failed to cache application definition");
        }
    }
}

fn write_json(path: &Path, definition: &ApplicationDefinition) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(definition)?;
    std::fs::write(path, content)
}

/// Decode the base64 JSON value of the application environment variable.
pub fn decode_definition(encoded: &str) -> Result<ApplicationDefinition, ContainerError> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Err(ContainerError::Decode(format!("{APPLICATION_ENV} is empty")));
    }
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| ContainerError::Decode(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ContainerError::Decode(e.to_string()))
}

/// Cache file name for an SSH URL: separators and special characters become
/// underscores.
pub fn cache_file_name(ssh_url: &str) -> String {
    let cleaned: String = ssh_url
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "default.json".to_string()
    } else {
        format!("{cleaned}.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    struct NoPrompt;

    impl Prompt for NoPrompt {
        fn choose(&self, _: &[String], _: &str) -> Result<usize, InteractiveError> {
            panic!("unexpected prompt")
        }
        fn ask(&self, _: &str, _: Option<&str>) -> Result<String, InteractiveError> {
            panic!("unexpected prompt")
        }
        fn confirm(&self, _: &str, _: bool) -> Result<bool, InteractiveError> {
            panic!("unexpected prompt")
        }
    }

    struct PickLast;

    impl Prompt for PickLast {
        fn choose(&self, options: &[String], _: &str) -> Result<usize, InteractiveError> {
            Ok(options.len() - 1)
        }
        fn ask(&self, _: &str, _: Option<&str>) -> Result<String, InteractiveError> {
            unreachable!()
        }
        fn confirm(&self, _: &str, _: bool) -> Result<bool, InteractiveError> {
            unreachable!()
        }
    }

    fn configured(name: &str, kind: ContainerKind) -> ContainerConfig {
        ContainerConfig {
            name: name.into(),
            kind,
            ssh_url: format!("{name}@ssh.example.com"),
            mounts: BTreeMap::new(),
        }
    }

    fn directory(containers: Vec<ContainerConfig>) -> ContainerDirectory {
        ContainerDirectory::new(containers, SshProbe::new(SshConfig::default(), None))
    }

    #[test]
    fn test_single_configured_container() {
        let dir = directory(vec![configured("app", ContainerKind::App)]);
        let container = dir
            .select(
                &RemoteContainerArgs::default(),
                Interaction::non_interactive(),
                &NoPrompt,
            )
            .unwrap();
        assert_eq!(container.name, "app");
        assert_eq!(container.endpoint.ssh_url, "app@ssh.example.com");
    }

    #[test]
    fn test_select_by_worker_name() {
        let dir = directory(vec![
            configured("app", ContainerKind::App),
            configured("queue", ContainerKind::Worker),
        ]);
        let args = RemoteContainerArgs {
            worker: Some("queue".into()),
            ..Default::default()
        };
        let container = dir
            .select(&args, Interaction::non_interactive(), &NoPrompt)
            .unwrap();
        assert_eq!(container.kind, ContainerKind::Worker);
    }

    #[test]
    fn test_named_container_missing() {
        let dir = directory(vec![configured("app", ContainerKind::App)]);
        let args = RemoteContainerArgs {
            app: Some("api".into()),
            ..Default::default()
        };
        let err = dir
            .select(&args, Interaction::non_interactive(), &NoPrompt)
            .unwrap_err();
        assert_eq!(err.to_string(), "No app named \"api\" is configured");
    }

    #[test]
    fn test_many_containers_need_choice() {
        let dir = directory(vec![
            configured("app", ContainerKind::App),
            configured("api", ContainerKind::App),
        ]);
        let args = RemoteContainerArgs::default();

        let err = dir
            .select(&args, Interaction::non_interactive(), &NoPrompt)
            .unwrap_err();
        assert!(matches!(err, ContainerError::Ambiguous(_)));

        let container = dir
            .select(&args, Interaction::interactive(), &PickLast)
            .unwrap();
        assert_eq!(container.name, "api");
    }

    #[test]
    fn test_none_configured() {
        let dir = directory(vec![]);
        let err = dir
            .select(
                &RemoteContainerArgs::default(),
                Interaction::interactive(),
                &NoPrompt,
            )
            .unwrap_err();
        assert!(matches!(err, ContainerError::NoneConfigured));
    }

    #[test]
    fn test_decode_definition() {
        let definition = json!({
            "name": "app",
            "type": "php:8.2",
            "mounts": { "web/uploads": { "source": "local", "source_path": "uploads" } },
        });
        let encoded = BASE64.encode(definition.to_string());

        let decoded = decode_definition(&format!("{encoded}\n")).unwrap();
        assert_eq!(decoded.name, "app");
        assert!(decoded.mounts.contains_key("web/uploads"));
    }

    #[test]
    fn test_decode_definition_errors() {
        assert!(matches!(decode_definition(""), Err(ContainerError::Decode(_))));
        assert!(matches!(
            decode_definition("not base64!"),
            Err(ContainerError::Decode(_))
        ));
        let not_json = BASE64.encode("plain text");
        assert!(matches!(
            decode_definition(&not_json),
            Err(ContainerError::Decode(_))
        ));
    }

    #[test]
    fn test_probe_uses_cache_unless_refresh() {
        let cache = TempDir::new().unwrap();
        let probe = SshProbe::new(
            SshConfig {
                command: "/nonexistent/ssh".into(),
                ..SshConfig::default()
            },
            Some(cache.path().to_path_buf()),
        );
        let url = "abc-main--app@ssh.example.com";
        probe.store(
            url,
            &ApplicationDefinition {
                name: "app".into(),
                mounts: BTreeMap::from([("tmp".to_string(), json!({ "source": "tmp" }))]),
            },
        );

        let container = probe.container(url, false).unwrap();
        assert_eq!(container.name, "app");
        assert_eq!(container.endpoint.ssh_url, url);
        assert_eq!(container.raw_mounts.len(), 1);

        let err = probe.container(url, true).unwrap_err();
        assert!(matches!(err, ContainerError::SshFailed(_)));
    }

    #[test]
    fn test_cache_file_name() {
        assert_eq!(
            cache_file_name("abc-main--app@ssh.eu.example.com"),
            "abc-main--app_ssh.eu.example.com.json"
        );
        assert_eq!(cache_file_name("  "), "default.json");
    }
}
