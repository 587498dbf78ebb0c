//! Local project layout: project root, shared storage convention and the
//! applications checked out inside the project.
//!
//! Everything here is read once per invocation and handed to the target
//! resolver as plain data.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use walkdir::WalkDir;

use crate::config::LocalConfig;

/// Depth limit when scanning the project for application config files.
const APP_SCAN_DEPTH: usize = 5;

/// Directories never descended into when scanning for applications.
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "vendor"];

/// An application directory found in the local project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalApplication {
    pub name: String,
    pub dir: PathBuf,
}

/// Read-only view of the local project, used for target defaulting.
#[derive(Debug, Clone, Default)]
pub struct ProjectContext {
    /// Project root, when the command runs inside a project checkout.
    pub root: Option<PathBuf>,
    /// Shared storage directory, relative to the root.
    pub shared_dir: PathBuf,
    pub applications: Vec<LocalApplication>,
}

impl ProjectContext {
    /// A context with no project.
    pub fn none() -> Self {
        Self::default()
    }

    /// Discover the project containing `start`, if any.
    pub fn discover(start: &Path, local: &LocalConfig) -> Self {
        let Some(root) = find_project_root(start, &local.project_marker) else {
            tracing::debug!(start = %start.display(), "not inside a project");
            return Self {
                shared_dir: PathBuf::from(&local.shared_dir),
                ..Self::default()
            };
        };

        let applications = find_applications(&root, local);
        tracing::debug!(
            root = %root.display(),
            apps = applications.len(),
            "discovered project"
        );

        Self {
            root: Some(root),
            shared_dir: PathBuf::from(&local.shared_dir),
            applications,
        }
    }

    /// Directory of the application named `name`.
    pub fn application_dir(&self, name: &str) -> Option<&Path> {
        self.applications
            .iter()
            .find(|app| app.name == name)
            .map(|app| app.dir.as_path())
    }

    /// Absolute shared storage directory.
    pub fn shared_storage(&self) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(&self.shared_dir))
    }
}

/// Nearest ancestor of `start` (inclusive) containing a `marker` directory.
pub fn find_project_root(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}

#[derive(Debug, Deserialize)]
struct AppConfigFile {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApplicationsEntry {
    name: Option<String>,
    #[serde(default)]
    source: Option<ApplicationSource>,
}

#[derive(Debug, Deserialize)]
struct ApplicationSource {
    root: Option<String>,
}

/// Find every application declared in the project.
///
/// Two conventions are supported: a per-app config file anywhere below the
/// root, and a single applications file listing apps with their source root.
pub fn find_applications(root: &Path, local: &LocalConfig) -> Vec<LocalApplication> {
    let mut apps = Vec::new();

    let walker = WalkDir::new(root)
        .max_depth(APP_SCAN_DEPTH)
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir()
                && e.file_name()
                    .to_str()
                    .is_some_and(|n| SKIPPED_DIRS.contains(&n)))
        })
        .flatten()
        .filter(|e| e.file_type().is_file());

    for entry in walker {
        if entry.file_name().to_str() != Some(local.app_config_file.as_str()) {
            continue;
        }
        let Some(dir) = entry.path().parent() else {
            continue;
        };
        match read_yaml::<AppConfigFile>(entry.path()) {
            Ok(AppConfigFile { name: Some(name) }) => apps.push(LocalApplication {
                name,
                dir: dir.to_path_buf(),
            }),
            Ok(_) => {
                tracing::debug!(path = %entry.path().display(), "app config has no name")
            }
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "unreadable app config")
            }
        }
    }

    let applications_file = root.join(&local.applications_file);
    if applications_file.is_file() {
        match read_yaml::<Vec<ApplicationsEntry>>(&applications_file) {
            Ok(entries) => {
                for entry in entries {
                    let Some(name) = entry.name else { continue };
                    let dir = entry
                        .source
                        .and_then(|s| s.root)
                        .map(|r| root.join(r.trim_matches('/')))
                        .unwrap_or_else(|| root.to_path_buf());
                    apps.push(LocalApplication { name, dir });
                }
            }
            Err(e) => tracing::warn!(
                path = %applications_file.display(),
                error = %e,
                "unreadable applications file"
            ),
        }
    }

    apps.sort_by(|a, b| a.dir.cmp(&b.dir).then_with(|| a.name.cmp(&b.name)));
    apps.dedup();
    apps
}

fn read_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> anyhow::Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}
