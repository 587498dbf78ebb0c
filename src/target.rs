//! Local target directory resolution.
//!
//! The default target is decided by [`default_target`], which only looks at
//! pre-fetched project data and asks a [`PathProbe`] about the filesystem.
//! Tiers, first hit wins:
//!
//! 1. the mount's shared storage binding, `<root>/<shared_dir>/<source_path>`,
//!    if it exists;
//! 2. `<app dir>/<mount path>`, if it is a directory. The app dir is the local
//!    application named like the container, or the project root when no
//!    application matches.
//!
//! An explicit `--target` bypasses all of it.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::interactive::{Interaction, InteractiveError, Prompt};
use crate::mounts::MountCatalog;
use crate::mounts::catalog::relative;
use crate::project::ProjectContext;

#[derive(Error, Debug)]
pub enum TargetError {
    #[error("The target directory must be specified")]
    MissingTarget,

    #[error("Invalid target {}: {reason}", .path.display())]
    InvalidTarget { path: PathBuf, reason: String },

    #[error("The --target option must be specified (in non-interactive mode)")]
    NonInteractive,

    #[error(transparent)]
    Prompt(#[from] InteractiveError),
}

/// Filesystem questions asked while computing a default.
pub trait PathProbe {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
}

/// [`PathProbe`] backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl PathProbe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// The chosen local directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub path: PathBuf,
    /// True when the path came from [`default_target`] rather than the user.
    pub was_defaulted: bool,
}

/// Best-effort default target for `mount_path`, or `None`.
pub fn default_target(
    mount_path: &str,
    catalog: &MountCatalog,
    container_name: &str,
    project: &ProjectContext,
    probe: &dyn PathProbe,
) -> Option<PathBuf> {
    let root = project.root.as_deref()?;

    if let Some(subpath) = catalog.shared_file_mounts().get(mount_path)
        && let Some(storage) = project.shared_storage()
    {
        let shared = storage.join(subpath);
        if probe.exists(&shared) {
            tracing::debug!(mount = mount_path, target = %shared.display(), "default from shared storage");
            return Some(shared);
        }
    }

    let app_dir = project.application_dir(container_name).unwrap_or(root);
    let candidate = app_dir.join(relative(mount_path));
    if probe.is_dir(&candidate) {
        tracing::debug!(mount = mount_path, target = %candidate.display(), "default from app directory");
        return Some(candidate);
    }

    None
}

/// Settle on a target: the explicit one verbatim, else ask (pre-filled with
/// `default`). Non-interactive runs take the default when there is one.
pub fn resolve_target(
    explicit: Option<&str>,
    default: Option<&Path>,
    interaction: Interaction,
    prompt: &dyn Prompt,
) -> Result<ResolvedTarget, TargetError> {
    if let Some(explicit) = explicit.filter(|t| !t.is_empty()) {
        return Ok(ResolvedTarget {
            path: PathBuf::from(explicit),
            was_defaulted: false,
        });
    }

    let default_display = default.map(display_path);

    if !interaction.interactive {
        return match default {
            Some(path) => {
                tracing::info!(target = %path.display(), "using default target directory");
                Ok(ResolvedTarget {
                    path: path.to_path_buf(),
                    was_defaulted: true,
                })
            }
            None => Err(TargetError::NonInteractive),
        };
    }

    let answer = prompt.ask("Target directory", default_display.as_deref())?;
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(TargetError::MissingTarget);
    }

    match (default, default_display.as_deref()) {
        (Some(path), Some(shown)) if shown == answer => Ok(ResolvedTarget {
            path: path.to_path_buf(),
            was_defaulted: true,
        }),
        _ => Ok(ResolvedTarget {
            path: PathBuf::from(answer),
            was_defaulted: false,
        }),
    }
}

/// State of a resolved target on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// Nothing there yet; the transport will create it.
    Missing,
    /// An existing, writable directory.
    Ready,
}

/// Check that `path` is absent or a writable directory.
pub fn inspect_target(path: &Path) -> Result<TargetState, TargetError> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(TargetState::Missing),
        Err(e) => {
            return Err(TargetError::InvalidTarget {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    if !metadata.is_dir() {
        return Err(TargetError::InvalidTarget {
            path: path.to_path_buf(),
            reason: "not a directory".into(),
        });
    }

    if !is_writable(path) {
        return Err(TargetError::InvalidTarget {
            path: path.to_path_buf(),
            reason: "not writable".into(),
        });
    }

    Ok(TargetState::Ready)
}

/// Whether entries can be created in the directory `path`. Writes nothing.
#[cfg(unix)]
fn is_writable(path: &Path) -> bool {
    use nix::unistd::{AccessFlags, access};

    access(path, AccessFlags::W_OK | AccessFlags::X_OK).is_ok()
}

#[cfg(not(unix))]
fn is_writable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

/// Path for messages: relative to the working directory when inside it.
pub fn display_path(path: &Path) -> String {
    if path.is_relative() {
        return path.display().to_string();
    }
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(&cwd).ok().map(Path::to_path_buf))
        .map(|rel| {
            if rel.as_os_str().is_empty() {
                ".".to_string()
            } else {
                rel.display().to_string()
            }
        })
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::LocalApplication;
    use serde_json::{Value, json};
    use std::cell::RefCell;
    use std::collections::{BTreeMap, HashSet};
    use tempfile::TempDir;

    /// Probe answering from fixed sets of paths.
    #[derive(Default)]
    struct FakeProbe {
        files: HashSet<PathBuf>,
        dirs: HashSet<PathBuf>,
    }

    impl PathProbe for FakeProbe {
        fn exists(&self, path: &Path) -> bool {
            self.files.contains(path) || self.dirs.contains(path)
        }
        fn is_dir(&self, path: &Path) -> bool {
            self.dirs.contains(path)
        }
    }

    struct Answer {
        text: &'static str,
        asked: RefCell<Vec<Option<String>>>,
    }

    impl Answer {
        fn new(text: &'static str) -> Self {
            Self {
                text,
                asked: RefCell::new(Vec::new()),
            }
        }
    }

    impl Prompt for Answer {
        fn choose(&self, _: &[String], _: &str) -> Result<usize, InteractiveError> {
            unreachable!()
        }
        fn ask(&self, _: &str, default: Option<&str>) -> Result<String, InteractiveError> {
            self.asked.borrow_mut().push(default.map(str::to_string));
            Ok(self.text.to_string())
        }
        fn confirm(&self, _: &str, _: bool) -> Result<bool, InteractiveError> {
            unreachable!()
        }
    }

    fn catalog() -> MountCatalog {
        let raw: BTreeMap<String, Value> = serde_json::from_value(json!({
            "/web/uploads": { "source": "local", "source_path": "uploads" },
            "var/cache": { "source": "tmp" },
        }))
        .unwrap();
        MountCatalog::normalize(&raw).unwrap()
    }

    fn project() -> ProjectContext {
        ProjectContext {
            root: Some(PathBuf::from("/p")),
            shared_dir: PathBuf::from(".platform/local/shared"),
            applications: vec![LocalApplication {
                name: "app".into(),
                dir: PathBuf::from("/p/backend"),
            }],
        }
    }

    #[test]
    fn test_shared_storage_default_wins() {
        let probe = FakeProbe {
            dirs: HashSet::from([
                PathBuf::from("/p/.platform/local/shared/uploads"),
                PathBuf::from("/p/backend/web/uploads"),
            ]),
            ..Default::default()
        };
        let target = default_target("/web/uploads", &catalog(), "app", &project(), &probe);
        assert_eq!(
            target,
            Some(PathBuf::from("/p/.platform/local/shared/uploads"))
        );
    }

    #[test]
    fn test_app_dir_default() {
        let probe = FakeProbe {
            dirs: HashSet::from([PathBuf::from("/p/backend/web/uploads")]),
            ..Default::default()
        };
        let target = default_target("/web/uploads", &catalog(), "app", &project(), &probe);
        assert_eq!(target, Some(PathBuf::from("/p/backend/web/uploads")));
    }

    #[test]
    fn test_app_dir_must_be_directory() {
        let probe = FakeProbe {
            files: HashSet::from([PathBuf::from("/p/backend/var/cache")]),
            ..Default::default()
        };
        assert!(default_target("var/cache", &catalog(), "app", &project(), &probe).is_none());
    }

    #[test]
    fn test_unmatched_container_uses_project_root() {
        let probe = FakeProbe {
            dirs: HashSet::from([PathBuf::from("/p/var/cache")]),
            ..Default::default()
        };
        let target = default_target("var/cache", &catalog(), "worker", &project(), &probe);
        assert_eq!(target, Some(PathBuf::from("/p/var/cache")));
    }

    #[test]
    fn test_no_project_no_default() {
        let probe = FakeProbe {
            dirs: HashSet::from([PathBuf::from("web/uploads")]),
            ..Default::default()
        };
        let target = default_target(
            "/web/uploads",
            &catalog(),
            "app",
            &ProjectContext::none(),
            &probe,
        );
        assert!(target.is_none());
    }

    #[test]
    fn test_explicit_target_verbatim() {
        let prompt = Answer::new("ignored");
        for interaction in [Interaction::interactive(), Interaction::non_interactive()] {
            let resolved = resolve_target(
                Some("./out/../out"),
                Some(Path::new("/p/backend/web/uploads")),
                interaction,
                &prompt,
            )
            .unwrap();
            assert_eq!(resolved.path, PathBuf::from("./out/../out"));
            assert!(!resolved.was_defaulted);
        }
        assert!(prompt.asked.borrow().is_empty());
    }

    #[test]
    fn test_prompt_prefilled_with_default() {
        let prompt = Answer::new("/p/backend/web/uploads");
        let resolved = resolve_target(
            None,
            Some(Path::new("/p/backend/web/uploads")),
            Interaction::interactive(),
            &prompt,
        )
        .unwrap();
        assert!(resolved.was_defaulted);
        assert_eq!(
            prompt.asked.borrow().as_slice(),
            &[Some("/p/backend/web/uploads".to_string())]
        );
    }

    #[test]
    fn test_prompt_other_answer() {
        let prompt = Answer::new("  elsewhere ");
        let resolved = resolve_target(None, None, Interaction::interactive(), &prompt).unwrap();
        assert_eq!(resolved.path, PathBuf::from("elsewhere"));
        assert!(!resolved.was_defaulted);
    }

    #[test]
    fn test_empty_answer_is_missing_target() {
        let prompt = Answer::new("");
        let err = resolve_target(None, None, Interaction::interactive(), &prompt).unwrap_err();
        assert!(matches!(err, TargetError::MissingTarget));
    }

    #[test]
    fn test_non_interactive_uses_default_or_fails() {
        let prompt = Answer::new("unused");
        let resolved = resolve_target(
            None,
            Some(Path::new("/p/shared")),
            Interaction::non_interactive(),
            &prompt,
        )
        .unwrap();
        assert_eq!(resolved.path, PathBuf::from("/p/shared"));
        assert!(resolved.was_defaulted);

        let err = resolve_target(None, None, Interaction::non_interactive(), &prompt).unwrap_err();
        assert!(matches!(err, TargetError::NonInteractive));
        assert!(prompt.asked.borrow().is_empty());
    }

    #[test]
    fn test_inspect_target() {
        let dir = TempDir::new().unwrap();
        assert_eq!(inspect_target(dir.path()).unwrap(), TargetState::Ready);
        assert_eq!(
            inspect_target(&dir.path().join("missing")).unwrap(),
            TargetState::Missing
        );

        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        let err = inspect_target(&file).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_inspect_target_leaves_directory_untouched() {
        let dir = TempDir::new().unwrap();
        let before = fs::metadata(dir.path()).unwrap().modified().unwrap();

        assert_eq!(inspect_target(dir.path()).unwrap(), TargetState::Ready);

        let after = fs::metadata(dir.path()).unwrap().modified().unwrap();
        assert_eq!(before, after);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_directory_is_invalid() {
        use std::os::unix::fs::PermissionsExt;

        // root bypasses permission bits
        if nix::unistd::geteuid().is_root() {
            return;
        }

        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        let result = inspect_target(&locked);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let err = result.unwrap_err();
        assert!(matches!(err, TargetError::InvalidTarget { .. }));
        assert!(err.to_string().contains("not writable"));
    }

    #[test]
    fn test_display_path_relative_untouched() {
        assert_eq!(display_path(Path::new("out/files")), "out/files");
    }
}
