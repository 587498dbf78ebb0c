//! Normalization of a container's raw mount declarations.
//!
//! Containers declare mounts as a mapping of path to definition. Two shapes
//! are accepted for a definition:
//!
//! ```text
//! "web/uploads": { source: "local", source_path: "uploads" }
//! "private":     "shared:files/private"      # legacy string form
//! ```
//!
//! The result is a [`MountCatalog`], ordered by app-relative path (so `/zz`
//! sorts after `aa`) and never mutated after construction.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use super::MountError;

/// Prefix of the legacy string mount definition.
const LEGACY_SHARED_PREFIX: &str = "shared:files";

/// Backing storage of a mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountSource {
    /// Persistent storage local to the application (shareable between instances)
    Local,
    /// Temporary storage, lost on redeploy
    Tmp,
    /// Network storage service
    Service,
    /// Storage local to a single instance
    Instance,
    /// Any source type this tool does not know about
    Other(String),
}

impl MountSource {
    fn parse(value: &str) -> Self {
        match value.trim() {
            "local" => Self::Local,
            "tmp" => Self::Tmp,
            "service" => Self::Service,
            "instance" => Self::Instance,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for MountSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Tmp => write!(f, "tmp"),
            Self::Service => write!(f, "service"),
            Self::Instance => write!(f, "instance"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// A single normalized mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountDescriptor {
    /// Mount path as declared (whitespace and trailing slashes trimmed).
    pub path: String,
    pub source: MountSource,
    /// Subpath within the backing storage, slashes trimmed.
    pub source_path: Option<String>,
    /// Name of the backing service for `service` mounts.
    pub service: Option<String>,
}

impl MountDescriptor {
    /// One-line label used in interactive lists.
    pub fn label(&self) -> String {
        match (&self.source_path, &self.service) {
            (Some(sp), _) => format!("{} ({}: {})", self.path, self.source, sp),
            (None, Some(svc)) => format!("{} ({}: {})", self.path, self.source, svc),
            (None, None) => format!("{} ({})", self.path, self.source),
        }
    }
}

/// Ordered mapping of mount path to [`MountDescriptor`].
#[derive(Debug, Clone, Default)]
pub struct MountCatalog {
    /// Keyed by the app-relative form; descriptors keep the declared path.
    mounts: BTreeMap<String, MountDescriptor>,
}

impl MountCatalog {
    /// Build a catalog from raw declarations.
    ///
    /// Deterministic: the catalog is ordered by app-relative path regardless of
    /// input order.
    pub fn normalize<'a, I>(raw: I) -> Result<Self, MountError>
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        let mut mounts: BTreeMap<String, MountDescriptor> = BTreeMap::new();

        for (declared, definition) in raw {
            let path = normalize_declared_path(declared);
            if relative(&path).is_empty() {
                return Err(MountError::Configuration(format!(
                    "mount path is empty: {declared:?}"
                )));
            }

            // "/a" and "a/" name the same mount
            let key = relative(&path).to_string();
            if let Some(previous) = mounts.get(&key) {
                return Err(MountError::Configuration(format!(
                    "duplicate mount path: {:?} and {declared:?}",
                    previous.path
                )));
            }

            let descriptor = parse_definition(&path, definition)?;
            mounts.insert(key, descriptor);
        }

        Ok(Self { mounts })
    }

    /// Look up a mount by path; a leading slash is not significant.
    pub fn get(&self, path: &str) -> Option<&MountDescriptor> {
        self.mounts.get(relative(path.trim_end_matches('/')))
    }

    /// Declared mount paths in catalog order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.mounts.values().map(|m| m.path.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &MountDescriptor> {
        self.mounts.values()
    }

    /// Labels for the interactive chooser, in catalog order.
    pub fn options(&self) -> Vec<String> {
        self.iter().map(MountDescriptor::label).collect()
    }

    /// Mounts bound to the application's shared file storage.
    ///
    /// Maps mount path to the subpath of the shared storage it is bound to.
    /// Only `local` mounts with a `source_path` qualify.
    pub fn shared_file_mounts(&self) -> BTreeMap<&str, &str> {
        self.iter()
            .filter(|m| m.source == MountSource::Local)
            .filter_map(|m| {
                m.source_path
                    .as_deref()
                    .filter(|sp| !sp.is_empty())
                    .map(|sp| (m.path.as_str(), sp))
            })
            .collect()
    }
}

/// Strip the leading slash of a mount path.
pub(crate) fn relative(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Trim whitespace and trailing slashes, keep a declared leading slash.
pub(crate) fn normalize_declared_path(path: &str) -> String {
    let trimmed = path.trim();
    let without_trailing = trimmed.trim_end_matches('/');
    if without_trailing.is_empty() && trimmed.starts_with('/') {
        return String::new();
    }
    without_trailing.to_string()
}

fn trim_slashes(value: &str) -> String {
    value.trim().trim_matches('/').to_string()
}

fn parse_definition(path: &str, definition: &Value) -> Result<MountDescriptor, MountError> {
    match definition {
        Value::String(legacy) => {
            let Some(rest) = legacy.trim().strip_prefix(LEGACY_SHARED_PREFIX) else {
                return Err(MountError::Configuration(format!(
                    "failed to parse mount definition for {path:?}: {legacy:?}"
                )));
            };
            Ok(MountDescriptor {
                path: path.to_string(),
                source: MountSource::Local,
                source_path: Some(trim_slashes(rest)),
                service: None,
            })
        }
        Value::Object(table) => {
            let source = table
                .get("source")
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| {
                    MountError::Configuration(format!(
                        "mount {path:?} has no source type: {definition}"
                    ))
                })?;

            Ok(MountDescriptor {
                path: path.to_string(),
                source: MountSource::parse(source),
                source_path: table
                    .get("source_path")
                    .and_then(Value::as_str)
                    .map(trim_slashes),
                service: table
                    .get("service")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        }
        other => Err(MountError::Configuration(format!(
            "invalid mount definition for {path:?}: {other}"
        ))),
    }
}
