//! Transfer options and the per-invocation [`SyncSpec`].

use std::fmt;
use std::path::PathBuf;

use clap::Args;

/// Which way files move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Remote mount to local directory.
    Download,
    /// Local directory to remote mount.
    Upload,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => write!(f, "download"),
            Self::Upload => write!(f, "upload"),
        }
    }
}

/// Filter and deletion options, passed to the transport verbatim.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Whether to delete extraneous files in the target directory
    #[arg(long)]
    pub delete: bool,

    /// File(s) to exclude from the download (pattern)
    #[arg(long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// File(s) to include in the download (pattern)
    #[arg(long, value_name = "PATTERN")]
    pub include: Vec<String>,
}

/// Everything the transport needs for one transfer. Built once, consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSpec {
    /// Mount path on the remote, as it appears in the catalog.
    pub remote_path: String,
    pub local_path: PathBuf,
    pub direction: Direction,
    pub delete: bool,
    /// Empty means everything.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl SyncSpec {
    pub fn download(remote_path: &str, local_path: PathBuf, options: SyncOptions) -> Self {
        Self {
            remote_path: remote_path.to_string(),
            local_path,
            direction: Direction::Download,
            delete: options.delete,
            include: options.include,
            exclude: options.exclude,
        }
    }
}
