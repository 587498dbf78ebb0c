//! Container mounts: normalization and identifier resolution.
//!
//! - **catalog**: turns raw mount declarations into a [`MountCatalog`]
//! - **resolver**: maps `--mount` or an interactive pick to one catalog path

pub mod catalog;
pub mod resolver;

use thiserror::Error;

use crate::interactive::InteractiveError;

pub use catalog::{MountCatalog, MountDescriptor, MountSource};
pub use resolver::{choose_interactively, match_by_identifier};

/// Errors raised while building the catalog or resolving a mount.
#[derive(Error, Debug)]
pub enum MountError {
    #[error("Invalid mount configuration: {0}")]
    Configuration(String),

    #[error("Mount not found: {0}")]
    NotFound(String),

    #[error("Mount {identifier:?} is ambiguous; it matches: {}", .candidates.join(", "))]
    Ambiguous {
        identifier: String,
        candidates: Vec<String>,
    },

    #[error("The --mount option must be specified (in non-interactive mode)")]
    NonInteractive,

    #[error(transparent)]
    Prompt(#[from] InteractiveError),
}
