//! File transfer between a container mount and a local directory.
//!
//! - **options**: `--delete`/`--include`/`--exclude` and the [`SyncSpec`] built from them
//! - **rsync**: the [`SyncTransport`] seam and its rsync-over-SSH implementation

pub mod options;
pub mod rsync;

pub use options::{Direction, SyncOptions, SyncSpec};
pub use rsync::{RsyncTransport, SyncReport, SyncTransport, TransportError};
