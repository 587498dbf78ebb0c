//! The `mount:download` workflow.
//!
//! ```text
//! select container ──> resolve mount ──> resolve target ──> check target
//!        │                   │                 │                 │
//!        └─ NoMounts         └─ NotFound/...   └─ MissingTarget  ├─ create? ──no──> Declined
//!                                                                └─ InvalidTarget
//! confirm ──no──> Declined
//!    └──yes──> transport.run(SyncSpec { direction: Download, .. }) ──> Completed
//! ```
//!
//! Every step short-circuits the rest. Nothing is written locally before the
//! final transport call, so there is nothing to roll back.

use colored::Colorize;
use thiserror::Error;

use crate::container::{ContainerError, ContainerKind, ContainerSelector, RemoteContainerArgs};
use crate::interactive::{Interaction, InteractiveError, Prompt};
use crate::mounts::{MountCatalog, MountError, choose_interactively, match_by_identifier};
use crate::project::ProjectContext;
use crate::sync::{SyncOptions, SyncReport, SyncSpec, SyncTransport, TransportError};
use crate::target::{
    FsProbe, PathProbe, TargetError, TargetState, default_target, display_path, inspect_target,
    resolve_target,
};

/// Errors that end a download.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("The {kind} {name:?} doesn't define any mounts.")]
    NoMounts { kind: ContainerKind, name: String },

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Mount(#[from] MountError),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Prompt(#[from] InteractiveError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// How a download ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed(SyncReport),
    /// The user answered "no" to a confirmation.
    Declined,
}

impl Outcome {
    /// 0 when files were synced, 1 when the user backed out.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Completed(_) => 0,
            Outcome::Declined => 1,
        }
    }
}

/// Inputs of one `mount:download` invocation.
#[derive(Debug, Clone, Default)]
pub struct DownloadRequest {
    pub container: RemoteContainerArgs,
    /// `--mount`: exact path, unique fragment, or list position.
    pub mount: Option<String>,
    /// `--target`
    pub target: Option<String>,
    pub options: SyncOptions,
}

/// Orchestrates a mount download over injected collaborators.
pub struct MountDownload<'a> {
    selector: &'a dyn ContainerSelector,
    transport: &'a dyn SyncTransport,
    prompt: &'a dyn Prompt,
    project: &'a ProjectContext,
    probe: &'a dyn PathProbe,
    interaction: Interaction,
}

impl<'a> MountDownload<'a> {
    pub fn new(
        selector: &'a dyn ContainerSelector,
        transport: &'a dyn SyncTransport,
        prompt: &'a dyn Prompt,
        project: &'a ProjectContext,
        interaction: Interaction,
    ) -> Self {
        Self {
            selector,
            transport,
            prompt,
            project,
            probe: &FsProbe,
            interaction,
        }
    }

    /// Use `probe` instead of the real filesystem for target defaulting.
    pub fn with_probe(mut self, probe: &'a dyn PathProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn run(&self, request: DownloadRequest) -> Result<Outcome, DownloadError> {
        let container = self
            .selector
            .select(&request.container, self.interaction, self.prompt)?;

        if container.raw_mounts.is_empty() {
            return Err(DownloadError::NoMounts {
                kind: container.kind,
                name: container.name,
            });
        }
        let catalog = MountCatalog::normalize(&container.raw_mounts)?;

        let mount_path = match request.mount.as_deref() {
            Some(identifier) => match_by_identifier(identifier, &catalog)?,
            None => choose_interactively(&catalog, self.interaction, self.prompt)?,
        };
        tracing::info!(container = %container.name, mount = mount_path, "resolved mount");

        let default = match request.target {
            Some(_) => None,
            None => default_target(
                mount_path,
                &catalog,
                &container.name,
                self.project,
                self.probe,
            ),
        };
        let target = resolve_target(
            request.target.as_deref(),
            default.as_deref(),
            self.interaction,
            self.prompt,
        )?;
        tracing::info!(
            target = %target.path.display(),
            defaulted = target.was_defaulted,
            "resolved target"
        );

        let shown_target = display_path(&target.path);

        if inspect_target(&target.path)? == TargetState::Missing {
            let question = format!(
                "Directory not found: {}. Do you want to create it?",
                shown_target.yellow()
            );
            if !self.interaction.confirm(self.prompt, &question, "--yes")? {
                return Ok(Outcome::Declined);
            }
        }

        let summary = format!(
            "\nDownloading files from the remote mount {} to {}\n\nAre you sure you want to continue?",
            mount_path.yellow(),
            shown_target.yellow()
        );
        if !self.interaction.confirm(self.prompt, &summary, "--yes")? {
            return Ok(Outcome::Declined);
        }

        let spec = SyncSpec::download(mount_path, target.path, request.options);
        let report = self.transport.run(&container.endpoint, &spec)?;

        Ok(Outcome::Completed(report))
    }
}
