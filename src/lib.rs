pub mod cli;
pub mod config;
pub mod container;
pub mod download;
pub mod interactive;
pub mod mounts;
pub mod project;
pub mod sync;
pub mod target;

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::CommandFactory;
use colored::Colorize;

use crate::cli::{Cli, Commands, MountDownloadArgs};
use crate::config::Config;
use crate::container::{ContainerDirectory, SshProbe};
use crate::download::{DownloadRequest, MountDownload, Outcome};
use crate::interactive::{Interaction, TerminalPrompt};
use crate::project::ProjectContext;
use crate::sync::RsyncTransport;

/// Library entrypoint: run the parsed command line, returning the exit code.
pub fn run(cli: Cli) -> Result<i32> {
    let interaction = cli.interaction();
    let verbosity = cli.rsync_verbosity();
    let quiet = cli.quiet;

    match cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "mount-download", &mut io::stdout());
            Ok(0)
        }
        Commands::MountDownload(args) => {
            let cwd =
                std::env::current_dir().context("Failed to determine the working directory")?;
            let config = Config::load(cli.config.as_deref(), &cwd)
                .context("Failed to load configuration")?;
            mount_download(&config, &cwd, args, interaction, verbosity, quiet)
        }
    }
}

fn mount_download(
    config: &Config,
    cwd: &Path,
    args: MountDownloadArgs,
    interaction: Interaction,
    verbosity: u8,
    quiet: bool,
) -> Result<i32> {
    let project = ProjectContext::discover(cwd, &config.local);

    let selector = ContainerDirectory::new(
        config.containers.clone(),
        SshProbe::new(config.ssh.clone(), Config::cache_dir()),
    );
    let transport =
        RsyncTransport::new(config.rsync.clone(), config.ssh.clone()).with_verbosity(verbosity);
    let prompt = TerminalPrompt::new();

    let request = DownloadRequest {
        container: args.container,
        mount: args.mount,
        target: args.target,
        options: args.options,
    };

    let outcome = MountDownload::new(&selector, &transport, &prompt, &project, interaction)
        .run(request);

    match outcome {
        Ok(Outcome::Completed(report)) => {
            if !quiet {
                eprintln!(
                    "{} {} files ({} bytes) from {} to {}",
                    "Downloaded".green().bold(),
                    report.files_transferred,
                    report.bytes_transferred,
                    report.remote_path.yellow(),
                    target::display_path(&report.local_path).yellow()
                );
            }
            Ok(0)
        }
        Ok(Outcome::Declined) => {
            tracing::debug!("download declined");
            Ok(1)
        }
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            Ok(1)
        }
    }
}
