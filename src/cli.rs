//! Command-line interface.

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use clap_complete::Shell;

use crate::container::RemoteContainerArgs;
use crate::interactive::Interaction;
use crate::sync::SyncOptions;

#[derive(Parser, Debug)]
#[command(
    name = "mount-download",
    version,
    about = "Download files from an application mount, using rsync",
    propagate_version = true
)]
pub struct Cli {
    /// Config file (default: project .mount-download.toml, then user config)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Do not ask any interactive question
    #[arg(long, short = 'n', global = true)]
    pub no_interaction: bool,

    /// Answer "yes" to confirmation questions; implies --no-interaction
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Increase verbosity (-v info, -vv debug and verbose rsync)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download files from a mount, using rsync
    #[command(name = "mount:download", visible_alias = "download")]
    MountDownload(MountDownloadArgs),

    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct MountDownloadArgs {
    /// The mount (as an app-relative path, a unique fragment, or its list number)
    #[arg(long, short = 'm')]
    pub mount: Option<String>,

    /// The directory to which files will be downloaded
    #[arg(long, value_name = "DIR")]
    pub target: Option<String>,

    #[command(flatten)]
    pub options: SyncOptions,

    #[command(flatten)]
    pub container: RemoteContainerArgs,
}

impl Cli {
    /// Whether prompts may be shown, decided once from flags and the terminal.
    pub fn interaction(&self) -> Interaction {
        if self.yes {
            return Interaction::assume_yes();
        }
        if self.no_interaction {
            return Interaction::non_interactive();
        }
        if std::io::stdin().is_terminal() && console::user_attended_stderr() {
            Interaction::interactive()
        } else {
            Interaction::non_interactive()
        }
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "info",
            _ => "debug",
        }
    }

    /// rsync verbosity: 0 quiet, 1 `-v`, 2 `-vv`.
    pub fn rsync_verbosity(&self) -> u8 {
        if self.quiet { 0 } else { 1 + self.verbose.min(2) / 2 }
    }
}
