//! rsync-over-SSH transport.
//!
//! The transport runs one rsync process per [`SyncSpec`] and waits for it.
//! rsync's stdout is echoed to stderr line by line while it runs (unless
//! verbosity is 0) and kept for the `--stats` summary.
//! Timeouts and cancellation are left to rsync/ssh and the surrounding
//! process; nothing is retried here.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Instant;

use thiserror::Error;

use super::options::{Direction, SyncSpec};
use crate::config::{ConfigError, RsyncConfig, SshConfig};
use crate::container::RemoteEndpoint;
use crate::mounts::catalog::relative;

/// Errors that can occur while transferring files.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("rsync not found ({0}); install rsync to download mounts")]
    RsyncMissing(String),

    #[error("Failed to execute rsync: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("SSH connection failed: {0}")]
    SshFailed(String),

    #[error("Remote path not found: {0}")]
    RemoteNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("rsync failed: {0}")]
    RsyncFailed(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Outcome of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub remote_path: String,
    pub local_path: PathBuf,
    pub direction: Direction,
    /// Number of files transferred.
    pub files_transferred: u64,
    /// Total bytes transferred.
    pub bytes_transferred: u64,
    pub duration_ms: u64,
}

/// Moves files between a container and the local machine.
pub trait SyncTransport {
    fn run(&self, endpoint: &RemoteEndpoint, spec: &SyncSpec) -> Result<SyncReport, TransportError>;
}

/// Statistics parsed from rsync output.
#[derive(Debug, Default, PartialEq, Eq)]
struct RsyncStats {
    files_transferred: u64,
    bytes_transferred: u64,
}

/// [`SyncTransport`] shelling out to rsync with ssh as the remote shell.
#[derive(Debug, Clone)]
pub struct RsyncTransport {
    rsync: RsyncConfig,
    ssh: SshConfig,
    /// 0 = quiet, 1 = `-v`, 2+ = `-vv`
    verbosity: u8,
}

impl RsyncTransport {
    pub fn new(rsync: RsyncConfig, ssh: SshConfig) -> Self {
        Self {
            rsync,
            ssh,
            verbosity: 1,
        }
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Locate the rsync binary, on PATH or as given.
    fn binary(&self) -> Result<PathBuf, TransportError> {
        which::which(&self.rsync.binary)
            .map_err(|e| TransportError::RsyncMissing(format!("{}: {}", self.rsync.binary, e)))
    }

    /// Full rsync argument list for `spec`.
    pub fn build_args(
        &self,
        endpoint: &RemoteEndpoint,
        spec: &SyncSpec,
    ) -> Result<Vec<String>, TransportError> {
        let mut args: Vec<String> = vec![
            "--archive".into(),
            "--compress".into(),
            "--human-readable".into(),
            "--stats".into(),
            "--protect-args".into(),
        ];

        match self.verbosity {
            0 => {}
            1 => args.push("-v".into()),
            _ => args.push("-vv".into()),
        }

        if self.rsync.timeout > 0 {
            args.push(format!("--timeout={}", self.rsync.timeout));
        }

        args.push("-e".into());
        args.push(self.ssh.command_line());

        if spec.delete {
            args.push("--delete".into());
        }
        for pattern in &spec.exclude {
            args.push(format!("--exclude={pattern}"));
        }
        for pattern in &spec.include {
            args.push(format!("--include={pattern}"));
        }

        args.extend(self.rsync.extra_args()?);

        // the remote shell starts in the application root
        let remote = relative(&spec.remote_path);
        let local = spec.local_path.to_string_lossy();
        args.push("--".into());
        match spec.direction {
            Direction::Download => {
                args.push(format!("{}:{}/", endpoint.ssh_url, remote));
                args.push(local.into_owned());
            }
            Direction::Upload => {
                args.push(format!("{}/", local.trim_end_matches('/')));
                args.push(format!("{}:{}", endpoint.ssh_url, remote));
            }
        }

        Ok(args)
    }
}

impl SyncTransport for RsyncTransport {
    fn run(&self, endpoint: &RemoteEndpoint, spec: &SyncSpec) -> Result<SyncReport, TransportError> {
        let binary = self.binary()?;
        let args = self.build_args(endpoint, spec)?;
        let start = Instant::now();

        tracing::debug!(
            rsync = %binary.display(),
            args = %shell_words::join(&args),
            "starting rsync"
        );

        let mut child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // drained on its own thread so a chatty stderr cannot block stdout
        let stderr_handle = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                match pipe.read_to_end(&mut buf) {
                    Ok(_) => String::from_utf8_lossy(&buf).into_owned(),
                    Err(e) => format!("failed to read rsync stderr: {e}"),
                }
            })
        });

        let stdout = match child.stdout.take() {
            Some(pipe) if self.verbosity > 0 => echo_lines(pipe, &mut io::stderr().lock())?,
            Some(pipe) => echo_lines(pipe, &mut io::sink())?,
            None => String::new(),
        };
        let status = child.wait()?;
        let stderr = stderr_handle
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        let duration_ms = start.elapsed().as_millis() as u64;

        if !status.success() {
            let error = classify_failure(&stderr, &spec.remote_path);
            tracing::warn!(
                ssh_url = %endpoint.ssh_url,
                remote_path = %spec.remote_path,
                status = ?status.code(),
                error = %error,
                "rsync failed"
            );
            return Err(error);
        }

        let stats = parse_rsync_stats(&stdout);

        tracing::info!(
            ssh_url = %endpoint.ssh_url,
            remote_path = %spec.remote_path,
            local_path = %spec.local_path.display(),
            files = stats.files_transferred,
            bytes = stats.bytes_transferred,
            duration_ms,
            "rsync completed"
        );

        Ok(SyncReport {
            remote_path: spec.remote_path.clone(),
            local_path: spec.local_path.clone(),
            direction: spec.direction,
            files_transferred: stats.files_transferred,
            bytes_transferred: stats.bytes_transferred,
            duration_ms,
        })
    }
}

/// Copy `reader` to `echo` line by line as it arrives; returns everything read.
fn echo_lines(reader: impl Read, echo: &mut impl Write) -> io::Result<String> {
    let mut collected = Vec::new();
    for line in BufReader::new(reader).split(b'\n') {
        let line = line?;
        echo.write_all(&line)?;
        echo.write_all(b"\n")?;
        echo.flush()?;
        collected.extend_from_slice(&line);
        collected.push(b'\n');
    }
    Ok(String::from_utf8_lossy(&collected).into_owned())
}

/// Map rsync's stderr to a specific error.
fn classify_failure(stderr: &str, remote_path: &str) -> TransportError {
    let stderr = stderr.trim();
    if stderr.contains("Connection refused")
        || stderr.contains("Connection timed out")
        || stderr.contains("Could not resolve hostname")
    {
        TransportError::SshFailed(stderr.to_string())
    } else if stderr.contains("No such file or directory") {
        TransportError::RemoteNotFound(remote_path.to_string())
    } else if stderr.contains("Permission denied") {
        TransportError::PermissionDenied(stderr.to_string())
    } else {
        TransportError::RsyncFailed(stderr.to_string())
    }
}

/// Parse transfer statistics from rsync --stats output.
fn parse_rsync_stats(output: &str) -> RsyncStats {
    let mut stats = RsyncStats::default();

    for line in output.lines() {
        let line = line.trim();

        // "Number of regular files transferred: N"
        if line.starts_with("Number of regular files transferred:")
            && let Some(num_str) = line.split(':').nth(1)
        {
            stats.files_transferred = parse_size(num_str.trim()).unwrap_or(0);
        }

        // "Total transferred file size: 1,234 bytes" or "1.23K bytes" with -h
        if line.starts_with("Total transferred file size:")
            && let Some(size_part) = line.split(':').nth(1)
        {
            let size_str = size_part.split_whitespace().next().unwrap_or("0");
            stats.bytes_transferred = parse_size(size_str).unwrap_or(0);
        }
    }

    stats
}

/// Parse `1,234`, `1234` or a `--human-readable` value like `1.23K`
/// (powers of 1000).
fn parse_size(value: &str) -> Option<u64> {
    let value = value.replace(',', "");
    let multiplier = match value.chars().last()? {
        'K' | 'k' => 1e3,
        'M' => 1e6,
        'G' => 1e9,
        'T' => 1e12,
        _ => return value.parse().ok(),
    };
    value[..value.len() - 1]
        .parse::<f64>()
        .ok()
        .map(|n| (n * multiplier).round() as u64)
}
