#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

use mount_download::container::{
    Container, ContainerError, ContainerKind, ContainerSelector, RemoteContainerArgs,
    RemoteEndpoint,
};
use mount_download::interactive::{InteractiveError, Interaction, Prompt};
use mount_download::sync::{SyncReport, SyncSpec, SyncTransport, TransportError};
use serde_json::Value;

/// Selector always returning the same container.
pub struct FixedContainer {
    pub container: Container,
}

impl FixedContainer {
    pub fn new(mounts: Value) -> Self {
        let raw_mounts: BTreeMap<String, Value> = serde_json::from_value(mounts).unwrap();
        Self {
            container: Container {
                name: "app".into(),
                kind: ContainerKind::App,
                endpoint: RemoteEndpoint {
                    ssh_url: "abc-main--app@ssh.example.com".into(),
                },
                raw_mounts,
            },
        }
    }
}

impl ContainerSelector for FixedContainer {
    fn select(
        &self,
        _: &RemoteContainerArgs,
        _: Interaction,
        _: &dyn Prompt,
    ) -> Result<Container, ContainerError> {
        Ok(self.container.clone())
    }
}

/// Transport recording each call instead of moving files.
#[derive(Default)]
pub struct RecordingTransport {
    pub calls: RefCell<Vec<(RemoteEndpoint, SyncSpec)>>,
}

impl SyncTransport for RecordingTransport {
    fn run(&self, endpoint: &RemoteEndpoint, spec: &SyncSpec) -> Result<SyncReport, TransportError> {
        self.calls
            .borrow_mut()
            .push((endpoint.clone(), spec.clone()));
        Ok(SyncReport {
            remote_path: spec.remote_path.clone(),
            local_path: spec.local_path.clone(),
            direction: spec.direction,
            files_transferred: 3,
            bytes_transferred: 42,
            duration_ms: 1,
        })
    }
}

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Choose(usize),
    Ask(&'static str),
    Confirm(bool),
}

/// Prompt answering from a script; panics on anything unscripted.
#[derive(Default)]
pub struct ScriptedPrompt {
    replies: RefCell<VecDeque<Reply>>,
    pub questions: RefCell<Vec<String>>,
    pub ask_defaults: RefCell<Vec<Option<String>>>,
}

impl ScriptedPrompt {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: RefCell::new(replies.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn remaining(&self) -> usize {
        self.replies.borrow().len()
    }

    fn next(&self, message: &str) -> Reply {
        self.questions.borrow_mut().push(message.to_string());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted prompt: {message}"))
    }
}

impl Prompt for ScriptedPrompt {
    fn choose(&self, options: &[String], message: &str) -> Result<usize, InteractiveError> {
        match self.next(message) {
            Reply::Choose(index) => {
                assert!(index < options.len(), "choice out of range");
                Ok(index)
            }
            other => panic!("expected a choice, script has {other:?}"),
        }
    }

    fn ask(&self, message: &str, default: Option<&str>) -> Result<String, InteractiveError> {
        self.ask_defaults
            .borrow_mut()
            .push(default.map(str::to_string));
        match self.next(message) {
            Reply::Ask(answer) => Ok(answer.to_string()),
            other => panic!("expected a question, script has {other:?}"),
        }
    }

    fn confirm(&self, message: &str, _: bool) -> Result<bool, InteractiveError> {
        match self.next(message) {
            Reply::Confirm(answer) => Ok(answer),
            other => panic!("expected a confirmation, script has {other:?}"),
        }
    }
}

/// Write an executable fake `rsync` that records its arguments, one per line,
/// to `record` and prints a minimal `--stats` block.
#[cfg(unix)]
pub fn fake_rsync(dir: &Path, record: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("rsync");
    std::fs::write(
        &script,
        format!(
            "#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\necho 'Number of regular files transferred: 2'\necho 'Total transferred file size: 1,024 bytes'\n",
            record.display()
        ),
    )
    .unwrap();
    let mut perms = std::fs::metadata(&script).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).unwrap();
    script
}
