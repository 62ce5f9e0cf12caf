//! Thin wrapper around the `podman` command line tool.
//!
//! The runner only knows how to turn a subcommand argument list into a full
//! invocation and how to execute it, either detached (for the long-lived
//! service process) or captured (for one-shot pass-through commands). It
//! deliberately understands nothing about the output of any subcommand.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use crate::errors::{CommandError, ServiceError};

/// Options applied to every podman invocation, mirroring a subset of the
/// tool's global flags.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    root: Option<PathBuf>,
    runroot: Option<PathBuf>,
    log_level: Option<String>,
}

impl GlobalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage root directory (`--root`).
    pub fn with_root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.root = Some(path.into());
        self
    }

    /// Runtime state directory (`--runroot`).
    pub fn with_runroot<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.runroot = Some(path.into());
        self
    }

    /// Log level passed through to podman itself (`--log-level`).
    pub fn with_log_level<S: Into<String>>(mut self, level: S) -> Self {
        self.log_level = Some(level.into());
        self
    }

    fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(root) = &self.root {
            args.push(format!("--root={}", root.display()));
        }
        if let Some(runroot) = &self.runroot {
            args.push(format!("--runroot={}", runroot.display()));
        }
        if let Some(level) = &self.log_level {
            args.push(format!("--log-level={}", level));
        }
        args
    }
}

/// Executes podman commands.
#[derive(Debug, Clone)]
pub struct Runner {
    path: PathBuf,
    privileged: bool,
    options: GlobalOptions,
    env: HashMap<String, String>,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            path: PathBuf::from("podman"),
            privileged: false,
            options: GlobalOptions::default(),
            env: HashMap::new(),
        }
    }
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the podman binary to execute.
    pub fn with_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = path.into();
        self
    }

    /// Runs every invocation through `sudo`.
    pub fn with_privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    pub fn with_options(mut self, options: GlobalOptions) -> Self {
        self.options = options;
        self
    }

    /// Adds an environment variable to every invocation.
    pub fn with_env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn options(&self) -> &GlobalOptions {
        &self.options
    }

    /// Builds the full argument vector for the given subcommand arguments.
    pub fn construct(&self, args: &[String]) -> Vec<String> {
        let mut argv = Vec::new();
        if self.privileged {
            argv.push("sudo".to_string());
        }
        argv.push(self.path.display().to_string());
        argv.extend(self.options.to_args());
        argv.extend(args.iter().cloned());
        argv
    }

    fn command(&self, args: &[String]) -> Command {
        let argv = self.construct(args);
        let mut command = Command::new(&argv[0]);
        command.args(&argv[1..]);
        command.envs(&self.env);
        command
    }

    /// Spawns the invocation detached, without waiting for it to finish.
    /// The child's stdio is nulled; its lifetime belongs to the caller.
    pub fn spawn(&self, args: &[String]) -> io::Result<Child> {
        log::debug!("spawning {:?}", self.construct(args));
        self.command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
    }

    /// Runs the invocation to completion and returns its stdout. A non-zero
    /// exit status is reported as a [`CommandError`] carrying stderr.
    pub fn run(&self, args: &[String]) -> Result<String, ServiceError> {
        log::debug!("running {:?}", self.construct(args));
        let output = self.command(args).output()?;
        if !output.status.success() {
            return Err(CommandError {
                command: self.construct(args).join(" "),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
