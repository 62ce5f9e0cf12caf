//! On-disk record of a supervised service session, used by the command
//! line interface to answer `podup status` while a session is running.

use std::fmt::Display;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use procfs::process::{ProcState, Process};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ServiceStatus {
    Running,
    Stopped,
}

impl Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let print = match *self {
            Self::Running => "Running",
            Self::Stopped => "Stopped",
        };
        write!(f, "{}", print)
    }
}

/// State of one supervised service session.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ServiceState {
    // Process ID of the service process.
    pub pid: i32,
    // Endpoint the service listens on.
    pub uri: String,
    pub status: ServiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl ServiceState {
    const STATE_FILE_PATH: &'static str = "state.json";

    pub fn new(pid: i32, uri: &str) -> Self {
        Self {
            pid,
            uri: uri.to_string(),
            status: ServiceStatus::Running,
            created: Some(Utc::now()),
        }
    }

    pub fn save(&self, state_dir: &Path) -> Result<()> {
        fs::create_dir_all(state_dir)
            .with_context(|| format!("failed to create state directory {:?}", state_dir))?;
        let state_file_path = Self::file_path(state_dir);
        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&state_file_path)
            .with_context(|| format!("failed to open state file {:?}", state_file_path))?;
        serde_json::to_writer(&file, self)?;
        Ok(())
    }

    pub fn load(state_dir: &Path) -> Result<Self> {
        let state_file_path = Self::file_path(state_dir);
        let file = File::open(&state_file_path)
            .with_context(|| format!("failed to open state file {:?}", state_file_path))?;
        let state: Self = serde_json::from_reader(&file)?;
        Ok(state)
    }

    pub fn remove(state_dir: &Path) -> Result<()> {
        let state_file_path = Self::file_path(state_dir);
        fs::remove_file(&state_file_path)
            .with_context(|| format!("failed to remove state file {:?}", state_file_path))?;
        Ok(())
    }

    /// Returns the path to the state JSON file inside `state_dir`.
    pub fn file_path(state_dir: &Path) -> PathBuf {
        state_dir.join(Self::STATE_FILE_PATH)
    }

    /// Re-checks the recorded pid against the live process table. A pid
    /// that is gone, a zombie, or unreadable counts as stopped.
    pub fn refresh(mut self) -> Self {
        let status = match Process::new(self.pid) {
            Ok(proc) => match proc.stat.state() {
                Ok(ProcState::Zombie) | Ok(ProcState::Dead) | Err(_) => ServiceStatus::Stopped,
                Ok(_) => ServiceStatus::Running,
            },
            Err(_) => ServiceStatus::Stopped,
        };
        self.status = status;
        self
    }
}
