use serde::{Deserialize, Serialize};
use std::fmt;
use sysinfo::ProcessStatus;

/// One process as seen by a single enumeration pass. Immutable once produced;
/// the table model owns the mutable view of the process list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub state: RunState,
}

impl ProcessInfo {
    pub fn new(pid: u32, name: impl Into<String>, state: RunState) -> Self {
        ProcessInfo {
            pid,
            name: name.into(),
            state,
        }
    }
}

/// Scheduler state of a process. Kept on every row even though the default
/// view hides it, so filters can still use it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Sleeping,
    Idle,
    Zombie,
    Stopped,
    Dead,
    Unknown,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Sleeping => "sleeping",
            RunState::Idle => "idle",
            RunState::Zombie => "zombie",
            RunState::Stopped => "stopped",
            RunState::Dead => "dead",
            RunState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ProcessStatus> for RunState {
    fn from(status: ProcessStatus) -> Self {
        match status {
            ProcessStatus::Run => RunState::Running,
            ProcessStatus::Sleep | ProcessStatus::UninterruptibleDiskSleep => RunState::Sleeping,
            ProcessStatus::Idle => RunState::Idle,
            ProcessStatus::Zombie => RunState::Zombie,
            ProcessStatus::Stop | ProcessStatus::Tracing => RunState::Stopped,
            ProcessStatus::Dead => RunState::Dead,
            _ => RunState::Unknown,
        }
    }
}
