use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Stack unwinding method passed to the recorder via `--call-graph`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnwindMethod {
    /// Do not unwind the call stack. Tiny data files, hard to interpret.
    None,
    /// DWARF unwinder, requires debug information. The portable default.
    #[default]
    Dwarf,
    /// Frame pointer unwinding, requires -fno-omit-frame-pointer builds.
    FramePointer,
    /// Last Branch Record, Intel-only hardware assisted unwinding.
    LastBranchRecord,
}

impl UnwindMethod {
    /// The `--call-graph` argument value, or `None` when unwinding is off.
    pub fn as_recorder_arg(&self) -> Option<&'static str> {
        match self {
            UnwindMethod::None => Option::None,
            UnwindMethod::Dwarf => Some("dwarf"),
            UnwindMethod::FramePointer => Some("fp"),
            UnwindMethod::LastBranchRecord => Some("lbr"),
        }
    }
}

impl fmt::Display for UnwindMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_recorder_arg().unwrap_or("none"))
    }
}

impl FromStr for UnwindMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(UnwindMethod::None),
            "dwarf" => Ok(UnwindMethod::Dwarf),
            "fp" => Ok(UnwindMethod::FramePointer),
            "lbr" => Ok(UnwindMethod::LastBranchRecord),
            other => Err(format!(
                "unknown unwind method '{other}', expected one of: none, dwarf, fp, lbr"
            )),
        }
    }
}

/// Recording options independent of the target.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfOptions {
    pub unwind: UnwindMethod,
    /// Event type such as `cycles:Pu`; the recorder's default when empty.
    pub event_type: Option<String>,
}

impl PerfOptions {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(method) = self.unwind.as_recorder_arg() {
            args.push("--call-graph".to_string());
            args.push(method.to_string());
        }
        if let Some(event) = self.event_type.as_deref().filter(|e| !e.is_empty()) {
            args.push("--event".to_string());
            args.push(event.to_string());
        }
        args
    }
}

/// What the recorder is pointed at: a freshly launched application, or a set
/// of already running processes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordTarget {
    Launch {
        program: PathBuf,
        args: Vec<String>,
        working_dir: Option<PathBuf>,
    },
    Attach {
        pids: Vec<u32>,
    },
}

/// Everything needed to start one recording session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordRequest {
    pub options: PerfOptions,
    pub output_path: PathBuf,
    pub target: RecordTarget,
}

/// Events emitted by an active recording session. `Output` lines always
/// precede the terminal `Finished`/`Failed` event of their session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Output(String),
    Finished(PathBuf),
    Failed(String),
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionEvent::Output(_))
    }
}
