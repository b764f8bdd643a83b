use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Everything needed for one engine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Directory holding the `clisp-<profile>` engine directories.
    pub engine_root: PathBuf,
    /// File name of the memory image inside the engine directory.
    pub memory_image: String,
    /// Source files preloaded before the initial command, in order.
    #[serde(default)]
    pub files_to_load: Vec<PathBuf>,
    pub initial_command: String,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OsFamily {
    Windows,
    MacOs,
    Linux,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuArch {
    AppleSilicon,
    Intel,
    Other(String),
}

impl CpuArch {
    pub fn as_str(&self) -> &str {
        match self {
            CpuArch::AppleSilicon => "arm64",
            CpuArch::Intel => "x86_64",
            CpuArch::Other(name) => name,
        }
    }
}

/// Host description used to pick an engine build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub os: OsFamily,
    pub arch: CpuArch,
}

impl Environment {
    /// Detect the running host.
    pub fn detect() -> Self {
        Self::from_consts(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Build from `std::env::consts`-style names.
    pub fn from_consts(os: &str, arch: &str) -> Self {
        let os = match os {
            "windows" => OsFamily::Windows,
            "macos" => OsFamily::MacOs,
            "linux" => OsFamily::Linux,
            _ => OsFamily::Other,
        };
        let arch = match arch {
            "aarch64" => CpuArch::AppleSilicon,
            "x86" | "x86_64" => CpuArch::Intel,
            other => CpuArch::Other(other.to_string()),
        };
        Self { os, arch }
    }
}

/// Resolved engine build for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    pub os: OsFamily,
    pub arch: CpuArch,
    /// `win`, `mac-arm64`, `mac-intel` or `linux`.
    pub name: &'static str,
    pub executable: &'static str,
    pub engine_dir: PathBuf,
    /// Native Apple silicon build was missing; the Intel build runs under translation.
    pub fell_back: bool,
}

impl PlatformProfile {
    pub fn is_windows(&self) -> bool {
        self.os == OsFamily::Windows
    }
}

/// Absolute paths of the engine artifacts for a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnginePaths {
    pub executable: PathBuf,
    pub memory_image: PathBuf,
}

/// Predicted task completion time in seconds. Always non-negative and finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct TaskTime(f64);

impl TaskTime {
    pub fn new(seconds: f64) -> Option<Self> {
        (seconds.is_finite() && seconds >= 0.0).then_some(Self(seconds))
    }

    pub fn seconds(self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for TaskTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3} s", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    Stdout(String),
    Stderr(String),
    Info(InfoEvent),
}

/// Structured notices emitted by the launcher and consumed by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InfoEvent {
    // CLI messages generated outside the engine.
    Message(String),
    ProfileResolved { profile: String },
    ArchFallback { from: String, to: String },
    Launching { program: String },
}

impl InfoEvent {
    /// Render a human-readable message for the CLI.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::ProfileResolved { profile } => {
                format!("Using LISP runtime for platform {}", profile)
            }
            InfoEvent::ArchFallback { from, to } => format!(
                "Native {} LISP not found, falling back to {} under binary translation",
                from, to
            ),
            InfoEvent::Launching { program } => format!("Launching {}", program),
        }
    }
}

/// How an engine process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// `code` is `None` when the process was terminated by a signal.
    Exited { code: Option<i32> },
    Canceled,
}

impl RunOutcome {
    pub fn exit_code(self) -> Option<i32> {
        match self {
            RunOutcome::Exited { code } => code,
            RunOutcome::Canceled => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp_utc: String,
    pub profile: Option<String>,
    pub outcome: RunOutcome,
    pub task_time_s: Option<TaskTime>,
    /// Set when the engine ran but no trace line yielded a task time.
    pub parse_error: Option<String>,
    pub stdout_lines: usize,
    pub stderr_lines: usize,
}
