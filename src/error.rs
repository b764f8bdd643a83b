//! Error taxonomy for engine runs.
//!
//! Configuration problems, launch failures and trace parse failures are kept
//! as separate types so callers can tell "the engine is not installed" apart
//! from "the engine ran but we could not read its answer".

use std::path::PathBuf;
use thiserror::Error;

/// Engine artifacts could not be resolved for this machine. Never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported macOS CPU architecture: {arch}")]
    UnsupportedArch { arch: String },

    #[error("LISP runtime not found for platform {profile}: {}", .path.display())]
    EngineDirMissing { profile: String, path: PathBuf },

    #[error("LISP executable not found: {}", .path.display())]
    ExecutableMissing { path: PathBuf },

    #[error("LISP memory image not found: {}", .path.display())]
    MemoryImageMissing { path: PathBuf },

    #[error("path is not valid UTF-8: {}", .path.display())]
    NonUtf8Path { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to launch {program}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine process I/O failed")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True for the "engine not found" class of failures.
    pub fn is_config(&self) -> bool {
        matches!(self, EngineError::Config(_))
    }
}

/// A trace line did not match any known task-time layout.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("empty trace line")]
    Empty,

    #[error("task time {value} is not a non-negative finite number in line: {line:?}")]
    InvalidValue { line: String, value: f64 },

    #[error("could not parse task time from line: {line:?}")]
    Unrecognized { line: String },
}
