//! Launch a CLISP engine running an ACT-R model and read the predicted task
//! time from its trace.
//!
//! [`engine::EngineLauncher`] picks the engine build for the host, builds the
//! command line and runs it, streaming output as [`model::EngineEvent`]s.
//! [`trace::parse_task_time`] reads the task time from a trace line.

pub mod cli;
pub mod engine;
pub mod error;
pub mod model;
mod orchestrator;
mod text_summary;
pub mod trace;
