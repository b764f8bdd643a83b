//! Application-level orchestration utilities.
//!
//! This module owns run lifecycle control (launch, cancel on Ctrl-C or timeout)
//! and post-run processing such as report building and exports. The CLI calls
//! into this module to keep responsibilities separated.

mod controller;
mod post_process;

pub(crate) use controller::run_controller;
pub(crate) use post_process::{process_run_completion, TraceTally};
