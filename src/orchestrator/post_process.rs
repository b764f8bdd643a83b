//! Post-run processing utilities.
//!
//! Turns a finished engine run and its scanned trace into a report and
//! handles JSON export.

use crate::cli::Cli;
use crate::error::ParseError;
use crate::model::{RunOutcome, RunReport, TaskTime};
use anyhow::{Context, Result};
use std::path::Path;

/// What the event loop collected while the engine was running.
#[derive(Debug, Default)]
pub(crate) struct TraceTally {
    pub profile: Option<String>,
    pub stdout_lines: usize,
    pub stderr_lines: usize,
}

/// Result of post-run processing, ready for presentation layers.
pub(crate) struct ProcessedRun {
    pub report: RunReport,
    pub export_messages: Vec<String>,
}

/// Build the report for a completed run.
///
/// A parse failure is only recorded when the engine actually exited; a
/// canceled run is not expected to have reported a time.
pub(crate) fn build_report(
    outcome: RunOutcome,
    task_time: Result<TaskTime, ParseError>,
    tally: TraceTally,
) -> RunReport {
    let (task_time_s, parse_error) = match (outcome, task_time) {
        (_, Ok(t)) => (Some(t), None),
        (RunOutcome::Canceled, Err(_)) => (None, None),
        (RunOutcome::Exited { .. }, Err(e)) => {
            tracing::warn!("no task time in engine trace: {e}");
            (None, Some(e.to_string()))
        }
    };
    RunReport {
        timestamp_utc: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into()),
        profile: tally.profile,
        outcome,
        task_time_s,
        parse_error,
        stdout_lines: tally.stdout_lines,
        stderr_lines: tally.stderr_lines,
    }
}

/// Write `report` as pretty JSON to `path`.
pub(crate) fn export_json(path: &Path, report: &RunReport) -> Result<()> {
    let out = serde_json::to_string_pretty(report)?;
    std::fs::write(path, out).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Process a completed run: build the report and run exports.
pub(crate) fn process_run_completion(
    args: &Cli,
    outcome: RunOutcome,
    task_time: Result<TaskTime, ParseError>,
    tally: TraceTally,
) -> ProcessedRun {
    let report = build_report(outcome, task_time, tally);

    let mut export_messages = Vec::new();
    if let Some(export_path) = args.export_json.as_deref() {
        match export_json(export_path, &report) {
            Ok(_) => export_messages.push(format!("Exported JSON: {}", export_path.display())),
            Err(e) => export_messages.push(format!("Export JSON failed: {e:#}")),
        }
    }

    ProcessedRun {
        report,
        export_messages,
    }
}
