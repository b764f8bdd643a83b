//! Text summary builder for CLI output.
//!
//! This module formats human-readable lines for text mode.

use crate::model::{RunOutcome, RunReport};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary from a finished run's report.
pub(crate) fn build_text_summary(report: &RunReport) -> TextSummary {
    let mut lines = Vec::new();

    if let Some(profile) = report.profile.as_deref() {
        lines.push(format!("Platform: {profile}"));
    }

    lines.push(match report.outcome {
        RunOutcome::Exited { code: Some(code) } => format!("Engine exit code: {code}"),
        RunOutcome::Exited { code: None } => "Engine terminated by signal".to_string(),
        RunOutcome::Canceled => "Run canceled".to_string(),
    });

    match (report.task_time_s, report.parse_error.as_deref()) {
        (Some(t), _) => lines.push(format!("Predicted task time: {t}")),
        (None, Some(err)) => lines.push(format!("Task time unavailable: {err}")),
        (None, None) => {}
    }

    lines.push(format!(
        "Trace: {} stdout lines, {} stderr lines",
        report.stdout_lines, report.stderr_lines
    ));

    TextSummary { lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskTime;

    fn report(outcome: RunOutcome, t: Option<f64>, err: Option<&str>) -> RunReport {
        RunReport {
            timestamp_utc: "2026-10-19T00:00:00Z".into(),
            profile: Some("mac-intel".into()),
            outcome,
            task_time_s: t.and_then(TaskTime::new),
            parse_error: err.map(str::to_string),
            stdout_lines: 12,
            stderr_lines: 1,
        }
    }

    #[test]
    fn successful_run() {
        let s = build_text_summary(&report(RunOutcome::Exited { code: Some(0) }, Some(1.3), None));
        assert_eq!(
            s.lines,
            [
                "Platform: mac-intel",
                "Engine exit code: 0",
                "Predicted task time: 1.300 s",
                "Trace: 12 stdout lines, 1 stderr lines",
            ]
        );
    }

    #[test]
    fn unparsed_trace_is_called_out() {
        let s = build_text_summary(&report(
            RunOutcome::Exited { code: Some(0) },
            None,
            Some("could not parse task time from line: \"READY\""),
        ));
        assert!(s.lines[2].starts_with("Task time unavailable: could not parse"));
    }

    #[test]
    fn canceled_run() {
        let s = build_text_summary(&report(RunOutcome::Canceled, None, None));
        assert_eq!(s.lines[1], "Run canceled");
        assert_eq!(s.lines.len(), 3);
    }
}
