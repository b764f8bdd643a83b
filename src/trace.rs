//! Task-time extraction from the engine's trace output.
//!
//! The engine reports the predicted task time on its last trace line, and the
//! layout of that line has changed between engine builds:
//!
//! ```text
//! 1.300
//!       1.300   ------                 Stopped because no events left to process
//! ```
//!
//! [`parse_task_time`] tries each known layout in order ([`STRATEGIES`]) and
//! fails loudly on anything else rather than guessing a number. When the
//! engine changes its output again, add a [`Strategy`] variant.

use crate::error::ParseError;
use crate::model::TaskTime;

/// Status text the engine prints when the model ran to completion.
pub const COMPLETION_MARKER: &str = "Stopped because no events left to process";

/// Placeholder column printed between the time and the status text.
pub const PLACEHOLDER_COLUMN: &str = "------";

/// Known task-time line layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Older engines print the time alone on the line.
    BareNumber,
    /// Newer engines print `time  ------  status text`.
    PaddedColumns,
}

/// Layouts in the order they are tried.
pub const STRATEGIES: [Strategy; 2] = [Strategy::BareNumber, Strategy::PaddedColumns];

enum Attempt {
    Match(TaskTime),
    NoMatch,
    Fail(ParseError),
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::BareNumber => "bare-number",
            Strategy::PaddedColumns => "padded-columns",
        }
    }

    /// `trimmed` is `line` without surrounding whitespace and never empty.
    fn attempt(self, line: &str, trimmed: &str) -> Attempt {
        match self {
            Strategy::BareNumber => match trimmed.parse::<f64>() {
                Ok(value) => match TaskTime::new(value) {
                    Some(t) => Attempt::Match(t),
                    None => Attempt::Fail(ParseError::InvalidValue {
                        line: line.to_string(),
                        value,
                    }),
                },
                Err(_) => Attempt::NoMatch,
            },
            Strategy::PaddedColumns => {
                // TODO: confirm whether a bare `------` without the marker should still qualify.
                if !trimmed.contains(COMPLETION_MARKER) && !trimmed.contains(PLACEHOLDER_COLUMN) {
                    return Attempt::NoMatch;
                }
                trimmed
                    .split_whitespace()
                    .filter_map(|tok| tok.parse::<f64>().ok())
                    .find_map(TaskTime::new)
                    .map_or(Attempt::NoMatch, Attempt::Match)
            }
        }
    }
}

/// Parse the task time from a single trace line.
pub fn parse_task_time(line: &str) -> Result<TaskTime, ParseError> {
    parse_with_strategy(line).map(|(_, t)| t)
}

/// Like [`parse_task_time`], also reporting which layout matched.
pub fn parse_with_strategy(line: &str) -> Result<(Strategy, TaskTime), ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    for strategy in STRATEGIES {
        match strategy.attempt(line, trimmed) {
            Attempt::Match(t) => {
                tracing::trace!(strategy = strategy.name(), seconds = t.seconds(), "task time parsed");
                return Ok((strategy, t));
            }
            Attempt::Fail(e) => return Err(e),
            Attempt::NoMatch => {}
        }
    }
    Err(ParseError::Unrecognized {
        line: line.to_string(),
    })
}

/// Like [`parse_task_time`], treating a missing line as empty.
pub fn parse_task_time_opt(line: Option<&str>) -> Result<TaskTime, ParseError> {
    line.map_or(Err(ParseError::Empty), parse_task_time)
}

/// Find the task time in a full captured trace.
///
/// The last padded-column report line wins. The engine echoes the return
/// values of the executed form after the trace, so a bare number is only used
/// when no report line exists, and then the last one is taken. If nothing
/// parses, the error for the last non-blank line is returned.
pub fn find_task_time<I, S>(lines: I) -> Result<TaskTime, ParseError>
where
    I: IntoIterator<Item = S>,
    I::IntoIter: DoubleEndedIterator,
    S: AsRef<str>,
{
    let mut bare = None;
    let mut last_err = None;
    for line in lines.into_iter().rev() {
        match parse_with_strategy(line.as_ref()) {
            Ok((Strategy::PaddedColumns, t)) => return Ok(t),
            Ok((Strategy::BareNumber, t)) => {
                bare.get_or_insert(t);
            }
            Err(ParseError::Empty) => {}
            Err(e) => {
                last_err.get_or_insert(e);
            }
        }
    }
    bare.ok_or_else(|| last_err.unwrap_or(ParseError::Empty))
}

/// Incremental form of [`find_task_time`] for lines arriving one at a time.
#[derive(Debug, Default)]
pub struct TraceScanner {
    report: Option<TaskTime>,
    bare: Option<TaskTime>,
    // Failure for the last non-blank line.
    last_err: Option<ParseError>,
}

impl TraceScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, line: &str) {
        match parse_with_strategy(line) {
            Ok((Strategy::PaddedColumns, t)) => self.report = Some(t),
            Ok((Strategy::BareNumber, t)) => self.bare = Some(t),
            Err(ParseError::Empty) => {}
            Err(e) => self.last_err = Some(e),
        }
    }

    /// Best task time seen so far, ranked as in [`find_task_time`].
    pub fn latest(&self) -> Option<TaskTime> {
        self.report.or(self.bare)
    }

    pub fn finish(self) -> Result<TaskTime, ParseError> {
        match self.latest() {
            Some(t) => Ok(t),
            None => Err(self.last_err.unwrap_or(ParseError::Empty)),
        }
    }
}
