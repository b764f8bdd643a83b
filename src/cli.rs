use crate::model::{EngineEvent, InfoEvent, RunConfig, RunOutcome, RunReport};
use crate::orchestrator::{self, TraceTally};
use crate::trace::TraceScanner;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Exit status when the run was canceled (128 + SIGINT).
pub const EXIT_CANCELED: i32 = 130;
/// Exit status when the engine ran but no task time could be read.
pub const EXIT_NO_TASK_TIME: i32 = 2;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "actr-runner",
    version,
    about = "Run an ACT-R model in the bundled CLISP engine and report the predicted task time"
)]
pub struct Cli {
    /// Directory containing the clisp-<platform> engine directories
    #[arg(long, env = "ACTR_ENGINE_ROOT", default_value = ".")]
    pub engine_root: PathBuf,

    /// Memory image file inside the engine directory
    #[arg(long, env = "ACTR_MEMORY_IMAGE", default_value = "actr6.mem")]
    pub memory_image: String,

    /// LISP form the engine evaluates after loading the files
    #[arg(short = 'x', long = "execute")]
    pub execute: String,

    /// Source files to load before executing, in order
    pub files: Vec<PathBuf>,

    /// Cancel the run if the engine has not finished after this long
    #[arg(long)]
    pub timeout: Option<humantime::Duration>,

    /// Print JSON report and exit (engine trace goes to stderr)
    #[arg(long)]
    pub json: bool,

    /// Print notices and the text summary only, without the engine trace
    #[arg(long, conflicts_with = "json")]
    pub text: bool,

    /// Run silently: suppress engine trace and notices (requires --json)
    #[arg(long)]
    pub silent: bool,

    /// Use --echo-trace true or --echo-trace false to override
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub echo_trace: bool,

    /// Export the run report as JSON
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Exit non-zero when no task time could be read from the trace
    #[arg(long)]
    pub require_time: bool,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is unset. Silent mode logs nothing.
    pub fn default_log_filter(&self) -> &'static str {
        if self.silent {
            "off"
        } else {
            "warn"
        }
    }
}

/// Run the CLI and return the process exit status.
pub async fn run(args: Cli) -> Result<i32> {
    // Validate that --silent can only be used with --json
    if args.silent && !args.json {
        return Err(anyhow::anyhow!(
            "--silent can only be used with --json. Use --silent --json together."
        ));
    }

    let cfg = build_config(&args)?;
    let report = run_engine(&args, cfg).await?;
    Ok(exit_status(&report, args.require_time))
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> Result<RunConfig> {
    let engine_root = std::path::absolute(&args.engine_root).with_context(|| {
        format!(
            "failed to resolve engine root {}",
            args.engine_root.display()
        )
    })?;
    Ok(RunConfig {
        engine_root,
        memory_image: args.memory_image.clone(),
        files_to_load: args.files.clone(),
        initial_command: args.execute.clone(),
        timeout: args.timeout.map(Duration::from),
    })
}

/// Map a finished run to the process exit status.
pub fn exit_status(report: &RunReport, require_time: bool) -> i32 {
    match report.outcome {
        RunOutcome::Canceled => EXIT_CANCELED,
        RunOutcome::Exited { code: Some(0) } => {
            if require_time && report.task_time_s.is_none() {
                EXIT_NO_TASK_TIME
            } else {
                0
            }
        }
        RunOutcome::Exited { code: Some(code) } => code,
        RunOutcome::Exited { code: None } => 1,
    }
}

/// Run the engine, stream its trace, and print the report in the selected mode.
async fn run_engine(args: &Cli, cfg: RunConfig) -> Result<RunReport> {
    let (out_tx, out_handle) = if args.silent {
        (None, None)
    } else {
        let (tx, handle) = spawn_output_writer();
        (Some(tx), Some(handle))
    };

    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<EngineEvent>();
    let handle = tokio::spawn(orchestrator::run_controller(cfg, evt_tx));

    let echo = args.echo_trace && !args.text;

    // Scan the trace while it streams in.
    let mut scanner = TraceScanner::new();
    let mut tally = TraceTally::default();
    while let Some(ev) = evt_rx.recv().await {
        match ev {
            EngineEvent::Stdout(line) => {
                scanner.feed(&line);
                tally.stdout_lines += 1;
                if let (Some(tx), true) = (out_tx.as_ref(), echo) {
                    // Keep stdout clean for the JSON report.
                    let _ = tx.send(if args.json {
                        OutputLine::Stderr(line)
                    } else {
                        OutputLine::Stdout(line)
                    });
                }
            }
            EngineEvent::Stderr(line) => {
                tally.stderr_lines += 1;
                if let (Some(tx), true) = (out_tx.as_ref(), echo) {
                    let _ = tx.send(OutputLine::Stderr(line));
                }
            }
            EngineEvent::Info(info) => {
                if let InfoEvent::ProfileResolved { profile } = &info {
                    tally.profile = Some(profile.clone());
                }
                if let Some(tx) = out_tx.as_ref() {
                    let _ = tx.send(OutputLine::Stderr(info.to_message()));
                }
            }
        }
    }

    let outcome = match handle.await.context("run controller task failed")? {
        Ok(outcome) => outcome,
        Err(e) => {
            // Flush notices emitted before the failure.
            drop(out_tx);
            if let Some(handle) = out_handle {
                let _ = handle.await;
            }
            return Err(e);
        }
    };

    let processed = orchestrator::process_run_completion(args, outcome, scanner.finish(), tally);

    if let Some(tx) = out_tx.as_ref() {
        for msg in &processed.export_messages {
            let _ = tx.send(OutputLine::Stderr(msg.clone()));
        }
        if args.json {
            let out = serde_json::to_string_pretty(&processed.report)?;
            let _ = tx.send(OutputLine::Stdout(out));
        } else {
            let summary = crate::text_summary::build_text_summary(&processed.report);
            for line in summary.lines {
                let _ = tx.send(OutputLine::Stdout(line));
            }
        }
    } else if args.json {
        // Silent mode still prints the JSON report.
        println!("{}", serde_json::to_string_pretty(&processed.report)?);
    }

    drop(out_tx);
    if let Some(handle) = out_handle {
        let _ = handle.await;
    }

    Ok(processed.report)
}
