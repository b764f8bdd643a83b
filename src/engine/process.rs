//! Child process execution with streamed output.

use super::EngineControl;
use crate::error::EngineError;
use crate::model::{EngineEvent, RunOutcome};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Runs one command to completion, pushing output lines as they arrive.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// `argv[0]` is the program. Returns [`RunOutcome::Canceled`] when an
    /// [`EngineControl::Cancel`] arrives before the child exits.
    async fn run(
        &self,
        argv: &[String],
        event_tx: &mpsc::UnboundedSender<EngineEvent>,
        control_rx: &mut mpsc::UnboundedReceiver<EngineControl>,
    ) -> Result<RunOutcome, EngineError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        argv: &[String],
        event_tx: &mpsc::UnboundedSender<EngineEvent>,
        control_rx: &mut mpsc::UnboundedReceiver<EngineControl>,
    ) -> Result<RunOutcome, EngineError> {
        let (program, args) = argv.split_first().ok_or_else(|| EngineError::Launch {
            program: String::new(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
        })?;

        let mut cmd = Command::new(program.trim_matches('"'));
        add_args(&mut cmd, args);
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Launch {
                program: program.clone(),
                source,
            })?;
        tracing::debug!(pid = ?child.id(), program = %program, "engine process spawned");

        let stdout = child.stdout.take().map(|out| {
            tokio::spawn(forward_lines(out, event_tx.clone(), EngineEvent::Stdout))
        });
        let stderr = child.stderr.take().map(|err| {
            tokio::spawn(forward_lines(err, event_tx.clone(), EngineEvent::Stderr))
        });

        let mut control_open = true;
        let outcome = loop {
            tokio::select! {
                status = child.wait() => {
                    let status = status?;
                    tracing::debug!(code = ?status.code(), "engine process exited");
                    break RunOutcome::Exited { code: status.code() };
                }
                msg = control_rx.recv(), if control_open => match msg {
                    Some(EngineControl::Cancel) => {
                        tracing::info!("cancel requested, killing engine process");
                        // The child may have exited on its own in the meantime.
                        let _ = child.start_kill();
                        child.wait().await?;
                        break RunOutcome::Canceled;
                    }
                    // Nobody can cancel any more; just wait for exit.
                    None => control_open = false,
                },
            }
        };

        let mut readers: Vec<_> = [stdout, stderr].into_iter().flatten().collect();
        let outcome = if outcome == RunOutcome::Canceled {
            outcome
        } else {
            // Deliver whatever the child wrote before exiting. A grandchild may
            // keep the pipes open, so a cancel still ends the wait.
            let drained = async {
                for reader in readers.iter_mut() {
                    let _ = reader.await;
                }
            };
            tokio::select! {
                () = drained => outcome,
                Some(EngineControl::Cancel) = control_rx.recv(), if control_open => {
                    tracing::info!("cancel requested while draining engine output");
                    RunOutcome::Canceled
                }
            }
        };
        if outcome == RunOutcome::Canceled {
            readers.iter().for_each(|reader| reader.abort());
        }

        Ok(outcome)
    }
}

// Arguments arrive already quoted for Windows; pass them through untouched.
#[cfg(windows)]
fn add_args(cmd: &mut Command, args: &[String]) {
    for arg in args {
        cmd.raw_arg(arg);
    }
}

#[cfg(not(windows))]
fn add_args(cmd: &mut Command, args: &[String]) {
    cmd.args(args);
}

/// Forward each `\n`-terminated line from `reader` as an event.
///
/// Bytes are decoded as ISO-8859-1, the encoding the engine is started with.
async fn forward_lines<R>(
    reader: R,
    event_tx: mpsc::UnboundedSender<EngineEvent>,
    wrap: fn(String) -> EngineEvent,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                }
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
                let line: String = buf.iter().map(|&b| b as char).collect();
                // Receiver gone: keep draining so the child never blocks on a full pipe.
                let _ = event_tx.send(wrap(line));
            }
            Err(e) => {
                tracing::warn!("reading engine output failed: {e}");
                break;
            }
        }
    }
}
