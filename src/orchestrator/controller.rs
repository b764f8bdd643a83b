//! Run lifecycle controller.
//!
//! Owns the engine task, turns Ctrl-C and timeouts into cancellation, and
//! emits status events for presentation layers.

use crate::engine::{EngineControl, EngineLauncher};
use crate::model::{EngineEvent, InfoEvent, RunConfig, RunOutcome};
use anyhow::{Context, Result};
use std::future::Future;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Duration, Instant};

/// Why a run was asked to stop early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CancelReason {
    Interrupted,
    TimedOut(Duration),
}

impl CancelReason {
    fn message(self) -> String {
        match self {
            CancelReason::Interrupted => "Interrupted, cancelling…".into(),
            CancelReason::TimedOut(d) => {
                format!("Timed out after {}, cancelling…", humantime::format_duration(d))
            }
        }
    }
}

/// Run one engine invocation to completion, cancelling it on Ctrl-C or when
/// `cfg.timeout` elapses.
pub(crate) async fn run_controller(
    cfg: RunConfig,
    event_tx: UnboundedSender<EngineEvent>,
) -> Result<RunOutcome> {
    let launcher = EngineLauncher::new(cfg.clone());
    drive(launcher, cfg.timeout, event_tx, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl-C: {e}");
            futures::future::pending::<()>().await;
        }
    })
    .await
}

/// Drive `launcher`, cancelling when `interrupt` resolves or `timeout` elapses.
pub(crate) async fn drive<F>(
    launcher: EngineLauncher,
    timeout: Option<Duration>,
    event_tx: UnboundedSender<EngineEvent>,
    interrupt: F,
) -> Result<RunOutcome>
where
    F: Future<Output = ()>,
{
    let (ctrl_tx, ctrl_rx) = tokio::sync::mpsc::unbounded_channel::<EngineControl>();
    let mut handle = tokio::spawn(launcher.run(event_tx.clone(), ctrl_rx));

    let deadline = timeout.map(|t| Instant::now() + t);
    let mut cancel_reason: Option<CancelReason> = None;
    // Cancel watchdog: if a cancel takes too long, emit a status message to keep the user informed.
    let mut cancel_deadline: Option<Instant> = None;
    let mut watchdog = tokio::time::interval(Duration::from_millis(500));
    tokio::pin!(interrupt);

    let join_res = loop {
        tokio::select! {
            join_res = &mut handle => break join_res,
            _ = &mut interrupt, if cancel_reason.is_none() => {
                cancel_reason = Some(CancelReason::Interrupted);
            }
            _ = async {
                match deadline {
                    Some(d) => tokio::time::sleep_until(d).await,
                    None => futures::future::pending().await,
                }
            }, if cancel_reason.is_none() => {
                cancel_reason = timeout.map(CancelReason::TimedOut);
            }
            _ = watchdog.tick() => {
                if let Some(deadline) = cancel_deadline {
                    if Instant::now() >= deadline {
                        let _ = event_tx.send(EngineEvent::Info(InfoEvent::Message(
                            "Still cancelling…".into(),
                        )));
                        cancel_deadline = None;
                    }
                }
                continue;
            }
        }

        if let Some(reason) = cancel_reason {
            if cancel_deadline.is_none() {
                tracing::info!(?reason, "cancelling engine run");
                let _ = ctrl_tx.send(EngineControl::Cancel);
                let _ = event_tx.send(EngineEvent::Info(InfoEvent::Message(reason.message())));
                cancel_deadline = Some(Instant::now() + Duration::from_secs(3));
            }
        }
    };

    let outcome = join_res
        .context("engine task failed")?
        .context("engine run failed")?;
    Ok(outcome)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::engine::process::TokioProcessRunner;
    use crate::error::EngineError;
    use crate::model::{CpuArch, Environment, OsFamily};
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Arc;

    /// Lay out a fake `clisp-linux` whose `lisp.run` is a shell script.
    fn fake_engine(script: &str) -> (tempfile::TempDir, RunConfig) {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("clisp-linux");
        std::fs::create_dir_all(&dir).unwrap();
        let exe = dir.join("lisp.run");
        std::fs::write(&exe, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::write(dir.join("actr6.mem"), b"").unwrap();
        let cfg = RunConfig {
            engine_root: root.path().to_path_buf(),
            memory_image: "actr6.mem".into(),
            files_to_load: vec![],
            initial_command: "(run)".into(),
            timeout: None,
        };
        (root, cfg)
    }

    fn launcher(cfg: RunConfig) -> EngineLauncher {
        let env = Environment {
            os: OsFamily::Linux,
            arch: CpuArch::Intel,
        };
        EngineLauncher::with_parts(cfg, env, Arc::new(TokioProcessRunner))
    }

    #[tokio::test]
    async fn engine_exit_code_is_returned() {
        let (_root, cfg) = fake_engine("echo \"     1.300   ------\"; exit 0");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let outcome = drive(launcher(cfg), None, tx, futures::future::pending())
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Exited { code: Some(0) });

        let mut lines = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if let EngineEvent::Stdout(l) = ev {
                lines.push(l);
            }
        }
        assert_eq!(lines, ["     1.300   ------"]);
    }

    #[tokio::test]
    async fn engine_receives_fixed_arguments() {
        let (_root, cfg) = fake_engine("for a in \"$@\"; do echo \"$a\"; done");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        drive(launcher(cfg), None, tx, futures::future::pending())
            .await
            .unwrap();
        let mut args = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if let EngineEvent::Stdout(l) = ev {
                args.push(l);
            }
        }
        assert_eq!(args[..3], ["-q", "-E", "ISO-8859-1"]);
        assert_eq!(args[3], "-M");
        assert!(args[4].ends_with("actr6.mem"));
        assert_eq!(args[5..], ["-x", "(run)"]);
    }

    #[tokio::test]
    async fn timeout_cancels_run() {
        let (_root, mut cfg) = fake_engine("exec sleep 30");
        cfg.timeout = Some(Duration::from_millis(100));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let started = std::time::Instant::now();
        let outcome = drive(launcher(cfg.clone()), cfg.timeout, tx, futures::future::pending())
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Canceled);
        assert!(started.elapsed() < std::time::Duration::from_secs(10));

        let mut messages = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if let EngineEvent::Info(info) = ev {
                messages.push(info.to_message());
            }
        }
        assert!(messages.iter().any(|m| m.starts_with("Timed out after 100ms")));
    }

    #[tokio::test]
    async fn interrupt_cancels_run() {
        let (_root, cfg) = fake_engine("exec sleep 30");
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let interrupt = tokio::time::sleep(Duration::from_millis(100));
        let outcome = drive(launcher(cfg), None, tx, interrupt).await.unwrap();
        assert_eq!(outcome, RunOutcome::Canceled);
    }

    #[tokio::test]
    async fn missing_engine_surfaces_config_error() {
        let root = tempfile::tempdir().unwrap();
        let cfg = RunConfig {
            engine_root: root.path().to_path_buf(),
            memory_image: "actr6.mem".into(),
            files_to_load: vec![],
            initial_command: "(run)".into(),
            timeout: None,
        };
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let err = drive(launcher(cfg), None, tx, futures::future::pending())
            .await
            .unwrap_err();
        let engine_err = err.downcast_ref::<EngineError>().unwrap();
        assert!(engine_err.is_config());
    }
}
