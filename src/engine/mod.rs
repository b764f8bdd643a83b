pub mod command;
pub mod platform;
pub mod process;

use crate::error::EngineError;
use crate::model::{EngineEvent, Environment, InfoEvent, PlatformProfile, RunConfig, RunOutcome};
use process::{ProcessRunner, TokioProcessRunner};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum EngineControl {
    /// Kill the engine process and end the run as canceled
    Cancel,
}

/// Launches one engine run for a [`RunConfig`].
pub struct EngineLauncher {
    cfg: RunConfig,
    env: Environment,
    runner: Arc<dyn ProcessRunner>,
}

impl EngineLauncher {
    pub fn new(cfg: RunConfig) -> Self {
        Self::with_parts(cfg, Environment::detect(), Arc::new(TokioProcessRunner))
    }

    pub fn with_parts(cfg: RunConfig, env: Environment, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { cfg, env, runner }
    }

    /// Resolve the engine build for this host and check its artifacts.
    ///
    /// Returns the profile and the full argument vector.
    pub fn prepare(
        &self,
        event_tx: &mpsc::UnboundedSender<EngineEvent>,
    ) -> Result<(PlatformProfile, Vec<String>), EngineError> {
        let exists = |p: &Path| p.exists();
        let profile = platform::resolve_profile(&self.env, &self.cfg.engine_root, exists)?;
        if profile.fell_back {
            tracing::warn!(
                engine_dir = %profile.engine_dir.display(),
                "Apple silicon native LISP not found, falling back to Intel build"
            );
            let _ = event_tx.send(EngineEvent::Info(InfoEvent::ArchFallback {
                from: "mac-arm64".into(),
                to: profile.name.into(),
            }));
        }
        tracing::info!(
            profile = profile.name,
            arch = profile.arch.as_str(),
            "engine profile resolved"
        );
        let _ = event_tx.send(EngineEvent::Info(InfoEvent::ProfileResolved {
            profile: profile.name.into(),
        }));

        let paths = platform::locate_artifacts(&profile, &self.cfg.memory_image, exists)?;
        let argv = command::build_command(
            &paths,
            &self.cfg.files_to_load,
            &self.cfg.initial_command,
            profile.is_windows(),
        )?;
        tracing::debug!(?argv, "engine command line");
        Ok((profile, argv))
    }

    /// Run the engine to completion.
    ///
    /// Output lines are pushed to `event_tx` as they arrive. Sending
    /// [`EngineControl::Cancel`] on the control channel kills the engine and
    /// yields [`RunOutcome::Canceled`].
    pub async fn run(
        self,
        event_tx: mpsc::UnboundedSender<EngineEvent>,
        mut control_rx: mpsc::UnboundedReceiver<EngineControl>,
    ) -> Result<RunOutcome, EngineError> {
        let (_profile, argv) = self.prepare(&event_tx)?;

        let _ = event_tx.send(EngineEvent::Info(InfoEvent::Launching {
            program: argv[0].clone(),
        }));
        let outcome = self.runner.run(&argv, &event_tx, &mut control_rx).await?;
        tracing::info!(?outcome, "engine run finished");
        Ok(outcome)
    }
}
