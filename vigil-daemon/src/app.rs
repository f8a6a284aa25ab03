//! Daemon assembly -- configuration overrides, component wiring, and
//! lifecycle management.
//!
//! Startup order (producers before consumers is irrelevant here since the
//! dispatcher only reads a channel, but the monitor is started last so the
//! dispatcher is always ready to receive):
//!
//! 1. Parser definitions are loaded and compiled
//! 2. Diagnosis handler + dispatcher task
//! 3. Monitor (file collector + bundling loop)
//!
//! Shutdown drains in the same direction: stopping the monitor drops the
//! incident sender, which lets the dispatcher finish its queue and exit.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use vigil_core::config::VigilConfig;
use vigil_core::pipeline::Pipeline;
use vigil_triage::diagnose::{DiagnosisHandler, LoggingHandler, OpenAiDiagnoser};
use vigil_triage::{Monitor, MonitorBuilder, Parser, ParserSpecFile, spawn_dispatcher};

use crate::cli::DaemonCli;

/// Incident channel capacity between the monitor and the dispatcher.
const INCIDENT_CHANNEL_CAPACITY: usize = 64;

/// Apply command-line overrides on top of the loaded configuration.
///
/// CLI flags take precedence over both the config file and environment
/// variable overrides.
pub fn apply_cli_overrides(config: &mut VigilConfig, cli: &DaemonCli) {
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    if let Some(log_file) = &cli.log_file {
        config.monitor.log_file = log_file.clone();
    }
    if let Some(parsers) = &cli.parsers {
        config.monitor.parser_file = parsers.clone();
    }
    if cli.no_follow {
        config.monitor.follow = false;
    }
}

/// Load the parser definition file and fold its optional prompt overrides
/// into the diagnosis configuration.
///
/// # Errors
///
/// Returns an error if the definition file cannot be read, parsed, or if
/// any regex fails to compile. Prompt overrides are re-validated because
/// they change the token budget.
pub async fn load_parsers(config: &mut VigilConfig) -> Result<Vec<Parser>> {
    let spec_file = ParserSpecFile::load(&config.monitor.parser_file)
        .await
        .context("failed to load parser definitions")?;

    if let Some(system_prompt) = spec_file.system_prompt.clone() {
        config.diagnosis.system_prompt = system_prompt;
    }
    if let Some(prompt) = spec_file.prompt.clone() {
        config.diagnosis.prompt = prompt;
    }
    config
        .validate()
        .context("configuration invalid after prompt overrides")?;

    let parsers =
        Parser::from_specs(&spec_file.parsers).context("failed to compile parser chain")?;
    tracing::info!(
        parsers = parsers.len(),
        file = %config.monitor.parser_file,
        "parser chain compiled"
    );
    Ok(parsers)
}

/// Assembled daemon components, ready to run.
pub struct App {
    monitor: Monitor,
    dispatcher: JoinHandle<()>,
}

impl App {
    /// Wire up the monitor and the diagnosis dispatcher.
    pub fn assemble(config: &VigilConfig, parsers: Vec<Parser>) -> Result<Self> {
        // Diagnosis handler: real backend when enabled, log-only otherwise
        let handler: Arc<dyn DiagnosisHandler> = if config.diagnosis.enabled {
            let diagnoser = OpenAiDiagnoser::new(config.diagnosis.clone())
                .context("failed to initialize diagnosis backend")?;
            tracing::info!(
                model = %config.diagnosis.model,
                output_dir = %config.diagnosis.output_dir,
                "diagnosis backend enabled"
            );
            Arc::new(diagnoser)
        } else {
            tracing::info!("diagnosis disabled, incidents will only be logged");
            Arc::new(LoggingHandler)
        };

        let (monitor, incident_rx) = MonitorBuilder::new()
            .config(config.monitor.clone())
            .token_budget(config.diagnosis.token_budget())
            .parsers(parsers)
            .incident_channel_capacity(INCIDENT_CHANNEL_CAPACITY)
            .build()
            .context("failed to build monitor")?;
        let incident_rx = incident_rx
            .ok_or_else(|| anyhow::anyhow!("monitor builder did not return incident channel"))?;

        let dispatcher = spawn_dispatcher(handler, incident_rx);

        Ok(Self {
            monitor,
            dispatcher,
        })
    }

    /// Run until shutdown.
    ///
    /// In follow mode this blocks until Ctrl-C. In drain mode (follow =
    /// false) it also returns once the log file has been fully processed
    /// and every incident dispatched.
    ///
    /// # Errors
    ///
    /// Returns an error if the monitor fails to start, or if the monitor
    /// loop aborted on a fatal classification error (a parser chain
    /// without a catch-all), so the process exits nonzero instead of
    /// reporting a clean drain.
    pub async fn run(mut self) -> Result<()> {
        self.monitor
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start monitor: {}", e))?;
        tracing::info!("vigil-daemon running");

        let mut dispatcher_done = false;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
            }
            result = &mut self.dispatcher => {
                // Source drained: monitor loop ended, incident channel
                // closed, dispatcher finished its queue
                dispatcher_done = true;
                if let Err(e) = result {
                    tracing::error!(error = %e, "dispatcher task panicked");
                }
                tracing::info!("log source drained");
            }
        }

        // stop() returns the loop's fatal error, if any
        let stop_result = self.monitor.stop().await;
        if !dispatcher_done {
            if let Err(e) = self.dispatcher.await {
                tracing::error!(error = %e, "dispatcher task panicked");
            }
        }
        stop_result.map_err(|e| anyhow::anyhow!("monitor terminated with error: {}", e))?;

        tracing::info!("vigil-daemon shut down");
        Ok(())
    }
}
