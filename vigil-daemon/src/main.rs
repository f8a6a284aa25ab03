use anyhow::{Context, Result};
use clap::Parser;

use vigil_core::config::VigilConfig;
use vigil_core::metrics::describe_all;

use vigil_daemon::app::{App, apply_cli_overrides, load_parsers};
use vigil_daemon::cli::DaemonCli;
use vigil_daemon::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = VigilConfig::load(&cli.config)
        .await
        .context("failed to load configuration")?;
    apply_cli_overrides(&mut config, &cli);
    config.validate().context("configuration invalid")?;

    init_tracing(&config.general)?;
    describe_all();

    tracing::info!(config = %cli.config.display(), "vigil-daemon starting");

    let parsers = load_parsers(&mut config).await?;

    if cli.validate {
        println!(
            "configuration OK: {} ({} parsers)",
            cli.config.display(),
            parsers.len()
        );
        return Ok(());
    }

    let app = App::assemble(&config, parsers)?;
    app.run().await
}
