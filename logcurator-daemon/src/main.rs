use anyhow::Result;
use clap::Parser;

use logcurator_daemon::cli::DaemonCli;
use logcurator_daemon::logging;
use logcurator_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // defaults -> file -> env -> CLI flags
    let config = cli.load_config().await?;

    if cli.validate {
        println!("configuration is valid: {}", cli.config_path().display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        config = %cli.config_path().display(),
        version = env!("CARGO_PKG_VERSION"),
        "logcurator-daemon starting"
    );

    let orchestrator = Orchestrator::build_from_config(config)?;
    orchestrator.run().await
}
