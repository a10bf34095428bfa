use anyhow::Context;
use clap::Parser;
use smile_bridge::utils::{logger, validation::Validate};
use smile_bridge::{BridgeConfig, CliConfig, JsonFileRepository, NatsBroker, SmileService};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let format = if cli.json_logs {
        logger::LogFormat::Json
    } else {
        logger::LogFormat::Compact
    };
    logger::init_logger(format, cli.verbose);

    tracing::info!("Starting smile-bridge");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = BridgeConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config))?;
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    let broker = Arc::new(NatsBroker::connect(&config.broker).await?);
    let repository = Arc::new(JsonFileRepository::new(cli.output_path.clone()));
    let service = SmileService::new(config, broker, repository)?;

    let ct = CancellationToken::new();
    {
        let ct = ct.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                    ct.cancel();
                }
                Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
            }
        });
    }

    if let Err(e) = service.run(ct).await {
        tracing::error!("❌ SMILE consumer failed to start: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    tracing::info!("✅ smile-bridge stopped cleanly");
    Ok(())
}
