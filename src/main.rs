use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use purser::{FleetConfig, LogSink, WalletFleet};

/// Multi-chain wallet fleet engine.
#[derive(Parser)]
#[command(name = "purser", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match FleetConfig::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load config: {err}");
            std::process::exit(1);
        }
    };

    config.logging.init();
    info!("purser starting");

    // Drivers and price oracles are external capabilities; a bare binary
    // run manages configuration and lifecycle only. Embedders register
    // drivers through the builder.
    let fleet = match WalletFleet::builder(config).sink(Box::new(LogSink)).build() {
        Ok(fleet) => fleet,
        Err(err) => {
            error!(error = %err, "Fleet construction failed");
            std::process::exit(1);
        }
    };

    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => error!(error = %err, "Failed to listen for shutdown signal"),
    }

    fleet.stop().await;
    info!("purser stopped");
}
