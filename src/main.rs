//! Configuration server binary.
//!
//! Boot order: logging, configuration, subsystems, startup validation,
//! metrics exporter, listener. Traffic is accepted only after every
//! endpoint validated.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use scs_server::http::{AppState, HttpServer};
use scs_server::lifecycle::validate_startup;
use scs_server::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "scs-server", about = "Simple configuration server")]
struct Args {
    /// Path of the server configuration file.
    #[arg(long, env = "SCS_CONFIG_FILE", default_value = "scs-configuration.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = scs_server::config::load_config(&args.config)?;
    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        config_file = %args.config.display(),
        bind_address = %config.listener.bind_address,
        "Configuration loaded"
    );

    let state = AppState::from_config(&config)?;
    validate_startup(&config, &state)?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(&config, state);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
