//! Palisade Gateway - Entry point

use std::path::PathBuf;

use anyhow::Context;
use tracing::{error, info};

use palisade_gateway::{GatewayConfig, GatewayServer};
use palisade_telemetry::{init_telemetry, TelemetryConfig};

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => match args.next() {
                    Some(path) => config = Some(PathBuf::from(path)),
                    None => {
                        eprintln!("--config requires a path");
                        std::process::exit(1);
                    }
                },
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("palisade-gateway {}", palisade_gateway::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config }
    }
}

fn print_help() {
    println!(
        r"Palisade Gateway - authenticating, authorizing reverse proxy

USAGE:
    palisade-gateway [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    PALISADE_LISTEN_PORT          Gateway listen port (default: 8080)
    PALISADE_UPSTREAM_TIMEOUT     Backend timeout in seconds (default: 30)
    PALISADE_PUBLIC_KEY_PATH      RSA public key of the identity provider
    PALISADE_POLICY_PATH          Policy document (default: built-in policy)
    PALISADE_METRICS_PORT         Prometheus metrics port (default: 9090)
    PALISADE_LOG_LEVEL            Log filter (default: info)
    PALISADE_ROUTE_<NAME>_URL     Backend URL of the named route

EXAMPLES:
    # Run with configuration file
    palisade-gateway --config /etc/palisade/gateway.toml

    # Run with defaults, pointing the users route at a local service
    PALISADE_ROUTE_USERS_URL=http://localhost:3000 palisade-gateway
"
    );
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<GatewayConfig> {
    let config = match path {
        Some(path) => GatewayConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => GatewayConfig::default(),
    };
    let config = config.with_env_overrides();
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let server = GatewayServer::new(config).context("failed to start gateway")?;
    server.run().await.context("server error")?;
    info!("Palisade gateway stopped");
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = load_config(args.config.as_ref());

    // Without a usable config, still log the failure, but start no exporter.
    let telemetry = match &config {
        Ok(config) => config.telemetry_config(),
        Err(_) => TelemetryConfig::builder().without_metrics().build(),
    };
    if let Err(e) = init_telemetry(&telemetry) {
        eprintln!("Failed to initialize telemetry: {e}");
        std::process::exit(1);
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!(error = %format!("{e:#}"), "startup failed");
            std::process::exit(1);
        }
    };

    info!(
        version = palisade_gateway::VERSION,
        config = ?args.config,
        "Starting Palisade gateway"
    );

    if let Err(e) = run(config).await {
        error!(error = %format!("{e:#}"), "gateway failed");
        std::process::exit(1);
    }
}
