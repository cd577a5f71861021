//! Meridian frontend entry point.

use anyhow::Context;
use meridian_config::ConfigLoader;
use meridian_frontend::{Frontend, Router, Server};
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line arguments.
struct Args {
    /// Path to a TOML or JSON configuration file.
    config: Option<PathBuf>,
    /// Start from the development preset instead of production defaults.
    development: bool,
}

impl Args {
    fn parse() -> anyhow::Result<Self> {
        let mut args = std::env::args().skip(1);
        let mut parsed = Self {
            config: None,
            development: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    parsed.config = Some(args.next().map(PathBuf::from).context("--config needs a path")?);
                }
                "--development" => parsed.development = true,
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("meridian-frontend {}", meridian_frontend::VERSION);
                    std::process::exit(0);
                }
                other => anyhow::bail!("unknown argument: {other} (use --help for usage)"),
            }
        }
        Ok(parsed)
    }
}

fn print_help() {
    println!(
        r"Meridian frontend - managed-cluster resource provider

USAGE:
    meridian-frontend [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Configuration file (TOML or JSON)
        --development      Start from development defaults
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    MERIDIAN__SERVER__LISTEN_ADDR     API listener (default: 0.0.0.0:8443)
    MERIDIAN__SERVER__LOCATION        Azure region served
    MERIDIAN__LOCK__TTL_SECS          Subscription lock TTL
    MERIDIAN__AUDIT__ENABLED          Emit audit records
"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse()?;

    let mut loader = ConfigLoader::new();
    if args.development {
        loader = loader.with_development();
    }
    if let Some(path) = &args.config {
        loader = loader
            .with_file(path)
            .with_context(|| format!("loading {}", path.display()))?;
    }
    let config = loader
        .with_dotenv()?
        .with_env_prefix("MERIDIAN")
        .load()
        .context("invalid configuration")?;

    let _telemetry = meridian_telemetry::init_telemetry(config.telemetry_config())
        .context("failed to initialize telemetry")?;

    let frontend = Arc::new(Frontend::from_config(&config));
    tracing::info!(
        version = meridian_frontend::VERSION,
        location = %frontend.location(),
        listen_addr = %config.server.listen_addr,
        "starting frontend"
    );

    let router = Arc::new(Router::new(frontend));
    Server::new(router, &config).run().await?;
    Ok(())
}
