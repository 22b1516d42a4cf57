//! # carelink
//!
//! carelink server binary: loads settings, sets up logging and metrics, and
//! starts the HTTP/WebSocket server. Also mints development tokens.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use carelink_auth::{JwtIdentityResolver, TokenRequest};
use carelink_logging::LogFormat;
use carelink_server::{CarelinkServer, ServerConfig};
use carelink_settings::CarelinkSettings;
use clap::{Args, Parser, Subcommand};

/// carelink pairing server.
#[derive(Parser, Debug)]
#[command(name = "carelink", about = "Patient/psychologist pairing server")]
struct Cli {
    /// Settings file (defaults to `~/.carelink/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the server (default).
    Serve(ServeArgs),
    /// Print a signed token for local testing.
    Token(TokenArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct TokenArgs {
    /// Account id.
    #[arg(long)]
    sub: i64,

    /// Grant psychologist access.
    #[arg(long)]
    superuser: bool,

    /// Mark the account inactive.
    #[arg(long)]
    inactive: bool,

    /// Token lifetime in seconds.
    #[arg(long, default_value = "3600")]
    ttl_secs: i64,
}

fn load(path: Option<&PathBuf>) -> Result<CarelinkSettings> {
    match path {
        Some(path) => carelink_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => carelink_settings::load_settings().context("Failed to load settings"),
    }
}

async fn serve(settings: &CarelinkSettings, args: ServeArgs) -> Result<()> {
    let metrics_handle = carelink_server::metrics::install_recorder()?;

    let resolver = JwtIdentityResolver::from_settings(&settings.auth)
        .context("Invalid auth settings")?;
    if !resolver.is_configured() {
        tracing::warn!("no JWT secret configured, every connection will be refused");
    }

    let mut config = ServerConfig::from(settings);
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let server = CarelinkServer::new(config, Arc::new(resolver)).with_metrics(metrics_handle);
    let (addr, handle) = server.listen().await?;
    tracing::info!(%addr, "carelink ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    if !server.stop().await {
        tracing::warn!("some sessions did not close before the shutdown timeout");
    }
    let _ = handle.await;
    Ok(())
}

fn token(settings: &CarelinkSettings, args: &TokenArgs) -> Result<()> {
    let resolver = JwtIdentityResolver::from_settings(&settings.auth)
        .context("Invalid auth settings")?;
    if !resolver.is_configured() {
        bail!("set auth.jwtSecret or CARELINK_JWT_SECRET to mint tokens");
    }
    let token = resolver.issue(&TokenRequest {
        sub: args.sub,
        superuser: args.superuser,
        active: !args.inactive,
        ttl_secs: args.ttl_secs,
    })?;
    println!("{token}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(cli.settings.as_ref())?;

    carelink_logging::init_subscriber(
        &settings.logging.level,
        LogFormat::from_json_flag(settings.logging.json),
    );

    match cli.command {
        Some(Command::Token(args)) => token(&settings, &args),
        Some(Command::Serve(args)) => serve(&settings, args).await,
        None => serve(&settings, ServeArgs::default()).await,
    }
}
