use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use badge_bridge_server::auth::AdminDirectory;
use badge_bridge_server::state::BridgeState;
use badge_bridge_server::store::MemoryWorkerStore;
use badge_bridge_server::{connection, serial};

#[derive(Debug, Parser)]
#[command(
    name = "badge-bridge-server",
    author,
    version,
    about = "NDJSON bridge between the RFID register controller and worker-management clients"
)]
struct Cli {
    /// Address to bind the TCP listener to.
    #[arg(long, env = "BADGE_BRIDGE_LISTEN_ADDR", default_value = "127.0.0.1:9001")]
    listen_addr: String,

    /// Serial device of the register controller. Unset disables ingest.
    #[arg(long, env = "BADGE_BRIDGE_SERIAL_PORT")]
    serial_port: Option<String>,

    /// Baud rate for the register controller link.
    #[arg(long, env = "BADGE_BRIDGE_SERIAL_BAUD", default_value_t = 9600)]
    serial_baud: u32,

    /// Admin passphrase, hashed at startup. Unset means no admin is
    /// registered and logins are rejected.
    #[arg(long, env = "BADGE_BRIDGE_ADMIN_PASSWORD")]
    admin_password: Option<String>,

    /// Identity assigned to the provisioned admin.
    #[arg(long, env = "BADGE_BRIDGE_ADMIN_ID", default_value_t = 1)]
    admin_id: i64,
}

#[derive(Debug, Clone)]
struct ServerConfig {
    listen_addr: SocketAddr,
    serial_port: Option<String>,
    serial_baud: u32,
    admin_password: Option<String>,
    admin_id: i64,
}

impl TryFrom<Cli> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let listen_addr: SocketAddr = cli
            .listen_addr
            .parse()
            .with_context(|| format!("invalid listen address: {}", cli.listen_addr))?;
        Ok(ServerConfig {
            listen_addr,
            serial_port: cli.serial_port.filter(|p| !p.trim().is_empty()),
            serial_baud: cli.serial_baud,
            admin_password: cli.admin_password,
            admin_id: cli.admin_id,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let config = ServerConfig::try_from(Cli::parse())?;
    info!(
        listen_addr = %config.listen_addr,
        serial = config.serial_port.as_deref().unwrap_or("disabled"),
        "starting badge bridge"
    );
    run(config).await
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .context("failed to initialise tracing subscriber")
}

async fn run(config: ServerConfig) -> Result<()> {
    let admins = match &config.admin_password {
        Some(password) => AdminDirectory::single(config.admin_id, password),
        None => {
            warn!("no admin password configured; admin logins will be rejected");
            AdminDirectory::empty()
        }
    };
    let state = BridgeState::new(Arc::new(MemoryWorkerStore::new()), admins);

    let listener = match TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(listen_addr = %config.listen_addr, error = %err, "failed to bind bridge listener");
            return Err(err).with_context(|| format!("failed to bind {}", config.listen_addr));
        }
    };
    info!(listen_addr = %config.listen_addr, "badge bridge listening");

    spawn_serial_ingest(&config, &state);

    tokio::select! {
        result = connection::serve(listener, state) => {
            result.context("accept loop failed")?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }
    Ok(())
}

/// Serial ingest is an optional input channel: a missing or unopenable
/// device leaves request/response and broadcast fully functional.
fn spawn_serial_ingest(config: &ServerConfig, state: &BridgeState) {
    let Some(path) = config.serial_port.as_deref() else {
        info!("serial device not configured; serial ingest disabled");
        return;
    };
    match serial::open_serial(path, config.serial_baud) {
        Ok(stream) => {
            info!(device = path, baud = config.serial_baud, "serial device opened");
            let registry = state.registry.clone();
            tokio::spawn(serial::run_serial_ingest(stream, registry));
        }
        Err(err) => {
            warn!(device = path, error = %err, "failed to open serial device; serial ingest disabled");
        }
    }
}
