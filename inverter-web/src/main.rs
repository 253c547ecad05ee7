//! HTTP control panel for a Modbus-TCP hybrid solar inverter.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use inverter_modbus::{Inverter, InverterConfig};
use tracing_subscriber::EnvFilter;

mod api;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Inverter Modbus-TCP endpoint
    #[arg(long, env = "INVERTER_ADDR", default_value = "192.168.1.121:502")]
    inverter: SocketAddr,

    /// Modbus slave address of the inverter (1-247)
    #[arg(long, env = "INVERTER_SLAVE_ID", default_value_t = 1)]
    slave_id: u8,

    /// Per-operation Modbus timeout in milliseconds
    #[arg(long, env = "INVERTER_TIMEOUT_MS", default_value_t = 5000)]
    timeout_ms: u64,

    /// HTTP listen address
    #[arg(long, env = "PANEL_LISTEN", default_value = "0.0.0.0:3000")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let inverter = Inverter::new(InverterConfig {
        addr: args.inverter,
        slave: args.slave_id,
        timeout: Duration::from_millis(args.timeout_ms),
    });

    let app = api::router(Arc::new(inverter));
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    tracing::info!(
        "control panel listening on http://{} (inverter at {})",
        listener.local_addr()?,
        args.inverter
    );
    axum::serve(listener, app).await?;
    Ok(())
}
