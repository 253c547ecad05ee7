/// Run the inverter simulator as a standalone Modbus-TCP device.
use std::net::SocketAddr;

use inverter_modbus::simulator::{spawn_tcp_simulator, SimulatedInverter, Simulator};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let socket_addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:5502".to_string())
        .parse()
        .expect("invalid socket address");

    let simulator = Simulator::new(SimulatedInverter::new());
    let (addr, server) = spawn_tcp_simulator(socket_addr, simulator).await?;
    println!("simulated inverter listening on {addr}");

    server.await.expect("simulator task failed");
    Ok(())
}
