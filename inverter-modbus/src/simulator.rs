//! Inverter simulator for tests and local development.
//!
//! Serves the holding register map over Modbus-TCP with a plausible image of
//! an idle 10 kW hybrid machine. Only the function codes the bridge itself
//! uses (FC03, FC06, FC16) are implemented; everything else answers
//! `IllegalFunction`.

use std::collections::HashMap;
use std::future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_modbus::prelude::*;
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};
use tracing::error;

use crate::codec::{Address, Quantity, Word};
use crate::registers::{control, telemetry};

/// A raw holding register image.
#[derive(Debug, Clone, Default)]
pub struct Registers(HashMap<Address, Word>);

impl Registers {
    /// Insert new consecutive registers with `words` values starting at `addr`.
    pub fn insert(&mut self, addr: Address, words: Vec<Word>) {
        for (i, value) in words.into_iter().enumerate() {
            self.0.insert(addr + i as Address, value);
        }
    }

    /// Read `cnt` consecutive registers starting at `addr`.
    pub fn read(&self, addr: Address, cnt: Quantity) -> Result<Vec<Word>, ExceptionCode> {
        let mut values = vec![0; cnt.into()];
        for i in 0..cnt {
            match self.0.get(&(addr + i)) {
                Some(word) => values[i as usize] = *word,
                None => return Err(ExceptionCode::IllegalDataAddress),
            }
        }
        Ok(values)
    }

    /// Write `words` into existing consecutive registers starting at `addr`.
    pub fn write(&mut self, addr: Address, words: &[Word]) -> Result<(), ExceptionCode> {
        for (i, value) in words.iter().enumerate() {
            match self.0.get_mut(&(addr + i as Address)) {
                Some(word) => *word = *value,
                None => return Err(ExceptionCode::IllegalDataAddress),
            }
        }
        Ok(())
    }
}

/// Pack text two characters per word, high byte first, NUL-padded to `cnt`
/// registers, the layout the identity registers use on the wire.
fn text_words(text: &str, cnt: Quantity) -> Vec<Word> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.resize(cnt as usize * 2, 0);
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

/// High-word-first split used by the 32-bit registers.
fn long_words(value: i32) -> Vec<Word> {
    let raw = value as u32;
    vec![(raw >> 16) as Word, (raw & 0xFFFF) as Word]
}

/// A simulated hybrid inverter.
#[derive(Debug, Clone)]
pub struct SimulatedInverter {
    registers: Registers,
}

impl Default for SimulatedInverter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedInverter {
    /// Register image of a machine generating 8.76 kW on two strings with a
    /// battery floating at 57%.
    pub fn new() -> Self {
        let mut r = Registers::default();

        r.insert(telemetry::MODEL_NAME.address, text_words("H3-10.0-E", 16));
        r.insert(
            telemetry::SERIAL_NUMBER.address,
            text_words("60SA102F7B0017", 16),
        );
        r.insert(telemetry::MFG_ID.address, text_words("SOLAKON", 16));

        r.insert(telemetry::MASTER_VERSION.address, vec![10203]);
        r.insert(telemetry::SLAVE_VERSION.address, vec![10200]);
        r.insert(telemetry::MANAGER_VERSION.address, vec![10104]);

        r.insert(telemetry::PROTOCOL_VERSION.address, vec![0x0105, 0x0000]);
        r.insert(telemetry::RATED_POWER.address, long_words(10_000));
        r.insert(telemetry::MAX_ACTIVE_POWER.address, long_words(11_000));

        // bit2 = operating
        r.insert(telemetry::STATUS_1.address, vec![0b0000_0000_0000_0100]);
        r.insert(telemetry::ALARM_1.address, vec![0]);
        r.insert(telemetry::ALARM_2.address, vec![0]);
        r.insert(telemetry::ALARM_3.address, vec![0]);

        r.insert(telemetry::PV1_VOLTAGE.address, vec![6483]);
        r.insert(telemetry::PV1_CURRENT.address, vec![825]);
        r.insert(telemetry::PV2_VOLTAGE.address, vec![6391]);
        r.insert(telemetry::PV2_CURRENT.address, vec![810]);
        r.insert(telemetry::PV3_VOLTAGE.address, vec![0]);
        r.insert(telemetry::PV3_CURRENT.address, vec![0]);
        r.insert(telemetry::PV4_VOLTAGE.address, vec![0]);
        r.insert(telemetry::PV4_CURRENT.address, vec![0]);
        r.insert(telemetry::TOTAL_PV_POWER.address, long_words(9_870));

        r.insert(telemetry::GRID_R_VOLTAGE.address, vec![2350]);
        r.insert(telemetry::GRID_S_VOLTAGE.address, vec![2347]);
        r.insert(telemetry::GRID_T_VOLTAGE.address, vec![2352]);
        r.insert(telemetry::INVERTER_R_CURRENT.address, long_words(12_431));
        r.insert(telemetry::INVERTER_S_CURRENT.address, long_words(12_387));
        r.insert(telemetry::INVERTER_T_CURRENT.address, long_words(12_455));
        r.insert(telemetry::ACTIVE_POWER.address, long_words(8_760));
        r.insert(telemetry::REACTIVE_POWER.address, long_words(-120));
        r.insert(telemetry::POWER_FACTOR.address, vec![998]);
        r.insert(telemetry::GRID_FREQUENCY.address, vec![4_998]);

        r.insert(telemetry::INTERNAL_TEMP.address, vec![415]);

        r.insert(
            telemetry::CUMULATIVE_GENERATION.address,
            long_words(1_234_567),
        );
        r.insert(telemetry::DAILY_GENERATION.address, long_words(2_345));

        r.insert(telemetry::BATTERY1_VOLTAGE.address, vec![512]);
        r.insert(telemetry::BATTERY1_CURRENT.address, long_words(12_500));
        r.insert(telemetry::BATTERY1_POWER.address, long_words(640));
        r.insert(telemetry::BATTERY_COMBINED_POWER.address, long_words(640));
        r.insert(telemetry::BMS1_SOC.address, vec![57]);
        r.insert(telemetry::NETWORK_STATUS.address, vec![1]);

        r.insert(control::REMOTE_CONTROL.address, vec![0]);
        r.insert(control::REMOTE_TIMEOUT_SET.address, vec![10]);
        r.insert(control::REMOTE_ACTIVE_POWER.address, long_words(0));
        r.insert(control::REMOTE_REACTIVE_POWER.address, long_words(0));
        r.insert(control::IMPORT_POWER_LIMIT.address, long_words(0));
        r.insert(control::THRESHOLD_SOC.address, vec![20]);
        r.insert(control::EXPORT_POWER_LIMIT.address, long_words(8_000));
        r.insert(control::BATTERY_MAX_CHARGE_CURRENT.address, vec![200]);
        r.insert(control::BATTERY_MAX_DISCHARGE_CURRENT.address, vec![200]);
        r.insert(control::MIN_SOC.address, vec![10]);
        r.insert(control::MAX_SOC.address, vec![100]);
        r.insert(control::MIN_SOC_ONGRID.address, vec![10]);
        r.insert(control::EPS_OUTPUT.address, vec![0]);
        r.insert(control::EXPORT_POWER_LIMIT_2.address, long_words(0));
        r.insert(control::WORK_MODE.address, vec![1]);
        r.insert(control::POWER_ON.address, vec![0]);
        r.insert(control::POWER_OFF.address, vec![0]);
        r.insert(control::GRID_STANDARD_CODE.address, vec![21]);

        Self { registers: r }
    }
}

/// Shared wrapper so every accepted connection serves the same image.
#[derive(Debug, Clone)]
pub struct Simulator(Arc<Mutex<SimulatedInverter>>);

impl Simulator {
    pub fn new(device: SimulatedInverter) -> Self {
        Self(Arc::new(Mutex::new(device)))
    }

    /// Current raw content of one register, for assertions in tests.
    pub fn word(&self, addr: Address) -> Option<Word> {
        self.0.lock().unwrap().registers.0.get(&addr).copied()
    }
}

impl tokio_modbus::server::Service for Simulator {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        let mut device = self.0.lock().unwrap();
        let res = match req {
            Request::ReadHoldingRegisters(addr, cnt) => device
                .registers
                .read(addr, cnt)
                .map(Response::ReadHoldingRegisters),
            Request::WriteMultipleRegisters(addr, values) => device
                .registers
                .write(addr, &values)
                .map(|()| Response::WriteMultipleRegisters(addr, values.len() as u16)),
            Request::WriteSingleRegister(addr, value) => device
                .registers
                .write(addr, std::slice::from_ref(&value))
                .map(|()| Response::WriteSingleRegister(addr, value)),
            _ => Err(ExceptionCode::IllegalFunction),
        };
        future::ready(res)
    }
}

async fn run_tcp_server(listener: TcpListener, simulator: Simulator) {
    let server = Server::new(listener);
    let new_service = |_socket_addr| Ok(Some(simulator.clone()));
    let on_connected = |stream, socket_addr| async move {
        accept_tcp_connection(stream, socket_addr, new_service)
    };
    let on_process_error = |err| {
        error!("simulator connection error: {err}");
    };
    if let Err(err) = server.serve(&on_connected, on_process_error).await {
        error!("simulator server error: {err}");
    }
}

/// Bind `socket_addr` and serve the simulator in a background task.
///
/// Binding happens before spawning so callers can pass port 0 and take the
/// assigned address from the return value.
pub async fn spawn_tcp_simulator(
    socket_addr: SocketAddr,
    simulator: Simulator,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(socket_addr).await?;
    let local_addr = listener.local_addr()?;
    let handle = tokio::spawn(run_tcp_server(listener, simulator));
    Ok((local_addr, handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_image_covers_the_whole_catalog() {
        let device = SimulatedInverter::new();
        for (name, def) in crate::registers::TELEMETRY
            .iter()
            .chain(crate::registers::WRITABLE)
        {
            assert!(
                device
                    .registers
                    .read(def.address, def.kind.word_count())
                    .is_ok(),
                "{name} missing from the simulated image"
            );
        }
    }

    #[test]
    fn text_words_packs_high_byte_first() {
        assert_eq!(text_words("AB", 2), vec![0x4142, 0x0000]);
    }

    #[test]
    fn reads_outside_the_image_answer_illegal_address() {
        let device = SimulatedInverter::new();
        assert_eq!(
            device.registers.read(50_000, 1),
            Err(ExceptionCode::IllegalDataAddress)
        );
    }

    #[test]
    fn writes_update_existing_registers_only() {
        let mut device = SimulatedInverter::new();
        device
            .registers
            .write(control::WORK_MODE.address, &[3])
            .unwrap();
        assert_eq!(device.registers.read(control::WORK_MODE.address, 1), Ok(vec![3]));
        assert_eq!(
            device.registers.write(50_000, &[1]),
            Err(ExceptionCode::IllegalDataAddress)
        );
    }
}
