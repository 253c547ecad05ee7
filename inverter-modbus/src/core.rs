//! Register access over a single shared Modbus-TCP session.
//!
//! The inverter accepts one Modbus master at a time, so the whole process
//! shares one lazily established session. The session lives behind an async
//! mutex; concurrent requests serialize on it instead of racing to
//! reconnect.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_modbus::client::tcp::connect_slave;
use tokio_modbus::client::{Context, Reader, Writer};
use tokio_modbus::slave::Slave;
use tracing::{debug, warn};

use crate::codec::{self, Value};
use crate::error::Error;
use crate::registers::{control, Access, RegisterDef};

/// Connection settings for the inverter's Modbus-TCP endpoint.
#[derive(Debug, Clone)]
pub struct InverterConfig {
    pub addr: SocketAddr,
    /// Modbus slave address (1-247).
    pub slave: u8,
    /// Bound on each individual transport operation, not on a whole request.
    pub timeout: Duration,
}

#[derive(Default)]
struct Session {
    ctx: Option<Context>,
}

/// Access layer bridging register descriptors and the Modbus transport.
pub struct Inverter {
    config: InverterConfig,
    session: Mutex<Session>,
}

impl Inverter {
    pub fn new(config: InverterConfig) -> Self {
        Self {
            config,
            session: Mutex::new(Session::default()),
        }
    }

    /// Read and decode one register.
    ///
    /// `Ok(None)` means the value is unavailable (read refused, transport
    /// dropped, or response malformed), not zero and not an absent device.
    /// Only a failure to establish the session is an `Err`.
    pub async fn read(&self, def: &RegisterDef) -> Result<Option<Value>, Error> {
        let mut session = self.session.lock().await;
        let response = {
            let ctx = self.ensure(&mut session).await?;
            let request = ctx.read_holding_registers(def.address, def.kind.word_count());
            timeout(self.config.timeout, request).await
        };
        let result = match response {
            Ok(Ok(Ok(words))) => Ok(words),
            Ok(Ok(Err(code))) => Err(Error::Exception(code)),
            Ok(Err(err)) => Err(Error::Transport(err)),
            Err(_) => Err(Error::Timeout(self.config.timeout)),
        };
        let words = match result {
            Ok(words) => words,
            Err(err) => {
                warn!(address = def.address, error = %err, "register read failed");
                if err.closes_session() {
                    session.ctx = None;
                }
                return Ok(None);
            }
        };
        drop(session);
        match codec::decode(&words, def) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(address = def.address, error = %err, "register decode failed");
                Ok(None)
            }
        }
    }

    /// Validate, encode, and write one register.
    ///
    /// `Ok(false)` covers everything from a range violation (which performs
    /// no transport call) to a device refusal; the reason is logged. The
    /// write is attempted exactly once; a failure is reported, never
    /// retried. On success the physical device setting changes, with no
    /// undo.
    pub async fn write(&self, def: &RegisterDef, value: f64) -> Result<bool, Error> {
        if matches!(def.access, Access::ReadOnly) {
            let err = Error::NotWritable {
                address: def.address,
            };
            warn!(value, error = %err, "rejected register write");
            return Ok(false);
        }
        let words = match codec::encode(value, def) {
            Ok(words) => words,
            Err(err) => {
                warn!(address = def.address, value, error = %err, "rejected register write");
                return Ok(false);
            }
        };

        let mut session = self.session.lock().await;
        let response = {
            let ctx = self.ensure(&mut session).await?;
            if let [word] = words[..] {
                timeout(self.config.timeout, ctx.write_single_register(def.address, word)).await
            } else {
                timeout(
                    self.config.timeout,
                    ctx.write_multiple_registers(def.address, &words),
                )
                .await
            }
        };
        let result = match response {
            Ok(Ok(Ok(_))) => Ok(()),
            Ok(Ok(Err(code))) => Err(Error::Exception(code)),
            Ok(Err(err)) => Err(Error::Transport(err)),
            Err(_) => Err(Error::Timeout(self.config.timeout)),
        };
        match result {
            Ok(()) => {
                debug!(address = def.address, value, "register written");
                Ok(true)
            }
            Err(err) => {
                warn!(address = def.address, value, error = %err, "register write failed");
                if err.closes_session() {
                    session.ctx = None;
                }
                Ok(false)
            }
        }
    }

    /// Select the inverter's work mode (1-7, per the WORK_MODE options).
    pub async fn set_work_mode(&self, mode: u16) -> Result<bool, Error> {
        self.write(&control::WORK_MODE, f64::from(mode)).await
    }

    /// Write both state-of-charge limits, minimum before maximum.
    ///
    /// The pre-check rejects combinations the device itself would refuse,
    /// so a known-invalid pair never reaches the first register. If the
    /// second write fails after the first succeeded, the device keeps the
    /// partially applied pair; there is no rollback.
    pub async fn set_soc_limits(&self, min_soc: f64, max_soc: f64) -> Result<bool, Error> {
        if !(10.0..=100.0).contains(&min_soc) || !(10.0..=100.0).contains(&max_soc) {
            warn!(min_soc, max_soc, "SoC limits must lie within 10-100%");
            return Ok(false);
        }
        if min_soc >= max_soc {
            warn!(min_soc, max_soc, "minimum SoC must stay below maximum SoC");
            return Ok(false);
        }
        let min_ok = self.write(&control::MIN_SOC, min_soc).await?;
        let max_ok = self.write(&control::MAX_SOC, max_soc).await?;
        Ok(min_ok && max_ok)
    }

    /// Write both battery current limits, charge before discharge.
    pub async fn set_battery_limits(
        &self,
        max_charge_current: f64,
        max_discharge_current: f64,
    ) -> Result<bool, Error> {
        let charge_ok = self
            .write(&control::BATTERY_MAX_CHARGE_CURRENT, max_charge_current)
            .await?;
        let discharge_ok = self
            .write(&control::BATTERY_MAX_DISCHARGE_CURRENT, max_discharge_current)
            .await?;
        Ok(charge_ok && discharge_ok)
    }

    /// Write both grid power limits, import before export.
    pub async fn set_power_limits(
        &self,
        import_limit: f64,
        export_limit: f64,
    ) -> Result<bool, Error> {
        let import_ok = self
            .write(&control::IMPORT_POWER_LIMIT, import_limit)
            .await?;
        let export_ok = self
            .write(&control::EXPORT_POWER_LIMIT, export_limit)
            .await?;
        Ok(import_ok && export_ok)
    }

    /// Command the remote-control active power setpoint in watts.
    pub async fn set_remote_power(&self, power: f64) -> Result<bool, Error> {
        self.write(&control::REMOTE_ACTIVE_POWER, power).await
    }

    /// Write the remote-control command word.
    pub async fn set_remote_mode(&self, mode: crate::remote::RemoteMode) -> Result<bool, Error> {
        self.write(&control::REMOTE_CONTROL, f64::from(mode.to_raw()))
            .await
    }

    /// Hand out the live session, connecting first if there is none.
    ///
    /// Runs under the session mutex, so concurrent requests cannot both
    /// observe "disconnected" and race to reconnect.
    async fn ensure<'a>(&self, session: &'a mut Session) -> Result<&'a mut Context, Error> {
        let ctx = match session.ctx.take() {
            Some(ctx) => ctx,
            None => {
                debug!(addr = %self.config.addr, slave = self.config.slave, "opening modbus session");
                let connect = connect_slave(self.config.addr, Slave(self.config.slave));
                timeout(self.config.timeout, connect)
                    .await
                    .map_err(|_| Error::Timeout(self.config.timeout))?
                    .map_err(|source| Error::Connect {
                        addr: self.config.addr,
                        source,
                    })?
            }
        };
        Ok(session.ctx.insert(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::telemetry;

    fn unreachable_inverter() -> Inverter {
        // nothing listens on port 1; the pre-checks under test must return
        // before any connection attempt
        Inverter::new(InverterConfig {
            addr: "127.0.0.1:1".parse().unwrap(),
            slave: 1,
            timeout: Duration::from_millis(200),
        })
    }

    #[tokio::test]
    async fn soc_precheck_rejects_inverted_limits_without_transport() {
        let inverter = unreachable_inverter();
        assert!(!inverter.set_soc_limits(50.0, 20.0).await.unwrap());
        assert!(!inverter.set_soc_limits(30.0, 30.0).await.unwrap());
    }

    #[tokio::test]
    async fn soc_precheck_rejects_out_of_band_operands() {
        let inverter = unreachable_inverter();
        assert!(!inverter.set_soc_limits(5.0, 80.0).await.unwrap());
        assert!(!inverter.set_soc_limits(20.0, 101.0).await.unwrap());
    }

    #[tokio::test]
    async fn read_only_registers_refuse_writes_without_transport() {
        let inverter = unreachable_inverter();
        assert!(!inverter.write(&telemetry::BMS1_SOC, 50.0).await.unwrap());
    }

    #[tokio::test]
    async fn out_of_range_write_skips_transport() {
        let inverter = unreachable_inverter();
        assert!(!inverter.write(&control::MIN_SOC, 5.0).await.unwrap());
    }
}
