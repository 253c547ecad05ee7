//! Error taxonomy for the register access layer.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Failures raised while talking to the inverter.
///
/// Only `Connect` and a timeout during connection establishment abort a
/// request; everything else is recovered inside [`crate::core::Inverter`] and
/// surfaced as a missing value or a failed write.
#[derive(Debug, Error)]
pub enum Error {
    /// Establishing the Modbus-TCP session failed.
    #[error("connecting to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The transport failed mid-request.
    #[error("modbus transport error: {0}")]
    Transport(#[from] tokio_modbus::Error),

    /// The device answered with a Modbus exception.
    #[error("modbus exception: {0:?}")]
    Exception(tokio_modbus::ExceptionCode),

    /// A transport operation did not complete within the configured timeout.
    #[error("modbus request timed out after {0:?}")]
    Timeout(Duration),

    /// The response carried a different number of words than the descriptor.
    #[error("expected {expected} register words, got {got}")]
    WordCount { expected: u16, got: usize },

    /// The write value violates the descriptor's range bound.
    #[error("value {value} outside allowed range [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },

    /// Attempted to write through a read-only descriptor.
    #[error("register {address} is read-only")]
    NotWritable { address: u16 },
}

impl Error {
    /// Whether the failure poisons the shared session. Transport errors and
    /// timeouts leave the TCP stream in an unknown state, so the session is
    /// dropped and the next request reconnects. Modbus exceptions arrive on
    /// an intact stream and keep the session.
    pub fn closes_session(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout(_))
    }
}
