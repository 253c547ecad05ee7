//! Typed access to a hybrid solar inverter's Modbus-TCP holding registers,
//! based on [tokio-modbus](https://github.com/slowtec/tokio-modbus).

//! ## Layout
//!
//! The crate is organized around three pieces:
//!
//! - [`registers`] - the static catalog describing every register the device
//!   exposes: address, on-wire type, scale factor, unit, write range.
//! - [`codec`] - pure conversions between raw 16-bit register words and
//!   engineering values, with no I/O.
//! - [`core::Inverter`] - the access layer that drives a single shared
//!   Modbus-TCP session, validating and encoding writes and decoding reads.
//!
//! [`remote`] covers the bit-packed remote-control command word, and
//! [`simulator`] (cargo feature `simulator`, enabled by default) provides an
//! in-process inverter to test and develop against.

/// Utilities for encoding values into and decoding values from Modbus registers
pub mod codec;
/// Register access over a single shared Modbus-TCP session
pub mod core;
pub mod error;
/// Static catalog of the inverter's holding register map
pub mod registers;
/// Remote-control command word for the REMOTE_CONTROL register
pub mod remote;

/// Inverter simulator for tests and local development (based on tokio-modbus [server examples](https://github.com/slowtec/tokio-modbus/tree/main/examples))
#[cfg(feature = "simulator")]
pub mod simulator;

pub use crate::core::{Inverter, InverterConfig};
pub use crate::error::Error;
