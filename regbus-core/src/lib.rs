//! Register and bit-field access for I2C peripherals
//!
//! This crate turns raw bus transactions into the register operations
//! device drivers are written in terms of:
//!
//! - Buffered register span reads and writes with the START / repeated
//!   START / ACK / NACK sequencing devices expect ([`register`])
//! - Read-modify-write of bit-fields inside a register byte ([`field`])
//! - A device wrapper binding an engine to a 7-bit address ([`Device`])
//! - A per-bus lock for engines shared between tasks ([`SharedBus`])
//!
//! Every operation is one synchronous call. Composite operations such as
//! [`Device::write_field`] issue two transactions and rely on exclusive
//! (`&mut`) access to the engine for the whole call.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

mod fmt;

pub mod config;
pub mod device;
pub mod error;
pub mod field;
pub mod register;
pub mod shared;

pub use config::{BusConfig, ByteOrder, ZeroLengthPolicy};
pub use device::Device;
pub use error::Error;
pub use field::{Bit, BitField};
pub use shared::SharedBus;

pub use regbus_hal::{BusId, TransactionEngine};
