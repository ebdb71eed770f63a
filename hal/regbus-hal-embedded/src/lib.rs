//! embedded-hal backed transaction engine
//!
//! [`HalEngine`] runs regbus command links on any I2C master implementing
//! `embedded_hal::i2c::I2c`, so register drivers work unchanged on every
//! chip HAL that supports embedded-hal 1.0.
//!
//! # Mapping
//!
//! A command link becomes one `I2c::transaction` call. Write primitives turn
//! into `Operation::Write` and read primitives into `Operation::Read`.
//! embedded-hal merges adjacent operations of the same kind into one bus
//! segment and inserts a repeated START where the kind changes, which is
//! exactly the START / address placement of a validated link. The HAL
//! generates ACK for every received byte except the last one of a read
//! segment, matching the NACK rule enforced by `CommandLink::validate`.
//!
//! Links the trait cannot express are refused with
//! [`I2cBusError::Unsupported`]: several device addresses in one link, or
//! two consecutive segments in the same direction.
//!
//! # Timeouts
//!
//! embedded-hal has no per-transaction timeout. The `timeout_ms` passed to
//! `commit` is ignored and the bus timeout configured in the underlying
//! driver applies.

#![no_std]
#![deny(unsafe_code)]

use core::{fmt, slice};

use embedded_hal::i2c::{Error as _, ErrorKind, I2c, Operation};
use heapless::Vec;
use regbus_hal::{BusId, Command, CommandLink, Direction, LinkError, TransactionEngine, MAX_COMMANDS};

/// Error from I2C operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cBusError {
    /// Bus error
    Bus,
    /// Arbitration lost
    ArbitrationLost,
    /// NACK received
    Nack,
    /// Overrun
    Overrun,
    /// Other error
    Other,
    /// Command link failed validation
    InvalidLink(LinkError),
    /// Command link cannot be expressed as one embedded-hal transaction
    Unsupported,
}

impl From<ErrorKind> for I2cBusError {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Bus => I2cBusError::Bus,
            ErrorKind::ArbitrationLoss => I2cBusError::ArbitrationLost,
            ErrorKind::NoAcknowledge(_) => I2cBusError::Nack,
            ErrorKind::Overrun => I2cBusError::Overrun,
            _ => I2cBusError::Other,
        }
    }
}

impl fmt::Display for I2cBusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            I2cBusError::Bus => f.write_str("bus error"),
            I2cBusError::ArbitrationLost => f.write_str("arbitration lost"),
            I2cBusError::Nack => f.write_str("no acknowledge"),
            I2cBusError::Overrun => f.write_str("overrun"),
            I2cBusError::Other => f.write_str("i2c error"),
            I2cBusError::InvalidLink(e) => write!(f, "invalid command link: {}", e),
            I2cBusError::Unsupported => f.write_str("command link not expressible as a transaction"),
        }
    }
}

/// Transaction engine over an embedded-hal I2C master
pub struct HalEngine<I2C> {
    i2c: I2C,
    bus: BusId,
}

impl<I2C: I2c> HalEngine<I2C> {
    /// Wrap an I2C master on port 0
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            bus: BusId::default(),
        }
    }

    /// Set the port reported by [`TransactionEngine::bus_id`]
    pub fn with_bus_id(mut self, bus: BusId) -> Self {
        self.bus = bus;
        self
    }

    /// Give the I2C master back
    pub fn release(self) -> I2C {
        self.i2c
    }
}

/// Find the single target address and check that segment directions alternate
fn target_address(link: &CommandLink<'_>) -> Result<u8, I2cBusError> {
    let mut target: Option<(u8, Direction)> = None;
    for command in link.commands() {
        if let Command::Address { address, direction } = *command {
            match target {
                Some((first, previous)) if first != address || previous == direction => {
                    return Err(I2cBusError::Unsupported);
                }
                _ => target = Some((address, direction)),
            }
        }
    }
    target
        .map(|(address, _)| address)
        .ok_or(I2cBusError::InvalidLink(LinkError::MissingAddress))
}

impl<I2C: I2c> TransactionEngine for HalEngine<I2C> {
    type Error = I2cBusError;

    fn bus_id(&self) -> BusId {
        self.bus
    }

    fn commit(&mut self, mut link: CommandLink<'_>, _timeout_ms: u32) -> Result<(), I2cBusError> {
        link.validate().map_err(I2cBusError::InvalidLink)?;
        let address = target_address(&link)?;

        let mut operations: Vec<Operation<'_>, MAX_COMMANDS> = Vec::new();
        for command in link.commands_mut() {
            let operation = match command {
                Command::Start | Command::Address { .. } | Command::Stop => continue,
                Command::WriteByte { byte, .. } => Operation::Write(slice::from_ref(&*byte)),
                Command::Write { bytes, .. } => Operation::Write(*bytes),
                Command::ReadByte { byte, .. } => Operation::Read(slice::from_mut(&mut **byte)),
                Command::Read { buf, .. } => Operation::Read(&mut **buf),
            };
            operations
                .push(operation)
                .map_err(|_| I2cBusError::InvalidLink(LinkError::Overflow))?;
        }
        if operations.is_empty() {
            // Address-only write: the embedded-hal probe idiom
            let _ = operations.push(Operation::Write(&[]));
        }

        self.i2c
            .transaction(address, operations.as_mut_slice())
            .map_err(|e| I2cBusError::from(e.kind()))
    }
}
