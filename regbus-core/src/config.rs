//! Bus access configuration
//!
//! These types decide how register operations behave at the edges: how long
//! a transaction may wait for the bus, what an empty buffer means, and how
//! 16-bit registers are laid out on the wire.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use regbus_hal::DEFAULT_TIMEOUT_MS;

/// What a buffered read or write does with an empty buffer
///
/// Existing drivers disagree here: some treat an empty transfer as a
/// successful no-op, others as a caller bug. The policy applies to every
/// buffered read and write made with a given [`BusConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ZeroLengthPolicy {
    /// Fail with [`Error::InvalidBufferSize`](crate::Error::InvalidBufferSize)
    #[default]
    Reject,
    /// Succeed without touching the bus
    Ignore,
}

/// Byte order of 16-bit registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ByteOrder {
    /// High byte at the lower register address
    #[default]
    BigEndian,
    /// Low byte at the lower register address
    LittleEndian,
}

impl ByteOrder {
    /// Split a word into bytes in register order
    pub const fn to_bytes(self, value: u16) -> [u8; 2] {
        match self {
            ByteOrder::BigEndian => value.to_be_bytes(),
            ByteOrder::LittleEndian => value.to_le_bytes(),
        }
    }

    /// Join bytes read in register order into a word
    pub const fn from_bytes(self, bytes: [u8; 2]) -> u16 {
        match self {
            ByteOrder::BigEndian => u16::from_be_bytes(bytes),
            ByteOrder::LittleEndian => u16::from_le_bytes(bytes),
        }
    }
}

/// Settings applied to every transaction on a bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BusConfig {
    /// Upper bound on each transaction's wait for the bus, in milliseconds
    pub timeout_ms: u32,
    /// Handling of empty buffers
    pub zero_length: ZeroLengthPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl BusConfig {
    /// 1 s timeout, empty buffers rejected
    pub const DEFAULT: Self = Self {
        timeout_ms: DEFAULT_TIMEOUT_MS,
        zero_length: ZeroLengthPolicy::Reject,
    };

    /// Default timeout, empty buffers treated as no-ops
    pub const LENIENT: Self = Self {
        timeout_ms: DEFAULT_TIMEOUT_MS,
        zero_length: ZeroLengthPolicy::Ignore,
    };

    /// Replace the transaction timeout
    pub const fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Replace the empty buffer policy
    pub const fn with_zero_length(mut self, zero_length: ZeroLengthPolicy) -> Self {
        self.zero_length = zero_length;
        self
    }
}
