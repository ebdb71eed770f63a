//! Bit-field accessor
//!
//! Reads and updates contiguous bit-fields inside one register byte using
//! read-modify-write, so callers never hand-compute masks.
//!
//! A field is addressed by its most significant bit and its width:
//!
//! ```text
//! 0110_1001   register byte (0x69)
//! 7654 3210   bit numbers
//!    x xx     offset = 4, length = 3
//! 0001_1100   mask
//!       010   value after shifting right by offset - length + 1 = 2
//! ```
//!
//! Read-modify-write issues two transactions. The `&mut` engine borrow
//! keeps other users of the same engine out for the whole call; engines
//! shared between tasks go through [`SharedBus`](crate::SharedBus).

use regbus_hal::TransactionEngine;

use crate::config::BusConfig;
use crate::error::Error;
use crate::register;

/// A contiguous run of bits within one register byte
///
/// Constructed through [`BitField::new`], which guarantees the field fits
/// in a byte, so the mask and shift arithmetic never overflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitField {
    offset: u8,
    length: u8,
}

impl BitField {
    /// A whole register byte
    pub const BYTE: Self = Self {
        offset: 7,
        length: 8,
    };

    /// Describe the field with most significant bit `offset` (0-7) and
    /// width `length` (1-8)
    ///
    /// Returns `None` if the field would extend below bit 0.
    pub const fn new(offset: u8, length: u8) -> Option<Self> {
        if offset < 8 && length >= 1 && length <= offset + 1 {
            Some(Self { offset, length })
        } else {
            None
        }
    }

    /// A single bit (0-7)
    pub const fn bit(bit: u8) -> Option<Self> {
        Self::new(bit, 1)
    }

    /// Most significant bit of the field
    pub const fn offset(self) -> u8 {
        self.offset
    }

    /// Width of the field in bits
    pub const fn length(self) -> u8 {
        self.length
    }

    /// Position of the least significant bit
    pub const fn shift(self) -> u8 {
        self.offset + 1 - self.length
    }

    /// Field bits set, all others clear
    pub const fn mask(self) -> u8 {
        // widened so length 8 does not overflow
        let ones = ((1u16 << self.length) - 1) as u8;
        ones << self.shift()
    }

    /// Right-aligned field value within `byte`
    pub const fn extract(self, byte: u8) -> u8 {
        (byte & self.mask()) >> self.shift()
    }

    /// `byte` with the field replaced by `value`
    ///
    /// Bits of `value` beyond the field width are discarded.
    pub const fn insert(self, byte: u8, value: u8) -> u8 {
        let mask = self.mask();
        (byte & !mask) | ((value << self.shift()) & mask)
    }
}

/// One bit of a register byte (0-7)
///
/// Constructed through [`Bit::new`], so an out-of-range bit number cannot
/// reach a register operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Bit(u8);

impl Bit {
    /// Bit `index`, or `None` above bit 7
    pub const fn new(index: u8) -> Option<Self> {
        if index < 8 {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Bit number, 0 being the least significant
    pub const fn index(self) -> u8 {
        self.0
    }

    /// The bit as a one-bit field
    pub const fn field(self) -> BitField {
        BitField {
            offset: self.0,
            length: 1,
        }
    }
}

/// Read a register, transform it, and write the result back
///
/// A failed read skips the write. A failed write leaves the register in
/// whatever state the engine left it.
pub fn read_modify_write<E, F>(
    engine: &mut E,
    config: &BusConfig,
    address: u8,
    register: u8,
    modify: F,
) -> Result<u8, Error<E::Error>>
where
    E: TransactionEngine,
    F: FnOnce(u8) -> u8,
{
    let current = register::read_byte(engine, config, address, register)?;
    let updated = modify(current);
    register::write_byte(engine, config, address, register, updated)?;
    Ok(updated)
}

/// Read a right-aligned field value
pub fn read_field<E: TransactionEngine>(
    engine: &mut E,
    config: &BusConfig,
    address: u8,
    register: u8,
    field: BitField,
) -> Result<u8, Error<E::Error>> {
    let byte = register::read_byte(engine, config, address, register)?;
    Ok(field.extract(byte))
}

/// Replace a field with a right-aligned value, keeping all other bits
///
/// Returns the byte written to the register.
pub fn write_field<E: TransactionEngine>(
    engine: &mut E,
    config: &BusConfig,
    address: u8,
    register: u8,
    field: BitField,
    value: u8,
) -> Result<u8, Error<E::Error>> {
    read_modify_write(engine, config, address, register, |byte| field.insert(byte, value))
}

/// Set (`enable`) or clear every bit of `mask`, keeping all other bits
///
/// Returns the byte written to the register.
pub fn update_mask<E: TransactionEngine>(
    engine: &mut E,
    config: &BusConfig,
    address: u8,
    register: u8,
    mask: u8,
    enable: bool,
) -> Result<u8, Error<E::Error>> {
    read_modify_write(engine, config, address, register, |byte| {
        if enable {
            byte | mask
        } else {
            byte & !mask
        }
    })
}

/// Apply `(byte & and_mask) | or_mask` to a register
///
/// Returns the byte written to the register.
pub fn modify<E: TransactionEngine>(
    engine: &mut E,
    config: &BusConfig,
    address: u8,
    register: u8,
    and_mask: u8,
    or_mask: u8,
) -> Result<u8, Error<E::Error>> {
    read_modify_write(engine, config, address, register, |byte| {
        (byte & and_mask) | or_mask
    })
}
