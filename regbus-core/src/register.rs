//! Register access layer
//!
//! Builds the command links for register span transfers. Devices are
//! assumed to auto-increment their register pointer, so a span of N bytes
//! starting at register R covers registers R..R+N.
//!
//! # Read
//!
//! ```text
//! START | addr+W | reg | START | addr+R | N-1 bytes ACK | 1 byte NACK | STOP
//! ```
//!
//! The first segment loads the register pointer without a STOP, the
//! repeated START turns the bus around. The master ACKs every byte but the
//! last, and the final NACK tells the device to release the bus.
//!
//! # Write
//!
//! ```text
//! START | addr+W | reg | N-1 bytes ACK | 1 byte NACK | STOP
//! ```
//!
//! For N = 1 the bulk segment is left out entirely in both directions.

use regbus_hal::{Ack, CommandLink, Direction, TransactionEngine};

use crate::config::{BusConfig, ByteOrder, ZeroLengthPolicy};
use crate::error::Error;
use crate::fmt::{debug, trace, warn};

/// Apply the empty buffer policy
fn empty_transfer<E>(config: &BusConfig, address: u8, register: u8) -> Result<(), Error<E>> {
    match config.zero_length {
        ZeroLengthPolicy::Reject => {
            warn!("empty transfer rejected addr={:#x} reg={:#x}", address, register);
            Err(Error::InvalidBufferSize)
        }
        ZeroLengthPolicy::Ignore => {
            debug!("empty transfer ignored addr={:#x} reg={:#x}", address, register);
            Ok(())
        }
    }
}

fn commit<E: TransactionEngine>(
    engine: &mut E,
    config: &BusConfig,
    link: CommandLink<'_>,
    address: u8,
    register: u8,
) -> Result<(), Error<E::Error>> {
    trace!("i2c commit addr={:#x} reg={:#x} commands={}", address, register, link.len());
    engine.commit(link, config.timeout_ms).map_err(|e| {
        warn!("i2c transaction failed addr={:#x} reg={:#x}", address, register);
        Error::TransactionFailed(e)
    })
}

/// Read `buffer.len()` bytes starting at `register`
///
/// On failure the buffer contents are unspecified.
pub fn read<E: TransactionEngine>(
    engine: &mut E,
    config: &BusConfig,
    address: u8,
    register: u8,
    buffer: &mut [u8],
) -> Result<(), Error<E::Error>> {
    let Some((last, bulk)) = buffer.split_last_mut() else {
        return empty_transfer(config, address, register);
    };

    let mut link = CommandLink::new();
    link.start()
        .address(address, Direction::Write)
        .write_byte(register, Ack::Ack)
        .start()
        .address(address, Direction::Read);
    if !bulk.is_empty() {
        link.read(bulk, Ack::Ack);
    }
    link.read_byte(last, Ack::Nack).stop();

    commit(engine, config, link, address, register)
}

/// Write `buffer` to consecutive registers starting at `register`
pub fn write<E: TransactionEngine>(
    engine: &mut E,
    config: &BusConfig,
    address: u8,
    register: u8,
    buffer: &[u8],
) -> Result<(), Error<E::Error>> {
    let Some((&last, bulk)) = buffer.split_last() else {
        return empty_transfer(config, address, register);
    };

    let mut link = CommandLink::new();
    link.start()
        .address(address, Direction::Write)
        .write_byte(register, Ack::Ack);
    if !bulk.is_empty() {
        link.write(bulk, Ack::Ack);
    }
    link.write_byte(last, Ack::Nack).stop();

    commit(engine, config, link, address, register)
}

/// Load the device's register pointer without transferring data
///
/// Some devices stream from the pointer on a plain read; this prepares
/// such a read as its own STOP-terminated transaction.
pub fn select<E: TransactionEngine>(
    engine: &mut E,
    config: &BusConfig,
    address: u8,
    register: u8,
) -> Result<(), Error<E::Error>> {
    let mut link = CommandLink::new();
    link.start()
        .address(address, Direction::Write)
        .write_byte(register, Ack::Nack)
        .stop();

    commit(engine, config, link, address, register)
}

/// Read one register
pub fn read_byte<E: TransactionEngine>(
    engine: &mut E,
    config: &BusConfig,
    address: u8,
    register: u8,
) -> Result<u8, Error<E::Error>> {
    let mut byte = [0u8];
    read(engine, config, address, register, &mut byte)?;
    Ok(byte[0])
}

/// Write one register
pub fn write_byte<E: TransactionEngine>(
    engine: &mut E,
    config: &BusConfig,
    address: u8,
    register: u8,
    value: u8,
) -> Result<(), Error<E::Error>> {
    write(engine, config, address, register, &[value])
}

/// Read a 16-bit value spanning `register` and `register + 1`
pub fn read_word<E: TransactionEngine>(
    engine: &mut E,
    config: &BusConfig,
    address: u8,
    register: u8,
    order: ByteOrder,
) -> Result<u16, Error<E::Error>> {
    let mut bytes = [0u8; 2];
    read(engine, config, address, register, &mut bytes)?;
    Ok(order.from_bytes(bytes))
}

/// Write a 16-bit value spanning `register` and `register + 1`
pub fn write_word<E: TransactionEngine>(
    engine: &mut E,
    config: &BusConfig,
    address: u8,
    register: u8,
    value: u16,
    order: ByteOrder,
) -> Result<(), Error<E::Error>> {
    write(engine, config, address, register, &order.to_bytes(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regbus_hal::mock::{MockEngine, MockError, Op};

    const ADDR: u8 = 0x68;

    fn write_select() -> [Op; 3] {
        [
            Op::Start,
            Op::Address { address: ADDR, direction: Direction::Write },
            Op::Write { len: 1, ack: Ack::Ack },
        ]
    }

    #[test]
    fn test_read_single_byte_has_no_ack_phase() {
        let mut engine = MockEngine::new(ADDR).with_registers(0x75, &[0x71]);
        let mut buf = [0u8; 1];

        read(&mut engine, &BusConfig::DEFAULT, ADDR, 0x75, &mut buf).unwrap();

        assert_eq!(buf, [0x71]);
        let ops = engine.last_transaction().unwrap();
        assert_eq!(&ops[..3], &write_select());
        assert_eq!(
            &ops[3..],
            &[
                Op::Start,
                Op::Address { address: ADDR, direction: Direction::Read },
                Op::Read { len: 1, ack: Ack::Nack },
                Op::Stop,
            ]
        );
    }

    #[test]
    fn test_read_three_bytes_acks_two_then_nacks() {
        let mut engine = MockEngine::new(ADDR).with_registers(0x3B, &[1, 2, 3]);
        let mut buf = [0u8; 3];

        read(&mut engine, &BusConfig::DEFAULT, ADDR, 0x3B, &mut buf).unwrap();

        assert_eq!(buf, [1, 2, 3]);
        let ops = engine.last_transaction().unwrap();
        assert_eq!(
            &ops[5..],
            &[
                Op::Read { len: 2, ack: Ack::Ack },
                Op::Read { len: 1, ack: Ack::Nack },
                Op::Stop,
            ]
        );
    }

    #[test]
    fn test_write_single_byte() {
        let mut engine = MockEngine::new(ADDR);

        write(&mut engine, &BusConfig::DEFAULT, ADDR, 0x6B, &[0x80]).unwrap();

        assert_eq!(engine.register(0x6B), 0x80);
        let ops = engine.last_transaction().unwrap();
        assert_eq!(&ops[..3], &write_select());
        assert_eq!(&ops[3..], &[Op::Write { len: 1, ack: Ack::Nack }, Op::Stop]);
    }

    #[test]
    fn test_write_four_bytes() {
        let mut engine = MockEngine::new(ADDR);

        write(&mut engine, &BusConfig::DEFAULT, ADDR, 0x13, &[9, 8, 7, 6]).unwrap();

        assert_eq!(engine.register(0x13), 9);
        assert_eq!(engine.register(0x16), 6);
        let ops = engine.last_transaction().unwrap();
        assert_eq!(&ops[..3], &write_select());
        assert_eq!(
            &ops[3..],
            &[
                Op::Write { len: 3, ack: Ack::Ack },
                Op::Write { len: 1, ack: Ack::Nack },
                Op::Stop,
            ]
        );
    }

    #[test]
    fn test_zero_length_rejected() {
        let mut engine = MockEngine::new(ADDR);
        let config = BusConfig::DEFAULT;

        assert_eq!(
            read(&mut engine, &config, ADDR, 0, &mut []),
            Err(Error::InvalidBufferSize)
        );
        assert_eq!(write(&mut engine, &config, ADDR, 0, &[]), Err(Error::InvalidBufferSize));
        assert_eq!(engine.commits(), 0);
    }

    #[test]
    fn test_zero_length_ignored() {
        let mut engine = MockEngine::new(ADDR);
        let config = BusConfig::LENIENT;

        assert_eq!(read(&mut engine, &config, ADDR, 0, &mut []), Ok(()));
        assert_eq!(write(&mut engine, &config, ADDR, 0, &[]), Ok(()));
        assert_eq!(engine.commits(), 0);
    }

    #[test]
    fn test_failure_propagates() {
        let mut engine = MockEngine::new(ADDR);
        engine.fail_next(MockError::Timeout);
        let mut buf = [0u8; 2];

        assert_eq!(
            read(&mut engine, &BusConfig::DEFAULT, ADDR, 0, &mut buf),
            Err(Error::TransactionFailed(MockError::Timeout))
        );
        // Absent device
        assert_eq!(
            write_byte(&mut engine, &BusConfig::DEFAULT, 0x69, 0, 1),
            Err(Error::TransactionFailed(MockError::Nack))
        );
    }

    #[test]
    fn test_timeout_forwarded() {
        let mut engine = MockEngine::new(ADDR);
        let config = BusConfig::DEFAULT.with_timeout_ms(25);

        write_byte(&mut engine, &config, ADDR, 0x10, 0).unwrap();

        assert_eq!(engine.last_timeout_ms(), Some(25));
    }

    #[test]
    fn test_select_moves_pointer_only() {
        let mut engine = MockEngine::new(ADDR).with_registers(0x42, &[0x5A]);

        select(&mut engine, &BusConfig::DEFAULT, ADDR, 0x42).unwrap();

        assert_eq!(engine.pointer(), 0x42);
        assert_eq!(engine.register(0x42), 0x5A);
        assert_eq!(
            engine.last_transaction().unwrap(),
            &[
                Op::Start,
                Op::Address { address: ADDR, direction: Direction::Write },
                Op::Write { len: 1, ack: Ack::Nack },
                Op::Stop,
            ]
        );
    }

    #[test]
    fn test_words() {
        let mut engine = MockEngine::new(ADDR);
        let config = BusConfig::DEFAULT;

        write_word(&mut engine, &config, ADDR, 0x20, 0xBEEF, ByteOrder::BigEndian).unwrap();
        assert_eq!(engine.register(0x20), 0xBE);
        assert_eq!(engine.register(0x21), 0xEF);
        assert_eq!(
            read_word(&mut engine, &config, ADDR, 0x20, ByteOrder::BigEndian),
            Ok(0xBEEF)
        );
        assert_eq!(
            read_word(&mut engine, &config, ADDR, 0x20, ByteOrder::LittleEndian),
            Ok(0xEFBE)
        );
    }

    #[test]
    fn test_byte_helpers() {
        let mut engine = MockEngine::new(ADDR);
        let config = BusConfig::DEFAULT;

        write_byte(&mut engine, &config, ADDR, 0x01, 0xC3).unwrap();
        assert_eq!(read_byte(&mut engine, &config, ADDR, 0x01), Ok(0xC3));
    }
}
