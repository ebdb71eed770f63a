//! I2C device wrapper
//!
//! [`Device`] binds a transaction engine to one 7-bit address and exposes
//! the register layer and bit-field accessor as methods. The address is not
//! validated; an absent device shows up as the first transaction's failure.
//!
//! A device may own its engine or borrow it. `&mut E` is itself an engine,
//! so short-lived devices can be built on top of a locked shared bus:
//!
//! ```ignore
//! bus.lock(|engine| {
//!     let mut imu = Device::new(engine, 0x68);
//!     imu.write_field(PWR_MGMT_1, CLKSEL, 1)
//! })
//! ```

use regbus_hal::{BusId, TransactionEngine};

use crate::config::{BusConfig, ByteOrder};
use crate::error::Error;
use crate::field::{self, Bit, BitField};
use crate::register;

/// Peripheral at a fixed address on an I2C bus
#[derive(Debug)]
pub struct Device<E> {
    engine: E,
    address: u8,
    config: BusConfig,
    byte_order: ByteOrder,
}

impl<E: TransactionEngine> Device<E> {
    /// Bind `engine` to a 7-bit device address with the default config
    pub fn new(engine: E, address: u8) -> Self {
        Self {
            engine,
            address,
            config: BusConfig::DEFAULT,
            byte_order: ByteOrder::BigEndian,
        }
    }

    /// Replace the bus configuration
    pub fn with_config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the byte order of 16-bit registers
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// 7-bit device address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Port the device is attached to
    pub fn bus_id(&self) -> BusId {
        self.engine.bus_id()
    }

    /// Active bus configuration
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Byte order used by word accessors
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Access the engine directly
    pub fn engine(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Give the engine back
    pub fn release(self) -> E {
        self.engine
    }

    /// Read consecutive registers starting at `register` into `buffer`
    pub fn read(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), Error<E::Error>> {
        register::read(&mut self.engine, &self.config, self.address, register, buffer)
    }

    /// Write `buffer` to consecutive registers starting at `register`
    pub fn write(&mut self, register: u8, buffer: &[u8]) -> Result<(), Error<E::Error>> {
        register::write(&mut self.engine, &self.config, self.address, register, buffer)
    }

    /// Load the register pointer without transferring data
    pub fn select_register(&mut self, register: u8) -> Result<(), Error<E::Error>> {
        register::select(&mut self.engine, &self.config, self.address, register)
    }

    /// Read a register
    pub fn read_register(&mut self, register: u8) -> Result<u8, Error<E::Error>> {
        register::read_byte(&mut self.engine, &self.config, self.address, register)
    }

    /// Write a register
    pub fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error<E::Error>> {
        register::write_byte(&mut self.engine, &self.config, self.address, register, value)
    }

    /// Read a 16-bit register pair in the device's byte order
    pub fn read_word(&mut self, register: u8) -> Result<u16, Error<E::Error>> {
        register::read_word(
            &mut self.engine,
            &self.config,
            self.address,
            register,
            self.byte_order,
        )
    }

    /// Write a 16-bit register pair in the device's byte order
    pub fn write_word(&mut self, register: u8, value: u16) -> Result<(), Error<E::Error>> {
        register::write_word(
            &mut self.engine,
            &self.config,
            self.address,
            register,
            value,
            self.byte_order,
        )
    }

    /// Read a right-aligned bit-field
    pub fn read_field(&mut self, register: u8, field: BitField) -> Result<u8, Error<E::Error>> {
        field::read_field(&mut self.engine, &self.config, self.address, register, field)
    }

    /// Replace a bit-field, keeping the other bits of the register
    pub fn write_field(
        &mut self,
        register: u8,
        field: BitField,
        value: u8,
    ) -> Result<u8, Error<E::Error>> {
        field::write_field(&mut self.engine, &self.config, self.address, register, field, value)
    }

    /// Set or clear the bits of `mask`, keeping the others
    pub fn update_mask(
        &mut self,
        register: u8,
        mask: u8,
        enable: bool,
    ) -> Result<u8, Error<E::Error>> {
        field::update_mask(&mut self.engine, &self.config, self.address, register, mask, enable)
    }

    /// Apply an AND mask then an OR mask to a register
    ///
    /// Clear bits with zeros in `and_mask`, set bits with ones in `or_mask`.
    pub fn modify_register(
        &mut self,
        register: u8,
        and_mask: u8,
        or_mask: u8,
    ) -> Result<u8, Error<E::Error>> {
        field::modify(&mut self.engine, &self.config, self.address, register, and_mask, or_mask)
    }

    /// Read a single bit
    pub fn read_bit(&mut self, register: u8, bit: Bit) -> Result<bool, Error<E::Error>> {
        Ok(self.read_field(register, bit.field())? != 0)
    }

    /// Write a single bit, keeping the others
    pub fn write_bit(&mut self, register: u8, bit: Bit, value: bool) -> Result<(), Error<E::Error>> {
        self.write_field(register, bit.field(), value as u8)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZeroLengthPolicy;
    use regbus_hal::mock::{MockEngine, MockError};

    const ADDR: u8 = 0x68;
    const PWR_MGMT_1: u8 = 0x6B;
    const WHO_AM_I: u8 = 0x75;

    fn imu() -> Device<MockEngine> {
        Device::new(MockEngine::new(ADDR).with_registers(WHO_AM_I, &[0x68]), ADDR)
    }

    #[test]
    fn test_identity() {
        let engine = MockEngine::new(ADDR).on_bus(BusId(1));
        let device = Device::new(engine, ADDR);

        assert_eq!(device.address(), ADDR);
        assert_eq!(device.bus_id(), BusId(1));
        assert_eq!(device.config(), &BusConfig::DEFAULT);
        assert_eq!(device.byte_order(), ByteOrder::BigEndian);
    }

    #[test]
    fn test_register_access() {
        let mut device = imu();

        assert_eq!(device.read_register(WHO_AM_I), Ok(0x68));
        device.write_register(PWR_MGMT_1, 0x01).unwrap();
        assert_eq!(device.read_register(PWR_MGMT_1), Ok(0x01));

        device.write(0x13, &[1, 2, 3, 4]).unwrap();
        let mut buf = [0u8; 4];
        device.read(0x13, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn test_select_register() {
        let mut device = imu();

        device.select_register(WHO_AM_I).unwrap();

        assert_eq!(device.engine().pointer(), WHO_AM_I);
    }

    #[test]
    fn test_fields_and_bits() {
        let mut device = imu();
        let clksel = BitField::new(2, 3).unwrap();

        device.write_register(PWR_MGMT_1, 0b0100_0000).unwrap();
        assert_eq!(device.write_field(PWR_MGMT_1, clksel, 0b001), Ok(0b0100_0001));
        assert_eq!(device.read_field(PWR_MGMT_1, clksel), Ok(0b001));

        let sleep = Bit::new(6).unwrap();
        assert_eq!(device.read_bit(PWR_MGMT_1, sleep), Ok(true));
        device.write_bit(PWR_MGMT_1, sleep, false).unwrap();
        assert_eq!(device.read_bit(PWR_MGMT_1, sleep), Ok(false));
        assert_eq!(device.read_register(PWR_MGMT_1), Ok(0b0000_0001));
    }

    #[test]
    fn test_bit_access_always_reaches_bus() {
        let mut device = imu();
        device.write_register(0x10, 0xFF).unwrap();
        let top = Bit::new(7).unwrap();

        assert_eq!(device.read_bit(0x10, top), Ok(true));
        device.write_bit(0x10, top, false).unwrap();
        assert_eq!(device.read_register(0x10), Ok(0x7F));

        // write, read, read + write, read
        assert_eq!(device.release().commits(), 5);
    }

    #[test]
    fn test_bit_failure_propagates() {
        let mut device = imu();
        device.engine().fail_next(MockError::Timeout);

        assert_eq!(
            device.read_bit(0x10, Bit::new(0).unwrap()),
            Err(Error::TransactionFailed(MockError::Timeout))
        );
    }

    #[test]
    fn test_mask_helpers() {
        let mut device = imu();
        device.write_register(PWR_MGMT_1, 0xF0).unwrap();

        assert_eq!(device.update_mask(PWR_MGMT_1, 0x0F, true), Ok(0xFF));
        assert_eq!(device.update_mask(PWR_MGMT_1, 0x81, false), Ok(0x7E));
        assert_eq!(device.modify_register(PWR_MGMT_1, 0x0F, 0x80), Ok(0x8E));
    }

    #[test]
    fn test_word_byte_order() {
        let mut device = imu().with_byte_order(ByteOrder::LittleEndian);

        device.write_word(0x40, 0x1234).unwrap();

        assert_eq!(device.read_word(0x40), Ok(0x1234));
        let engine = device.release();
        assert_eq!(engine.register(0x40), 0x34);
        assert_eq!(engine.register(0x41), 0x12);
    }

    #[test]
    fn test_zero_length_policy_follows_config() {
        let mut strict = imu();
        assert_eq!(strict.read(0, &mut []), Err(Error::InvalidBufferSize));

        let mut lenient =
            imu().with_config(BusConfig::DEFAULT.with_zero_length(ZeroLengthPolicy::Ignore));
        assert_eq!(lenient.write(0, &[]), Ok(()));
        assert_eq!(lenient.release().commits(), 0);
    }

    #[test]
    fn test_absent_device() {
        let mut device = Device::new(MockEngine::new(0x20), 0x21);

        assert_eq!(
            device.read_register(0),
            Err(Error::TransactionFailed(MockError::Nack))
        );
    }

    #[test]
    fn test_borrowed_engine() {
        let mut engine = MockEngine::new(ADDR);
        {
            let mut device = Device::new(&mut engine, ADDR);
            device.write_register(0x10, 0xAB).unwrap();
        }
        assert_eq!(engine.register(0x10), 0xAB);
    }
}
