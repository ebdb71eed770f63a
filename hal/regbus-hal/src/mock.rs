//! Simulated register-file device
//!
//! [`MockEngine`] executes command links against 256 bytes of register
//! storage the way most I2C sensors behave: the first byte written after a
//! write-direction address byte loads the register pointer, every later
//! byte is stored at the pointer, and reads return bytes from the pointer.
//! The pointer auto-increments after each data byte.
//!
//! Every committed link is recorded as a list of [`Op`]s so tests can check
//! the exact primitive sequence a driver issued.

use heapless::Vec;

use crate::i2c::{Ack, BusId, Command, CommandLink, Direction, LinkError, TransactionEngine};
use crate::MAX_COMMANDS;

/// Number of committed transactions kept in the history
pub const MAX_RECORDED: usize = 16;

/// Shape of a committed primitive, without buffer contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Op {
    Start,
    Address { address: u8, direction: Direction },
    Write { len: usize, ack: Ack },
    Read { len: usize, ack: Ack },
    Stop,
}

impl From<&Command<'_>> for Op {
    fn from(command: &Command<'_>) -> Self {
        match command {
            Command::Start => Op::Start,
            Command::Address { address, direction } => Op::Address {
                address: *address,
                direction: *direction,
            },
            Command::WriteByte { ack, .. } | Command::Write { ack, .. } => Op::Write {
                len: command.data_len(),
                ack: *ack,
            },
            Command::ReadByte { ack, .. } | Command::Read { ack, .. } => Op::Read {
                len: command.data_len(),
                ack: *ack,
            },
            Command::Stop => Op::Stop,
        }
    }
}

/// Primitive sequence of one committed transaction
pub type Transaction = Vec<Op, MAX_COMMANDS>;

/// Errors reported by the simulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MockError {
    /// No device answered the address byte
    Nack,
    /// Bus wait exceeded the timeout
    Timeout,
    /// The link failed validation
    InvalidLink(LinkError),
}

/// Simulated I2C device behind a transaction engine
#[derive(Debug)]
pub struct MockEngine {
    bus: BusId,
    address: u8,
    registers: [u8; 256],
    pointer: u8,
    history: Vec<Transaction, MAX_RECORDED>,
    commits: usize,
    /// Commits left before an injected failure (0 = next commit fails)
    fail_in: Option<usize>,
    failure: MockError,
    last_timeout_ms: Option<u32>,
}

impl MockEngine {
    /// Create a device answering at `address` with all registers zeroed
    pub fn new(address: u8) -> Self {
        Self {
            bus: BusId::default(),
            address,
            registers: [0; 256],
            pointer: 0,
            history: Vec::new(),
            commits: 0,
            fail_in: None,
            failure: MockError::Nack,
            last_timeout_ms: None,
        }
    }

    /// Report a different port from [`TransactionEngine::bus_id`]
    pub fn on_bus(mut self, bus: BusId) -> Self {
        self.bus = bus;
        self
    }

    /// Preload consecutive registers starting at `start`
    pub fn with_registers(mut self, start: u8, values: &[u8]) -> Self {
        for (offset, &value) in values.iter().enumerate() {
            self.registers[start.wrapping_add(offset as u8) as usize] = value;
        }
        self
    }

    /// Current contents of a register
    pub fn register(&self, register: u8) -> u8 {
        self.registers[register as usize]
    }

    /// Overwrite a register directly, without bus traffic
    pub fn set_register(&mut self, register: u8, value: u8) {
        self.registers[register as usize] = value;
    }

    /// Current register pointer
    pub fn pointer(&self) -> u8 {
        self.pointer
    }

    /// Fail the next commit with `error`
    pub fn fail_next(&mut self, error: MockError) {
        self.fail_after(0, error);
    }

    /// Let `successes` commits through, then fail one with `error`
    pub fn fail_after(&mut self, successes: usize, error: MockError) {
        self.fail_in = Some(successes);
        self.failure = error;
    }

    /// Recorded transactions, oldest first
    pub fn history(&self) -> &[Transaction] {
        &self.history
    }

    /// Most recently committed transaction
    pub fn last_transaction(&self) -> Option<&[Op]> {
        self.history.last().map(|t| t.as_slice())
    }

    /// Forget recorded transactions
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Total number of commits, including failed ones
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Timeout passed to the most recent commit
    pub fn last_timeout_ms(&self) -> Option<u32> {
        self.last_timeout_ms
    }

    fn record(&mut self, link: &CommandLink<'_>) {
        let mut transaction = Transaction::new();
        for command in link.commands() {
            // validated links never exceed MAX_COMMANDS
            let _ = transaction.push(Op::from(command));
        }
        if self.history.is_full() {
            self.history.remove(0);
        }
        let _ = self.history.push(transaction);
    }

    fn take_failure(&mut self) -> Option<MockError> {
        match self.fail_in {
            Some(0) => {
                self.fail_in = None;
                Some(self.failure)
            }
            Some(remaining) => {
                self.fail_in = Some(remaining - 1);
                None
            }
            None => None,
        }
    }

    fn store(&mut self, byte: u8, select: &mut bool) {
        if *select {
            self.pointer = byte;
            *select = false;
        } else {
            self.registers[self.pointer as usize] = byte;
            self.pointer = self.pointer.wrapping_add(1);
        }
    }

    fn load(&mut self) -> u8 {
        let byte = self.registers[self.pointer as usize];
        self.pointer = self.pointer.wrapping_add(1);
        byte
    }
}

impl TransactionEngine for MockEngine {
    type Error = MockError;

    fn bus_id(&self) -> BusId {
        self.bus
    }

    fn commit(&mut self, mut link: CommandLink<'_>, timeout_ms: u32) -> Result<(), MockError> {
        self.commits += 1;
        self.last_timeout_ms = Some(timeout_ms);
        link.validate().map_err(MockError::InvalidLink)?;
        self.record(&link);

        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        let absent = link.commands().iter().any(|command| {
            matches!(command, Command::Address { address, .. } if *address != self.address)
        });
        if absent {
            return Err(MockError::Nack);
        }

        let mut select = false;
        for command in link.commands_mut() {
            match command {
                Command::Start | Command::Stop => {}
                Command::Address { direction, .. } => select = *direction == Direction::Write,
                Command::WriteByte { byte, .. } => self.store(*byte, &mut select),
                Command::Write { bytes, .. } => {
                    for &byte in bytes.iter() {
                        self.store(byte, &mut select);
                    }
                }
                Command::ReadByte { byte, .. } => **byte = self.load(),
                Command::Read { buf, .. } => {
                    for slot in buf.iter_mut() {
                        *slot = self.load();
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_span(engine: &mut MockEngine, register: u8, buf: &mut [u8]) -> Result<(), MockError> {
        let (last, bulk) = buf.split_last_mut().unwrap();
        let mut link = CommandLink::new();
        link.start()
            .address(0x40, Direction::Write)
            .write_byte(register, Ack::Ack)
            .start()
            .address(0x40, Direction::Read);
        if !bulk.is_empty() {
            link.read(bulk, Ack::Ack);
        }
        link.read_byte(last, Ack::Nack).stop();
        engine.commit(link, 1000)
    }

    #[test]
    fn test_register_file_read() {
        let mut engine = MockEngine::new(0x40).with_registers(0x10, &[0xAA, 0xBB, 0xCC]);
        let mut buf = [0u8; 3];

        read_span(&mut engine, 0x10, &mut buf).unwrap();

        assert_eq!(buf, [0xAA, 0xBB, 0xCC]);
        assert_eq!(engine.pointer(), 0x13);
        assert_eq!(engine.last_timeout_ms(), Some(1000));
    }

    #[test]
    fn test_register_file_write() {
        let mut engine = MockEngine::new(0x40);
        let mut link = CommandLink::new();
        link.start()
            .address(0x40, Direction::Write)
            .write_byte(0x20, Ack::Ack)
            .write(&[1, 2], Ack::Ack)
            .write_byte(3, Ack::Nack)
            .stop();

        engine.commit(link, 1000).unwrap();

        assert_eq!(engine.register(0x20), 1);
        assert_eq!(engine.register(0x21), 2);
        assert_eq!(engine.register(0x22), 3);
        assert_eq!(
            engine.last_transaction().unwrap(),
            &[
                Op::Start,
                Op::Address { address: 0x40, direction: Direction::Write },
                Op::Write { len: 1, ack: Ack::Ack },
                Op::Write { len: 2, ack: Ack::Ack },
                Op::Write { len: 1, ack: Ack::Nack },
                Op::Stop,
            ]
        );
    }

    #[test]
    fn test_wrong_address_nacks() {
        let mut engine = MockEngine::new(0x40);
        let mut buf = [0u8; 1];
        let mut link = CommandLink::new();
        link.start()
            .address(0x41, Direction::Read)
            .read(&mut buf, Ack::Nack)
            .stop();

        assert_eq!(engine.commit(link, 1000), Err(MockError::Nack));
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn test_invalid_link_not_recorded() {
        let mut engine = MockEngine::new(0x40);
        let mut link = CommandLink::new();
        link.start().address(0x40, Direction::Write);

        assert_eq!(
            engine.commit(link, 1000),
            Err(MockError::InvalidLink(LinkError::MissingStop))
        );
        assert!(engine.history().is_empty());
        assert_eq!(engine.commits(), 1);
    }

    #[test]
    fn test_failure_injection() {
        let mut engine = MockEngine::new(0x40).with_registers(0, &[7]);
        engine.fail_after(1, MockError::Timeout);
        let mut buf = [0u8; 1];

        assert!(read_span(&mut engine, 0, &mut buf).is_ok());
        assert_eq!(read_span(&mut engine, 0, &mut buf), Err(MockError::Timeout));
        assert!(read_span(&mut engine, 0, &mut buf).is_ok());
        assert_eq!(buf, [7]);
    }

    #[test]
    fn test_history_keeps_latest() {
        let mut engine = MockEngine::new(0x40);
        let mut buf = [0u8; 1];
        for register in 0..(MAX_RECORDED as u8 + 4) {
            read_span(&mut engine, register, &mut buf).unwrap();
        }
        assert_eq!(engine.history().len(), MAX_RECORDED);
        assert_eq!(engine.commits(), MAX_RECORDED + 4);

        engine.clear_history();
        assert!(engine.history().is_empty());
        assert!(engine.last_transaction().is_none());
        assert_eq!(engine.commits(), MAX_RECORDED + 4);
    }
}
