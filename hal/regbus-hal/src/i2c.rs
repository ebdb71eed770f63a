//! I2C transaction engine abstractions
//!
//! A [`CommandLink`] is an ordered list of bus primitives (START, address
//! byte, data bytes, STOP). Register drivers queue primitives onto a link
//! and pass it to [`TransactionEngine::commit`], which runs the whole link
//! as one bus transaction.

use core::fmt;

use heapless::Vec;

/// Maximum number of primitives a single command link can hold
///
/// A buffered register read is the longest sequence: start, address,
/// register, repeated start, address, bulk read, final read, stop.
pub const MAX_COMMANDS: usize = 8;

/// Default commit timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u32 = 1000;

/// Identifier of a physical I2C port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusId(pub u8);

/// Transfer direction encoded in the R/W bit of the address byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Direction {
    /// Master transmits
    Write = 0,
    /// Master receives
    Read = 1,
}

impl Direction {
    /// Build the address byte for a 7-bit address
    pub const fn address_byte(self, address: u8) -> u8 {
        (address << 1) | self as u8
    }
}

/// Acknowledge policy for a data byte
///
/// On reads the master sends `Ack` to ask for another byte and `Nack` to
/// end the transfer. On writes `Nack` marks the final byte of the span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ack {
    /// Continue
    Ack,
    /// Terminate
    Nack,
}

/// A single queued bus primitive
#[derive(Debug)]
pub enum Command<'a> {
    /// START or repeated START condition
    Start,
    /// Address byte with direction bit
    Address { address: u8, direction: Direction },
    /// One byte sent by the master
    WriteByte { byte: u8, ack: Ack },
    /// A run of bytes sent by the master, all with the same policy
    Write { bytes: &'a [u8], ack: Ack },
    /// One byte received from the device
    ReadByte { byte: &'a mut u8, ack: Ack },
    /// A run of bytes received from the device, all with the same policy
    Read { buf: &'a mut [u8], ack: Ack },
    /// STOP condition
    Stop,
}

impl Command<'_> {
    /// Number of data bytes this primitive moves on the bus
    pub fn data_len(&self) -> usize {
        match self {
            Command::WriteByte { .. } | Command::ReadByte { .. } => 1,
            Command::Write { bytes, .. } => bytes.len(),
            Command::Read { buf, .. } => buf.len(),
            Command::Start | Command::Address { .. } | Command::Stop => 0,
        }
    }
}

/// Reasons a command link is refused before touching the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// More than [`MAX_COMMANDS`] primitives were queued
    Overflow,
    /// Nothing was queued
    Empty,
    /// The link does not begin with a START
    MissingStart,
    /// A START is not followed by an address byte
    MissingAddress,
    /// An address byte appears without a preceding START
    UnexpectedAddress,
    /// Data moves against the direction of the current address byte
    DirectionMismatch,
    /// A bulk transfer or read phase carries no bytes
    EmptyTransfer,
    /// A read phase does not end with exactly one NACK on its last byte
    AckSequence,
    /// A STOP appears before the end of the link
    MisplacedStop,
    /// The link does not end with a STOP
    MissingStop,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            LinkError::Overflow => "too many commands queued",
            LinkError::Empty => "empty command link",
            LinkError::MissingStart => "link does not begin with START",
            LinkError::MissingAddress => "START not followed by an address byte",
            LinkError::UnexpectedAddress => "address byte without START",
            LinkError::DirectionMismatch => "data against transfer direction",
            LinkError::EmptyTransfer => "transfer with no bytes",
            LinkError::AckSequence => "read phase not terminated by a single NACK",
            LinkError::MisplacedStop => "STOP before end of link",
            LinkError::MissingStop => "link does not end with STOP",
        };
        f.write_str(msg)
    }
}

/// Position of the validator within a link
#[derive(Clone, Copy)]
enum Phase {
    Idle,
    Started,
    Writing,
    Reading { bytes: usize, terminated: bool },
}

impl Phase {
    /// Checks that may leave the current phase (repeated START or STOP)
    fn close(self) -> Result<(), LinkError> {
        match self {
            Phase::Idle => Err(LinkError::MissingStart),
            Phase::Started => Err(LinkError::MissingAddress),
            Phase::Writing => Ok(()),
            Phase::Reading { bytes: 0, .. } => Err(LinkError::EmptyTransfer),
            Phase::Reading { terminated, .. } => {
                if terminated {
                    Ok(())
                } else {
                    Err(LinkError::AckSequence)
                }
            }
        }
    }
}

/// An ordered list of bus primitives executed as one transaction
///
/// Queue operations never fail. Queuing more than [`MAX_COMMANDS`]
/// primitives marks the link as overflowed and [`CommandLink::validate`]
/// rejects it, so an engine never runs a truncated sequence.
#[derive(Debug, Default)]
pub struct CommandLink<'a> {
    commands: Vec<Command<'a>, MAX_COMMANDS>,
    overflowed: bool,
}

impl<'a> CommandLink<'a> {
    /// Begin a new, empty transaction
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            overflowed: false,
        }
    }

    fn push(&mut self, command: Command<'a>) -> &mut Self {
        if self.commands.push(command).is_err() {
            self.overflowed = true;
        }
        self
    }

    /// Queue a START (or repeated START) condition
    pub fn start(&mut self) -> &mut Self {
        self.push(Command::Start)
    }

    /// Queue the address byte for a 7-bit device address
    pub fn address(&mut self, address: u8, direction: Direction) -> &mut Self {
        self.push(Command::Address { address, direction })
    }

    /// Queue one byte to send
    pub fn write_byte(&mut self, byte: u8, ack: Ack) -> &mut Self {
        self.push(Command::WriteByte { byte, ack })
    }

    /// Queue a run of bytes to send
    pub fn write(&mut self, bytes: &'a [u8], ack: Ack) -> &mut Self {
        self.push(Command::Write { bytes, ack })
    }

    /// Queue one byte to receive
    pub fn read_byte(&mut self, byte: &'a mut u8, ack: Ack) -> &mut Self {
        self.push(Command::ReadByte { byte, ack })
    }

    /// Queue a run of bytes to receive
    pub fn read(&mut self, buf: &'a mut [u8], ack: Ack) -> &mut Self {
        self.push(Command::Read { buf, ack })
    }

    /// Queue a STOP condition
    pub fn stop(&mut self) -> &mut Self {
        self.push(Command::Stop)
    }

    /// Queued primitives in bus order
    pub fn commands(&self) -> &[Command<'a>] {
        &self.commands
    }

    /// Queued primitives in bus order, with access to the read buffers
    pub fn commands_mut(&mut self) -> &mut [Command<'a>] {
        &mut self.commands
    }

    /// Number of queued primitives
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True if nothing has been queued
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// True if a queue operation was dropped for lack of space
    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Check that the link is a well-formed I2C transaction
    ///
    /// Rules:
    /// - starts with START and ends with a single STOP
    /// - every START is followed by an address byte
    /// - data moves in the direction of the most recent address byte
    /// - every read phase moves at least one byte and only its final byte
    ///   carries NACK
    pub fn validate(&self) -> Result<(), LinkError> {
        if self.overflowed {
            return Err(LinkError::Overflow);
        }
        let last = self.commands.len().checked_sub(1).ok_or(LinkError::Empty)?;

        let mut phase = Phase::Idle;
        for (index, command) in self.commands.iter().enumerate() {
            phase = match (phase, command) {
                (Phase::Idle, Command::Start) => Phase::Started,
                (Phase::Idle, _) => return Err(LinkError::MissingStart),

                (Phase::Started, Command::Address { direction, .. }) => match direction {
                    Direction::Write => Phase::Writing,
                    Direction::Read => Phase::Reading {
                        bytes: 0,
                        terminated: false,
                    },
                },
                (Phase::Started, _) => return Err(LinkError::MissingAddress),

                (current, Command::Start) => {
                    current.close()?;
                    Phase::Started
                }
                (current, Command::Stop) => {
                    if index != last {
                        return Err(LinkError::MisplacedStop);
                    }
                    current.close()?;
                    Phase::Idle
                }
                (_, Command::Address { .. }) => return Err(LinkError::UnexpectedAddress),

                (Phase::Writing, Command::WriteByte { .. }) => Phase::Writing,
                (Phase::Writing, Command::Write { bytes, .. }) => {
                    if bytes.is_empty() {
                        return Err(LinkError::EmptyTransfer);
                    }
                    Phase::Writing
                }
                (Phase::Writing, _) => return Err(LinkError::DirectionMismatch),

                (Phase::Reading { bytes, terminated }, read) => {
                    let ack = match read {
                        Command::ReadByte { ack, .. } => *ack,
                        Command::Read { buf, ack } => {
                            if buf.is_empty() {
                                return Err(LinkError::EmptyTransfer);
                            }
                            *ack
                        }
                        _ => return Err(LinkError::DirectionMismatch),
                    };
                    // A single NACK ends the phase; a bulk run with NACK
                    // would NACK every byte in it.
                    if terminated
                        || (ack == Ack::Nack && matches!(read, Command::Read { buf, .. } if buf.len() > 1))
                    {
                        return Err(LinkError::AckSequence);
                    }
                    Phase::Reading {
                        bytes: bytes + read.data_len(),
                        terminated: ack == Ack::Nack,
                    }
                }
            };
        }

        match phase {
            Phase::Idle => Ok(()),
            _ => Err(LinkError::MissingStop),
        }
    }
}

/// I2C bus master executing command links
///
/// Implementations run the whole link as one bus transaction and return
/// once it completes, fails or `timeout_ms` elapses. They must refuse links
/// that fail [`CommandLink::validate`].
///
/// No locking happens here: `commit` takes `&mut self`, so exclusive access
/// to the bus is proven by whoever holds the engine.
pub trait TransactionEngine {
    /// Error type for failed transactions
    type Error;

    /// Port this engine drives
    fn bus_id(&self) -> BusId {
        BusId::default()
    }

    /// Execute a command link
    ///
    /// # Arguments
    /// * `link` - Primitives to run, consumed by the call
    /// * `timeout_ms` - Upper bound on the wait for the bus
    fn commit(&mut self, link: CommandLink<'_>, timeout_ms: u32) -> Result<(), Self::Error>;
}

impl<T: TransactionEngine + ?Sized> TransactionEngine for &mut T {
    type Error = T::Error;

    fn bus_id(&self) -> BusId {
        T::bus_id(self)
    }

    fn commit(&mut self, link: CommandLink<'_>, timeout_ms: u32) -> Result<(), Self::Error> {
        T::commit(self, link, timeout_ms)
    }
}
