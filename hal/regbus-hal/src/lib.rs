//! regbus Hardware Abstraction Layer
//!
//! This crate defines the contract between register drivers and the I2C
//! master driver underneath them. Drivers describe a bus transaction as a
//! [`CommandLink`] of primitives and hand it to a [`TransactionEngine`],
//! which executes it atomically with a bounded wait.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Register drivers (regbus-core, etc.)   │
//! └─────────────────────────────────────────┘
//!                     │  CommandLink
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  regbus-hal (this crate - contract)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ regbus-hal-   │       │  mock engine  │
//! │   embedded    │       │ (host tests)  │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Features
//!
//! - `defmt` - Derive `defmt::Format` on public types
//! - `mock` - Enable `mock::MockEngine`, a simulated register-file device

#![no_std]
#![deny(unsafe_code)]

pub mod i2c;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export key types at crate root for convenience
pub use i2c::{
    Ack, BusId, Command, CommandLink, Direction, LinkError, TransactionEngine,
    DEFAULT_TIMEOUT_MS, MAX_COMMANDS,
};
