//! Per-bus lock for engines shared between tasks
//!
//! Holding `&mut E` is what makes a read-modify-write safe. [`SharedBus`]
//! hands that exclusive borrow out for the length of a closure, so a
//! composite operation runs start to finish without another task's
//! transaction landing in between.
//!
//! Pick the raw mutex to match the contexts that share the bus:
//! `CriticalSectionRawMutex` across interrupts and cores,
//! `ThreadModeRawMutex` for thread-mode tasks, `NoopRawMutex` when every
//! user runs on one executor.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use regbus_hal::TransactionEngine;

use crate::config::BusConfig;
use crate::device::Device;

/// Transaction engine behind a blocking mutex
pub struct SharedBus<M: RawMutex, E> {
    engine: Mutex<M, RefCell<E>>,
}

impl<M: RawMutex, E: TransactionEngine> SharedBus<M, E> {
    /// Wrap an engine. Usable in a `static`.
    pub const fn new(engine: E) -> Self {
        Self {
            engine: Mutex::new(RefCell::new(engine)),
        }
    }

    /// Run `f` with exclusive access to the engine
    ///
    /// # Panics
    ///
    /// Panics if called again from inside `f`.
    pub fn lock<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        self.engine.lock(|cell| f(&mut *cell.borrow_mut()))
    }

    /// Run `f` against the device at `address` while holding the bus
    ///
    /// # Panics
    ///
    /// Panics if the bus is locked again from inside `f`.
    pub fn device<R>(
        &self,
        address: u8,
        config: BusConfig,
        f: impl FnOnce(&mut Device<&mut E>) -> R,
    ) -> R {
        self.lock(|engine| {
            let mut device = Device::new(engine, address).with_config(config);
            f(&mut device)
        })
    }

    /// Unwrap the engine
    pub fn into_inner(self) -> E {
        self.engine.into_inner().into_inner()
    }
}
