//! Linux GPIO cartridge port implementation
//!
//! This module provides the `LinuxGpioPort` struct that implements the core
//! port traits using Linux's GPIO character device interface (gpiocdev).
//!
//! The two data lines (serial data and the 1-wire ID pin) are open drain on
//! the cartridge connector. The character device interface cannot read back
//! an output line's real level on all drivers, so both lines are emulated
//! the reliable way: configured as inputs while released and reconfigured
//! as driven-low outputs while asserted. Clock, chip select and reset are
//! plain push-pull outputs, and the insertion-detect signal is an input.
//!
//! Delays are busy-waited on the monotonic clock; `thread::sleep` cannot be
//! trusted at the tens-of-microseconds scale the bus timing needs.

use std::time::Instant;

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use cartprobe_core::port::{CartPort, OneWirePort};

use crate::error::{LinuxGpioError, Result};

/// Configuration for opening a Linux GPIO cartridge port
#[derive(Debug, Clone)]
pub struct LinuxGpioPortConfig {
    /// Device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// Serial data line offset (open drain)
    pub sda: Offset,
    /// Serial clock line offset
    pub scl: Offset,
    /// Chip select line offset
    pub cs: Offset,
    /// Reset line offset
    pub reset: Offset,
    /// Cartridge 1-wire ID pin offset (open drain)
    pub onewire: Offset,
    /// Insertion-detect input offset
    pub present: Offset,
}

impl LinuxGpioPortConfig {
    /// Create a configuration with all line offsets
    pub fn new(
        device: impl Into<String>,
        sda: Offset,
        scl: Offset,
        cs: Offset,
        reset: Offset,
        onewire: Offset,
        present: Offset,
    ) -> Self {
        Self {
            device: device.into(),
            sda,
            scl,
            cs,
            reset,
            onewire,
            present,
        }
    }
}

/// Linux GPIO cartridge port
///
/// Implements [`CartPort`] and [`OneWirePort`] by bit-banging the slot's
/// lines through a gpiocdev line request.
pub struct LinuxGpioPort {
    request: Request,
    config: LinuxGpioPortConfig,
    sda_released: bool,
    onewire_released: bool,
}

impl LinuxGpioPort {
    /// Open a Linux GPIO cartridge port with the given configuration
    pub fn open(config: &LinuxGpioPortConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxGpioError::NoDevice);
        }

        log::debug!("linux_gpio: opening device {}", config.device);

        // Idle bus state: both data lines released (inputs), clock low,
        // chip deselected, reset deasserted.
        let mut req_config = Config::default();
        req_config.with_line(config.sda).as_input();
        req_config.with_line(config.onewire).as_input();
        req_config.with_line(config.scl).as_output(Value::Inactive);
        req_config.with_line(config.cs).as_output(Value::Active);
        req_config
            .with_line(config.reset)
            .as_output(Value::Inactive);
        req_config.with_line(config.present).as_input();

        let request = Request::from_config(req_config)
            .on_chip(&config.device)
            .with_consumer("cartprobe")
            .request()
            .map_err(LinuxGpioError::LineRequestFailed)?;

        log::info!(
            "linux_gpio: opened {} (sda={}, scl={}, cs={}, reset={}, onewire={}, present={})",
            config.device,
            config.sda,
            config.scl,
            config.cs,
            config.reset,
            config.onewire,
            config.present,
        );

        Ok(Self {
            request,
            config: config.clone(),
            sda_released: true,
            onewire_released: true,
        })
    }

    fn set_output(&self, offset: Offset, high: bool) {
        let value = if high { Value::Active } else { Value::Inactive };

        if let Err(e) = self.request.set_value(offset, value) {
            log::error!("Failed to set GPIO line {}: {}", offset, e);
        }
    }

    fn get_input(&self, offset: Offset) -> bool {
        match self.request.value(offset) {
            Ok(value) => value == Value::Active,
            Err(e) => {
                log::error!("Failed to get GPIO line {}: {}", offset, e);
                true
            }
        }
    }

    /// Release (input) or assert low (output) an open-drain line
    fn set_open_drain(&self, offset: Offset, released: bool) {
        let mut cfg = Config::default();

        if released {
            cfg.with_line(offset).as_input();
        } else {
            cfg.with_line(offset).as_output(Value::Inactive);
        }

        if let Err(e) = self.request.reconfigure(&cfg) {
            log::error!("Failed to reconfigure GPIO line {}: {}", offset, e);
        }
    }
}

impl OneWirePort for LinuxGpioPort {
    fn set_pin(&mut self, high: bool) {
        if self.onewire_released == high {
            return;
        }
        self.onewire_released = high;
        self.set_open_drain(self.config.onewire, high);
    }

    fn get_pin(&mut self) -> bool {
        self.get_input(self.config.onewire)
    }

    fn delay_us(&mut self, us: u32) {
        let start = Instant::now();
        let target = us as u128;

        while start.elapsed().as_micros() < target {
            std::hint::spin_loop();
        }
    }
}

impl CartPort for LinuxGpioPort {
    fn set_sda(&mut self, high: bool) {
        if self.sda_released == high {
            return;
        }
        self.sda_released = high;
        self.set_open_drain(self.config.sda, high);
    }

    fn get_sda(&mut self) -> bool {
        self.get_input(self.config.sda)
    }

    fn set_scl(&mut self, high: bool) {
        self.set_output(self.config.scl, high);
    }

    fn set_cs(&mut self, high: bool) {
        self.set_output(self.config.cs, high);
    }

    fn set_reset(&mut self, high: bool) {
        self.set_output(self.config.reset, high);
    }

    fn cart_present(&mut self) -> bool {
        self.get_input(self.config.present)
    }
}
