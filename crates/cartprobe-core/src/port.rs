//! Port trait definitions
//!
//! A *port* is the set of GPIO-level pin operations plus a calibrated
//! busy-wait delay that the bit-banged buses are built on. Implementations
//! range from memory-mapped I/O on the real hardware to a Linux GPIO
//! character device or the fully emulated slot used in tests.
//!
//! All bus timing flows through [`OneWirePort::delay_us`], so substituting a
//! deterministic fake clock is enough to make the whole protocol stack run
//! in a unit test.

/// Single-wire ID-chip bus pin access
///
/// The data line is open drain: `set_pin(false)` pulls it low,
/// `set_pin(true)` releases it and lets the pull-up (or the chip) determine
/// the level read back by `get_pin`.
pub trait OneWirePort {
    /// Drive the data line low (`false`) or release it (`true`)
    fn set_pin(&mut self, high: bool);

    /// Sample the data line
    fn get_pin(&mut self) -> bool;

    /// Busy-wait for the specified number of microseconds
    fn delay_us(&mut self, us: u32);

    /// Optional: enter a jitter-free section
    ///
    /// Single-shot waveforms (1-wire ID reads, reset/ID probes) sample bits
    /// with no retry available, so implementations running under a scheduler
    /// should suspend preemption here. Bulk transfers do not need this; their
    /// protocols fail cleanly on timing noise.
    fn request_bus(&mut self) {}

    /// Optional: leave a jitter-free section
    fn release_bus(&mut self) {}
}

/// Cartridge slot pin access
///
/// Extends [`OneWirePort`] (whose pin is the cartridge's 1-wire ID chip)
/// with the two-wire serial bus lines and the insertion-detect signal.
///
/// The serial data line is open drain like the 1-wire pin; the clock,
/// chip-select and reset lines are push-pull outputs driven only by the
/// host.
pub trait CartPort: OneWirePort {
    /// Drive the serial data line low (`false`) or release it (`true`)
    fn set_sda(&mut self, high: bool);

    /// Sample the serial data line
    fn get_sda(&mut self) -> bool;

    /// Set the serial clock line
    fn set_scl(&mut self, high: bool);

    /// Set the chip select line
    fn set_cs(&mut self, high: bool);

    /// Set the reset line
    fn set_reset(&mut self, high: bool);

    /// Sample the cartridge insertion signal
    ///
    /// When this is false no chip probing may take place at all; the bus
    /// lines must be left alone.
    fn cart_present(&mut self) -> bool;
}

impl<P: OneWirePort + ?Sized> OneWirePort for &mut P {
    fn set_pin(&mut self, high: bool) {
        (**self).set_pin(high)
    }

    fn get_pin(&mut self) -> bool {
        (**self).get_pin()
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }

    fn request_bus(&mut self) {
        (**self).request_bus()
    }

    fn release_bus(&mut self) {
        (**self).release_bus()
    }
}

impl<P: CartPort + ?Sized> CartPort for &mut P {
    fn set_sda(&mut self, high: bool) {
        (**self).set_sda(high)
    }

    fn get_sda(&mut self) -> bool {
        (**self).get_sda()
    }

    fn set_scl(&mut self, high: bool) {
        (**self).set_scl(high)
    }

    fn set_cs(&mut self, high: bool) {
        (**self).set_cs(high)
    }

    fn set_reset(&mut self, high: bool) {
        (**self).set_reset(high)
    }

    fn cart_present(&mut self) -> bool {
        (**self).cart_present()
    }
}
