//! cartprobe-linux-gpio - Linux GPIO cartridge port backend
//!
//! Drives a cartridge slot wired to GPIO lines through the Linux GPIO
//! character device interface. Useful for dumping cartridges from a
//! single-board computer with the slot broken out to a header.

mod device;
mod error;

pub use device::{LinuxGpioPort, LinuxGpioPortConfig};
pub use error::{LinuxGpioError, Result};
