//! Single-wire ID-chip bus (DS2401 silicon serial number)
//!
//! One open-drain line carries everything. Bytes travel LSB first in eight
//! narrow time slots; the bit value is encoded in how long the host holds
//! the line low (short low = 1, long low = 0). Reads are host-initiated
//! short pulses with the chip stretching the low time to signal a 0.
//!
//! These waveforms are single-shot: there is no acknowledge and no retry, so
//! callers wrap full exchanges in `request_bus`/`release_bus` to keep the
//! slot timing jitter-free.

use crate::error::{Error, Result};
use crate::port::OneWirePort;

const RESET_LOW_TIME: u32 = 480;
const RESET_SAMPLE_DELAY: u32 = 70;
const RESET_DELAY: u32 = 410;

const READ_LOW_TIME: u32 = 3;
const READ_SAMPLE_DELAY: u32 = 10;
const READ_DELAY: u32 = 53;

const ZERO_LOW_TIME: u32 = 65;
const ZERO_HIGH_TIME: u32 = 5;
const ONE_LOW_TIME: u32 = 10;
const ONE_HIGH_TIME: u32 = 55;

/// ROM command accepted by the ID chips
const CMD_READ_ROM: u8 = 0x33;

fn set<P: OneWirePort>(port: &mut P, high: bool, us: u32) {
    port.set_pin(high);
    port.delay_us(us);
}

/// Issue a bus reset and sample the presence pulse
///
/// Returns true when a chip pulled the line low in the presence window.
pub fn reset<P: OneWirePort>(port: &mut P) -> bool {
    set(port, false, RESET_LOW_TIME);
    set(port, true, RESET_SAMPLE_DELAY);
    let present = port.get_pin();

    port.delay_us(RESET_DELAY);
    !present
}

/// Read one byte, LSB first
pub fn read_byte<P: OneWirePort>(port: &mut P) -> u8 {
    let mut value = 0u8;

    for i in 0..8 {
        set(port, false, READ_LOW_TIME);
        set(port, true, READ_SAMPLE_DELAY);
        value |= (port.get_pin() as u8) << i;
        port.delay_us(READ_DELAY);
    }

    value
}

/// Write one byte, LSB first
pub fn write_byte<P: OneWirePort>(port: &mut P, value: u8) {
    let mut value = value;

    for _ in 0..8 {
        if value & 1 != 0 {
            set(port, false, ONE_LOW_TIME);
            set(port, true, ONE_HIGH_TIME);
        } else {
            set(port, false, ZERO_LOW_TIME);
            set(port, true, ZERO_HIGH_TIME);
        }

        value >>= 1;
    }
}

/// Read the chip's 8-byte ROM (family code, serial number, checksum)
///
/// The whole exchange runs as one jitter-free section. The returned bytes
/// are raw; checksum validation is up to the caller.
pub fn read_rom<P: OneWirePort>(port: &mut P) -> Result<[u8; 8]> {
    port.request_bus();

    if !reset(port) {
        port.release_bus();

        log::debug!("no 1-wire device found");
        return Err(Error::NoDevice);
    }

    write_byte(port, CMD_READ_ROM);

    let mut rom = [0u8; 8];
    for byte in rom.iter_mut() {
        *byte = read_byte(port);
    }

    port.release_bus();
    Ok(rom)
}
