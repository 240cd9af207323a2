//! Two-wire serial bus (clock + data, with chip select and reset)
//!
//! The cartridge EEPROMs sit on an I2C-like synchronous bus, extended with a
//! per-cartridge chip-select line and a reset line used only by the
//! response-to-reset identification sequences. Bytes travel MSB first, one
//! clock pulse per bit; the data line is released rather than driven high so
//! that chip and host can share it open-drain.
//!
//! The two reset sequences are deliberately distinct waveforms: the X76
//! parts use an active-high reset and shift their 32-bit ID out LSB first,
//! the ZS01 uses an active-low reset and shifts MSB first. A chip only
//! answers its own sequence, which is what makes detection possible.

use crate::port::CartPort;

const BUS_DELAY: u32 = 50;
const RESET_DELAY: u32 = 500;

fn sda<P: CartPort>(port: &mut P, high: bool, us: u32) {
    port.set_sda(high);
    if us > 0 {
        port.delay_us(us);
    }
}

fn scl<P: CartPort>(port: &mut P, high: bool, us: u32) {
    port.set_scl(high);
    if us > 0 {
        port.delay_us(us);
    }
}

fn cs<P: CartPort>(port: &mut P, high: bool, us: u32) {
    port.set_cs(high);
    if us > 0 {
        port.delay_us(us);
    }
}

fn reset<P: CartPort>(port: &mut P, high: bool, us: u32) {
    port.set_reset(high);
    if us > 0 {
        port.delay_us(us);
    }
}

/// Drive a START condition (data falling while clock is high)
pub fn start<P: CartPort>(port: &mut P) {
    sda(port, true, 0);
    scl(port, true, BUS_DELAY);

    sda(port, false, BUS_DELAY);
    scl(port, false, BUS_DELAY);
}

/// Drive a START condition framed by a chip-select pulse
///
/// Used for the initial transaction of chips that require explicit
/// per-transaction selection; polling restarts use the bare [`start`].
pub fn start_with_cs<P: CartPort>(port: &mut P, cs_delay: u32) {
    sda(port, true, 0);
    scl(port, false, 0);
    cs(port, true, BUS_DELAY);

    cs(port, false, BUS_DELAY + cs_delay);
    scl(port, true, BUS_DELAY);

    sda(port, false, BUS_DELAY);
    scl(port, false, BUS_DELAY);
}

/// Drive a STOP condition (data rising while clock is high)
pub fn stop<P: CartPort>(port: &mut P) {
    sda(port, false, 0);

    scl(port, true, BUS_DELAY);
    sda(port, true, BUS_DELAY);
}

/// Drive a STOP condition and deselect the chip
pub fn stop_with_cs<P: CartPort>(port: &mut P, cs_delay: u32) {
    sda(port, false, 0);

    scl(port, true, BUS_DELAY);
    sda(port, true, BUS_DELAY);

    scl(port, false, BUS_DELAY + cs_delay);
    cs(port, true, BUS_DELAY);
}

/// Clock in the acknowledge bit after a written byte
///
/// Returns true when the chip pulled the line low. The leading delay before
/// raising the clock is required by the ZS01 and harmless on the X76 parts.
pub fn get_ack<P: CartPort>(port: &mut P) -> bool {
    port.delay_us(BUS_DELAY);

    scl(port, true, BUS_DELAY);
    let ack = port.get_sda();
    scl(port, false, BUS_DELAY * 2);

    !ack
}

/// Drive the acknowledge bit after a read byte
pub fn send_ack<P: CartPort>(port: &mut P, ack: bool) {
    sda(port, !ack, 0);
    scl(port, true, BUS_DELAY);
    scl(port, false, BUS_DELAY);
    sda(port, true, BUS_DELAY);
}

/// Read one byte, MSB first
pub fn read_byte<P: CartPort>(port: &mut P) -> u8 {
    let mut value = 0u8;

    for i in (0..8).rev() {
        scl(port, true, BUS_DELAY);
        value |= (port.get_sda() as u8) << i;
        scl(port, false, BUS_DELAY);
    }

    port.delay_us(BUS_DELAY);
    value
}

/// Write one byte, MSB first, releasing the data line afterwards
pub fn write_byte<P: CartPort>(port: &mut P, value: u8) {
    for i in (0..8).rev() {
        sda(port, (value >> i) & 1 != 0, 0);
        scl(port, true, BUS_DELAY);
        scl(port, false, BUS_DELAY);
    }

    sda(port, true, BUS_DELAY);
}

/// Read a sequence of bytes, acknowledging all but the last
pub fn read_bytes<P: CartPort>(port: &mut P, data: &mut [u8]) {
    let last = data.len().saturating_sub(1);

    for (i, byte) in data.iter_mut().enumerate() {
        *byte = read_byte(port);

        if i < last {
            send_ack(port, true);
        }
    }
}

/// Write a sequence of bytes, checking the acknowledge bit after each
///
/// `last_ack_delay` is inserted before clocking the final byte's acknowledge;
/// the ZS01 needs the extra settling time while it validates a request.
/// Returns false as soon as a byte goes unacknowledged.
pub fn write_bytes<P: CartPort>(port: &mut P, data: &[u8], last_ack_delay: u32) -> bool {
    let last = data.len().saturating_sub(1);

    for (i, &byte) in data.iter().enumerate() {
        write_byte(port, byte);

        if i == last && last_ack_delay > 0 {
            port.delay_us(last_ack_delay);
        }
        if !get_ack(port) {
            return false;
        }
    }

    true
}

/// Run the X76 response-to-reset sequence and shift in the 32-bit ID word
///
/// Active-high reset pulse with one clock while reset is asserted, then the
/// ID is clocked out LSB first with the bit valid while the clock is high.
pub fn reset_x76<P: CartPort>(port: &mut P) -> u32 {
    let mut value = 0u32;

    sda(port, true, 0);
    scl(port, false, 0);
    cs(port, false, 0);
    reset(port, false, 0);

    reset(port, true, RESET_DELAY);
    scl(port, true, BUS_DELAY);
    scl(port, false, BUS_DELAY);
    reset(port, false, RESET_DELAY);

    for i in 0..32 {
        scl(port, true, BUS_DELAY);
        value |= (port.get_sda() as u32) << i;
        scl(port, false, BUS_DELAY);
    }

    cs(port, true, BUS_DELAY);
    scl(port, true, BUS_DELAY);
    value
}

/// Run the ZS01 response-to-reset sequence and shift in the 32-bit ID word
///
/// The ZS01 does not implement the X76 sequence: its reset is active-low,
/// chip select is ignored, and the ID is shifted MSB first with each bit
/// sampled before the clock pulse rather than during it.
pub fn reset_zs01<P: CartPort>(port: &mut P) -> u32 {
    let mut value = 0u32;

    sda(port, true, 0);
    scl(port, false, 0);
    cs(port, false, 0);
    reset(port, true, 0);

    reset(port, false, RESET_DELAY);
    reset(port, true, RESET_DELAY);
    scl(port, true, BUS_DELAY);
    scl(port, false, BUS_DELAY);

    for i in (0..32).rev() {
        value |= (port.get_sda() as u32) << i;
        scl(port, true, BUS_DELAY);
        scl(port, false, BUS_DELAY);
    }

    scl(port, true, BUS_DELAY);
    value
}
