//! Drivers for the X76F041 and X76F100 authenticated EEPROMs
//!
//! Both chips share one transaction shape: a select-framed command byte
//! (plus an address parameter on the X76F041), the 8-byte key, then bounded
//! ACK polling while the chip verifies the key and finishes any internal
//! write cycle. A chip holding a different key simply never acknowledges
//! the poll byte, so a poll timeout is the de-facto "wrong key" signal.
//!
//! Neither chip offers an unprivileged read. The X76F041 keeps a failed-
//! attempt counter on protected blocks with no way for the host to know in
//! advance which blocks are protected, and the X76F100 has no keyless mode
//! at all, so every read here goes through the full handshake.

use crate::bus::serial;
use crate::driver::{read_cart_onewire_id, CartDriver};
use crate::dump::{CartDump, ChipType, DumpFlags};
use crate::error::{Error, Result};
use crate::port::CartPort;

const MAX_ACK_POLLS: u32 = 5;
const WRITE_DELAY: u32 = 12_000;
const PACKET_DELAY: u32 = 12_000;

/// X76F041 command bytes
mod f041_cmd {
    pub const READ: u8 = 0x60;
    pub const WRITE: u8 = 0x40;
    pub const CONFIG: u8 = 0x80;
    pub const ACK_POLL: u8 = 0xc0;
}

/// X76F041 configuration sub-protocol op-codes (passed as the parameter
/// byte of a CONFIG command)
mod f041_cfg {
    pub const SET_DATA_KEY: u8 = 0x20;
    pub const READ_CONFIG: u8 = 0x60;
    pub const WRITE_CONFIG: u8 = 0x50;
    pub const MASS_PROGRAM: u8 = 0x70;
}

/// X76F100 command bytes
mod f100_cmd {
    pub const READ: u8 = 0x81;
    pub const WRITE: u8 = 0x80;
    pub const SET_KEY: u8 = 0xfc;
    pub const ACK_POLL: u8 = 0x55;
}

/// Issue a command + key transaction and poll for the acknowledge
///
/// Only the initial transaction is select-framed; each poll attempt restarts
/// from a bare START so the chip's internal state machine keeps running.
/// On success the bus is left mid-transaction, ready for the data phase.
fn x76_command<P: CartPort>(
    port: &mut P,
    key: &[u8; 8],
    poll_byte: u8,
    cmd: u8,
    param: Option<u8>,
) -> Result<()> {
    port.delay_us(PACKET_DELAY);
    serial::start_with_cs(port, 0);

    serial::write_byte(port, cmd);
    if !serial::get_ack(port) {
        serial::stop_with_cs(port, 0);
        log::debug!("NACK while sending cmd=0x{:02x}", cmd);
        return Err(Error::AuthNack);
    }

    if let Some(param) = param {
        serial::write_byte(port, param);
        if !serial::get_ack(port) {
            serial::stop_with_cs(port, 0);
            log::debug!("NACK while sending param=0x{:02x}", param);
            return Err(Error::AuthNack);
        }
    }

    if !serial::write_bytes(port, key, 0) {
        serial::stop_with_cs(port, 0);
        log::debug!("NACK while sending data key");
        return Err(Error::AuthNack);
    }

    for _ in 0..MAX_ACK_POLLS {
        port.delay_us(WRITE_DELAY);
        serial::start(port);
        serial::write_byte(port, poll_byte);
        if serial::get_ack(port) {
            return Ok(());
        }
    }

    serial::stop_with_cs(port, 0);
    log::debug!("ACK polling timeout (wrong key?)");
    Err(Error::AuthPollTimeout)
}

/// Driver for the X76F041 (512-byte array, configuration registers)
pub struct X76f041Driver<P: CartPort> {
    port: P,
}

impl<P: CartPort> X76f041Driver<P> {
    /// Bind a driver to the port and mark the dump's chip type
    pub fn new(port: P, dump: &mut CartDump) -> Self {
        dump.chip_type = ChipType::X76F041;
        dump.flags = DumpFlags::empty();

        Self { port }
    }

    fn command(&mut self, key: &[u8; 8], cmd: u8, param: u8) -> Result<()> {
        x76_command(&mut self.port, key, f041_cmd::ACK_POLL, cmd, Some(param))
    }

    fn read_config_registers(&mut self, dump: &mut CartDump) -> Result<()> {
        self.command(&dump.data_key, f041_cmd::CONFIG, f041_cfg::READ_CONFIG)?;

        dump.config = [0; 8];
        serial::read_bytes(&mut self.port, &mut dump.config[..5]);
        serial::stop_with_cs(&mut self.port, 0);

        dump.flags |= DumpFlags::CONFIG_OK;
        Ok(())
    }

    fn write_config_registers(&mut self, dump: &CartDump) -> Result<()> {
        self.command(&dump.data_key, f041_cmd::CONFIG, f041_cfg::WRITE_CONFIG)?;

        let ok = serial::write_bytes(&mut self.port, &dump.config[..5], 0);
        serial::stop_with_cs(&mut self.port, WRITE_DELAY);

        if !ok {
            log::debug!("NACK while sending config registers");
            return Err(Error::AuthNack);
        }

        Ok(())
    }
}

impl<P: CartPort> CartDriver for X76f041Driver<P> {
    fn chip_type(&self) -> ChipType {
        ChipType::X76F041
    }

    fn read_cart_id(&mut self, dump: &mut CartDump) -> Result<()> {
        read_cart_onewire_id(&mut self.port, dump)
    }

    fn read_private_data(&mut self, dump: &mut CartDump) -> Result<()> {
        // Reads can use any block size but cannot cross 128-byte boundaries,
        // and each 128-byte block needs its own authenticated setup.
        for i in (0..512).step_by(128) {
            self.command(
                &dump.data_key,
                f041_cmd::READ | (i >> 8) as u8,
                (i & 0xff) as u8,
            )?;

            serial::read_byte(&mut self.port); // Ignore "secure read setup" byte
            serial::start(&mut self.port);

            serial::write_byte(&mut self.port, (i & 0xff) as u8);
            if !serial::get_ack(&mut self.port) {
                serial::stop_with_cs(&mut self.port, 0);
                log::debug!("NACK after resending addr=0x{:02x}", i & 0xff);
                return Err(Error::AuthNack);
            }

            serial::read_bytes(&mut self.port, &mut dump.data[i..i + 128]);
            serial::stop_with_cs(&mut self.port, 0);
        }

        dump.flags |= DumpFlags::PRIVATE_DATA_OK;

        self.read_config_registers(dump)
    }

    fn write_data(&mut self, dump: &mut CartDump) -> Result<()> {
        // Writes can only be done in 8-byte blocks.
        for i in (0..512).step_by(8) {
            self.command(
                &dump.data_key,
                f041_cmd::WRITE | (i >> 8) as u8,
                (i & 0xff) as u8,
            )?;

            let ok = serial::write_bytes(&mut self.port, &dump.data[i..i + 8], 0);
            serial::stop_with_cs(&mut self.port, WRITE_DELAY);

            if !ok {
                log::debug!("NACK while sending data bytes");
                return Err(Error::AuthNack);
            }
        }

        self.write_config_registers(dump)
    }

    fn erase(&mut self, dump: &mut CartDump) -> Result<()> {
        self.command(&dump.data_key, f041_cmd::CONFIG, f041_cfg::MASS_PROGRAM)?;

        serial::stop_with_cs(&mut self.port, WRITE_DELAY);

        dump.clear_key();
        Ok(())
    }

    fn read_config(&mut self, dump: &mut CartDump) -> Result<()> {
        self.read_config_registers(dump)
    }

    fn write_config(&mut self, dump: &mut CartDump) -> Result<()> {
        self.write_config_registers(dump)
    }

    fn set_data_key(&mut self, dump: &mut CartDump, key: &[u8; 8]) -> Result<()> {
        self.command(&dump.data_key, f041_cmd::CONFIG, f041_cfg::SET_DATA_KEY)?;

        // The chip requires the key twice in a row as its only transmission
        // integrity check; it does not checksum the new key otherwise.
        for _ in 0..2 {
            if !serial::write_bytes(&mut self.port, key, 0) {
                serial::stop_with_cs(&mut self.port, WRITE_DELAY);
                log::debug!("NACK while setting new data key");
                return Err(Error::AuthNack);
            }
        }

        serial::stop_with_cs(&mut self.port, WRITE_DELAY);

        dump.data_key = *key;
        Ok(())
    }
}

/// Driver for the X76F100 (flat 112-byte array, dual key slots)
pub struct X76f100Driver<P: CartPort> {
    port: P,
}

impl<P: CartPort> X76f100Driver<P> {
    /// Bind a driver to the port and mark the dump's chip type
    pub fn new(port: P, dump: &mut CartDump) -> Self {
        dump.chip_type = ChipType::X76F100;
        dump.flags = DumpFlags::empty();

        Self { port }
    }

    fn command(&mut self, key: &[u8; 8], cmd: u8) -> Result<()> {
        x76_command(&mut self.port, key, f100_cmd::ACK_POLL, cmd, None)
    }

    fn write_block(&mut self, key: &[u8; 8], offset: usize, block: &[u8]) -> Result<()> {
        self.command(key, f100_cmd::WRITE | (offset >> 2) as u8)?;

        let ok = serial::write_bytes(&mut self.port, block, 0);
        serial::stop_with_cs(&mut self.port, WRITE_DELAY);

        if !ok {
            log::debug!("NACK while sending data bytes");
            return Err(Error::AuthNack);
        }

        Ok(())
    }

    fn set_key_slots(&mut self, dump: &mut CartDump, key: &[u8; 8]) -> Result<()> {
        // There are two separate keys, one gating reads and one gating
        // writes; keep them programmed to the same value.
        for slot in 0u8..2 {
            self.command(&dump.data_key, f100_cmd::SET_KEY | (slot << 1))?;

            let ok = serial::write_bytes(&mut self.port, key, 0);
            serial::stop_with_cs(&mut self.port, WRITE_DELAY);

            if !ok {
                log::debug!("NACK while setting new data key");
                return Err(Error::AuthNack);
            }
        }

        dump.data_key = *key;
        Ok(())
    }
}

impl<P: CartPort> CartDriver for X76f100Driver<P> {
    fn chip_type(&self) -> ChipType {
        ChipType::X76F100
    }

    fn read_cart_id(&mut self, dump: &mut CartDump) -> Result<()> {
        read_cart_onewire_id(&mut self.port, dump)
    }

    fn read_private_data(&mut self, dump: &mut CartDump) -> Result<()> {
        self.command(&dump.data_key, f100_cmd::READ)?;

        serial::read_bytes(&mut self.port, &mut dump.data[..112]);
        serial::stop_with_cs(&mut self.port, 0);

        dump.flags |= DumpFlags::PRIVATE_DATA_OK;
        Ok(())
    }

    fn write_data(&mut self, dump: &mut CartDump) -> Result<()> {
        // Writes can only be done in 8-byte blocks.
        for i in (0..112).step_by(8) {
            let key = dump.data_key;
            self.write_block(&key, i, &dump.data[i..i + 8])?;
        }

        Ok(())
    }

    fn erase(&mut self, dump: &mut CartDump) -> Result<()> {
        // The chip has no erase command; overwrite every block with zeros,
        // then blank both key slots.
        let zero = [0u8; 8];

        for i in (0..112).step_by(8) {
            let key = dump.data_key;
            self.write_block(&key, i, &zero)?;
        }

        self.set_key_slots(dump, &zero)
    }

    fn set_data_key(&mut self, dump: &mut CartDump, key: &[u8; 8]) -> Result<()> {
        self.set_key_slots(dump, key)
    }
}
