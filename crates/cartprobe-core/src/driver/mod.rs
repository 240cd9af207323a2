//! Cartridge drivers and chip detection
//!
//! One flat [`CartDriver`] trait fronts the three incompatible wire
//! protocols. Every operation takes the caller-owned [`CartDump`] and
//! returns a plain error code; operations a chip cannot perform fall
//! through to the default [`Error::UnsupportedOp`] implementations.
//!
//! [`detect`] probes the slot with the two mutually exclusive reset
//! sequences and hands back the matching driver, or [`NullDriver`] when
//! nothing (or nothing recognizable) is plugged in.

mod x76;
mod zs01;

pub use x76::{X76f041Driver, X76f100Driver};
pub use zs01::Zs01Driver;

use crate::bus::onewire;
#[cfg(feature = "alloc")]
use crate::bus::serial;
use crate::dump::{CartDump, ChipType, DumpFlags, Identifier};
use crate::error::{Error, Result};
#[cfg(feature = "alloc")]
use crate::port::CartPort;
use crate::port::OneWirePort;

/// Response-to-reset ID words of the supported chips
#[cfg_attr(not(feature = "alloc"), allow(dead_code))]
mod id {
    pub const X76F041: u32 = 0x55aa5519;
    pub const X76F100: u32 = 0x55aa0019;
    pub const ZS01: u32 = 0x5a530001;
}

/// Uniform interface over the three cartridge chip families
///
/// Operations mutate the caller-owned dump in place. Default
/// implementations answer [`Error::UnsupportedOp`]; each driver overrides
/// exactly the set its physical chip supports.
pub trait CartDriver {
    /// Chip family this driver is bound to
    fn chip_type(&self) -> ChipType;

    /// Read and validate the cartridge's DS2401 serial number
    fn read_cart_id(&mut self, _dump: &mut CartDump) -> Result<()> {
        Err(Error::UnsupportedOp)
    }

    /// Read and validate the chip's internal identifier (ZS01 only)
    fn read_internal_id(&mut self, _dump: &mut CartDump) -> Result<()> {
        Err(Error::UnsupportedOp)
    }

    /// Read the unprivileged payload region (ZS01 only)
    fn read_public_data(&mut self, _dump: &mut CartDump) -> Result<()> {
        Err(Error::UnsupportedOp)
    }

    /// Read the key-gated payload region
    fn read_private_data(&mut self, _dump: &mut CartDump) -> Result<()> {
        Err(Error::UnsupportedOp)
    }

    /// Write the dump's payload back to the chip
    fn write_data(&mut self, _dump: &mut CartDump) -> Result<()> {
        Err(Error::UnsupportedOp)
    }

    /// Erase the chip's payload and reset its key to blank
    fn erase(&mut self, _dump: &mut CartDump) -> Result<()> {
        Err(Error::UnsupportedOp)
    }

    /// Read the configuration register block (X76F041 only)
    fn read_config(&mut self, _dump: &mut CartDump) -> Result<()> {
        Err(Error::UnsupportedOp)
    }

    /// Write the dump's configuration register block (X76F041 only)
    fn write_config(&mut self, _dump: &mut CartDump) -> Result<()> {
        Err(Error::UnsupportedOp)
    }

    /// Program a new data key into the chip
    fn set_data_key(&mut self, _dump: &mut CartDump, _key: &[u8; 8]) -> Result<()> {
        Err(Error::UnsupportedOp)
    }
}

/// Driver bound when no cartridge (or no recognizable chip) is present
///
/// Answers [`Error::UnsupportedOp`] to every operation. This is the
/// explicit "blank slot" state, distinct from a failed operation on a
/// detected chip.
pub struct NullDriver;

impl CartDriver for NullDriver {
    fn chip_type(&self) -> ChipType {
        ChipType::None
    }
}

/// Read the digital I/O board's DS2401 serial number
///
/// This chip lives on the system side rather than the cartridge, so it is
/// available regardless of what (if anything) is plugged into the slot.
pub fn read_system_id<P: OneWirePort>(port: &mut P, dump: &mut CartDump) -> Result<()> {
    let ident = Identifier::new(onewire::read_rom(port)?);

    dump.flags |= DumpFlags::HAS_SYSTEM_ID;
    dump.system_id = ident;

    if !ident.validate_checksum() {
        return Err(Error::IdChecksumMismatch);
    }

    dump.flags |= DumpFlags::SYSTEM_ID_OK;
    Ok(())
}

pub(crate) fn read_cart_onewire_id<P: OneWirePort>(
    port: &mut P,
    dump: &mut CartDump,
) -> Result<()> {
    let ident = Identifier::new(onewire::read_rom(port)?);

    dump.flags |= DumpFlags::HAS_CART_ID;
    dump.cart_id = ident;

    if !ident.validate_checksum() {
        return Err(Error::IdChecksumMismatch);
    }

    dump.flags |= DumpFlags::CART_ID_OK;
    Ok(())
}

/// Probe the slot and construct the matching driver
///
/// The insertion signal is checked before anything touches the bus: with no
/// cartridge present this returns [`NullDriver`] without driving a single
/// line. Otherwise the ZS01 reset sequence is tried first (the X76 sequence
/// would confuse a ZS01), then the X76 sequence; an unknown ID word also
/// yields [`NullDriver`].
///
/// Both probes run as jitter-free sections since the response-to-reset
/// waveforms are single-shot.
#[cfg(feature = "alloc")]
pub fn detect<'a, P: CartPort + 'a>(
    mut port: P,
    dump: &mut CartDump,
) -> alloc::boxed::Box<dyn CartDriver + 'a> {
    use alloc::boxed::Box;

    dump.chip_type = ChipType::None;
    dump.flags = DumpFlags::empty();

    if !port.cart_present() {
        log::debug!("insertion signal not asserted");
        return Box::new(NullDriver);
    }

    port.request_bus();
    let zs01_id = serial::reset_zs01(&mut port);
    port.release_bus();
    log::debug!("detecting ZS01: {:#010x}", zs01_id);

    if zs01_id == id::ZS01 {
        return Box::new(Zs01Driver::new(port, dump));
    }

    port.request_bus();
    let x76_id = serial::reset_x76(&mut port);
    port.release_bus();
    log::debug!("detecting X76: {:#010x}", x76_id);

    match x76_id {
        id::X76F041 => Box::new(X76f041Driver::new(port, dump)),
        id::X76F100 => Box::new(X76f100Driver::new(port, dump)),
        _ => Box::new(NullDriver),
    }
}
