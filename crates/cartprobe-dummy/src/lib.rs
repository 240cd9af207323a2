//! cartprobe-dummy - Emulated cartridge slot for testing
//!
//! This crate provides an in-memory cartridge slot that emulates the three
//! supported security chips (and their DS2401 ID chips) at the electrical
//! level: the slot implements the core port traits, decodes the host's
//! bit-banged waveforms edge by edge and answers the way real silicon
//! would. It is useful for testing and development without real hardware,
//! and it is what the driver integration tests run against.
//!
//! Time never passes for real: `delay_us` advances a virtual microsecond
//! clock, which the single-wire model uses to measure pulse widths. A full
//! cartridge dump that would take seconds on hardware runs in microseconds
//! of wall time.

mod chips;
mod engine;

pub use chips::{X76f041Chip, X76f100Chip, Zs01Chip};
pub use engine::BusEvent;

use cartprobe_core::crc::ds_crc8;
use cartprobe_core::port::{CartPort, OneWirePort};

use engine::{ChipModel, OneWireEngine, SerialEngine};

/// Which chip the emulated cartridge carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DummyChip {
    /// Empty slot or a cartridge with no recognizable chip
    None,
    /// X76F041 with a blank 512-byte array
    #[default]
    X76f041,
    /// X76F100 with a blank 112-byte array
    X76f100,
    /// ZS01 with a blank 112-byte array
    Zs01,
}

/// Build a valid 8-byte ROM/identifier from a family code and serial number
pub fn rom_id(family: u8, serial: [u8; 6]) -> [u8; 8] {
    let mut rom = [0u8; 8];
    rom[0] = family;
    rom[1..7].copy_from_slice(&serial);
    rom[7] = ds_crc8(&rom[..7]);
    rom
}

/// Configuration for the emulated slot
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Chip soldered on the emulated cartridge
    pub chip: DummyChip,
    /// State of the insertion-detect signal
    pub cart_present: bool,
    /// Override the response-to-reset ID word (for negative detection tests)
    pub id_word: Option<u32>,
    /// Key initially programmed into the chip (both slots on the X76F100)
    pub data_key: [u8; 8],
    /// Which ACK-poll attempt the chip acknowledges (1 = first)
    pub ack_poll_after: u32,
    /// Cartridge DS2401 ROM; `None` emulates a missing or dead ID chip
    pub cart_rom: Option<[u8; 8]>,
    /// ZS01 internal identifier
    pub zs_id: [u8; 8],
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            chip: DummyChip::X76f041,
            cart_present: true,
            id_word: None,
            data_key: [0; 8],
            ack_poll_after: 1,
            cart_rom: Some(rom_id(0x01, [0x10, 0x32, 0x54, 0x76, 0x98, 0xba])),
            zs_id: rom_id(0x5a, [0x01, 0x02, 0x03, 0x04, 0x05, 0x06]),
        }
    }
}

impl DummyConfig {
    /// Configuration for a given chip with everything else at defaults
    pub fn with_chip(chip: DummyChip) -> Self {
        Self {
            chip,
            ..Self::default()
        }
    }
}

/// Emulated cartridge slot
///
/// Implements [`CartPort`] (serial bus + cartridge 1-wire pin + insertion
/// signal) against fully emulated chips. All host traffic is recorded as
/// framed [`BusEvent`]s for assertions, and `bus_ops()` counts every raw
/// line access so tests can assert complete bus silence.
pub struct DummySlot {
    serial: SerialEngine,
    onewire: OneWireEngine,
    cart_present: bool,
    now_us: u64,
    bus_ops: usize,
}

impl DummySlot {
    /// Create a slot from the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let ds_id = config.cart_rom.unwrap_or([0; 8]);

        let chip = match config.chip {
            DummyChip::None => None,
            DummyChip::X76f041 => {
                let mut chip = X76f041Chip::new(config.data_key);
                chip.ack_poll_after = config.ack_poll_after;
                Some(ChipModel::X76f041(chip))
            }
            DummyChip::X76f100 => {
                let mut chip = X76f100Chip::new(config.data_key);
                chip.ack_poll_after = config.ack_poll_after;
                Some(ChipModel::X76f100(chip))
            }
            DummyChip::Zs01 => Some(ChipModel::Zs01(Zs01Chip::new(
                config.data_key,
                config.zs_id,
                ds_id,
            ))),
        };

        Self {
            serial: SerialEngine::new(chip, config.id_word),
            onewire: OneWireEngine::new(config.cart_rom),
            cart_present: config.cart_present,
            now_us: 0,
            bus_ops: 0,
        }
    }

    /// Create a slot with default configuration (blank X76F041)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Number of raw line accesses since construction
    pub fn bus_ops(&self) -> usize {
        self.bus_ops
    }

    /// Virtual time spent busy-waiting, in microseconds
    pub fn elapsed_us(&self) -> u64 {
        self.now_us
    }

    /// Framed serial traffic recorded so far
    pub fn events(&self) -> &[BusEvent] {
        &self.serial.events
    }

    /// Drop the recorded traffic
    pub fn clear_events(&mut self) {
        self.serial.events.clear();
    }

    /// Access the emulated X76F041, if that is the configured chip
    pub fn x76f041(&mut self) -> Option<&mut X76f041Chip> {
        match self.serial.chip.as_mut() {
            Some(ChipModel::X76f041(chip)) => Some(chip),
            _ => None,
        }
    }

    /// Access the emulated X76F100, if that is the configured chip
    pub fn x76f100(&mut self) -> Option<&mut X76f100Chip> {
        match self.serial.chip.as_mut() {
            Some(ChipModel::X76f100(chip)) => Some(chip),
            _ => None,
        }
    }

    /// Access the emulated ZS01, if that is the configured chip
    pub fn zs01(&mut self) -> Option<&mut Zs01Chip> {
        match self.serial.chip.as_mut() {
            Some(ChipModel::Zs01(chip)) => Some(chip),
            _ => None,
        }
    }
}

impl OneWirePort for DummySlot {
    fn set_pin(&mut self, high: bool) {
        self.bus_ops += 1;
        self.onewire.set_pin(self.now_us, high);
    }

    fn get_pin(&mut self) -> bool {
        self.bus_ops += 1;
        self.onewire.get_pin(self.now_us)
    }

    fn delay_us(&mut self, us: u32) {
        self.now_us += us as u64;
    }
}

impl CartPort for DummySlot {
    fn set_sda(&mut self, high: bool) {
        self.bus_ops += 1;
        self.serial.set_sda(high);
    }

    fn get_sda(&mut self) -> bool {
        self.bus_ops += 1;
        self.serial.line()
    }

    fn set_scl(&mut self, high: bool) {
        self.bus_ops += 1;
        self.serial.set_scl(high);
    }

    fn set_cs(&mut self, high: bool) {
        self.bus_ops += 1;
        self.serial.set_cs(high);
    }

    fn set_reset(&mut self, high: bool) {
        self.bus_ops += 1;
        self.serial.set_reset(high);
    }

    fn cart_present(&mut self) -> bool {
        self.cart_present
    }
}

/// Standalone emulated DS2401, for the digital I/O board's ID chip
pub struct DummyOneWire {
    onewire: OneWireEngine,
    now_us: u64,
    bus_ops: usize,
}

impl DummyOneWire {
    /// Emulate a chip with the given ROM, or an empty bus with `None`
    pub fn new(rom: Option<[u8; 8]>) -> Self {
        Self {
            onewire: OneWireEngine::new(rom),
            now_us: 0,
            bus_ops: 0,
        }
    }

    /// Number of raw line accesses since construction
    pub fn bus_ops(&self) -> usize {
        self.bus_ops
    }
}

impl OneWirePort for DummyOneWire {
    fn set_pin(&mut self, high: bool) {
        self.bus_ops += 1;
        self.onewire.set_pin(self.now_us, high);
    }

    fn get_pin(&mut self) -> bool {
        self.bus_ops += 1;
        self.onewire.get_pin(self.now_us)
    }

    fn delay_us(&mut self, us: u32) {
        self.now_us += us as u64;
    }
}
