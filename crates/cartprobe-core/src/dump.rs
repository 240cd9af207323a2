//! Cartridge dump/session record
//!
//! A [`CartDump`] accumulates everything learned about one physical
//! cartridge during one session: which chip is present, which fields have
//! been read successfully, the current authentication key, the identifiers
//! and the payload itself. It is created empty at detection time, mutated in
//! place by driver calls and discarded when the cartridge is swapped.

use core::fmt;

use bitflags::bitflags;

use crate::crc::ds_crc8;

/// Chip families found on security cartridges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChipType {
    /// No cartridge, or a cartridge with an unrecognized chip
    #[default]
    None,
    /// Xicor X76F041 authenticated EEPROM (512 bytes)
    X76F041,
    /// Xicor X76F100 authenticated EEPROM (112 bytes)
    X76F100,
    /// Konami ZS01 encrypted memory (112 bytes)
    Zs01,
}

bitflags! {
    /// Per-session "known good" bits
    ///
    /// `HAS_*` bits state that a property exists on this hardware at all;
    /// `*_OK` bits state that it was read successfully this session. The two
    /// must not be conflated: a cartridge can carry an ID chip whose read
    /// failed. Bits are only ever set by driver calls; clearing happens
    /// wholesale when a new session starts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DumpFlags: u8 {
        /// A system (digital I/O board) ID chip responded
        const HAS_SYSTEM_ID   = 1 << 0;
        /// A cartridge ID chip responded
        const HAS_CART_ID     = 1 << 1;
        /// Configuration registers read successfully
        const CONFIG_OK       = 1 << 2;
        /// System ID read and validated
        const SYSTEM_ID_OK    = 1 << 3;
        /// Cartridge ID read and validated
        const CART_ID_OK      = 1 << 4;
        /// ZS01 internal ID read and validated
        const ZS_ID_OK        = 1 << 5;
        /// Public payload region read successfully
        const PUBLIC_DATA_OK  = 1 << 6;
        /// Private payload region read successfully
        const PRIVATE_DATA_OK = 1 << 7;
    }
}

/// Fixed 8-byte identifier with a trailing CRC-8 checksum
///
/// Used for the two DS2401 serial numbers and the ZS01's internal ID. The
/// last byte is the Dallas/Maxim CRC-8 of the first seven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Identifier {
    /// Raw identifier bytes, checksum last
    pub data: [u8; 8],
}

impl Identifier {
    /// Wrap raw identifier bytes
    pub fn new(data: [u8; 8]) -> Self {
        Self { data }
    }

    /// True when all bytes are zero
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    /// Recompute the trailing checksum byte
    pub fn update_checksum(&mut self) {
        self.data[7] = ds_crc8(&self.data[..7]);
    }

    /// Validate the trailing checksum byte
    ///
    /// An all-zeros or all-ones prefix byte is rejected outright; that is
    /// what a silent bus reads back as.
    pub fn validate_checksum(&self) -> bool {
        if self.data[0] == 0x00 || self.data[0] == 0xff {
            log::debug!("invalid 1-wire prefix 0x{:02x}", self.data[0]);
            return false;
        }

        let value = ds_crc8(&self.data[..7]);

        if value != self.data[7] {
            log::debug!("mismatch, exp=0x{:02x}, got=0x{:02x}", value, self.data[7]);
            return false;
        }

        true
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, "-")?;
            }
            write!(f, "{:02X}", byte)?;
        }

        Ok(())
    }
}

/// Payload geometry of one chip type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipSize {
    /// Total payload length in bytes
    pub data_length: usize,
    /// Offset of the public region within the payload
    pub public_data_offset: usize,
    /// Length of the public region (zero if the chip has none)
    pub public_data_length: usize,
}

const CHIP_SIZES: [ChipSize; 4] = [
    ChipSize { data_length: 0, public_data_offset: 0, public_data_length: 0 },
    ChipSize { data_length: 512, public_data_offset: 384, public_data_length: 128 },
    ChipSize { data_length: 112, public_data_offset: 0, public_data_length: 0 },
    ChipSize { data_length: 112, public_data_offset: 0, public_data_length: 32 },
];

impl ChipType {
    /// Payload geometry for this chip type
    pub fn size(self) -> &'static ChipSize {
        &CHIP_SIZES[self as usize]
    }
}

/// Caller-owned record of one cartridge session
#[derive(Clone)]
pub struct CartDump {
    /// Detected chip type; set once at detection, constant for the session
    pub chip_type: ChipType,
    /// Known-good bits accumulated by driver calls
    pub flags: DumpFlags,

    /// Digital I/O board DS2401 serial number
    pub system_id: Identifier,
    /// Cartridge DS2401 serial number
    pub cart_id: Identifier,
    /// ZS01 internal identifier
    pub zs_id: Identifier,

    /// Authentication/encryption key currently believed correct
    pub data_key: [u8; 8],
    /// Configuration register block (meaning varies by chip)
    pub config: [u8; 8],
    /// Payload bytes; only the first `chip_type.size().data_length` are valid
    pub data: [u8; 512],
}

impl CartDump {
    /// Create an empty dump with no chip detected
    pub fn new() -> Self {
        Self {
            chip_type: ChipType::None,
            flags: DumpFlags::empty(),
            system_id: Identifier::default(),
            cart_id: Identifier::default(),
            zs_id: Identifier::default(),
            data_key: [0; 8],
            config: [0; 8],
            data: [0; 512],
        }
    }

    /// Payload geometry of the detected chip
    pub fn chip_size(&self) -> &'static ChipSize {
        self.chip_type.size()
    }

    /// Valid payload bytes for the detected chip
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.chip_size().data_length]
    }

    /// Clear all identifiers
    pub fn clear_identifiers(&mut self) {
        self.system_id = Identifier::default();
        self.cart_id = Identifier::default();
        self.zs_id = Identifier::default();
    }

    /// Clear the session key
    pub fn clear_key(&mut self) {
        self.data_key = [0; 8];
    }

    /// Clear the payload and configuration registers
    pub fn clear_data(&mut self) {
        self.config = [0; 8];
        self.data = [0; 512];
    }

    /// Populate the configuration block with sane factory-style defaults
    ///
    /// `max_attempts` programs the chip's failed-unlock counter limit where
    /// one exists; `has_public_section` selects the X76F041 access mask that
    /// leaves the upper region unprotected.
    pub fn init_config(&mut self, max_attempts: u8, has_public_section: bool) {
        self.config = [0; 8];

        match self.chip_type {
            ChipType::X76F041 => {
                self.config[0] = 0xff;
                self.config[1] = if has_public_section { 0xaf } else { 0xff };
                self.config[2] = 0x20; // Disable retry counter
                self.config[3] = max_attempts;
            }
            ChipType::Zs01 => {
                self.config[4] = max_attempts;
            }
            _ => {}
        }
    }

    /// True when the public region was read and contains no data
    pub fn is_public_data_empty(&self) -> bool {
        if !self.flags.contains(DumpFlags::PUBLIC_DATA_OK) {
            return false;
        }

        let size = self.chip_size();
        let region = &self.data[size.public_data_offset..][..size.public_data_length];

        region.iter().all(|&b| b == 0x00) || region.iter().all(|&b| b == 0xff)
    }

    /// True when the whole payload was read and contains no data
    pub fn is_data_empty(&self) -> bool {
        if !self
            .flags
            .contains(DumpFlags::PUBLIC_DATA_OK | DumpFlags::PRIVATE_DATA_OK)
        {
            return false;
        }

        let payload = self.payload();
        payload.iter().all(|&b| b == 0x00) || payload.iter().all(|&b| b == 0xff)
    }
}

impl Default for CartDump {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_checksum_roundtrip() {
        let mut id = Identifier::new([0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0x00]);
        id.update_checksum();
        assert!(id.validate_checksum());

        id.data[2] ^= 0x40;
        assert!(!id.validate_checksum());
    }

    #[test]
    fn test_identifier_rejects_silent_bus_values() {
        let mut floating = Identifier::new([0xff; 8]);
        floating.update_checksum();
        assert!(!floating.validate_checksum());

        assert!(!Identifier::new([0x00; 8]).validate_checksum());
    }

    #[test]
    fn test_identifier_display() {
        use alloc::format;

        let id = Identifier::new([0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]);
        assert_eq!(format!("{}", id), "01-23-45-67-89-AB-CD-EF");
    }

    #[test]
    fn test_chip_sizes() {
        assert_eq!(ChipType::None.size().data_length, 0);
        assert_eq!(ChipType::X76F041.size().data_length, 512);
        assert_eq!(ChipType::X76F100.size().data_length, 112);
        assert_eq!(ChipType::Zs01.size().data_length, 112);
        assert_eq!(ChipType::Zs01.size().public_data_length, 32);
    }

    #[test]
    fn test_data_empty_requires_successful_read() {
        let mut dump = CartDump::new();
        dump.chip_type = ChipType::Zs01;

        // All zeroes, but nothing was read yet
        assert!(!dump.is_data_empty());

        dump.flags |= DumpFlags::PUBLIC_DATA_OK | DumpFlags::PRIVATE_DATA_OK;
        assert!(dump.is_data_empty());

        dump.data[5] = 0x42;
        assert!(!dump.is_data_empty());
    }
}
