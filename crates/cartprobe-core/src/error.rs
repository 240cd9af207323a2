//! Error types for cartprobe-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
///
/// Every driver operation is a total function returning one of these codes;
/// no panics or unwinding cross the driver boundary. The split between
/// `Auth*` and `Packet*` variants mirrors the two chip families: the
/// authenticated EEPROMs fail at the bus handshake level, the encrypted
/// packet chip fails at the packet level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Operation is not implemented for the detected chip type
    UnsupportedOp,

    // 1-wire ID chip errors
    /// No presence pulse from the 1-wire ID chip
    NoDevice,
    /// 1-wire ID chip answered but its checksum is invalid
    IdChecksumMismatch,

    // Authenticated EEPROM (X76) errors
    /// Chip did not acknowledge a command, parameter or key byte
    AuthNack,
    /// ACK polling exhausted all attempts; in practice the key is wrong
    AuthPollTimeout,
    /// Post-write verification mismatch (reserved, currently unused)
    AuthVerifyMismatch,

    // Encrypted packet chip (ZS01) errors
    /// Chip did not acknowledge a request packet byte
    PacketNack,
    /// Structurally valid response carrying a non-zero chip status code
    PacketStatus(u8),
    /// Response packet failed CRC validation after decoding
    PacketCrcMismatch,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedOp => write!(f, "operation not supported by this chip"),
            Self::NoDevice => write!(f, "no 1-wire ID chip found"),
            Self::IdChecksumMismatch => write!(f, "1-wire ID checksum mismatch"),
            Self::AuthNack => write!(f, "EEPROM did not acknowledge command or key"),
            Self::AuthPollTimeout => write!(f, "ACK polling timed out (wrong key?)"),
            Self::AuthVerifyMismatch => write!(f, "write verification mismatch"),
            Self::PacketNack => write!(f, "chip did not acknowledge request packet"),
            Self::PacketStatus(code) => write!(f, "chip returned status 0x{:02x}", code),
            Self::PacketCrcMismatch => write!(f, "response packet CRC mismatch"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_status_code() {
        use alloc::format;

        assert_eq!(
            format!("{}", Error::PacketStatus(0x03)),
            "chip returned status 0x03"
        );
    }
}
