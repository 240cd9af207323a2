//! ZS01 packet protocol: key schedule, stream cipher and wire frames
//!
//! The ZS01 speaks fixed 12-byte packets: one command byte, one block
//! address, 8 payload bytes and a big-endian CRC-16. Every packet on the
//! wire is obfuscated with a byte-wise, state-chained rotate/add cipher;
//! privileged payloads get a second pass with the cartridge's data key.
//!
//! The cipher is self-chaining: each processed byte becomes the state fed
//! into the next, and the response's address byte seeds the following
//! transaction, so both ends stay in sync across a session.

use zerocopy::byteorder::{BigEndian, U16};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::crc::zs_crc16;

/// Block addresses understood by the chip
pub mod addr {
    /// First public (unprivileged) data block
    pub const PUBLIC: u8 = 0x00;
    /// One past the last public data block
    pub const PUBLIC_END: u8 = 0x04;
    /// First private (key-gated) data block
    pub const PRIVATE: u8 = 0x04;
    /// One past the last private data block
    pub const PRIVATE_END: u8 = 0x0e;
    /// Chip's internal identifier (read-only)
    pub const ZS01_ID: u8 = 0xfc;
    /// Mirror of the cartridge DS2401 (read-only)
    pub const DS2401_ID: u8 = 0xfd;
    /// Erase trigger (write-only)
    pub const ERASE: u8 = 0xfd;
    /// Configuration registers
    pub const CONFIG: u8 = 0xfe;
    /// Data key slot (write-only)
    pub const DATA_KEY: u8 = 0xff;
}

/// Request command flags
pub mod req {
    /// Write request (bit 0 clear)
    pub const WRITE: u8 = 0 << 0;
    /// Read request
    pub const READ: u8 = 1 << 0;
    /// Bit 8 of the block address (unused, all addresses fit in one byte)
    pub const ADDR_BIT8: u8 = 1 << 1;
    /// Request touches key-gated memory
    pub const PRIVILEGED: u8 = 1 << 2;
}

/// Response status codes
///
/// The chip's own meaning for the non-zero codes is undocumented; they are
/// surfaced verbatim to callers.
pub mod resp {
    /// Request accepted
    pub const NO_ERROR: u8 = 0x00;
    /// Unknown error 1
    pub const UNKNOWN_ERROR1: u8 = 0x01;
    /// Security error 1
    pub const SECURITY_ERROR1: u8 = 0x02;
    /// Security error 2
    pub const SECURITY_ERROR2: u8 = 0x03;
    /// Unknown error 2
    pub const UNKNOWN_ERROR2: u8 = 0x04;
    /// Security error 3
    pub const SECURITY_ERROR3: u8 = 0x05;
}

/// Unpacked cipher key material: an add constant and a rotate amount per round
///
/// Derived on demand from a raw 8-byte key and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zs01Key {
    /// Per-round add constants
    pub add: [u8; 8],
    /// Per-round left-rotate amounts (round 0 never rotates)
    pub shift: [u8; 8],
}

/// Key hardwired into every ZS01, used to obfuscate whole request packets
pub const COMMAND_KEY: Zs01Key = Zs01Key {
    add: [237, 8, 16, 11, 6, 4, 8, 30],
    shift: [0, 3, 2, 2, 6, 2, 2, 1],
};

/// Key the host hands to the chip for encoding responses
///
/// The original driver generates a fresh pseudorandom key per transaction,
/// but a fixed all-zero key is equally valid and keeps decoding stateless.
pub const RESPONSE_KEY: Zs01Key = Zs01Key {
    add: [0; 8],
    shift: [0; 8],
};

impl Zs01Key {
    /// Unpack key material from a raw 8-byte key
    ///
    /// Byte 0 becomes round 0's add constant (which never rotates); each
    /// following byte contributes its low 5 bits as the add constant and its
    /// high 3 bits as the rotate amount.
    pub fn unpack_from(key: &[u8; 8]) -> Self {
        let mut add = [0u8; 8];
        let mut shift = [0u8; 8];

        add[0] = key[0];

        for i in 1..8 {
            add[i] = key[i] & 0x1f;
            shift[i] = key[i] >> 5;
        }

        Self { add, shift }
    }

    /// Pack key material back into raw key bytes; exact inverse of
    /// [`unpack_from`](Self::unpack_from)
    pub fn pack_into(&self, key: &mut [u8; 8]) {
        key[0] = self.add[0];

        for i in 1..8 {
            key[i] = (self.add[i] & 0x1f) | (self.shift[i] << 5);
        }
    }

    fn transform(&self, value: u8) -> u8 {
        let mut value = value.wrapping_add(self.add[0]);

        for i in 1..8 {
            value = value
                .rotate_left(self.shift[i] as u32)
                .wrapping_add(self.add[i]);
        }

        value
    }

    fn untransform(&self, value: u8) -> u8 {
        let mut value = value;

        for i in (1..8).rev() {
            value = value
                .wrapping_sub(self.add[i])
                .rotate_right(self.shift[i] as u32);
        }

        value.wrapping_sub(self.add[0])
    }

    /// Encode a whole packet in place, last byte first
    ///
    /// Each output byte feeds the transform of the next (earlier) byte, so
    /// the decoder must start from the same seed state.
    pub fn encode_packet(&self, data: &mut [u8], state: u8) {
        let mut state = state;

        for byte in data.iter_mut().rev() {
            let value = self.transform(*byte ^ state);

            state = value;
            *byte = value;
        }
    }

    /// Decode a whole packet in place, last byte first
    ///
    /// Chaining runs on the ciphertext bytes, mirroring the encoder.
    pub fn decode_packet(&self, data: &mut [u8], state: u8) {
        let mut state = state;

        for byte in data.iter_mut().rev() {
            let prev_state = state;
            state = *byte;

            *byte = self.untransform(*byte) ^ prev_state;
        }
    }

    /// Encode a payload in place, first byte first
    ///
    /// Same per-byte transform as the packet cipher, but running forward and
    /// seeded with the session state instead of a fixed value. Used to give
    /// privileged payload bytes their own protection layer under the data
    /// key.
    pub fn encode_payload(&self, data: &mut [u8], state: u8) {
        let mut state = state;

        for byte in data.iter_mut() {
            let value = self.transform(*byte ^ state);

            state = value;
            *byte = value;
        }
    }

    /// Decode a payload in place, first byte first
    ///
    /// The chip's half of [`encode_payload`](Self::encode_payload); the host
    /// never needs it, but chip emulation does.
    pub fn decode_payload(&self, data: &mut [u8], state: u8) {
        let mut state = state;

        for byte in data.iter_mut() {
            let cipher = *byte;

            *byte = self.untransform(cipher) ^ state;
            state = cipher;
        }
    }
}

/// Seed state for the fixed-key packet cipher
pub const PACKET_CIPHER_SEED: u8 = 0xff;

/// One 12-byte wire frame
///
/// Constructed per transaction; the encode methods scramble the struct in
/// place into its on-wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Zs01Packet {
    /// Request flags or response status
    pub command: u8,
    /// Block address (requests) or next session state (responses)
    pub address: u8,
    /// Payload block
    pub data: [u8; 8],
    /// CRC-16 over the preceding 10 bytes, big-endian on the wire
    pub crc: U16<BigEndian>,
}

impl Zs01Packet {
    /// Create an all-zero packet for the given block address
    pub fn new(address: u8) -> Self {
        Self {
            command: 0,
            address,
            data: [0; 8],
            crc: U16::new(0),
        }
    }

    /// Recompute the CRC over command, address and payload
    pub fn update_crc(&mut self) {
        let value = zs_crc16(&self.as_bytes()[..10]);
        self.crc = U16::new(value);
    }

    /// Validate the embedded CRC
    pub fn validate_crc(&self) -> bool {
        let value = zs_crc16(&self.as_bytes()[..10]);

        if value != self.crc.get() {
            log::debug!("mismatch, exp=0x{:04x}, got=0x{:04x}", value, self.crc.get());
            return false;
        }

        true
    }

    /// Build an unprivileged read request and scramble it into wire form
    ///
    /// The payload carries the response key so the chip knows how to encode
    /// its reply.
    pub fn encode_read_request(&mut self) {
        log::debug!("addr=0x{:02x}", self.address);

        self.command = req::READ;
        RESPONSE_KEY.pack_into(&mut self.data);
        self.update_crc();

        COMMAND_KEY.encode_packet(self.as_mut_bytes(), PACKET_CIPHER_SEED);
    }

    /// Build a privileged read request and scramble it into wire form
    ///
    /// The CRC covers the plaintext; the payload is then scrambled forward
    /// under the data key and the session state before the whole packet gets
    /// the command-key pass.
    pub fn encode_privileged_read_request(&mut self, data_key: &Zs01Key, state: u8) {
        log::debug!("addr=0x{:02x}, privileged", self.address);

        self.command = req::READ | req::PRIVILEGED;
        RESPONSE_KEY.pack_into(&mut self.data);
        self.update_crc();

        data_key.encode_payload(&mut self.data, state);
        COMMAND_KEY.encode_packet(self.as_mut_bytes(), PACKET_CIPHER_SEED);
    }

    /// Build a write request around the payload already stored in `data`
    /// and scramble it into wire form
    pub fn encode_write_request(&mut self, data_key: &Zs01Key, state: u8) {
        log::debug!("addr=0x{:02x}", self.address);

        self.command = req::WRITE | req::PRIVILEGED;
        self.update_crc();

        data_key.encode_payload(&mut self.data, state);
        COMMAND_KEY.encode_packet(self.as_mut_bytes(), PACKET_CIPHER_SEED);
    }

    /// Decode a raw response in place and validate its CRC
    ///
    /// Responses are encoded under the response key handed over in the last
    /// read request, never under the data key.
    pub fn decode_response(&mut self) -> bool {
        RESPONSE_KEY.decode_packet(self.as_mut_bytes(), PACKET_CIPHER_SEED);

        self.validate_crc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_KEYS: [[u8; 8]; 4] = [
        [0x00; 8],
        [0xff; 8],
        [0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0],
        [0xed, 0x68, 0x50, 0x4b, 0xc6, 0x44, 0x48, 0x3e],
    ];

    #[test]
    fn test_key_pack_unpack_roundtrip() {
        for raw in SAMPLE_KEYS {
            let key = Zs01Key::unpack_from(&raw);
            let mut packed = [0u8; 8];
            key.pack_into(&mut packed);
            assert_eq!(packed, raw);
        }
    }

    #[test]
    fn test_key_unpack_fields() {
        let key = Zs01Key::unpack_from(&[0x25, 0x7f, 0xe0, 0x00, 0x00, 0x00, 0x00, 0x00]);

        assert_eq!(key.add[0], 0x25);
        assert_eq!(key.shift[0], 0);
        assert_eq!(key.add[1], 0x1f);
        assert_eq!(key.shift[1], 3);
        assert_eq!(key.add[2], 0x00);
        assert_eq!(key.shift[2], 7);
    }

    #[test]
    fn test_packet_cipher_roundtrip() {
        let plaintext: [u8; 12] = [
            0x05, 0x04, 0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x03, 0x04, 0xab, 0xcd,
        ];

        for raw in SAMPLE_KEYS {
            let key = Zs01Key::unpack_from(&raw);

            for state in [0x00, 0x7f, 0xff] {
                let mut buffer = plaintext;
                key.encode_packet(&mut buffer, state);
                key.decode_packet(&mut buffer, state);
                assert_eq!(buffer, plaintext, "key={:02x?} state={:#04x}", raw, state);
            }
        }
    }

    #[test]
    fn test_packet_cipher_roundtrip_command_key() {
        for state in 0..=0xffu16 {
            let mut buffer: [u8; 12] = [
                0x01, 0xfe, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99,
            ];
            let original = buffer;

            COMMAND_KEY.encode_packet(&mut buffer, state as u8);
            COMMAND_KEY.decode_packet(&mut buffer, state as u8);
            assert_eq!(buffer, original, "state={:#04x}", state);
        }
    }

    #[test]
    fn test_payload_cipher_roundtrip() {
        let plaintext = [0x10, 0x32, 0x54, 0x76, 0x98, 0xba, 0xdc, 0xfe];

        for raw in SAMPLE_KEYS {
            let key = Zs01Key::unpack_from(&raw);

            for state in [0x00, 0x42, 0xff] {
                let mut buffer = plaintext;
                key.encode_payload(&mut buffer, state);
                key.decode_payload(&mut buffer, state);
                assert_eq!(buffer, plaintext, "key={:02x?} state={:#04x}", raw, state);
            }
        }
    }

    #[test]
    fn test_zero_key_payload_degenerates_to_xor_chain() {
        // With an all-zero key the transform is the identity, leaving only
        // the ciphertext chaining.
        let key = Zs01Key::unpack_from(&[0; 8]);
        let mut buffer = [1, 2, 3, 4, 5, 6, 7, 8];

        key.encode_payload(&mut buffer, 0x00);
        assert_eq!(buffer, [1, 3, 0, 4, 1, 7, 0, 8]);
    }

    #[test]
    fn test_add_one_key_packet_golden() {
        // add[0] = 1, everything else zero: each byte (last to first) is the
        // previous state plus one.
        let key = Zs01Key::unpack_from(&[0x01, 0, 0, 0, 0, 0, 0, 0]);
        let mut buffer = [0u8; 12];

        key.encode_packet(&mut buffer, 0xff);
        assert_eq!(buffer, [11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_packet_crc() {
        let mut packet = Zs01Packet::new(0x04);
        packet.command = req::READ;
        packet.data = [0xaa; 8];

        packet.update_crc();
        assert!(packet.validate_crc());
        assert_eq!(packet.crc.get(), zs_crc16(&packet.as_bytes()[..10]));

        packet.data[3] ^= 0x01;
        assert!(!packet.validate_crc());
    }

    #[test]
    fn test_read_request_wire_form() {
        let mut packet = Zs01Packet::new(0x02);
        packet.encode_read_request();

        // Undo the command-key pass and check the plaintext structure.
        let mut raw = [0u8; 12];
        raw.copy_from_slice(packet.as_bytes());
        COMMAND_KEY.decode_packet(&mut raw, PACKET_CIPHER_SEED);

        let decoded = Zs01Packet::read_from_bytes(&raw[..]).unwrap();
        assert_eq!(decoded.command, req::READ);
        assert_eq!(decoded.address, 0x02);
        assert_eq!(decoded.data, [0; 8]); // packed all-zero response key
        assert!(decoded.validate_crc());
    }

    #[test]
    fn test_privileged_read_request_wire_form() {
        let data_key = Zs01Key::unpack_from(&SAMPLE_KEYS[2]);

        let mut packet = Zs01Packet::new(0x04);
        packet.encode_privileged_read_request(&data_key, 0x00);

        let mut raw = [0u8; 12];
        raw.copy_from_slice(packet.as_bytes());
        COMMAND_KEY.decode_packet(&mut raw, PACKET_CIPHER_SEED);

        let mut decoded = Zs01Packet::read_from_bytes(&raw[..]).unwrap();
        assert_eq!(decoded.command, req::READ | req::PRIVILEGED);
        assert_eq!(decoded.address, 0x04);

        // CRC covers the plaintext payload, so it only validates after the
        // data-key layer is peeled off.
        assert!(!decoded.validate_crc());
        data_key.decode_payload(&mut decoded.data, 0x00);
        assert!(decoded.validate_crc());
        assert_eq!(decoded.data, [0; 8]);
    }

    #[test]
    fn test_write_request_wire_form() {
        let data_key = Zs01Key::unpack_from(&SAMPLE_KEYS[3]);
        let payload = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];

        let mut packet = Zs01Packet::new(0x0a);
        packet.data = payload;
        packet.encode_write_request(&data_key, 0x5a);

        let mut raw = [0u8; 12];
        raw.copy_from_slice(packet.as_bytes());
        COMMAND_KEY.decode_packet(&mut raw, PACKET_CIPHER_SEED);

        let mut decoded = Zs01Packet::read_from_bytes(&raw[..]).unwrap();
        assert_eq!(decoded.command, req::PRIVILEGED);
        assert_eq!(decoded.address, 0x0a);

        data_key.decode_payload(&mut decoded.data, 0x5a);
        assert!(decoded.validate_crc());
        assert_eq!(decoded.data, payload);
    }

    #[test]
    fn test_response_decode_roundtrip() {
        let mut response = Zs01Packet::new(0x37);
        response.command = resp::NO_ERROR;
        response.data = [9, 8, 7, 6, 5, 4, 3, 2];
        response.update_crc();

        // Encode the way the chip would, then decode as the host.
        RESPONSE_KEY.encode_packet(response.as_mut_bytes(), PACKET_CIPHER_SEED);
        assert!(response.decode_response());
        assert_eq!(response.address, 0x37);
        assert_eq!(response.data, [9, 8, 7, 6, 5, 4, 3, 2]);

        // A corrupted wire byte must fail CRC validation.
        let mut corrupted = Zs01Packet::new(0x37);
        corrupted.command = resp::NO_ERROR;
        corrupted.data = [9, 8, 7, 6, 5, 4, 3, 2];
        corrupted.update_crc();
        RESPONSE_KEY.encode_packet(corrupted.as_mut_bytes(), PACKET_CIPHER_SEED);
        corrupted.data[0] ^= 0x80;
        assert!(!corrupted.decode_response());
    }
}
