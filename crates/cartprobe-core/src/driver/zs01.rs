//! Driver for the ZS01 encrypted memory
//!
//! Every exchange is one 12-byte request packet answered by one 12-byte
//! response packet; there is no retry at this layer, a CRC or status
//! failure goes straight back to the caller. The driver carries the session
//! cipher state across transactions: each successfully decoded response's
//! address byte seeds the payload cipher of the next privileged request.
//!
//! The inter-packet delays are generous on purpose; tightening them has
//! been observed to brick cartridges during rewrites.

use crate::bus::serial;
use crate::driver::CartDriver;
use crate::dump::{CartDump, ChipType, DumpFlags, Identifier};
use crate::error::{Error, Result};
use crate::port::CartPort;
use crate::zs01::{addr, resp, Zs01Key, Zs01Packet};

use zerocopy::IntoBytes;

const SEND_DELAY: u32 = 100_000;
const PACKET_DELAY: u32 = 300_000;

/// Driver for the ZS01 (112-byte array split into public and private halves)
pub struct Zs01Driver<P: CartPort> {
    port: P,
    encoder_state: u8,
}

impl<P: CartPort> Zs01Driver<P> {
    /// Bind a driver to the port and mark the dump's chip type
    ///
    /// The ZS01 always carries a DS2401 mirror, so the dump starts with the
    /// cart-ID-present bit already set.
    pub fn new(port: P, dump: &mut CartDump) -> Self {
        dump.chip_type = ChipType::Zs01;
        dump.flags = DumpFlags::HAS_CART_ID;

        Self {
            port,
            encoder_state: 0,
        }
    }

    fn transact(&mut self, request: &Zs01Packet, response: &mut Zs01Packet) -> Result<()> {
        self.port.delay_us(PACKET_DELAY);
        serial::start(&mut self.port);

        if !serial::write_bytes(&mut self.port, request.as_bytes(), SEND_DELAY) {
            serial::stop(&mut self.port);
            log::debug!("NACK while sending request packet");
            return Err(Error::PacketNack);
        }

        serial::read_bytes(&mut self.port, response.as_mut_bytes());
        serial::stop(&mut self.port);

        if !response.decode_response() {
            return Err(Error::PacketCrcMismatch);
        }

        // Any CRC-valid response advances the session state, error or not;
        // the chip has already moved on.
        self.encoder_state = response.address;

        if response.command != resp::NO_ERROR {
            log::debug!("chip error, code=0x{:02x}", response.command);
            return Err(Error::PacketStatus(response.command));
        }

        Ok(())
    }

    fn read_block(&mut self, address: u8) -> Result<[u8; 8]> {
        let mut request = Zs01Packet::new(address);
        let mut response = Zs01Packet::new(0);

        request.encode_read_request();
        self.transact(&request, &mut response)?;

        Ok(response.data)
    }

    fn read_privileged_block(&mut self, key: &Zs01Key, address: u8) -> Result<[u8; 8]> {
        let mut request = Zs01Packet::new(address);
        let mut response = Zs01Packet::new(0);

        request.encode_privileged_read_request(key, self.encoder_state);
        self.transact(&request, &mut response)?;

        Ok(response.data)
    }

    fn write_block(&mut self, key: &Zs01Key, address: u8, block: &[u8]) -> Result<()> {
        let mut request = Zs01Packet::new(address);
        let mut response = Zs01Packet::new(0);

        request.data.copy_from_slice(block);
        request.encode_write_request(key, self.encoder_state);
        self.transact(&request, &mut response)
    }
}

impl<P: CartPort> CartDriver for Zs01Driver<P> {
    fn chip_type(&self) -> ChipType {
        ChipType::Zs01
    }

    fn read_cart_id(&mut self, dump: &mut CartDump) -> Result<()> {
        let ident = Identifier::new(self.read_block(addr::DS2401_ID)?);

        dump.cart_id = ident;
        if !ident.validate_checksum() {
            return Err(Error::IdChecksumMismatch);
        }

        dump.flags |= DumpFlags::CART_ID_OK;
        Ok(())
    }

    fn read_internal_id(&mut self, dump: &mut CartDump) -> Result<()> {
        let ident = Identifier::new(self.read_block(addr::ZS01_ID)?);

        dump.zs_id = ident;
        if !ident.validate_checksum() {
            return Err(Error::IdChecksumMismatch);
        }

        dump.flags |= DumpFlags::ZS_ID_OK;
        Ok(())
    }

    fn read_public_data(&mut self, dump: &mut CartDump) -> Result<()> {
        for i in addr::PUBLIC..addr::PUBLIC_END {
            let block = self.read_block(i)?;
            dump.data[i as usize * 8..][..8].copy_from_slice(&block);
        }

        dump.flags |= DumpFlags::PUBLIC_DATA_OK;
        Ok(())
    }

    fn read_private_data(&mut self, dump: &mut CartDump) -> Result<()> {
        let key = Zs01Key::unpack_from(&dump.data_key);

        for i in addr::PRIVATE..addr::PRIVATE_END {
            let block = self.read_privileged_block(&key, i)?;
            dump.data[i as usize * 8..][..8].copy_from_slice(&block);
        }

        dump.flags |= DumpFlags::PRIVATE_DATA_OK;

        let config = self.read_privileged_block(&key, addr::CONFIG)?;
        dump.config = config;

        dump.flags |= DumpFlags::CONFIG_OK;
        Ok(())
    }

    fn write_data(&mut self, dump: &mut CartDump) -> Result<()> {
        let key = Zs01Key::unpack_from(&dump.data_key);

        for i in addr::PUBLIC..addr::PRIVATE_END {
            self.write_block(&key, i, &dump.data[i as usize * 8..][..8])?;
        }

        self.write_block(&key, addr::CONFIG, &dump.config)
    }

    fn erase(&mut self, dump: &mut CartDump) -> Result<()> {
        let key = Zs01Key::unpack_from(&dump.data_key);

        self.write_block(&key, addr::ERASE, &[0; 8])?;

        dump.clear_key();
        Ok(())
    }

    fn set_data_key(&mut self, dump: &mut CartDump, key: &[u8; 8]) -> Result<()> {
        let old_key = Zs01Key::unpack_from(&dump.data_key);

        self.write_block(&old_key, addr::DATA_KEY, key)?;

        dump.data_key = *key;
        Ok(())
    }
}
