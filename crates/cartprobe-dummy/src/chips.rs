//! Behavioral models of the three cartridge chips
//!
//! Each model consumes framed bytes from the bus engine and, where a reply
//! is expected, fills the engine's transmit queue. The models deliberately
//! stay byte-level: bit framing, acknowledge clocks and START/STOP
//! detection all live in the engine.

use cartprobe_core::crc::zs_crc16;
use cartprobe_core::zs01::{self, Zs01Key, COMMAND_KEY, RESPONSE_KEY};

/// Reply to a received byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reply {
    Ack,
    Nack,
}

/// X76F041 command decoding
const F041_ACK_POLL: u8 = 0xc0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum F041Op {
    Read { hi: u8 },
    Write { addr: usize },
    SetKey,
    ReadConfig,
    WriteConfig,
    MassProgram,
    Invalid,
}

#[derive(Debug, Clone, Copy)]
enum F041Phase {
    Ready,
    Param { cmd: u8 },
    Key { cmd: u8, param: u8, buf: [u8; 8], got: usize },
    Busy { op: F041Op, key_ok: bool, polls: u32 },
    AwaitReadAddr { hi: u8 },
    CollectData { addr: usize, buf: [u8; 8], got: usize },
    CollectKey { buf: [u8; 16], got: usize },
    CollectConfig { buf: [u8; 5], got: usize },
    Done,
}

/// Emulated X76F041 (512-byte array, one key, config registers)
pub struct X76f041Chip {
    pub data: [u8; 512],
    pub key: [u8; 8],
    pub config: [u8; 5],
    /// Which poll attempt gets acknowledged (1 = first); models the chip's
    /// internal verify/programming time
    pub ack_poll_after: u32,
    phase: F041Phase,
}

impl X76f041Chip {
    pub fn new(key: [u8; 8]) -> Self {
        Self {
            data: [0; 512],
            key,
            config: [0; 5],
            ack_poll_after: 1,
            phase: F041Phase::Ready,
        }
    }

    pub(crate) fn on_start(&mut self) {}

    pub(crate) fn on_stop(&mut self) {
        self.phase = F041Phase::Ready;
    }

    pub(crate) fn on_reset(&mut self) {
        self.phase = F041Phase::Ready;
    }

    fn decode_op(cmd: u8, param: u8) -> F041Op {
        match cmd {
            0x60..=0x67 => F041Op::Read { hi: cmd & 0x07 },
            0x40..=0x47 => F041Op::Write {
                addr: ((cmd as usize & 0x07) << 8) | param as usize,
            },
            0x80 => match param {
                0x20 => F041Op::SetKey,
                0x60 => F041Op::ReadConfig,
                0x50 => F041Op::WriteConfig,
                0x70 => F041Op::MassProgram,
                _ => F041Op::Invalid,
            },
            _ => F041Op::Invalid,
        }
    }

    pub(crate) fn on_byte(&mut self, byte: u8, tx: &mut Vec<u8>) -> Reply {
        match self.phase {
            F041Phase::Ready => {
                self.phase = F041Phase::Param { cmd: byte };
                Reply::Ack
            }
            F041Phase::Param { cmd } => {
                self.phase = F041Phase::Key {
                    cmd,
                    param: byte,
                    buf: [0; 8],
                    got: 0,
                };
                Reply::Ack
            }
            F041Phase::Key {
                cmd,
                param,
                mut buf,
                got,
            } => {
                buf[got] = byte;

                if got + 1 == 8 {
                    let op = Self::decode_op(cmd, param);
                    self.phase = F041Phase::Busy {
                        op,
                        key_ok: buf == self.key,
                        polls: 0,
                    };
                } else {
                    self.phase = F041Phase::Key {
                        cmd,
                        param,
                        buf,
                        got: got + 1,
                    };
                }
                Reply::Ack
            }
            F041Phase::Busy { op, key_ok, polls } => {
                if byte != F041_ACK_POLL {
                    return Reply::Nack;
                }

                let polls = polls + 1;
                if !key_ok || op == F041Op::Invalid || polls < self.ack_poll_after {
                    self.phase = F041Phase::Busy { op, key_ok, polls };
                    return Reply::Nack;
                }

                match op {
                    F041Op::Read { hi } => {
                        tx.push(0x00); // secure read setup byte
                        self.phase = F041Phase::AwaitReadAddr { hi };
                    }
                    F041Op::Write { addr } => {
                        self.phase = F041Phase::CollectData {
                            addr,
                            buf: [0; 8],
                            got: 0,
                        };
                    }
                    F041Op::SetKey => {
                        self.phase = F041Phase::CollectKey {
                            buf: [0; 16],
                            got: 0,
                        };
                    }
                    F041Op::ReadConfig => {
                        tx.extend_from_slice(&self.config);
                        self.phase = F041Phase::Done;
                    }
                    F041Op::WriteConfig => {
                        self.phase = F041Phase::CollectConfig {
                            buf: [0; 5],
                            got: 0,
                        };
                    }
                    F041Op::MassProgram => {
                        self.data = [0; 512];
                        self.key = [0; 8];
                        self.config = [0; 5];
                        self.phase = F041Phase::Done;
                    }
                    F041Op::Invalid => unreachable!(),
                }
                Reply::Ack
            }
            F041Phase::AwaitReadAddr { hi } => {
                let start = (((hi as usize) << 8) | byte as usize).min(512);
                let end = (start + 128).min(512);

                tx.extend_from_slice(&self.data[start..end]);
                self.phase = F041Phase::Done;
                Reply::Ack
            }
            F041Phase::CollectData { addr, mut buf, got } => {
                buf[got] = byte;

                if got + 1 == 8 {
                    if addr + 8 <= 512 {
                        self.data[addr..addr + 8].copy_from_slice(&buf);
                    }
                    self.phase = F041Phase::Done;
                } else {
                    self.phase = F041Phase::CollectData {
                        addr,
                        buf,
                        got: got + 1,
                    };
                }
                Reply::Ack
            }
            F041Phase::CollectKey { mut buf, got } => {
                buf[got] = byte;

                if got + 1 == 16 {
                    // The key is transmitted twice; only a matching pair is
                    // committed.
                    if buf[..8] == buf[8..] {
                        self.key.copy_from_slice(&buf[..8]);
                    }
                    self.phase = F041Phase::Done;
                } else {
                    self.phase = F041Phase::CollectKey { buf, got: got + 1 };
                }
                Reply::Ack
            }
            F041Phase::CollectConfig { mut buf, got } => {
                buf[got] = byte;

                if got + 1 == 5 {
                    self.config = buf;
                    self.phase = F041Phase::Done;
                } else {
                    self.phase = F041Phase::CollectConfig { buf, got: got + 1 };
                }
                Reply::Ack
            }
            F041Phase::Done => Reply::Ack,
        }
    }
}

/// X76F100 command decoding
const F100_ACK_POLL: u8 = 0x55;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum F100Op {
    Read,
    Write { offset: usize },
    SetKey { slot: usize },
    Invalid,
}

#[derive(Debug, Clone, Copy)]
enum F100Phase {
    Ready,
    Key { cmd: u8, buf: [u8; 8], got: usize },
    Busy { op: F100Op, key_ok: bool, polls: u32 },
    CollectData { offset: usize, buf: [u8; 8], got: usize },
    CollectKey { slot: usize, buf: [u8; 8], got: usize },
    Done,
}

/// Emulated X76F100 (112-byte array, separate read and write keys)
pub struct X76f100Chip {
    pub data: [u8; 112],
    pub read_key: [u8; 8],
    pub write_key: [u8; 8],
    pub ack_poll_after: u32,
    phase: F100Phase,
}

impl X76f100Chip {
    pub fn new(key: [u8; 8]) -> Self {
        Self {
            data: [0; 112],
            read_key: key,
            write_key: key,
            ack_poll_after: 1,
            phase: F100Phase::Ready,
        }
    }

    pub(crate) fn on_start(&mut self) {}

    pub(crate) fn on_stop(&mut self) {
        self.phase = F100Phase::Ready;
    }

    pub(crate) fn on_reset(&mut self) {
        self.phase = F100Phase::Ready;
    }

    fn decode_op(cmd: u8) -> F100Op {
        match cmd {
            0x81 => F100Op::Read,
            0xfc | 0xfe => F100Op::SetKey {
                slot: ((cmd >> 1) & 1) as usize,
            },
            0x80..=0x9a => {
                let offset = ((cmd as usize & 0x7f) >> 1) * 8;
                if offset < 112 {
                    F100Op::Write { offset }
                } else {
                    F100Op::Invalid
                }
            }
            _ => F100Op::Invalid,
        }
    }

    pub(crate) fn on_byte(&mut self, byte: u8, tx: &mut Vec<u8>) -> Reply {
        match self.phase {
            F100Phase::Ready => {
                self.phase = F100Phase::Key {
                    cmd: byte,
                    buf: [0; 8],
                    got: 0,
                };
                Reply::Ack
            }
            F100Phase::Key { cmd, mut buf, got } => {
                buf[got] = byte;

                if got + 1 == 8 {
                    let op = Self::decode_op(cmd);
                    let key_ok = match op {
                        F100Op::Read => buf == self.read_key,
                        F100Op::Write { .. } | F100Op::SetKey { .. } => buf == self.write_key,
                        F100Op::Invalid => false,
                    };
                    self.phase = F100Phase::Busy {
                        op,
                        key_ok,
                        polls: 0,
                    };
                } else {
                    self.phase = F100Phase::Key {
                        cmd,
                        buf,
                        got: got + 1,
                    };
                }
                Reply::Ack
            }
            F100Phase::Busy { op, key_ok, polls } => {
                if byte != F100_ACK_POLL {
                    return Reply::Nack;
                }

                let polls = polls + 1;
                if !key_ok || op == F100Op::Invalid || polls < self.ack_poll_after {
                    self.phase = F100Phase::Busy { op, key_ok, polls };
                    return Reply::Nack;
                }

                match op {
                    F100Op::Read => {
                        tx.extend_from_slice(&self.data);
                        self.phase = F100Phase::Done;
                    }
                    F100Op::Write { offset } => {
                        self.phase = F100Phase::CollectData {
                            offset,
                            buf: [0; 8],
                            got: 0,
                        };
                    }
                    F100Op::SetKey { slot } => {
                        self.phase = F100Phase::CollectKey {
                            slot,
                            buf: [0; 8],
                            got: 0,
                        };
                    }
                    F100Op::Invalid => unreachable!(),
                }
                Reply::Ack
            }
            F100Phase::CollectData {
                offset,
                mut buf,
                got,
            } => {
                buf[got] = byte;

                if got + 1 == 8 {
                    self.data[offset..offset + 8].copy_from_slice(&buf);
                    self.phase = F100Phase::Done;
                } else {
                    self.phase = F100Phase::CollectData {
                        offset,
                        buf,
                        got: got + 1,
                    };
                }
                Reply::Ack
            }
            F100Phase::CollectKey { slot, mut buf, got } => {
                buf[got] = byte;

                if got + 1 == 8 {
                    if slot == 0 {
                        self.read_key = buf;
                    } else {
                        self.write_key = buf;
                    }
                    self.phase = F100Phase::Done;
                } else {
                    self.phase = F100Phase::CollectKey {
                        slot,
                        buf,
                        got: got + 1,
                    };
                }
                Reply::Ack
            }
            F100Phase::Done => Reply::Ack,
        }
    }
}

/// Emulated ZS01 (112-byte array behind the packet protocol)
pub struct Zs01Chip {
    pub data: [u8; 112],
    pub key: [u8; 8],
    pub config: [u8; 8],
    pub zs_id: [u8; 8],
    pub ds_id: [u8; 8],
    response_key: Zs01Key,
    session_state: u8,
    seq: u8,
    collect: [u8; 12],
    got: usize,
}

impl Zs01Chip {
    pub fn new(key: [u8; 8], zs_id: [u8; 8], ds_id: [u8; 8]) -> Self {
        Self {
            data: [0; 112],
            key,
            config: [0; 8],
            zs_id,
            ds_id,
            response_key: RESPONSE_KEY,
            session_state: 0,
            seq: 0,
            collect: [0; 12],
            got: 0,
        }
    }

    pub(crate) fn on_start(&mut self) {}

    pub(crate) fn on_stop(&mut self) {
        self.got = 0;
    }

    pub(crate) fn on_reset(&mut self) {
        self.got = 0;
        self.session_state = 0;
    }

    pub(crate) fn on_byte(&mut self, byte: u8, tx: &mut Vec<u8>) -> Reply {
        self.collect[self.got] = byte;
        self.got += 1;

        if self.got == 12 {
            self.got = 0;
            let response = self.process();
            tx.extend_from_slice(&response);
        }

        Reply::Ack
    }

    fn respond(&mut self, status: u8, data: [u8; 8]) -> [u8; 12] {
        self.seq = self.seq.wrapping_add(0x45).max(1);
        let state = self.seq;

        let mut resp = [0u8; 12];
        resp[0] = status;
        resp[1] = state;
        resp[2..10].copy_from_slice(&data);
        let crc = zs_crc16(&resp[..10]);
        resp[10..12].copy_from_slice(&crc.to_be_bytes());

        self.session_state = state;
        self.response_key.encode_packet(&mut resp, 0xff);
        resp
    }

    fn block(&self, address: u8) -> [u8; 8] {
        let mut block = [0u8; 8];
        block.copy_from_slice(&self.data[address as usize * 8..][..8]);
        block
    }

    fn process(&mut self) -> [u8; 12] {
        let mut req = self.collect;
        COMMAND_KEY.decode_packet(&mut req, 0xff);

        let command = req[0];
        let address = req[1];
        let privileged = command & zs01::req::PRIVILEGED != 0;

        if privileged {
            let chip_key = Zs01Key::unpack_from(&self.key);
            chip_key.decode_payload(&mut req[2..10], self.session_state);
        }

        let crc = u16::from_be_bytes([req[10], req[11]]);
        if crc != zs_crc16(&req[..10]) {
            // Covers both garbled packets and a wrong data key: either way
            // the plaintext CRC cannot match.
            return self.respond(zs01::resp::SECURITY_ERROR2, [0; 8]);
        }

        let mut payload = [0u8; 8];
        payload.copy_from_slice(&req[2..10]);

        if command & zs01::req::READ != 0 {
            // The payload of every read request is the key the host wants
            // responses encoded with.
            self.response_key = Zs01Key::unpack_from(&payload);

            match address {
                0x00..=0x03 => {
                    let block = self.block(address);
                    self.respond(zs01::resp::NO_ERROR, block)
                }
                0x04..=0x0d => {
                    if !privileged {
                        return self.respond(zs01::resp::SECURITY_ERROR1, [0; 8]);
                    }
                    let block = self.block(address);
                    self.respond(zs01::resp::NO_ERROR, block)
                }
                zs01::addr::ZS01_ID => {
                    let id = self.zs_id;
                    self.respond(zs01::resp::NO_ERROR, id)
                }
                zs01::addr::DS2401_ID => {
                    let id = self.ds_id;
                    self.respond(zs01::resp::NO_ERROR, id)
                }
                zs01::addr::CONFIG => {
                    if !privileged {
                        return self.respond(zs01::resp::SECURITY_ERROR1, [0; 8]);
                    }
                    let config = self.config;
                    self.respond(zs01::resp::NO_ERROR, config)
                }
                _ => self.respond(zs01::resp::UNKNOWN_ERROR2, [0; 8]),
            }
        } else {
            if !privileged {
                return self.respond(zs01::resp::SECURITY_ERROR1, [0; 8]);
            }

            match address {
                0x00..=0x0d => {
                    self.data[address as usize * 8..][..8].copy_from_slice(&payload);
                    self.respond(zs01::resp::NO_ERROR, [0; 8])
                }
                zs01::addr::ERASE => {
                    self.data = [0; 112];
                    self.key = [0; 8];
                    self.config = [0; 8];
                    self.respond(zs01::resp::NO_ERROR, [0; 8])
                }
                zs01::addr::CONFIG => {
                    self.config = payload;
                    self.respond(zs01::resp::NO_ERROR, [0; 8])
                }
                zs01::addr::DATA_KEY => {
                    self.key = payload;
                    self.respond(zs01::resp::NO_ERROR, [0; 8])
                }
                _ => self.respond(zs01::resp::UNKNOWN_ERROR2, [0; 8]),
            }
        }
    }
}
