//! Bit-level slave engine for the emulated cartridge slot
//!
//! Everything here reacts to the edges the host produces on the slot's
//! lines: serial byte framing with acknowledge clocks, START/STOP
//! detection, the two response-to-reset waveforms and the time-slot-encoded
//! single-wire bus. The chip models only ever see framed bytes.

use std::collections::VecDeque;

use crate::chips::{Reply, X76f041Chip, X76f100Chip, Zs01Chip};

/// Framed traffic as seen by the emulated chip, for transcript assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// START condition (bare or select-framed)
    Start,
    /// STOP condition
    Stop,
    /// A byte the chip received and (n)acked
    Byte(u8),
}

pub(crate) enum ChipModel {
    X76f041(X76f041Chip),
    X76f100(X76f100Chip),
    Zs01(Zs01Chip),
}

impl ChipModel {
    fn on_start(&mut self) {
        match self {
            Self::X76f041(c) => c.on_start(),
            Self::X76f100(c) => c.on_start(),
            Self::Zs01(c) => c.on_start(),
        }
    }

    fn on_stop(&mut self) {
        match self {
            Self::X76f041(c) => c.on_stop(),
            Self::X76f100(c) => c.on_stop(),
            Self::Zs01(c) => c.on_stop(),
        }
    }

    fn on_reset(&mut self) {
        match self {
            Self::X76f041(c) => c.on_reset(),
            Self::X76f100(c) => c.on_reset(),
            Self::Zs01(c) => c.on_reset(),
        }
    }

    fn on_byte(&mut self, byte: u8, tx: &mut Vec<u8>) -> Reply {
        match self {
            Self::X76f041(c) => c.on_byte(byte, tx),
            Self::X76f100(c) => c.on_byte(byte, tx),
            Self::Zs01(c) => c.on_byte(byte, tx),
        }
    }

    fn is_zs01(&self) -> bool {
        matches!(self, Self::Zs01(_))
    }

    fn default_id_word(&self) -> u32 {
        match self {
            Self::X76f041(_) => 0x55aa5519,
            Self::X76f100(_) => 0x55aa0019,
            Self::Zs01(_) => 0x5a530001,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    Idle,
    Receive { bits: u8, byte: u8 },
    AckClock { ack: bool, falls: u8 },
    Send { byte: u8, bits: u8 },
    WaitAck,
    /// Host acknowledged mid-read; the next byte starts on the following
    /// clock, not on the acknowledge clock's falling edge
    PrepSend { byte: u8 },
    Float,
}

#[derive(Debug, Clone, Copy)]
enum Rtr {
    None,
    X76Shift { value: u32, idx: u8 },
    Zs01Shift { value: u32, idx: u8 },
}

/// Serial-bus slave: byte framing plus response-to-reset shifting
pub(crate) struct SerialEngine {
    pub(crate) chip: Option<ChipModel>,
    pub(crate) id_word: Option<u32>,
    pub(crate) events: Vec<BusEvent>,

    frame: Frame,
    txq: VecDeque<u8>,
    /// Slave's data-line drive; true = released
    sda_out: bool,

    // Host-driven line states
    master_sda: bool,
    scl: bool,
    cs: bool,
    rst: bool,

    rtr: Rtr,
    x76_saw_clock: bool,
    zs01_low_seen: bool,
    zs01_armed: bool,
}

impl SerialEngine {
    pub(crate) fn new(chip: Option<ChipModel>, id_word: Option<u32>) -> Self {
        Self {
            chip,
            id_word,
            events: Vec::new(),
            frame: Frame::Idle,
            txq: VecDeque::new(),
            sda_out: true,
            master_sda: true,
            scl: false,
            cs: true,
            rst: false,
            rtr: Rtr::None,
            x76_saw_clock: false,
            zs01_low_seen: false,
            zs01_armed: false,
        }
    }

    pub(crate) fn line(&self) -> bool {
        self.master_sda && self.sda_out
    }

    fn chip_id_word(&self) -> u32 {
        self.id_word
            .unwrap_or_else(|| match &self.chip {
                Some(chip) => chip.default_id_word(),
                None => 0,
            })
    }

    fn enter_rtr(&mut self, rtr: Rtr) {
        self.rtr = rtr;
        self.frame = Frame::Idle;
        self.txq.clear();
        self.sda_out = true;

        if let Some(chip) = self.chip.as_mut() {
            chip.on_reset();
        }
    }

    pub(crate) fn set_sda(&mut self, high: bool) {
        if self.master_sda == high {
            return;
        }
        self.master_sda = high;

        if self.scl {
            if high {
                self.on_stop();
            } else {
                self.on_start();
            }
        }
    }

    pub(crate) fn set_scl(&mut self, high: bool) {
        if self.scl == high {
            return;
        }
        self.scl = high;

        if high {
            self.on_scl_rising();
        } else {
            self.on_scl_falling();
        }
    }

    pub(crate) fn set_cs(&mut self, high: bool) {
        if self.cs == high {
            return;
        }
        self.cs = high;

        if high {
            // Deselect aborts everything in flight.
            self.frame = Frame::Idle;
            self.txq.clear();
            self.sda_out = true;
            self.rtr = Rtr::None;
        }
    }

    pub(crate) fn set_reset(&mut self, high: bool) {
        if self.rst == high {
            return;
        }
        self.rst = high;

        let is_zs01 = matches!(&self.chip, Some(chip) if chip.is_zs01());

        if is_zs01 {
            if high {
                if self.zs01_low_seen {
                    self.zs01_armed = true;
                    self.zs01_low_seen = false;
                    self.frame = Frame::Idle;
                    self.txq.clear();

                    if let Some(chip) = self.chip.as_mut() {
                        chip.on_reset();
                    }
                }
            } else {
                self.zs01_low_seen = true;
                self.zs01_armed = false;
                self.rtr = Rtr::None;
                self.sda_out = true;
            }
        } else if self.chip.is_some() {
            if high {
                self.x76_saw_clock = false;
                self.rtr = Rtr::None;
                self.sda_out = true;
            } else if self.x76_saw_clock {
                let value = self.chip_id_word();
                self.x76_saw_clock = false;
                self.enter_rtr(Rtr::X76Shift { value, idx: 0 });
            }
        }
    }

    fn on_start(&mut self) {
        self.events.push(BusEvent::Start);
        self.frame = Frame::Receive { bits: 0, byte: 0 };
        self.txq.clear();
        self.sda_out = true;

        if let Some(chip) = self.chip.as_mut() {
            chip.on_start();
        }
    }

    fn on_stop(&mut self) {
        self.events.push(BusEvent::Stop);
        self.frame = Frame::Idle;
        self.txq.clear();
        self.sda_out = true;

        if let Some(chip) = self.chip.as_mut() {
            chip.on_stop();
        }
    }

    fn on_scl_rising(&mut self) {
        let is_zs01 = matches!(&self.chip, Some(chip) if chip.is_zs01());

        if self.rst && !is_zs01 {
            self.x76_saw_clock = true;
        }

        if let Rtr::X76Shift { value, idx } = self.rtr {
            if idx < 32 {
                self.sda_out = (value >> idx) & 1 != 0;
                self.rtr = Rtr::X76Shift {
                    value,
                    idx: idx + 1,
                };
            } else {
                self.sda_out = true;
                self.rtr = Rtr::None;
            }
            return;
        }

        match self.frame {
            Frame::Receive { bits, byte } => {
                let bit = self.line() as u8;
                let byte = (byte << 1) | bit;
                let bits = bits + 1;

                if bits == 8 {
                    self.events.push(BusEvent::Byte(byte));

                    let mut tx = Vec::new();
                    let reply = match self.chip.as_mut() {
                        Some(chip) => chip.on_byte(byte, &mut tx),
                        None => Reply::Nack,
                    };
                    self.txq.extend(tx);

                    let ack = reply == Reply::Ack;
                    self.sda_out = !ack;
                    self.frame = Frame::AckClock { ack, falls: 0 };
                } else {
                    self.frame = Frame::Receive { bits, byte };
                }
            }
            Frame::Send { byte, bits } => {
                self.sda_out = (byte >> (7 - bits)) & 1 != 0;
            }
            Frame::WaitAck => {
                if !self.line() {
                    // Host acknowledged, keep sending if anything is queued.
                    self.frame = match self.txq.pop_front() {
                        Some(byte) => Frame::PrepSend { byte },
                        None => Frame::Float,
                    };
                } else {
                    self.txq.clear();
                    self.frame = Frame::Float;
                }
            }
            Frame::AckClock { .. } | Frame::PrepSend { .. } | Frame::Idle | Frame::Float => {}
        }
    }

    fn on_scl_falling(&mut self) {
        let is_zs01 = matches!(&self.chip, Some(chip) if chip.is_zs01());

        if is_zs01 {
            match self.rtr {
                Rtr::Zs01Shift { value, idx } => {
                    if idx == 0 {
                        self.rtr = Rtr::None;
                        self.sda_out = true;
                    } else {
                        self.sda_out = (value >> (idx - 1)) & 1 != 0;
                        self.rtr = Rtr::Zs01Shift {
                            value,
                            idx: idx - 1,
                        };
                    }
                    return;
                }
                Rtr::None if self.zs01_armed => {
                    let value = self.chip_id_word();
                    self.zs01_armed = false;
                    self.sda_out = (value >> 31) & 1 != 0;
                    self.rtr = Rtr::Zs01Shift { value, idx: 31 };
                    return;
                }
                _ => {}
            }
        }

        match self.frame {
            Frame::AckClock { ack, falls } => {
                let falls = falls + 1;

                if falls == 2 {
                    self.sda_out = true;
                    self.frame = if ack {
                        match self.txq.pop_front() {
                            Some(byte) => Frame::Send { byte, bits: 0 },
                            None => Frame::Receive { bits: 0, byte: 0 },
                        }
                    } else {
                        Frame::Receive { bits: 0, byte: 0 }
                    };
                } else {
                    self.frame = Frame::AckClock { ack, falls };
                }
            }
            Frame::Send { byte, bits } => {
                let bits = bits + 1;

                if bits == 8 {
                    self.sda_out = true;
                    self.frame = Frame::WaitAck;
                } else {
                    self.frame = Frame::Send { byte, bits };
                }
            }
            Frame::PrepSend { byte } => {
                self.frame = Frame::Send { byte, bits: 0 };
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum OwState {
    Idle,
    Command { byte: u8, bits: u8 },
    Send { bit: usize },
}

/// Single-wire slave decoding the host's time-slot waveforms
///
/// Bit values ride on low-pulse durations, so this model runs off the
/// slot's virtual microsecond clock rather than edge counts.
pub(crate) struct OneWireEngine {
    pub(crate) rom: Option<[u8; 8]>,
    master_high: bool,
    low_since: u64,
    pull_until: u64,
    state: OwState,
}

const OW_RESET_THRESHOLD: u64 = 400;
const OW_BIT_THRESHOLD: u64 = 15;
const OW_PRESENCE_TIME: u64 = 100;
const OW_ZERO_PULL_TIME: u64 = 30;

impl OneWireEngine {
    pub(crate) fn new(rom: Option<[u8; 8]>) -> Self {
        Self {
            rom,
            master_high: true,
            low_since: 0,
            pull_until: 0,
            state: OwState::Idle,
        }
    }

    pub(crate) fn set_pin(&mut self, now: u64, high: bool) {
        if self.master_high == high {
            return;
        }
        self.master_high = high;

        if !high {
            self.low_since = now;
            return;
        }

        let duration = now - self.low_since;

        if duration >= OW_RESET_THRESHOLD {
            if self.rom.is_some() {
                self.pull_until = now + OW_PRESENCE_TIME;
                self.state = OwState::Command { byte: 0, bits: 0 };
            } else {
                self.state = OwState::Idle;
            }
            return;
        }

        match self.state {
            OwState::Command { byte, bits } => {
                let bit = (duration < OW_BIT_THRESHOLD) as u8;
                let byte = byte | (bit << bits);
                let bits = bits + 1;

                if bits == 8 {
                    self.state = if byte == 0x33 && self.rom.is_some() {
                        OwState::Send { bit: 0 }
                    } else {
                        OwState::Idle
                    };
                } else {
                    self.state = OwState::Command { byte, bits };
                }
            }
            OwState::Send { bit } => {
                // Short host pulse opens a read slot; stretch the low time
                // to answer a 0 bit.
                if let Some(rom) = self.rom {
                    let value = (rom[bit / 8] >> (bit % 8)) & 1;
                    if value == 0 {
                        self.pull_until = now + OW_ZERO_PULL_TIME;
                    }
                }

                self.state = if bit + 1 == 64 {
                    OwState::Idle
                } else {
                    OwState::Send { bit: bit + 1 }
                };
            }
            OwState::Idle => {}
        }
    }

    pub(crate) fn get_pin(&self, now: u64) -> bool {
        self.master_high && now >= self.pull_until
    }
}
