//! Bit-banged bus primitives
//!
//! Pure electrical-level bit and byte transfer over the two cartridge buses,
//! with no buffering and no error correction. Every clock edge is produced
//! in software, paced by the port's busy-wait delay.
//!
//! These primitives never fail by signaling: a silent or absent chip simply
//! reads back as all-ones or all-zeros, which the protocol layers catch
//! through checksums or missing acknowledge bits.

pub mod onewire;
pub mod serial;
