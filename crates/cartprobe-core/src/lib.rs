//! cartprobe-core - Core library for security cartridge access
//!
//! This crate implements the bus and protocol stack for the security
//! cartridges used by a family of arcade systems. Each cartridge carries one
//! of three chips: an Xicor X76F041 or X76F100 authenticated EEPROM, or a
//! Konami ZS01 encrypted memory. All three sit behind the same physical
//! connector but speak incompatible protocols, so the crate provides:
//!
//! - bit-banged primitives for the two-wire serial bus and the single-wire
//!   ID-chip bus ([`bus`]), generic over GPIO-level port traits ([`port`]),
//! - chip detection and a driver factory ([`driver::detect`]),
//! - one driver per chip family behind the [`driver::CartDriver`] trait,
//! - the caller-owned dump/session record ([`dump::CartDump`]).
//!
//! Everything is synchronous: bus timing is produced by busy-wait delays
//! supplied by the port implementation, and no operation blocks without a
//! bounded retry or timeout.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`)
//! - `alloc` - Enable heap allocation for the boxed-driver factory
//!
//! # Example
//!
//! ```ignore
//! use cartprobe_core::{driver, dump::CartDump};
//!
//! fn dump_cart<P: cartprobe_core::port::CartPort + 'static>(port: P) {
//!     let mut dump = CartDump::new();
//!     let mut drv = driver::detect(port, &mut dump);
//!
//!     match drv.read_cart_id(&mut dump) {
//!         Ok(()) => println!("cart ID: {}", dump.cart_id),
//!         Err(e) => println!("ID read failed: {}", e),
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "alloc", test))]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bus;
pub mod crc;
pub mod driver;
pub mod dump;
pub mod error;
pub mod port;
pub mod zs01;

pub use error::{Error, Result};
