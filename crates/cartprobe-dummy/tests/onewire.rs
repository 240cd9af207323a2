//! System (digital I/O board) ID chip reads over the single-wire bus

use cartprobe_core::driver::read_system_id;
use cartprobe_core::dump::{CartDump, DumpFlags};
use cartprobe_core::Error;
use cartprobe_dummy::{rom_id, DummyOneWire};

#[test]
fn test_read_system_id() {
    let rom = rom_id(0x01, [0xde, 0xad, 0xbe, 0xef, 0x12, 0x34]);
    let mut port = DummyOneWire::new(Some(rom));
    let mut dump = CartDump::new();

    read_system_id(&mut port, &mut dump).unwrap();

    assert_eq!(dump.system_id.data, rom);
    assert!(dump
        .flags
        .contains(DumpFlags::HAS_SYSTEM_ID | DumpFlags::SYSTEM_ID_OK));
}

#[test]
fn test_absent_chip_gives_no_device() {
    let mut port = DummyOneWire::new(None);
    let mut dump = CartDump::new();

    assert_eq!(read_system_id(&mut port, &mut dump), Err(Error::NoDevice));
    assert!(!dump.flags.contains(DumpFlags::HAS_SYSTEM_ID));
}

#[test]
fn test_corrupt_rom_fails_checksum() {
    let mut rom = rom_id(0x01, [0xde, 0xad, 0xbe, 0xef, 0x12, 0x34]);
    rom[3] ^= 0x08;

    let mut port = DummyOneWire::new(Some(rom));
    let mut dump = CartDump::new();

    assert_eq!(
        read_system_id(&mut port, &mut dump),
        Err(Error::IdChecksumMismatch)
    );
    assert!(dump.flags.contains(DumpFlags::HAS_SYSTEM_ID));
    assert!(!dump.flags.contains(DumpFlags::SYSTEM_ID_OK));
}

#[test]
fn test_family_code_zero_rejected() {
    // An all-zero ROM has a formally valid CRC but cannot be a real chip.
    let mut port = DummyOneWire::new(Some([0; 8]));
    let mut dump = CartDump::new();

    assert_eq!(
        read_system_id(&mut port, &mut dump),
        Err(Error::IdChecksumMismatch)
    );
}
