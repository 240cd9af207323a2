//! X76F041/X76F100 driver operations against the emulated chips

use cartprobe_core::driver::{CartDriver, X76f041Driver, X76f100Driver};
use cartprobe_core::dump::{CartDump, DumpFlags};
use cartprobe_core::Error;
use cartprobe_dummy::{rom_id, BusEvent, DummyChip, DummyConfig, DummySlot};

const KEY: [u8; 8] = [0x4b, 0x4f, 0x4e, 0x41, 0x4d, 0x49, 0x2e, 0x2e];

fn f041_slot(key: [u8; 8]) -> DummySlot {
    DummySlot::new(DummyConfig {
        data_key: key,
        ..DummyConfig::with_chip(DummyChip::X76f041)
    })
}

fn f100_slot(key: [u8; 8]) -> DummySlot {
    DummySlot::new(DummyConfig {
        data_key: key,
        ..DummyConfig::with_chip(DummyChip::X76f100)
    })
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(3)).collect()
}

#[test]
fn test_f041_command_byte_sequence() {
    let mut slot = f041_slot(KEY);
    let mut dump = CartDump::new();
    let mut driver = X76f041Driver::new(&mut slot, &mut dump);

    dump.data_key = KEY;
    driver.read_config(&mut dump).unwrap();
    drop(driver);

    // Select-framed command + op-code + key, then one bare-start poll.
    let mut expected = vec![
        BusEvent::Start,
        BusEvent::Byte(0x80),
        BusEvent::Byte(0x60),
    ];
    expected.extend(KEY.iter().map(|&b| BusEvent::Byte(b)));
    expected.extend([BusEvent::Start, BusEvent::Byte(0xc0), BusEvent::Stop]);

    assert_eq!(slot.events(), &expected[..]);
}

#[test]
fn test_f041_read_private_data() {
    let mut slot = f041_slot(KEY);
    let data = pattern(512);
    let config = [0xff, 0xaf, 0x20, 0x03, 0x00];
    {
        let chip = slot.x76f041().unwrap();
        chip.data.copy_from_slice(&data);
        chip.config = config;
    }

    let mut dump = CartDump::new();
    let mut driver = X76f041Driver::new(&mut slot, &mut dump);
    dump.data_key = KEY;

    driver.read_private_data(&mut dump).unwrap();

    assert_eq!(&dump.data[..], &data[..]);
    assert_eq!(&dump.config[..5], &config[..]);
    assert_eq!(dump.config[5..], [0; 3]);
    assert!(dump
        .flags
        .contains(DumpFlags::PRIVATE_DATA_OK | DumpFlags::CONFIG_OK));
}

#[test]
fn test_f041_wrong_key_times_out() {
    let mut slot = f041_slot(KEY);
    let mut dump = CartDump::new();
    let mut driver = X76f041Driver::new(&mut slot, &mut dump);
    dump.data_key = [0x55; 8];

    assert_eq!(
        driver.read_private_data(&mut dump),
        Err(Error::AuthPollTimeout)
    );
    assert!(!dump.flags.contains(DumpFlags::PRIVATE_DATA_OK));
}

#[test]
fn test_ack_poll_succeeds_on_last_attempt() {
    let mut slot = DummySlot::new(DummyConfig {
        data_key: KEY,
        ack_poll_after: 5,
        ..DummyConfig::with_chip(DummyChip::X76f041)
    });
    let mut dump = CartDump::new();
    let mut driver = X76f041Driver::new(&mut slot, &mut dump);
    dump.data_key = KEY;

    driver.read_config(&mut dump).unwrap();
}

#[test]
fn test_ack_poll_exhausted_after_five_attempts() {
    let mut slot = DummySlot::new(DummyConfig {
        data_key: KEY,
        ack_poll_after: 6,
        ..DummyConfig::with_chip(DummyChip::X76f041)
    });
    let mut dump = CartDump::new();
    let mut driver = X76f041Driver::new(&mut slot, &mut dump);
    dump.data_key = KEY;

    assert_eq!(driver.read_config(&mut dump), Err(Error::AuthPollTimeout));
}

#[test]
fn test_f041_write_data() {
    let mut slot = f041_slot(KEY);
    let data = pattern(512);

    let mut dump = CartDump::new();
    let mut driver = X76f041Driver::new(&mut slot, &mut dump);
    dump.data_key = KEY;
    dump.data.copy_from_slice(&data);
    dump.config = [0xff, 0xff, 0x20, 0x05, 0x00, 0x00, 0x00, 0x00];

    driver.write_data(&mut dump).unwrap();
    drop(driver);

    let chip = slot.x76f041().unwrap();
    assert_eq!(&chip.data[..], &data[..]);
    assert_eq!(chip.config, [0xff, 0xff, 0x20, 0x05, 0x00]);
}

#[test]
fn test_f041_erase_blanks_chip_and_key() {
    let mut slot = f041_slot(KEY);
    slot.x76f041().unwrap().data[0] = 0xa5;

    let mut dump = CartDump::new();
    let mut driver = X76f041Driver::new(&mut slot, &mut dump);
    dump.data_key = KEY;

    driver.erase(&mut dump).unwrap();
    assert_eq!(dump.data_key, [0; 8]);
    drop(driver);

    let chip = slot.x76f041().unwrap();
    assert_eq!(chip.data, [0; 512]);
    assert_eq!(chip.key, [0; 8]);
}

#[test]
fn test_f041_set_data_key() {
    let new_key = [0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80];

    let mut slot = f041_slot(KEY);
    let mut dump = CartDump::new();
    let mut driver = X76f041Driver::new(&mut slot, &mut dump);
    dump.data_key = KEY;

    driver.set_data_key(&mut dump, &new_key).unwrap();
    assert_eq!(dump.data_key, new_key);

    // The new key must authenticate subsequent operations.
    driver.read_config(&mut dump).unwrap();
    drop(driver);

    assert_eq!(slot.x76f041().unwrap().key, new_key);
}

#[test]
fn test_f041_write_config() {
    let mut slot = f041_slot(KEY);
    let mut dump = CartDump::new();
    let mut driver = X76f041Driver::new(&mut slot, &mut dump);
    dump.data_key = KEY;
    dump.config = [0xff, 0xaf, 0x20, 0x03, 0x00, 0x00, 0x00, 0x00];

    driver.write_config(&mut dump).unwrap();
    drop(driver);

    assert_eq!(slot.x76f041().unwrap().config, [0xff, 0xaf, 0x20, 0x03, 0x00]);
}

#[test]
fn test_f041_has_no_public_read() {
    let mut slot = f041_slot(KEY);
    let mut dump = CartDump::new();
    let mut driver = X76f041Driver::new(&mut slot, &mut dump);

    assert_eq!(driver.read_public_data(&mut dump), Err(Error::UnsupportedOp));
    assert_eq!(driver.read_internal_id(&mut dump), Err(Error::UnsupportedOp));
}

#[test]
fn test_cart_id_read() {
    let rom = rom_id(0x01, [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x0f]);
    let mut slot = DummySlot::new(DummyConfig {
        cart_rom: Some(rom),
        ..DummyConfig::with_chip(DummyChip::X76f041)
    });

    let mut dump = CartDump::new();
    let mut driver = X76f041Driver::new(&mut slot, &mut dump);

    driver.read_cart_id(&mut dump).unwrap();
    assert_eq!(dump.cart_id.data, rom);
    assert!(dump
        .flags
        .contains(DumpFlags::HAS_CART_ID | DumpFlags::CART_ID_OK));
}

#[test]
fn test_cart_id_checksum_failure() {
    let mut rom = rom_id(0x01, [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x0f]);
    rom[7] ^= 0xff;

    let mut slot = DummySlot::new(DummyConfig {
        cart_rom: Some(rom),
        ..DummyConfig::with_chip(DummyChip::X76f041)
    });

    let mut dump = CartDump::new();
    let mut driver = X76f041Driver::new(&mut slot, &mut dump);

    assert_eq!(driver.read_cart_id(&mut dump), Err(Error::IdChecksumMismatch));
    // The chip answered, it just answered garbage.
    assert!(dump.flags.contains(DumpFlags::HAS_CART_ID));
    assert!(!dump.flags.contains(DumpFlags::CART_ID_OK));
}

#[test]
fn test_cart_id_absent() {
    let mut slot = DummySlot::new(DummyConfig {
        cart_rom: None,
        ..DummyConfig::with_chip(DummyChip::X76f041)
    });

    let mut dump = CartDump::new();
    let mut driver = X76f041Driver::new(&mut slot, &mut dump);

    assert_eq!(driver.read_cart_id(&mut dump), Err(Error::NoDevice));
    assert!(!dump.flags.contains(DumpFlags::HAS_CART_ID));
}

#[test]
fn test_f100_read_private_data() {
    let mut slot = f100_slot(KEY);
    let data = pattern(112);
    slot.x76f100().unwrap().data.copy_from_slice(&data);

    let mut dump = CartDump::new();
    let mut driver = X76f100Driver::new(&mut slot, &mut dump);
    dump.data_key = KEY;

    driver.read_private_data(&mut dump).unwrap();
    assert_eq!(&dump.data[..112], &data[..]);
    assert!(dump.flags.contains(DumpFlags::PRIVATE_DATA_OK));
}

#[test]
fn test_f100_write_and_readback() {
    let mut slot = f100_slot(KEY);
    let data = pattern(112);

    let mut dump = CartDump::new();
    let mut driver = X76f100Driver::new(&mut slot, &mut dump);
    dump.data_key = KEY;
    dump.data[..112].copy_from_slice(&data);

    driver.write_data(&mut dump).unwrap();

    dump.data = [0; 512];
    driver.read_private_data(&mut dump).unwrap();
    assert_eq!(&dump.data[..112], &data[..]);
}

#[test]
fn test_f100_wrong_key_times_out() {
    let mut slot = f100_slot(KEY);
    let mut dump = CartDump::new();
    let mut driver = X76f100Driver::new(&mut slot, &mut dump);
    dump.data_key = [0xee; 8];

    assert_eq!(
        driver.read_private_data(&mut dump),
        Err(Error::AuthPollTimeout)
    );
}

#[test]
fn test_f100_erase_overwrites_and_rekeys() {
    let mut slot = f100_slot(KEY);
    slot.x76f100().unwrap().data = [0x77; 112];

    let mut dump = CartDump::new();
    let mut driver = X76f100Driver::new(&mut slot, &mut dump);
    dump.data_key = KEY;

    driver.erase(&mut dump).unwrap();
    assert_eq!(dump.data_key, [0; 8]);
    drop(driver);

    let chip = slot.x76f100().unwrap();
    assert_eq!(chip.data, [0; 112]);
    assert_eq!(chip.read_key, [0; 8]);
    assert_eq!(chip.write_key, [0; 8]);
}

#[test]
fn test_f100_set_key_programs_both_slots() {
    let new_key = [0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10, 0x11];

    let mut slot = f100_slot(KEY);
    let mut dump = CartDump::new();
    let mut driver = X76f100Driver::new(&mut slot, &mut dump);
    dump.data_key = KEY;

    driver.set_data_key(&mut dump, &new_key).unwrap();
    drop(driver);

    let chip = slot.x76f100().unwrap();
    assert_eq!(chip.read_key, new_key);
    assert_eq!(chip.write_key, new_key);
}

#[test]
fn test_f100_has_no_config() {
    let mut slot = f100_slot(KEY);
    let mut dump = CartDump::new();
    let mut driver = X76f100Driver::new(&mut slot, &mut dump);

    assert_eq!(driver.read_config(&mut dump), Err(Error::UnsupportedOp));
    assert_eq!(driver.write_config(&mut dump), Err(Error::UnsupportedOp));
}
