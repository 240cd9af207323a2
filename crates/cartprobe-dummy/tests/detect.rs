//! Chip detection against the emulated slot

use cartprobe_core::driver::detect;
use cartprobe_core::dump::{CartDump, ChipType};
use cartprobe_dummy::{DummyChip, DummyConfig, DummySlot};

fn detect_chip(config: DummyConfig) -> (ChipType, DummySlot) {
    let mut slot = DummySlot::new(config);
    let mut dump = CartDump::new();

    let driver = detect(&mut slot, &mut dump);
    let chip_type = driver.chip_type();
    assert_eq!(chip_type, dump.chip_type);
    drop(driver);

    (chip_type, slot)
}

#[test]
fn test_detects_x76f041() {
    let (chip, _) = detect_chip(DummyConfig::with_chip(DummyChip::X76f041));
    assert_eq!(chip, ChipType::X76F041);
}

#[test]
fn test_detects_x76f100() {
    let (chip, _) = detect_chip(DummyConfig::with_chip(DummyChip::X76f100));
    assert_eq!(chip, ChipType::X76F100);
}

#[test]
fn test_detects_zs01() {
    let (chip, _) = detect_chip(DummyConfig::with_chip(DummyChip::Zs01));
    assert_eq!(chip, ChipType::Zs01);
}

#[test]
fn test_empty_slot_yields_none() {
    let (chip, _) = detect_chip(DummyConfig::with_chip(DummyChip::None));
    assert_eq!(chip, ChipType::None);
}

#[test]
fn test_unknown_id_word_yields_none() {
    let config = DummyConfig {
        id_word: Some(0xdeadbeef),
        ..DummyConfig::with_chip(DummyChip::X76f041)
    };

    let (chip, _) = detect_chip(config);
    assert_eq!(chip, ChipType::None);
}

#[test]
fn test_absent_cartridge_skips_probing() {
    let config = DummyConfig {
        cart_present: false,
        ..DummyConfig::with_chip(DummyChip::X76f041)
    };

    let (chip, slot) = detect_chip(config);
    assert_eq!(chip, ChipType::None);
    // The insertion signal gates everything; the bus must stay untouched.
    assert_eq!(slot.bus_ops(), 0);
}

#[test]
fn test_detection_resets_session_state() {
    let mut slot = DummySlot::new(DummyConfig::with_chip(DummyChip::Zs01));
    let mut dump = CartDump::new();

    let driver = detect(&mut slot, &mut dump);
    assert_eq!(driver.chip_type(), ChipType::Zs01);
    drop(driver);

    // A second detection cycle starts from a clean dump.
    dump.flags = cartprobe_core::dump::DumpFlags::all();
    let driver = detect(&mut slot, &mut dump);
    assert_eq!(driver.chip_type(), ChipType::Zs01);
    assert!(dump.flags.contains(cartprobe_core::dump::DumpFlags::HAS_CART_ID));
    assert!(!dump.flags.contains(cartprobe_core::dump::DumpFlags::PRIVATE_DATA_OK));
}
