//! cartprobe - Security cartridge diagnostic tool
//!
//! A diagnostic/recovery tool for arcade security cartridges. Each
//! cartridge carries one of three chips (X76F041, X76F100 or ZS01) behind
//! a shared connector; the tool auto-detects which one is present, speaks
//! its wire protocol and reads, writes or erases its contents.
//!
//! The protocol stack lives in `cartprobe-core`; this binary only wires a
//! port backend to the drivers and renders results.

mod cli;
mod ports;

use std::path::Path;

use clap::Parser;

use cartprobe_core::driver::{self, CartDriver};
use cartprobe_core::dump::{CartDump, ChipType, DumpFlags};
use cartprobe_core::port::CartPort;
use cartprobe_core::Error as DriverError;

use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.verbose {
        0 => {}
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let result = match cli.command {
        Commands::Probe { port } => run_probe(&port),
        Commands::Read { port, output, key } => run_read(&port, &output, key.unwrap_or([0; 8])),
        Commands::Write { port, input, key } => run_write(&port, &input, key.unwrap_or([0; 8])),
        Commands::Erase { port, key } => run_erase(&port, key.unwrap_or([0; 8])),
        Commands::SetKey { port, key, new_key } => {
            run_set_key(&port, key.unwrap_or([0; 8]), &new_key)
        }
    };

    if let Err(e) = &result {
        if let Some(driver_error) = e.downcast_ref::<DriverError>() {
            eprintln!("Error: {}", driver_error);
            eprintln!("Hint: {}", recovery_hint(driver_error));
            std::process::exit(1);
        }
    }

    result
}

/// Suggest the caller's next move for each failure class
fn recovery_hint(error: &DriverError) -> &'static str {
    match error {
        DriverError::AuthPollTimeout | DriverError::PacketStatus(_) => {
            "the data key is probably wrong; retry with a different key"
        }
        DriverError::AuthNack | DriverError::PacketNack | DriverError::PacketCrcMismatch => {
            "bus transfer failed; reseat the cartridge and re-run detection"
        }
        DriverError::NoDevice | DriverError::IdChecksumMismatch => {
            "the ID chip did not answer correctly; reseat the cartridge"
        }
        DriverError::UnsupportedOp => "this chip type does not support the requested operation",
        DriverError::AuthVerifyMismatch => "written data did not verify; retry the operation",
    }
}

fn chip_name(chip: ChipType) -> &'static str {
    match chip {
        ChipType::None => "none",
        ChipType::X76F041 => "X76F041",
        ChipType::X76F100 => "X76F100",
        ChipType::Zs01 => "ZS01",
    }
}

/// Detect the cartridge, failing politely on an empty or unknown slot
fn detect_cart<'a>(
    port: &'a mut Box<dyn CartPort>,
    dump: &mut CartDump,
) -> Result<Box<dyn CartDriver + 'a>, Box<dyn std::error::Error>> {
    let driver = driver::detect(&mut **port, dump);

    if driver.chip_type() == ChipType::None {
        return Err("no cartridge detected (or unrecognized chip)".into());
    }

    println!("Detected chip: {}", chip_name(dump.chip_type));
    Ok(driver)
}

/// Read the identifiers the chip offers, tolerating missing ID chips
fn read_identifiers<D: CartDriver + ?Sized>(
    driver: &mut D,
    dump: &mut CartDump,
) -> Result<(), Box<dyn std::error::Error>> {
    match driver.read_cart_id(dump) {
        Ok(()) => println!("Cartridge ID:  {}", dump.cart_id),
        Err(DriverError::NoDevice) => println!("Cartridge ID:  (no ID chip)"),
        Err(e) => return Err(e.into()),
    }

    match driver.read_internal_id(dump) {
        Ok(()) => println!("Internal ID:   {}", dump.zs_id),
        Err(DriverError::UnsupportedOp) => {}
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

fn run_probe(port_spec: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut port = ports::open_port(port_spec)?;
    let mut dump = CartDump::new();
    let mut driver = detect_cart(&mut port, &mut dump)?;

    read_identifiers(driver.as_mut(), &mut dump)?;
    println!("Payload size:  {} bytes", dump.chip_size().data_length);
    Ok(())
}

fn run_read(
    port_spec: &str,
    output: &Path,
    key: [u8; 8],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut port = ports::open_port(port_spec)?;
    let mut dump = CartDump::new();
    let mut driver = detect_cart(&mut port, &mut dump)?;

    dump.data_key = key;
    read_identifiers(driver.as_mut(), &mut dump)?;

    match driver.read_public_data(&mut dump) {
        Ok(()) | Err(DriverError::UnsupportedOp) => {}
        Err(e) => return Err(e.into()),
    }
    driver.read_private_data(&mut dump)?;

    std::fs::write(output, dump.payload())?;
    println!(
        "Read {} bytes to {}",
        dump.chip_size().data_length,
        output.display()
    );

    if dump.flags.contains(DumpFlags::CONFIG_OK) {
        let config: Vec<String> = dump.config.iter().map(|b| format!("{:02x}", b)).collect();
        println!("Config:        {}", config.join(" "));
    }
    if dump.is_data_empty() {
        println!("Note: the cartridge appears to be blank");
    }

    Ok(())
}

fn run_write(
    port_spec: &str,
    input: &Path,
    key: [u8; 8],
) -> Result<(), Box<dyn std::error::Error>> {
    let payload = std::fs::read(input)?;

    let mut port = ports::open_port(port_spec)?;
    let mut dump = CartDump::new();
    let mut driver = detect_cart(&mut port, &mut dump)?;

    let length = dump.chip_size().data_length;
    if payload.len() != length {
        return Err(format!(
            "input is {} bytes but the {} holds {} bytes",
            payload.len(),
            chip_name(dump.chip_type),
            length
        )
        .into());
    }

    dump.data_key = key;
    dump.data[..length].copy_from_slice(&payload);

    driver.write_data(&mut dump)?;
    println!("Wrote {} bytes from {}", length, input.display());
    Ok(())
}

fn run_erase(port_spec: &str, key: [u8; 8]) -> Result<(), Box<dyn std::error::Error>> {
    let mut port = ports::open_port(port_spec)?;
    let mut dump = CartDump::new();
    let mut driver = detect_cart(&mut port, &mut dump)?;

    dump.data_key = key;
    driver.erase(&mut dump)?;
    println!("Cartridge erased; the data key is now blank");
    Ok(())
}

fn run_set_key(
    port_spec: &str,
    key: [u8; 8],
    new_key: &[u8; 8],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut port = ports::open_port(port_spec)?;
    let mut dump = CartDump::new();
    let mut driver = detect_cart(&mut port, &mut dump)?;

    dump.data_key = key;
    driver.set_data_key(&mut dump, new_key)?;
    println!("Data key updated");
    Ok(())
}
