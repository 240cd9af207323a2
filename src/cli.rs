//! CLI argument parsing

use crate::ports;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a 16-digit hex string as an 8-byte key
pub fn parse_key(s: &str) -> Result<[u8; 8], String> {
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);

    if s.len() != 16 {
        return Err(format!(
            "key must be 16 hex digits (8 bytes), got {} characters",
            s.len()
        ));
    }

    let mut key = [0u8; 8];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
            .map_err(|e| format!("invalid hex byte at position {}: {}", i, e))?;
    }

    Ok(key)
}

/// Generate dynamic help text for the port argument
fn port_help() -> String {
    format!(
        "Cartridge port to use [available: {}]",
        ports::port_names_short()
    )
}

#[derive(Parser)]
#[command(name = "cartprobe")]
#[command(author, version, about = "Security cartridge diagnostic tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect the cartridge and read its identifiers
    Probe {
        /// Cartridge port to use
        #[arg(short, long, help = port_help())]
        port: String,
    },

    /// Read cartridge contents to file
    Read {
        /// Cartridge port to use
        #[arg(short, long, help = port_help())]
        port: String,

        /// Output file path for the payload bytes
        #[arg(short, long)]
        output: PathBuf,

        /// Data key as 16 hex digits (defaults to a blank key)
        #[arg(short, long, value_parser = parse_key)]
        key: Option<[u8; 8]>,
    },

    /// Write file contents to the cartridge
    Write {
        /// Cartridge port to use
        #[arg(short, long, help = port_help())]
        port: String,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Data key as 16 hex digits (defaults to a blank key)
        #[arg(short, long, value_parser = parse_key)]
        key: Option<[u8; 8]>,
    },

    /// Erase the cartridge and blank its key
    Erase {
        /// Cartridge port to use
        #[arg(short, long, help = port_help())]
        port: String,

        /// Data key as 16 hex digits (defaults to a blank key)
        #[arg(short, long, value_parser = parse_key)]
        key: Option<[u8; 8]>,
    },

    /// Program a new data key
    SetKey {
        /// Cartridge port to use
        #[arg(short, long, help = port_help())]
        port: String,

        /// Current data key as 16 hex digits (defaults to a blank key)
        #[arg(short, long, value_parser = parse_key)]
        key: Option<[u8; 8]>,

        /// New data key as 16 hex digits
        #[arg(long, value_parser = parse_key)]
        new_key: [u8; 8],
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key() {
        assert_eq!(
            parse_key("0011223344556677"),
            Ok([0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77])
        );
        assert_eq!(
            parse_key("0xffeeddccbbaa9988"),
            Ok([0xff, 0xee, 0xdd, 0xcc, 0xbb, 0xaa, 0x99, 0x88])
        );
        assert!(parse_key("00112233").is_err());
        assert!(parse_key("001122334455667g").is_err());
    }
}
