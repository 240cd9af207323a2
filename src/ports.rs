//! Port backend registration and dispatch
//!
//! A port is selected with a `name:key=value,key=value` string, e.g.
//! `dummy:chip=zs01` or
//! `linux-gpio:dev=/dev/gpiochip0,sda=2,scl=3,cs=4,reset=5,onewire=6,present=7`.

use std::collections::HashMap;

use cartprobe_core::port::CartPort;

/// Information about a port backend
pub struct PortInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Short description including accepted parameters
    pub description: &'static str,
}

/// Get information about all available port backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_ports() -> Vec<PortInfo> {
    let mut ports = Vec::new();

    #[cfg(feature = "dummy")]
    ports.push(PortInfo {
        name: "dummy",
        description: "Emulated slot for testing (chip=<x76f041|x76f100|zs01|none>,key=<hex>)",
    });

    #[cfg(feature = "linux-gpio")]
    ports.push(PortInfo {
        name: "linux-gpio",
        description: "Linux GPIO character device \
                      (dev=/dev/gpiochipN,sda=,scl=,cs=,reset=,onewire=,present=)",
    });

    ports
}

/// Generate a short list of port names for CLI help
pub fn port_names_short() -> String {
    let names: Vec<&str> = available_ports().iter().map(|p| p.name).collect();
    names.join(", ")
}

/// Parsed port spec: backend name plus key-value parameters
struct PortParams {
    name: String,
    params: HashMap<String, String>,
}

fn parse_port_spec(spec: &str) -> Result<PortParams, String> {
    let (name, opts) = spec.split_once(':').unwrap_or((spec, ""));
    let mut params = HashMap::new();

    for opt in opts.split(',').filter(|s| !s.is_empty()) {
        let (key, value) = opt
            .split_once('=')
            .ok_or_else(|| format!("malformed port parameter '{}' (expected key=value)", opt))?;
        params.insert(key.to_string(), value.to_string());
    }

    Ok(PortParams {
        name: name.to_string(),
        params,
    })
}

#[cfg(feature = "linux-gpio")]
fn parse_offset(params: &HashMap<String, String>, key: &'static str) -> Result<u32, String> {
    let value = params
        .get(key)
        .ok_or_else(|| format!("missing required parameter '{}'", key))?;

    value
        .parse::<u32>()
        .map_err(|e| format!("invalid line offset for '{}': {}", key, e))
}

/// Open the port backend described by `spec`
pub fn open_port(spec: &str) -> Result<Box<dyn CartPort>, Box<dyn std::error::Error>> {
    let PortParams { name, params } = parse_port_spec(spec)?;

    match name.as_str() {
        #[cfg(feature = "dummy")]
        "dummy" => {
            use cartprobe_dummy::{DummyChip, DummyConfig, DummySlot};

            let chip = match params.get("chip").map(String::as_str) {
                Some("x76f041") | None => DummyChip::X76f041,
                Some("x76f100") => DummyChip::X76f100,
                Some("zs01") => DummyChip::Zs01,
                Some("none") => DummyChip::None,
                Some(other) => return Err(format!("unknown dummy chip '{}'", other).into()),
            };

            let mut config = DummyConfig::with_chip(chip);
            if let Some(key) = params.get("key") {
                config.data_key = crate::cli::parse_key(key)?;
            }

            Ok(Box::new(DummySlot::new(config)))
        }

        #[cfg(feature = "linux-gpio")]
        "linux-gpio" | "linux_gpio" => {
            use cartprobe_linux_gpio::{LinuxGpioPort, LinuxGpioPortConfig};

            let device = params
                .get("dev")
                .ok_or("missing required parameter 'dev'")?
                .clone();

            let config = LinuxGpioPortConfig::new(
                device,
                parse_offset(&params, "sda")?,
                parse_offset(&params, "scl")?,
                parse_offset(&params, "cs")?,
                parse_offset(&params, "reset")?,
                parse_offset(&params, "onewire")?,
                parse_offset(&params, "present")?,
            );

            Ok(Box::new(LinuxGpioPort::open(&config)?))
        }

        other => Err(format!(
            "unknown port backend '{}' (available: {})",
            other,
            port_names_short()
        )
        .into()),
    }
}
