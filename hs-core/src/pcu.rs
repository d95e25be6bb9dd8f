//! Power-control unit access
//!
//! Direct access to the unit owning the EEPROM bus, used when no backend is
//! available to ask. The unit speaks a line protocol over a serial port:
//! `*IDN?` returns its identification, `SID` returns the comma-separated
//! hexadecimal IDs of the EEPROMs it sees.

use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use serialport::SerialPort;
use tracing::{debug, info, trace, warn};

use crate::constants::paths::FAKE_PORT;
use crate::constants::pcu::{
    BAUD_RATE, IDN_QUERY, IDN_SIGNATURE, MAX_LINE_LENGTH, READ_TIMEOUT, SID_QUERY, SIMULATED_IDS,
};
use crate::error::{HwSelectError, Result};

/// A hardware-control object that must be released once done with
#[cfg_attr(test, mockall::automock)]
pub trait HardwareControl {
    /// Hexadecimal IDs of the EEPROMs currently connected
    fn memory_ids(&mut self) -> Result<Vec<String>>;

    /// Release the underlying device. Must be idempotent.
    fn terminate(&mut self);
}

/// Connect to the unit at `target`.
///
/// `target` is a device path, a pattern ending in `*`, or `/dev/fake` for
/// the simulated unit.
pub fn open_unit(target: &str) -> Result<Box<dyn HardwareControl>> {
    if target == FAKE_PORT {
        return Ok(Box::new(SimulatedUnit::new()));
    }
    Ok(Box::new(PowerControlUnit::open(target)?))
}

/// Releases the wrapped unit when dropped, whatever the exit path
pub struct ScopedUnit {
    unit: Box<dyn HardwareControl>,
}

impl ScopedUnit {
    pub fn new(unit: Box<dyn HardwareControl>) -> Self {
        Self { unit }
    }

    pub fn memory_ids(&mut self) -> Result<Vec<String>> {
        self.unit.memory_ids()
    }
}

impl Drop for ScopedUnit {
    fn drop(&mut self) {
        self.unit.terminate();
    }
}

// ============================================================================
// Serial unit
// ============================================================================

struct SerialLink {
    writer: Box<dyn SerialPort>,
    reader: BufReader<Box<dyn SerialPort>>,
}

/// Power-control unit on a serial line
pub struct PowerControlUnit {
    port: PathBuf,
    link: Option<SerialLink>,
}

impl PowerControlUnit {
    /// Open the first port matching `target` that answers as a power-control unit
    pub fn open(target: &str) -> Result<Self> {
        let ports = resolve_ports(target)?;
        for port in &ports {
            match Self::open_port(port) {
                Ok(unit) => return Ok(unit),
                Err(e) => debug!("No power-control unit on {}: {}", port.display(), e),
            }
        }
        Err(HwSelectError::DeviceNotFound(format!(
            "no power-control unit answering on {} ({} port(s) tried)",
            target,
            ports.len()
        )))
    }

    fn open_port(port: &Path) -> Result<Self> {
        let device_err = |e: serialport::Error| HwSelectError::device_io(port, io::Error::from(e));

        let writer = serialport::new(port.to_string_lossy(), BAUD_RATE)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(device_err)?;
        let reader = BufReader::new(writer.try_clone().map_err(device_err)?);

        let mut unit = Self {
            port: port.to_path_buf(),
            link: Some(SerialLink { writer, reader }),
        };
        let idn = unit.query(IDN_QUERY)?;
        if !idn.contains(IDN_SIGNATURE) {
            unit.terminate();
            return Err(HwSelectError::invalid_response(
                port.display().to_string(),
                format!("unexpected identification {:?}", idn),
            ));
        }

        info!("Connected to {} on {}", idn, port.display());
        Ok(unit)
    }

    /// Send one command and return its answer line, without terminator
    fn query(&mut self, cmd: &str) -> Result<String> {
        let port = self.port.clone();
        let link = self.link.as_mut().ok_or_else(|| {
            HwSelectError::device_io(&port, io::Error::new(io::ErrorKind::NotConnected, "unit already terminated"))
        })?;

        trace!("Sending {:?} to {}", cmd, port.display());
        link.writer
            .write_all(format!("{}\n", cmd).as_bytes())
            .and_then(|_| link.writer.flush())
            .map_err(|e| HwSelectError::device_io(&port, e))?;

        let mut buf = Vec::with_capacity(64);
        (&mut link.reader)
            .take(MAX_LINE_LENGTH as u64)
            .read_until(b'\n', &mut buf)
            .map_err(|e| HwSelectError::device_io(&port, e))?;

        if buf.last() != Some(&b'\n') {
            return Err(HwSelectError::device_io(
                &port,
                io::Error::new(io::ErrorKind::TimedOut, format!("no answer to {}", cmd)),
            ));
        }

        let answer = String::from_utf8_lossy(&buf).trim_end_matches(['\r', '\n']).to_string();
        trace!("Received {:?}", answer);
        Ok(answer)
    }
}

impl HardwareControl for PowerControlUnit {
    fn memory_ids(&mut self) -> Result<Vec<String>> {
        let answer = self.query(SID_QUERY)?;
        Ok(parse_id_list(&answer))
    }

    fn terminate(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.writer.flush() {
                warn!("Failed to flush {}: {}", self.port.display(), e);
            }
            debug!("Released power-control unit on {}", self.port.display());
        }
    }
}

/// Split an ID answer such as `238abe69010000c8,4f0d98a5010000c0`
pub fn parse_id_list(answer: &str) -> Vec<String> {
    answer
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Expand a trailing `*` into the sorted list of matching device nodes
pub fn resolve_ports(target: &str) -> Result<Vec<PathBuf>> {
    let Some(stem) = target.strip_suffix('*') else {
        return Ok(vec![PathBuf::from(target)]);
    };

    // `dir/*` matches every node of `dir`
    let (dir, prefix) = match stem.rsplit_once('/') {
        Some(("", prefix)) => ("/", prefix),
        Some((dir, prefix)) => (dir, prefix),
        None => (".", stem),
    };

    let mut ports: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| HwSelectError::device_io(dir, e))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| !t.is_dir()))
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .map(|entry| entry.path())
        .collect();
    ports.sort();

    if ports.is_empty() {
        return Err(HwSelectError::DeviceNotFound(format!("no device matches {}", target)));
    }
    Ok(ports)
}

// ============================================================================
// Simulated unit
// ============================================================================

/// Stand-in unit reporting a fixed set of EEPROMs
#[derive(Debug, Default)]
pub struct SimulatedUnit {
    terminated: bool,
}

impl SimulatedUnit {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HardwareControl for SimulatedUnit {
    fn memory_ids(&mut self) -> Result<Vec<String>> {
        if self.terminated {
            return Err(HwSelectError::device_io(
                FAKE_PORT,
                io::Error::new(io::ErrorKind::NotConnected, "unit already terminated"),
            ));
        }
        Ok(SIMULATED_IDS.iter().map(|s| s.to_string()).collect())
    }

    fn terminate(&mut self) {
        self.terminated = true;
    }
}
