//! EEPROM ID detection
//!
//! Two ways to learn which EEPROMs are connected:
//!
//! 1. **Backend** (preferred): ask the running backend for the component
//!    holding the power-control role and read its ID list. The component
//!    belongs to the backend and is left untouched.
//! 2. **Direct** (fallback): open the power-control unit ourselves, read the
//!    IDs and release the unit, whether the read succeeded or not.
//!
//! The direct path is only taken when the backend cannot be reached at all
//! (communication, I/O or lookup failure), never when it answered badly.

use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::backend::BackendClient;
use crate::constants::backend::{MEMORY_IDS_ATTRIBUTE, PCU_ROLE};
use crate::descriptor::parse_eeprom_id;
use crate::error::{HwSelectError, Result};
use crate::pcu::{open_unit, HardwareControl, ScopedUnit};

/// Something able to report the set of connected EEPROM IDs
#[cfg_attr(test, mockall::automock)]
pub trait IdentifierSource {
    fn read_ids(&self) -> Result<BTreeSet<u64>>;

    /// Human readable origin, for logs
    fn describe(&self) -> String;
}

/// Convert hexadecimal ID tokens reported by `origin`
pub fn parse_id_tokens<S: AsRef<str>>(origin: &str, tokens: &[S]) -> Result<BTreeSet<u64>> {
    tokens
        .iter()
        .map(|t| {
            parse_eeprom_id(t.as_ref()).map_err(|reason| {
                HwSelectError::invalid_response(origin, format!("EEPROM ID {:?}: {}", t.as_ref(), reason))
            })
        })
        .collect()
}

// ============================================================================
// Backend source
// ============================================================================

/// Reads the IDs from the component published by the backend
#[derive(Debug, Clone)]
pub struct BackendSource {
    socket_path: PathBuf,
    role: String,
    attribute: String,
}

impl BackendSource {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            role: PCU_ROLE.to_string(),
            attribute: MEMORY_IDS_ATTRIBUTE.to_string(),
        }
    }
}

impl IdentifierSource for BackendSource {
    fn read_ids(&self) -> Result<BTreeSet<u64>> {
        let client = BackendClient::connect(&self.socket_path)?;
        let mut component = client.lookup_component(&self.role)?;
        let value = component.read_attribute(&self.attribute)?;

        let tokens: Vec<String> = serde_json::from_value(value).map_err(|e| {
            HwSelectError::invalid_response(
                component.name(),
                format!("{} is not a list of strings: {}", self.attribute, e),
            )
        })?;
        parse_id_tokens(component.name(), &tokens)
    }

    fn describe(&self) -> String {
        format!("backend at {}", self.socket_path.display())
    }
}

// ============================================================================
// Direct source
// ============================================================================

pub type UnitConnector = fn(&str) -> Result<Box<dyn HardwareControl>>;

/// Reads the IDs by opening the power-control unit directly
pub struct DirectSource<F = UnitConnector> {
    target: String,
    connect: F,
}

impl DirectSource {
    pub fn new(target: impl Into<String>) -> Self {
        Self::with_connector(target, open_unit)
    }
}

impl<F> DirectSource<F>
where
    F: Fn(&str) -> Result<Box<dyn HardwareControl>>,
{
    pub fn with_connector(target: impl Into<String>, connect: F) -> Self {
        Self {
            target: target.into(),
            connect,
        }
    }
}

impl<F> IdentifierSource for DirectSource<F>
where
    F: Fn(&str) -> Result<Box<dyn HardwareControl>>,
{
    fn read_ids(&self) -> Result<BTreeSet<u64>> {
        let mut unit = ScopedUnit::new((self.connect)(&self.target)?);
        let tokens = unit.memory_ids()?;
        parse_id_tokens(&self.target, &tokens)
    }

    fn describe(&self) -> String {
        format!("power-control unit at {}", self.target)
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Backend first, direct access when the backend is unreachable
pub struct EepromReader {
    preferred: Box<dyn IdentifierSource>,
    fallback: Box<dyn IdentifierSource>,
}

impl EepromReader {
    pub fn new(preferred: Box<dyn IdentifierSource>, fallback: Box<dyn IdentifierSource>) -> Self {
        Self { preferred, fallback }
    }

    /// Reader using the backend socket, then the unit at `pcu_target`
    pub fn from_locations(socket_path: impl Into<PathBuf>, pcu_target: impl Into<String>) -> Self {
        Self::new(
            Box::new(BackendSource::new(socket_path)),
            Box::new(DirectSource::new(pcu_target)),
        )
    }
}

impl IdentifierSource for EepromReader {
    fn read_ids(&self) -> Result<BTreeSet<u64>> {
        let ids = match self.preferred.read_ids() {
            Ok(ids) => ids,
            Err(e) if e.is_backend_unreachable() => {
                info!(
                    "{} unavailable ({}), reading from {}",
                    self.preferred.describe(),
                    e,
                    self.fallback.describe()
                );
                self.fallback.read_ids()?
            }
            Err(e) => return Err(e),
        };
        debug!("Detected EEPROM IDs: {:x?}", ids);
        Ok(ids)
    }

    fn describe(&self) -> String {
        format!("{} or {}", self.preferred.describe(), self.fallback.describe())
    }
}
