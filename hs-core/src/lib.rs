//! hwselect core library
//!
//! Decides which configuration file applies to the hardware currently
//! connected to the machine.
//!
//! # Features
//!
//! - **EEPROM detection**: IDs read through the hardware control backend, or
//!   directly from the power-control unit when no backend is running
//! - **USB detection**: vendor:product presence checks via `lsusb`
//! - **Matching**: first candidate whose required hardware is all present
//!
//! # Example
//!
//! ```no_run
//! use hs_core::{CancelFlag, ConfigDescriptor, EepromReader, LsusbProbe, Matcher};
//! use hs_core::constants::paths;
//!
//! let candidates = vec![
//!     ConfigDescriptor::parse("sparc.yaml", &["238abe69010000c8"]).unwrap(),
//!     ConfigDescriptor::parse("sim.yaml", &["1bcf:2880"]).unwrap(),
//! ];
//! let eeprom = EepromReader::from_locations(paths::BACKEND_SOCKET, paths::PCU_PORT);
//! let usb = LsusbProbe::default();
//! let cancel = CancelFlag::new();
//!
//! let selected = Matcher::new(&eeprom, &usb, &cancel).select_match(&candidates).unwrap();
//! ```

pub mod backend;
pub mod cancel;
pub mod constants;
pub mod descriptor;
pub mod eeprom;
pub mod matcher;
pub mod pcu;
pub mod usb;

pub mod error {
    pub use hs_error::{HwSelectError, Result};
}

// Re-export error types
pub use error::{HwSelectError, Result};

pub use backend::{BackendClient, ComponentHandle};
pub use cancel::CancelFlag;
pub use descriptor::{parse_eeprom_id, ConfigDescriptor, UsbId};
pub use eeprom::{BackendSource, DirectSource, EepromReader, IdentifierSource};
pub use matcher::Matcher;
pub use pcu::{open_unit, HardwareControl, PowerControlUnit, ScopedUnit, SimulatedUnit};
pub use usb::{LsusbProbe, UsbProbe};
