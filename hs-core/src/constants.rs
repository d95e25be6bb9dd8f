//! Constants and configuration defaults for hwselect
//!
//! Centralizes paths, names, limits and timeouts used by the detection code.

use std::time::Duration;

/// Default locations of the external collaborators
pub mod paths {
    /// Unix socket of the hardware control backend
    pub const BACKEND_SOCKET: &str = "/run/hwselect/backend.sock";

    /// Device pattern of the power-control unit serial line
    pub const PCU_PORT: &str = "/dev/ttyPMT*";

    /// Connection target selecting the simulated power-control unit
    pub const FAKE_PORT: &str = "/dev/fake";

    /// USB enumeration command
    pub const LSUSB: &str = "lsusb";
}

/// Backend component model
pub mod backend {
    use super::Duration;

    /// Role of the component owning the EEPROM bus
    pub const PCU_ROLE: &str = "power-control";

    /// Attribute listing the EEPROM IDs seen on the bus
    pub const MEMORY_IDS_ATTRIBUTE: &str = "memory_ids";

    /// Socket read/write timeout
    pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

    /// Initial buffer size for responses
    pub const INITIAL_BUFFER_SIZE: usize = 1024;
}

/// Power-control unit serial protocol
pub mod pcu {
    use super::Duration;

    /// Line speed, 8N1 without flow control
    pub const BAUD_RATE: u32 = 115_200;

    /// Longest wait for an answer byte
    pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

    /// Identification query
    pub const IDN_QUERY: &str = "*IDN?";

    /// Substring of the identification answer of a genuine unit
    pub const IDN_SIGNATURE: &str = "Delmic Analog Power";

    /// EEPROM ID query
    pub const SID_QUERY: &str = "SID";

    /// Longest answer line accepted from the unit
    pub const MAX_LINE_LENGTH: usize = 1024;

    /// EEPROM IDs reported by the simulated unit
    pub const SIMULATED_IDS: &[&str] = &["238abe69010000c8", "4f0d98a5010000c0"];
}

/// USB enumeration
pub mod usb {
    /// Exit status of the enumeration command when no device matches the filter
    pub const NO_DEVICE_STATUS: i32 = 1;
}
