//! Unified error handling for hwselect
//!
//! This crate provides a single error type used across all hwselect components.
//! Variants are grouped by the stage of a run that produces them, so the
//! selector can decide which failures are recoverable and which end the run.

use std::io;
use std::path::PathBuf;

/// Result type alias using HwSelectError
pub type Result<T> = std::result::Result<T, HwSelectError>;

/// Unified error type for all hwselect operations
#[derive(thiserror::Error, Debug)]
pub enum HwSelectError {
    // ============================================================================
    // Input Errors
    // ============================================================================
    #[error("Invalid identifier {token:?} for {file}: {reason}")]
    InvalidToken {
        file: String,
        token: String,
        reason: String,
    },

    #[error("Configuration {0} has no identifier: at least one EEPROM ID or USB vendor:product ID is required")]
    EmptyCandidate(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ============================================================================
    // Backend Connectivity Errors
    // ============================================================================
    #[error("Backend communication failed: {0}")]
    BackendCommunication(String),

    #[error("Backend I/O error: {0}")]
    BackendIo(String),

    #[error("Backend has no component with role {0}")]
    BackendLookup(String),

    #[error("Backend protocol error: {0}")]
    BackendProtocol(String),

    #[error("Message too large: {size} bytes (max {max_size} bytes)")]
    MessageTooLarge {
        size: usize,
        max_size: usize,
    },

    // ============================================================================
    // Hardware Access Errors
    // ============================================================================
    #[error("Failed to communicate with device {path}: {source}")]
    DeviceIo {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Invalid response from {origin}: {reason}")]
    InvalidResponse {
        origin: String,
        reason: String,
    },

    // ============================================================================
    // External Tool Errors
    // ============================================================================
    #[error("Failed to run {command}: {source}")]
    ToolSpawn {
        command: String,
        source: io::Error,
    },

    #[error("{command} failed with {status}: {stderr}")]
    ToolFailed {
        command: String,
        status: String,
        stderr: String,
    },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("Interrupted by user")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("{0}")]
    Generic(String),
}

impl HwSelectError {
    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    /// Create a device I/O error
    pub fn device_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::DeviceIo {
            path: path.into(),
            source,
        }
    }

    /// True for the failure classes that mean "the backend cannot be used",
    /// as opposed to a backend that answered with something wrong.
    pub fn is_backend_unreachable(&self) -> bool {
        matches!(
            self,
            Self::BackendCommunication(_) | Self::BackendIo(_) | Self::BackendLookup(_)
        )
    }

    /// Malformed command line or candidate description
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken { .. } | Self::EmptyCandidate(_) | Self::InvalidArgument(_)
        )
    }

    /// Failures of the I/O class: files, devices, sockets and external tools
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::DeviceIo { .. }
                | Self::BackendIo(_)
                | Self::ToolSpawn { .. }
                | Self::ToolFailed { .. }
        )
    }
}
