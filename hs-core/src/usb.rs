//! USB presence probe
//!
//! Detection via the `lsusb` enumeration tool, filtered by vendor:product.
//! `lsusb -d` prints one line per matching device and exits with status 1
//! (and no output) when nothing matches.

use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, trace};

use crate::constants::usb::NO_DEVICE_STATUS;
use crate::descriptor::UsbId;
use crate::error::{HwSelectError, Result};

/// Counts the attached USB devices with a given vendor:product ID
#[cfg_attr(test, mockall::automock)]
pub trait UsbProbe {
    fn count_devices(&self, id: &UsbId) -> Result<usize>;
}

/// Probe backed by an external `lsusb`-compatible command
#[derive(Debug, Clone)]
pub struct LsusbProbe {
    command: PathBuf,
}

impl LsusbProbe {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn command_name(&self) -> String {
        self.command.display().to_string()
    }
}

impl Default for LsusbProbe {
    fn default() -> Self {
        Self::new(crate::constants::paths::LSUSB)
    }
}

impl UsbProbe for LsusbProbe {
    fn count_devices(&self, id: &UsbId) -> Result<usize> {
        let filter = id.to_string();
        trace!("Running {} -d {}", self.command_name(), filter);

        let output = Command::new(&self.command)
            .arg("-d")
            .arg(&filter)
            .output()
            .map_err(|e| HwSelectError::ToolSpawn {
                command: self.command_name(),
                source: e,
            })?;

        let count = interpret_output(
            &self.command_name(),
            &filter,
            output.status.code(),
            &output.stdout,
            &output.stderr,
        )?;
        debug!("Found {} USB device(s) matching {}", count, filter);
        Ok(count)
    }
}

/// Turn the result of one enumeration run into a device count.
///
/// `code` is `None` when the command was killed by a signal.
pub fn interpret_output(
    command: &str,
    filter: &str,
    code: Option<i32>,
    stdout: &[u8],
    stderr: &[u8],
) -> Result<usize> {
    let stdout = String::from_utf8_lossy(stdout);
    match code {
        Some(0) => Ok(count_occurrences(&stdout, filter)),
        Some(NO_DEVICE_STATUS) if stdout.trim().is_empty() => Ok(0),
        _ => Err(HwSelectError::ToolFailed {
            command: command.to_string(),
            status: code
                .map(|c| format!("exit status {}", c))
                .unwrap_or_else(|| "a signal".to_string()),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }),
    }
}

fn count_occurrences(listing: &str, filter: &str) -> usize {
    listing.to_lowercase().matches(&filter.to_lowercase()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    const LISTING: &str = "\
Bus 001 Device 004: ID 1bcf:2880 Sunplus Innovation Technology Inc.
Bus 003 Device 002: ID 1BCF:2880 Sunplus Innovation Technology Inc.
";

    /// Writes an executable stand-in for lsusb
    fn fake_lsusb(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("lsusb");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_counts_one_line_per_device() {
        let n = interpret_output("lsusb", "1bcf:2880", Some(0), LISTING.as_bytes(), b"").unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn test_no_device_status_is_zero() {
        let n = interpret_output("lsusb", "1bcf:2880", Some(1), b"", b"").unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_status_one_with_output_is_an_error() {
        let err = interpret_output("lsusb", "1bcf:2880", Some(1), b"garbage", b"").unwrap_err();
        assert!(matches!(err, HwSelectError::ToolFailed { .. }));
    }

    #[test]
    fn test_other_status_is_an_error() {
        let err = interpret_output("lsusb", "1bcf:2880", Some(2), b"", b"permission denied\n")
            .unwrap_err();
        match err {
            HwSelectError::ToolFailed { status, stderr, .. } => {
                assert_eq!(status, "exit status 2");
                assert_eq!(stderr, "permission denied");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(interpret_output("lsusb", "1bcf:2880", None, b"", b"").is_err());
    }

    #[test]
    #[serial]
    fn test_runs_command_with_filter() {
        let dir = TempDir::new().unwrap();
        let cmd = fake_lsusb(
            &dir,
            r#"[ "$1" = "-d" ] || exit 3
case "$2" in
  1bcf:2880) echo "Bus 001 Device 004: ID 1bcf:2880 Sunplus"; exit 0 ;;
esac
exit 1"#,
        );
        let probe = LsusbProbe::new(&cmd);

        assert_eq!(probe.count_devices(&UsbId::new(0x1bcf, 0x2880)).unwrap(), 1);
        assert_eq!(probe.count_devices(&UsbId::new(0x046d, 0xc52b)).unwrap(), 0);
    }

    #[test]
    #[serial]
    fn test_failing_command_propagates() {
        let dir = TempDir::new().unwrap();
        let cmd = fake_lsusb(&dir, "echo 'usb bus unavailable' >&2\nexit 2");
        let err = LsusbProbe::new(&cmd)
            .count_devices(&UsbId::new(0x1bcf, 0x2880))
            .unwrap_err();
        assert!(err.is_io_error());
        assert!(err.to_string().contains("usb bus unavailable"));
    }

    #[test]
    fn test_missing_command() {
        let err = LsusbProbe::new("/nonexistent/lsusb")
            .count_devices(&UsbId::new(0x1bcf, 0x2880))
            .unwrap_err();
        assert!(matches!(err, HwSelectError::ToolSpawn { .. }));
    }
}
