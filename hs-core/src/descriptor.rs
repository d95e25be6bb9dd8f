//! Configuration descriptors
//!
//! A descriptor names a configuration file and the hardware identifiers that
//! must all be present for it to apply. Identifiers come from the command
//! line as tokens: `vvvv:pppp` for a USB device, a hexadecimal number for an
//! EEPROM ID.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{HwSelectError, Result};

static USB_ID_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

/// Split `vvvv:pppp` into its two numbers
fn split_usb_id(s: &str) -> Option<(u16, u16)> {
    let re = USB_ID_PATTERN
        .get_or_init(|| Regex::new(r"^([0-9A-Fa-f]{1,4}):([0-9A-Fa-f]{1,4})$").ok())
        .as_ref()?;
    let caps = re.captures(s)?;
    let vendor = u16::from_str_radix(&caps[1], 16).ok()?;
    let product = u16::from_str_radix(&caps[2], 16).ok()?;
    Some((vendor, product))
}

/// USB vendor:product identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UsbId {
    pub vendor: u16,
    pub product: u16,
}

impl UsbId {
    pub fn new(vendor: u16, product: u16) -> Self {
        Self { vendor, product }
    }
}

/// Formats as the enumeration tools print it: `1bcf:2880`
impl fmt::Display for UsbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor, self.product)
    }
}

impl FromStr for UsbId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (vendor, product) = split_usb_id(s)
            .ok_or_else(|| "expected vendor:product with 1-4 hex digits each".to_string())?;
        Ok(Self { vendor, product })
    }
}

/// Parse a hexadecimal EEPROM ID, with or without `0x` prefix
pub fn parse_eeprom_id(token: &str) -> std::result::Result<u64, String> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    if digits.is_empty() {
        return Err("empty hexadecimal number".to_string());
    }
    // from_str_radix alone would take a leading sign
    if let Some(c) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(format!("not a hexadecimal number (unexpected {:?})", c));
    }
    u64::from_str_radix(digits, 16).map_err(|e| format!("not a hexadecimal number ({})", e))
}

/// A candidate configuration and the hardware it requires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDescriptor {
    pub file: String,
    pub required_eeprom: BTreeSet<u64>,
    pub required_usb: BTreeSet<UsbId>,
}

impl ConfigDescriptor {
    /// Build a descriptor from a file and its identifier tokens.
    ///
    /// Rejects a descriptor without any token: it could never be told apart
    /// from any other hardware.
    pub fn parse<S: AsRef<str>>(file: &str, tokens: &[S]) -> Result<Self> {
        if file.is_empty() {
            return Err(HwSelectError::InvalidArgument(
                "configuration file name cannot be empty".to_string(),
            ));
        }
        if tokens.is_empty() {
            return Err(HwSelectError::EmptyCandidate(file.to_string()));
        }

        let mut required_eeprom = BTreeSet::new();
        let mut required_usb = BTreeSet::new();
        for token in tokens {
            let token = token.as_ref().trim();
            let invalid = |reason: String| HwSelectError::InvalidToken {
                file: file.to_string(),
                token: token.to_string(),
                reason,
            };

            if token.contains(':') {
                required_usb.insert(token.parse::<UsbId>().map_err(invalid)?);
            } else {
                required_eeprom.insert(parse_eeprom_id(token).map_err(invalid)?);
            }
        }

        Ok(Self {
            file: file.to_string(),
            required_eeprom,
            required_usb,
        })
    }

    pub fn needs_eeprom(&self) -> bool {
        !self.required_eeprom.is_empty()
    }
}

impl fmt::Display for ConfigDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file)?;
        for id in &self.required_eeprom {
            write!(f, " {:x}", id)?;
        }
        for id in &self.required_usb {
            write!(f, " {}", id)?;
        }
        Ok(())
    }
}
