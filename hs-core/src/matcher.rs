//! Configuration matching
//!
//! Picks the first candidate, in the order given, whose hardware is all
//! present. EEPROM requirements are checked first because they are a set
//! lookup against IDs read once per run; USB requirements each cost an
//! external process and are only probed for candidates that passed the
//! EEPROM check, stopping at the first missing device.

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::cancel::CancelFlag;
use crate::descriptor::ConfigDescriptor;
use crate::eeprom::IdentifierSource;
use crate::error::{HwSelectError, Result};
use crate::usb::UsbProbe;

pub struct Matcher<'a> {
    eeprom: &'a dyn IdentifierSource,
    usb: &'a dyn UsbProbe,
    cancel: &'a CancelFlag,
}

impl<'a> Matcher<'a> {
    pub fn new(eeprom: &'a dyn IdentifierSource, usb: &'a dyn UsbProbe, cancel: &'a CancelFlag) -> Self {
        Self { eeprom, usb, cancel }
    }

    /// Return the first candidate whose required hardware is all connected.
    ///
    /// EEPROM detection runs at most once, and only if some candidate needs
    /// it. Failing to detect EEPROMs is not fatal: the run continues as if
    /// none were connected. USB probe failures are fatal.
    pub fn select_match<'c>(&self, candidates: &'c [ConfigDescriptor]) -> Result<Option<&'c ConfigDescriptor>> {
        let detected = if candidates.iter().any(ConfigDescriptor::needs_eeprom) {
            self.detect_eeprom()?
        } else {
            debug!("No candidate requires an EEPROM, skipping EEPROM detection");
            BTreeSet::new()
        };

        for candidate in candidates {
            self.cancel.check()?;

            if !candidate.required_eeprom.is_subset(&detected) {
                let missing: Vec<&u64> = candidate.required_eeprom.difference(&detected).collect();
                info!("Skipping {}: EEPROM ID(s) {:x?} not detected", candidate.file, missing);
                continue;
            }

            if !self.usb_present(candidate)? {
                continue;
            }

            info!("Selected {}", candidate.file);
            return Ok(Some(candidate));
        }

        info!("None of the {} candidate(s) matches the connected hardware", candidates.len());
        Ok(None)
    }

    fn detect_eeprom(&self) -> Result<BTreeSet<u64>> {
        self.cancel.check()?;
        let result = self.eeprom.read_ids();
        self.cancel.check()?;

        match result {
            Ok(ids) => Ok(ids),
            Err(HwSelectError::Interrupted) => Err(HwSelectError::Interrupted),
            Err(e) => {
                warn!(
                    "Failed to detect EEPROM IDs from {}: {}. Assuming no EEPROM is connected.",
                    self.eeprom.describe(),
                    e
                );
                Ok(BTreeSet::new())
            }
        }
    }

    /// Probe each required USB ID, stopping at the first one absent
    fn usb_present(&self, candidate: &ConfigDescriptor) -> Result<bool> {
        for id in &candidate.required_usb {
            let count = self.usb.count_devices(id);
            // A probe killed by the interrupt reports a failure, not the interrupt.
            self.cancel.check()?;
            if count? == 0 {
                info!("Skipping {}: no USB device {} connected", candidate.file, id);
                return Ok(false);
            }
        }
        Ok(true)
    }
}
