/*
 * This file is part of hwselect.
 *
 * Copyright (C) 2025 hwselect contributors
 *
 * hwselect is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * hwselect is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with hwselect. If not, see <https://www.gnu.org/licenses/>.
 */

//! Selection run
//!
//! Builds the candidates from the command line, matches them against the
//! connected hardware and decides what the process reports.

use std::panic::{self, AssertUnwindSafe};
use std::process::ExitCode;

use hs_core::{CancelFlag, ConfigDescriptor, EepromReader, IdentifierSource, LsusbProbe, Matcher, UsbProbe};
use hs_error::{HwSelectError, Result};
use tracing::{debug, info};

use crate::cli::Cli;

/// Process exit statuses, as expected by the calling scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    Interrupted = 1,
    /// Invalid arguments, or no hardware fitting any configuration
    InvalidInput = 127,
    IoFailure = 129,
    Unexpected = 130,
}

impl ExitStatus {
    pub fn from_error(err: &HwSelectError) -> Self {
        if matches!(err, HwSelectError::Interrupted) {
            Self::Interrupted
        } else if err.is_input_error() {
            Self::InvalidInput
        } else if err.is_io_error() {
            Self::IoFailure
        } else {
            Self::Unexpected
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Selected(String),
    Fallback(String),
    NoMatch,
}

impl Outcome {
    /// The line to print on stdout, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Selected(file) | Self::Fallback(file) => Some(file),
            Self::NoMatch => None,
        }
    }

    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Selected(_) | Self::Fallback(_) => ExitStatus::Success,
            Self::NoMatch => ExitStatus::InvalidInput,
        }
    }
}

/// What the process prints and returns once a run is over
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub status: ExitStatus,
    /// Line for stdout
    pub output: Option<String>,
    /// Terse explanation for stderr
    pub error: Option<String>,
}

impl Report {
    fn failure(status: ExitStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            output: None,
            error: Some(message.into()),
        }
    }
}

/// Turn each `FILE ID...` group into a descriptor, keeping their order.
///
/// Every group is checked before any hardware is touched.
pub fn build_candidates(groups: &[Vec<String>]) -> Result<Vec<ConfigDescriptor>> {
    groups
        .iter()
        .map(|group| match group.split_first() {
            Some((file, tokens)) => ConfigDescriptor::parse(file, tokens),
            None => Err(HwSelectError::InvalidArgument(
                "--config needs a file name".to_string(),
            )),
        })
        .collect()
}

pub struct Selector {
    eeprom: Box<dyn IdentifierSource>,
    usb: Box<dyn UsbProbe>,
    cancel: CancelFlag,
}

impl Selector {
    pub fn new(eeprom: Box<dyn IdentifierSource>, usb: Box<dyn UsbProbe>, cancel: CancelFlag) -> Self {
        Self { eeprom, usb, cancel }
    }

    /// Selector using the collaborators named on the command line
    pub fn from_cli(cli: &Cli, cancel: CancelFlag) -> Self {
        Self::new(
            Box::new(EepromReader::from_locations(&cli.backend_socket, cli.pcu_port.as_str())),
            Box::new(LsusbProbe::new(&cli.lsusb)),
            cancel,
        )
    }

    pub fn run(&self, groups: &[Vec<String>], fallback: Option<&str>) -> Result<Outcome> {
        let candidates = build_candidates(groups)?;
        for candidate in &candidates {
            debug!("Candidate {}", candidate);
        }

        let matcher = Matcher::new(self.eeprom.as_ref(), self.usb.as_ref(), &self.cancel);
        let outcome = match matcher.select_match(&candidates)? {
            Some(candidate) => Outcome::Selected(candidate.file.clone()),
            None => match fallback {
                Some(file) => {
                    info!("No configuration matches, using fallback {}", file);
                    Outcome::Fallback(file.to_string())
                }
                None => Outcome::NoMatch,
            },
        };
        Ok(outcome)
    }

    /// Run once, turning errors and panics into the status of the process
    pub fn run_guarded(&self, groups: &[Vec<String>], fallback: Option<&str>) -> Report {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run(groups, fallback))) {
            Ok(Ok(outcome)) => match outcome.output() {
                Some(file) => Report {
                    status: outcome.exit_status(),
                    output: Some(file.to_string()),
                    error: None,
                },
                None => Report::failure(
                    outcome.exit_status(),
                    "no hardware fitting any configuration detected",
                ),
            },
            Ok(Err(e)) => Report::failure(ExitStatus::from_error(&e), e.to_string()),
            // Details are left to the panic hook
            Err(_) => Report::failure(ExitStatus::Unexpected, "unexpected internal error"),
        }
    }
}
