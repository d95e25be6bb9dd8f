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

//! Command Line Interface

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, CommandFactory, FromArgMatches, Parser};
use hs_core::constants::paths;

use crate::logger::{FileLimits, LogTarget};

#[derive(Parser, Debug)]
#[command(name = "hwselect")]
#[command(version)]
#[command(about = "Select the configuration matching the connected hardware")]
#[command(long_about = "Select the configuration matching the connected hardware

Each --config option names a configuration file followed by the IDs of the
hardware it requires: a hexadecimal number for an EEPROM ID, vvvv:pppp for a
USB device. The first configuration whose hardware is all connected is
printed on standard output.

EXAMPLES:
    hwselect --config sparc.yaml 238abe69010000c8 --config sim.yaml 1bcf:2880
    hwselect --config sparc.yaml 238abe69010000c8 --fallback default.yaml

EXIT STATUS:
    0      a configuration (or the fallback) was printed
    1      interrupted
    127    invalid arguments, or no hardware fitting any configuration
    129    hardware detection failed (I/O error)
    130    unexpected error

ENVIRONMENT VARIABLES:
    RUST_LOG=debug         Override the log filter")]
pub struct Cli {
    /// Candidate configuration followed by the IDs it requires (repeatable)
    #[arg(long = "config", value_names = ["FILE", "ID"], num_args = 1.., action = ArgAction::Append, required = true)]
    pub config: Vec<String>,

    /// Configuration to output when no candidate matches
    #[arg(long, value_name = "FILE")]
    pub fallback: Option<String>,

    /// Verbosity: 0 = warnings, 1 = info, 2 = debug
    #[arg(long, value_name = "LEVEL", default_value_t = 1)]
    pub log_level: u8,

    /// Where to write the log: "stderr" or a file path (rotated daily and by size)
    #[arg(long, value_name = "stderr|PATH", env = "HWSELECT_LOG_TARGET", default_value = "stderr")]
    pub log_target: LogTarget,

    /// Number of rotated log files to keep
    #[arg(long, value_name = "N", default_value_t = 5)]
    pub log_max_files: usize,

    /// Size in bytes above which the log file is rotated
    #[arg(long, value_name = "BYTES", default_value_t = 5 * 1024 * 1024)]
    pub log_max_size: u64,

    /// Socket of the hardware control backend
    #[arg(long, value_name = "PATH", env = "HWSELECT_BACKEND_SOCKET", default_value = paths::BACKEND_SOCKET)]
    pub backend_socket: PathBuf,

    /// Power-control unit port, used when the backend is not running
    #[arg(long, value_name = "PATTERN", env = "HWSELECT_PCU_PORT", default_value = paths::PCU_PORT)]
    pub pcu_port: String,

    /// USB enumeration command
    #[arg(long, value_name = "PATH", env = "HWSELECT_LSUSB", default_value = paths::LSUSB)]
    pub lsusb: PathBuf,

    /// One entry per --config occurrence: the file, then its IDs
    #[arg(skip)]
    pub config_groups: Vec<Vec<String>>,
}

impl Cli {
    /// Parse `args`, keeping each --config occurrence as its own group
    pub fn try_parse_grouped<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;
        let mut cli = Self::from_arg_matches(&matches)?;
        cli.config_groups = matches
            .get_occurrences::<String>("config")
            .map(|occurrences| occurrences.map(|values| values.cloned().collect()).collect())
            .unwrap_or_default();
        Ok(cli)
    }

    pub fn file_limits(&self) -> FileLimits {
        FileLimits {
            max_files: self.log_max_files,
            max_size: self.log_max_size,
        }
    }
}
