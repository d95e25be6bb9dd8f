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

use std::backtrace::Backtrace;
use std::io::{self, Write};
use std::panic;
use std::process::ExitCode;

use hs_core::CancelFlag;
use hs_error::HwSelectError;
use tracing::{debug, error, warn};

use hwselect::cli::Cli;
use hwselect::logger::{self, LogContext};
use hwselect::selector::{ExitStatus, Report, Selector};

fn main() -> ExitCode {
    let cli = match Cli::try_parse_grouped(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitStatus::InvalidInput.into()
            } else {
                ExitStatus::Success.into()
            };
        }
    };

    let log = match logger::init_logging(cli.log_level, cli.log_target.clone(), cli.file_limits()) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("hwselect: {}", e);
            return ExitStatus::from_error(&e).into();
        }
    };

    install_panic_hook();

    let cancel = CancelFlag::new();
    let handler = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler.cancel()) {
        warn!("Failed to set interrupt handler: {}", e);
    }

    debug!("Starting hwselect {}", env!("CARGO_PKG_VERSION"));
    let report = Selector::from_cli(&cli, cancel).run_guarded(&cli.config_groups, cli.fallback.as_deref());
    finish(&log, &report).into()
}

/// Print the selected file, or explain why there is none
fn finish(log: &LogContext, report: &Report) -> ExitStatus {
    if let Some(message) = &report.error {
        complain(log, message);
    }
    let Some(file) = &report.output else {
        return report.status;
    };

    let mut stdout = io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{}", file).and_then(|_| stdout.flush()) {
        let e = HwSelectError::Io(e);
        complain(log, &format!("failed to output the selection: {}", e));
        return ExitStatus::from_error(&e);
    }
    report.status
}

/// One line on stderr, whatever the log target and filter
fn complain(log: &LogContext, message: &str) {
    if !log.logs_to_stderr() {
        error!("{}", message);
    }
    eprintln!("hwselect: {}", message);
}

fn install_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        error!(
            "PANIC at {}: {}\n{}",
            location,
            message,
            Backtrace::force_capture()
        );
    }));
}
