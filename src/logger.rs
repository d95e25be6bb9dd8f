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

//! Log sink setup
//!
//! Logs go either to stderr or to a file rotated daily or once it grows past
//! a size limit, keeping a bounded number of old files. The returned
//! `LogContext` must be kept alive until the end of the run: dropping it
//! flushes the file writer.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use hs_error::{HwSelectError, Result};
use rolling_file::{BasicRollingFileAppender, RollingConditionBasic};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Where log records are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

impl FromStr for LogTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "" => Err("log target cannot be empty".to_string()),
            "stderr" => Ok(Self::Stderr),
            path => Ok(Self::File(PathBuf::from(path))),
        }
    }
}

/// Live logging configuration of the run
pub struct LogContext {
    target: LogTarget,
    _guard: Option<WorkerGuard>,
}

impl LogContext {
    /// Whether error lines already reach stderr through the log
    pub fn logs_to_stderr(&self) -> bool {
        self.target == LogTarget::Stderr
    }
}

/// Map the 0-2 verbosity option onto a level; higher values mean debug
pub fn level_filter(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    }
}

/// Bounds of the log file sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLimits {
    /// Rotated files kept besides the current one
    pub max_files: usize,
    /// Size in bytes above which the current file is rotated
    pub max_size: u64,
}

/// Install the global subscriber. `RUST_LOG`, when set, overrides `verbosity`.
pub fn init_logging(verbosity: u8, target: LogTarget, limits: FileLimits) -> Result<LogContext> {
    let filter = EnvFilter::builder()
        .with_default_directive(level_filter(verbosity).into())
        .from_env_lossy();

    let guard = match &target {
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_env_filter(filter)
                .try_init()
                .map_err(|e| HwSelectError::generic(format!("failed to install logger: {}", e)))?;
            None
        }
        LogTarget::File(path) => {
            let appender = rolling_appender(path, limits)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_writer(writer)
                .with_ansi(false)
                .with_env_filter(filter)
                .try_init()
                .map_err(|e| HwSelectError::generic(format!("failed to install logger: {}", e)))?;
            Some(guard)
        }
    };

    Ok(LogContext { target, _guard: guard })
}

/// Appender writing `<path>`, rotated to `<path>.1`, `<path>.2`... every day
/// or when it exceeds `max_size` bytes
fn rolling_appender(path: &Path, limits: FileLimits) -> Result<BasicRollingFileAppender> {
    if limits.max_files == 0 {
        return Err(HwSelectError::InvalidArgument(
            "at least one log file must be kept".to_string(),
        ));
    }
    if limits.max_size == 0 {
        return Err(HwSelectError::InvalidArgument(
            "log file size limit must be positive".to_string(),
        ));
    }
    if path.file_name().is_none() {
        return Err(HwSelectError::InvalidArgument(format!(
            "log target {} is not a file",
            path.display()
        )));
    }
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let condition = RollingConditionBasic::new().daily().max_size(limits.max_size);
    BasicRollingFileAppender::new(path, condition, limits.max_files).map_err(|e| {
        HwSelectError::InvalidArgument(format!("cannot log to {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_level_mapping() {
        assert_eq!(level_filter(0), LevelFilter::WARN);
        assert_eq!(level_filter(1), LevelFilter::INFO);
        assert_eq!(level_filter(2), LevelFilter::DEBUG);
        assert_eq!(level_filter(7), LevelFilter::DEBUG);
    }

    #[test]
    fn test_parse_target() {
        assert_eq!("stderr".parse::<LogTarget>().unwrap(), LogTarget::Stderr);
        assert_eq!(
            "/var/log/hwselect.log".parse::<LogTarget>().unwrap(),
            LogTarget::File(PathBuf::from("/var/log/hwselect.log"))
        );
        assert!("".parse::<LogTarget>().is_err());
    }

    const LIMITS: FileLimits = FileLimits { max_files: 5, max_size: 5 * 1024 * 1024 };

    fn log_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_rolling_appender_creates_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("hwselect.log");
        rolling_appender(&path, LIMITS).unwrap();
        assert!(dir.path().join("logs").is_dir());
    }

    #[test]
    fn test_rolling_appender_rejects_zero_limits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hwselect.log");
        let err = rolling_appender(&path, FileLimits { max_files: 0, ..LIMITS }).unwrap_err();
        assert!(err.is_input_error());
        let err = rolling_appender(&path, FileLimits { max_size: 0, ..LIMITS }).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_log_file_size_and_count_are_bounded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hwselect.log");
        let limits = FileLimits { max_files: 2, max_size: 100 };

        let mut appender = rolling_appender(&path, limits).unwrap();
        let line = [b'x'; 60];
        for _ in 0..50 {
            appender.write_all(&line).unwrap();
            appender.write_all(b"\n").unwrap();
        }
        appender.flush().unwrap();
        drop(appender);

        let files = log_files(dir.path());
        assert!(files.len() > 1, "no rotation happened: {:?}", files);
        assert!(files.len() <= limits.max_files + 1, "too many files: {:?}", files);
        assert!(files.iter().all(|name| name.starts_with("hwselect.log")));
        for name in &files {
            let size = fs::metadata(dir.path().join(name)).unwrap().len();
            assert!(size <= limits.max_size + line.len() as u64 + 1, "{} is {} bytes", name, size);
        }
    }
}
