//! Shared logging setup and home-directory paths for Switchyard binaries.
//!
//! Library crates only emit `tracing` events; the binary calls
//! [`init_logging`] once. Log lines go to a size-capped rolling file under
//! the Switchyard home plus stderr, so a `--json` caller can still pipe
//! stdout cleanly.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str =
    "switchyard=info,switchyard_dispatch=info,switchyard_ledger=info,switchyard_routing=info";
const MAX_LOG_FILES: usize = 4;
const MAX_LOG_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Logging configuration for the Switchyard binary.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Mirror the full file filter on stderr instead of the quieter default.
    pub verbose: bool,
    /// Keep stderr to warnings only, e.g. when stdout carries a JSON report.
    pub quiet: bool,
}

/// Initialize tracing with a rolling file writer and a stderr layer.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
    let file_writer = SharedLogWriter::new(log_dir, config.app_name)
        .context("Failed to initialize rolling log writer")?;

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.verbose {
        file_filter.clone()
    } else if config.quiet {
        EnvFilter::new("warn")
    } else {
        file_filter.clone()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .init();

    Ok(())
}

/// The Switchyard home directory: ~/.switchyard
pub fn switchyard_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("SWITCHYARD_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .expect("Could not determine home directory")
        .join(".switchyard")
}

/// The logs directory: ~/.switchyard/logs
pub fn logs_dir() -> PathBuf {
    switchyard_home().join("logs")
}

/// Default ledger database path: ~/.switchyard/ledger.sqlite3
pub fn default_ledger_path() -> PathBuf {
    switchyard_home().join("ledger.sqlite3")
}

/// Default config file path: ~/.switchyard/config.toml
pub fn default_config_path() -> PathBuf {
    switchyard_home().join("config.toml")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

struct RollingLogFile {
    dir: PathBuf,
    base_name: String,
    max_files: usize,
    max_size: u64,
    file: Option<File>,
    current_size: u64,
}

impl RollingLogFile {
    fn new(dir: PathBuf, base_name: &str, max_files: usize, max_size: u64) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        let mut log = Self {
            dir,
            base_name: sanitize_name(base_name),
            max_files: max_files.max(1),
            max_size,
            file: None,
            current_size: 0,
        };
        let (file, size) = log.open_current()?;
        log.file = Some(file);
        log.current_size = size;
        if log.current_size > log.max_size {
            log.rotate()?;
        }
        Ok(log)
    }

    fn open_current(&self) -> io::Result<(File, u64)> {
        let path = self.current_path();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();
        Ok((file, size))
    }

    fn current_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.base_name))
    }

    fn rotated_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.base_name, index))
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }

        self.shift_rotated()?;

        let (file, size) = self.open_current()?;
        self.file = Some(file);
        self.current_size = size;
        Ok(())
    }

    /// Shift `<name>.log` to `.log.1`, `.log.1` to `.log.2`, dropping the
    /// oldest index.
    fn shift_rotated(&self) -> io::Result<()> {
        let max_index = self.max_files.saturating_sub(1);
        if max_index == 0 {
            return Ok(());
        }

        let oldest = self.rotated_path(max_index);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        for idx in (1..max_index).rev() {
            let src = self.rotated_path(idx);
            if src.exists() {
                fs::rename(&src, self.rotated_path(idx + 1))?;
            }
        }

        let current = self.current_path();
        if current.exists() {
            fs::rename(current, self.rotated_path(1))?;
        }

        Ok(())
    }
}

impl Write for RollingLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.current_size + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let bytes = file.write(buf)?;
        self.current_size += bytes as u64;
        Ok(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

#[derive(Clone)]
struct SharedLogWriter {
    inner: Arc<Mutex<RollingLogFile>>,
}

impl SharedLogWriter {
    fn new(dir: PathBuf, base_name: &str) -> Result<Self> {
        let log = RollingLogFile::new(dir, base_name, MAX_LOG_FILES, MAX_LOG_FILE_SIZE)
            .with_context(|| format!("Failed to open log file for {}", base_name))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(log)),
        })
    }
}

struct SharedLogWriterGuard {
    inner: Arc<Mutex<RollingLogFile>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedLogWriter {
    type Writer = SharedLogWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedLogWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for SharedLogWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        guard.flush()
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_name_strips_path_characters() {
        assert_eq!(sanitize_name("switchyard"), "switchyard");
        assert_eq!(sanitize_name("../etc/passwd"), "___etc_passwd");
        assert_eq!(sanitize_name("switch yard v2"), "switch_yard_v2");
    }

    #[test]
    fn test_writes_land_in_current_file() {
        let tmp = TempDir::new().unwrap();
        let mut log = RollingLogFile::new(tmp.path().to_path_buf(), "sy", 3, 1024).unwrap();

        log.write_all(b"hello\n").unwrap();
        log.flush().unwrap();

        let content = fs::read_to_string(tmp.path().join("sy.log")).unwrap();
        assert_eq!(content, "hello\n");
    }

    #[test]
    fn test_rotation_keeps_bounded_history() {
        let tmp = TempDir::new().unwrap();
        // 32-byte cap: every 40-byte line forces a rotation.
        let mut log = RollingLogFile::new(tmp.path().to_path_buf(), "sy", 3, 32).unwrap();

        for i in 0..5 {
            let line = format!("line {} padded to forty bytes exactly...\n", i);
            assert_eq!(line.len(), 40);
            log.write_all(line.as_bytes()).unwrap();
        }
        log.flush().unwrap();

        assert!(tmp.path().join("sy.log").exists());
        assert!(tmp.path().join("sy.log.1").exists());
        assert!(tmp.path().join("sy.log.2").exists());
        // max_files = 3 means no index beyond .2 survives.
        assert!(!tmp.path().join("sy.log.3").exists());
    }

    #[test]
    fn test_oversized_existing_file_rotates_on_open() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("sy.log"), vec![b'x'; 64]).unwrap();

        let log = RollingLogFile::new(tmp.path().to_path_buf(), "sy", 3, 32).unwrap();
        drop(log);

        assert!(tmp.path().join("sy.log.1").exists());
        assert_eq!(fs::metadata(tmp.path().join("sy.log")).unwrap().len(), 0);
    }
}
