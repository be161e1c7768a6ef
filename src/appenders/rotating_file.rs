//! Rotating file appender
//!
//! Rolls the active file over to numbered backups (`app.log.1` is the most
//! recent) when a size limit or a time interval is reached, keeping at most
//! `max_backup_files` backups, optionally gzip-compressed.

use super::file::open_append;
use crate::core::{Appender, LoggerError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// When to roll the active file over
///
/// ```
/// use rust_json_logger::appenders::RotationStrategy;
/// use std::time::Duration;
///
/// let size = RotationStrategy::size(10_000);
/// let hourly = RotationStrategy::time(Duration::from_secs(3600));
/// let either = RotationStrategy::hybrid(10_000, Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RotationStrategy {
    /// Roll over before a write would take the file to `max_bytes` or
    /// beyond. `0` disables rotation.
    Size { max_bytes: u64 },

    /// Roll over once `interval` has passed since the last rotation
    Time { interval: Duration },

    /// Size OR time, whichever comes first
    Hybrid { max_bytes: u64, interval: Duration },

    /// Never roll over
    Never,
}

impl Default for RotationStrategy {
    fn default() -> Self {
        RotationStrategy::Size {
            max_bytes: 10 * 1024 * 1024, // 10 MB
        }
    }
}

impl RotationStrategy {
    #[must_use]
    pub fn size(max_bytes: u64) -> Self {
        RotationStrategy::Size { max_bytes }
    }

    #[must_use]
    pub fn time(interval: Duration) -> Self {
        RotationStrategy::Time { interval }
    }

    #[must_use]
    pub fn hybrid(max_bytes: u64, interval: Duration) -> Self {
        RotationStrategy::Hybrid { max_bytes, interval }
    }
}

/// Configuration for rotating file appender
#[derive(Debug, Clone, PartialEq)]
pub struct RotationPolicy {
    pub strategy: RotationStrategy,
    /// Number of backups to keep; `0` truncates the file on rotation
    pub max_backup_files: usize,
    /// Gzip backups after they are rolled over
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            strategy: RotationStrategy::default(),
            max_backup_files: 5,
            compress: false,
        }
    }
}

impl RotationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_strategy(mut self, strategy: RotationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Shorthand for `with_strategy(RotationStrategy::Size { max_bytes })`
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size(mut self, max_bytes: u64) -> Self {
        self.strategy = RotationStrategy::Size { max_bytes };
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backup_files = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }
}

/// File appender with size and time based rotation
///
/// ```no_run
/// use rust_json_logger::appenders::{RotatingFileAppender, RotationPolicy};
///
/// let policy = RotationPolicy::new().with_max_size(10_000).with_max_backups(3);
/// let appender = RotatingFileAppender::with_policy("logs/my_app.log.jsonl", policy).unwrap();
/// ```
pub struct RotatingFileAppender {
    base_path: PathBuf,
    policy: RotationPolicy,
    writer: Option<BufWriter<File>>,
    current_size: u64,
    last_rotation: SystemTime,
    /// Rotation failures not yet collected by the sink
    warnings: Vec<LoggerError>,
}

impl RotatingFileAppender {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_policy(path, RotationPolicy::default())
    }

    pub fn with_policy<P: AsRef<Path>>(path: P, policy: RotationPolicy) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        let file = open_append(&base_path)?;
        let metadata = file.metadata().map_err(|e| {
            LoggerError::io_operation(
                "inspect log file",
                format!("Cannot access metadata of '{}'", base_path.display()),
                e,
            )
        })?;

        Ok(Self {
            current_size: metadata.len(),
            last_rotation: metadata.modified().unwrap_or_else(|_| SystemTime::now()),
            writer: Some(BufWriter::new(file)),
            base_path,
            policy,
            warnings: Vec::new(),
        })
    }

    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    fn should_rotate(&self, incoming: u64) -> bool {
        let size_exceeded = |max_bytes: u64| {
            max_bytes > 0 && self.current_size > 0 && self.current_size + incoming >= max_bytes
        };
        let interval_elapsed = |interval: Duration| {
            SystemTime::now()
                .duration_since(self.last_rotation)
                .unwrap_or(Duration::ZERO)
                >= interval
        };

        match self.policy.strategy {
            RotationStrategy::Never => false,
            RotationStrategy::Size { max_bytes } => size_exceeded(max_bytes),
            RotationStrategy::Time { interval } => interval_elapsed(interval),
            RotationStrategy::Hybrid { max_bytes, interval } => {
                size_exceeded(max_bytes) || interval_elapsed(interval)
            }
        }
    }

    /// Path of backup `index`, plain or gzip
    fn backup_path(&self, index: usize, compressed: bool) -> PathBuf {
        let mut name = self.base_path.as_os_str().to_owned();
        name.push(format!(".{}", index));
        if compressed {
            name.push(".gz");
        }
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        let keep = self.policy.max_backup_files;
        if keep > 0 {
            for compressed in [false, true] {
                let oldest = self.backup_path(keep, compressed);
                if oldest.exists() {
                    fs::remove_file(&oldest).map_err(|e| {
                        LoggerError::file_rotation(
                            oldest.display().to_string(),
                            format!("Failed to remove oldest backup: {}", e),
                        )
                    })?;
                }
            }

            for index in (1..keep).rev() {
                for compressed in [false, true] {
                    let from = self.backup_path(index, compressed);
                    if from.exists() {
                        fs::rename(&from, self.backup_path(index + 1, compressed)).map_err(|e| {
                            LoggerError::file_rotation(
                                from.display().to_string(),
                                format!("Failed to shift backup: {}", e),
                            )
                        })?;
                    }
                }
            }

            let first = self.backup_path(1, false);
            fs::rename(&self.base_path, &first).map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to move active file to backup: {}", e),
                )
            })?;

            if self.policy.compress {
                self.compress_backup(&first)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(keep == 0)
            .append(keep > 0)
            .open(&self.base_path)
            .map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to create new log file: {}", e),
                )
            })?;

        self.writer = Some(BufWriter::new(file));
        self.current_size = 0;
        self.last_rotation = SystemTime::now();
        Ok(())
    }

    /// Gzip `path` into `path.gz`; the plain file is removed only after the
    /// compressed copy is complete.
    fn compress_backup(&self, path: &Path) -> Result<()> {
        let gz_path = self.backup_path(1, true);
        let mut tmp_name = gz_path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let result = (|| -> io::Result<()> {
            let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
            let output = BufWriter::with_capacity(64 * 1024, File::create(&tmp_path)?);
            let mut encoder = flate2::write::GzEncoder::new(output, flate2::Compression::default());
            io::copy(&mut reader, &mut encoder)?;
            encoder.finish()?.flush()?;
            fs::rename(&tmp_path, &gz_path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(LoggerError::io_operation(
                "compress log backup",
                format!("Failed to compress '{}'", path.display()),
                e,
            ));
        }

        fs::remove_file(path).map_err(|e| {
            LoggerError::io_operation(
                "compress log backup",
                format!("Compressed but could not remove '{}'", path.display()),
                e,
            )
        })
    }

    /// Reopen the active file after a failed rotation
    fn recover_writer(&mut self) -> Result<()> {
        if self.writer.is_none() {
            let file = open_append(&self.base_path)?;
            self.writer = Some(BufWriter::new(file));
        }
        // Allow the file to grow past the limit rather than retrying on
        // every write.
        self.current_size = 0;
        self.last_rotation = SystemTime::now();
        Ok(())
    }
}

impl Appender for RotatingFileAppender {
    fn append(&mut self, formatted: &str) -> Result<()> {
        let incoming = formatted.len() as u64 + 1;

        if self.should_rotate(incoming) {
            if let Err(e) = self.rotate() {
                self.warnings.push(e);
                self.recover_writer()?;
            }
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::sink_write(self.base_path.display().to_string(), "Writer not initialized"))?;

        writer
            .write_all(formatted.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(|e| {
                LoggerError::io_operation(
                    "write log record",
                    format!("Failed to write to '{}'", self.base_path.display()),
                    e,
                )
            })?;
        self.current_size += incoming;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush().map_err(|e| {
                LoggerError::io_operation(
                    "flush log file",
                    format!("Failed to flush '{}'", self.base_path.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "rotating_file"
    }

    fn take_warnings(&mut self) -> Vec<LoggerError> {
        std::mem::take(&mut self.warnings)
    }
}

impl Drop for RotatingFileAppender {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::thread;
    use tempfile::tempdir;

    fn line(i: usize) -> String {
        format!("{{\"message\":\"Test message number {}\"}}", i)
    }

    #[test]
    fn test_rotation_policy_builder() {
        let policy = RotationPolicy::new()
            .with_max_size(1024)
            .with_max_backups(3)
            .with_compression(true);

        assert_eq!(policy.strategy, RotationStrategy::Size { max_bytes: 1024 });
        assert_eq!(policy.max_backup_files, 3);
        assert!(policy.compress);
    }

    #[test]
    fn test_default_strategy() {
        assert_eq!(
            RotationStrategy::default(),
            RotationStrategy::Size {
                max_bytes: 10 * 1024 * 1024
            }
        );
    }

    #[test]
    fn test_rotating_appender_creation() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("test.log");

        let appender = RotatingFileAppender::new(&log_path).unwrap();
        assert_eq!(appender.path(), log_path);
        assert_eq!(appender.current_size(), 0);
    }

    #[test]
    fn test_size_rotation_keeps_limit() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("rotation.log");
        let policy = RotationPolicy::new().with_max_size(100).with_max_backups(2);

        let mut appender = RotatingFileAppender::with_policy(&log_path, policy).unwrap();
        for i in 0..20 {
            appender.append(&line(i)).unwrap();
        }
        appender.flush().unwrap();

        assert!(dir.path().join("rotation.log.1").exists());
        assert!(dir.path().join("rotation.log.2").exists());
        assert!(!dir.path().join("rotation.log.3").exists());

        // Active file stays under the limit
        let active = fs::metadata(&log_path).unwrap().len();
        assert!(active < 100, "active file is {} bytes", active);

        // The newest record is in the active file
        let content = fs::read_to_string(&log_path).unwrap();
        assert!(content.ends_with(&format!("{}\n", line(19))));
    }

    #[test]
    fn test_zero_max_bytes_never_rotates() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("unbounded.log");
        let policy = RotationPolicy::new().with_max_size(0);

        let mut appender = RotatingFileAppender::with_policy(&log_path, policy).unwrap();
        for i in 0..50 {
            appender.append(&line(i)).unwrap();
        }
        appender.flush().unwrap();
        assert!(!dir.path().join("unbounded.log.1").exists());
    }

    #[test]
    fn test_never_strategy() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("never.log");
        let policy = RotationPolicy::new().with_strategy(RotationStrategy::Never);

        let mut appender = RotatingFileAppender::with_policy(&log_path, policy).unwrap();
        for i in 0..100 {
            appender.append(&line(i)).unwrap();
        }
        appender.flush().unwrap();

        assert!(!dir.path().join("never.log.1").exists());
        assert_eq!(fs::read_to_string(&log_path).unwrap().lines().count(), 100);
    }

    #[test]
    fn test_zero_backups_truncates() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("single.log");
        let policy = RotationPolicy::new().with_max_size(60).with_max_backups(0);

        let mut appender = RotatingFileAppender::with_policy(&log_path, policy).unwrap();
        for i in 0..10 {
            appender.append(&line(i)).unwrap();
        }
        appender.flush().unwrap();

        assert!(!dir.path().join("single.log.1").exists());
        let content = fs::read_to_string(&log_path).unwrap();
        assert_eq!(content, format!("{}\n", line(9)));
    }

    #[test]
    fn test_failed_rotation_is_collected() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("blocked.log");
        let blocker = dir.path().join("blocked.log.1");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), b"x").unwrap();

        let policy = RotationPolicy::new().with_max_size(60).with_max_backups(1);
        let mut appender = RotatingFileAppender::with_policy(&log_path, policy).unwrap();
        for i in 0..2 {
            appender.append(&line(i)).unwrap();
        }
        appender.flush().unwrap();

        let warnings = appender.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], LoggerError::FileRotationError { .. }));
        assert!(appender.take_warnings().is_empty());

        // Writes continue in the active file
        let content = fs::read_to_string(&log_path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_time_rotation() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("time.log");
        let policy = RotationPolicy::new()
            .with_strategy(RotationStrategy::time(Duration::from_millis(50)))
            .with_max_backups(3);

        let mut appender = RotatingFileAppender::with_policy(&log_path, policy).unwrap();
        appender.append("initial").unwrap();
        appender.flush().unwrap();

        thread::sleep(Duration::from_millis(80));

        appender.append("after interval").unwrap();
        appender.flush().unwrap();

        assert!(dir.path().join("time.log.1").exists());
        assert_eq!(fs::read_to_string(&log_path).unwrap(), "after interval\n");
    }

    #[test]
    fn test_compressed_backups() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("zipped.log");
        let policy = RotationPolicy::new()
            .with_max_size(40)
            .with_max_backups(2)
            .with_compression(true);

        let mut appender = RotatingFileAppender::with_policy(&log_path, policy).unwrap();
        appender.append(&line(1)).unwrap();
        appender.append(&line(2)).unwrap();
        appender.flush().unwrap();

        let gz = dir.path().join("zipped.log.1.gz");
        assert!(gz.exists());
        assert!(!dir.path().join("zipped.log.1").exists());

        let mut decoded = String::new();
        flate2::read::GzDecoder::new(File::open(gz).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, format!("{}\n", line(1)));
    }
}
