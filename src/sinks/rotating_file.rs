//! Size-rotating file sink
//!
//! Writes to `<dir>/<file>` and keeps up to `backup_count` numbered backups
//! `<file>.1 .. <file>.N`, `.1` being the newest. When compression is enabled
//! the backups are gzipped to `<file>.N.gz`.

use crate::core::{LogLevel, LoggerError, Result, Sink, WriteOutcome};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Abort a rotation after this many consecutive failures to delete old backups
const MAX_DELETION_FAILURES: usize = 5;

/// Chunk size used when compressing backups
const COMPRESS_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug)]
struct FileState {
    writer: Option<BufWriter<File>>,
    current_size: u64,
    /// Counter for consecutive deletion failures (reset on successful deletion)
    deletion_failure_count: usize,
    closed: bool,
}

/// File sink with size-based rotation
///
/// The size check, the rotation and the write happen under one lock, so
/// concurrent writers never interleave a rotation with a write.
///
/// # Examples
///
/// ```no_run
/// use domain_logger::core::LogLevel;
/// use domain_logger::sinks::RotatingFileSink;
///
/// let sink = RotatingFileSink::new("/var/log/app/api.log", 10 * 1024 * 1024, 5)
///     .unwrap()
///     .with_threshold(LogLevel::Info)
///     .with_compression(true);
/// ```
#[derive(Debug)]
pub struct RotatingFileSink {
    base_path: PathBuf,
    max_bytes: u64,
    backup_count: usize,
    compress: bool,
    threshold: LogLevel,
    state: Mutex<FileState>,
}

impl RotatingFileSink {
    /// Open (or create) the active log file, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created or opened
    pub fn new<P: AsRef<Path>>(path: P, max_bytes: u64, backup_count: usize) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        if max_bytes == 0 {
            return Err(LoggerError::config(
                "RotatingFileSink",
                "max_bytes must be greater than 0",
            ));
        }

        if let Some(parent) = base_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    LoggerError::io_operation(
                        "create log directory",
                        format!("Failed to create directory '{}'", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let (file, current_size) = open_append(&base_path)?;

        Ok(Self {
            base_path,
            max_bytes,
            backup_count,
            compress: false,
            threshold: LogLevel::Debug,
            state: Mutex::new(FileState {
                writer: Some(BufWriter::new(file)),
                current_size,
                deletion_failure_count: 0,
                closed: false,
            }),
        })
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: LogLevel) -> Self {
        self.threshold = threshold;
        self
    }

    /// Gzip rotated backups
    #[must_use]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    #[must_use]
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    #[must_use]
    pub fn backup_count(&self) -> usize {
        self.backup_count
    }

    /// Bytes written to the active file, including buffered bytes
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.state.lock().current_size
    }

    /// Get backup file path for given index
    pub fn backup_path(&self, index: usize) -> PathBuf {
        let mut path = self.base_path.clone();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("app.log")
            .to_string();
        path.set_file_name(format!("{}.{}", filename, index));
        path
    }

    fn should_rotate(&self, state: &FileState, incoming: u64) -> bool {
        state.current_size > 0 && state.current_size + incoming > self.max_bytes
    }

    /// Close the active file, shift the backups and open a fresh file
    fn rotate(&self, state: &mut FileState) -> Result<()> {
        // Explicitly drop writer to release file handle before renaming
        if let Some(mut writer) = state.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        if self.backup_count == 0 {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.base_path)
                .map_err(|e| {
                    LoggerError::file_rotation(
                        self.base_path.display().to_string(),
                        format!("Failed to truncate log file: {}", e),
                    )
                })?;
            state.writer = Some(BufWriter::new(file));
            state.current_size = 0;
            return Ok(());
        }

        self.remove_oldest_backup(state)?;

        for i in (1..self.backup_count).rev() {
            let old_path = self.backup_path(i);
            let new_path = self.backup_path(i + 1);
            let old_compressed = gz_path(&old_path);

            if old_compressed.exists() {
                rename_replacing(&old_compressed, &gz_path(&new_path))?;
            } else if old_path.exists() {
                rename_replacing(&old_path, &new_path)?;
            }
        }

        let backup_path = self.backup_path(1);
        if self.base_path.exists() {
            fs::rename(&self.base_path, &backup_path).map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to rotate current log file: {}", e),
                )
            })?;

            if self.compress {
                compress_file(&backup_path)?;
            }
        }

        let (file, _) = open_append(&self.base_path).map_err(|e| {
            LoggerError::file_rotation(
                self.base_path.display().to_string(),
                format!("Failed to create new log file: {}", e),
            )
        })?;
        state.writer = Some(BufWriter::new(file));
        state.current_size = 0;

        Ok(())
    }

    fn remove_oldest_backup(&self, state: &mut FileState) -> Result<()> {
        let oldest_backup = self.backup_path(self.backup_count);
        let mut deletion_failed = false;

        for candidate in [gz_path(&oldest_backup), oldest_backup] {
            if candidate.exists() {
                if let Err(e) = fs::remove_file(&candidate) {
                    deletion_failed = true;
                    eprintln!(
                        "[LOGGER WARNING] Failed to remove oldest backup {}: {} (failure #{}/{})",
                        candidate.display(),
                        e,
                        state.deletion_failure_count + 1,
                        MAX_DELETION_FAILURES
                    );
                }
            }
        }

        if !deletion_failed {
            state.deletion_failure_count = 0;
            return Ok(());
        }

        state.deletion_failure_count += 1;
        if state.deletion_failure_count >= MAX_DELETION_FAILURES {
            return Err(LoggerError::file_rotation(
                self.base_path.display().to_string(),
                format!(
                    "Rotation aborted: failed to delete old backup files {} consecutive times",
                    state.deletion_failure_count
                ),
            ));
        }
        Ok(())
    }
}

impl Sink for RotatingFileSink {
    fn write(&self, bytes: &[u8], level: LogLevel) -> Result<WriteOutcome> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(LoggerError::sink_closed(self.name()));
        }
        if !self.accepts(level) {
            return Ok(WriteOutcome::Filtered);
        }

        let incoming = bytes.len() as u64;
        if self.should_rotate(&state, incoming) {
            if let Err(e) = self.rotate(&mut state) {
                // Keep logging to the current file rather than losing records
                eprintln!(
                    "[LOGGER WARNING] Log rotation failed: {}. Continuing with current file.",
                    e
                );
                if state.writer.is_none() {
                    let (file, size) = open_append(&self.base_path).map_err(|_| e)?;
                    state.writer = Some(BufWriter::new(file));
                    state.current_size = size;
                }
                // Allow the file to outgrow the bound instead of retrying every write
                state.current_size = 0;
            }
        }

        let writer = state
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::sink_closed(self.name()))?;
        writer.write_all(bytes).map_err(|e| {
            LoggerError::file_sink(
                self.base_path.display().to_string(),
                format!("Failed to write log record: {}", e),
            )
        })?;
        state.current_size += incoming;
        Ok(WriteOutcome::Written)
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(ref mut writer) = state.writer {
            writer.flush().map_err(|e| {
                LoggerError::file_sink(
                    self.base_path.display().to_string(),
                    format!("Failed to flush: {}", e),
                )
            })?;
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.closed = true;
        // Dropping the writer releases the file handle
        if let Some(mut writer) = state.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_sink(
                    self.base_path.display().to_string(),
                    format!("Failed to flush on close: {}", e),
                )
            })?;
        }
        Ok(())
    }

    fn threshold(&self) -> LogLevel {
        self.threshold
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn name(&self) -> &str {
        "rotating_file"
    }
}

impl Drop for RotatingFileSink {
    fn drop(&mut self) {
        if let Some(mut writer) = self.state.get_mut().writer.take() {
            let _ = writer.flush();
        }
    }
}

fn open_append(path: &Path) -> Result<(File, u64)> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            LoggerError::file_sink(path.display().to_string(), format!("Failed to open: {}", e))
        })?;

    let size = file
        .metadata()
        .map_err(|e| {
            LoggerError::file_sink(
                path.display().to_string(),
                format!("Cannot access file metadata: {}", e),
            )
        })?
        .len();
    Ok((file, size))
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

/// Rename, falling back to remove-then-rename where the platform refuses to
/// overwrite an existing destination
fn rename_replacing(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    if to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to).map_err(|e| {
        LoggerError::file_rotation(
            from.display().to_string(),
            format!("Failed to rotate backup files: {}", e),
        )
    })
}

/// Gzip `path` into `path.gz`, removing the original only after the
/// compressed file is complete
fn compress_file(path: &Path) -> Result<()> {
    use std::io::{BufReader, Read};

    let target = gz_path(path);
    let mut temp_name = target.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let input = File::open(path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to open file for compression: {}", path.display()),
            e,
        )
    })?;
    let mut reader = BufReader::with_capacity(COMPRESS_BUFFER_SIZE, input);

    let output = File::create(&temp_path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to create temporary compressed file: {}", temp_path.display()),
            e,
        )
    })?;
    let mut encoder = flate2::write::GzEncoder::new(
        BufWriter::with_capacity(COMPRESS_BUFFER_SIZE, output),
        flate2::Compression::default(),
    );

    let mut buffer = vec![0u8; COMPRESS_BUFFER_SIZE];
    let streamed: std::io::Result<()> = (|| {
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            encoder.write_all(&buffer[..bytes_read])?;
        }
        encoder.finish()?.flush()
    })();

    if let Err(e) = streamed {
        let _ = fs::remove_file(&temp_path);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress {}", path.display()),
            e,
        ));
    }

    fs::rename(&temp_path, &target).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to rename compressed file to: {}", target.display()),
            e,
        )
    })?;

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[LOGGER WARNING] Compression succeeded but failed to remove original file {}: {}",
            path.display(),
            e
        );
    }

    Ok(())
}
