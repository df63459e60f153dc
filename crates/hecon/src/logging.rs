//! Log output for the `hecon` binary.
//!
//! Reports own stdout, so logs go either to stderr or, with `--log-dir`, to a
//! `hecon.log` file that is trimmed on startup once it grows past 5 MB. Long
//! PSA runs log progress every couple of seconds, so the file grows quickly.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// `hecon.log` is trimmed once it passes this size (5 MB)
const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;
/// Tail of `hecon.log` kept after trimming (1 MB)
const KEEP_SIZE: u64 = 1024 * 1024;

pub const LOG_FILE_NAME: &str = "hecon.log";
const ROTATION_MARKER: &[u8] = b"--- hecon.log trimmed, earlier runs removed ---\n";

/// Cut `hecon.log` down to its newest whole lines once it passes
/// `MAX_LOG_SIZE`. Returns whether anything was removed.
pub(crate) fn rotate_log_if_needed(log_path: &Path) -> std::io::Result<bool> {
    if !log_path.exists() {
        return Ok(false);
    }

    let file_size = fs::metadata(log_path)?.len();
    if file_size <= MAX_LOG_SIZE {
        return Ok(false);
    }

    let mut file = File::open(log_path)?;
    file.seek(SeekFrom::Start(file_size.saturating_sub(KEEP_SIZE)))?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    drop(file);

    // Drop the partial first line
    let skip = buffer
        .iter()
        .position(|&b| b == b'\n')
        .map_or(0, |i| i + 1);

    let mut file = File::create(log_path)?;
    file.write_all(ROTATION_MARKER)?;
    file.write_all(&buffer[skip..])?;
    Ok(true)
}

/// `hecon.log`, shared by every tracing writer (PSA workers log from rayon threads)
#[derive(Clone)]
struct SharedLogFile {
    file: Arc<Mutex<File>>,
}

struct LogFileWriter {
    file: Arc<Mutex<File>>,
}

impl LogFileWriter {
    fn with_file<T>(&self, f: impl FnOnce(&mut File) -> std::io::Result<T>) -> std::io::Result<T> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| std::io::Error::other("hecon.log lock poisoned"))?;
        f(&mut file)
    }
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.with_file(|file| file.write(buf))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.with_file(|file| file.flush())
    }
}

impl<'a> MakeWriter<'a> for SharedLogFile {
    type Writer = LogFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogFileWriter {
            file: self.file.clone(),
        }
    }
}

/// `level` for both hecon crates unless `RUST_LOG` is set
fn env_filter(level: &str) -> EnvFilter {
    let default_filter = format!("hecon={level},hecon_core={level}");
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install the global subscriber: stderr without a log directory, otherwise
/// `{log_dir}/hecon.log` (created if needed, trimmed first when oversized).
pub fn init_logging(log_dir: Option<&Path>, level: &str) -> color_eyre::Result<()> {
    let Some(log_dir) = log_dir else {
        tracing_subscriber::registry()
            .with(env_filter(level))
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .init();
        return Ok(());
    };

    fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(LOG_FILE_NAME);

    if let Err(e) = rotate_log_if_needed(&log_path) {
        eprintln!("Warning: failed to trim {}: {e}", log_path.display());
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(
            fmt::layer()
                .with_writer(SharedLogFile {
                    file: Arc::new(Mutex::new(file)),
                })
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false),
        )
        .init();

    tracing::info!(log_path = %log_path.display(), "hecon logging initialized");
    Ok(())
}
