//! Optional `tracing` subscriber setup for binaries and scripts driving sweeps.
//!
//! The library only emits events; call [`init_logging`] once at startup to see
//! them.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, SweepError};

const ROTATION_MARKER: &[u8] = b"--- Log rotated (older entries removed) ---\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level for this crate when `RUST_LOG` is unset
    pub level: String,
    /// Append to this file instead of stderr
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Size limits applied to `file` before it is opened
    #[serde(default)]
    pub rotation: LogRotation,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            rotation: LogRotation::default(),
        }
    }
}

/// When a sweep log is trimmed, and how much of its tail survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRotation {
    pub max_bytes: u64,
    pub keep_bytes: u64,
}

impl Default for LogRotation {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            keep_bytes: 1024 * 1024,
        }
    }
}

impl LogRotation {
    /// Trim `path` to its last `keep_bytes` once it exceeds `max_bytes`.
    ///
    /// The kept tail starts at a line boundary. Returns whether the file was
    /// rewritten.
    pub fn apply(&self, path: &Path) -> std::io::Result<bool> {
        let len = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        if len <= self.max_bytes {
            return Ok(false);
        }

        let mut tail = Vec::new();
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(len.saturating_sub(self.keep_bytes)))?;
        file.read_to_end(&mut tail)?;
        drop(file);

        let skip = tail.iter().position(|&b| b == b'\n').map_or(0, |i| i + 1);
        let mut file = File::create(path)?;
        file.write_all(ROTATION_MARKER)?;
        file.write_all(&tail[skip..])?;
        Ok(true)
    }
}

/// Install a global subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Fails if a subscriber is
/// already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let default_filter = format!("paramsweep={}", config.level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            if let Err(e) = config.rotation.apply(path) {
                eprintln!("Warning: Failed to rotate log file: {e}");
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            registry
                .with(
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false)
                        .with_target(true),
                )
                .try_init()
        }
        None => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .try_init(),
    };
    installed.map_err(|e| SweepError::Config(e.to_string()))?;

    if let Some(path) = &config.file {
        tracing::info!(log_path = %path.display(), "Sweep logging initialized");
    }
    Ok(())
}
