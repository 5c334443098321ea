//! `env_logger` setup for the binary.
//!
//! Lines look like `[2024-05-01T10:00:00Z INFO dedup[4242]] last run was never`.
//! With `logging.log_to_file` every line also goes to the configured file.

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};

/// Sends log output to stderr and a file.
pub struct DualWriter {
    pub console: io::Stderr,
    pub file: File,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = self.console.write(buf);
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = self.console.flush();
        self.file.flush()
    }
}

/// Parses a level name, falling back to `info` for anything unknown.
pub fn parse_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::Info)
}

/// Installs the global logger.
///
/// `level_override` (from `--log-level`) wins over the configured level.
/// `RUST_LOG` is honoured when neither names a level explicitly.
pub fn init(config: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    let mut builder = match level_override {
        Some(level) => {
            let mut b = Builder::new();
            b.filter_level(parse_level(level));
            b
        }
        None => Builder::from_env(env_logger::Env::default().default_filter_or(&config.level)),
    };

    let pid = std::process::id();
    builder.format(move |buf, record| {
        writeln!(
            buf,
            "[{} {} dedup[{}]] {}",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            record.level(),
            pid,
            record.args()
        )
    });

    if config.log_to_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .with_context(|| format!("Failed to open log file {}", config.log_file.display()))?;
        builder.target(Target::Pipe(Box::new(DualWriter {
            console: io::stderr(),
            file,
        })));
    }

    builder
        .try_init()
        .context("Failed to initialize logger")?;
    Ok(())
}
