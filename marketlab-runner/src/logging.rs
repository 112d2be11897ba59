//! Tracing setup: console output plus a per-run log file.
//!
//! The file layer writes through a [`RunLogSink`], which the orchestrator
//! points at `reports/<date>/run.log` when a run starts. Until then (and
//! after [`RunLogSink::close`]) file output is discarded.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Switchable destination for the file layer.
#[derive(Clone, Default)]
pub struct RunLogSink {
    file: Arc<Mutex<Option<File>>>,
}

impl RunLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append subsequent log lines to `path` (parent directories are created).
    pub fn open(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if let Ok(mut slot) = self.file.lock() {
            *slot = Some(file);
        }
        Ok(())
    }

    pub fn close(&self) {
        if let Ok(mut slot) = self.file.lock() {
            if let Some(f) = slot.as_mut() {
                let _ = f.flush();
            }
            *slot = None;
        }
    }
}

pub struct RunLogWriter {
    file: Arc<Mutex<Option<File>>>,
}

impl Write for RunLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.lock() {
            Ok(mut slot) => match slot.as_mut() {
                Some(f) => f.write(buf),
                None => Ok(buf.len()),
            },
            // poisoned: drop the line rather than fail the caller
            Err(_) => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.lock() {
            Ok(mut slot) => slot.as_mut().map_or(Ok(()), |f| f.flush()),
            Err(_) => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for RunLogSink {
    type Writer = RunLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RunLogWriter {
            file: Arc::clone(&self.file),
        }
    }
}

/// Filter from a `RUST_LOG`-style directive string; `info` when absent, blank or invalid.
fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Install the global subscriber. `RUST_LOG` replaces the default `info` level.
///
/// Returns the sink feeding the file layer. Fails if a subscriber is
/// already installed.
pub fn init() -> anyhow::Result<RunLogSink> {
    let sink = RunLogSink::new();

    let console = tracing_subscriber::fmt::layer().with_target(false);
    let file = tracing_subscriber::fmt::layer()
        .with_writer(sink.clone())
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with(console)
        .with(file)
        .try_init()?;

    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn rust_log_overrides_default_level() {
        assert_eq!(env_filter(None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(env_filter(Some("debug")).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(env_filter(Some("warn")).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(env_filter(Some("  ")).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn sink_writes_only_while_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("2024-01-02").join("run.log");
        let sink = RunLogSink::new();

        sink.make_writer().write_all(b"dropped\n").unwrap();
        sink.open(&path).unwrap();
        sink.make_writer().write_all(b"kept\n").unwrap();
        sink.close();
        sink.make_writer().write_all(b"dropped again\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "kept\n");
    }
}
