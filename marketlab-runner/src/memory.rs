//! Run memory: append-only JSONL log of completed runs.
//!
//! One [`MemoryRecord`] per line. Appends hold an exclusive file lock so
//! concurrent runs never interleave records; reads take whatever is on disk
//! and skip lines that do not parse (for example a record still being written).

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::tools::CrossParams;

pub const MEMORY_FILE: &str = "memory.jsonl";

/// How far back `last_best_params` looks.
pub const BEST_PARAMS_LOOKBACK: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub date: String,
    pub universe_size: usize,
    pub top_pick: Option<String>,
    pub top_conf: Option<f64>,
    /// Present only when the top pick's parameters came from an optimization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_params: Option<CrossParams>,
}

pub struct RunMemory {
    path: PathBuf,
}

impl RunMemory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<reports_dir>/memory.jsonl`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(MEMORY_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &MemoryRecord) -> io::Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;
        let written = writeln!(file, "{json}").and_then(|_| file.flush());
        let unlocked = FileExt::unlock(&file);
        written?;
        unlocked?;

        info!(path = %self.path.display(), top_pick = ?record.top_pick, "memory appended");
        Ok(())
    }

    /// Last `n` records, oldest first. Missing file means no history.
    pub fn recent(&self, n: usize) -> io::Result<Vec<MemoryRecord>> {
        if n == 0 || !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path)?;
        let mut records = Vec::new();
        for line in io::BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MemoryRecord>(&line) {
                Ok(r) => records.push(r),
                Err(e) => debug!(error = %e, "skipping malformed memory line"),
            }
        }
        let skip = records.len().saturating_sub(n);
        Ok(records.split_off(skip))
    }

    /// Newest remembered parameters for `symbol` with both windows positive.
    pub fn last_best_params(&self, symbol: &str) -> io::Result<Option<CrossParams>> {
        let records = self.recent(BEST_PARAMS_LOOKBACK)?;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.top_pick.as_deref() == Some(symbol))
            .filter_map(|r| r.best_params)
            .find(|p| p.fast > 0 && p.slow > 0))
    }
}
