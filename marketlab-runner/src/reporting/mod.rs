//! Report persistence: one directory per day under the reports root.
//!
//! ```text
//! reports/
//!   memory.jsonl
//!   2024-05-17/
//!     run.json     full run (atomic write)
//!     report.md    human summary
//!     screen.csv   screen rows, when a screen succeeded
//!     run.log      run log (see logging)
//! ```

pub mod export;
pub mod markdown;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::artifacts::{Pick, RunArtifacts};
use crate::orchestrator::ExecutedStep;
use crate::plan::{Plan, ValidationNote};

pub const DISCLAIMER: &str = "Educational demo only - not financial advice.";

const DATE_DIR_FORMAT: &str = "%Y-%m-%d";

/// Everything one run produced, as persisted to `run.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub date: NaiveDateTime,
    pub universe: Vec<String>,
    pub plan: Plan,
    #[serde(default)]
    pub validation: Vec<ValidationNote>,
    pub steps_executed: Vec<ExecutedStep>,
    pub picks: Vec<Pick>,
    pub artifacts: RunArtifacts,
    pub disclaimer: String,
}

impl RunReport {
    pub fn failed_steps(&self) -> usize {
        self.steps_executed.iter().filter(|s| !s.is_ok()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub dir: PathBuf,
    pub run_json: PathBuf,
    pub report_md: PathBuf,
    pub screen_csv: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ReportStore {
    root: PathBuf,
}

impl ReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn day_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join(date.format(DATE_DIR_FORMAT).to_string())
    }

    /// Write `run.json`, `report.md` and (if there are screen rows) `screen.csv`.
    pub fn save(&self, report: &RunReport) -> Result<ReportPaths> {
        let dir = self.day_dir(report.date.date());
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

        let run_json = dir.join("run.json");
        let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
        write_atomic(&run_json, json.as_bytes())?;

        let report_md = dir.join("report.md");
        fs::write(&report_md, markdown::render(report))
            .with_context(|| format!("Failed to write {}", report_md.display()))?;

        let rows = report.artifacts.screen_results();
        let screen_csv = if rows.is_empty() {
            None
        } else {
            let path = dir.join("screen.csv");
            export::write_screen_csv(&path, rows)?;
            Some(path)
        };

        Ok(ReportPaths {
            dir,
            run_json,
            report_md,
            screen_csv,
        })
    }

    /// Dates that have a report directory, oldest first.
    pub fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut dates = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("Failed to list {}", self.root.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Ok(date) = NaiveDate::parse_from_str(&name.to_string_lossy(), DATE_DIR_FORMAT) {
                if entry.path().join("run.json").is_file() {
                    dates.push(date);
                }
            }
        }
        dates.sort();
        Ok(dates)
    }

    pub fn load(&self, date: NaiveDate) -> Result<RunReport> {
        let path = self.day_dir(date).join("run.json");
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn load_latest(&self) -> Result<Option<RunReport>> {
        match self.list_dates()?.last() {
            Some(&date) => self.load(date).map(Some),
            None => Ok(None),
        }
    }
}

/// Write to a sibling temp file, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", tmp.display()))?;
    Ok(())
}
