//! The orchestration loop.
//!
//! One run: plan, validate, execute, auto-analyze, reflect, fall back,
//! pick, persist, remember. Tool failures are recorded against their step
//! and never stop the run; only failing to persist the report is fatal.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use marketlab_core::fingerprint::hash_hex;

use crate::artifacts::{pick_top_candidates, RunArtifacts, TOP_SCREENED};
use crate::config::AgentConfig;
use crate::logging::RunLogSink;
use crate::memory::{MemoryRecord, RunMemory};
use crate::plan::{validate_plan, Plan, Step, ValidationNote, DEFAULT_FAST, DEFAULT_SLOW};
use crate::planner::{default_plan, PlanContext, Planner, GOAL};
use crate::reporting::{ReportPaths, ReportStore, RunReport, DISCLAIMER};
use crate::tools::{execute_step, CrossParams, StepOutput, Tools};

/// Minimum horizon for reflection backtests of optimized params.
pub const REFLECT_BACKTEST_DAYS: u32 = 1000;
/// Minimum horizon for the top-1 reflection (memory reuse or fresh optimization).
pub const REFLECT_OPTIMIZE_DAYS: u32 = 1200;
/// Minimum horizon for the fallback backtest.
pub const FALLBACK_DAYS: u32 = 1000;
/// Memory records shown to the planner.
pub const RECENT_RUNS: usize = 3;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to persist run report: {0}")]
    Persist(#[source] anyhow::Error),
}

/// Which stage of the loop issued a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOrigin {
    Plan,
    AutoAnalyze,
    Reflect,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepOutcome {
    #[serde(rename = "result")]
    Result(StepOutput),
    #[serde(rename = "error")]
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedStep {
    pub step: Step,
    pub origin: StepOrigin,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

impl ExecutedStep {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, StepOutcome::Result(_))
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub paths: ReportPaths,
}

pub struct Orchestrator<'a> {
    config: &'a AgentConfig,
    planner: &'a dyn Planner,
    tools: &'a dyn Tools,
    memory: &'a RunMemory,
    store: &'a ReportStore,
    log_sink: Option<RunLogSink>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a AgentConfig,
        planner: &'a dyn Planner,
        tools: &'a dyn Tools,
        memory: &'a RunMemory,
        store: &'a ReportStore,
    ) -> Self {
        Self {
            config,
            planner,
            tools,
            memory,
            store,
            log_sink: None,
        }
    }

    /// Mirror each run's log lines into `<date>/run.log`.
    pub fn with_log_sink(mut self, sink: RunLogSink) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn run_once(&self) -> Result<RunOutcome, RunError> {
        self.run_at(Local::now().naive_local())
    }

    /// One full run stamped with `now`.
    pub fn run_at(&self, now: NaiveDateTime) -> Result<RunOutcome, RunError> {
        if let Some(sink) = &self.log_sink {
            let path = self.store.day_dir(now.date()).join("run.log");
            if let Err(e) = sink.open(&path) {
                warn!(path = %path.display(), error = %e, "could not open run log");
            }
        }
        let result = self.run_inner(now);
        if let Some(sink) = &self.log_sink {
            sink.close();
        }
        result
    }

    fn run_inner(&self, now: NaiveDateTime) -> Result<RunOutcome, RunError> {
        let universe = &self.config.universe;
        let days = self.config.default_days;
        info!(universe = ?universe, days, "run started");

        let mut run = RunState::new(self.tools, days);
        let (plan, validation) = self.plan_and_validate(now, universe, days);

        for step in &plan.steps {
            run.execute(step.clone(), StepOrigin::Plan);
        }

        run.auto_analyze();
        run.reflect(self.memory);
        run.fallback();

        let picks = pick_top_candidates(&run.artifacts, self.config.confidence_threshold);
        info!(picks = picks.len(), "picks assembled");

        let run_id = run_id(now, universe, &plan);
        let report = RunReport {
            run_id,
            date: now,
            universe: universe.clone(),
            plan,
            validation,
            steps_executed: run.executed,
            picks,
            artifacts: run.artifacts,
            disclaimer: DISCLAIMER.to_string(),
        };

        let paths = self.store.save(&report).map_err(RunError::Persist)?;
        info!(path = %paths.run_json.display(), "report written");

        let record = memory_record(&report);
        if let Err(e) = self.memory.append(&record) {
            warn!(error = %e, "memory append failed");
        }

        Ok(RunOutcome { report, paths })
    }

    fn plan_and_validate(
        &self,
        now: NaiveDateTime,
        universe: &[String],
        days: u32,
    ) -> (Plan, Vec<ValidationNote>) {
        let recent_runs = self.memory.recent(RECENT_RUNS).unwrap_or_else(|e| {
            warn!(error = %e, "could not read run memory");
            Vec::new()
        });
        let context = PlanContext {
            universe: universe.to_vec(),
            days,
            recent_runs,
            confidence_threshold: self.config.confidence_threshold,
        };

        let raw = match self.planner.plan(GOAL, &context, self.config.max_steps) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(planner = self.planner.name(), error = %e, "planner failed, using default plan");
                default_plan(GOAL, &context)
            }
        };
        let validated = validate_plan(&raw, self.config.max_steps);
        let mut plan = validated.plan;
        if plan.objective.is_empty() {
            plan.objective = GOAL.to_string();
        }
        debug!(at = %now, steps = plan.steps.len(), "plan ready");
        (plan, validated.notes)
    }
}

/// Mutable state of one run: the step trail and the accumulated artifacts.
struct RunState<'a> {
    tools: &'a dyn Tools,
    days: u32,
    executed: Vec<ExecutedStep>,
    artifacts: RunArtifacts,
}

impl<'a> RunState<'a> {
    fn new(tools: &'a dyn Tools, days: u32) -> Self {
        Self {
            tools,
            days,
            executed: Vec::new(),
            artifacts: RunArtifacts::default(),
        }
    }

    /// Run one step, record it, and file a success under its stage.
    fn execute(&mut self, step: Step, origin: StepOrigin) -> Option<StepOutput> {
        let tool = step.tool();
        match execute_step(self.tools, &step) {
            Ok(output) => {
                info!(tool, symbol = ?step.symbol(), ?origin, "step ok");
                self.artifacts.record(&output);
                self.executed.push(ExecutedStep {
                    step,
                    origin,
                    outcome: StepOutcome::Result(output.clone()),
                });
                Some(output)
            }
            Err(e) => {
                warn!(tool, symbol = ?step.symbol(), ?origin, error = %e, "step failed");
                self.executed.push(ExecutedStep {
                    step,
                    origin,
                    outcome: StepOutcome::Error(format!("{tool} failed: {e}")),
                });
                None
            }
        }
    }

    /// Analyze the top screened symbols the plan left unanalyzed.
    fn auto_analyze(&mut self) {
        if !self.artifacts.has_screen() {
            return;
        }
        for symbol in self.artifacts.top_screened(TOP_SCREENED) {
            if self.artifacts.analysis.contains_key(&symbol) {
                continue;
            }
            info!(symbol = %symbol, "auto-analyzing");
            let days = self.days;
            self.execute(Step::Analyze { symbol, days }, StepOrigin::AutoAnalyze);
        }
    }

    /// Make sure analyzed candidates get at least one backtest.
    fn reflect(&mut self, memory: &RunMemory) {
        if self.artifacts.analysis.is_empty() || !self.artifacts.backtests.is_empty() {
            return;
        }

        if !self.artifacts.optimizations.is_empty() {
            let days = self.days.max(REFLECT_BACKTEST_DAYS);
            let bests: Vec<(String, usize, usize)> = self
                .artifacts
                .optimizations
                .iter()
                .map(|(sym, opt)| (sym.clone(), opt.result.best.fast, opt.result.best.slow))
                .collect();
            for (symbol, fast, slow) in bests {
                info!(symbol = %symbol, fast, slow, "reflect: backtesting optimized params");
                self.execute(
                    Step::Backtest {
                        symbol,
                        fast,
                        slow,
                        days,
                    },
                    StepOrigin::Reflect,
                );
            }
            return;
        }

        let candidate = self
            .artifacts
            .top_screened(1)
            .into_iter()
            .next()
            .or_else(|| self.artifacts.top_analyzed());
        let Some(symbol) = candidate else { return };
        let days = self.days.max(REFLECT_OPTIMIZE_DAYS);

        let remembered = memory.last_best_params(&symbol).unwrap_or_else(|e| {
            warn!(error = %e, "could not read run memory");
            None
        });
        let (fast, slow) = match remembered {
            Some(p) => {
                info!(symbol = %symbol, fast = p.fast, slow = p.slow, "reflect: reusing remembered params");
                (p.fast, p.slow)
            }
            None => {
                info!(symbol = %symbol, "reflect: optimizing default grid");
                let step = Step::default_optimize(&symbol, days);
                match self.execute(step, StepOrigin::Reflect) {
                    Some(StepOutput::Optimization(opt)) => (opt.result.best.fast, opt.result.best.slow),
                    _ => return,
                }
            }
        };
        self.execute(
            Step::Backtest {
                symbol,
                fast,
                slow,
                days,
            },
            StepOrigin::Reflect,
        );
    }

    /// Conservative 50/200 backtest of the top screened symbol.
    fn fallback(&mut self) {
        if !self.artifacts.backtests.is_empty() || !self.artifacts.has_screen() {
            return;
        }
        let Some(symbol) = self.artifacts.top_screened(1).into_iter().next() else {
            return;
        };
        info!(symbol = %symbol, "fallback backtest with default params");
        self.execute(
            Step::Backtest {
                symbol,
                fast: DEFAULT_FAST,
                slow: DEFAULT_SLOW,
                days: self.days.max(FALLBACK_DAYS),
            },
            StepOrigin::Fallback,
        );
    }
}

/// BLAKE3 over date, universe and the validated plan.
fn run_id(now: NaiveDateTime, universe: &[String], plan: &Plan) -> String {
    let payload = serde_json::json!({
        "date": now.to_string(),
        "universe": universe,
        "plan": plan,
    });
    hash_hex(payload.to_string().as_bytes())
}

fn memory_record(report: &RunReport) -> MemoryRecord {
    let top = report.picks.first();
    let best_params = top.and_then(|p| {
        report
            .artifacts
            .optimizations
            .get(&p.symbol)
            .map(|o| CrossParams {
                fast: o.result.best.fast,
                slow: o.result.best.slow,
            })
    });
    MemoryRecord {
        date: report.date.format("%Y-%m-%d").to_string(),
        universe_size: report.universe.len(),
        top_pick: top.map(|p| p.symbol.clone()),
        top_conf: top.map(|p| p.confidence),
        best_params,
    }
}
