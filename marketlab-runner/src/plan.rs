//! Plans and the plan validator.
//!
//! A planner hands back arbitrary JSON. [`validate_plan`] is the only way to
//! turn it into a [`Plan`]: unknown tools are dropped, arguments are coerced
//! and clamped, the step count is capped and repeated steps are removed.
//! Every drop or change is logged and recorded as a [`ValidationNote`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::MAX_PLAN_STEPS;
use marketlab_core::optimizer::GridSpec;

// ─── Bounds and defaults ────────────────────────────────────────────

pub const SCREEN_MAX_SYMBOLS: usize = 50;
pub const SIGNAL_DAYS: (i64, i64) = (60, 2000);
pub const EVAL_DAYS: (i64, i64) = (200, 3000);
pub const FAST_RANGE: (i64, i64) = (2, 200);
pub const SLOW_RANGE: (i64, i64) = (5, 400);
pub const GRID_MAX_VALUES: usize = 8;
pub const SPLIT_BOUNDS: (f64, f64) = (0.5, 0.9);
pub const TOP_K_RANGE: (i64, i64) = (1, 10);

pub const DEFAULT_SIGNAL_DAYS: u32 = 365;
pub const DEFAULT_EVAL_DAYS: u32 = 1200;
pub const DEFAULT_FAST: usize = 50;
pub const DEFAULT_SLOW: usize = 200;

// ─── Types ──────────────────────────────────────────────────────────

/// One validated tool invocation. Serializes as `{"tool": ..., "args": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "args", rename_all = "snake_case")]
pub enum Step {
    Screen {
        symbols: Vec<String>,
        days: u32,
    },
    Analyze {
        symbol: String,
        days: u32,
    },
    OptimizeBacktest {
        symbol: String,
        days: u32,
        fast_values: Vec<usize>,
        slow_values: Vec<usize>,
        split: f64,
        top_k: usize,
    },
    Backtest {
        symbol: String,
        fast: usize,
        slow: usize,
        days: u32,
    },
}

impl Step {
    pub const TOOLS: [&'static str; 4] = ["screen", "analyze", "optimize_backtest", "backtest"];

    pub fn tool(&self) -> &'static str {
        match self {
            Step::Screen { .. } => "screen",
            Step::Analyze { .. } => "analyze",
            Step::OptimizeBacktest { .. } => "optimize_backtest",
            Step::Backtest { .. } => "backtest",
        }
    }

    /// The single symbol a step targets (`None` for screens).
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Step::Screen { .. } => None,
            Step::Analyze { symbol, .. }
            | Step::OptimizeBacktest { symbol, .. }
            | Step::Backtest { symbol, .. } => Some(symbol),
        }
    }

    /// Optimization step over the default candidate grid.
    pub fn default_optimize(symbol: &str, days: u32) -> Self {
        let grid = GridSpec::default();
        Step::OptimizeBacktest {
            symbol: symbol.to_string(),
            days,
            fast_values: grid.fast_values,
            slow_values: grid.slow_values,
            split: grid.split,
            top_k: grid.top_k,
        }
    }

    /// `tool` plus the sorted-key JSON of the arguments.
    pub fn canonical_key(&self) -> String {
        let args = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.get("args").cloned())
            .unwrap_or(Value::Null);
        format!("{}:{}", self.tool(), args)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub objective: String,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteAction {
    Dropped,
    Changed,
    Deduplicated,
}

/// What the validator did to one raw step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationNote {
    /// Position of the step in the raw plan.
    pub index: usize,
    pub tool: String,
    pub action: NoteAction,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidatedPlan {
    pub plan: Plan,
    pub notes: Vec<ValidationNote>,
}

// ─── Validator ──────────────────────────────────────────────────────

/// Sanitize an untrusted plan. Never fails; garbage yields zero steps.
///
/// `max_steps` is further capped at [`MAX_PLAN_STEPS`].
pub fn validate_plan(raw: &Value, max_steps: usize) -> ValidatedPlan {
    let cap = max_steps.clamp(1, MAX_PLAN_STEPS);
    let mut notes = Vec::new();

    let objective = raw
        .get("objective")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    let raw_steps: &[Value] = match raw.get("steps").and_then(Value::as_array) {
        Some(steps) => steps,
        None => {
            warn!("plan has no steps array");
            notes.push(ValidationNote {
                index: 0,
                tool: String::new(),
                action: NoteAction::Dropped,
                detail: "plan has no steps array".into(),
            });
            &[]
        }
    };

    for (index, step) in raw_steps.iter().enumerate().skip(cap) {
        let tool = raw_tool(step);
        warn!(index, tool = %tool, cap, "dropping step beyond cap");
        notes.push(ValidationNote {
            index,
            tool,
            action: NoteAction::Dropped,
            detail: format!("exceeds the {cap}-step cap"),
        });
    }

    let mut steps = Vec::new();
    let mut seen = HashSet::new();

    for (index, raw_step) in raw_steps.iter().take(cap).enumerate() {
        let tool = raw_tool(raw_step);
        let empty = serde_json::Map::new();
        let args = raw_step
            .get("args")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let mut ctx = StepContext {
            index,
            tool: &tool,
            notes: &mut notes,
        };

        let step = match tool.as_str() {
            "screen" => Some(sanitize_screen(args, &mut ctx)),
            "analyze" => sanitize_analyze(args, &mut ctx),
            "optimize_backtest" => sanitize_optimize(args, &mut ctx),
            "backtest" => sanitize_backtest(args, &mut ctx),
            _ => {
                ctx.drop_step(format!("tool {tool:?} is not allowed"));
                None
            }
        };
        let Some(step) = step else { continue };

        let key = step.canonical_key();
        if !seen.insert(key.clone()) {
            info!(index, key = %key, "deduping repeated step");
            notes.push(ValidationNote {
                index,
                tool: tool.clone(),
                action: NoteAction::Deduplicated,
                detail: format!("same as an earlier step: {key}"),
            });
            continue;
        }
        steps.push(step);
    }

    debug!(kept = steps.len(), notes = notes.len(), "plan validated");
    ValidatedPlan {
        plan: Plan { objective, steps },
        notes,
    }
}

fn raw_tool(step: &Value) -> String {
    step.get("tool")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

struct StepContext<'a> {
    index: usize,
    tool: &'a str,
    notes: &'a mut Vec<ValidationNote>,
}

impl StepContext<'_> {
    fn note(&mut self, action: NoteAction, detail: String) {
        self.notes.push(ValidationNote {
            index: self.index,
            tool: self.tool.to_string(),
            action,
            detail,
        });
    }

    fn drop_step(&mut self, detail: String) {
        warn!(index = self.index, tool = self.tool, %detail, "dropping step");
        self.note(NoteAction::Dropped, detail);
    }

    fn changed(&mut self, detail: String) {
        debug!(index = self.index, tool = self.tool, %detail, "changed step argument");
        self.note(NoteAction::Changed, detail);
    }

    /// Integer argument: coerced, defaulted, then clamped into `range`.
    fn int_arg(
        &mut self,
        args: &serde_json::Map<String, Value>,
        key: &str,
        default: i64,
        range: (i64, i64),
    ) -> i64 {
        let value = match args.get(key) {
            None | Some(Value::Null) => default,
            Some(v) => match coerce_int(v) {
                Some(n) => n,
                None => {
                    self.changed(format!("{key}: unreadable value {v}, using {default}"));
                    default
                }
            },
        };
        let clamped = value.clamp(range.0, range.1);
        if clamped != value {
            self.changed(format!("{key}: {value} clamped to {clamped}"));
        }
        clamped
    }

    /// Integer argument without clamping (used before the backtest ordering check).
    fn raw_int_arg(&mut self, args: &serde_json::Map<String, Value>, key: &str, default: i64) -> i64 {
        self.int_arg(args, key, default, (i64::MIN, i64::MAX))
    }

    /// Candidate list: filtered to `range`, sorted, deduped, capped; default when empty.
    fn grid_arg(
        &mut self,
        args: &serde_json::Map<String, Value>,
        key: &str,
        default: &[usize],
        range: (i64, i64),
    ) -> Vec<usize> {
        let raw: Vec<Value> = match args.get(key) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                self.changed(format!("{key}: expected a list, got {other}"));
                Vec::new()
            }
        };
        if raw.is_empty() {
            return default.to_vec();
        }

        let mut values: Vec<usize> = Vec::with_capacity(raw.len());
        for v in &raw {
            match coerce_int(v) {
                Some(n) if (range.0..=range.1).contains(&n) => values.push(n as usize),
                _ => self.changed(format!("{key}: dropped {v} (allowed {}..={})", range.0, range.1)),
            }
        }
        values.sort_unstable();
        values.dedup();
        if values.len() > GRID_MAX_VALUES {
            self.changed(format!("{key}: truncated to {GRID_MAX_VALUES} values"));
            values.truncate(GRID_MAX_VALUES);
        }
        if values.is_empty() {
            self.changed(format!("{key}: nothing left after filtering, using defaults"));
            return default.to_vec();
        }
        values
    }
}

fn symbol_arg(args: &serde_json::Map<String, Value>) -> String {
    coerce_symbol(args.get("symbol").unwrap_or(&Value::Null))
}

fn sanitize_screen(args: &serde_json::Map<String, Value>, ctx: &mut StepContext<'_>) -> Step {
    let raw: Vec<Value> = match args.get("symbols") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(s)) => s.split(',').map(|x| Value::String(x.to_string())).collect(),
        _ => Vec::new(),
    };
    let mut symbols: Vec<String> = raw
        .iter()
        .map(coerce_symbol)
        .filter(|s| !s.is_empty())
        .collect();
    if symbols.len() < raw.len() {
        ctx.changed(format!("symbols: dropped {} empty entries", raw.len() - symbols.len()));
    }
    if symbols.len() > SCREEN_MAX_SYMBOLS {
        ctx.changed(format!("symbols: truncated to {SCREEN_MAX_SYMBOLS}"));
        symbols.truncate(SCREEN_MAX_SYMBOLS);
    }
    let days = ctx.int_arg(args, "days", i64::from(DEFAULT_SIGNAL_DAYS), SIGNAL_DAYS);
    Step::Screen {
        symbols,
        days: days as u32,
    }
}

fn sanitize_analyze(args: &serde_json::Map<String, Value>, ctx: &mut StepContext<'_>) -> Option<Step> {
    let symbol = symbol_arg(args);
    let days = ctx.int_arg(args, "days", i64::from(DEFAULT_SIGNAL_DAYS), SIGNAL_DAYS);
    if symbol.is_empty() {
        ctx.drop_step("analyze with empty symbol".into());
        return None;
    }
    Some(Step::Analyze {
        symbol,
        days: days as u32,
    })
}

fn sanitize_optimize(args: &serde_json::Map<String, Value>, ctx: &mut StepContext<'_>) -> Option<Step> {
    let symbol = symbol_arg(args);
    let defaults = GridSpec::default();
    let days = ctx.int_arg(args, "days", i64::from(DEFAULT_EVAL_DAYS), EVAL_DAYS);
    let fast_values = ctx.grid_arg(args, "fast_values", &defaults.fast_values, FAST_RANGE);
    let slow_values = ctx.grid_arg(args, "slow_values", &defaults.slow_values, SLOW_RANGE);

    let raw_split = match args.get("split") {
        None | Some(Value::Null) => defaults.split,
        Some(v) => coerce_float(v).unwrap_or_else(|| {
            ctx.changed(format!("split: unreadable value {v}, using {}", defaults.split));
            defaults.split
        }),
    };
    let split = round2(raw_split.clamp(SPLIT_BOUNDS.0, SPLIT_BOUNDS.1));
    if split != raw_split {
        ctx.changed(format!("split: {raw_split} adjusted to {split}"));
    }
    let top_k = ctx.int_arg(args, "top_k", defaults.top_k as i64, TOP_K_RANGE);

    if symbol.is_empty() {
        ctx.drop_step("optimize_backtest with empty symbol".into());
        return None;
    }
    Some(Step::OptimizeBacktest {
        symbol,
        days: days as u32,
        fast_values,
        slow_values,
        split,
        top_k: top_k as usize,
    })
}

fn sanitize_backtest(args: &serde_json::Map<String, Value>, ctx: &mut StepContext<'_>) -> Option<Step> {
    let symbol = symbol_arg(args);
    let fast = ctx.raw_int_arg(args, "fast", DEFAULT_FAST as i64);
    let slow = ctx.raw_int_arg(args, "slow", DEFAULT_SLOW as i64);
    if symbol.is_empty() || fast >= slow {
        ctx.drop_step(format!(
            "backtest with invalid params (symbol={symbol:?}, fast={fast}, slow={slow})"
        ));
        return None;
    }
    let days = ctx.int_arg(args, "days", i64::from(DEFAULT_EVAL_DAYS), EVAL_DAYS);
    let fast_c = fast.clamp(FAST_RANGE.0, FAST_RANGE.1);
    let slow_c = slow.clamp(SLOW_RANGE.0, SLOW_RANGE.1);
    if (fast_c, slow_c) != (fast, slow) {
        ctx.changed(format!("fast/slow {fast}/{slow} clamped to {fast_c}/{slow_c}"));
    }
    if fast_c >= slow_c {
        ctx.drop_step(format!("backtest fast {fast_c} >= slow {slow_c} after clamping"));
        return None;
    }
    Some(Step::Backtest {
        symbol,
        fast: fast_c as usize,
        slow: slow_c as usize,
        days: days as u32,
    })
}

// ─── Lenient coercion ───────────────────────────────────────────────

/// JSON integer, float (truncated) or numeric string.
fn coerce_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

fn coerce_float(v: &Value) -> Option<f64> {
    let f = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    f.is_finite().then_some(f)
}

fn coerce_symbol(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_uppercase(),
        Value::Number(n) => n.to_string().to_uppercase(),
        _ => String::new(),
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
