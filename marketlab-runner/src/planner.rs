//! Planner boundary.
//!
//! A planner turns a goal plus context into a raw JSON plan. The output is
//! untrusted: callers must pass it through [`crate::plan::validate_plan`].
//! Any planner failure is recovered with [`default_plan`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::memory::MemoryRecord;

pub const GOAL: &str = "Identify promising BUY candidates from the universe and justify with signals and (optionally) a backtest.";

pub const SYSTEM_PROMPT: &str = r#"You are a cautious market research planner agent. You DO NOT give financial advice.
You only plan tool calls that gather evidence: screening symbols, analyzing signals, optimizing and backtesting a simple moving-average crossover.

TOOLS:
- screen(symbols: [str], days: int)            -> ranked signals for many symbols
- analyze(symbol: str, days: int)              -> detailed signals for one symbol
- optimize_backtest(symbol: str, days: int, fast_values: [int], slow_values: [int], split: float, top_k: int)
                                               -> in-sample/out-of-sample grid search of SMA crossover params
- backtest(symbol: str, fast: int, slow: int, days: int)
                                               -> SMA crossover performance metrics

JSON OUTPUT SPEC:
{
  "objective": "<short restatement of the goal>",
  "steps": [
    {"tool": "screen", "args": {"symbols": ["AAPL", "MSFT"], "days": 365}},
    {"tool": "analyze", "args": {"symbol": "AAPL", "days": 365}},
    {"tool": "optimize_backtest", "args": {"symbol": "AAPL", "days": 1200, "fast_values": [10, 20, 50], "slow_values": [100, 150, 200], "split": 0.7, "top_k": 5}},
    {"tool": "backtest", "args": {"symbol": "AAPL", "fast": 20, "slow": 100, "days": 1200}}
  ]
}

CONSTRAINTS:
- At most 6 steps.
- Only use the tools listed above.
- Keep "days" consistent across screen and analyze steps.
- After screening, analyze the top 3 candidates.
- Deep-dive (optimize_backtest/backtest) at most 3 tickers.
- Never repeat an identical step.
- Respond with JSON only. No prose, no markdown fences."#;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("planner request failed: {0}")]
    Http(String),

    #[error("planner timed out after {0:?}")]
    Timeout(Duration),

    #[error("planner returned malformed output: {0}")]
    Malformed(String),
}

/// What the planner is told about the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanContext {
    pub universe: Vec<String>,
    pub days: u32,
    pub recent_runs: Vec<MemoryRecord>,
    pub confidence_threshold: f64,
}

pub trait Planner {
    fn name(&self) -> &str;

    /// Return a raw plan object. Shape is not trusted.
    fn plan(&self, goal: &str, context: &PlanContext, max_steps: usize) -> Result<Value, PlannerError>;
}

/// Single full-universe screen used whenever planning fails.
pub fn default_plan(goal: &str, context: &PlanContext) -> Value {
    json!({
        "objective": goal,
        "steps": [
            {"tool": "screen", "args": {"symbols": context.universe, "days": context.days}}
        ]
    })
}

pub fn build_prompt(goal: &str, context: &PlanContext, max_steps: usize) -> String {
    let recent = serde_json::to_string(&context.recent_runs).unwrap_or_else(|_| "[]".into());
    let universe = serde_json::to_string(&context.universe).unwrap_or_else(|_| "[]".into());
    format!(
        "{SYSTEM_PROMPT}\n\nObjective: {goal}\nContext:\n\
         - universe: {universe}\n\
         - days: {days}\n\
         - recent_runs: {recent}\n\
         - confidence_threshold: {threshold}\n\
         Return JSON plan (max {max_steps} steps).",
        days = context.days,
        threshold = context.confidence_threshold,
    )
}

/// Slice from the first `{` to the last `}` and parse it as an object.
pub fn extract_plan_json(text: &str) -> Result<Value, PlannerError> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(PlannerError::Malformed("no JSON object in response".into()));
    };
    if end < start {
        return Err(PlannerError::Malformed("no JSON object in response".into()));
    }
    let value: Value = serde_json::from_str(&text[start..=end])
        .map_err(|e| PlannerError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(PlannerError::Malformed("plan is not an object".into()));
    }
    Ok(value)
}

// ─── Ollama ─────────────────────────────────────────────────────────

/// Planner backed by a local Ollama `/api/generate` endpoint.
pub struct OllamaPlanner {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaPlanner {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PlannerError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlannerError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
        })
    }
}

impl Planner for OllamaPlanner {
    fn name(&self) -> &str {
        "ollama"
    }

    fn plan(&self, goal: &str, context: &PlanContext, max_steps: usize) -> Result<Value, PlannerError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": build_prompt(goal, context, max_steps),
            "stream": false,
        });
        debug!(url = %url, model = %self.model, "requesting plan");

        let resp = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_timeout() {
                PlannerError::Timeout(self.timeout)
            } else {
                PlannerError::Http(e.to_string())
            }
        })?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(PlannerError::Http(format!("{} {}", status.as_u16(), text)));
        }
        let generated: GenerateResponse = resp
            .json()
            .map_err(|e| PlannerError::Malformed(e.to_string()))?;
        extract_plan_json(&generated.response)
    }
}
