//! MarketLab Runner: the autonomous research agent around the engine.
//!
//! Responsibilities:
//! - Configuration (TOML file, `.env`, environment)
//! - Plan types and the plan validator
//! - Planner boundary (Ollama client, prompt, default plan)
//! - Tool surface (in-process and HTTP)
//! - The orchestration loop with auto-analysis, reflection and fallback
//! - Run memory, report persistence and logging setup

pub mod artifacts;
pub mod config;
pub mod logging;
pub mod memory;
pub mod orchestrator;
pub mod plan;
pub mod planner;
pub mod reporting;
pub mod schedule;
pub mod tools;

pub use artifacts::{pick_top_candidates, Pick, RunArtifacts};
pub use config::{AgentConfig, DataMode};
pub use memory::{MemoryRecord, RunMemory};
pub use orchestrator::{ExecutedStep, Orchestrator, RunError, RunOutcome, StepOrigin};
pub use plan::{validate_plan, Plan, Step, ValidatedPlan, ValidationNote};
pub use planner::{OllamaPlanner, PlanContext, Planner, PlannerError};
pub use reporting::{ReportStore, RunReport};
pub use tools::{HttpTools, LocalTools, ToolError, Tools};
