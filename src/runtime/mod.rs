//! Runtime Execution Engine
//!
//! Executes committed plans. It handles:
//! - Per-run context and result snapshots
//! - Condition evaluation at loop checkpoints
//! - Sequential step execution with a cursor over the plan
//! - Run status observation and cancellation between steps

// Cursor-driven walk over a committed plan
pub mod engine;

// Individual step invocation with output validation
pub mod executor;

// Loop condition evaluation
pub mod condition;

// Run context and executor-facing snapshots
pub mod context;

// Run creation, handles and results
pub mod run;

// Re-export main types
pub use condition::evaluate;
pub use context::{RunContext, StepContext, StepRecord};
pub use engine::ExecutionEngine;
pub use executor::StepExecutor;
pub use run::{Run, RunHandle, RunResult, RunStatus};
