/// Loopway: minimal cyclic step-workflow engine
///
/// Workflows are assembled with a chained builder, committed into immutable
/// plans, and executed one step at a time. Loops re-run steps until a
/// declarative condition over earlier step outputs holds.

// Engine configuration with environment overrides
pub mod config;

// Build-time and run-time error taxonomy
pub mod error;

// Workflow definition layer - steps, conditions, builder, plans, registry
pub mod workflow;

// Runtime execution engine - run context, condition evaluation, step execution
pub mod runtime;

// Counter workflow demo and tracing setup for the binary
pub mod demo;

// Re-export commonly used types for external consumers
pub use config::{Config, EngineConfig};
pub use error::{BuildError, RunError};
pub use runtime::{ExecutionEngine, Run, RunHandle, RunResult, RunStatus, StepContext};
pub use workflow::{Condition, Operator, Step, WorkflowBuilder, WorkflowPlan, WorkflowRegistry};
