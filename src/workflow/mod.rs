//! Workflow definition layer
//!
//! Everything needed to describe a workflow before it runs:
//! - Step definitions and the per-workflow step registry
//! - Declarative loop conditions
//! - The chained builder and the immutable plans it commits
//! - A hot-swappable registry of committed plans

// Declarative condition types (data, not code)
pub mod types;

// Validation capability for trigger data and step outputs
pub mod shape;

// Step definitions and duplicate-id detection
pub mod step;

// Mutable draft graph with step/then/until/after/commit
pub mod builder;

// Frozen, indexable execution plans
pub mod plan;

// Lock-free registry of committed plans using ArcSwap
pub mod registry;

// Re-export commonly used types
pub use builder::WorkflowBuilder;
pub use plan::{LoopEdge, PlanNode, WorkflowPlan};
pub use registry::WorkflowRegistry;
pub use shape::{FieldKind, ObjectShape, Shape, ShapeError};
pub use step::{Step, StepRegistry, TRIGGER_KEY};
pub use types::{Condition, FieldCondition, Operator, Query, StepRef};
