//! Error taxonomy for plan construction and workflow runs
//!
//! Build errors are fatal to `commit()` and never leave a usable partial plan.
//! Run errors abort only the run that raised them; other runs of the same plan
//! keep going.

use crate::workflow::shape::ShapeError;
use thiserror::Error;

/// Errors raised while assembling a workflow plan
///
/// Chained builder calls record the first error they hit and `commit()`
/// reports it, so a single `?` at the end of the chain covers every call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A different step was already registered under this id
    #[error("step id '{0}' is already registered in this workflow")]
    DuplicateId(String),

    /// `then()` (or `until()`) was called with no step to attach to
    #[error("step '{0}' has no preceding step to attach to")]
    DanglingStep(String),

    /// `commit()` was called before any step was added
    #[error("workflow has no steps")]
    EmptyWorkflow,

    /// A node (or an `after()` branch point) can never be reached from the head
    #[error("step '{0}' is not reachable from the head of the workflow")]
    UnreachableNode(String),

    /// The id is reserved for the run's trigger payload
    #[error("step id '{0}' is reserved")]
    ReservedId(String),

    /// `after()` referenced a step that was never added
    #[error("step '{0}' has not been added to this workflow")]
    UnknownStep(String),

    /// `until()` named a target that does not lead back to the loop node
    #[error("loop on step '{step}' cannot re-enter at step '{target}'")]
    UnknownLoopTarget { step: String, target: String },

    /// The current tail already carries a loop edge
    #[error("step '{0}' already has a loop condition")]
    LoopAlreadyDefined(String),

    /// A loop condition references a step that does not exist in the workflow
    #[error("loop on step '{step}' references unknown step '{reference}'")]
    UnknownConditionRef { step: String, reference: String },

    /// The builder was modified after its plan was committed
    #[error("workflow '{0}' is already committed")]
    AlreadyCommitted(String),
}

/// Errors that abort a single run
#[derive(Debug, Error)]
pub enum RunError {
    /// Trigger data failed validation against the declared trigger shape
    #[error("invalid trigger data: {0}")]
    InvalidTrigger(#[source] ShapeError),

    /// A condition path does not exist on a non-null step result
    #[error("field '{path}' is missing from the result of step '{step}'")]
    MissingField { step: String, path: String },

    /// A step executor returned an error
    #[error("step '{step}' failed: {source}")]
    Executor {
        step: String,
        #[source]
        source: anyhow::Error,
    },

    /// A step produced output that does not match its declared shape
    #[error("step '{step}' produced invalid output: {source}")]
    InvalidOutput {
        step: String,
        #[source]
        source: ShapeError,
    },

    /// The run was cancelled between two steps
    #[error("run cancelled")]
    Cancelled,

    /// A loop node ran `limit` times without its condition becoming true
    #[error("loop on step '{step}' did not finish within {limit} iterations")]
    IterationLimit { step: String, limit: u64 },
}
