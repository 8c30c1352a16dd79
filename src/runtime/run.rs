//! Run lifecycle: creation, start, observation and cancellation

use crate::config::EngineConfig;
use crate::error::RunError;
use crate::runtime::context::StepRecord;
use crate::runtime::engine::ExecutionEngine;
use crate::workflow::plan::WorkflowPlan;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Run state machine: `Pending → Running → {Completed, Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// Completed or failed
    pub fn is_finished(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Snapshot of a finished run
///
/// Failed runs keep every result recorded before the failure.
#[derive(Debug)]
pub struct RunResult {
    pub run_id: Uuid,
    /// Name of the workflow the run belongs to
    pub workflow: String,
    pub status: RunStatus,
    /// Latest output per step id, plus `trigger`
    pub results: BTreeMap<String, Value>,
    /// Every step execution in order
    pub history: Vec<StepRecord>,
    /// Why the run failed, if it did
    pub error: Option<RunError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    /// Whether the run reached the end of the plan
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Latest output of `step_id`
    pub fn get_step_result(&self, step_id: &str) -> Option<&Value> {
        self.results.get(step_id)
    }

    /// How many times `step_id` executed during the run
    ///
    /// Counted from `history`, so it is zero when history recording is off.
    pub fn executions_of(&self, step_id: &str) -> usize {
        self.history
            .iter()
            .filter(|record| record.step_id == step_id)
            .count()
    }
}

/// A pending run of a committed plan
///
/// Owns its identity and control channels; the run context is created when
/// [`Run::start`] is called and never shared with other runs.
pub struct Run {
    run_id: Uuid,
    plan: WorkflowPlan,
    engine: Arc<ExecutionEngine>,
    cancel: CancellationToken,
    status: watch::Sender<RunStatus>,
}

impl Run {
    pub(crate) fn new(plan: WorkflowPlan, engine: Arc<ExecutionEngine>) -> Self {
        let (status, _) = watch::channel(RunStatus::Pending);
        let run = Self {
            run_id: Uuid::new_v4(),
            plan,
            engine,
            cancel: CancellationToken::new(),
            status,
        };
        tracing::debug!("🆕 Created run {} for workflow '{}'", run.run_id, run.plan.name());
        run
    }

    /// Unique id assigned at creation
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Current lifecycle state
    pub fn status(&self) -> RunStatus {
        *self.status.borrow()
    }

    /// Handle for observing and cancelling the run from elsewhere
    pub fn handle(&self) -> RunHandle {
        RunHandle {
            run_id: self.run_id,
            status: self.status.subscribe(),
            cancel: self.cancel.clone(),
        }
    }

    /// Execute the plan against `trigger` and return the final snapshot
    pub async fn start(self, trigger: Value) -> RunResult {
        self.engine
            .execute_run(&self.plan, self.run_id, trigger, &self.cancel, &self.status)
            .await
    }
}

/// Cloneable observer/controller for one run
#[derive(Debug, Clone)]
pub struct RunHandle {
    run_id: Uuid,
    status: watch::Receiver<RunStatus>,
    cancel: CancellationToken,
}

impl RunHandle {
    /// Id of the observed run
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Latest status published by the run
    pub fn status(&self) -> RunStatus {
        *self.status.borrow()
    }

    /// Request cancellation; takes effect before the next step starts
    pub fn cancel(&self) {
        tracing::info!("🛑 Cancellation requested for run {}", self.run_id);
        self.cancel.cancel();
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until the run completes or fails
    ///
    /// Returns the last known status if the run is dropped without finishing.
    pub async fn wait_finished(&self) -> RunStatus {
        let mut status = self.status.clone();
        let finished = status
            .wait_for(|current| current.is_finished())
            .await
            .map(|current| *current);
        finished.unwrap_or_else(|_| *status.borrow())
    }
}

impl WorkflowPlan {
    /// Create a run with the default engine configuration
    pub fn create_run(&self) -> Run {
        self.create_run_with(EngineConfig::default())
    }

    /// Create a run with an explicit engine configuration
    pub fn create_run_with(&self, config: EngineConfig) -> Run {
        Run::new(self.clone(), Arc::new(ExecutionEngine::new(config)))
    }
}
