//! Cursor-driven plan execution
//!
//! Walks a committed plan with an explicit stack of node indices. Loop nodes
//! push their re-entry target while their condition is false, so long loops
//! never grow the call stack and cancellation can be checked between steps.

use crate::config::EngineConfig;
use crate::error::RunError;
use crate::runtime::condition::evaluate;
use crate::runtime::context::{RunContext, StepContext};
use crate::runtime::executor::StepExecutor;
use crate::runtime::run::{Run, RunResult, RunStatus};
use crate::workflow::plan::WorkflowPlan;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Execution engine shared by any number of concurrent runs
///
/// Holds no per-run state; every run owns its own [`RunContext`].
#[derive(Debug)]
pub struct ExecutionEngine {
    /// Step executor for handling individual step execution
    executor: StepExecutor,
    config: EngineConfig,
}

impl ExecutionEngine {
    /// Create an engine; the executor inherits output validation from `config`
    pub fn new(config: EngineConfig) -> Self {
        Self {
            executor: StepExecutor::new(config.validate_outputs),
            config,
        }
    }

    /// Settings every run of this engine shares
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create a pending run of `plan` driven by this engine
    pub fn create_run(self: &Arc<Self>, plan: &WorkflowPlan) -> Run {
        Run::new(plan.clone(), Arc::clone(self))
    }

    /// Execute a run to completion and build its result snapshot
    pub(crate) async fn execute_run(
        &self,
        plan: &WorkflowPlan,
        run_id: Uuid,
        trigger: Value,
        cancel: &CancellationToken,
        status: &watch::Sender<RunStatus>,
    ) -> RunResult {
        let started_at = Utc::now();
        let start_time = std::time::Instant::now();

        tracing::info!("🚀 Starting workflow run: {} ({})", plan.name(), run_id);
        status.send_replace(RunStatus::Running);

        let mut context = RunContext::with_history(self.config.record_history);
        let outcome = self
            .walk(plan, run_id, trigger, cancel, &mut context)
            .await;

        let duration = start_time.elapsed();
        let final_status = match &outcome {
            Ok(()) => {
                tracing::info!(
                    "🎉 Workflow '{}' run {} completed in {:?}",
                    plan.name(),
                    run_id,
                    duration
                );
                RunStatus::Completed
            }
            Err(err) => {
                tracing::error!(
                    "❌ Workflow '{}' run {} failed after {:?}: {}",
                    plan.name(),
                    run_id,
                    duration,
                    err
                );
                RunStatus::Failed
            }
        };
        status.send_replace(final_status);

        let (results, history) = context.into_parts();
        RunResult {
            run_id,
            workflow: plan.name().to_string(),
            status: final_status,
            results,
            history,
            error: outcome.err(),
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn walk(
        &self,
        plan: &WorkflowPlan,
        run_id: Uuid,
        trigger: Value,
        cancel: &CancellationToken,
        context: &mut RunContext,
    ) -> Result<(), RunError> {
        if let Some(shape) = plan.trigger_shape() {
            shape.validate(&trigger).map_err(RunError::InvalidTrigger)?;
        }
        context.seed_trigger(trigger);

        let nodes = plan.nodes();
        let mut visits = vec![0u64; nodes.len()];
        // Branches of a node are scheduled on its first visit only
        let mut branched = vec![false; nodes.len()];
        let mut pending = vec![plan.head()];

        while let Some(cursor) = pending.pop() {
            if cancel.is_cancelled() {
                tracing::warn!("⏹️ Run {} cancelled before node {}", run_id, cursor);
                return Err(RunError::Cancelled);
            }

            let node = &nodes[cursor];
            let step = node.step();
            visits[cursor] += 1;
            let iteration = visits[cursor];

            let ctx = StepContext::new(run_id, step.id(), iteration, context);
            let output = self.executor.execute_step(step, ctx).await?;
            context.record(step.id(), iteration, output);

            if let Some(edge) = node.loop_edge() {
                if !evaluate(&edge.condition, context)? {
                    if let Some(limit) = self.config.max_iterations {
                        if iteration >= limit {
                            return Err(RunError::IterationLimit {
                                step: step.id().to_string(),
                                limit,
                            });
                        }
                    }
                    tracing::debug!(
                        "🔁 Loop on '{}' not satisfied after iteration {}, re-entering at '{}'",
                        step.id(),
                        iteration,
                        nodes[edge.target].step().id()
                    );
                    pending.push(edge.target);
                    continue;
                }
                tracing::info!(
                    "🏁 Loop on '{}' satisfied after {} iterations",
                    step.id(),
                    iteration
                );
            }

            // `next` is popped first, then branches in creation order
            if !std::mem::replace(&mut branched[cursor], true) {
                pending.extend(node.branches().iter().rev().copied());
            }
            pending.extend(node.next());
        }

        Ok(())
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
