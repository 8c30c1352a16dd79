//! Counter workflow demo
//!
//! Wires two steps into a workflow: `increment` adds one to the running value
//! and repeats until it reaches 10, then `final` reports completion. The
//! binary runs it once; the integration tests reuse the same plan.

use crate::config::{Config, LoggingConfig};
use crate::error::BuildError;
use crate::runtime::run::RunResult;
use crate::workflow::builder::WorkflowBuilder;
use crate::workflow::plan::WorkflowPlan;
use crate::workflow::shape::{FieldKind, ObjectShape};
use crate::workflow::step::Step;
use crate::workflow::types::{Condition, Operator};
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Value the counter loops towards
pub const COUNTER_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncrementOutput {
    new_value: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CounterTrigger {
    start_value: i64,
}

/// Step that increments the previous value (or the trigger's `startValue`)
pub fn increment_step() -> Step {
    Step::new("increment", |ctx| {
        let current = ctx
            .get_step_result_as::<IncrementOutput>("increment")
            .map(|output| output.new_value)
            .or_else(|| {
                ctx.get_step_result_as::<CounterTrigger>("trigger")
                    .map(|trigger| trigger.start_value)
            })
            .unwrap_or(0);

        async move {
            let new_value = current + 1;
            tracing::info!("Step A: {}", new_value);
            Ok(json!({ "newValue": new_value }))
        }
    })
    .description("Increments the current value by 1")
    .output_shape(ObjectShape::new().field("newValue", FieldKind::Number))
}

/// Terminal step
pub fn final_step() -> Step {
    Step::new("final", |_ctx| async {
        tracing::info!("Step B: Final");
        Ok(json!({ "status": "complete" }))
    })
    .description("Final step")
    .output_shape(ObjectShape::new().field("status", FieldKind::String))
}

/// Build the counter workflow from the given step instances
pub fn counter_workflow_with(
    increment: &Step,
    finish: &Step,
) -> Result<WorkflowPlan, BuildError> {
    WorkflowBuilder::new("counter-workflow")
        .trigger_shape(
            ObjectShape::new()
                .field("target", FieldKind::Number)
                .field("startValue", FieldKind::Number),
        )
        .step(increment)
        .until(
            Condition::field("increment", "newValue", Operator::Gte, COUNTER_LIMIT),
            increment,
        )
        .then(finish)
        .commit()
}

/// The counter workflow: `increment` until `newValue >= 10`, then `final`
pub fn counter_workflow() -> Result<WorkflowPlan, BuildError> {
    counter_workflow_with(&increment_step(), &final_step())
}

/// Install the global tracing subscriber
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    // Ignore the error when a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .try_init();
}

/// Run the counter workflow once with `target: 10, startValue: 0`
pub async fn run_demo(config: Config) -> anyhow::Result<RunResult> {
    init_tracing(&config.logging);

    let plan = counter_workflow()?;
    let run = plan.create_run_with(config.engine);
    tracing::info!("Starting workflow run: {}", run.run_id());

    let result = run
        .start(json!({ "target": COUNTER_LIMIT, "startValue": 0 }))
        .await;

    tracing::info!("Exit");
    tracing::info!("Results: {}", serde_json::to_string(&result.results)?);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_plan_shape() {
        let plan = counter_workflow().unwrap();
        assert_eq!(plan.name(), "counter-workflow");
        assert_eq!(plan.nodes().len(), 2);
        assert!(plan.has_loops());
        assert_eq!(
            plan.nodes()[0].step().get_description(),
            Some("Increments the current value by 1")
        );
    }

    #[tokio::test]
    async fn demo_run_completes() {
        let config = Config {
            engine: Default::default(),
            logging: LoggingConfig {
                filter: "warn".into(),
            },
        };
        let result = run_demo(config).await.unwrap();
        assert!(result.is_completed());
        assert_eq!(result.results["final"], json!({ "status": "complete" }));
    }
}
