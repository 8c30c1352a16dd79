//! Step invocation
//!
//! Wraps a single executor call with timing, logging and output validation.
//! The executor is awaited to completion; nothing here interrupts it.

use crate::error::RunError;
use crate::runtime::context::StepContext;
use crate::workflow::step::Step;
use serde_json::Value;

/// Runs step executors for the engine
#[derive(Debug, Clone)]
pub struct StepExecutor {
    /// Check outputs against declared step shapes
    validate_outputs: bool,
}

impl StepExecutor {
    /// Create an executor; `validate_outputs` enables output shape checks
    pub fn new(validate_outputs: bool) -> Self {
        Self { validate_outputs }
    }

    /// Execute one step with the given context snapshot
    pub async fn execute_step(&self, step: &Step, ctx: StepContext) -> Result<Value, RunError> {
        let iteration = ctx.iteration();
        tracing::info!(
            "🚀 Starting step execution: {} (iteration {})",
            step.id(),
            iteration
        );

        let start_time = std::time::Instant::now();
        let result = step.invoke(ctx).await;
        let duration = start_time.elapsed();

        let output = match result {
            Ok(output) => output,
            Err(source) => {
                tracing::error!(
                    "❌ Step execution failed: {} in {:?} - Error: {:#}",
                    step.id(),
                    duration,
                    source
                );
                return Err(RunError::Executor {
                    step: step.id().to_string(),
                    source,
                });
            }
        };

        if self.validate_outputs {
            if let Some(shape) = step.get_output_shape() {
                shape.validate(&output).map_err(|source| {
                    tracing::error!("❌ Step '{}' output rejected: {}", step.id(), source);
                    RunError::InvalidOutput {
                        step: step.id().to_string(),
                        source,
                    }
                })?;
            }
        }

        tracing::info!("✅ Step execution completed: {} in {:?}", step.id(), duration);
        tracing::debug!("📤 Output data: {}", output);
        Ok(output)
    }
}

impl Default for StepExecutor {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::context::RunContext;
    use crate::workflow::shape::{FieldKind, ObjectShape};
    use serde_json::json;
    use uuid::Uuid;

    fn ctx_for(step: &Step) -> StepContext {
        StepContext::new(Uuid::new_v4(), step.id(), 1, &RunContext::new())
    }

    fn counter_step(output: Value) -> Step {
        Step::new("count", move |_ctx| {
            let output = output.clone();
            async move { Ok(output) }
        })
        .output_shape(ObjectShape::new().field("n", FieldKind::Number))
    }

    #[tokio::test]
    async fn returns_valid_output() {
        let step = counter_step(json!({ "n": 3 }));
        let output = StepExecutor::default().execute_step(&step, ctx_for(&step)).await.unwrap();
        assert_eq!(output, json!({ "n": 3 }));
    }

    #[tokio::test]
    async fn rejects_output_that_breaks_shape() {
        let step = counter_step(json!({ "n": "three" }));
        let err = StepExecutor::default().execute_step(&step, ctx_for(&step)).await.unwrap_err();
        assert!(matches!(err, RunError::InvalidOutput { ref step, .. } if step == "count"));
    }

    #[tokio::test]
    async fn skips_validation_when_disabled() {
        let step = counter_step(json!({ "n": "three" }));
        let output = StepExecutor::new(false).execute_step(&step, ctx_for(&step)).await;
        assert!(output.is_ok());
    }

    #[tokio::test]
    async fn wraps_executor_errors() {
        let step = Step::new("boom", |_ctx| async { Err(anyhow::anyhow!("exploded")) });
        let err = StepExecutor::default().execute_step(&step, ctx_for(&step)).await.unwrap_err();
        assert_eq!(err.to_string(), "step 'boom' failed: exploded");
    }
}
