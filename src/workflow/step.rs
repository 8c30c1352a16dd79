//! Step definitions and the per-workflow step registry

use crate::error::BuildError;
use crate::runtime::context::StepContext;
use crate::workflow::shape::Shape;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::{collections::HashMap, fmt, future::Future, sync::Arc};

/// Reserved result key holding the run's trigger data
pub const TRIGGER_KEY: &str = "trigger";

/// Boxed async step executor
pub type ExecuteFn = dyn Fn(StepContext) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync;

/// A named unit of work
///
/// Cloning a step is cheap; clones share the executor and compare equal.
/// Executors may be invoked many times per run when the step sits inside a
/// loop, so they should tolerate re-invocation.
#[derive(Clone)]
pub struct Step {
    id: Arc<str>,
    description: Option<Arc<str>>,
    output_shape: Option<Arc<dyn Shape>>,
    execute: Arc<ExecuteFn>,
}

impl Step {
    /// Create a step from an async executor
    pub fn new<F, Fut>(id: impl Into<String>, execute: F) -> Self
    where
        F: Fn(StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self {
            id: Arc::from(id.into()),
            description: None,
            output_shape: None,
            execute: Arc::new(move |ctx| execute(ctx).boxed()),
        }
    }

    /// Attach a human-readable description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(Arc::from(description.into()));
        self
    }

    /// Declare the shape every output of this step must match
    pub fn output_shape(mut self, shape: impl Shape + 'static) -> Self {
        self.output_shape = Some(Arc::new(shape));
        self
    }

    /// Unique step id; results are stored under it
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Declared output shape, if any
    pub fn get_output_shape(&self) -> Option<&dyn Shape> {
        self.output_shape.as_deref()
    }

    /// Invoke the executor
    pub(crate) fn invoke(&self, ctx: StepContext) -> BoxFuture<'static, anyhow::Result<Value>> {
        (self.execute)(ctx)
    }

    /// Whether both handles refer to the same definition
    pub fn same_definition(&self, other: &Step) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.execute, &other.execute)
    }
}

impl PartialEq for Step {
    fn eq(&self, other: &Self) -> bool {
        self.same_definition(other)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("output_shape", &self.output_shape)
            .finish_non_exhaustive()
    }
}

/// Step definitions registered within one workflow
#[derive(Debug, Default, Clone)]
pub struct StepRegistry {
    steps: HashMap<String, Step>,
}

impl StepRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Define and register a step in one call
    pub fn define_step<F, Fut>(
        &mut self,
        id: impl Into<String>,
        execute: F,
        output_shape: Option<Arc<dyn Shape>>,
    ) -> Result<Step, BuildError>
    where
        F: Fn(StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let mut step = Step::new(id, execute);
        step.output_shape = output_shape;
        self.register(&step)?;
        Ok(step)
    }

    /// Register an existing step
    ///
    /// Registering the same definition twice is a no-op; a different
    /// definition under a taken id is rejected.
    pub fn register(&mut self, step: &Step) -> Result<(), BuildError> {
        if step.id() == TRIGGER_KEY {
            return Err(BuildError::ReservedId(step.id().to_string()));
        }

        match self.steps.get(step.id()) {
            Some(existing) if existing.same_definition(step) => Ok(()),
            Some(_) => Err(BuildError::DuplicateId(step.id().to_string())),
            None => {
                tracing::debug!("📝 Registered step '{}'", step.id());
                self.steps.insert(step.id().to_string(), step.clone());
                Ok(())
            }
        }
    }

    /// Look up a step by id
    pub fn get(&self, id: &str) -> Option<&Step> {
        self.steps.get(id)
    }

    /// Whether `id` is taken
    pub fn contains(&self, id: &str) -> bool {
        self.steps.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::shape::{FieldKind, ObjectShape};
    use serde_json::json;

    fn noop(id: &str) -> Step {
        Step::new(id, |_ctx| async { Ok(json!({})) })
    }

    #[test]
    fn define_step_registers_once() {
        let mut registry = StepRegistry::new();
        let shape: Arc<dyn Shape> = Arc::new(ObjectShape::new().field("n", FieldKind::Number));
        let step = registry
            .define_step("count", |_ctx| async { Ok(json!({ "n": 1 })) }, Some(shape))
            .unwrap();

        assert_eq!(step.id(), "count");
        assert!(step.get_output_shape().is_some());
        assert!(registry.contains("count"));

        let err = registry
            .define_step("count", |_ctx| async { Ok(json!({})) }, None)
            .unwrap_err();
        assert_eq!(err, BuildError::DuplicateId("count".into()));
    }

    #[test]
    fn re_registering_the_same_step_is_allowed() {
        let mut registry = StepRegistry::new();
        let step = noop("loop");
        registry.register(&step).unwrap();
        registry.register(&step.clone()).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_definitions_with_same_id_conflict() {
        let mut registry = StepRegistry::new();
        registry.register(&noop("a")).unwrap();
        assert_eq!(
            registry.register(&noop("a")),
            Err(BuildError::DuplicateId("a".into()))
        );
    }

    #[test]
    fn trigger_id_is_reserved() {
        let mut registry = StepRegistry::new();
        assert_eq!(
            registry.register(&noop("trigger")),
            Err(BuildError::ReservedId("trigger".into()))
        );
        assert!(registry.is_empty());
    }
}
