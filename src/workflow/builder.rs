//! Chained workflow assembly
//!
//! ```ignore
//! let plan = WorkflowBuilder::new("counter-workflow")
//!     .trigger_shape(trigger)
//!     .step(&increment)
//!     .until(Condition::field("increment", "newValue", Operator::Gte, 10), &increment)
//!     .then(&final_step)
//!     .commit()?;
//! ```
//!
//! Each call edits a draft node arena. The first error a call hits is kept and
//! reported by `commit()`, which otherwise moves the arena into an immutable
//! [`WorkflowPlan`].

use crate::error::BuildError;
use crate::workflow::plan::{reachable_nodes, LoopEdge, PlanNode, WorkflowPlan};
use crate::workflow::shape::Shape;
use crate::workflow::step::{Step, StepRegistry, TRIGGER_KEY};
use crate::workflow::types::Condition;
use std::sync::Arc;

/// Mutable draft of a workflow plan
#[derive(Debug)]
pub struct WorkflowBuilder {
    name: String,
    trigger_shape: Option<Arc<dyn Shape>>,
    registry: StepRegistry,
    nodes: Vec<PlanNode>,
    /// Most recently appended node
    tail: Option<usize>,
    /// Branch point set by `after()`, consumed by the next append
    insertion_point: Option<usize>,
    error: Option<BuildError>,
    /// Latest edit refused because the plan was already committed
    rejected: Option<BuildError>,
    committed: Option<WorkflowPlan>,
}

impl WorkflowBuilder {
    /// Start an empty draft named `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trigger_shape: None,
            registry: StepRegistry::new(),
            nodes: Vec::new(),
            tail: None,
            insertion_point: None,
            error: None,
            rejected: None,
            committed: None,
        }
    }

    /// Workflow name the plan will carry
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare the shape trigger data must match before a run starts
    pub fn trigger_shape(&mut self, shape: impl Shape + 'static) -> &mut Self {
        if self.ensure_open() {
            self.trigger_shape = Some(Arc::new(shape));
        }
        self
    }

    /// Steps registered so far
    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Append `step` after the current tail, or after the `after()` branch point
    pub fn step(&mut self, step: &Step) -> &mut Self {
        if !self.ensure_open() {
            return self;
        }
        if let Err(err) = self.registry.register(step) {
            self.fail(err);
            return self;
        }

        let index = self.nodes.len();
        self.nodes.push(PlanNode::new(step.clone()));

        if let Some(anchor) = self.insertion_point.take() {
            self.link(anchor, index);
        } else if let Some(tail) = self.tail {
            self.link(tail, index);
        }

        tracing::debug!("➕ Added step '{}' as node {}", step.id(), index);
        self.tail = Some(index);
        self
    }

    /// Append `step` after the current tail; there must be one
    pub fn then(&mut self, step: &Step) -> &mut Self {
        if !self.ensure_open() {
            return self;
        }
        if self.tail.is_none() && self.insertion_point.is_none() {
            self.fail(BuildError::DanglingStep(step.id().to_string()));
            return self;
        }
        self.step(step)
    }

    /// Turn the current tail into a loop node
    ///
    /// After the tail runs, `condition` is evaluated; while it is false the run
    /// re-enters at the latest node for `target`, which must lead back to the
    /// tail through sequential edges.
    pub fn until(&mut self, condition: Condition, target: &Step) -> &mut Self {
        if !self.ensure_open() {
            return self;
        }
        let tail = match (self.tail, self.insertion_point) {
            (Some(tail), None) => tail,
            _ => {
                self.fail(BuildError::DanglingStep(target.id().to_string()));
                return self;
            }
        };

        let tail_id = self.nodes[tail].step.id().to_string();
        if self.nodes[tail].loop_edge.is_some() {
            self.fail(BuildError::LoopAlreadyDefined(tail_id));
            return self;
        }

        let Some(target_index) = self.loop_target(tail, target) else {
            self.fail(BuildError::UnknownLoopTarget {
                step: tail_id,
                target: target.id().to_string(),
            });
            return self;
        };

        tracing::debug!(
            "🔁 Step '{}' loops back to '{}' until condition holds",
            tail_id,
            target.id()
        );
        self.nodes[tail].loop_edge = Some(LoopEdge {
            condition,
            target: target_index,
        });
        self
    }

    /// Branch: the next appended step follows `step` instead of the current tail
    pub fn after(&mut self, step: &Step) -> &mut Self {
        if !self.ensure_open() {
            return self;
        }
        if let Some(pending) = self.insertion_point {
            let pending_id = self.nodes[pending].step.id().to_string();
            self.fail(BuildError::UnreachableNode(pending_id));
            return self;
        }

        match self.latest_node_for(step, self.nodes.len()) {
            Some(index) => self.insertion_point = Some(index),
            None => self.fail(BuildError::UnknownStep(step.id().to_string())),
        }
        self
    }

    /// Freeze the draft into an immutable plan
    ///
    /// Calling `commit()` again returns the same plan.
    pub fn commit(&mut self) -> Result<WorkflowPlan, BuildError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if let Some(plan) = &self.committed {
            return Ok(plan.clone());
        }

        self.validate()?;

        let nodes = std::mem::take(&mut self.nodes);
        let plan = WorkflowPlan::new(self.name.clone(), self.trigger_shape.clone(), nodes);

        tracing::info!(
            "✅ Committed workflow '{}' with {} nodes",
            plan.name(),
            plan.nodes().len()
        );
        self.committed = Some(plan.clone());
        Ok(plan)
    }

    /// Error for the latest edit attempted after `commit()`
    ///
    /// Such edits are dropped and never affect the committed plan.
    pub fn rejected_edit(&self) -> Option<&BuildError> {
        self.rejected.as_ref()
    }

    fn validate(&self) -> Result<(), BuildError> {
        if self.nodes.is_empty() {
            return Err(BuildError::EmptyWorkflow);
        }

        if let Some(pending) = self.insertion_point {
            return Err(BuildError::UnreachableNode(
                self.nodes[pending].step.id().to_string(),
            ));
        }

        for node in &self.nodes {
            if let Some(edge) = &node.loop_edge {
                for reference in edge.condition.referenced_steps() {
                    if reference != TRIGGER_KEY && !self.registry.contains(reference) {
                        return Err(BuildError::UnknownConditionRef {
                            step: node.step.id().to_string(),
                            reference: reference.to_string(),
                        });
                    }
                }
            }
        }

        let reachable = reachable_nodes(&self.nodes, 0);
        if let Some(orphan) = (0..self.nodes.len()).find(|index| !reachable.contains(index)) {
            return Err(BuildError::UnreachableNode(
                self.nodes[orphan].step.id().to_string(),
            ));
        }

        Ok(())
    }

    /// Record an error unless an earlier one is already pending
    fn fail(&mut self, err: BuildError) {
        tracing::warn!("⚠️ Workflow '{}' build error: {}", self.name, err);
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Whether the draft still accepts edits
    fn ensure_open(&mut self) -> bool {
        if self.committed.is_some() {
            let err = BuildError::AlreadyCommitted(self.name.clone());
            tracing::warn!("⚠️ Workflow '{}' edit rejected: {}", self.name, err);
            self.rejected = Some(err);
            return false;
        }
        self.error.is_none()
    }

    fn link(&mut self, from: usize, to: usize) {
        let node = &mut self.nodes[from];
        if node.next.is_none() {
            node.next = Some(to);
        } else {
            node.branches.push(to);
        }
    }

    /// Latest node for `step` with an index below `bound`
    fn latest_node_for(&self, step: &Step, bound: usize) -> Option<usize> {
        self.nodes[..bound]
            .iter()
            .rposition(|node| node.step.same_definition(step))
    }

    /// Latest node for `target` from which the tail is reached via `next` edges
    fn loop_target(&self, tail: usize, target: &Step) -> Option<usize> {
        let mut bound = tail + 1;
        while let Some(candidate) = self.latest_node_for(target, bound) {
            let mut cursor = Some(candidate);
            while let Some(index) = cursor {
                if index == tail {
                    return Some(candidate);
                }
                cursor = self.nodes[index].next;
            }
            bound = candidate;
        }
        None
    }
}
