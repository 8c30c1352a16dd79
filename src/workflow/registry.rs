//! Hot-swappable registry of committed workflow plans using ArcSwap
//!
//! Provides lock-free, atomic updates to the set of named plans. Each update
//! swaps the entire map pointer, so runs already holding an older plan keep
//! executing it undisturbed.

use crate::runtime::run::Run;
use crate::workflow::plan::WorkflowPlan;
use arc_swap::ArcSwap;
use std::{collections::HashMap, sync::Arc};

/// Lock-free registry of committed plans, keyed by workflow name
#[derive(Debug)]
pub struct WorkflowRegistry {
    /// Thread-safe atomic pointer to the plan map
    plans: ArcSwap<HashMap<String, WorkflowPlan>>,
}

impl WorkflowRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            plans: ArcSwap::new(Arc::new(HashMap::new())),
        }
    }

    /// Register or replace a plan under its workflow name
    ///
    /// Returns the plan previously registered under that name, if any.
    pub fn register(&self, plan: WorkflowPlan) -> Option<WorkflowPlan> {
        let name = plan.name().to_string();
        let mut previous = None;

        self.plans.rcu(|current| {
            let mut updated = HashMap::clone(current);
            previous = updated.insert(name.clone(), plan.clone());
            updated
        });

        if previous.is_some() {
            tracing::info!("🔄 Replaced workflow plan: {}", name);
        } else {
            tracing::info!("📥 Registered workflow plan: {}", name);
        }
        previous
    }

    /// Get a plan by name (lock-free read)
    pub fn get(&self, name: &str) -> Option<WorkflowPlan> {
        self.plans.load().get(name).cloned()
    }

    /// Create a run of the named plan with the default engine configuration
    pub fn create_run(&self, name: &str) -> Option<Run> {
        self.get(name).map(|plan| plan.create_run())
    }

    /// List registered workflow names, sorted
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plans.load().keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove a plan from the registry
    pub fn remove(&self, name: &str) -> Option<WorkflowPlan> {
        let mut removed = None;

        self.plans.rcu(|current| {
            let mut updated = HashMap::clone(current);
            removed = updated.remove(name);
            updated
        });

        if removed.is_some() {
            tracing::info!("🗑️ Removed workflow plan from registry: {}", name);
        }
        removed
    }

    /// Number of registered plans
    pub fn len(&self) -> usize {
        self.plans.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.load().is_empty()
    }
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}
