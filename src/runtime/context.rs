//! Per-run state shared with step executors
//!
//! A [`RunContext`] belongs to exactly one run. Executors never see it
//! directly; they receive a [`StepContext`] carrying a snapshot of the results
//! accumulated so far. Snapshots share the results map until the run records
//! the next output, so handing one out does not copy the map.

use crate::workflow::step::TRIGGER_KEY;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};
use uuid::Uuid;

/// One executed step, in execution order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    /// Step id
    pub step_id: String,
    /// 1-based execution count of this plan node within the run
    pub iteration: u64,
    /// Output produced by the executor
    pub output: Value,
    pub finished_at: DateTime<Utc>,
}

/// Mutable results store for one run
///
/// Holds the most recent output per step id plus the full execution history.
/// Re-running a step replaces its entry in `results` but appends to `history`,
/// so history memory grows with every loop iteration unless it is disabled.
#[derive(Debug, Clone)]
pub struct RunContext {
    results: Arc<BTreeMap<String, Value>>,
    history: Vec<StepRecord>,
    keep_history: bool,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::with_history(true)
    }
}

impl RunContext {
    /// Empty context that records history
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty context; with `keep_history` off only the latest results are kept
    pub fn with_history(keep_history: bool) -> Self {
        Self {
            results: Arc::default(),
            history: Vec::new(),
            keep_history,
        }
    }

    /// Latest output of `step_id`, or the trigger data for `"trigger"`
    pub fn get_step_result(&self, step_id: &str) -> Option<&Value> {
        self.results.get(step_id)
    }

    /// Latest output of `step_id` deserialized into `T`
    ///
    /// Returns `None` when the step has not run or its output does not fit `T`.
    pub fn get_step_result_as<T: DeserializeOwned>(&self, step_id: &str) -> Option<T> {
        self.results
            .get(step_id)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Trigger data seeded at run start
    pub fn trigger(&self) -> Option<&Value> {
        self.results.get(TRIGGER_KEY)
    }

    /// Latest output per step id
    pub fn results(&self) -> &BTreeMap<String, Value> {
        &self.results
    }

    /// Executions recorded so far; empty when history is disabled
    pub fn history(&self) -> &[StepRecord] {
        &self.history
    }

    pub(crate) fn seed_trigger(&mut self, trigger: Value) {
        Arc::make_mut(&mut self.results).insert(TRIGGER_KEY.to_string(), trigger);
    }

    /// Store a step output, replacing any earlier output of the same step
    pub(crate) fn record(&mut self, step_id: &str, iteration: u64, output: Value) {
        if self.keep_history {
            self.history.push(StepRecord {
                step_id: step_id.to_string(),
                iteration,
                output: output.clone(),
                finished_at: Utc::now(),
            });
        }
        Arc::make_mut(&mut self.results).insert(step_id.to_string(), output);
    }

    pub(crate) fn into_parts(self) -> (BTreeMap<String, Value>, Vec<StepRecord>) {
        let results = Arc::try_unwrap(self.results).unwrap_or_else(|shared| (*shared).clone());
        (results, self.history)
    }
}

/// Input handed to a step executor
#[derive(Debug, Clone)]
pub struct StepContext {
    run_id: Uuid,
    step_id: String,
    iteration: u64,
    results: Arc<BTreeMap<String, Value>>,
}

impl StepContext {
    pub(crate) fn new(run_id: Uuid, step_id: &str, iteration: u64, context: &RunContext) -> Self {
        Self {
            run_id,
            step_id: step_id.to_string(),
            iteration,
            results: Arc::clone(&context.results),
        }
    }

    /// Run this execution belongs to
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Id of the step being executed
    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    /// How many times this plan node has started in the current run, including this one
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Latest output of `step_id` as of when this step started
    pub fn get_step_result(&self, step_id: &str) -> Option<&Value> {
        self.results.get(step_id)
    }

    pub fn get_step_result_as<T: DeserializeOwned>(&self, step_id: &str) -> Option<T> {
        self.results
            .get(step_id)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn trigger(&self) -> Option<&Value> {
        self.results.get(TRIGGER_KEY)
    }
}
