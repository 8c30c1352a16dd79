//! Condition evaluation against accumulated step results

use crate::error::RunError;
use crate::runtime::context::RunContext;
use crate::workflow::types::{Condition, FieldCondition, Operator};
use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Evaluate `condition` against the results recorded so far
///
/// A reference to a step that has not produced output yet (or produced
/// `null`) evaluates to `false`, which keeps a loop going on its first pass.
/// A missing path on a non-null result is an error.
pub fn evaluate(condition: &Condition, context: &RunContext) -> Result<bool, RunError> {
    match condition {
        Condition::All { and } => {
            for inner in and {
                if !evaluate(inner, context)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Condition::Any { or } => {
            for inner in or {
                if evaluate(inner, context)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Condition::Field(field) => evaluate_field(field, context),
    }
}

fn evaluate_field(field: &FieldCondition, context: &RunContext) -> Result<bool, RunError> {
    let step = &field.reference.step;
    let result = match context.get_step_result(step) {
        None | Some(Value::Null) => {
            tracing::debug!("🔍 Condition on '{}' has no result yet, treating as false", step);
            return Ok(false);
        }
        Some(result) => result,
    };

    let path = field.reference.path.as_str();
    let value = lookup_path(result, path).ok_or_else(|| RunError::MissingField {
        step: step.clone(),
        path: path.to_string(),
    })?;

    let outcome = apply(field.query.operator, value, &field.query.operand);
    tracing::debug!(
        "🔍 Condition {}.{} {:?} {} -> {}",
        step,
        path,
        field.query.operator,
        field.query.operand,
        outcome
    );
    Ok(outcome)
}

/// Resolve a dotted path (`"a.b.0"`) inside `value`
pub(crate) fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }

    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn apply(operator: Operator, value: &Value, operand: &Value) -> bool {
    match operator {
        Operator::Eq => values_equal(value, operand),
        Operator::Ne => !values_equal(value, operand),
        Operator::Gt => compare(value, operand) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            compare(value, operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => compare(value, operand) == Some(Ordering::Less),
        Operator::Lte => matches!(
            compare(value, operand),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::In => contains(operand, value),
        Operator::Nin => !contains(operand, value),
    }
}

/// Numbers compare by value (so `1 == 1.0`); everything else structurally
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => compare_numbers(l, r) == Some(Ordering::Equal),
        _ => left == right,
    }
}

/// Ordering for numbers and strings; other kinds are unordered
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => compare_numbers(l, r),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

/// Integers compare exactly; `f64` only when either side is fractional
fn compare_numbers(left: &Number, right: &Number) -> Option<Ordering> {
    if let (Some(l), Some(r)) = (left.as_i64(), right.as_i64()) {
        return Some(l.cmp(&r));
    }
    if let (Some(l), Some(r)) = (left.as_u64(), right.as_u64()) {
        return Some(l.cmp(&r));
    }
    left.as_f64()?.partial_cmp(&right.as_f64()?)
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    haystack
        .as_array()
        .is_some_and(|items| items.iter().any(|item| values_equal(item, needle)))
}
