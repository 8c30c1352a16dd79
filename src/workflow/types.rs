//! Declarative loop condition types
//!
//! Conditions are plain data so that a plan can be inspected and validated
//! before it runs. They deserialize from the familiar JSON form:
//!
//! ```json
//! { "ref": { "step": "increment", "path": "newValue" }, "query": { "$gte": 10 } }
//! ```
//!
//! and compose with `{ "and": [...] }` / `{ "or": [...] }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// A predicate over prior step results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    /// True when every inner condition is true (vacuously true when empty)
    All { and: Vec<Condition> },
    /// True when at least one inner condition is true
    Any { or: Vec<Condition> },
    /// Compare one field of a step result against a literal
    Field(FieldCondition),
}

/// `{ ref, query }` leaf condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    #[serde(rename = "ref")]
    pub reference: StepRef,
    pub query: Query,
}

/// Reference to a field within a named step's output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRef {
    /// Step id, or `trigger` for the run's trigger data
    pub step: String,
    /// Dotted path into the result (`"a.b.0"`); empty means the whole result
    #[serde(default)]
    pub path: String,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "$eq")]
    Eq,
    #[serde(rename = "$ne")]
    Ne,
    #[serde(rename = "$gt")]
    Gt,
    #[serde(rename = "$gte")]
    Gte,
    #[serde(rename = "$lt")]
    Lt,
    #[serde(rename = "$lte")]
    Lte,
    #[serde(rename = "$in")]
    In,
    #[serde(rename = "$nin")]
    Nin,
}

/// Operator applied to a literal operand; serialized as `{ "$op": operand }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<Operator, Value>",
    into = "BTreeMap<Operator, Value>"
)]
pub struct Query {
    pub operator: Operator,
    pub operand: Value,
}

impl TryFrom<BTreeMap<Operator, Value>> for Query {
    type Error = String;

    fn try_from(map: BTreeMap<Operator, Value>) -> Result<Self, Self::Error> {
        if map.len() != 1 {
            return Err(format!(
                "query must contain exactly one operator, found {}",
                map.len()
            ));
        }
        let (operator, operand) = map
            .into_iter()
            .next()
            .ok_or_else(|| "query is empty".to_string())?;
        Ok(Self { operator, operand })
    }
}

impl From<Query> for BTreeMap<Operator, Value> {
    fn from(query: Query) -> Self {
        BTreeMap::from([(query.operator, query.operand)])
    }
}

impl Condition {
    /// Leaf condition `{ ref: { step, path }, query: { operator: operand } }`
    pub fn field(
        step: impl Into<String>,
        path: impl Into<String>,
        operator: Operator,
        operand: impl Into<Value>,
    ) -> Self {
        Condition::Field(FieldCondition {
            reference: StepRef {
                step: step.into(),
                path: path.into(),
            },
            query: Query {
                operator,
                operand: operand.into(),
            },
        })
    }

    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::All {
            and: conditions.into_iter().collect(),
        }
    }

    pub fn any(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::Any {
            or: conditions.into_iter().collect(),
        }
    }

    /// Every step id this condition reads from
    pub fn referenced_steps(&self) -> BTreeSet<&str> {
        let mut steps = BTreeSet::new();
        self.collect_steps(&mut steps);
        steps
    }

    fn collect_steps<'a>(&'a self, steps: &mut BTreeSet<&'a str>) {
        match self {
            Condition::All { and: inner } | Condition::Any { or: inner } => {
                for condition in inner {
                    condition.collect_steps(steps);
                }
            }
            Condition::Field(field) => {
                steps.insert(field.reference.step.as_str());
            }
        }
    }
}
