//! Aggregation kinds and their accumulator state.
//!
//! Each [`Aggregation`] is an accumulate/finalize pair over a tagged
//! [`Accumulator`] variant. Accumulate folds one row value into the running
//! state; finalize converts the running state into the externally visible
//! value. The catalog is closed: these ten kinds are the whole registry.
//!
//! Null handling:
//!
//! - `sum`/`avg`/`max`/`min` ignore null inputs; if every input was null they
//!   finalize to null.
//! - `first` keeps the first non-null value.
//! - `last`/`any`/`set`/`array` treat null as an ordinary value.
//! - `count` never reads the input value at all.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{JoinError, JoinResult};

/// Per-key aggregation state: output field name -> accumulator.
///
/// A `BTreeMap` so that iteration is ascending by output name, the observable
/// field order for deduplication output.
pub type AccumulatorState = BTreeMap<String, Accumulator>;

/// The closed catalog of aggregation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Numeric sum.
    Sum,
    /// Numeric mean, tracked as a (count, running sum) pair.
    Avg,
    /// Maximum by natural order (numbers, strings, or bools).
    Max,
    /// Minimum by natural order (numbers, strings, or bools).
    Min,
    /// First non-null value in arrival order.
    First,
    /// Last value in arrival order.
    Last,
    /// Any one value (in practice the last seen).
    Any,
    /// Row count; ignores the field's value.
    Count,
    /// Unique values. Finalizes to an array whose element order is
    /// unspecified; do not rely on it.
    Set,
    /// All values in arrival order.
    Array,
}

/// Running aggregate state for one output field under one key.
///
/// The variant shape is fixed by the aggregation kind; callers only observe
/// it through [`Aggregation::finalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "state", rename_all = "snake_case")]
pub enum Accumulator {
    /// Single running value (`sum`/`max`/`min`/`first`/`last`/`any`). Null
    /// means no non-null input has been seen yet.
    Scalar(Value),
    /// Count and running sum for `avg`.
    Avg { count: u64, sum: f64 },
    /// Row count for `count`.
    Count(u64),
    /// Unique values for `set`, in insertion order.
    Set(Vec<Value>),
    /// All values for `array`, in arrival order.
    Array(Vec<Value>),
}

impl Aggregation {
    /// The lowercase name used in configuration and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Max => "max",
            Self::Min => "min",
            Self::First => "first",
            Self::Last => "last",
            Self::Any => "any",
            Self::Count => "count",
            Self::Set => "set",
            Self::Array => "array",
        }
    }

    /// The fixed output type this kind always produces, if any.
    ///
    /// Kinds without a fixed type take their output type from the source
    /// schema (see the schema deriver).
    pub fn fixed_type(self) -> Option<&'static str> {
        match self {
            Self::Count => Some("number"),
            Self::Set | Self::Array => Some("array"),
            _ => None,
        }
    }

    /// Fold one row value into the running state.
    ///
    /// `curr` is the state stored so far (`None` on the first row for the
    /// key). `field` is the output field name, used in error messages only.
    pub fn accumulate(
        self,
        curr: Option<Accumulator>,
        new: &Value,
        field: &str,
    ) -> JoinResult<Accumulator> {
        match self {
            Self::Sum => {
                let curr = scalar(curr);
                if new.is_null() {
                    return Ok(Accumulator::Scalar(curr));
                }
                let added = match &curr {
                    Value::Null => self.as_number(new, field)?.clone(),
                    prev => {
                        let prev = self.as_number(prev, field)?;
                        add(prev, self.as_number(new, field)?).ok_or_else(|| {
                            self.invalid(field, new)
                        })?
                    }
                };
                Ok(Accumulator::Scalar(Value::Number(added)))
            }
            Self::Avg => {
                let (count, sum) = match curr {
                    Some(Accumulator::Avg { count, sum }) => (count, sum),
                    _ => (0, 0.0),
                };
                if new.is_null() {
                    return Ok(Accumulator::Avg { count, sum });
                }
                let v = self.as_f64(new, field)?;
                Ok(Accumulator::Avg {
                    count: count + 1,
                    sum: sum + v,
                })
            }
            Self::Max | Self::Min => {
                let curr = scalar(curr);
                if new.is_null() {
                    return Ok(Accumulator::Scalar(curr));
                }
                if curr.is_null() {
                    return Ok(Accumulator::Scalar(new.clone()));
                }
                let ord = compare(&curr, new).ok_or_else(|| self.invalid(field, new))?;
                let keep_new = match self {
                    Self::Max => ord == Ordering::Less,
                    _ => ord == Ordering::Greater,
                };
                Ok(Accumulator::Scalar(if keep_new { new.clone() } else { curr }))
            }
            Self::First => match curr {
                Some(Accumulator::Scalar(v)) if !v.is_null() => Ok(Accumulator::Scalar(v)),
                _ => Ok(Accumulator::Scalar(new.clone())),
            },
            Self::Last | Self::Any => Ok(Accumulator::Scalar(new.clone())),
            Self::Count => {
                let n = match curr {
                    Some(Accumulator::Count(n)) => n,
                    _ => 0,
                };
                Ok(Accumulator::Count(n + 1))
            }
            Self::Set => {
                let mut items = match curr {
                    Some(Accumulator::Set(items)) => items,
                    _ => Vec::new(),
                };
                if !items.contains(new) {
                    items.push(new.clone());
                }
                Ok(Accumulator::Set(items))
            }
            Self::Array => {
                let mut items = match curr {
                    Some(Accumulator::Array(items)) => items,
                    _ => Vec::new(),
                };
                items.push(new.clone());
                Ok(Accumulator::Array(items))
            }
        }
    }

    /// Convert running state into the externally visible value.
    pub fn finalize(self, state: Accumulator) -> Value {
        match state {
            Accumulator::Scalar(v) => v,
            Accumulator::Avg { count: 0, .. } => Value::Null,
            Accumulator::Avg { count, sum } => Number::from_f64(sum / count as f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Accumulator::Count(n) => Value::Number(n.into()),
            Accumulator::Set(items) | Accumulator::Array(items) => Value::Array(items),
        }
    }

    fn as_number<'v>(self, value: &'v Value, field: &str) -> JoinResult<&'v Number> {
        value.as_number().ok_or_else(|| self.invalid(field, value))
    }

    fn as_f64(self, value: &Value, field: &str) -> JoinResult<f64> {
        value.as_f64().ok_or_else(|| self.invalid(field, value))
    }

    fn invalid(self, field: &str, value: &Value) -> JoinError {
        JoinError::InvalidValue {
            aggregate: self.name(),
            field: field.to_string(),
            value: value.clone(),
        }
    }
}

/// The running scalar value, treating anything else as "no value yet".
fn scalar(curr: Option<Accumulator>) -> Value {
    match curr {
        Some(Accumulator::Scalar(v)) => v,
        _ => Value::Null,
    }
}

/// Add two JSON numbers, staying integral when both sides are.
fn add(a: &Number, b: &Number) -> Option<Number> {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = a.checked_add(b) {
            return Some(Number::from(sum));
        }
    }
    Number::from_f64(a.as_f64()? + b.as_f64()?)
}

/// Natural-order comparison for `max`/`min`: numbers numerically, strings and
/// bools by their own order. Mixed or unordered types compare as `None`.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
