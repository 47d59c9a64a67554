//! Row filtering for [`crate::types::DataSet`].
//!
//! [`filter`] keeps rows matching an arbitrary predicate. [`filter_with_specs`] evaluates the
//! declarative predicates of a rule: the conjunction of every spec, evaluated one spec at a
//! time. A spec that names a missing column or an unknown operator is skipped (it keeps every
//! row); a cell that cannot be coerced for a comparison excludes its row.

use std::cmp::Ordering;

use chrono::NaiveDateTime;

use crate::error::SkipReason;
use crate::rule::FilterSpec;
use crate::types::{parse_timestamp, DataSet, Value};

use super::SkipSink;

/// Returns a new [`DataSet`] containing only rows for which `predicate` returns `true`.
///
/// This is a convenience wrapper around [`DataSet::filter_rows`].
pub fn filter<F>(dataset: &DataSet, predicate: F) -> DataSet
where
    F: FnMut(&[Value]) -> bool,
{
    dataset.filter_rows(predicate)
}

/// Supported filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
    Between,
    In,
    Contains,
    RangeDate,
}

impl FilterOp {
    /// Parse an operator name, including the `gte`/`lte`/`equals` aliases.
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "gt" => Some(Self::Gt),
            "ge" | "gte" => Some(Self::Ge),
            "lt" => Some(Self::Lt),
            "le" | "lte" => Some(Self::Le),
            "eq" | "equals" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "between" => Some(Self::Between),
            "in" => Some(Self::In),
            "contains" => Some(Self::Contains),
            "rangeDate" => Some(Self::RangeDate),
            _ => None,
        }
    }
}

/// A spec resolved against a table: column index plus typed operands.
#[derive(Debug)]
enum Predicate {
    Compare { op: FilterOp, literal: Value },
    Between { low: f64, high: f64 },
    In(Vec<Value>),
    Contains(String),
    RangeDate {
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    },
}

/// Apply rule filter specs, keeping rows that satisfy all of them, in original order.
pub fn filter_with_specs(dataset: &DataSet, specs: &[FilterSpec]) -> DataSet {
    filter_with_specs_observed(dataset, specs, &mut |_| {})
}

pub(crate) fn filter_with_specs_observed(
    dataset: &DataSet,
    specs: &[FilterSpec],
    on_skip: SkipSink<'_>,
) -> DataSet {
    let mut out = dataset.clone();
    for spec in specs {
        let Some(idx) = dataset.schema.index_of(&spec.field) else {
            on_skip(SkipReason::UnknownField {
                field: spec.field.clone(),
            });
            continue;
        };
        let Some(op) = FilterOp::parse(&spec.op) else {
            on_skip(SkipReason::UnsupportedOperator { op: spec.op.clone() });
            continue;
        };
        let predicate = match resolve(op, spec) {
            Ok(p) => p,
            Err(message) => {
                on_skip(SkipReason::TypeCoercionFailure {
                    field: spec.field.clone(),
                    message,
                });
                continue;
            }
        };
        out = out.filter_rows(|row| predicate.matches(&row[idx]));
    }
    out
}

fn resolve(op: FilterOp, spec: &FilterSpec) -> Result<Predicate, String> {
    match op {
        FilterOp::Gt | FilterOp::Ge | FilterOp::Lt | FilterOp::Le | FilterOp::Eq | FilterOp::Ne => {
            let literal = Value::from_json(&spec.value)
                .ok_or_else(|| format!("operator '{}' needs a scalar value", spec.op))?;
            Ok(Predicate::Compare { op, literal })
        }
        FilterOp::Between => {
            let (low, high) = match (&spec.value, &spec.value2) {
                (serde_json::Value::Array(items), _) if items.len() == 2 => (&items[0], &items[1]),
                (v, Some(v2)) if !v.is_array() => (v, v2),
                _ => return Err("between needs [low, high] or value/value2".to_string()),
            };
            let low = json_number(low).ok_or("between lower bound is not numeric")?;
            let high = json_number(high).ok_or("between upper bound is not numeric")?;
            Ok(Predicate::Between { low, high })
        }
        FilterOp::In => match &spec.value {
            serde_json::Value::Array(items) => {
                Ok(Predicate::In(items.iter().filter_map(Value::from_json).collect()))
            }
            _ => Err("in needs a list value".to_string()),
        },
        FilterOp::Contains => {
            let needle = Value::from_json(&spec.value)
                .and_then(|v| v.render())
                .ok_or("contains needs a scalar, non-null value")?;
            Ok(Predicate::Contains(needle))
        }
        FilterOp::RangeDate => {
            let (start, end) = match &spec.value {
                serde_json::Value::Object(map) => (map.get("start"), map.get("end")),
                v => (Some(v), spec.value2.as_ref()),
            };
            Ok(Predicate::RangeDate {
                start: date_bound(start)?,
                end: date_bound(end)?,
            })
        }
    }
}

fn json_number(v: &serde_json::Value) -> Option<f64> {
    Value::from_json(v)?.as_number().ok()
}

fn date_bound(v: Option<&serde_json::Value>) -> Result<Option<NaiveDateTime>, String> {
    match v {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| format!("unparsable date bound '{s}'")),
        Some(other) => Err(format!("unparsable date bound {other}")),
    }
}

impl Predicate {
    fn matches(&self, cell: &Value) -> bool {
        match self {
            Self::Compare { op, literal } => {
                if cell.is_null() || literal.is_null() {
                    // Only `ne` holds for a missing value.
                    return *op == FilterOp::Ne && cell.is_null() != literal.is_null();
                }
                let Some(ord) = compare(cell, literal) else {
                    return false;
                };
                match op {
                    FilterOp::Gt => ord == Ordering::Greater,
                    FilterOp::Ge => ord != Ordering::Less,
                    FilterOp::Lt => ord == Ordering::Less,
                    FilterOp::Le => ord != Ordering::Greater,
                    FilterOp::Eq => ord == Ordering::Equal,
                    FilterOp::Ne => ord != Ordering::Equal,
                    _ => false,
                }
            }
            Self::Between { low, high } => match cell.as_number() {
                Ok(v) => *low <= v && v <= *high,
                Err(_) => false,
            },
            Self::In(candidates) => !cell.is_null() && candidates.iter().any(|c| c == cell),
            Self::Contains(needle) => cell
                .render()
                .is_some_and(|hay| hay.contains(needle.as_str())),
            Self::RangeDate { start, end } => match cell.as_timestamp() {
                Ok(ts) => start.is_none_or(|s| ts >= s) && end.is_none_or(|e| ts <= e),
                Err(_) => false,
            },
        }
    }
}

/// Ordered comparison of a cell against a literal.
///
/// Numeric when both sides coerce to numbers, chronological when the cell is a timestamp and the
/// literal parses as one, lexicographic for two text values. `None` means the pair is not
/// comparable.
fn compare(cell: &Value, literal: &Value) -> Option<Ordering> {
    match (cell, literal) {
        (Value::Timestamp(ts), lit) => lit.as_timestamp().ok().map(|other| ts.cmp(&other)),
        (Value::Text(a), Value::Text(b)) => match (cell.as_number(), literal.as_number()) {
            (Ok(x), Ok(y)) => x.partial_cmp(&y),
            _ => Some(a.as_str().cmp(b.as_str())),
        },
        _ => {
            let a = cell.as_number().ok()?;
            let b = literal.as_number().ok()?;
            a.partial_cmp(&b)
        }
    }
}
