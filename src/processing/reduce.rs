//! Reduction operations for [`crate::types::DataSet`].

use crate::error::CoercionError;
use crate::types::{DataSet, Value};

/// Built-in reduction operations over a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    /// Count non-null values.
    Count,
    /// Sum numeric values, ignoring nulls. Zero when there is nothing to sum.
    Sum,
    /// Arithmetic mean of numeric values, ignoring nulls.
    Avg,
    /// Minimum numeric value, ignoring nulls.
    Min,
    /// Maximum numeric value, ignoring nulls.
    Max,
}

impl ReduceOp {
    /// Parse a rule operator name.
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "count" => Some(Self::Count),
            "sum" => Some(Self::Sum),
            "avg" => Some(Self::Avg),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    /// Operator name used in output column names (`{field}_{op}`).
    pub fn name(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// Whether the op needs every non-null cell to coerce to a number.
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Count)
    }
}

/// Reduce a column using a built-in [`ReduceOp`].
///
/// - Returns `None` if `column` does not exist in the schema, or if a numeric op meets a non-null
///   cell that cannot be read as a number.
/// - For `Avg`/`Min`/`Max`, returns `Some(Value::Null)` if there are no non-null values.
/// - For `Sum`, returns `Some(Value::Number(0.0))` if there are no non-null values.
/// - For `Count`, returns the number of non-null cells.
pub fn reduce(dataset: &DataSet, column: &str, op: ReduceOp) -> Option<Value> {
    let idx = dataset.schema.index_of(column)?;
    reduce_values(dataset.column(idx), op).ok()
}

/// Reduce an arbitrary sequence of cells.
pub fn reduce_values<'a, I>(cells: I, op: ReduceOp) -> Result<Value, CoercionError>
where
    I: IntoIterator<Item = &'a Value>,
{
    let non_null = cells.into_iter().filter(|v| !v.is_null());
    if op == ReduceOp::Count {
        return Ok(Value::Number(non_null.count() as f64));
    }

    let mut count = 0usize;
    let mut acc: Option<f64> = None;
    for cell in non_null {
        let v = cell.as_number()?;
        count += 1;
        acc = Some(match (op, acc) {
            (ReduceOp::Sum | ReduceOp::Avg, Some(a)) => a + v,
            (ReduceOp::Min, Some(a)) => a.min(v),
            (ReduceOp::Max, Some(a)) => a.max(v),
            (_, None) => v,
            (ReduceOp::Count, Some(a)) => a,
        });
    }

    Ok(match (op, acc) {
        (ReduceOp::Sum, None) => Value::Number(0.0),
        (ReduceOp::Avg, Some(total)) => Value::Number(total / count as f64),
        (_, Some(v)) => Value::Number(v),
        (_, None) => Value::Null,
    })
}

/// Returns `Ok(())` if every non-null cell of the sequence reads as a number.
pub(crate) fn check_numeric<'a, I>(cells: I) -> Result<(), CoercionError>
where
    I: IntoIterator<Item = &'a Value>,
{
    cells
        .into_iter()
        .filter(|v| !v.is_null())
        .try_for_each(|v| v.as_number().map(|_| ()))
}
