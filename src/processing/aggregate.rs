//! Grouped aggregation.
//!
//! Grouping specs (`groupByDay`, `groupByMonth`) derive a key column from a date field; reduction
//! specs (`sum`, `avg`, `min`, `max`, `count`) are evaluated per distinct key tuple, or once over
//! the whole table when no grouping key is present. Output columns are the key columns followed
//! by `{field}_{op}` columns.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::SkipReason;
use crate::rule::AggregationSpec;
use crate::types::{DataSet, DataType, Field, GroupKey, Schema, Value};

use super::reduce::{check_numeric, reduce_values, ReduceOp};
use super::SkipSink;

/// Calendar unit a timestamp is truncated to when deriving a group key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBucket {
    Day,
    Month,
}

impl TimeBucket {
    /// Parse a grouping operator name.
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "groupByDay" => Some(Self::Day),
            "groupByMonth" => Some(Self::Month),
            _ => None,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
        }
    }

    /// Truncate to midnight of the day, or to midnight of the first day of the month.
    pub fn truncate(self, ts: NaiveDateTime) -> NaiveDateTime {
        let date = match self {
            Self::Day => ts.date(),
            Self::Month => NaiveDate::from_ymd_opt(ts.year(), ts.month(), 1).unwrap_or(ts.date()),
        };
        date.and_time(NaiveTime::MIN)
    }
}

#[derive(Debug)]
struct KeyColumn {
    name: String,
    source: usize,
    bucket: TimeBucket,
}

#[derive(Debug)]
struct Reduction {
    field: String,
    source: usize,
    ops: Vec<ReduceOp>,
}

#[derive(Debug, Default)]
struct Plan {
    keys: Vec<KeyColumn>,
    reductions: Vec<Reduction>,
}

impl Plan {
    fn add_key(&mut self, dataset: &DataSet, field: &str, bucket: TimeBucket, on_skip: SkipSink<'_>) {
        let Some(source) = dataset.schema.index_of(field) else {
            on_skip(SkipReason::UnknownField {
                field: field.to_string(),
            });
            return;
        };
        let name = format!("{field}_{}", bucket.suffix());
        if self.keys.iter().all(|k| k.name != name) {
            self.keys.push(KeyColumn { name, source, bucket });
        }
    }

    fn add_reduction(&mut self, dataset: &DataSet, field: &str, op: &str, on_skip: SkipSink<'_>) {
        let Some(op) = ReduceOp::parse(op) else {
            on_skip(SkipReason::UnsupportedOperator { op: op.to_string() });
            return;
        };
        let Some(source) = dataset.schema.index_of(field) else {
            on_skip(SkipReason::UnknownField {
                field: field.to_string(),
            });
            return;
        };
        if op.is_numeric() {
            if let Err(e) = check_numeric(dataset.column(source)) {
                on_skip(SkipReason::TypeCoercionFailure {
                    field: field.to_string(),
                    message: e.to_string(),
                });
                return;
            }
        }
        match self.reductions.iter_mut().find(|r| r.field == field) {
            Some(r) if r.ops.contains(&op) => {}
            Some(r) => r.ops.push(op),
            None => self.reductions.push(Reduction {
                field: field.to_string(),
                source,
                ops: vec![op],
            }),
        }
    }

    fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.reductions.is_empty()
    }

    fn output_schema(&self) -> Schema {
        let keys = self
            .keys
            .iter()
            .map(|k| Field::new(k.name.clone(), DataType::Timestamp));
        let reductions = self.reductions.iter().flat_map(|r| {
            r.ops
                .iter()
                .map(|op| Field::new(format!("{}_{}", r.field, op.name()), DataType::Number))
        });
        Schema::new(keys.chain(reductions).collect())
    }

    /// One output row's reduction cells over the rows at `members`.
    fn reduce_group(&self, dataset: &DataSet, members: &[usize]) -> Vec<Value> {
        let mut out = Vec::new();
        for r in &self.reductions {
            for &op in &r.ops {
                let cells = members.iter().map(|&i| &dataset.rows[i][r.source]);
                // Numeric columns were checked while planning.
                out.push(reduce_values(cells, op).unwrap_or(Value::Null));
            }
        }
        out
    }
}

/// Apply grouping and reduction specs as one unit.
///
/// Specs that reference missing columns or unknown operators are dropped; if every spec drops,
/// the dataset is returned unchanged.
pub fn aggregate(dataset: &DataSet, specs: &[AggregationSpec]) -> DataSet {
    aggregate_observed(dataset, specs, &mut |_| {})
}

pub(crate) fn aggregate_observed(
    dataset: &DataSet,
    specs: &[AggregationSpec],
    on_skip: SkipSink<'_>,
) -> DataSet {
    let mut plan = Plan::default();
    for spec in specs {
        if let Some(bucket) = TimeBucket::parse(&spec.op) {
            match spec.date_field.as_deref().or(spec.field.as_deref()) {
                Some(field) => plan.add_key(dataset, field, bucket, on_skip),
                None => on_skip(SkipReason::UnknownField {
                    field: String::new(),
                }),
            }
            for nested in spec.aggs.iter().flatten() {
                plan.add_reduction(dataset, &nested.field, &nested.op, on_skip);
            }
        } else {
            let field = spec.field.as_deref().unwrap_or_default();
            plan.add_reduction(dataset, field, &spec.op, on_skip);
        }
    }

    if plan.is_empty() {
        return dataset.clone();
    }

    let schema = plan.output_schema();
    if plan.keys.is_empty() {
        let all: Vec<usize> = (0..dataset.row_count()).collect();
        return DataSet::new(schema, vec![plan.reduce_group(dataset, &all)]);
    }

    let mut groups: BTreeMap<Vec<GroupKey>, Vec<usize>> = BTreeMap::new();
    for (i, row) in dataset.rows.iter().enumerate() {
        let key = plan
            .keys
            .iter()
            .map(|k| match row[k.source].as_timestamp() {
                Ok(ts) => GroupKey::Timestamp(k.bucket.truncate(ts)),
                Err(_) => GroupKey::Null,
            })
            .collect();
        groups.entry(key).or_default().push(i);
    }

    let rows = groups
        .into_iter()
        .map(|(key, members)| {
            let mut row: Vec<Value> = key.iter().map(GroupKey::to_value).collect();
            row.extend(plan.reduce_group(dataset, &members));
            row
        })
        .collect();
    DataSet::new(schema, rows)
}
