//! Disclosure-control transforms.
//!
//! [`obfuscate`] applies, in this order and each only when configured:
//!
//! 1. `dropPII`: remove personal-identifier columns
//! 2. `bucketing`: replace numbers with interval labels
//! 3. `rounding`: round to the nearest multiple (half to even)
//! 4. `jitter`: multiplicative uniform noise
//! 5. `dpNoise`: additive Laplace noise (approximate, not a calibrated DP mechanism)
//! 6. `kAnonymity`: blanket suppression of rows in under-sized quasi-identifier groups
//!
//! The order matters: a bucketed column holds text and is no longer touched by the numeric
//! transforms, and k-anonymity groups on the fully transformed rows.
//!
//! ## k-anonymity suppresses whole rows
//!
//! A row whose quasi-identifier group is smaller than `k` has **every** cell replaced with
//! [`SUPPRESSED`], including columns that are not quasi-identifiers, so analytic columns of
//! small groups are lost as well.

use std::collections::HashMap;

use rand::Rng;

use crate::error::SkipReason;
use crate::rule::{
    BucketSpec, DpNoiseSpec, DropPii, JitterSpec, KAnonymitySpec, ObfuscationConfig, RoundingSpec,
};
use crate::types::{DataSet, DataType, GroupKey, Value};

use super::noise::{sample_laplace, sample_symmetric_uniform};
use super::reduce::check_numeric;
use super::SkipSink;

/// Column names removed by `dropPII: true`.
pub const PII_CANDIDATES: &[&str] = &[
    "full_name",
    "name",
    "email",
    "phone",
    "address",
    "ssn",
    "date_of_birth",
    "dob",
    "account_id",
    "ip_address",
];

/// Cell written into every column of a suppressed row.
pub const SUPPRESSED: &str = "*";

/// Upper bound on bins derived from a `width`, so a tiny width cannot explode the label set.
const MAX_DERIVED_BINS: usize = 10_000;

/// Apply the configured transforms in their fixed order.
///
/// Noise draws come from `rng`; pass a seeded generator for reproducible output.
pub fn obfuscate<R: Rng + ?Sized>(dataset: &DataSet, config: &ObfuscationConfig, rng: &mut R) -> DataSet {
    obfuscate_observed(dataset, config, rng, &mut |_| {})
}

pub(crate) fn obfuscate_observed<R: Rng + ?Sized>(
    dataset: &DataSet,
    config: &ObfuscationConfig,
    rng: &mut R,
    on_skip: SkipSink<'_>,
) -> DataSet {
    let mut out = dataset.clone();

    if let Some(drop) = &config.drop_pii {
        drop_pii(&mut out, drop);
    }
    if let Some(bucketing) = &config.bucketing {
        for spec in bucketing.as_slice() {
            bucketize(&mut out, spec, on_skip);
        }
    }
    if let Some(spec) = &config.rounding {
        round(&mut out, spec, on_skip);
    }
    if let Some(spec) = &config.jitter {
        jitter(&mut out, spec, rng, on_skip);
    }
    if let Some(spec) = &config.dp_noise {
        dp_noise(&mut out, spec, rng, on_skip);
    }
    if let Some(spec) = &config.k_anonymity {
        k_anonymize(&mut out, spec, on_skip);
    }
    out
}

fn drop_pii(ds: &mut DataSet, drop: &DropPii) {
    let names: Vec<&str> = match drop {
        DropPii::Flag(false) => return,
        DropPii::Flag(true) => PII_CANDIDATES.to_vec(),
        DropPii::Columns(cols) => cols.iter().map(String::as_str).collect(),
    };
    let keep: Vec<usize> = ds
        .schema
        .fields
        .iter()
        .enumerate()
        .filter(|(_, f)| !names.contains(&f.name.as_str()))
        .map(|(i, _)| i)
        .collect();
    if keep.len() != ds.schema.fields.len() {
        *ds = ds.project(&keep);
    }
}

fn bucketize(ds: &mut DataSet, spec: &BucketSpec, on_skip: SkipSink<'_>) {
    let Some(idx) = ds.schema.index_of(&spec.field) else {
        on_skip(SkipReason::UnknownField {
            field: spec.field.clone(),
        });
        return;
    };
    let coercion_failure = |message: String| SkipReason::TypeCoercionFailure {
        field: spec.field.clone(),
        message,
    };
    if let Err(e) = check_numeric(ds.column(idx)) {
        on_skip(coercion_failure(e.to_string()));
        return;
    }
    let edges = match bucket_edges(ds, idx, spec) {
        Ok(edges) => edges,
        Err(message) => {
            on_skip(coercion_failure(message));
            return;
        }
    };
    let labels = match bucket_labels(&edges, spec.labels.as_deref()) {
        Ok(labels) => labels,
        Err(message) => {
            on_skip(coercion_failure(message));
            return;
        }
    };

    for row in &mut ds.rows {
        let cell = &mut row[idx];
        *cell = match cell.as_number() {
            Ok(v) => bucket_index(&edges, v)
                .map(|i| Value::Text(labels[i].clone()))
                .unwrap_or(Value::Null),
            Err(_) => Value::Null,
        };
    }
    ds.schema.fields[idx].data_type = DataType::Text;
}

fn bucket_edges(ds: &DataSet, idx: usize, spec: &BucketSpec) -> Result<Vec<f64>, String> {
    if let Some(bins) = spec.bins.as_ref().filter(|b| !b.is_empty()) {
        if bins.len() < 2 {
            return Err("bucketing needs at least two bin edges".to_string());
        }
        if bins.iter().any(|b| !b.is_finite()) || bins.windows(2).any(|w| w[0] >= w[1]) {
            return Err("bin edges must be finite and strictly increasing".to_string());
        }
        return Ok(bins.clone());
    }

    let width = spec
        .width
        .filter(|w| w.is_finite() && *w > 0.0)
        .ok_or("bucketing needs bins or a positive width")?;
    let (min, max) = ds
        .column(idx)
        .filter_map(|v| v.as_number().ok())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .ok_or("no numeric values to derive bins from")?;

    let mut edges = vec![min];
    for i in 1..=MAX_DERIVED_BINS {
        let edge = min + width * i as f64;
        edges.push(edge);
        if edge >= max {
            return Ok(edges);
        }
    }
    Err(format!("width {width} yields more than {MAX_DERIVED_BINS} bins"))
}

fn bucket_labels(edges: &[f64], labels: Option<&[String]>) -> Result<Vec<String>, String> {
    let n = edges.len() - 1;
    match labels {
        Some(labels) if labels.len() == n => Ok(labels.to_vec()),
        Some(labels) => Err(format!(
            "{} labels given for {n} bins",
            labels.len()
        )),
        None => Ok(edges
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                let close = if i + 1 == n { ']' } else { ')' };
                format!("[{}, {}{close}", w[0], w[1])
            })
            .collect()),
    }
}

/// Index of the half-open bin `[edges[i], edges[i + 1])` holding `v`; the last bin also holds
/// its upper edge.
fn bucket_index(edges: &[f64], v: f64) -> Option<usize> {
    let last = *edges.last()?;
    if v.is_nan() || v < edges[0] || v > last {
        return None;
    }
    let i = edges.partition_point(|&e| e <= v) - 1;
    Some(i.min(edges.len() - 2))
}

/// Resolve the numeric columns a transform applies to.
///
/// Explicit names are checked one by one; without names every `Number` column is used.
fn numeric_targets(ds: &DataSet, fields: Option<&[String]>, on_skip: SkipSink<'_>) -> Vec<usize> {
    let names = match fields.filter(|f| !f.is_empty()) {
        Some(names) => names.to_vec(),
        None => ds.schema.numeric_field_names(),
    };
    let mut out = Vec::with_capacity(names.len());
    for name in &names {
        let Some(idx) = ds.schema.index_of(name) else {
            on_skip(SkipReason::UnknownField { field: name.clone() });
            continue;
        };
        if let Err(e) = check_numeric(ds.column(idx)) {
            on_skip(SkipReason::TypeCoercionFailure {
                field: name.clone(),
                message: e.to_string(),
            });
            continue;
        }
        if !out.contains(&idx) {
            out.push(idx);
        }
    }
    out
}

/// Rewrite every non-null cell of a checked numeric column.
fn map_numeric<F>(ds: &mut DataSet, idx: usize, mut f: F)
where
    F: FnMut(f64) -> f64,
{
    for row in &mut ds.rows {
        if let Ok(v) = row[idx].as_number() {
            row[idx] = Value::Number(f(v));
        }
    }
    ds.schema.fields[idx].data_type = DataType::Number;
}

fn round(ds: &mut DataSet, spec: &RoundingSpec, on_skip: SkipSink<'_>) {
    let nearest = spec.nearest();
    if !(nearest.is_finite() && nearest > 0.0) {
        on_skip(SkipReason::TypeCoercionFailure {
            field: "rounding.nearest".to_string(),
            message: format!("nearest must be a positive number, got {nearest}"),
        });
        return;
    }
    for idx in numeric_targets(ds, spec.fields.as_deref(), on_skip) {
        map_numeric(ds, idx, |v| (v / nearest).round_ties_even() * nearest);
    }
}

fn jitter<R: Rng + ?Sized>(ds: &mut DataSet, spec: &JitterSpec, rng: &mut R, on_skip: SkipSink<'_>) {
    let half_width = spec.percent() / 100.0;
    if !half_width.is_finite() {
        on_skip(SkipReason::TypeCoercionFailure {
            field: "jitter.percent".to_string(),
            message: format!("percent must be finite, got {}", spec.percent()),
        });
        return;
    }
    for idx in numeric_targets(ds, spec.fields.as_deref(), on_skip) {
        map_numeric(ds, idx, |v| v * (1.0 + sample_symmetric_uniform(rng, half_width)));
    }
}

fn dp_noise<R: Rng + ?Sized>(ds: &mut DataSet, spec: &DpNoiseSpec, rng: &mut R, on_skip: SkipSink<'_>) {
    let scale = spec.scale();
    if !(scale.is_finite() && scale >= 0.0) {
        on_skip(SkipReason::TypeCoercionFailure {
            field: "dpNoise.scale".to_string(),
            message: format!("scale must be a non-negative number, got {scale}"),
        });
        return;
    }
    for idx in numeric_targets(ds, spec.fields.as_deref(), on_skip) {
        map_numeric(ds, idx, |v| v + sample_laplace(rng, scale));
    }
}

fn k_anonymize(ds: &mut DataSet, spec: &KAnonymitySpec, on_skip: SkipSink<'_>) {
    let mut qis: Vec<usize> = Vec::with_capacity(spec.quasi_identifiers.len());
    for name in &spec.quasi_identifiers {
        match ds.schema.index_of(name) {
            Some(idx) if !qis.contains(&idx) => qis.push(idx),
            Some(_) => {}
            None => on_skip(SkipReason::UnknownField { field: name.clone() }),
        }
    }
    if qis.is_empty() {
        return;
    }

    let keys: Vec<Vec<GroupKey>> = ds
        .rows
        .iter()
        .map(|row| qis.iter().map(|&i| GroupKey::from(&row[i])).collect())
        .collect();
    let mut sizes: HashMap<&[GroupKey], usize> = HashMap::new();
    for key in &keys {
        *sizes.entry(key.as_slice()).or_default() += 1;
    }

    let k = spec.k();
    let mut suppressed_any = false;
    for (row, key) in ds.rows.iter_mut().zip(&keys) {
        if sizes[key.as_slice()] < k {
            row.iter_mut().for_each(|c| *c = Value::text(SUPPRESSED));
            suppressed_any = true;
        }
    }
    if suppressed_any {
        for field in &mut ds.schema.fields {
            field.data_type = DataType::Text;
        }
    }
}
