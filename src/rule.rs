//! Rule documents.
//!
//! A [`Rule`] is the declarative description of one privacy-controlled view: which rows to keep,
//! which columns to expose, how to aggregate, and how to obfuscate. Rules arrive as JSON with
//! camelCase keys; every section is optional and unknown keys are ignored.
//!
//! Operators are kept as raw strings. An unrecognized operator is not a parse error: the stage
//! that owns it skips the spec at run time.
//!
//! ```rust
//! use consent_pipeline::rule::Rule;
//!
//! # fn main() -> Result<(), consent_pipeline::RuleError> {
//! let rule = Rule::from_json(
//!     r#"{
//!         "fields": ["age", "city"],
//!         "filters": [{"field": "age", "op": "gt", "value": 30}],
//!         "obfuscation": {"kAnonymity": {"k": 2, "quasiIdentifiers": ["city"]}}
//!     }"#,
//! )?;
//! assert_eq!(rule.filters.as_ref().map(Vec::len), Some(1));
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// A complete rule document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rule {
    /// Columns to retain, in output order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    /// Row predicates, combined with logical AND.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<FilterSpec>>,
    /// Grouping and reduction specs, processed as one unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Vec<AggregationSpec>>,
    /// Disclosure-control transforms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obfuscation: Option<ObfuscationConfig>,
}

impl Rule {
    /// Parse a rule from a JSON string.
    pub fn from_json(input: &str) -> Result<Self, RuleError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Build a rule from an already parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, RuleError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Returns `true` if no section would change a table.
    pub fn is_empty(&self) -> bool {
        self.fields.as_ref().is_none_or(Vec::is_empty)
            && self.filters.as_ref().is_none_or(Vec::is_empty)
            && self.aggregations.as_ref().is_none_or(Vec::is_empty)
            && self.obfuscation.is_none()
    }
}

/// `{field, op, value, value2?}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSpec {
    /// Column the predicate applies to.
    pub field: String,
    /// Operator name (`gt`, `between`, `rangeDate`, ...).
    pub op: String,
    /// Operand. Lists and objects are meaningful for `between`, `in` and `rangeDate`.
    pub value: serde_json::Value,
    /// Second operand for range-like operators.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value2: Option<serde_json::Value>,
}

impl FilterSpec {
    /// Convenience constructor for single-operand predicates.
    pub fn new(field: impl Into<String>, op: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            field: field.into(),
            op: op.into(),
            value,
            value2: None,
        }
    }
}

/// `{op, field?, dateField?, aggs?}`.
///
/// Grouping ops (`groupByDay`, `groupByMonth`) read `dateField`, falling back to `field`, and may
/// carry nested reductions in `aggs`. Reduction ops (`sum`, `avg`, ...) read `field`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregationSpec {
    /// Operator name.
    pub op: String,
    /// Target column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Date column used by grouping ops.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_field: Option<String>,
    /// Reductions attached to a grouping spec.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggs: Option<Vec<ReductionSpec>>,
}

/// `{field, op}` nested inside a grouping spec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionSpec {
    /// Column to reduce.
    pub field: String,
    /// `sum`, `avg`, `min`, `max` or `count`.
    pub op: String,
}

/// Independently optional obfuscation transforms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObfuscationConfig {
    #[serde(rename = "dropPII", skip_serializing_if = "Option::is_none")]
    pub drop_pii: Option<DropPii>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucketing: Option<OneOrMany<BucketSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rounding: Option<RoundingSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter: Option<JitterSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dp_noise: Option<DpNoiseSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k_anonymity: Option<KAnonymitySpec>,
}

/// `dropPII: true` uses the built-in candidate list; a list names the columns explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DropPii {
    Flag(bool),
    Columns(Vec<String>),
}

/// A config section that accepts either a single object or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    /// View as a slice regardless of shape.
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::Many(items) => items,
            Self::One(item) => std::slice::from_ref(item),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketSpec {
    pub field: String,
    /// Explicit bin edges; takes precedence over `width`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bins: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundingSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearest: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl RoundingSpec {
    pub fn nearest(&self) -> f64 {
        self.nearest.unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl JitterSpec {
    pub fn percent(&self) -> f64 {
        self.percent.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DpNoiseSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl DpNoiseSpec {
    pub fn scale(&self) -> f64 {
        self.scale.unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KAnonymitySpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<f64>,
    pub quasi_identifiers: Vec<String>,
}

impl KAnonymitySpec {
    /// Minimum group size; defaults to 5, fractional values truncate.
    pub fn k(&self) -> usize {
        let k = self.k.unwrap_or(5.0);
        if k.is_finite() && k > 0.0 { k as usize } else { 0 }
    }
}
