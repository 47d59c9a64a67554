//! Core data model types.
//!
//! Loaders produce an in-memory [`DataSet`] described by a [`Schema`] (a list of typed
//! [`Field`]s). Every pipeline stage consumes a `&DataSet` and returns a new one.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::CoercionError;

/// Logical data type for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// 64-bit floating point number.
    Number,
    /// UTF-8 string. Also used for columns holding opaque labels or suppressed cells.
    Text,
    /// Date/time without timezone.
    Timestamp,
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// A list of fields describing the shape of a [`DataSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Names of every [`DataType::Number`] field, in schema order.
    pub fn numeric_field_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.data_type == DataType::Number)
            .map(|f| f.name.clone())
            .collect()
    }
}

/// A single cell in a [`DataSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit float.
    Number(f64),
    /// UTF-8 string.
    Text(String),
    /// Date/time without timezone.
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Shorthand for `Value::Text(s.into())`.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Coerce to a number. Text is trimmed and parsed; timestamps and nulls do not coerce.
    pub fn as_number(&self) -> Result<f64, CoercionError> {
        match self {
            Self::Number(v) => Ok(*v),
            Self::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| CoercionError::new(self, "number")),
            _ => Err(CoercionError::new(self, "number")),
        }
    }

    /// Coerce to a timestamp using [`parse_timestamp`] for text cells.
    pub fn as_timestamp(&self) -> Result<NaiveDateTime, CoercionError> {
        match self {
            Self::Timestamp(ts) => Ok(*ts),
            Self::Text(s) => parse_timestamp(s).ok_or_else(|| CoercionError::new(self, "timestamp")),
            _ => Err(CoercionError::new(self, "timestamp")),
        }
    }

    /// String rendering of the cell; `None` for nulls.
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Number(v) => Some(v.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Timestamp(ts) => Some(format_timestamp(ts)),
        }
    }

    /// Convert a JSON literal (as found in rule documents) into a cell.
    ///
    /// Booleans map to `1`/`0`. Arrays and objects have no cell representation and return `None`.
    pub fn from_json(v: &serde_json::Value) -> Option<Self> {
        match v {
            serde_json::Value::Null => Some(Self::Null),
            serde_json::Value::Bool(b) => Some(Self::Number(if *b { 1.0 } else { 0.0 })),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// Convert the cell into a JSON value for export.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Number(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Timestamp(ts) => serde_json::Value::String(format_timestamp(ts)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render() {
            Some(s) => f.write_str(&s),
            None => f.write_str("null"),
        }
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Parse a timestamp from text.
///
/// Accepts plain dates (`2024-01-31`, `2024/01/31`), date-times with a space or `T` separator
/// (optionally with fractional seconds) and RFC 3339 strings (converted to UTC).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc())
}

/// Render a timestamp as `YYYY-MM-DD` at midnight, `YYYY-MM-DD HH:MM:SS` otherwise.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    if ts.time() == NaiveTime::MIN {
        ts.format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Hashable, totally ordered projection of a [`Value`] used as a grouping key.
///
/// `Null` is a valid key. Ordering is numbers < timestamps < text < null, so a null group sorts
/// last.
#[derive(Debug, Clone)]
pub enum GroupKey {
    /// Numeric key (`-0.0` normalizes to `0.0`, every NaN is the same key).
    Number(f64),
    /// Timestamp key.
    Timestamp(NaiveDateTime),
    /// Text key.
    Text(String),
    /// Null key.
    Null,
}

impl GroupKey {
    fn rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Timestamp(_) => 1,
            Self::Text(_) => 2,
            Self::Null => 3,
        }
    }

    fn normalized_bits(v: f64) -> u64 {
        if v == 0.0 {
            0.0f64.to_bits()
        } else if v.is_nan() {
            f64::NAN.to_bits()
        } else {
            v.to_bits()
        }
    }

    /// Convert back into a cell.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Number(v) => Value::Number(*v),
            Self::Timestamp(ts) => Value::Timestamp(*ts),
            Self::Text(s) => Value::Text(s.clone()),
            Self::Null => Value::Null,
        }
    }
}

impl From<&Value> for GroupKey {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => Self::Null,
            Value::Number(n) => Self::Number(*n),
            Value::Text(s) => Self::Text(s.clone()),
            Value::Timestamp(ts) => Self::Timestamp(*ts),
        }
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Number(v) => Self::normalized_bits(*v).hash(state),
            Self::Timestamp(ts) => ts.hash(state),
            Self::Text(s) => s.hash(state),
            Self::Null => {}
        }
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => {
                let a = f64::from_bits(Self::normalized_bits(*a));
                let b = f64::from_bits(Self::normalized_bits(*b));
                a.total_cmp(&b)
            }
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// In-memory tabular dataset.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields. Every row
/// holds exactly one cell per field; missing values are [`Value::Null`].
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Create a dataset from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Column names in schema order.
    pub fn column_names(&self) -> Vec<String> {
        self.schema.field_names().map(str::to_owned).collect()
    }

    /// Iterate the cells of column `idx`, top to bottom.
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().filter_map(move |row| row.get(idx))
    }

    /// A copy holding at most the first `n` rows.
    pub fn head(&self, n: usize) -> Self {
        Self {
            schema: self.schema.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Create a new dataset containing only rows that match `predicate`.
    ///
    /// The returned dataset preserves the original schema.
    pub fn filter_rows<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&[Value]) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|row| predicate(row.as_slice()))
            .cloned()
            .collect();
        Self {
            schema: self.schema.clone(),
            rows,
        }
    }

    /// Keep only the columns at `indices`, in that order.
    pub fn project(&self, indices: &[usize]) -> Self {
        let fields = indices
            .iter()
            .map(|&i| self.schema.fields[i].clone())
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Self {
            schema: Schema::new(fields),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_timestamp, DataSet, DataType, Field, GroupKey, Schema, Value};
    use chrono::NaiveDate;

    #[test]
    fn parse_timestamp_accepts_common_layouts() {
        let midnight = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-01-02"), Some(midnight));
        assert_eq!(parse_timestamp("2024/01/02"), Some(midnight));
        assert_eq!(parse_timestamp(" 2024-01-02T00:00:00 "), Some(midnight));
        assert_eq!(parse_timestamp("2024-01-02 00:00:00.000"), Some(midnight));
        assert_eq!(parse_timestamp("2024-01-02T01:00:00+01:00"), Some(midnight));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn coercions_report_failures_instead_of_panicking() {
        assert_eq!(Value::text(" 4.5 ").as_number().unwrap(), 4.5);
        assert!(Value::text("abc").as_number().is_err());
        assert!(Value::Null.as_number().is_err());
        assert!(Value::Number(3.0).as_timestamp().is_err());
        assert!(Value::text("2024-03-01").as_timestamp().is_ok());
    }

    #[test]
    fn render_drops_trailing_zero_fraction() {
        assert_eq!(Value::Number(10.0).render().as_deref(), Some("10"));
        assert_eq!(Value::Number(2.5).render().as_deref(), Some("2.5"));
        assert_eq!(Value::Null.render(), None);
        let ts = parse_timestamp("2024-05-06 07:08:09").unwrap();
        assert_eq!(Value::Timestamp(ts).render().as_deref(), Some("2024-05-06 07:08:09"));
    }

    #[test]
    fn group_keys_sort_null_last_and_merge_signed_zero() {
        let mut keys = vec![
            GroupKey::Null,
            GroupKey::Text("b".into()),
            GroupKey::Number(2.0),
            GroupKey::Text("a".into()),
            GroupKey::Number(-1.0),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                GroupKey::Number(-1.0),
                GroupKey::Number(2.0),
                GroupKey::Text("a".into()),
                GroupKey::Text("b".into()),
                GroupKey::Null,
            ]
        );
        assert_eq!(GroupKey::Number(0.0), GroupKey::Number(-0.0));
    }

    #[test]
    fn project_reorders_columns() {
        let ds = DataSet::new(
            Schema::new(vec![
                Field::new("a", DataType::Number),
                Field::new("b", DataType::Text),
            ]),
            vec![vec![Value::Number(1.0), Value::text("x")]],
        );
        let out = ds.project(&[1, 0]);
        assert_eq!(out.column_names(), vec!["b", "a"]);
        assert_eq!(out.rows[0], vec![Value::text("x"), Value::Number(1.0)]);
    }
}
