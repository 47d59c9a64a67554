//! JSON ingestion implementation.
//!
//! Supported inputs:
//! - A JSON array of objects: `[{"a":1}, {"a":2}]`
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`
//!
//! Nested fields are supported using dot paths in schema field names (e.g. `user.name`).
//! Keys absent from a record read as null.

use std::fs;
use std::path::Path;

use serde_json::Map;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{parse_timestamp, DataSet, DataType, Field, Schema, Value};

/// Ingest JSON into an in-memory `DataSet`.
pub fn ingest_json_from_path(path: impl AsRef<Path>, schema: &Schema) -> IngestionResult<DataSet> {
    let text = fs::read_to_string(path)?;
    ingest_json_from_str(&text, schema)
}

/// Ingest JSON from an in-memory string into a [`DataSet`].
pub fn ingest_json_from_str(input: &str, schema: &Schema) -> IngestionResult<DataSet> {
    let records = parse_records(input)?;
    build_dataset(&records, schema)
}

/// Ingest JSON, inferring columns from the top-level keys (first-seen order) and types from the
/// values.
pub fn infer_json_from_path(path: impl AsRef<Path>) -> IngestionResult<DataSet> {
    let text = fs::read_to_string(path)?;
    infer_json_from_str(&text)
}

/// See [`infer_json_from_path`].
pub fn infer_json_from_str(input: &str) -> IngestionResult<DataSet> {
    let records = parse_records(input)?;

    let mut names: Vec<String> = Vec::new();
    for obj in &records {
        for key in obj.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }
    let fields = names
        .into_iter()
        .map(|name| {
            let data_type = infer_json_type(records.iter().filter_map(|obj| obj.get(&name)));
            Field::new(name, data_type)
        })
        .collect();
    build_dataset(&records, &Schema::new(fields))
}

fn infer_json_type<'a, I>(values: I) -> DataType
where
    I: Iterator<Item = &'a serde_json::Value>,
{
    let mut number = true;
    let mut timestamp = true;
    let mut seen = false;
    for v in values.filter(|v| !v.is_null()) {
        seen = true;
        number = number && v.is_number();
        timestamp = timestamp && v.as_str().and_then(parse_timestamp).is_some();
    }
    match (seen, number, timestamp) {
        (true, true, _) => DataType::Number,
        (true, false, true) => DataType::Timestamp,
        _ => DataType::Text,
    }
}

fn parse_records(input: &str) -> IngestionResult<Vec<Map<String, serde_json::Value>>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(IngestionError::SchemaMismatch {
            message: "json input is empty".to_string(),
        });
    }

    // First try parsing as a single JSON value (array or object).
    let values = if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        match v {
            serde_json::Value::Array(items) => items,
            serde_json::Value::Object(_) => vec![v],
            _ => {
                return Err(IngestionError::SchemaMismatch {
                    message: "json must be an object, an array of objects, or NDJSON".to_string(),
                });
            }
        }
    } else {
        // Fall back to NDJSON.
        let mut values = Vec::new();
        for (i, line) in trimmed.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let v = serde_json::from_str::<serde_json::Value>(line).map_err(|e| {
                IngestionError::SchemaMismatch {
                    message: format!("invalid ndjson at line {}: {}", i + 1, e),
                }
            })?;
            values.push(v);
        }
        values
    };

    values
        .into_iter()
        .enumerate()
        .map(|(idx0, v)| match v {
            serde_json::Value::Object(obj) => Ok(obj),
            _ => Err(IngestionError::SchemaMismatch {
                message: format!("row {} is not a json object", idx0 + 1),
            }),
        })
        .collect()
}

fn build_dataset(records: &[Map<String, serde_json::Value>], schema: &Schema) -> IngestionResult<DataSet> {
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(records.len());
    for (idx0, obj) in records.iter().enumerate() {
        let row_num = idx0 + 1;
        let mut row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            let cell = match get_by_dot_path(obj, &field.name) {
                Some(jv) => convert_json_value(row_num, &field.name, field.data_type, jv)?,
                None => Value::Null,
            };
            row.push(cell);
        }
        rows.push(row);
    }
    Ok(DataSet::new(schema.clone(), rows))
}

fn get_by_dot_path<'a>(
    obj: &'a Map<String, serde_json::Value>,
    path: &str,
) -> Option<&'a serde_json::Value> {
    // Exact key wins, so flat keys containing dots still resolve.
    if let Some(v) = obj.get(path) {
        return Some(v);
    }
    let mut parts = path.split('.');
    let mut cur = obj.get(parts.next()?)?;
    for part in parts {
        cur = cur.as_object()?.get(part)?;
    }
    Some(cur)
}

fn convert_json_value(
    row: usize,
    column: &str,
    data_type: DataType,
    v: &serde_json::Value,
) -> IngestionResult<Value> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    let parse_error = |message: &str| IngestionError::ParseError {
        row,
        column: column.to_string(),
        raw: v.to_string(),
        message: message.to_string(),
    };
    match data_type {
        DataType::Text => Ok(match v {
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }),
        DataType::Number => match v {
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).ok_or_else(|| parse_error("expected number")),
            serde_json::Value::Bool(b) => Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
            serde_json::Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| parse_error("expected number")),
            _ => Err(parse_error("expected number")),
        },
        DataType::Timestamp => v
            .as_str()
            .and_then(parse_timestamp)
            .map(Value::Timestamp)
            .ok_or_else(|| parse_error("expected a date or date-time string")),
    }
}

#[cfg(test)]
mod tests {
    use super::{infer_json_from_str, ingest_json_from_str};
    use crate::types::{DataType, Field, Schema, Value};

    #[test]
    fn nested_paths_and_missing_keys() {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Number),
            Field::new("user.name", DataType::Text),
        ]);
        let ds = ingest_json_from_str(
            r#"[{"id": 1, "user": {"name": "Ada"}}, {"id": 2}]"#,
            &schema,
        )
        .unwrap();
        assert_eq!(ds.rows[0], vec![Value::Number(1.0), Value::text("Ada")]);
        assert_eq!(ds.rows[1], vec![Value::Number(2.0), Value::Null]);
    }

    #[test]
    fn ndjson_with_inferred_types() {
        let ds = infer_json_from_str(
            "{\"day\": \"2024-01-01\", \"amt\": 10}\n{\"day\": \"2024-01-02\", \"amt\": null, \"note\": \"x\"}\n",
        )
        .unwrap();
        assert_eq!(ds.column_names(), vec!["day", "amt", "note"]);
        let types: Vec<DataType> = ds.schema.fields.iter().map(|f| f.data_type).collect();
        assert_eq!(types, vec![DataType::Timestamp, DataType::Number, DataType::Text]);
        assert_eq!(ds.rows[0][2], Value::Null);
    }

    #[test]
    fn type_mismatch_reports_row_and_column() {
        let schema = Schema::new(vec![Field::new("id", DataType::Number)]);
        let err = ingest_json_from_str(r#"[{"id": "abc"}]"#, &schema).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("row 1"));
        assert!(msg.contains("column 'id'"));
    }
}
