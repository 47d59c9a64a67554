//! CSV ingestion implementation.

use std::path::Path;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{parse_timestamp, DataSet, DataType, Field, Schema, Value};

/// Raw tokens read as a missing value (after trimming).
pub const NULL_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

fn is_null_token(raw: &str) -> bool {
    NULL_TOKENS.contains(&raw.trim())
}

/// Ingest a CSV file into an in-memory [`DataSet`] using a known schema.
///
/// Rules:
///
/// - CSV must have headers.
/// - Headers must contain all schema fields (order can differ).
/// - Each value is parsed according to the schema field type.
/// - Records shorter than the header read as null in the missing columns.
pub fn ingest_csv_from_path(path: impl AsRef<Path>, schema: &Schema) -> IngestionResult<DataSet> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    ingest_csv_from_reader(&mut rdr, schema)
}

/// Ingest CSV data from an existing CSV reader using a known schema.
///
/// Build the reader with `flexible(true)` for short records to be padded with nulls; a strict
/// reader rejects them with a [`csv::Error`].
pub fn ingest_csv_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    schema: &Schema,
) -> IngestionResult<DataSet> {
    let headers = rdr.headers()?.clone();

    // Map schema fields -> CSV column indexes (allows re-ordered CSV columns).
    let mut col_idxs = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        match headers.iter().position(|h| h == field.name) {
            Some(idx) => col_idxs.push(idx),
            None => {
                return Err(IngestionError::SchemaMismatch {
                    message: format!(
                        "missing required column '{field}'. headers={:?}",
                        headers.iter().collect::<Vec<_>>(),
                        field = field.name
                    ),
                });
            }
        }
    }

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (row_idx0, result) in rdr.records().enumerate() {
        // Report 1-based row number for users; +1 again because header is row 1.
        let user_row = row_idx0 + 2;
        let record = result?;

        let mut row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for (field, &csv_idx) in schema.fields.iter().zip(col_idxs.iter()) {
            let raw = record.get(csv_idx).unwrap_or("");
            row.push(parse_typed_value(user_row, &field.name, field.data_type, raw)?);
        }
        rows.push(row);
    }

    Ok(DataSet::new(schema.clone(), rows))
}

/// Ingest a CSV file, inferring each column's type from its values.
///
/// See [`infer_csv_from_reader`].
pub fn infer_csv_from_path(path: impl AsRef<Path>) -> IngestionResult<DataSet> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    infer_csv_from_reader(&mut rdr)
}

/// Ingest CSV data, inferring each column's type from its values.
///
/// A column is [`DataType::Number`] if every non-null cell parses as a number, otherwise
/// [`DataType::Timestamp`] if every non-null cell parses as a timestamp, otherwise
/// [`DataType::Text`]. A column with no values at all is text.
///
/// Short records are padded with nulls when the reader is built with `flexible(true)`, as
/// [`infer_csv_from_path`] does; a strict reader rejects them with a [`csv::Error`].
pub fn infer_csv_from_reader<R: std::io::Read>(rdr: &mut csv::Reader<R>) -> IngestionResult<DataSet> {
    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Err(IngestionError::SchemaMismatch {
            message: "csv has no header row".to_string(),
        });
    }
    for (i, h) in headers.iter().enumerate() {
        if headers.iter().take(i).any(|prev| prev == h) {
            return Err(IngestionError::SchemaMismatch {
                message: format!("duplicate column '{h}'"),
            });
        }
    }

    let records = rdr.records().collect::<Result<Vec<_>, _>>()?;
    let fields: Vec<Field> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let cells = records.iter().map(|r| r.get(idx).unwrap_or(""));
            Field::new(name, infer_data_type(cells))
        })
        .collect();

    let mut rows = Vec::with_capacity(records.len());
    for (row_idx0, record) in records.iter().enumerate() {
        let user_row = row_idx0 + 2;
        let mut row = Vec::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            let raw = record.get(idx).unwrap_or("");
            row.push(parse_typed_value(user_row, &field.name, field.data_type, raw)?);
        }
        rows.push(row);
    }

    Ok(DataSet::new(Schema::new(fields), rows))
}

/// Pick the narrowest type that reads every non-null raw cell.
pub fn infer_data_type<'a, I>(cells: I) -> DataType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut number = true;
    let mut timestamp = true;
    let mut seen = false;
    for raw in cells.into_iter().filter(|c| !is_null_token(c)) {
        seen = true;
        number = number && raw.trim().parse::<f64>().is_ok();
        timestamp = timestamp && parse_timestamp(raw).is_some();
        if !number && !timestamp {
            return DataType::Text;
        }
    }
    match (seen, number, timestamp) {
        (true, true, _) => DataType::Number,
        (true, false, true) => DataType::Timestamp,
        _ => DataType::Text,
    }
}

fn parse_typed_value(
    row: usize,
    column: &str,
    data_type: DataType,
    raw: &str,
) -> IngestionResult<Value> {
    if is_null_token(raw) {
        return Ok(Value::Null);
    }
    let trimmed = raw.trim();
    let parse_error = |message: String| IngestionError::ParseError {
        row,
        column: column.to_owned(),
        raw: raw.to_owned(),
        message,
    };

    match data_type {
        DataType::Text => Ok(Value::Text(trimmed.to_owned())),
        DataType::Number => trimmed
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|e| parse_error(e.to_string())),
        DataType::Timestamp => parse_timestamp(trimmed)
            .map(Value::Timestamp)
            .ok_or_else(|| parse_error("expected a date or date-time".to_string())),
    }
}
