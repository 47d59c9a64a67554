//! Serialization of a [`DataSet`] for callers.
//!
//! Nulls become empty CSV fields / JSON `null`; timestamps use
//! [`crate::types::format_timestamp`]; non-finite numbers have no JSON form and export as `null`.

use std::io::Write;

use serde_json::{Map, Value as JsonValue};

use crate::error::ExportResult;
use crate::types::DataSet;

/// Write `dataset` as CSV with a header row.
pub fn write_csv<W: Write>(dataset: &DataSet, writer: W) -> ExportResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(dataset.schema.field_names())?;
    for row in &dataset.rows {
        wtr.write_record(row.iter().map(|v| v.render().unwrap_or_default()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Render `dataset` as a CSV string.
pub fn to_csv_string(dataset: &DataSet) -> ExportResult<String> {
    let mut buf = Vec::new();
    write_csv(dataset, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// One JSON object per row, keyed by column name.
pub fn to_json_records(dataset: &DataSet) -> Vec<Map<String, JsonValue>> {
    dataset
        .rows
        .iter()
        .map(|row| {
            dataset
                .schema
                .field_names()
                .zip(row)
                .map(|(name, v)| (name.to_string(), v.to_json()))
                .collect()
        })
        .collect()
}

/// Render `dataset` as a JSON array of records.
pub fn to_json_string(dataset: &DataSet) -> ExportResult<String> {
    Ok(serde_json::to_string(&to_json_records(dataset))?)
}

#[cfg(test)]
mod tests {
    use super::{to_csv_string, to_json_records, to_json_string};
    use crate::types::{parse_timestamp, DataSet, DataType, Field, Schema, Value};
    use serde_json::json;

    fn sample() -> DataSet {
        DataSet::new(
            Schema::new(vec![
                Field::new("day", DataType::Timestamp),
                Field::new("note", DataType::Text),
                Field::new("amt", DataType::Number),
            ]),
            vec![
                vec![
                    Value::Timestamp(parse_timestamp("2024-01-01").unwrap()),
                    Value::text("a, b"),
                    Value::Number(13.0),
                ],
                vec![Value::Null, Value::text("c"), Value::Number(f64::NAN)],
            ],
        )
    }

    #[test]
    fn csv_quotes_and_blanks_nulls() {
        let csv = to_csv_string(&sample()).unwrap();
        assert_eq!(csv, "day,note,amt\n2024-01-01,\"a, b\",13\n,c,NaN\n");
    }

    #[test]
    fn json_records_keep_column_names() {
        let records = to_json_records(&sample());
        assert_eq!(records[0]["day"], json!("2024-01-01"));
        assert_eq!(records[0]["amt"], json!(13.0));
        assert_eq!(records[1]["day"], json!(null));
        assert_eq!(records[1]["amt"], json!(null));
        let text = to_json_string(&sample()).unwrap();
        assert!(text.starts_with("[{"));
    }
}
