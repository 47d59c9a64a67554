use chrono::NaiveDate;
use consent_pipeline::ingestion::csv::{
    infer_csv_from_path, infer_csv_from_reader, ingest_csv_from_path, ingest_csv_from_reader,
};
use consent_pipeline::types::{DataType, Field, Schema, Value};

fn customer_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Number),
        Field::new("city", DataType::Text),
        Field::new("amount", DataType::Number),
        Field::new("signup", DataType::Timestamp),
    ])
}

fn midnight(y: i32, m: u32, d: u32) -> Value {
    Value::Timestamp(NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap())
}

#[test]
fn ingest_csv_from_path_happy_path() {
    let ds = ingest_csv_from_path("tests/fixtures/customers.csv", &customer_schema()).unwrap();

    assert_eq!(ds.row_count(), 4);
    assert_eq!(
        ds.rows[0],
        vec![
            Value::Number(1.0),
            Value::text("Oslo"),
            Value::Number(12.4),
            midnight(2024, 1, 3),
        ]
    );
    // "NA" reads as a missing value.
    assert_eq!(ds.rows[2][2], Value::Null);
}

#[test]
fn ingest_csv_allows_reordered_columns() {
    let schema = Schema::new(vec![
        Field::new("id", DataType::Number),
        Field::new("city", DataType::Text),
    ]);
    let input = "city,id\nOslo,1\n";
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());

    let ds = ingest_csv_from_reader(&mut rdr, &schema).unwrap();
    assert_eq!(ds.rows, vec![vec![Value::Number(1.0), Value::text("Oslo")]]);
}

#[test]
fn ingest_csv_errors_on_missing_required_column() {
    let input = "id,city,amount\n1,Oslo,2\n";
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());

    let err = ingest_csv_from_reader(&mut rdr, &customer_schema()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("schema mismatch"));
    assert!(msg.contains("missing required column 'signup'"));
}

#[test]
fn ingest_csv_errors_on_type_parse() {
    let input = "id,city,amount,signup\n1,Oslo,lots,2024-01-01\n";
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());

    let err = ingest_csv_from_reader(&mut rdr, &customer_schema()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("failed to parse value at row 2"));
    assert!(msg.contains("column 'amount'"));
}

#[test]
fn infer_csv_from_path_picks_column_types() {
    let ds = infer_csv_from_path("tests/fixtures/customers.csv").unwrap();

    let types: Vec<(String, DataType)> = ds
        .schema
        .fields
        .iter()
        .map(|f| (f.name.clone(), f.data_type))
        .collect();
    assert_eq!(
        types,
        vec![
            ("id".to_string(), DataType::Number),
            ("name".to_string(), DataType::Text),
            ("email".to_string(), DataType::Text),
            ("age".to_string(), DataType::Number),
            ("city".to_string(), DataType::Text),
            ("amount".to_string(), DataType::Number),
            ("signup".to_string(), DataType::Timestamp),
        ]
    );
    assert_eq!(ds.rows[2][2], Value::Null);
    assert_eq!(
        ds.rows[1][6],
        Value::Timestamp(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap().and_hms_opt(14, 20, 0).unwrap())
    );
}

#[test]
fn infer_csv_rejects_duplicate_headers() {
    let input = "a,b,a\n1,2,3\n";
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());

    let err = infer_csv_from_reader(&mut rdr).unwrap_err();
    assert!(err.to_string().contains("duplicate column 'a'"));
}

#[test]
fn path_loaders_pad_short_records_with_nulls() {
    let path = std::env::temp_dir().join(format!("consent-pipeline-short-{}.csv", std::process::id()));
    std::fs::write(&path, "id,city,amount\n1,Oslo,3.5\n2\n").unwrap();

    let inferred = infer_csv_from_path(&path).unwrap();
    assert_eq!(inferred.rows[1], vec![Value::Number(2.0), Value::Null, Value::Null]);
    assert_eq!(inferred.schema.fields[2].data_type, DataType::Number);

    let schema = Schema::new(vec![
        Field::new("amount", DataType::Number),
        Field::new("id", DataType::Number),
    ]);
    let typed = ingest_csv_from_path(&path, &schema).unwrap();
    assert_eq!(typed.rows[1], vec![Value::Null, Value::Number(2.0)]);

    let _ = std::fs::remove_file(&path);
}
