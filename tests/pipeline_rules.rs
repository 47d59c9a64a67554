use std::sync::{Arc, Mutex};

use consent_pipeline::export::{to_csv_string, to_json_string};
use consent_pipeline::ingestion::csv::infer_csv_from_path;
use consent_pipeline::pipeline::{Pipeline, PipelineObserver, PipelineOptions, Stage};
use consent_pipeline::processing::SUPPRESSED;
use consent_pipeline::rule::Rule;
use consent_pipeline::types::{parse_timestamp, DataSet, DataType, Field, Schema, Value};
use consent_pipeline::{run, SkipReason};
use serde_json::json;

fn rule(v: serde_json::Value) -> Rule {
    Rule::from_value(v).unwrap()
}

fn people() -> DataSet {
    DataSet::new(
        Schema::new(vec![
            Field::new("age", DataType::Number),
            Field::new("city", DataType::Text),
        ]),
        vec![
            vec![Value::Number(25.0), Value::text("X")],
            vec![Value::Number(31.0), Value::text("X")],
            vec![Value::Number(30.0), Value::text("X")],
            vec![Value::Number(52.0), Value::text("Y")],
        ],
    )
}

#[derive(Default)]
struct SkipRecorder {
    skips: Mutex<Vec<(Stage, SkipReason)>>,
}

impl PipelineObserver for SkipRecorder {
    fn on_skip(&self, stage: Stage, reason: &SkipReason) {
        self.skips.lock().unwrap().push((stage, reason.clone()));
    }
}

#[test]
fn empty_rule_is_identity() {
    let ds = people();
    assert_eq!(run(&ds, &Rule::default()), ds);
    assert_eq!(run(&ds, &rule(json!({"filters": [], "fields": [], "aggregations": []}))), ds);
}

#[test]
fn filter_keeps_matching_rows_in_order() {
    let out = run(&people(), &rule(json!({"filters": [{"field": "age", "op": "gt", "value": 30}]})));
    assert_eq!(
        out.rows,
        vec![
            vec![Value::Number(31.0), Value::text("X")],
            vec![Value::Number(52.0), Value::text("Y")],
        ]
    );
}

#[test]
fn group_by_day_sums_amounts() {
    let ds = DataSet::new(
        Schema::new(vec![
            Field::new("day", DataType::Text),
            Field::new("amt", DataType::Number),
        ]),
        vec![
            vec![Value::text("2024-01-01"), Value::Number(10.0)],
            vec![Value::text("2024-01-02"), Value::Number(5.0)],
            vec![Value::text("2024-01-01"), Value::Number(3.0)],
        ],
    );
    let out = run(
        &ds,
        &rule(json!({
            "aggregations": [{"op": "groupByDay", "dateField": "day", "aggs": [{"field": "amt", "op": "sum"}]}]
        })),
    );

    assert_eq!(out.column_names(), vec!["day_day", "amt_sum"]);
    let day = |s: &str| Value::Timestamp(parse_timestamp(s).unwrap());
    assert_eq!(
        out.rows,
        vec![
            vec![day("2024-01-01"), Value::Number(13.0)],
            vec![day("2024-01-02"), Value::Number(5.0)],
        ]
    );
}

#[test]
fn k_anonymity_suppresses_small_groups_whole() {
    let ds = people();
    let out = run(&ds, &rule(json!({"obfuscation": {"kAnonymity": {"k": 2, "quasiIdentifiers": ["city"]}}})));

    assert_eq!(out.rows[..3], ds.rows[..3]);
    assert_eq!(out.rows[3], vec![Value::text(SUPPRESSED); 2]);
}

#[test]
fn drop_pii_removes_email_keeps_amount() {
    let ds = DataSet::new(
        Schema::new(vec![
            Field::new("email", DataType::Text),
            Field::new("amount", DataType::Number),
        ]),
        vec![vec![Value::text("a@example.com"), Value::Number(9.5)]],
    );
    let out = run(&ds, &rule(json!({"obfuscation": {"dropPII": true}})));
    assert_eq!(out.column_names(), vec!["amount"]);
    assert_eq!(out.rows, vec![vec![Value::Number(9.5)]]);
}

#[test]
fn bad_specs_are_skipped_and_reported() {
    let recorder = Arc::new(SkipRecorder::default());
    let pipeline = Pipeline::new(PipelineOptions {
        observer: Some(recorder.clone()),
        ..Default::default()
    });
    let out = pipeline.run(
        &people(),
        &rule(json!({
            "filters": [
                {"field": "age", "op": "matches", "value": 1},
                {"field": "age", "op": "between", "value": ["young", "old"]}
            ],
            "aggregations": [{"op": "median", "field": "age"}]
        })),
    );

    assert_eq!(out, people());
    let skips = recorder.skips.lock().unwrap();
    assert_eq!(skips.len(), 3);
    assert_eq!(
        skips[0],
        (Stage::Filter, SkipReason::UnsupportedOperator { op: "matches".into() })
    );
    assert!(matches!(skips[1], (Stage::Filter, SkipReason::TypeCoercionFailure { .. })));
    assert_eq!(
        skips[2],
        (Stage::Aggregate, SkipReason::UnsupportedOperator { op: "median".into() })
    );
}

#[test]
fn ingested_fixture_through_full_rule_and_export() {
    let ds = infer_csv_from_path("tests/fixtures/customers.csv").unwrap();
    let pipeline = Pipeline::new(PipelineOptions {
        seed: Some(3),
        ..Default::default()
    });
    let out = pipeline.run(
        &ds,
        &rule(json!({
            "fields": ["email", "age", "city", "amount"],
            "filters": [{"field": "age", "op": "between", "value": 30, "value2": 70}],
            "obfuscation": {
                "dropPII": true,
                "bucketing": {"field": "age", "bins": [0, 40, 100], "labels": ["young", "old"]},
                "rounding": {"nearest": 10, "fields": ["amount"]}
            }
        })),
    );

    assert_eq!(out.column_names(), vec!["age", "city", "amount"]);
    assert_eq!(
        out.rows,
        vec![
            vec![Value::text("young"), Value::text("Oslo"), Value::Number(10.0)],
            vec![Value::text("old"), Value::text("Bergen"), Value::Null],
            vec![Value::text("old"), Value::text("Bergen"), Value::Number(20.0)],
        ]
    );

    let csv = to_csv_string(&out).unwrap();
    assert_eq!(csv, "age,city,amount\nyoung,Oslo,10\nold,Bergen,\nold,Bergen,20\n");

    let json: serde_json::Value = serde_json::from_str(&to_json_string(&out).unwrap()).unwrap();
    assert_eq!(json[1], json!({"age": "old", "city": "Bergen", "amount": null}));
}

#[test]
fn preview_serializes_to_json() {
    let pipeline = Pipeline::new(PipelineOptions {
        preview_rows: 1,
        ..Default::default()
    });
    let preview = pipeline.preview(&people(), &rule(json!({"fields": ["city"]})));
    let v = serde_json::to_value(&preview).unwrap();
    assert_eq!(v, json!({"columns": ["city"], "rows": [{"city": "X"}], "total_rows": 4}));
}
