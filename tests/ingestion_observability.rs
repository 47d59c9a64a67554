use std::sync::{Arc, Mutex};

use consent_pipeline::ingestion::{
    ingest_from_path, ColumnProfile, IngestionContext, IngestionFormat, IngestionObserver, IngestionOptions,
    IngestionSeverity, IngestionStats, TracingObserver,
};
use consent_pipeline::types::{DataType, Field, Schema};
use consent_pipeline::IngestionError;

#[derive(Default)]
struct RecordingObserver {
    successes: Mutex<Vec<IngestionStats>>,
    failures: Mutex<Vec<IngestionSeverity>>,
    alerts: Mutex<Vec<IngestionSeverity>>,
}

impl IngestionObserver for RecordingObserver {
    fn on_success(&self, _ctx: &IngestionContext, stats: &IngestionStats) {
        self.successes.lock().unwrap().push(stats.clone());
    }

    fn on_failure(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestionError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestionError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

fn schema_missing_col() -> Schema {
    Schema::new(vec![Field::new("definitely_missing", DataType::Text)])
}

fn column(name: &str, data_type: DataType, nulls: usize) -> ColumnProfile {
    ColumnProfile {
        name: name.to_string(),
        data_type,
        nulls,
    }
}

#[test]
fn observer_receives_failure_and_alert_on_critical_io_error() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = IngestionOptions {
        format: Some(IngestionFormat::Csv),
        observer: Some(obs.clone()),
        alert_at_or_above: IngestionSeverity::Critical,
    };

    let _ = ingest_from_path("tests/fixtures/does_not_exist.csv", None, &opts).unwrap_err();

    assert_eq!(*obs.failures.lock().unwrap(), vec![IngestionSeverity::Critical]);
    assert_eq!(*obs.alerts.lock().unwrap(), vec![IngestionSeverity::Critical]);
}

#[test]
fn observer_receives_failure_without_alert_for_schema_mismatch() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = IngestionOptions {
        observer: Some(obs.clone()),
        ..Default::default()
    };

    let _ = ingest_from_path("tests/fixtures/customers.csv", Some(&schema_missing_col()), &opts).unwrap_err();

    assert_eq!(*obs.failures.lock().unwrap(), vec![IngestionSeverity::Error]);
    assert!(obs.alerts.lock().unwrap().is_empty());
}

#[test]
fn success_reports_inferred_column_profile() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = IngestionOptions {
        observer: Some(obs.clone()),
        ..Default::default()
    };

    ingest_from_path("tests/fixtures/customers.csv", None, &opts).unwrap();

    let successes = obs.successes.lock().unwrap();
    assert_eq!(successes.len(), 1);
    let stats = &successes[0];
    assert_eq!(stats.rows, 4);
    assert_eq!(
        stats.columns,
        vec![
            column("id", DataType::Number, 0),
            column("name", DataType::Text, 0),
            column("email", DataType::Text, 1),
            column("age", DataType::Number, 0),
            column("city", DataType::Text, 0),
            column("amount", DataType::Number, 1),
            column("signup", DataType::Timestamp, 0),
        ]
    );
    assert_eq!(stats.pii_columns(), vec!["name", "email"]);
    assert!(stats.empty_columns().is_empty());
}

#[test]
fn tracing_observer_accepts_every_outcome() {
    let opts = IngestionOptions {
        observer: Some(Arc::new(TracingObserver)),
        alert_at_or_above: IngestionSeverity::Error,
        ..Default::default()
    };
    assert_eq!(
        ingest_from_path("tests/fixtures/customers.csv", None, &opts).unwrap().row_count(),
        4
    );
    assert!(ingest_from_path("tests/fixtures/customers.csv", Some(&schema_missing_col()), &opts).is_err());
}
