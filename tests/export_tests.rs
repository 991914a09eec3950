use chrono::{DateTime, Utc};

use research_monitor::report::analytics::Analytics;
use research_monitor::report::export::{
    CSV_HEADER, FORMAT_VERSION, build_document, to_csv, to_json, write_export,
};
use research_monitor::report::{ExportDocument, ExportFormat};
use research_monitor::task::types::{Citation, ResultPayload, Source};

// ─── Helpers ──────────────────────────────────────────────────────────

fn payload() -> ResultPayload {
    ResultPayload {
        task_id: "task-42".to_string(),
        query: "AI in diagnostics".to_string(),
        report: "## Findings\n\nImaging models now match specialists.".to_string(),
        sources_used: vec![
            Source {
                title: "Deep learning for radiology".to_string(),
                url: "https://example.org/radiology".to_string(),
                snippet: "CNNs, \"at scale\"".to_string(),
                relevance_score: 0.92,
                date: Some("2025-10-01".to_string()),
            },
            Source {
                title: "Triage trial".to_string(),
                url: "https://example.org/triage".to_string(),
                snippet: "Prospective".to_string(),
                relevance_score: 0.4,
                date: None,
            },
        ],
        citations: vec![
            Citation {
                index: 1,
                title: "Deep learning for radiology".to_string(),
                url: "https://example.org/radiology".to_string(),
                times_cited: 4,
            },
            Citation {
                index: 2,
                title: "Triage trial".to_string(),
                url: "https://example.org/triage".to_string(),
                times_cited: 1,
            },
        ],
        total_tokens_used: 18_450,
        execution_time_seconds: 154.0,
        agent_count: 3,
        created_at: "2026-03-01T12:00:00Z".parse().unwrap(),
    }
}

fn exported_at() -> DateTime<Utc> {
    "2026-03-01T12:05:00Z".parse().unwrap()
}

// ============================================================
// JSON
// ============================================================

#[test]
fn test_json_round_trips_payload_and_analytics() {
    let payload = payload();
    let analytics = Analytics::from_payload(&payload);

    let json = to_json(&payload, &analytics, "AI in diagnostics").unwrap();
    let doc: ExportDocument = serde_json::from_str(&json).unwrap();

    assert_eq!(doc.result, payload);
    assert_eq!(doc.analytics, analytics);
    assert_eq!(doc.metadata.query, "AI in diagnostics");
    assert_eq!(doc.metadata.format_version, FORMAT_VERSION);
    assert!(doc.metadata.generator.starts_with("research-monitor"));
}

#[test]
fn test_json_analytics_values() {
    let payload = payload();
    let analytics = Analytics::from_payload(&payload);
    let doc = build_document(&payload, &analytics, &payload.query, exported_at());
    let value = serde_json::to_value(&doc).unwrap();

    assert_eq!(value["analytics"]["average_relevance"], 66);
    assert_eq!(value["analytics"]["quality"]["high"], 1);
    assert_eq!(value["analytics"]["quality"]["low"], 1);
    assert_eq!(value["analytics"]["citations"]["unique"], 2);
    assert_eq!(value["analytics"]["citations"]["most_cited"]["index"], 1);
    assert_eq!(value["analytics"]["execution_time"], "2m 34s");
    assert_eq!(value["metadata"]["exported_at"], "2026-03-01T12:05:00Z");
}

// ============================================================
// CSV
// ============================================================

#[test]
fn test_csv_has_one_row_per_source() {
    let csv = to_csv(&payload().sources_used).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(
        lines[1],
        r#""Deep learning for radiology","https://example.org/radiology","0.92","2025-10-01","CNNs, ""at scale""""#
    );
    assert_eq!(
        lines[2],
        r#""Triage trial","https://example.org/triage","0.40","","Prospective""#
    );
    assert!(!csv.contains("Imaging models"), "CSV carries no report text");
}

#[test]
fn test_csv_without_sources_is_absent() {
    let mut payload = payload();
    payload.sources_used.clear();
    assert!(to_csv(&payload.sources_used).is_none());
}

// ============================================================
// Writing to disk
// ============================================================

#[test]
fn test_write_export_creates_named_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("exports");
    let payload = payload();
    let analytics = Analytics::from_payload(&payload);

    let path = write_export(&out, &payload, &analytics, &payload.query, ExportFormat::Json)
        .unwrap()
        .expect("json always writes");

    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("research-ai-in-diagnostics-"));
    assert!(name.ends_with(".json"));
    let doc: ExportDocument =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(doc.result.task_id, "task-42");
}

#[test]
fn test_write_csv_export_skips_empty_sources() {
    let dir = tempfile::tempdir().unwrap();
    let mut payload = payload();
    payload.sources_used.clear();
    let analytics = Analytics::from_payload(&payload);

    let written = write_export(dir.path(), &payload, &analytics, &payload.query, ExportFormat::Csv)
        .unwrap();

    assert!(written.is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
