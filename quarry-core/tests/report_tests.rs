// Tests for report generation functionality

use quarry_core::report::{
    ReportFormat, generate_markdown_endpoints, generate_markdown_results,
    generate_text_endpoints, generate_text_results, render_endpoints, render_results,
    save_report,
};
use quarry_scanner::{Endpoint, EndpointSource, Metadata, ProbeResult};
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

fn probe(url: &str, method: &str, status: u16) -> ProbeResult {
    let mut result = ProbeResult::new(url.to_string(), method.to_string());
    result.status_code = status;
    result.size = 42;
    result
}

fn sample_results() -> Vec<ProbeResult> {
    let mut admin = probe("http://example.com/admin", "GET", 200);
    admin.title = Some("Admin | Panel".to_string());
    vec![
        admin,
        probe("http://example.com/login", "POST", 302),
        probe("http://example.com/missing", "GET", 404),
        probe("http://example.com/boom", "PUT", 500),
        ProbeResult::with_error(
            "http://example.com/slow".to_string(),
            "GET".to_string(),
            "operation timed out".to_string(),
        ),
    ]
}

fn sample_endpoints() -> Vec<Endpoint> {
    let mut inputs = BTreeMap::new();
    inputs.insert("email".to_string(), "test@example.com".to_string());
    vec![
        Endpoint::direct("http://example.com/".to_string(), 0),
        Endpoint {
            url: "http://example.com/about".to_string(),
            method: "GET".to_string(),
            source: EndpointSource::Link,
            depth: 1,
            metadata: Some(Metadata::Link {
                text: "About".to_string(),
            }),
        },
        Endpoint {
            url: "http://example.com/subscribe".to_string(),
            method: "POST".to_string(),
            source: EndpointSource::Form,
            depth: 1,
            metadata: Some(Metadata::Form { inputs }),
        },
    ]
}

// ============================================================================
// Report Format Tests
// ============================================================================

#[test]
fn test_report_format_from_str() {
    assert!(matches!(ReportFormat::from_str("text"), Some(ReportFormat::Text)));
    assert!(matches!(ReportFormat::from_str("txt"), Some(ReportFormat::Text)));
    assert!(matches!(ReportFormat::from_str("json"), Some(ReportFormat::Json)));
    assert!(matches!(ReportFormat::from_str("markdown"), Some(ReportFormat::Markdown)));
    assert!(matches!(ReportFormat::from_str("md"), Some(ReportFormat::Markdown)));
}

#[test]
fn test_report_format_from_str_case_insensitive() {
    assert!(matches!(ReportFormat::from_str("TEXT"), Some(ReportFormat::Text)));
    assert!(matches!(ReportFormat::from_str("Json"), Some(ReportFormat::Json)));
    assert!(matches!(ReportFormat::from_str("MD"), Some(ReportFormat::Markdown)));
}

#[test]
fn test_report_format_from_str_invalid() {
    assert!(ReportFormat::from_str("csv").is_none());
    assert!(ReportFormat::from_str("").is_none());
}

#[test]
fn test_report_format_extension() {
    assert_eq!(ReportFormat::Text.extension(), "txt");
    assert_eq!(ReportFormat::Json.extension(), "json");
    assert_eq!(ReportFormat::Markdown.extension(), "md");
}

// ============================================================================
// Probe result reports
// ============================================================================

#[test]
fn test_text_results_grouped_by_status() {
    let report = generate_text_results(&sample_results());

    assert!(report.contains("Total probes: 5"));
    assert!(report.contains("[200] Success (1 results)"));
    assert!(report.contains("[302] Redirect (1 results)"));
    assert!(report.contains("[404] Client Error (1 results)"));
    assert!(report.contains("[500] Server Error (1 results)"));
    assert!(report.contains("[ERR] Request failed (1 results)"));
    assert!(report.contains("operation timed out"));

    let success = report.find("[200]").unwrap();
    let client_error = report.find("[404]").unwrap();
    let errored = report.find("[ERR]").unwrap();
    assert!(success < client_error && client_error < errored);
}

#[test]
fn test_markdown_results_keep_only_2xx_and_3xx() {
    let report = generate_markdown_results(&sample_results());

    assert!(report.starts_with("# API Endpoints Discovery"));
    assert!(report.contains("| GET | `http://example.com/admin` | 200 | 42 | Admin \\| Panel |"));
    assert!(report.contains("`http://example.com/login` | 302"));
    assert!(!report.contains("/missing"));
    assert!(!report.contains("/boom"));
    assert!(!report.contains("/slow"));
}

#[test]
fn test_json_results_are_pretty_and_parseable() {
    let report = render_results(&sample_results(), ReportFormat::Json).unwrap();
    assert!(report.contains("\n  "));

    let parsed: serde_json::Value = serde_json::from_str(&report).unwrap();
    let items = parsed.as_array().unwrap();
    assert_eq!(items.len(), 5);
    assert_eq!(items[0]["status_code"], 200);
    assert_eq!(items[0]["title"], "Admin | Panel");
    assert!(items[0].get("error").is_none());
    assert_eq!(items[4]["status_code"], 0);
    assert_eq!(items[4]["error"], "operation timed out");
}

#[test]
fn test_empty_results_render_in_every_format() {
    for format in [ReportFormat::Text, ReportFormat::Json, ReportFormat::Markdown] {
        let report = render_results(&[], format).unwrap();
        assert!(!report.is_empty());
    }
    assert_eq!(render_results(&[], ReportFormat::Json).unwrap(), "[]");
}

// ============================================================================
// Endpoint reports
// ============================================================================

#[test]
fn test_text_endpoints_grouped_by_source() {
    let report = generate_text_endpoints(&sample_endpoints());
    assert!(report.contains("Total endpoints: 3"));
    assert!(report.contains("[direct] (1 endpoints)"));
    assert!(report.contains("[link] (1 endpoints)"));
    assert!(report.contains("[form] (1 endpoints)"));
    assert!(report.contains("http://example.com/subscribe (depth 1)"));
}

#[test]
fn test_markdown_endpoints_table() {
    let report = generate_markdown_endpoints(&sample_endpoints());
    assert!(report.contains("| Method | URL | Source | Depth |"));
    assert!(report.contains("| POST | `http://example.com/subscribe` | form | 1 |"));
}

#[test]
fn test_json_endpoints_carry_metadata() {
    let report = render_endpoints(&sample_endpoints(), ReportFormat::Json).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&report).unwrap();
    let items = parsed.as_array().unwrap();

    assert_eq!(items[0]["source"], "direct");
    assert!(items[0].get("metadata").is_none());
    assert_eq!(items[1]["metadata"]["link"]["text"], "About");
    assert_eq!(items[2]["metadata"]["form"]["inputs"]["email"], "test@example.com");
}

// ============================================================================
// Saving
// ============================================================================

#[test]
fn test_save_report_writes_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("report.md");
    let content = generate_markdown_results(&sample_results());

    save_report(&content, &path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), content);
}
