// Report generation for probe results and discovered endpoints

use quarry_scanner::{Endpoint, EndpointSource, ProbeResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const HEAVY_RULE: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const LIGHT_RULE: &str =
    "────────────────────────────────────────────────────────────────────────────────\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "md",
        }
    }
}

pub fn render_results(
    results: &[ProbeResult],
    format: ReportFormat,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_results(results)),
        ReportFormat::Json => serde_json::to_string_pretty(results),
        ReportFormat::Markdown => Ok(generate_markdown_results(results)),
    }
}

pub fn render_endpoints(
    endpoints: &[Endpoint],
    format: ReportFormat,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_endpoints(endpoints)),
        ReportFormat::Json => serde_json::to_string_pretty(endpoints),
        ReportFormat::Markdown => Ok(generate_markdown_endpoints(endpoints)),
    }
}

/// Results grouped by status code, errored probes last
pub fn generate_text_results(results: &[ProbeResult]) -> String {
    let mut report = String::new();

    report.push_str(HEAVY_RULE);
    report.push_str("                             PROBE RESULTS\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');
    report.push_str(&format!("Total probes: {}\n\n", results.len()));

    let mut by_status: BTreeMap<u16, Vec<&ProbeResult>> = BTreeMap::new();
    let mut errored = Vec::new();
    for result in results {
        if result.is_error() {
            errored.push(result);
        } else {
            by_status.entry(result.status_code).or_default().push(result);
        }
    }

    for (status_code, status_results) in &by_status {
        report.push_str(&format!(
            "{} ({} results)\n",
            status_label(*status_code),
            status_results.len()
        ));
        report.push_str(LIGHT_RULE);
        for result in status_results {
            report.push_str(&format!("  {:<7} {} ({} bytes)", result.method, result.url, result.size));
            if let Some(ref title) = result.title {
                report.push_str(&format!(" \"{}\"", title));
            }
            report.push('\n');
        }
        report.push('\n');
    }

    if !errored.is_empty() {
        report.push_str(&format!("[ERR] Request failed ({} results)\n", errored.len()));
        report.push_str(LIGHT_RULE);
        for result in errored {
            report.push_str(&format!(
                "  {:<7} {} - {}\n",
                result.method,
                result.url,
                result.error.as_deref().unwrap_or_default()
            ));
        }
        report.push('\n');
    }

    report.push_str(HEAVY_RULE);
    report.push_str("                             End of Report\n");
    report.push_str(HEAVY_RULE);

    report
}

/// Markdown table of responsive endpoints (2xx and 3xx only)
pub fn generate_markdown_results(results: &[ProbeResult]) -> String {
    let mut report = String::new();

    report.push_str("# API Endpoints Discovery\n\n");
    report.push_str("| Method | URL | Status | Size | Title |\n");
    report.push_str("|--------|-----|--------|------|-------|\n");

    for result in results.iter().filter(|r| (200..400).contains(&r.status_code)) {
        report.push_str(&format!(
            "| {} | `{}` | {} | {} | {} |\n",
            result.method,
            result.url,
            result.status_code,
            result.size,
            escape_cell(result.title.as_deref().unwrap_or_default())
        ));
    }

    report
}

/// Endpoints grouped by how they were discovered
pub fn generate_text_endpoints(endpoints: &[Endpoint]) -> String {
    let mut report = String::new();

    report.push_str(HEAVY_RULE);
    report.push_str("                          DISCOVERED ENDPOINTS\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');
    report.push_str(&format!("Total endpoints: {}\n\n", endpoints.len()));

    let mut by_source: BTreeMap<EndpointSource, Vec<&Endpoint>> = BTreeMap::new();
    for endpoint in endpoints {
        by_source.entry(endpoint.source).or_default().push(endpoint);
    }

    for (source, source_endpoints) in &by_source {
        report.push_str(&format!("[{}] ({} endpoints)\n", source, source_endpoints.len()));
        report.push_str(LIGHT_RULE);
        for endpoint in source_endpoints {
            report.push_str(&format!(
                "  {:<7} {} (depth {})\n",
                endpoint.method, endpoint.url, endpoint.depth
            ));
        }
        report.push('\n');
    }

    report.push_str(HEAVY_RULE);
    report.push_str("                             End of Report\n");
    report.push_str(HEAVY_RULE);

    report
}

pub fn generate_markdown_endpoints(endpoints: &[Endpoint]) -> String {
    let mut report = String::new();

    report.push_str("# Discovered Endpoints\n\n");
    report.push_str("| Method | URL | Source | Depth |\n");
    report.push_str("|--------|-----|--------|-------|\n");

    for endpoint in endpoints {
        report.push_str(&format!(
            "| {} | `{}` | {} | {} |\n",
            endpoint.method, endpoint.url, endpoint.source, endpoint.depth
        ));
    }

    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn status_label(status_code: u16) -> String {
    match status_code {
        200..=299 => format!("[{}] Success", status_code),
        300..=399 => format!("[{}] Redirect", status_code),
        400..=499 => format!("[{}] Client Error", status_code),
        500..=599 => format!("[{}] Server Error", status_code),
        _ => format!("[{}]", status_code),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
