//! Endpoint extraction from fetched page content

use crate::result::{Endpoint, EndpointSource, Metadata};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// Same-host boundary and URL normalization for one crawl target
#[derive(Debug, Clone)]
pub struct Scope {
    base: Url,
}

impl Scope {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve a crawl path (absolute URL or path relative to the base) to a URL in scope
    pub fn resolve_path(&self, path: &str) -> Option<Url> {
        let path = path.trim();
        if path.starts_with("http://") || path.starts_with("https://") {
            let url = Url::parse(path).ok()?;
            return self.in_scope(url);
        }
        let url = self.base.join(path.trim_start_matches('/')).ok()?;
        self.in_scope(url)
    }

    /// Resolve a reference found on `page`, dropping non-navigational and cross-host targets
    pub fn normalize(&self, href: &str, page: &Url) -> Option<Url> {
        let href = href.trim();
        let lower = href.to_ascii_lowercase();
        if href.is_empty()
            || href.starts_with('#')
            || lower.starts_with("javascript:")
            || lower.starts_with("mailto:")
            || lower.starts_with("tel:")
            || lower.starts_with("data:")
        {
            return None;
        }

        let url = page.join(href).ok()?;
        self.in_scope(url)
    }

    fn in_scope(&self, mut url: Url) -> Option<Url> {
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        if url.host_str() != self.base.host_str()
            || url.port_or_known_default() != self.base.port_or_known_default()
        {
            return None;
        }
        url.set_fragment(None);
        Some(url)
    }
}

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static FORM_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("form").unwrap());
static FIELD_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("input, textarea, select").unwrap());
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

static LENIENT_ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).unwrap()
});

/// Anchor targets as `link` endpoints at `depth`.
///
/// Falls back to a tokenizing scan of the raw markup when the parser reported errors
/// and produced no anchors.
pub fn extract_links(html: &str, page: &Url, scope: &Scope, depth: usize) -> Vec<Endpoint> {
    let document = Html::parse_document(html);

    let mut endpoints: Vec<Endpoint> = document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let url = scope.normalize(href, page)?;
            Some(link_endpoint(url, depth, element_text(&element)))
        })
        .collect();

    if endpoints.is_empty() && !document.errors.is_empty() {
        endpoints = extract_links_lenient(html, page, scope, depth);
    }

    endpoints
}

pub(crate) fn extract_links_lenient(
    html: &str,
    page: &Url,
    scope: &Scope,
    depth: usize,
) -> Vec<Endpoint> {
    LENIENT_ANCHOR
        .captures_iter(html)
        .filter_map(|cap| {
            let href = cap.get(1).or_else(|| cap.get(2)).or_else(|| cap.get(3))?;
            let url = scope.normalize(href.as_str(), page)?;
            Some(link_endpoint(url, depth, String::new()))
        })
        .collect()
}

fn link_endpoint(url: Url, depth: usize, text: String) -> Endpoint {
    Endpoint {
        url: url.to_string(),
        method: "GET".to_string(),
        source: EndpointSource::Link,
        depth,
        metadata: Some(Metadata::Link { text }),
    }
}

/// One `form` endpoint per form, with a representative value for each named input
pub fn extract_forms(html: &str, page: &Url, scope: &Scope, depth: usize) -> Vec<Endpoint> {
    let document = Html::parse_document(html);

    document
        .select(&FORM_SELECTOR)
        .filter_map(|form| {
            let action = form
                .value()
                .attr("action")
                .filter(|a| !a.trim().is_empty())
                .unwrap_or(page.as_str());
            let url = scope.normalize(action, page)?;

            let method = form
                .value()
                .attr("method")
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or("GET")
                .to_uppercase();

            let mut inputs = BTreeMap::new();
            for field in form.select(&FIELD_SELECTOR) {
                let Some(name) = field.value().attr("name").filter(|n| !n.is_empty()) else {
                    continue;
                };
                let kind = field
                    .value()
                    .attr("type")
                    .unwrap_or_default()
                    .to_ascii_lowercase();
                if matches!(kind.as_str(), "submit" | "button" | "reset") {
                    continue;
                }
                let value = match field.value().attr("value").filter(|v| !v.is_empty()) {
                    Some(value) => value.to_string(),
                    None => synthesize_value(&kind).to_string(),
                };
                inputs.insert(name.to_string(), value);
            }

            Some(Endpoint {
                url: url.to_string(),
                method,
                source: EndpointSource::Form,
                depth,
                metadata: Some(Metadata::Form { inputs }),
            })
        })
        .collect()
}

/// Placeholder value for an empty form field of the given input type
pub fn synthesize_value(input_type: &str) -> &'static str {
    match input_type {
        "email" => "test@example.com",
        "password" => "password123",
        "number" | "range" => "1",
        "checkbox" | "radio" => "on",
        _ => "test",
    }
}

struct ScriptPattern {
    regex: Regex,
    default_method: &'static str,
}

impl ScriptPattern {
    fn new(pattern: &str) -> Self {
        Self::with_method(pattern, "GET")
    }

    fn with_method(pattern: &str, default_method: &'static str) -> Self {
        Self {
            regex: Regex::new(pattern).unwrap(),
            default_method,
        }
    }
}

// Capture groups: `path` is required, `method` is optional.
static SCRIPT_PATTERNS: Lazy<Vec<ScriptPattern>> = Lazy::new(|| {
    vec![
        ScriptPattern::new(
            r#"fetch\(\s*['"`](?P<path>[^'"`\s]+)['"`]\s*,\s*\{[^}]*?method\s*:\s*['"](?P<method>GET|POST|PUT|DELETE|PATCH)['"]"#,
        ),
        ScriptPattern::new(r#"fetch\(\s*['"`](?P<path>[^'"`\s]+)['"`]"#),
        ScriptPattern::new(
            r#"axios\.(?P<method>get|post|put|delete|patch)\(\s*['"`](?P<path>[^'"`\s]+)['"`]"#,
        ),
        ScriptPattern::new(r#"axios\([^)]*?url\s*:\s*['"`](?P<path>[^'"`\s]+)['"`]"#),
        ScriptPattern::new(
            r#"\.open\(\s*['"](?P<method>GET|POST|PUT|DELETE|PATCH)['"]\s*,\s*['"`](?P<path>[^'"`\s]+)['"`]"#,
        ),
        ScriptPattern::new(r#"\$\.(?P<method>get|post)\(\s*['"`](?P<path>[^'"`\s]+)['"`]"#),
        ScriptPattern::new(r#"\$\.(?:get|post|ajax)\([^)]*?url\s*:\s*['"`](?P<path>[^'"`\s]+)['"`]"#),
        ScriptPattern::new(r#"window\.location\s*=\s*['"`](?P<path>[^'"`\s]+)['"`]"#),
        ScriptPattern::new(r#"location\.href\s*=\s*['"`](?P<path>[^'"`\s]+)['"`]"#),
        ScriptPattern::new(r#"['"](?P<path>/[^'"\s]+)['"]"#),
    ]
});

/// Request idioms in script content, as `javascript` endpoints.
///
/// A heuristic: it reads the whole page body, so string literals in markup match too.
pub fn extract_scripts(content: &str, page: &Url, scope: &Scope, depth: usize) -> Vec<Endpoint> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut endpoints = Vec::new();

    for pattern in SCRIPT_PATTERNS.iter() {
        for cap in pattern.regex.captures_iter(content) {
            let Some(path) = cap.name("path") else {
                continue;
            };
            let Some(url) = scope.normalize(path.as_str(), page) else {
                continue;
            };
            let method = cap
                .name("method")
                .map(|m| m.as_str().to_uppercase())
                .unwrap_or_else(|| pattern.default_method.to_string());

            let url = url.to_string();
            if !seen.insert((url.clone(), method.clone())) {
                continue;
            }

            endpoints.push(Endpoint {
                url,
                method,
                source: EndpointSource::Javascript,
                depth,
                metadata: Some(Metadata::Script {
                    pattern: pattern.regex.as_str().to_string(),
                }),
            });
        }
    }

    endpoints
}

/// Document title of an HTML page, whitespace-collapsed
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|element| element_text(&element))?;
    (!title.is_empty()).then_some(title)
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
