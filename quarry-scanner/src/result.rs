use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Where a discovered endpoint came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointSource {
    /// The page itself was fetched
    Direct,
    /// An anchor `href`
    Link,
    /// A form `action`
    Form,
    /// A request idiom matched in script content
    Javascript,
}

impl fmt::Display for EndpointSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EndpointSource::Direct => "direct",
            EndpointSource::Link => "link",
            EndpointSource::Form => "form",
            EndpointSource::Javascript => "javascript",
        };
        f.write_str(label)
    }
}

/// Extra provenance recorded by the extractor that produced an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metadata {
    Link { text: String },
    Form { inputs: BTreeMap<String, String> },
    Script { pattern: String },
}

impl Metadata {
    /// Form inputs with their synthesized values, if this is form metadata
    pub fn inputs(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Metadata::Form { inputs } => Some(inputs),
            _ => None,
        }
    }
}

/// A discovered (URL, method) candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub url: String,
    pub method: String,
    pub source: EndpointSource,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Endpoint {
    pub fn direct(url: String, depth: usize) -> Self {
        Self {
            url,
            method: "GET".to_string(),
            source: EndpointSource::Direct,
            depth,
            metadata: None,
        }
    }
}

/// Outcome of a single probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub url: String,
    pub method: String,
    pub status_code: u16,
    pub size: usize,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn new(url: String, method: String) -> Self {
        Self {
            url,
            method,
            status_code: 0,
            size: 0,
            headers: BTreeMap::new(),
            title: None,
            timestamp: Utc::now(),
            error: None,
        }
    }

    /// A failed probe never carries a status, headers or body data
    pub fn with_error(url: String, method: String, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(url, method)
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
