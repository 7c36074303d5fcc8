// Scan configuration: defaults, validation and file loading

use quarry_scanner::error::{Result, ScanError};
use quarry_scanner::TransportOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = concat!("quarry/", env!("CARGO_PKG_VERSION"));

/// Run parameters fixed at scanner construction.
///
/// Every field is optional in a config file; missing fields take the [`Default`] value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub user_agent: String,
    /// Probe workers used by `Scanner::scan`
    pub workers: usize,
    /// Concurrent page fetches across one crawl
    pub crawl_concurrency: usize,
    pub max_redirects: usize,
    pub scan_depth: usize,
    pub proxy_urls: Vec<String>,
    pub proxy_rotate: bool,
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub insecure_tls: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: 10,
            connect_timeout_secs: 30,
            idle_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            workers: 5,
            crawl_concurrency: 10,
            max_redirects: 3,
            scan_depth: 2,
            proxy_urls: Vec::new(),
            proxy_rotate: false,
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            insecure_tls: false,
        }
    }
}

impl ScanConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Load a JSON config file; `~` in the path is expanded
    pub fn from_file(path: &Path) -> Result<Self> {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        let content = fs::read_to_string(&expanded)?;
        serde_json::from_str(&content)
            .map_err(|e| ScanError::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<()> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
            return Err(ScanError::InvalidUrl(format!(
                "{}: expected an http(s) URL with a host",
                self.base_url
            )));
        }

        if self.timeout_secs == 0 {
            return Err(ScanError::InvalidConfig("timeout must be at least 1 second".to_string()));
        }
        if self.workers == 0 {
            return Err(ScanError::InvalidConfig("workers must be at least 1".to_string()));
        }
        if self.crawl_concurrency == 0 {
            return Err(ScanError::InvalidConfig(
                "crawl concurrency must be at least 1".to_string(),
            ));
        }

        for proxy in &self.proxy_urls {
            let parsed = Url::parse(proxy)
                .map_err(|e| ScanError::InvalidConfig(format!("proxy '{}': {}", proxy, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ScanError::InvalidConfig(format!(
                    "proxy '{}': unsupported scheme '{}'",
                    proxy,
                    parsed.scheme()
                )));
            }
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            timeout: self.timeout(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            max_redirects: self.max_redirects,
            accept_invalid_certs: self.insecure_tls,
            user_agent: self.user_agent.clone(),
            headers: self.headers.clone(),
            cookies: self.cookies.clone(),
            proxies: self.proxy_urls.clone(),
            rotate_proxies: self.proxy_rotate,
        }
    }
}
