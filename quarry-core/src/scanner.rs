// Scanner orchestration: wires one transport into the crawler and the prober

use crate::config::ScanConfig;
use crate::wordlist::default_wordlist;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use quarry_scanner::error::Result;
use quarry_scanner::{
    Crawler, Endpoint, ProbeResult, Prober, ProgressCallback, ResultCallback, Transport,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Methods probed when a scan is given none
pub const DEFAULT_METHODS: [&str; 4] = ["GET", "POST", "PUT", "DELETE"];

/// Cumulative counters for the lifetime of a [`Scanner`], until `reset`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub total_requests: usize,
    /// 2xx responses
    pub successful: usize,
    /// Responses with status >= 400
    pub failed: usize,
    /// Probes that never got a response
    pub errored: usize,
    pub total_discovered: usize,
    pub start_time: DateTime<Utc>,
    pub discovery_start_time: Option<DateTime<Utc>>,
    pub scan_start_time: Option<DateTime<Utc>>,
    pub duration: Duration,
    pub discovery_duration: Duration,
    pub scan_duration: Duration,
}

impl Stats {
    fn new() -> Self {
        Self {
            total_requests: 0,
            successful: 0,
            failed: 0,
            errored: 0,
            total_discovered: 0,
            start_time: Utc::now(),
            discovery_start_time: None,
            scan_start_time: None,
            duration: Duration::ZERO,
            discovery_duration: Duration::ZERO,
            scan_duration: Duration::ZERO,
        }
    }

    fn record_results(&mut self, results: &[ProbeResult]) {
        self.total_requests += results.len();
        for result in results {
            match result.status_code {
                0 => self.errored += 1,
                200..=299 => self.successful += 1,
                400.. => self.failed += 1,
                _ => {}
            }
        }
    }

    pub fn requests_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total_requests as f64 / secs
        } else {
            0.0
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

fn methods_or_default(methods: &[String]) -> Vec<String> {
    if methods.is_empty() {
        DEFAULT_METHODS.iter().map(|m| m.to_string()).collect()
    } else {
        methods.to_vec()
    }
}

fn elapsed_since(start: DateTime<Utc>) -> Duration {
    (Utc::now() - start).to_std().unwrap_or_default()
}

/// Entry point for a scan of one target.
///
/// Discovery and probing share one [`Transport`], so proxy rotation state carries over
/// between them. Runs started while another is active share its cancellation token;
/// [`Scanner::stop`] cancels all of them.
pub struct Scanner {
    config: ScanConfig,
    crawler: Crawler,
    prober: Prober,
    wordlist: Vec<String>,
    stats: Mutex<Stats>,
    active: Mutex<Option<CancellationToken>>,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Result<Self> {
        config.validate()?;

        let transport = Arc::new(Transport::new(config.transport_options())?);
        let crawler = Crawler::new(Arc::clone(&transport), &config.base_url)?
            .with_max_depth(config.scan_depth)
            .with_concurrency(config.crawl_concurrency);
        let prober = Prober::new(Arc::clone(&transport));

        Ok(Self {
            config,
            crawler,
            prober,
            wordlist: default_wordlist(),
            stats: Mutex::new(Stats::new()),
            active: Mutex::new(None),
        })
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.crawler = self.crawler.with_progress_callback(callback);
        self
    }

    pub fn with_result_callback(mut self, callback: ResultCallback) -> Self {
        self.prober = self.prober.with_result_callback(callback);
        self
    }

    /// Replace the wordlist `scan` probes
    pub fn with_wordlist(mut self, wordlist: Vec<String>) -> Self {
        self.wordlist = wordlist;
        self
    }

    pub fn wordlist(&self) -> &[String] {
        &self.wordlist
    }

    /// Crawl the target from its root and return every endpoint discovered so far
    pub async fn discover(&self) -> Vec<Endpoint> {
        let started = Utc::now();
        self.stats.lock().discovery_start_time = Some(started);

        let token = self.begin_run();
        let endpoints = self.crawler.crawl(&token).await;

        let mut stats = self.stats.lock();
        stats.total_discovered = endpoints.len();
        stats.discovery_duration = elapsed_since(started);
        stats.duration = elapsed_since(stats.start_time);
        drop(stats);

        endpoints
    }

    /// Probe the scanner's wordlist with the configured worker count
    pub async fn scan(&self, methods: &[String], delay: Duration) -> Result<Vec<ProbeResult>> {
        self.scan_with_wordlist(&self.wordlist, methods, self.config.workers, delay)
            .await
    }

    /// Probe `wordlist` x `methods` against the base URL; no methods means [`DEFAULT_METHODS`]
    pub async fn scan_with_wordlist(
        &self,
        wordlist: &[String],
        methods: &[String],
        concurrency: usize,
        delay: Duration,
    ) -> Result<Vec<ProbeResult>> {
        let methods = methods_or_default(methods);

        let started = Utc::now();
        self.stats.lock().scan_start_time = Some(started);

        let token = self.begin_run();
        let results = self
            .prober
            .scan_wordlist(
                &self.config.base_url,
                wordlist,
                &methods,
                concurrency,
                delay,
                &token,
            )
            .await?;

        let mut stats = self.stats.lock();
        stats.record_results(&results);
        stats.scan_duration += elapsed_since(started);
        stats.duration = elapsed_since(stats.start_time);

        Ok(results)
    }

    /// Probe a single URL with each of `methods`, or [`DEFAULT_METHODS`] when empty
    pub async fn scan_path(
        &self,
        url: &str,
        methods: &[String],
        delay: Duration,
    ) -> Result<Vec<ProbeResult>> {
        let methods = methods_or_default(methods);

        let started = Utc::now();
        self.stats.lock().scan_start_time = Some(started);

        let token = self.begin_run();
        let results = self.prober.scan_path(url, &methods, delay, &token).await?;

        let mut stats = self.stats.lock();
        stats.record_results(&results);
        stats.scan_duration += elapsed_since(started);
        stats.duration = elapsed_since(stats.start_time);

        Ok(results)
    }

    pub fn stats(&self) -> Stats {
        self.stats.lock().clone()
    }

    /// Cancel the active run, if any. Requests already in flight complete.
    pub fn stop(&self) {
        if let Some(token) = self.active.lock().take() {
            info!("Stopping active run");
            token.cancel();
        }
    }

    /// Zero the statistics and forget everything the crawler has seen
    pub async fn reset(&self) {
        *self.stats.lock() = Stats::new();
        self.crawler.clear().await;
    }

    fn begin_run(&self) -> CancellationToken {
        let mut active = self.active.lock();
        match active.as_ref() {
            Some(token) if !token.is_cancelled() => token.clone(),
            _ => {
                let token = CancellationToken::new();
                *active = Some(token.clone());
                token
            }
        }
    }
}
