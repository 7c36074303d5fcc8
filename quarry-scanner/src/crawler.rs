use crate::error::{Result, ScanError};
use crate::extract::{self, Scope};
use crate::result::{Endpoint, EndpointSource};
use crate::transport::Transport;
use futures::future::{BoxFuture, join_all};
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Method, Request};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Called with (depth, url) whenever a page is about to be fetched
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

const DEFAULT_MAX_DEPTH: usize = 2;
const DEFAULT_CONCURRENCY: usize = 10;
const PAGE_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

#[derive(Debug, Default)]
struct CrawlState {
    visited: HashSet<String>,
    endpoints: Vec<Endpoint>,
}

/// Recursive same-host crawler.
///
/// Every branch shares one [`CrawlState`]; a URL is claimed in the visited set before it
/// is fetched, so concurrent branches never fetch the same URL twice. Each page waits for
/// all of its link-sourced children before returning.
#[derive(Clone)]
pub struct Crawler {
    transport: Arc<Transport>,
    scope: Scope,
    max_depth: usize,
    state: Arc<Mutex<CrawlState>>,
    fetch_permits: Arc<Semaphore>,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new(transport: Arc<Transport>, base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
            return Err(ScanError::InvalidUrl(format!(
                "{}: expected an http(s) URL with a host",
                base_url
            )));
        }

        Ok(Self {
            transport,
            scope: Scope::new(base),
            max_depth: DEFAULT_MAX_DEPTH,
            state: Arc::new(Mutex::new(CrawlState::default())),
            fetch_permits: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            progress_callback: None,
        })
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Cap on page fetches in flight across the whole crawl
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_permits = Arc::new(Semaphore::new(concurrency.max(1)));
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Crawl from the root of the base URL
    pub async fn crawl(&self, cancel: &CancellationToken) -> Vec<Endpoint> {
        info!(
            "Starting crawl of {} (max depth {})",
            self.scope.base(),
            self.max_depth
        );

        let endpoints = self.crawl_path("/", 0, cancel).await;

        info!(
            "Crawl complete. Visited {} pages, {} endpoints recorded",
            self.visited_count().await,
            endpoints.len()
        );
        endpoints
    }

    /// Crawl `path` at `depth` and return the accumulated endpoint set.
    ///
    /// Paths beyond the depth limit, already visited, or outside the base host leave the
    /// accumulated set unchanged.
    pub async fn crawl_path(
        &self,
        path: &str,
        depth: usize,
        cancel: &CancellationToken,
    ) -> Vec<Endpoint> {
        match self.scope.resolve_path(path) {
            Some(url) => self.clone().visit(url, depth, cancel.clone()).await,
            None => debug!("Skipping out-of-scope path {}", path),
        }
        self.endpoints().await
    }

    fn visit(self, url: Url, depth: usize, cancel: CancellationToken) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            if depth > self.max_depth || cancel.is_cancelled() {
                return;
            }

            let key = url.to_string();
            {
                let mut state = self.state.lock().await;
                if !state.visited.insert(key.clone()) {
                    return;
                }
            }

            if let Some(ref callback) = self.progress_callback {
                callback(depth, key.clone());
            }

            let body = match self.fetch(&url).await {
                Ok(body) => body,
                Err(e) => {
                    debug!("Crawl error for {}: {}", key, e);
                    return;
                }
            };

            // Nothing is extracted at the depth limit, children would exceed it
            let discovered = if depth < self.max_depth {
                self.extract(&body, &url, depth + 1)
            } else {
                Vec::new()
            };

            let children = {
                let mut state = self.state.lock().await;
                state.endpoints.push(Endpoint::direct(key, depth));

                let mut children = Vec::new();
                let mut queued = HashSet::new();
                for endpoint in discovered {
                    if endpoint.source == EndpointSource::Link {
                        if state.visited.contains(&endpoint.url) {
                            continue;
                        }
                        if queued.insert(endpoint.url.clone()) {
                            children.push(endpoint.url.clone());
                        }
                    }
                    state.endpoints.push(endpoint);
                }
                children
            };

            if children.is_empty() {
                return;
            }

            debug!("{} links to follow from {} at depth {}", children.len(), url, depth + 1);

            let branches: Vec<_> = children
                .iter()
                .filter_map(|child| Url::parse(child).ok())
                .map(|child| tokio::spawn(self.clone().visit(child, depth + 1, cancel.clone())))
                .collect();

            for joined in join_all(branches).await {
                if let Err(e) = joined {
                    warn!("Crawl branch failed: {}", e);
                }
            }
        })
    }

    async fn fetch(&self, url: &Url) -> Result<String> {
        let _permit = self
            .fetch_permits
            .acquire()
            .await
            .map_err(|e| ScanError::Other(format!("fetch permits closed: {}", e)))?;

        debug!("Fetching {}", url);
        let mut request = Request::new(Method::GET, url.clone());
        request
            .headers_mut()
            .insert(ACCEPT, HeaderValue::from_static(PAGE_ACCEPT));

        let response = self.transport.execute(request).await?;
        Ok(response.text().await?)
    }

    fn extract(&self, body: &str, page: &Url, depth: usize) -> Vec<Endpoint> {
        let mut endpoints = extract::extract_links(body, page, &self.scope, depth);
        endpoints.extend(extract::extract_forms(body, page, &self.scope, depth));
        endpoints.extend(extract::extract_scripts(body, page, &self.scope, depth));
        endpoints
    }

    /// Snapshot of every endpoint recorded so far
    pub async fn endpoints(&self) -> Vec<Endpoint> {
        self.state.lock().await.endpoints.clone()
    }

    pub async fn visited_count(&self) -> usize {
        self.state.lock().await.visited.len()
    }

    /// Forget visited URLs and recorded endpoints
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.visited.clear();
        state.endpoints.clear();
    }
}
