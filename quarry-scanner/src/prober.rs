use crate::error::{Result, ScanError};
use crate::extract;
use crate::result::ProbeResult;
use crate::transport::Transport;
use futures::future::join_all;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Called with every probe result as soon as it is recorded
pub type ResultCallback = Arc<dyn Fn(&ProbeResult) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ProbeTask {
    pub url: Url,
    pub method: Method,
}

/// Brute-force prober: requests every wordlist path with every method against a base URL
#[derive(Clone)]
pub struct Prober {
    transport: Arc<Transport>,
    result_callback: Option<ResultCallback>,
}

impl Prober {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self {
            transport,
            result_callback: None,
        }
    }

    pub fn with_result_callback(mut self, callback: ResultCallback) -> Self {
        self.result_callback = Some(callback);
        self
    }

    /// Probe the cartesian product of `wordlist` and `methods` with `concurrency` workers.
    ///
    /// The full task queue is built before any worker starts. Workers drain it until it is
    /// empty or `cancel` fires, sleeping `delay` after each of their probes. Results come
    /// back in completion order.
    pub async fn scan_wordlist(
        &self,
        base_url: &str,
        wordlist: &[String],
        methods: &[String],
        concurrency: usize,
        delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<ProbeResult>> {
        if concurrency == 0 {
            return Err(ScanError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let tasks = build_tasks(base_url, wordlist, methods)?;
        let total = tasks.len();
        info!(
            "Probing {} path/method combinations against {} with {} workers",
            total, base_url, concurrency
        );

        let queue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let results = Arc::new(Mutex::new(Vec::with_capacity(total)));

        let mut workers = Vec::with_capacity(concurrency);
        for worker_id in 0..concurrency {
            let transport = Arc::clone(&self.transport);
            let callback = self.result_callback.clone();
            let queue = Arc::clone(&queue);
            let results = Arc::clone(&results);
            let cancel = cancel.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        debug!("Worker {} stopping: scan cancelled", worker_id);
                        break;
                    }
                    let Some(task) = queue.lock().await.pop_front() else {
                        break;
                    };

                    let result = probe(&transport, task.url, task.method).await;
                    if let Some(callback) = &callback {
                        callback(&result);
                    }
                    results.lock().await.push(result);

                    if !pause(delay, &cancel).await {
                        debug!("Worker {} stopping: scan cancelled", worker_id);
                        break;
                    }
                }
            }));
        }

        for worker in workers {
            if let Err(e) = worker.await {
                warn!("Probe worker failed: {}", e);
            }
        }

        let results = std::mem::take(&mut *results.lock().await);
        info!("Probing finished: {} of {} probes completed", results.len(), total);
        Ok(results)
    }

    /// Probe a single URL once per method, all methods concurrently
    pub async fn scan_path(
        &self,
        url: &str,
        methods: &[String],
        delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<ProbeResult>> {
        let target = parse_target(url)?;
        let methods = parse_methods(methods)?;

        let probes = methods.into_iter().map(|method| {
            let target = target.clone();
            async move {
                if cancel.is_cancelled() {
                    return None;
                }
                let result = probe(&self.transport, target, method).await;
                if let Some(callback) = &self.result_callback {
                    callback(&result);
                }
                pause(delay, cancel).await;
                Some(result)
            }
        });

        Ok(join_all(probes).await.into_iter().flatten().collect())
    }
}

/// Sleep for `delay` unless cancelled first; returns false on cancellation
async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Path-major task list: every method for the first word, then the next word
pub(crate) fn build_tasks(
    base_url: &str,
    wordlist: &[String],
    methods: &[String],
) -> Result<Vec<ProbeTask>> {
    let base = parse_target(base_url)?;
    let methods = parse_methods(methods)?;

    let mut tasks = Vec::with_capacity(wordlist.len() * methods.len());
    for word in wordlist {
        let url = join_word(&base, word);
        for method in &methods {
            tasks.push(ProbeTask {
                url: url.clone(),
                method: method.clone(),
            });
        }
    }
    Ok(tasks)
}

/// Append a wordlist entry to the path of `base` with exactly one slash between them.
/// Query and fragment of `base` are kept.
pub fn join_word(base: &Url, word: &str) -> Url {
    let mut url = base.clone();
    let path = base.path().trim_end_matches('/');
    url.set_path(&format!("{}/{}", path, word.trim().trim_start_matches('/')));
    url
}

fn parse_target(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ScanError::InvalidUrl(format!(
            "{}: expected an http(s) URL with a host",
            url
        )));
    }
    Ok(parsed)
}

pub(crate) fn parse_methods(methods: &[String]) -> Result<Vec<Method>> {
    methods
        .iter()
        .map(|m| {
            let name = m.trim().to_uppercase();
            if name.is_empty() {
                return Err(ScanError::InvalidMethod(m.clone()));
            }
            Method::from_bytes(name.as_bytes()).map_err(|_| ScanError::InvalidMethod(m.clone()))
        })
        .collect()
}

async fn probe(transport: &Transport, url: Url, method: Method) -> ProbeResult {
    let url_text = url.to_string();
    let method_text = method.to_string();

    let mut request = Request::new(method.clone(), url);
    request
        .headers_mut()
        .insert(ACCEPT, HeaderValue::from_static("*/*"));
    if matches!(method, Method::POST | Method::PUT | Method::PATCH) {
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    let response = match transport.execute(request).await {
        Ok(response) => response,
        Err(e) => {
            debug!("{} {} failed: {}", method_text, url_text, e);
            return ProbeResult::with_error(url_text, method_text, e.to_string());
        }
    };

    let status_code = response.status().as_u16();
    let mut headers = BTreeMap::new();
    for (name, value) in response.headers() {
        headers
            .entry(name.as_str().to_string())
            .or_insert_with(|| String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    let is_html = headers
        .get("content-type")
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"));

    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => {
            debug!("{} {} body read failed: {}", method_text, url_text, e);
            return ProbeResult::with_error(
                url_text,
                method_text,
                format!("failed to read response body: {}", e),
            );
        }
    };

    debug!("{} {} -> {} ({} bytes)", method_text, url_text, status_code, body.len());

    let mut result = ProbeResult::new(url_text, method_text);
    result.status_code = status_code;
    result.size = body.len();
    result.headers = headers;
    if is_html {
        result.title = extract::extract_title(&String::from_utf8_lossy(&body));
    }
    result
}
