//! Outbound request execution shared by the crawler and the prober.
//!
//! A [`Transport`] owns one pooled `reqwest` client per configured proxy (or a single
//! direct client when no proxies are given). Requests go through the client of the
//! active route; when rotation is enabled a failed request advances the active route.

use crate::error::{Result, ScanError};
use parking_lot::Mutex;
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::{Client, Proxy, Request, Response};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Options for building a [`Transport`]
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    /// Number of redirects followed before the redirect response itself is returned
    pub max_redirects: usize,
    pub accept_invalid_certs: bool,
    pub user_agent: String,
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub proxies: Vec<String>,
    pub rotate_proxies: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(30),
            max_redirects: 3,
            accept_invalid_certs: false,
            user_agent: concat!("quarry/", env!("CARGO_PKG_VERSION")).to_string(),
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            proxies: Vec::new(),
            rotate_proxies: false,
        }
    }
}

#[derive(Debug)]
struct Route {
    proxy: Option<String>,
    client: Client,
}

#[derive(Debug)]
pub struct Transport {
    routes: Vec<Route>,
    active: Mutex<usize>,
    rotate: bool,
    default_headers: HeaderMap,
    cookie_header: Option<HeaderValue>,
}

impl Transport {
    pub fn new(options: TransportOptions) -> Result<Self> {
        let routes = if options.proxies.is_empty() {
            vec![Route {
                proxy: None,
                client: build_client(&options, None)?,
            }]
        } else {
            options
                .proxies
                .iter()
                .map(|proxy| {
                    Ok(Route {
                        proxy: Some(proxy.clone()),
                        client: build_client(&options, Some(proxy))?,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        };

        let mut default_headers = HeaderMap::new();
        if !options.user_agent.is_empty() {
            default_headers.insert(USER_AGENT, header_value(&options.user_agent)?);
        }
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ScanError::InvalidConfig(format!("header name '{}': {}", name, e)))?;
            default_headers.insert(name, header_value(value)?);
        }

        let cookie_header = if options.cookies.is_empty() {
            None
        } else {
            let joined = options
                .cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            Some(header_value(&joined)?)
        };

        Ok(Self {
            routes,
            active: Mutex::new(0),
            rotate: options.rotate_proxies,
            default_headers,
            cookie_header,
        })
    }

    /// Execute a request through the active route.
    ///
    /// Default headers are only applied where the caller has not set them; configured
    /// cookies are appended to any cookie header already present. A failed request is
    /// not retried, but advances the active proxy when rotation applies.
    pub async fn execute(&self, mut request: Request) -> Result<Response> {
        self.apply_defaults(request.headers_mut());

        let (index, client) = {
            let active = self.active.lock();
            (*active, self.routes[*active].client.clone())
        };

        match client.execute(request).await {
            Ok(response) => Ok(response),
            Err(err) => {
                if self.rotate && self.routes.len() > 1 {
                    let next = self.advance();
                    debug!("Request via route {} failed, rotated to route {}", index, next);
                }
                Err(err.into())
            }
        }
    }

    /// Manually advance to the next proxy. No-op without proxies.
    pub fn rotate_proxy(&self) -> usize {
        if self.proxy_count() == 0 {
            return 0;
        }
        self.advance()
    }

    /// The proxy URL requests are currently routed through
    pub fn active_proxy(&self) -> Option<String> {
        let active = self.active.lock();
        self.routes[*active].proxy.clone()
    }

    pub fn proxy_index(&self) -> usize {
        *self.active.lock()
    }

    pub fn proxy_count(&self) -> usize {
        self.routes.iter().filter(|r| r.proxy.is_some()).count()
    }

    fn advance(&self) -> usize {
        let mut active = self.active.lock();
        *active = (*active + 1) % self.routes.len();
        *active
    }

    fn apply_defaults(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.default_headers {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }

        if let Some(ref cookies) = self.cookie_header {
            let merged = match headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
                Some(existing) if !existing.is_empty() => cookies
                    .to_str()
                    .ok()
                    .and_then(|ours| HeaderValue::from_str(&format!("{}; {}", existing, ours)).ok()),
                _ => Some(cookies.clone()),
            };
            if let Some(value) = merged {
                headers.insert(COOKIE, value);
            }
        }
    }
}

fn build_client(options: &TransportOptions, proxy: Option<&str>) -> Result<Client> {
    let max_redirects = options.max_redirects;

    let mut builder = Client::builder()
        .timeout(options.timeout)
        .connect_timeout(options.connect_timeout)
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(options.idle_timeout)
        .tcp_keepalive(Duration::from_secs(30))
        .danger_accept_invalid_certs(options.accept_invalid_certs)
        // previous() already holds the original URL on the first redirect
        .redirect(Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                attempt.stop()
            } else {
                attempt.follow()
            }
        }));

    builder = match proxy {
        Some(proxy_url) => {
            let proxy = Proxy::all(proxy_url)
                .map_err(|e| ScanError::ClientBuild(format!("invalid proxy '{}': {}", proxy_url, e)))?;
            builder.proxy(proxy)
        }
        None => builder.no_proxy(),
    };

    builder
        .build()
        .map_err(|e| ScanError::ClientBuild(e.to_string()))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| ScanError::InvalidConfig(format!("header value '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use url::Url;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    // Nothing listens on port 1, so every request through these proxies fails fast
    fn dead_proxies(count: usize) -> Vec<String> {
        (0..count)
            .map(|i| format!("http://127.0.0.1:{}", 1 + i))
            .collect()
    }

    fn get(url: &str) -> Request {
        Request::new(Method::GET, Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_rotation_follows_failure_count() {
        let transport = Transport::new(TransportOptions {
            proxies: dead_proxies(3),
            rotate_proxies: true,
            timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(transport.proxy_index(), 0);
        for _ in 0..4 {
            assert!(transport.execute(get("http://127.0.0.1:1/")).await.is_err());
        }

        assert_eq!(transport.proxy_index(), 4 % 3);
        assert_eq!(transport.active_proxy(), Some("http://127.0.0.1:2".to_string()));
    }

    #[tokio::test]
    async fn test_no_rotation_when_disabled() {
        let transport = Transport::new(TransportOptions {
            proxies: dead_proxies(2),
            rotate_proxies: false,
            connect_timeout: Duration::from_secs(1),
            ..Default::default()
        })
        .unwrap();

        for _ in 0..3 {
            assert!(transport.execute(get("http://127.0.0.1:1/")).await.is_err());
        }
        assert_eq!(transport.proxy_index(), 0);
    }

    #[tokio::test]
    async fn test_single_proxy_never_rotates() {
        let transport = Transport::new(TransportOptions {
            proxies: dead_proxies(1),
            rotate_proxies: true,
            connect_timeout: Duration::from_secs(1),
            ..Default::default()
        })
        .unwrap();

        assert!(transport.execute(get("http://127.0.0.1:1/")).await.is_err());
        assert_eq!(transport.proxy_index(), 0);
    }

    #[test]
    fn test_manual_rotation_wraps() {
        let transport = Transport::new(TransportOptions {
            proxies: dead_proxies(2),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(transport.proxy_count(), 2);
        assert_eq!(transport.rotate_proxy(), 1);
        assert_eq!(transport.rotate_proxy(), 0);
    }

    #[test]
    fn test_direct_transport_has_no_proxy() {
        let transport = Transport::new(TransportOptions::default()).unwrap();
        assert_eq!(transport.proxy_count(), 0);
        assert_eq!(transport.active_proxy(), None);
        assert_eq!(transport.rotate_proxy(), 0);
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let mut headers = BTreeMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        let result = Transport::new(TransportOptions {
            headers,
            ..Default::default()
        });
        assert!(matches!(result, Err(ScanError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_default_headers_and_cookies_applied() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("user-agent", "quarry-test"))
            .and(header("x-api-key", "secret"))
            .and(header("cookie", "session=abc; theme=dark"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut headers = BTreeMap::new();
        headers.insert("X-Api-Key".to_string(), "secret".to_string());
        let mut cookies = BTreeMap::new();
        cookies.insert("session".to_string(), "abc".to_string());
        cookies.insert("theme".to_string(), "dark".to_string());

        let transport = Transport::new(TransportOptions {
            user_agent: "quarry-test".to_string(),
            headers,
            cookies,
            ..Default::default()
        })
        .unwrap();

        let response = transport
            .execute(get(&format!("{}/", mock_server.uri())))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    #[tokio::test]
    async fn test_caller_headers_win() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(header("user-agent", "custom-agent"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = Transport::new(TransportOptions::default()).unwrap();
        let mut request = get(&mock_server.uri());
        request
            .headers_mut()
            .insert(USER_AGENT, HeaderValue::from_static("custom-agent"));

        let response = transport.execute(request).await.unwrap();
        assert_eq!(response.status().as_u16(), 204);
    }

    #[tokio::test]
    async fn test_redirect_cap_returns_redirect_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/start"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/next"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/next"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let capped = Transport::new(TransportOptions {
            max_redirects: 0,
            ..Default::default()
        })
        .unwrap();
        let response = capped
            .execute(get(&format!("{}/start", mock_server.uri())))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 302);

        let following = Transport::new(TransportOptions::default()).unwrap();
        let response = following
            .execute(get(&format!("{}/start", mock_server.uri())))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }
}
