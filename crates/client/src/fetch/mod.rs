//! Network fetch primitive used on cache misses and at install time.
//!
//! ### Response classification
//! - Non-2xx statuses are returned as responses, never raised.
//! - A response whose final URL (after redirects) shares the configured
//!   origin is `basic`; anything else is `cors` and will not be cached.
//!
//! ### Safety limits
//! - Max redirects: 5
//! - Bodies are read whole; the store decides separately what is small enough to keep.

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, Method, Url, header};
use std::time::{Duration, Instant};

pub use url::{UrlError, parse_origin, resolve, same_origin};

use taskcache_core::{AppConfig, CacheRequest, Error, ResponseSnapshot, ResponseType};

/// The network side of a request: request in, response out (or failure).
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &CacheRequest) -> Result<ResponseSnapshot, Error>;
}

#[async_trait]
impl<T: Fetcher + ?Sized> Fetcher for std::sync::Arc<T> {
    async fn fetch(&self, request: &CacheRequest) -> Result<ResponseSnapshot, Error> {
        self.as_ref().fetch(request).await
    }
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Origin of the controlled page
    pub origin: Url,

    /// User agent string (default: "taskcache/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl FetchConfig {
    /// Default limits for the given page origin.
    pub fn for_origin(origin: Url) -> Self {
        Self {
            origin,
            user_agent: "taskcache/0.1".to_string(),
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }

    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        let origin = parse_origin(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            ..Self::for_origin(origin)
        })
    }
}

/// HTTP fetch client backed by reqwest.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    fn classify(&self, final_url: &Url) -> ResponseType {
        if same_origin(&self.config.origin, final_url) { ResponseType::Basic } else { ResponseType::Cors }
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() { Error::FetchTimeout(err.to_string()) } else { Error::Network(err.to_string()) }
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &CacheRequest) -> Result<ResponseSnapshot, Error> {
        let start = Instant::now();
        let url = Url::parse(&request.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("unsupported method: {}", request.method)))?;

        let response = self
            .http
            .request(method, url.clone())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let final_url = response.url().clone();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();

        let body = response.bytes().await.map_err(transport_error)?;
        let response_type = self.classify(&final_url);

        tracing::debug!(
            method = %request.method,
            url = %url,
            final_url = %final_url,
            status = status.as_u16(),
            response_type = %response_type,
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "network fetch complete"
        );

        Ok(ResponseSnapshot {
            url: final_url.to_string(),
            status: status.as_u16(),
            response_type,
            headers,
            body,
            fetched_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// Content-Type of a snapshot, if the server sent one.
pub fn content_type(response: &ResponseSnapshot) -> Option<&str> {
    response.header(header::CONTENT_TYPE.as_str())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Raw HTTP/1.1 response bytes.
    pub(crate) fn raw(status: u16, headers: &[(&str, &[u8])], body: &[u8]) -> Vec<u8> {
        let mut out =
            format!("HTTP/1.1 {status} Canned\r\nContent-Length: {}\r\nConnection: close\r\n", body.len()).into_bytes();
        for (name, value) in headers {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(body);
        out
    }

    /// Serve canned responses keyed by request path on a local port; unknown paths get a 404.
    pub(crate) async fn serve(routes: HashMap<&'static str, Vec<u8>>) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = Arc::new(routes);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let routes = Arc::clone(&routes);
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let mut read = 0;
                    while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf[read..]).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => read += n,
                        }
                    }
                    let head = String::from_utf8_lossy(&buf[..read]);
                    let path = head.split_whitespace().nth(1).unwrap_or("/");
                    let response = routes.get(path).cloned().unwrap_or_else(|| raw(404, &[], b"not found"));
                    let _ = socket.write_all(&response).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Url::parse(&format!("http://{addr}")).unwrap()
    }

    fn client(origin: &Url) -> FetchClient {
        FetchClient::new(FetchConfig::for_origin(origin.clone())).unwrap()
    }

    #[test]
    fn test_fetch_config_for_origin() {
        let config = FetchConfig::for_origin(Url::parse("http://127.0.0.1:5000").unwrap());
        assert_eq!(config.user_agent, "taskcache/0.1");
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app() {
        let app = AppConfig { origin: "https://tasks.example.com".into(), timeout_ms: 1500, ..Default::default() };
        let config = FetchConfig::from_app(&app).unwrap();
        assert_eq!(config.origin.as_str(), "https://tasks.example.com/");
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.user_agent, "taskcache/0.1");
    }

    #[test]
    fn test_fetch_config_from_app_bad_origin() {
        let app = AppConfig { origin: "not a url".into(), ..Default::default() };
        assert!(matches!(FetchConfig::from_app(&app), Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_classify_by_final_origin() {
        let client = FetchClient::new(FetchConfig::for_origin(Url::parse("http://127.0.0.1:5000").unwrap())).unwrap();
        let same = Url::parse("http://127.0.0.1:5000/static/styles.css").unwrap();
        let other = Url::parse("https://cdn.example.com/lib.js").unwrap();
        assert_eq!(client.classify(&same), ResponseType::Basic);
        assert_eq!(client.classify(&other), ResponseType::Cors);
    }

    #[tokio::test]
    async fn test_fetch_invalid_method() {
        let client = FetchClient::new(FetchConfig::for_origin(Url::parse("http://127.0.0.1:5000").unwrap())).unwrap();
        let request = CacheRequest::new("GE T", "http://127.0.0.1:5000/");
        let result = client.fetch(&request).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_network_error() {
        let client = FetchClient::new(FetchConfig::for_origin(Url::parse("http://127.0.0.1:9").unwrap())).unwrap();
        let result = client.fetch(&CacheRequest::get("http://127.0.0.1:9/")).await;
        assert!(matches!(result, Err(Error::Network(_)) | Err(Error::FetchTimeout(_))));
    }

    #[tokio::test]
    async fn test_fetch_same_origin_is_basic() {
        let routes = HashMap::from([(
            "/static/styles.css",
            raw(200, &[("Content-Type", &b"text/css"[..]), ("X-Label", &b"caf\xc3\xa9"[..])], b"body {}"),
        )]);
        let origin = serve(routes).await;
        let url = origin.join("/static/styles.css").unwrap();

        let response = client(&origin).fetch(&CacheRequest::get(url.as_str())).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.response_type, ResponseType::Basic);
        assert_eq!(response.url, url.as_str());
        assert_eq!(response.body.as_ref(), b"body {}");
        assert_eq!(content_type(&response), Some("text/css"));
        assert_eq!(response.header("x-label"), Some("café"));
        assert!(response.is_cacheable());
    }

    #[tokio::test]
    async fn test_fetch_error_status_is_returned() {
        let origin = serve(HashMap::new()).await;
        let url = origin.join("/missing").unwrap();

        let response = client(&origin).fetch(&CacheRequest::get(url.as_str())).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.response_type, ResponseType::Basic);
        assert_eq!(response.body.as_ref(), b"not found");
        assert!(!response.ok());
    }

    #[tokio::test]
    async fn test_fetch_cross_origin_redirect_is_cors() {
        let cdn = serve(HashMap::from([("/lib.js", raw(200, &[], b"js"))])).await;
        let target = cdn.join("/lib.js").unwrap();
        let origin = serve(HashMap::from([("/lib.js", raw(302, &[("Location", target.as_str().as_bytes())], b""))])).await;

        let response = client(&origin).fetch(&CacheRequest::get(origin.join("/lib.js").unwrap().as_str())).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.url, target.as_str());
        assert_eq!(response.response_type, ResponseType::Cors);
        assert!(!response.is_cacheable());
    }

    #[tokio::test]
    async fn test_fetch_large_body_is_read_whole() {
        let body = vec![b'a'; 64 * 1024];
        let origin = serve(HashMap::from([("/big.css", raw(200, &[], &body))])).await;

        let response = client(&origin).fetch(&CacheRequest::get(origin.join("/big.css").unwrap().as_str())).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body.len(), body.len());
    }
}
