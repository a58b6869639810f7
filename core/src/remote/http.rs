//! HTTP binding of the notification service

use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::client::HttpConnector;
use hyper::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use hyper::{Body, Client, Method, Request, Uri};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use schema::{FeedPage, NotificationId, PreferencePatch, PreferenceSet, UnreadCount};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use super::{NotificationService, RemoteError, RemoteResult};
use crate::config::RemoteConfig;

/// Everything outside the RFC 3986 unreserved set
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Longest response body kept in an [`RemoteError::UnexpectedStatus`]
const MAX_ERROR_BODY: usize = 512;

/// Notification service client speaking JSON over HTTP/1.1
///
/// Endpoints are resolved relative to `base_url`:
///
/// | Operation | Request |
/// |---|---|
/// | `fetch_feed` | `GET /notifications?limit=N` |
/// | `fetch_unread_count` | `GET /notifications/unread-count` |
/// | `mark_read` | `POST /notifications/{id}/read` |
/// | `mark_all_read` | `POST /notifications/read-all` |
/// | `fetch_preferences` | `GET /notifications/preferences` |
/// | `update_preferences` | `PATCH /notifications/preferences` |
///
/// # Example
///
/// ```rust,no_run
/// use callsheet_core::remote::{HttpNotificationService, NotificationService};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = HttpNotificationService::new("http://127.0.0.1:3000/api", Duration::from_secs(10))?
///     .with_token("secret");
/// let page = service.fetch_feed(20).await?;
/// println!("{} notifications", page.items.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpNotificationService {
    client: Client<HttpConnector>,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpNotificationService {
    /// Create a client rooted at `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidUri`] when `base_url` is not a valid URI.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> RemoteResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        base_url.parse::<Uri>()?;
        Ok(Self {
            client: Client::new(),
            base_url,
            token: None,
            timeout,
        })
    }

    /// Build a client from the `[remote]` configuration section
    pub fn from_config(config: &RemoteConfig) -> RemoteResult<Self> {
        let service = Self::new(config.base_url.clone(), config.timeout())?;
        Ok(match &config.token {
            Some(token) => service.with_token(token.clone()),
            None => service,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> RemoteResult<Bytes> {
        let uri: Uri = format!("{}{}", self.base_url, path).parse()?;
        debug!("{} {}", method, uri);

        let mut builder = Request::builder()
            .method(method.clone())
            .uri(uri)
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(bytes) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(bytes))?,
            None => builder.body(Body::empty())?,
        };

        let exchange = async {
            let response = self.client.request(req).await?;
            let status = response.status();
            let bytes = hyper::body::to_bytes(response.into_body()).await?;
            Ok::<_, RemoteError>((status, bytes))
        };

        let (status, bytes) = match timeout(self.timeout, exchange).await {
            Ok(result) => result?,
            Err(_elapsed) => {
                debug!("{} {} timed out after {:?}", method, path, self.timeout);
                return Err(RemoteError::Timeout(self.timeout));
            }
        };

        if !status.is_success() {
            let mut body = String::from_utf8_lossy(&bytes).into_owned();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(RemoteError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(bytes)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> RemoteResult<T> {
        let bytes = self.send(Method::GET, path, None).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl NotificationService for HttpNotificationService {
    async fn fetch_feed(&self, limit: u32) -> RemoteResult<FeedPage> {
        self.get_json(&format!("/notifications?limit={limit}")).await
    }

    async fn fetch_unread_count(&self) -> RemoteResult<UnreadCount> {
        self.get_json("/notifications/unread-count").await
    }

    async fn mark_read(&self, id: &NotificationId) -> RemoteResult<()> {
        let path = format!("/notifications/{}/read", encode_segment(id.as_str()));
        self.send(Method::POST, &path, None).await?;
        Ok(())
    }

    async fn mark_all_read(&self) -> RemoteResult<()> {
        self.send(Method::POST, "/notifications/read-all", None).await?;
        Ok(())
    }

    async fn fetch_preferences(&self) -> RemoteResult<PreferenceSet> {
        self.get_json("/notifications/preferences").await
    }

    async fn update_preferences(&self, patch: &PreferencePatch) -> RemoteResult<()> {
        let body = serde_json::to_vec(patch)?;
        self.send(Method::PATCH, "/notifications/preferences", Some(body))
            .await?;
        Ok(())
    }
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Response, Server};
    use schema::{Channel, NotificationKind};
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};
    use tokio::task;

    #[derive(Debug, Clone)]
    struct Recorded {
        method: Method,
        path_and_query: String,
        authorization: Option<String>,
        body: String,
    }

    type Log = Arc<Mutex<Vec<Recorded>>>;

    async fn route(method: &Method, path: &str) -> Response<Body> {
        match (method, path) {
            (&Method::GET, "/api/notifications") => Response::new(Body::from(
                r#"{"items":[{"id":7,"type":"new_message","title":"Hi","read":false,"created_at":"2024-05-01T10:00:00Z"}]}"#,
            )),
            (&Method::GET, "/api/notifications/unread-count") => {
                Response::new(Body::from(r#"{"count":4}"#))
            }
            (&Method::GET, "/api/notifications/preferences") => Response::new(Body::from(
                r#"{"in_app_enabled":true,"email_enabled":false,"push_enabled":true,"new_message_channels":{"in_app":false}}"#,
            )),
            (&Method::GET, "/api/slow/notifications/unread-count") => {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Response::new(Body::from(r#"{"count":1}"#))
            }
            (&Method::GET, "/api/broken/notifications/unread-count") => Response::builder()
                .status(500)
                .body(Body::from("boom"))
                .unwrap(),
            (&Method::POST, _) | (&Method::PATCH, _) => Response::new(Body::from("{}")),
            _ => Response::builder()
                .status(404)
                .body(Body::from("not found"))
                .unwrap(),
        }
    }

    // Starts a server that records every request and answers from `route`.
    async fn start_test_server() -> (u16, Log) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let server_log = log.clone();
        let make_svc = make_service_fn(move |_conn| {
            let log = server_log.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let log = log.clone();
                    async move {
                        let method = req.method().clone();
                        let path = req.uri().path().to_string();
                        let path_and_query = req
                            .uri()
                            .path_and_query()
                            .map(|pq| pq.as_str().to_string())
                            .unwrap_or_default();
                        let authorization = req
                            .headers()
                            .get(AUTHORIZATION)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        let body = hyper::body::to_bytes(req.into_body()).await.unwrap();
                        log.lock().unwrap().push(Recorded {
                            method: method.clone(),
                            path_and_query,
                            authorization,
                            body: String::from_utf8_lossy(&body).into_owned(),
                        });
                        Ok::<_, Infallible>(route(&method, &path).await)
                    }
                }))
            }
        });

        let addr = ([127, 0, 0, 1], 0).into();
        let server = Server::bind(&addr).serve(make_svc);
        let port = server.local_addr().port();

        task::spawn(async move {
            if let Err(e) = server.await {
                eprintln!("Server error: {}", e);
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        (port, log)
    }

    fn service(port: u16, prefix: &str) -> HttpNotificationService {
        HttpNotificationService::new(
            format!("http://127.0.0.1:{port}{prefix}/"),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_feed_sends_limit_and_token() {
        let (port, log) = start_test_server().await;
        let client = service(port, "/api").with_token("secret");

        let page = client.fetch_feed(20).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id.as_str(), "7");
        assert_eq!(page.items[0].kind, NotificationKind::NewMessage);

        let recorded = log.lock().unwrap()[0].clone();
        assert_eq!(recorded.method, Method::GET);
        assert_eq!(recorded.path_and_query, "/api/notifications?limit=20");
        assert_eq!(recorded.authorization.as_deref(), Some("Bearer secret"));
    }

    #[tokio::test]
    async fn test_unread_count_and_preferences() {
        let (port, _log) = start_test_server().await;
        let client = service(port, "/api");

        assert_eq!(client.fetch_unread_count().await.unwrap().count, 4);

        let prefs = client.fetch_preferences().await.unwrap();
        assert!(!prefs.email_enabled);
        assert!(!prefs.allows(NotificationKind::NewMessage, Channel::InApp));
        assert!(prefs.allows(NotificationKind::NewFollower, Channel::InApp));
    }

    #[tokio::test]
    async fn test_mutations_hit_expected_paths() {
        let (port, log) = start_test_server().await;
        let client = service(port, "/api");

        client.mark_read(&NotificationId::new("42")).await.unwrap();
        client.mark_all_read().await.unwrap();
        let patch = PreferencePatch::new().global(Channel::Email, false);
        client.update_preferences(&patch).await.unwrap();

        let recorded = log.lock().unwrap().clone();
        assert_eq!(recorded.len(), 3);
        assert_eq!(recorded[0].method, Method::POST);
        assert_eq!(recorded[0].path_and_query, "/api/notifications/42/read");
        assert!(recorded[0].authorization.is_none());
        assert_eq!(recorded[1].path_and_query, "/api/notifications/read-all");
        assert_eq!(recorded[2].method, Method::PATCH);
        assert_eq!(recorded[2].path_and_query, "/api/notifications/preferences");
        let body: serde_json::Value = serde_json::from_str(&recorded[2].body).unwrap();
        assert_eq!(body["email_enabled"], serde_json::json!(false));
    }

    #[tokio::test]
    async fn test_unexpected_status() {
        let (port, _log) = start_test_server().await;
        let client = service(port, "/api/broken");

        match client.fetch_unread_count().await.unwrap_err() {
            RemoteError::UnexpectedStatus { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("Expected RemoteError::UnexpectedStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let (port, _log) = start_test_server().await;
        let client = HttpNotificationService::new(
            format!("http://127.0.0.1:{port}/api/slow"),
            Duration::from_millis(100),
        )
        .unwrap();

        match client.fetch_unread_count().await.unwrap_err() {
            RemoteError::Timeout(d) => assert_eq!(d, Duration::from_millis(100)),
            other => panic!("Expected RemoteError::Timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = service(port, "");
        let err = client.fetch_feed(5).await.unwrap_err();
        assert!(matches!(err, RemoteError::Http(_)), "got {:?}", err);
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let err = HttpNotificationService::new("http://bad host", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, RemoteError::InvalidUri(_)));
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("local-1a2b"), "local-1a2b");
        assert_eq!(encode_segment("a/b c"), "a%2Fb%20c");
        assert_eq!(encode_segment("v1.2_x~y"), "v1.2_x~y");
        assert_eq!(encode_segment("ü?#"), "%C3%BC%3F%23");
    }
}
