//! Transport to the chat backend.
//!
//! The session never talks HTTP directly.  It asks a [`Transport`] to open one streamed request
//! per query and reads the returned byte stream chunk by chunk.  [`HttpTransport`] is the
//! production implementation; tests script their own.

use std::env;
use std::pin::Pin;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use url::Url;

use crate::chat::ChatConfig;
use crate::error::{Error, Result};
use crate::observability::{TRANSPORT_REQUEST_ERRORS, TRANSPORT_REQUESTS, TRANSPORT_TTFB};
use crate::types::ChatRequest;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "CONVERSE_API_KEY";

/// Path of the chat endpoint, relative to the configured base URL.
const CHAT_MESSAGES_PATH: &str = "chat-messages";

/// A response body, delivered incrementally.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Something that can issue one streamed chat request.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the response body as a byte stream.
    ///
    /// Fails when the connection cannot be established or the status is not a success.  The
    /// body is never buffered as a whole.
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream>;
}

/// Transport that POSTs to `<base>/chat-messages` with reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    api_key: String,
    client: ReqwestClient,
    endpoint: Url,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Create a transport from the chat configuration.
    ///
    /// The API key comes from the configuration or, failing that, from the `CONVERSE_API_KEY`
    /// environment variable.
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let api_key = match &config.api_key {
            Some(key) => key.clone(),
            None => env::var(API_KEY_ENV).map_err(|_| {
                Error::authentication(format!(
                    "API key not provided and {API_KEY_ENV} environment variable not set"
                ))
            })?,
        };
        HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| Error::authentication("API key is not a valid header value"))?;

        let endpoint = chat_endpoint(&config.base_url)?;
        let mut builder = ReqwestClient::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            api_key,
            client,
            endpoint,
            timeout: config.timeout,
        })
    }

    /// The URL every request is sent to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| Error::authentication("API key is not a valid header value"))?;
        headers.insert(header::AUTHORIZATION, bearer);
        Ok(headers)
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                self.timeout.map(|t| t.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Convert a non-success response into an error, keeping a short excerpt of the body.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        error_for_status(status_code, &body)
    }
}

fn error_for_status(status_code: u16, body: &str) -> Error {
    let excerpt: String = body.trim().chars().take(200).collect();
    match status_code {
        401 | 403 => Error::rejected(
            status_code,
            if excerpt.is_empty() {
                format!("request rejected with status {status_code}")
            } else {
                excerpt
            },
        ),
        _ => Error::api(status_code, excerpt),
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream> {
        TRANSPORT_REQUESTS.click();
        let started = Instant::now();
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(self.headers()?)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                TRANSPORT_REQUEST_ERRORS.click();
                self.map_send_error(e)
            })?;
        TRANSPORT_TTFB.add(started.elapsed().as_secs_f64());

        if !response.status().is_success() {
            TRANSPORT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }

        let timeout = self.timeout;
        let stream = response.bytes_stream().map(move |chunk| {
            chunk.map_err(|e| {
                TRANSPORT_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(
                        format!("Response timed out: {e}"),
                        timeout.map(|t| t.as_secs_f64()),
                    )
                } else {
                    Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
                }
            })
        });
        Ok(Box::pin(stream))
    }
}

/// Join the chat endpoint onto `base_url`, tolerating a missing trailing slash.
fn chat_endpoint(base_url: &str) -> Result<Url> {
    let mut base = Url::parse(base_url)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(CHAT_MESSAGES_PATH)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_with_or_without_slash() {
        assert_eq!(
            chat_endpoint("http://api.example.com/v1").unwrap().as_str(),
            "http://api.example.com/v1/chat-messages"
        );
        assert_eq!(
            chat_endpoint("http://api.example.com/v1/").unwrap().as_str(),
            "http://api.example.com/v1/chat-messages"
        );
    }

    #[test]
    fn bad_base_url_is_a_url_error() {
        let err = chat_endpoint("not a url").unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[test]
    fn transport_creation() {
        let config = ChatConfig::new()
            .with_api_key("test-key")
            .with_base_url("https://chat.example.com/v1")
            .with_timeout(Some(Duration::from_secs(30)));
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.api_key, "test-key");
        assert_eq!(
            transport.endpoint().as_str(),
            "https://chat.example.com/v1/chat-messages"
        );
        assert_eq!(transport.timeout, Some(Duration::from_secs(30)));

        let headers = transport.headers().unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer test-key");
        assert_eq!(headers[header::ACCEPT], "text/event-stream");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn invalid_key_is_rejected() {
        let config = ChatConfig::new().with_api_key("bad\nkey");
        let err = HttpTransport::new(&config).unwrap_err();
        assert!(matches!(err, Error::Authentication { .. }));
    }

    #[test]
    fn error_statuses_keep_their_code() {
        let err = error_for_status(401, "  invalid api key\n");
        assert!(matches!(err, Error::Authentication { .. }));
        assert_eq!(err.status_code(), Some(401));
        assert_eq!(err.transcript_reason(), "HTTP error! status: 401");

        let err = error_for_status(403, "");
        assert_eq!(err.to_string(), "Authentication error: request rejected with status 403");
        assert_eq!(err.transcript_reason(), "HTTP error! status: 403");

        let err = error_for_status(500, "upstream failed");
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(err.transcript_reason(), "HTTP error! status: 500");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let config = ChatConfig::new()
            .with_api_key("test-key")
            .with_base_url("http://127.0.0.1:9/v1")
            .with_timeout(Some(Duration::from_secs(5)));
        let transport = HttpTransport::new(&config).unwrap();
        let err = match transport.open(&ChatRequest::new("hi", "", "guest")).await {
            Ok(_) => panic!("port 9 should refuse the connection"),
            Err(err) => err,
        };
        assert!(err.is_transport());
    }
}
