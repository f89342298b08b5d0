use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

use super::request::{Request, Response, ResponseSource};
use crate::error::TransportError;

/// Anything that can carry a request to its destination.
///
/// The plain HTTP client implements this, and so does the offline worker,
/// which wraps another transport and answers from its caches when it can.
#[async_trait]
pub trait Transport: Send + Sync {
  /// Send a request. Non-2xx answers are still `Ok`; only failures to get
  /// an answer at all are errors.
  async fn send(&self, request: &Request) -> Result<Response, TransportError>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new(timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("quicklook/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn send(&self, request: &Request) -> Result<Response, TransportError> {
    debug!(method = %request.method(), url = request.url(), "sending request");

    let response = self
      .client
      .request(request.method().clone(), request.url())
      .send()
      .await
      .map_err(transport_error)?;

    let status = response.status();
    let content_type = response
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(String::from);
    let body = response.bytes().await.map_err(transport_error)?;

    Ok(Response {
      status,
      content_type,
      body: body.to_vec(),
      source: ResponseSource::Network,
    })
  }
}

fn transport_error(err: reqwest::Error) -> TransportError {
  if err.is_timeout() {
    TransportError::Timeout
  } else {
    TransportError::Network(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use reqwest::StatusCode;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  #[tokio::test]
  async fn test_send_returns_body_and_content_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/v1/forecast"))
      .and(query_param("latitude", "51.5"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "current_weather": {} })),
      )
      .mount(&mock_server)
      .await;

    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    let url = format!("{}/v1/forecast?latitude=51.5", mock_server.uri());
    let response = transport.send(&Request::get(url)).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.source, ResponseSource::Network);
    assert!(response
      .content_type
      .as_deref()
      .unwrap_or_default()
      .starts_with("application/json"));
    let body: serde_json::Value = response.parse_json().unwrap();
    assert!(body.get("current_weather").is_some());
  }

  #[tokio::test]
  async fn test_non_success_status_is_not_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/missing"))
      .respond_with(ResponseTemplate::new(404))
      .mount(&mock_server)
      .await;

    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    let url = format!("{}/missing", mock_server.uri());
    let response = transport.send(&Request::get(url)).await.unwrap();

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(!response.is_success());
  }

  #[tokio::test]
  async fn test_slow_upstream_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
      .mount(&mock_server)
      .await;

    let transport = HttpTransport::new(Duration::from_millis(50)).unwrap();
    let err = transport
      .send(&Request::get(mock_server.uri()))
      .await
      .unwrap_err();

    assert_eq!(err, TransportError::Timeout);
  }

  #[tokio::test]
  async fn test_unreachable_host_is_network_error() {
    let transport = HttpTransport::new(Duration::from_secs(1)).unwrap();
    let err = transport
      .send(&Request::get("/index.html"))
      .await
      .unwrap_err();

    assert!(matches!(err, TransportError::Network(_)));
  }
}
