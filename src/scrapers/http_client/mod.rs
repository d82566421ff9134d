//! HTTP client for the paged results API.

mod response;
mod user_agent;

pub use response::HttpResponse;
pub use user_agent::{random_user_agent, resolve_user_agent, IMPERSONATE_USER_AGENTS, USER_AGENT};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::config::ApiConfig;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Invalid header '{name}': {message}")]
    InvalidHeader { name: String, message: String },

    #[error("Failed to create HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

/// HTTP client carrying the immutable API configuration.
///
/// Default headers and the subscription key are fixed at construction.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: Arc<ApiConfig>,
}

impl HttpClient {
    /// Create a new HTTP client from `config`.
    pub fn new(config: ApiConfig) -> Result<Self, HttpError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            insert_header(&mut headers, name, value)?;
        }
        if let Some(ref key) = config.subscription_key {
            insert_header(&mut headers, &config.subscription_key_header, key)?;
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(HttpError::Build)?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Make a GET request with query parameters.
    pub async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, HttpError> {
        let start = Instant::now();
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();

        debug!(
            "GET {} {:?} -> {} in {}ms",
            url,
            query,
            status.as_u16(),
            start.elapsed().as_millis()
        );

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }

        Ok(HttpResponse {
            status,
            headers,
            response,
        })
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), HttpError> {
    let invalid = |message: String| HttpError::InvalidHeader {
        name: name.to_string(),
        message,
    };
    let header_name =
        HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
    let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
    headers.insert(header_name, header_value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_configured_headers_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/participants"))
            .and(header("Ocp-Apim-Subscription-Key", "k-123"))
            .and(header("accept", "application/json"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"total\": 1}"))
            .mount(&server)
            .await;

        let config = ApiConfig {
            subscription_key: Some("k-123".to_string()),
            ..ApiConfig::default()
        };
        let client = HttpClient::new(config).unwrap();
        let response = client
            .get(
                &format!("{}/participants", server.uri()),
                &[("offset", "0".to_string())],
            )
            .await
            .unwrap();

        assert!(response.is_success());
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["total"], 1);
    }

    #[tokio::test]
    async fn reports_rate_limiting() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = HttpClient::new(ApiConfig::default()).unwrap();
        let response = client.get(&server.uri(), &[]).await.unwrap();

        assert!(!response.is_success());
        assert!(response.is_rate_limited());
    }

    #[test]
    fn rejects_invalid_header() {
        let mut config = ApiConfig::default();
        config
            .headers
            .insert("bad header".to_string(), "x".to_string());

        assert!(matches!(
            HttpClient::new(config),
            Err(HttpError::InvalidHeader { .. })
        ));
    }
}
