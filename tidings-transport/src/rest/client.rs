//! REST client for the realtime endpoints.

use reqwest::{Client, Method, Response, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tidings_core::error::{NetworkError, ProtocolError, Result};
use tidings_core::types::Token;
use tracing::debug;

use super::config::RestConfig;

/// HTTP client for the realtime REST and AJAX endpoints.
///
/// Every request built through [`RequestBuilder::token`] carries the token in
/// the configured nonce header.
///
/// ```ignore
/// let client = RestClient::new(RestConfig::new(rest_base, ajax_url))?;
/// let body: Value = client
///     .get("/realtime/messages")
///     .query("session_id", "abc")
///     .token(&token)
///     .send_json()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct RestClient {
    config: RestConfig,
    http_client: Client,
}

impl RestClient {
    /// Creates a new REST client.
    pub fn new(config: RestConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            config
                .user_agent
                .parse()
                .map_err(|_| NetworkError::ConnectionFailed {
                    reason: "Invalid user agent".to_string(),
                })?,
        );

        let http_client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| NetworkError::ConnectionFailed {
                reason: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Creates a GET request against the REST base.
    #[must_use]
    pub fn get(&self, path: &str) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::GET, self.build_url(path))
    }

    /// Creates a POST request against the REST base.
    #[must_use]
    pub fn post(&self, path: &str) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::POST, self.build_url(path))
    }

    /// Creates a GET request for an AJAX action.
    #[must_use]
    pub fn ajax(&self, action: &str) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::GET, self.config.ajax_url.clone()).query("action", action)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    /// Builds the full URL for a path.
    #[must_use]
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
        }
    }

    async fn execute_request(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                NetworkError::Timeout {
                    timeout_ms: self.config.timeout_ms,
                }
            } else if e.is_connect() {
                NetworkError::ConnectionFailed {
                    reason: e.to_string(),
                }
            } else {
                NetworkError::Http {
                    status_code: e.status().map_or(0, |s| s.as_u16()),
                    reason: e.to_string(),
                }
            }
        })?;
        Ok(response)
    }
}

/// Request builder for REST calls.
pub struct RequestBuilder<'a> {
    client: &'a RestClient,
    method: Method,
    url: String,
    query_params: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    token: Option<String>,
}

impl<'a> RequestBuilder<'a> {
    fn new(client: &'a RestClient, method: Method, url: String) -> Self {
        Self {
            client,
            method,
            url,
            query_params: Vec::new(),
            body: None,
            token: None,
        }
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Sets the request body as JSON.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body).map_err(ProtocolError::encode)?);
        Ok(self)
    }

    /// Sends `token` in the nonce header.
    #[must_use]
    pub fn token(mut self, token: &Token) -> Self {
        self.token = Some(token.expose().to_string());
        self
    }

    /// Sends the request and returns the raw response.
    pub async fn send(self) -> Result<Response> {
        debug!(method = %self.method, url = %self.url, "Sending request");

        let mut request = self.client.http_client.request(self.method, &self.url);
        if !self.query_params.is_empty() {
            request = request.query(&self.query_params);
        }
        if let Some(token) = &self.token {
            request = request.header(self.client.config.nonce_header.as_str(), token.as_str());
        }
        if let Some(body) = &self.body {
            request = request.json(body);
        }

        self.client.execute_request(request).await
    }

    /// Sends the request and deserializes a successful JSON response.
    ///
    /// Non-2xx statuses become [`NetworkError::Http`] carrying the body.
    pub async fn send_json<T: DeserializeOwned>(self) -> Result<T> {
        let response = self.send().await?;
        let status = response.status();

        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            return Err(NetworkError::Http {
                status_code: status.as_u16(),
                reason,
            }
            .into());
        }

        let text = response.text().await.map_err(|e| NetworkError::ConnectionClosed {
            reason: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ProtocolError::decode(e).into())
    }
}
