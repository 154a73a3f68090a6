//! Token sources.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tidings_core::error::CredentialError;
use tidings_transport::rest::RestClient;

/// Somewhere a token candidate can be read from.
///
/// Sources return raw strings; the provider applies the shape check.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Returns a candidate, `None` if the source has nothing.
    async fn fetch(&self) -> Result<Option<String>, CredentialError>;
}

/// A token known up front, such as one embedded by the host application.
#[derive(Debug, Clone)]
pub struct StaticTokenSource {
    name: String,
    value: Option<String>,
}

impl StaticTokenSource {
    /// Creates a static source.
    #[must_use]
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Option<String>, CredentialError> {
        Ok(self.value.clone())
    }
}

/// Reads the token from an environment variable on every fetch.
#[derive(Debug, Clone)]
pub struct EnvTokenSource {
    var: String,
}

impl EnvTokenSource {
    /// Creates a source reading `var`.
    #[must_use]
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl TokenSource for EnvTokenSource {
    fn name(&self) -> &str {
        &self.var
    }

    async fn fetch(&self) -> Result<Option<String>, CredentialError> {
        Ok(std::env::var(&self.var).ok().filter(|value| !value.is_empty()))
    }
}

/// Fetches a fresh nonce through an AJAX action.
///
/// The request is sent without a token header; the point is to recover
/// after the current token stopped working.
#[derive(Debug, Clone)]
pub struct HttpNonceSource {
    rest: Arc<RestClient>,
    action: String,
}

impl HttpNonceSource {
    /// Creates a source calling `action` on the AJAX endpoint.
    #[must_use]
    pub fn new(rest: Arc<RestClient>, action: impl Into<String>) -> Self {
        Self {
            rest,
            action: action.into(),
        }
    }
}

#[async_trait]
impl TokenSource for HttpNonceSource {
    fn name(&self) -> &str {
        &self.action
    }

    async fn fetch(&self) -> Result<Option<String>, CredentialError> {
        let body: Value = self
            .rest
            .ajax(&self.action)
            .send_json()
            .await
            .map_err(|e| CredentialError::SourceFailed {
                source_name: self.action.clone(),
                reason: e.to_string(),
            })?;
        Ok(parse_nonce(&body))
    }
}

/// Extracts the nonce from `{nonce}` or `{success: true, data: {nonce}}`.
#[must_use]
pub fn parse_nonce(body: &Value) -> Option<String> {
    let nonce = match body.get("success").and_then(Value::as_bool) {
        Some(false) => None,
        Some(true) => body.pointer("/data/nonce").or_else(|| body.get("nonce")),
        None => body.get("nonce"),
    }?;
    nonce.as_str().map(str::to_string)
}
