//! HTTP gateway to the REST backend
//!
//! Every backend call goes through [`ApiClient::send`], which attaches the
//! bearer token and applies the request timeout. The gateway does not decide
//! degradation policy: non-success responses come back to the caller intact
//! and are only classified when the caller asks for a typed body.

use crate::error::ApiError;
use crate::identity::{IdentityProvider, TokenCache};
use phub_common::config::ClientConfig;
use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Request timeout applied to every backend call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("phub-client/", env!("CARGO_PKG_VERSION"));

/// Outbound request description
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::Unknown {
            status: None,
            message: format!("failed to encode request body: {}", e),
        })?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }
}

/// Raw backend response: status and body, untouched
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Classify a non-success status into an [`ApiError`]
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::from_status(self.status, &self.body))
        }
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::Unknown {
            status: Some(self.status),
            message: format!("invalid response body: {}", e),
        })
    }

    /// Decode the body as free-form JSON; an empty body is `null`
    pub fn json_value(&self) -> Result<serde_json::Value, ApiError> {
        if self.body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        self.json()
    }
}

/// Backend API client
#[derive(Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
    identity: Arc<dyn IdentityProvider>,
    tokens: TokenCache,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, ApiError> {
        Self::with_options(base_url, identity, TokenCache::default(), REQUEST_TIMEOUT)
    }

    pub fn from_config(
        config: &ClientConfig,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, ApiError> {
        Self::with_options(
            config.api_base_url.clone(),
            identity,
            TokenCache::new(config.api_token.clone()),
            config.request_timeout,
        )
    }

    pub fn with_options(
        base_url: impl Into<String>,
        identity: Arc<dyn IdentityProvider>,
        tokens: TokenCache,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Unknown {
                status: None,
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            identity,
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token_cache(&self) -> &TokenCache {
        &self.tokens
    }

    /// Token to attach: freshly minted when the provider has a current
    /// identity, otherwise whatever was cached
    async fn bearer_token(&self) -> Option<String> {
        if self.identity.current_identity().is_some() {
            match self.identity.fresh_token().await {
                Ok(Some(token)) => {
                    self.tokens.store(token.clone());
                    Some(token)
                }
                Ok(None) => None,
                Err(e) => {
                    warn!("Error adding token: {}", e);
                    None
                }
            }
        } else {
            self.tokens.get()
        }
    }

    /// Send a request and hand back the raw response
    ///
    /// Transport failures (unreachable host, timeout) become
    /// `ApiError::NetworkUnreachable`. Non-success statuses are NOT errors
    /// here; see [`ApiResponse::error_for_status`].
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(method = %request.method, url = %url, "Sending backend request");

        let mut builder = self.http_client.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = self.bearer_token().await {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = builder.send().await.map_err(|e| {
            let err = ApiError::from_transport(&e);
            warn!(method = %request.method, url = %url, error = %err, "Backend request failed");
            err
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;

        debug!(method = %request.method, url = %url, status, "Backend responded");
        Ok(ApiResponse { status, body })
    }

    /// Send and decode a JSON body, classifying failures
    pub async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.send(request).await?.error_for_status()?.json()
    }

    /// Send and discard the body, classifying failures
    pub async fn call_empty(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.send(request).await?.error_for_status()?;
        Ok(())
    }
}
