//! Graph API collaborator: authorization code exchange, token introspection and
//! authenticated resource calls
//!
//! The orchestrator only depends on the [`CodeExchange`] and [`TokenIntrospector`]
//! traits. [`GraphClient`] is the production implementation backed by `reqwest`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::oauth::config::ProviderConfig;
use crate::oauth::token_verifier::{appsecret_proof, ScopeSet, TokenIntrospector};
use crate::utils::logging::LoggingHelper;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    #[error("transport error: {0}")]
    Transport(String),
}

/// How the access token is presented on resource calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenMode {
    /// `Authorization` header rendered from [`ExchangeOptions::header_format`]
    Header,
    /// Query parameter named [`ExchangeOptions::param_name`]
    Query,
}

/// Per-call overrides handed to the exchange collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOptions {
    /// Must match the `redirect_uri` used at the authorize step, byte for byte
    pub redirect_uri: String,
    /// `{token}` is replaced with the access token
    pub header_format: String,
    pub param_name: String,
    pub mode: TokenMode,
}

impl ExchangeOptions {
    #[must_use]
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
            header_format: "OAuth {token}".to_string(),
            param_name: "access_token".to_string(),
            mode: TokenMode::Header,
        }
    }
}

/// An access token bound to the client that issued or wrapped it
#[derive(Debug, Clone)]
pub struct AccessToken {
    token: String,
    expires_at: Option<DateTime<Utc>>,
    header_format: String,
    param_name: String,
    mode: TokenMode,
    client: GraphClient,
}

impl AccessToken {
    #[must_use]
    pub fn new(
        token: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
        options: &ExchangeOptions,
        client: GraphClient,
    ) -> Self {
        Self {
            token: token.into(),
            expires_at,
            header_format: options.header_format.clone(),
            param_name: options.param_name.clone(),
            mode: options.mode,
            client,
        }
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    #[must_use]
    pub fn expires(&self) -> bool {
        self.expires_at.is_some()
    }

    /// GET a Graph API resource on behalf of this token
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the provider answers with a
    /// non-success status or the body is not JSON
    pub async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, GraphError> {
        let url = self.client.config.graph_url(path);
        let mut request = self.client.http.get(&url).query(params);
        request = match self.mode {
            TokenMode::Header => request.header(
                reqwest::header::AUTHORIZATION,
                self.header_format.replace("{token}", &self.token),
            ),
            TokenMode::Query => request.query(&[(self.param_name.as_str(), self.token.as_str())]),
        };
        self.client.send_json(request, &url).await
    }
}

/// Authorization code exchange collaborator
#[async_trait]
pub trait CodeExchange: Send + Sync {
    /// Redeem an authorization code for an access token
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the code or the call fails
    async fn exchange_code(
        &self,
        code: &str,
        options: &ExchangeOptions,
    ) -> Result<AccessToken, GraphError>;

    /// Wrap a token the client supplied directly
    fn wrap_token(&self, token: &str, options: &ExchangeOptions) -> AccessToken;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DebugTokenResponse {
    data: Option<DebugTokenData>,
    error: Option<GraphErrorBody>,
}

#[derive(Debug, Deserialize)]
struct DebugTokenData {
    app_id: Option<String>,
    is_valid: Option<bool>,
    #[serde(default)]
    scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    message: Option<String>,
}

/// Graph API client backed by `reqwest`
#[derive(Debug, Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    config: Arc<ProviderConfig>,
}

impl GraphClient {
    /// Create a client whose calls are bounded by the configured timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(config: Arc<ProviderConfig>) -> Result<Self, GraphError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GraphError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn send_json(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<Value, GraphError> {
        let response = request.send().await.map_err(|source| GraphError::Http {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GraphError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| GraphError::InvalidResponse {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl CodeExchange for GraphClient {
    async fn exchange_code(
        &self,
        code: &str,
        options: &ExchangeOptions,
    ) -> Result<AccessToken, GraphError> {
        let url = self.config.graph_url(&self.config.token_path);
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", options.redirect_uri.as_str()),
        ];

        LoggingHelper::log_token_exchange_start(options.redirect_uri.is_empty());
        let body = self.send_json(self.http.post(&url).form(&params), &url).await?;

        let token_response: TokenResponse =
            serde_json::from_value(body).map_err(|e| GraphError::InvalidResponse {
                url: url.clone(),
                reason: format!("failed to parse token response: {e}"),
            })?;

        let expires_at = token_response
            .expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| Utc::now() + Duration::seconds(secs));

        LoggingHelper::log_token_exchange_summary(token_response.access_token.len(), expires_at);
        Ok(AccessToken::new(
            token_response.access_token,
            expires_at,
            options,
            self.clone(),
        ))
    }

    fn wrap_token(&self, token: &str, options: &ExchangeOptions) -> AccessToken {
        AccessToken::new(token, None, options, self.clone())
    }
}

#[async_trait]
impl TokenIntrospector for GraphClient {
    async fn introspect(&self, token: &str, app_access_proof: &str) -> Result<ScopeSet, GraphError> {
        let url = self.config.graph_url(&self.config.debug_token_path);
        let proof = appsecret_proof(token, self.config.secret_bytes());
        let request = self.http.get(&url).query(&[
            ("input_token", token),
            ("access_token", app_access_proof),
            ("appsecret_proof", proof.as_str()),
        ]);

        let body = self.send_json(request, &url).await?;
        let parsed: DebugTokenResponse =
            serde_json::from_value(body).map_err(|e| GraphError::InvalidResponse {
                url: url.clone(),
                reason: format!("failed to parse debug_token response: {e}"),
            })?;

        if let Some(error) = parsed.error {
            return Err(GraphError::InvalidResponse {
                url,
                reason: error
                    .message
                    .unwrap_or_else(|| "provider returned an error".to_string()),
            });
        }

        let data = parsed.data.ok_or_else(|| GraphError::InvalidResponse {
            url: url.clone(),
            reason: "missing data".to_string(),
        })?;

        if let Some(app_id) = data.app_id.as_deref() {
            if app_id != self.config.client_id {
                return Err(GraphError::InvalidResponse {
                    url,
                    reason: format!("token was issued to app {app_id}"),
                });
            }
        }
        if data.is_valid == Some(false) {
            return Err(GraphError::InvalidResponse {
                url,
                reason: "token is not valid".to_string(),
            });
        }

        Ok(data.scopes.into_iter().collect())
    }
}
