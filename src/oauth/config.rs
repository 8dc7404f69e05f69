//! Immutable provider configuration shared by every request
//!
//! Built once at startup from [`FbsrSettings`] and injected into each component.

use std::time::Duration;

use thiserror::Error;

use crate::oauth::signed_request::SignatureAlgorithm;
use crate::oauth::token_verifier::ScopeSet;
use crate::settings::FbsrSettings;

/// Prefix of the cookie written by the JavaScript SDK
pub const SIGNED_REQUEST_COOKIE_PREFIX: &str = "fbsr_";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("client_id is not configured for the facebook provider")]
    MissingClientId,

    #[error("client_secret is not configured for the facebook provider")]
    MissingClientSecret,

    #[error("invalid URL for {field}: {reason}")]
    InvalidUrl { field: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub site: String,
    pub authorize_url: String,
    pub token_path: String,
    pub debug_token_path: String,
    pub default_scope: String,
    pub required_scopes: ScopeSet,
    /// Callback URL used for authorize redirects and, by default, code exchange
    pub callback_url: String,
    pub info_fields: String,
    pub fetch_raw_info: bool,
    pub request_timeout: Duration,
    pub signature_algorithm: SignatureAlgorithm,
}

impl ProviderConfig {
    /// Build and validate the provider configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The client id or client secret is missing or empty
    /// - The Graph API site or authorize URL cannot be parsed
    pub fn from_settings(settings: &FbsrSettings) -> Result<Self, ConfigError> {
        let provider = &settings.provider;

        let client_id = provider
            .get_client_id()
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingClientId)?;
        let client_secret = provider
            .get_client_secret()
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::MissingClientSecret)?;

        validate_url("site", &provider.site)?;
        validate_url("authorize_url", &provider.authorize_url)?;

        Ok(Self {
            client_id,
            client_secret,
            site: provider.site.trim_end_matches('/').to_string(),
            authorize_url: provider.authorize_url.clone(),
            token_path: provider.token_path.clone(),
            debug_token_path: provider.debug_token_path.clone(),
            default_scope: provider.default_scope.clone(),
            required_scopes: provider.required_scopes.iter().cloned().collect(),
            callback_url: settings.get_callback_url(),
            info_fields: provider.info_fields.clone(),
            fetch_raw_info: provider.fetch_raw_info,
            request_timeout: Duration::from_secs(provider.request_timeout_seconds),
            signature_algorithm: SignatureAlgorithm::HmacSha256,
        })
    }

    /// Name of the signed request cookie for this application
    #[must_use]
    pub fn signed_request_cookie_name(&self) -> String {
        format!("{SIGNED_REQUEST_COOKIE_PREFIX}{}", self.client_id)
    }

    /// App access proof sent with token introspection calls: `client_id|client_secret`
    #[must_use]
    pub fn app_access_proof(&self) -> String {
        format!("{}|{}", self.client_id, self.client_secret)
    }

    #[must_use]
    pub fn secret_bytes(&self) -> &[u8] {
        self.client_secret.as_bytes()
    }

    /// Join a Graph API path onto the configured site
    #[must_use]
    pub fn graph_url(&self, path: &str) -> String {
        format!("{}/{}", self.site, path.trim_start_matches('/'))
    }
}

fn validate_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidUrl {
            field,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ProviderSettings;

    fn settings_with(client_id: Option<&str>, client_secret: Option<&str>) -> FbsrSettings {
        FbsrSettings {
            provider: ProviderSettings {
                client_id: client_id.map(ToString::to_string),
                client_secret: client_secret.map(ToString::to_string),
                client_id_env: None,
                client_secret_env: None,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_provider_config_creation() {
        let config = ProviderConfig::from_settings(&settings_with(Some("123"), Some("abc"))).unwrap();

        assert_eq!(config.client_id, "123");
        assert_eq!(config.signed_request_cookie_name(), "fbsr_123");
        assert_eq!(config.app_access_proof(), "123|abc");
        assert_eq!(
            config.callback_url,
            "http://localhost:8080/auth/facebook/callback"
        );
        assert!(config.required_scopes.contains("email"));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_missing_credentials() {
        assert_eq!(
            ProviderConfig::from_settings(&settings_with(None, Some("abc"))).unwrap_err(),
            ConfigError::MissingClientId
        );
        assert_eq!(
            ProviderConfig::from_settings(&settings_with(Some("123"), Some(""))).unwrap_err(),
            ConfigError::MissingClientSecret
        );
    }

    #[test]
    fn test_invalid_site_is_rejected() {
        let mut settings = settings_with(Some("123"), Some("abc"));
        settings.provider.site = "not a url".to_string();

        assert!(matches!(
            ProviderConfig::from_settings(&settings),
            Err(ConfigError::InvalidUrl { field: "site", .. })
        ));
    }

    #[test]
    fn test_graph_url_joining() {
        let mut settings = settings_with(Some("123"), Some("abc"));
        settings.provider.site = "https://graph.example.com/v1/".to_string();
        let config = ProviderConfig::from_settings(&settings).unwrap();

        assert_eq!(config.graph_url("/me"), "https://graph.example.com/v1/me");
        assert_eq!(config.graph_url("debug_token"), "https://graph.example.com/v1/debug_token");
    }
}
