//! Test fixtures providing pre-built test objects

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;

use super::constants::{
    TEST_CLIENT_ID, TEST_CLIENT_SECRET, TEST_REDIRECT_BASE_URL, TEST_SIGNED_REQUEST_COOKIE,
};
use crate::oauth::config::ProviderConfig;
use crate::oauth::context::CallbackContext;
use crate::oauth::exchange::GraphClient;
use crate::oauth::signed_request::SignatureAlgorithm;
use crate::oauth::token_verifier::ScopeSet;
use crate::settings::{ApplicationSettings, CookieSettings, FbsrSettings, ProviderSettings};
use crate::utils::crypto::hmac_sha256;

/// Produce a signed request the way the JavaScript SDK does
///
/// # Panics
///
/// Panics if `payload` cannot be serialized, which never happens for `Value`.
#[must_use]
pub fn sign_payload(payload: &Value, secret: &[u8]) -> String {
    let json = serde_json::to_vec(payload).expect("payload serializes");
    let payload_segment = URL_SAFE_NO_PAD.encode(json);
    let signature = hmac_sha256(secret, payload_segment.as_bytes());
    format!("{}.{payload_segment}", URL_SAFE_NO_PAD.encode(signature))
}

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Provider configuration pointing at the real Graph API hosts
    #[must_use]
    pub fn provider_config() -> ProviderConfig {
        Self::provider_config_for_site("https://graph.facebook.com/v19.0")
    }

    /// Provider configuration whose Graph API calls go to `site`
    #[must_use]
    pub fn provider_config_for_site(site: &str) -> ProviderConfig {
        ProviderConfig {
            client_id: TEST_CLIENT_ID.to_string(),
            client_secret: TEST_CLIENT_SECRET.to_string(),
            site: site.trim_end_matches('/').to_string(),
            authorize_url: "https://www.facebook.com/v19.0/dialog/oauth".to_string(),
            token_path: "/oauth/access_token".to_string(),
            debug_token_path: "/debug_token".to_string(),
            default_scope: "email".to_string(),
            required_scopes: ScopeSet::parse("email"),
            callback_url: format!("{TEST_REDIRECT_BASE_URL}/auth/facebook/callback"),
            info_fields: "name,email".to_string(),
            fetch_raw_info: true,
            request_timeout: Duration::from_secs(5),
            signature_algorithm: SignatureAlgorithm::HmacSha256,
        }
    }

    /// Settings equivalent to [`TestFixtures::provider_config`], without env lookups
    #[must_use]
    pub fn settings() -> FbsrSettings {
        FbsrSettings {
            application: ApplicationSettings {
                redirect_base_url: TEST_REDIRECT_BASE_URL.to_string(),
                ..ApplicationSettings::default()
            },
            provider: ProviderSettings {
                client_id: Some(TEST_CLIENT_ID.to_string()),
                client_secret: Some(TEST_CLIENT_SECRET.to_string()),
                client_id_env: None,
                client_secret_env: None,
                ..ProviderSettings::default()
            },
            cookies: CookieSettings {
                secure: false,
                ..CookieSettings::default()
            },
            ..FbsrSettings::default()
        }
    }

    /// Graph API client bound to `site`
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built
    #[must_use]
    pub fn graph_client(site: &str) -> GraphClient {
        GraphClient::new(Arc::new(Self::provider_config_for_site(site)))
            .expect("graph client builds")
    }

    /// Callback context carrying `params` for the default provider configuration
    #[must_use]
    pub fn callback_context(params: &[(&str, &str)]) -> CallbackContext {
        let params: HashMap<String, String> = params
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect();
        CallbackContext::new(params, &Self::provider_config())
    }

    #[must_use]
    pub fn signed_request_cookie_name() -> &'static str {
        TEST_SIGNED_REQUEST_COOKIE
    }

    /// `client_id|client_secret` of the test application
    #[must_use]
    pub fn app_access_proof() -> String {
        format!("{TEST_CLIENT_ID}|{TEST_CLIENT_SECRET}")
    }
}
