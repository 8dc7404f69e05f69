// Centralized logging utilities to keep handler and flow code free of log formatting
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::oauth::callback::{AuthOrigin, CallbackError, FailureCode};
use crate::oauth::config::ProviderConfig;
use crate::oauth::exchange::GraphError;
use crate::oauth::signed_request::SignedRequestError;

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log provider configuration at startup, never including the secret
    pub fn log_provider_configured(config: &ProviderConfig) {
        info!(
            "✅ Facebook provider configured (client_id: {}, site: {})",
            config.client_id, config.site
        );
        info!(
            "🎯 Required scopes for direct access tokens: [{}]",
            config.required_scopes
        );
        debug!("Callback URL: {}", config.callback_url);
    }

    /// Log authorize redirect building
    pub fn log_authorize_redirect(scope: &str, extra_params: &[(&str, &str)]) {
        info!(
            "🔍 Built Facebook authorize URL with scope: {} and extra params: {:?}",
            scope, extra_params
        );
    }

    /// Log which credential source the callback will use
    pub fn log_credential_resolved(kind: &str) {
        info!("🔑 Callback credential resolved from {}", kind);
    }

    /// Log a rejected signed request cookie
    pub fn log_signed_request_rejected(cookie_name: &str, error: &SignedRequestError) {
        match error {
            SignedRequestError::SignatureMismatch => {
                warn!("⚠️ Signed request cookie {} failed signature verification", cookie_name);
            }
            other => debug!("Signed request cookie {} rejected: {}", cookie_name, other),
        }
    }

    /// Log entering or leaving the signed cookie exchange overrides
    pub fn log_signed_cookie_override(active: bool) {
        if active {
            debug!("Signed cookie overrides applied: state check skipped, empty redirect_uri");
        } else {
            debug!("Signed cookie overrides restored");
        }
    }

    /// Log token exchange start
    pub fn log_token_exchange_start(redirect_uri_empty: bool) {
        info!(
            "🔄 Exchanging authorization code for an access token (redirect_uri: {})",
            if redirect_uri_empty { "empty" } else { "callback" }
        );
    }

    /// Log token exchange summary
    pub fn log_token_exchange_summary(token_len: usize, expires_at: Option<DateTime<Utc>>) {
        info!(
            "🔍 Token exchange summary: access_token={} chars, expires_at={}",
            token_len,
            expires_at.map_or_else(|| "never".to_string(), |at| at.to_rfc3339())
        );
    }

    /// Log a failed token introspection call; the caller only sees a generic failure
    pub fn log_introspection_failed(error: &GraphError) {
        warn!("Token introspection failed: {}", error);
    }

    /// Log a successful callback
    pub fn log_callback_authenticated(origin: AuthOrigin) {
        info!("Facebook callback authenticated via {:?}", origin);
    }

    /// Log a failed callback with the internal cause
    pub fn log_callback_failure(code: FailureCode, error: &CallbackError) {
        match code {
            FailureCode::InvalidSignature | FailureCode::CsrfDetected => {
                warn!("❌ Facebook callback failed ({}): {}", code, error);
            }
            _ => info!("Facebook callback failed ({}): {}", code, error),
        }
    }

    /// Log callback request details in development mode
    pub fn log_callback_debug(req: &actix_web::HttpRequest, param_names: &[&String]) {
        debug!("Facebook callback received via {} with params {:?}", req.method(), param_names);
        debug!("Callback request connection info: {:?}", req.connection_info());
    }
}
