//! Credential resolution for the login callback
//!
//! Exactly one authorization source is chosen per callback, in this order:
//!
//! 1. an `access_token` request parameter
//! 2. a `code` request parameter
//! 3. the `code` inside a verified `fbsr_<client_id>` signed request cookie
//!
//! A code taken from the cookie needs two temporary exceptions while it is
//! exchanged: the `state` check is skipped (the SDK never saw our state) and the
//! exchange `redirect_uri` is empty, because that is what the provider recorded
//! when it issued the cookie. [`SignedCookieOverride`] applies both and puts the
//! previous values back when it goes out of scope.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use thiserror::Error;

use crate::oauth::config::ProviderConfig;
use crate::oauth::context::{CallbackContext, StrategyOptions};
use crate::oauth::signed_request::SignedRequestError;
use crate::utils::logging::LoggingHelper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeOrigin {
    /// `code` request parameter
    Direct,
    /// `code` field of the verified signed request cookie
    SignedCookie,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    BearerToken(String),
    AuthorizationCode { code: String, origin: CodeOrigin },
}

impl CredentialSource {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BearerToken(_) => "access_token",
            Self::AuthorizationCode {
                origin: CodeOrigin::Direct,
                ..
            } => "code",
            Self::AuthorizationCode {
                origin: CodeOrigin::SignedCookie,
                ..
            } => "signed_request_cookie",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error(transparent)]
    SignedRequest(#[from] SignedRequestError),

    #[error(
        "must pass either a `code` (via URL or by an `fbsr_XXX` signed request cookie) or an `access_token`"
    )]
    NoAuthorizationCode,
}

#[derive(Debug, Clone)]
pub struct CredentialResolver {
    config: Arc<ProviderConfig>,
}

impl CredentialResolver {
    #[must_use]
    pub fn new(config: Arc<ProviderConfig>) -> Self {
        Self { config }
    }

    /// Pick the authorization source for this callback
    ///
    /// `cookies` looks a cookie up by name. The signed request is only decoded
    /// when neither parameter is present, and the decoded value is memoized in `ctx`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The signed request cookie is present but malformed, uses an unknown
    ///   algorithm or fails signature verification
    /// - No token, code or code-bearing cookie is available
    pub fn resolve(
        &self,
        ctx: &CallbackContext,
        cookies: &dyn Fn(&str) -> Option<String>,
    ) -> Result<CredentialSource, CredentialError> {
        if let Some(token) = ctx.param("access_token") {
            return Ok(CredentialSource::BearerToken(token.to_string()));
        }

        if let Some(code) = ctx.param("code") {
            return Ok(CredentialSource::AuthorizationCode {
                code: code.to_string(),
                origin: CodeOrigin::Direct,
            });
        }

        let cookie_name = self.config.signed_request_cookie_name();
        let cookie_value = cookies(&cookie_name);
        let signed_request = ctx
            .signed_request(cookie_value.as_deref(), &self.config)
            .inspect_err(|e| LoggingHelper::log_signed_request_rejected(&cookie_name, e))?;

        // A verified cookie without a code is treated the same as no cookie
        match signed_request.and_then(|request| request.code()) {
            Some(code) => Ok(CredentialSource::AuthorizationCode {
                code: code.to_string(),
                origin: CodeOrigin::SignedCookie,
            }),
            None => Err(CredentialError::NoAuthorizationCode),
        }
    }
}

/// Scope guard for the signed cookie exceptions
///
/// While alive, the context carries the cookie's code as the `code` parameter,
/// ignores the `state` check and exchanges with an empty `redirect_uri`. Dropping
/// the guard restores the previous parameters and options, including when the
/// enclosing scope exits through `?` or a panic.
pub struct SignedCookieOverride<'a> {
    ctx: &'a mut CallbackContext,
    previous_code: Option<String>,
    previous_options: StrategyOptions,
}

impl<'a> SignedCookieOverride<'a> {
    #[must_use]
    pub fn apply(ctx: &'a mut CallbackContext, code: &str) -> Self {
        let previous_options = ctx.options().clone();
        let previous_code = ctx
            .params_mut()
            .insert("code".to_string(), code.to_string());

        let options = ctx.options_mut();
        options.provider_ignores_state = true;
        options.callback_url = String::new();

        LoggingHelper::log_signed_cookie_override(true);
        Self {
            ctx,
            previous_code,
            previous_options,
        }
    }
}

impl Deref for SignedCookieOverride<'_> {
    type Target = CallbackContext;

    fn deref(&self) -> &Self::Target {
        &*self.ctx
    }
}

impl DerefMut for SignedCookieOverride<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.ctx
    }
}

impl Drop for SignedCookieOverride<'_> {
    fn drop(&mut self) {
        let previous_code = self.previous_code.take();
        let params = self.ctx.params_mut();
        match previous_code {
            Some(code) => {
                params.insert("code".to_string(), code);
            }
            None => {
                params.remove("code");
            }
        }
        *self.ctx.options_mut() = self.previous_options.clone();
        LoggingHelper::log_signed_cookie_override(false);
    }
}
