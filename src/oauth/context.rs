//! Per-request callback state
//!
//! A [`CallbackContext`] lives exactly as long as one callback request. It owns the
//! effective request parameters, the strategy options that the signed cookie flow
//! may temporarily override, and memoized cryptographic results.

use std::borrow::Cow;
use std::collections::HashMap;

use once_cell::unsync::OnceCell;

use crate::oauth::config::ProviderConfig;
use crate::oauth::signed_request::{SignedRequest, SignedRequestError};
use crate::oauth::token_verifier::appsecret_proof;

/// Strategy options that may be overridden while a request is handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyOptions {
    /// Skip the `state` consistency check of the code flow
    pub provider_ignores_state: bool,
    /// `redirect_uri` sent with the code exchange
    pub callback_url: String,
}

#[derive(Debug)]
pub struct CallbackContext {
    params: HashMap<String, String>,
    options: StrategyOptions,
    stored_state: Option<String>,
    signed_request: OnceCell<Option<SignedRequest>>,
    /// `(token, proof)` for the first token a proof was requested for
    appsecret_proof: OnceCell<(String, String)>,
}

impl CallbackContext {
    #[must_use]
    pub fn new(params: HashMap<String, String>, config: &ProviderConfig) -> Self {
        Self {
            params,
            options: StrategyOptions {
                provider_ignores_state: false,
                callback_url: config.callback_url.clone(),
            },
            stored_state: None,
            signed_request: OnceCell::new(),
            appsecret_proof: OnceCell::new(),
        }
    }

    /// Attach the `state` value issued during the authorize phase
    #[must_use]
    pub fn with_stored_state(mut self, state: Option<String>) -> Self {
        self.stored_state = state;
        self
    }

    /// Non-empty request parameter
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    #[must_use]
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub(crate) fn params_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.params
    }

    #[must_use]
    pub fn options(&self) -> &StrategyOptions {
        &self.options
    }

    pub(crate) fn options_mut(&mut self) -> &mut StrategyOptions {
        &mut self.options
    }

    #[must_use]
    pub fn stored_state(&self) -> Option<&str> {
        self.stored_state.as_deref()
    }

    /// Decode and verify the signed request cookie once per request
    ///
    /// A successful result (including "no cookie") is cached; failures are not,
    /// so every attempt reports the same error.
    ///
    /// # Errors
    ///
    /// Returns the decoding error of [`SignedRequest::parse`]
    pub fn signed_request(
        &self,
        cookie_value: Option<&str>,
        config: &ProviderConfig,
    ) -> Result<Option<&SignedRequest>, SignedRequestError> {
        self.signed_request
            .get_or_try_init(|| {
                cookie_value
                    .map(|value| {
                        SignedRequest::parse(
                            value,
                            config.secret_bytes(),
                            config.signature_algorithm,
                        )
                    })
                    .transpose()
            })
            .map(Option::as_ref)
    }

    /// `appsecret_proof` for `token`
    ///
    /// The proof for the first token seen is cached; any other token gets a
    /// freshly computed proof.
    pub fn appsecret_proof(&self, token: &str, secret: &[u8]) -> Cow<'_, str> {
        let (cached_token, proof) = self
            .appsecret_proof
            .get_or_init(|| (token.to_string(), appsecret_proof(token, secret)));
        if cached_token == token {
            Cow::Borrowed(proof.as_str())
        } else {
            Cow::Owned(appsecret_proof(token, secret))
        }
    }
}
