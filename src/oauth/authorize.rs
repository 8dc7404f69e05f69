//! Request phase: the redirect to the provider's authorize dialog

use std::collections::HashMap;

use crate::oauth::config::{ConfigError, ProviderConfig};
use crate::utils::logging::LoggingHelper;

/// Request parameters forwarded verbatim to the authorize dialog
pub const PASS_THROUGH_PARAMS: [&str; 3] = ["display", "scope", "auth_type"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeRequest {
    pub url: String,
    pub state: String,
}

/// Build the authorize URL for `state`
///
/// `scope` falls back to the configured default. `display`, `scope` and
/// `auth_type` from the incoming request override the defaults when non-empty.
///
/// # Errors
///
/// Returns an error if the configured authorize URL cannot be parsed
pub fn build_authorize_url(
    config: &ProviderConfig,
    request_params: &HashMap<String, String>,
    state: &str,
) -> Result<AuthorizeRequest, ConfigError> {
    let mut url = url::Url::parse(&config.authorize_url).map_err(|e| ConfigError::InvalidUrl {
        field: "authorize_url",
        reason: e.to_string(),
    })?;

    let overrides: Vec<(&str, &str)> = PASS_THROUGH_PARAMS
        .iter()
        .filter_map(|name| {
            request_params
                .get(*name)
                .filter(|value| !value.is_empty())
                .map(|value| (*name, value.as_str()))
        })
        .collect();

    let scope = overrides
        .iter()
        .find(|(name, _)| *name == "scope")
        .map_or(config.default_scope.as_str(), |(_, value)| *value);

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", &config.callback_url)
            .append_pair("response_type", "code")
            .append_pair("scope", scope)
            .append_pair("state", state);
        for (name, value) in overrides.iter().filter(|(name, _)| *name != "scope") {
            query.append_pair(name, value);
        }
    }

    LoggingHelper::log_authorize_redirect(scope, &overrides);
    Ok(AuthorizeRequest {
        url: url.into(),
        state: state.to_string(),
    })
}
