// Request phase and failure endpoint
use std::collections::HashMap;

use actix_web::{web, HttpResponse, Result};
use log::error;

use super::types::FailureQuery;
use crate::oauth::authorize::build_authorize_url;
use crate::oauth::CallbackOrchestrator;
use crate::settings::FbsrSettings;
use crate::utils::cookie_utils::create_state_cookie;
use crate::utils::crypto::generate_state_token;
use crate::utils::response_builder::{ResponseBuilder, STRATEGY_NAME};

/// Redirect to the Facebook authorize dialog
///
/// A fresh `state` is stored in a short-lived cookie and checked on callback.
///
/// # Errors
///
/// This function currently never returns an error; configuration problems are
/// reported as a 500 JSON response
pub async fn facebook_request_phase(
    query: web::Query<HashMap<String, String>>,
    orchestrator: web::Data<CallbackOrchestrator>,
    settings: web::Data<FbsrSettings>,
) -> Result<HttpResponse> {
    let state = generate_state_token();

    match build_authorize_url(orchestrator.config(), &query, &state) {
        Ok(request) => {
            let cookie = create_state_cookie(&request.state, &settings.cookies);
            Ok(ResponseBuilder::redirect_with_cookie(&request.url, Some(cookie)))
        }
        Err(e) => {
            error!("Failed to build authorize URL: {e}");
            Ok(ResponseBuilder::configuration_error("authorize URL is misconfigured"))
        }
    }
}

/// Failure endpoint the callback redirects to
///
/// # Errors
///
/// This function currently never returns an error
pub async fn auth_failure(query: web::Query<FailureQuery>) -> Result<HttpResponse> {
    let message = query.message.as_deref().unwrap_or("unknown_error");
    let strategy = query.strategy.as_deref().unwrap_or(STRATEGY_NAME);
    Ok(ResponseBuilder::failure_json(message, strategy))
}
