// Facebook login callback handler
use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse, Result};
use serde_json::Value;

use super::types::{AuthHash, Credentials, Extra};
use crate::oauth::{AuthResult, CallbackContext, CallbackOrchestrator, ProviderConfig};
use crate::settings::FbsrSettings;
use crate::utils::cookie_utils::{
    cookie_lookup, create_expired_cookie, extract_cookie_value, OAUTH_STATE_COOKIE,
};
use crate::utils::logging::LoggingHelper;
use crate::utils::response_builder::{ResponseBuilder, STRATEGY_NAME};

/// Handle the callback, accepting both query parameters and form posts
///
/// # Errors
///
/// This function currently never returns an error; authentication failures
/// redirect to the failure endpoint
pub async fn facebook_callback(
    query: web::Query<HashMap<String, String>>,
    form: Option<web::Form<HashMap<String, String>>>,
    req: HttpRequest,
    orchestrator: web::Data<CallbackOrchestrator>,
    settings: web::Data<FbsrSettings>,
) -> Result<HttpResponse> {
    let params = merge_params(query.into_inner(), form.map(web::Form::into_inner));
    let param_names: Vec<&String> = params.keys().collect();
    LoggingHelper::log_callback_debug(&req, &param_names);

    let stored_state = extract_cookie_value(&req, OAUTH_STATE_COOKIE).ok();
    let mut ctx =
        CallbackContext::new(params, orchestrator.config()).with_stored_state(stored_state);
    let clear_state = create_expired_cookie(OAUTH_STATE_COOKIE, settings.cookies.secure);

    let cookies = cookie_lookup(&req);
    let result = match orchestrator.run(&mut ctx, &cookies).await {
        Ok(result) => result,
        Err(failure) => {
            return Ok(ResponseBuilder::failure_redirect(failure.code, vec![clear_state]));
        }
    };

    let raw_info = if orchestrator.config().fetch_raw_info {
        match orchestrator.fetch_raw_info(&ctx, &result.access_token).await {
            Ok(info) => info,
            Err(failure) => {
                return Ok(ResponseBuilder::failure_redirect(failure.code, vec![clear_state]));
            }
        }
    } else {
        Value::Object(serde_json::Map::new())
    };

    let auth_hash = build_auth_hash(&ctx, orchestrator.config(), &result, raw_info);
    Ok(HttpResponse::Ok().cookie(clear_state).json(auth_hash))
}

/// Query parameters first, form fields override them
fn merge_params(
    mut query: HashMap<String, String>,
    form: Option<HashMap<String, String>>,
) -> HashMap<String, String> {
    if let Some(form) = form {
        query.extend(form);
    }
    query
}

/// The uid comes from the profile; a verified signed request is the fallback
fn build_auth_hash(
    ctx: &CallbackContext,
    config: &ProviderConfig,
    result: &AuthResult,
    raw_info: Value,
) -> AuthHash {
    let uid = raw_info
        .get("id")
        .and_then(|id| match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .or_else(|| {
            ctx.signed_request(None, config)
                .ok()
                .flatten()
                .and_then(|request| request.user_id())
        });

    let token = &result.access_token;
    AuthHash {
        provider: STRATEGY_NAME,
        uid,
        credentials: Credentials {
            token: token.token().to_string(),
            expires: token.expires(),
            expires_at: token.expires_at().map(|at| at.timestamp()),
        },
        origin: result.origin,
        extra: Extra { raw_info },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_fields_override_query() {
        let query = HashMap::from([
            ("code".to_string(), "from-query".to_string()),
            ("state".to_string(), "s1".to_string()),
        ]);
        let form = HashMap::from([("code".to_string(), "from-form".to_string())]);

        let merged = merge_params(query, Some(form));

        assert_eq!(merged["code"], "from-form");
        assert_eq!(merged["state"], "s1");
    }

    #[test]
    fn test_merge_without_form() {
        let query = HashMap::from([("code".to_string(), "abc".to_string())]);

        assert_eq!(merge_params(query.clone(), None), query);
    }
}
