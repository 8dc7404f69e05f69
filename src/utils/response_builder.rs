use actix_web::{cookie::Cookie, HttpResponse};
use serde_json::json;

use crate::oauth::callback::FailureCode;

/// Path the callback redirects to when authentication fails
pub const FAILURE_PATH: &str = "/auth/failure";

/// Strategy name reported alongside failures and successful results
pub const STRATEGY_NAME: &str = "facebook";

pub struct ResponseBuilder;

impl ResponseBuilder {
    /// Create a redirect response with optional cookies
    #[must_use]
    pub fn redirect(location: &str, cookies: Option<Vec<Cookie>>) -> HttpResponse {
        let mut builder = HttpResponse::Found();

        if let Some(cookies_vec) = cookies {
            for cookie in cookies_vec {
                builder.cookie(cookie);
            }
        }

        builder.append_header(("Location", location)).finish()
    }

    /// Create a redirect response with a single cookie
    #[must_use]
    pub fn redirect_with_cookie(location: &str, cookie: Option<Cookie>) -> HttpResponse {
        let cookies = cookie.map(|c| vec![c]);
        Self::redirect(location, cookies)
    }

    /// Location of the failure endpoint for `code`
    #[must_use]
    pub fn failure_location(code: FailureCode) -> String {
        format!(
            "{FAILURE_PATH}?message={}&strategy={STRATEGY_NAME}",
            urlencoding::encode(code.as_str())
        )
    }

    /// Redirect to the failure endpoint, clearing any cookies passed in
    #[must_use]
    pub fn failure_redirect(code: FailureCode, cookies: Vec<Cookie>) -> HttpResponse {
        Self::redirect(&Self::failure_location(code), Some(cookies))
    }

    /// JSON body describing a failure
    #[must_use]
    pub fn failure_json(message: &str, strategy: &str) -> HttpResponse {
        HttpResponse::Unauthorized().json(json!({
            "error": message,
            "strategy": strategy,
        }))
    }

    /// JSON body for server-side configuration problems
    #[must_use]
    pub fn configuration_error(message: &str) -> HttpResponse {
        HttpResponse::InternalServerError().json(json!({
            "error": "configuration_error",
            "message": message,
        }))
    }
}
