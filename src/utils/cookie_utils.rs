use actix_web::cookie::{time::Duration, Cookie, SameSite};
use actix_web::HttpRequest;
use anyhow::{anyhow, Result};

use crate::settings::CookieSettings;

/// Cookie carrying the `state` issued by the authorize redirect
pub const OAUTH_STATE_COOKIE: &str = "fbsr_oauth_state";

/// Options for cookie creation
pub struct CookieOptions {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
    pub max_age: Duration,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            secure: true,
            // The provider redirects back cross-site, Strict would drop the cookie
            same_site: SameSite::Lax,
            path: "/".to_string(),
            max_age: Duration::minutes(10),
        }
    }
}

impl CookieOptions {
    #[must_use]
    pub fn from_settings(settings: &CookieSettings) -> Self {
        Self {
            secure: settings.secure,
            max_age: Duration::seconds(settings.state_max_age_seconds),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn build(&self, name: &str, value: &str) -> Cookie<'static> {
        Cookie::build(name.to_owned(), value.to_owned())
            .http_only(self.http_only)
            .secure(self.secure)
            .same_site(self.same_site)
            .path(self.path.clone())
            .max_age(self.max_age)
            .finish()
    }
}

/// Cookie remembering the authorize `state` until the callback arrives
#[must_use]
pub fn create_state_cookie(state: &str, settings: &CookieSettings) -> Cookie<'static> {
    CookieOptions::from_settings(settings).build(OAUTH_STATE_COOKIE, state)
}

/// Helper function to extract cookie value from `HttpRequest`
///
/// # Errors
///
/// Returns an error if the cookie is not present
pub fn extract_cookie_value(req: &HttpRequest, cookie_name: &str) -> Result<String> {
    req.cookie(cookie_name)
        .ok_or_else(|| anyhow!("Cookie not found: {}", cookie_name))
        .map(|cookie| cookie.value().to_string())
}

/// Cookie lookup by name, in the shape the callback flow consumes
pub fn cookie_lookup(req: &HttpRequest) -> impl Fn(&str) -> Option<String> + '_ {
    move |name: &str| extract_cookie_value(req, name).ok()
}

/// Create an expired cookie to clear a specific cookie
#[must_use]
pub fn create_expired_cookie(name: &str, secure: bool) -> Cookie<'static> {
    Cookie::build(name.to_owned(), "")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(-1))
        .finish()
}
