// HTTP request handlers for the Facebook login endpoints
pub mod auth;
pub mod callback;
pub mod health;
pub mod types;

// Re-export the main handler functions
pub use auth::{auth_failure, facebook_request_phase};
pub use callback::facebook_callback;
pub use health::health;

use actix_web::web;

/// Register the login, failure and health routes
pub fn configure_services(cfg: &mut web::ServiceConfig) {
    cfg.route("/auth/facebook", web::get().to(facebook_request_phase))
        .route("/auth/facebook/callback", web::get().to(facebook_callback))
        .route("/auth/facebook/callback", web::post().to(facebook_callback))
        .route("/auth/failure", web::get().to(auth_failure))
        .route("/ping", web::get().to(health));
}
