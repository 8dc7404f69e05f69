use actix_web::{HttpResponse, Result};

use super::types::HealthResponse;

/// Health check handler
///
/// # Errors
///
/// This function currently never returns an error
pub async fn health() -> Result<HttpResponse> {
    let response = HealthResponse {
        status: "ok".to_string(),
        message: "fbsr Facebook login service is running".to_string(),
    };
    Ok(HttpResponse::Ok().json(response))
}
