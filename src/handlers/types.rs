// Response and query types for the HTTP handlers
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::oauth::callback::AuthOrigin;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct FailureQuery {
    pub message: Option<String>,
    pub strategy: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub expires: bool,
    /// Unix timestamp, only present when the token expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Extra {
    pub raw_info: Value,
}

/// Result of a successful login
#[derive(Debug, Serialize)]
pub struct AuthHash {
    pub provider: &'static str,
    pub uid: Option<String>,
    pub credentials: Credentials,
    pub origin: AuthOrigin,
    pub extra: Extra,
}
