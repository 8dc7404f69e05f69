//! Signed request decoding and verification
//!
//! The provider's JavaScript SDK stores a signed request in the `fbsr_<client_id>`
//! cookie. The value is two URL-safe base64 segments joined by a dot:
//!
//! ```text
//! <base64url(hmac_sha256(secret, payload_segment))>.<base64url(json_payload)>
//! ```
//!
//! Nothing inside the payload is trusted until the declared algorithm has been
//! checked against the supported set and the signature has been verified.

use std::fmt;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::utils::crypto::verify_hmac_sha256;

/// URL-safe base64 engine that accepts both padded and unpadded input.
/// The SDKs emit unpadded segments, some proxies re-pad cookie values.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Signature algorithms accepted in a signed request payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// HMAC with SHA-256 keyed by the application secret
    HmacSha256,
}

impl SignatureAlgorithm {
    /// Wire name of the algorithm as it appears in the payload
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HmacSha256 => "HMAC-SHA256",
        }
    }

    /// Resolve a declared algorithm name. The name must match exactly.
    ///
    /// # Errors
    ///
    /// Returns [`SignedRequestError::UnknownAlgorithm`] for any other value.
    pub fn from_declared(declared: &str) -> Result<Self, SignedRequestError> {
        if declared == Self::HmacSha256.as_str() {
            Ok(Self::HmacSha256)
        } else {
            Err(SignedRequestError::UnknownAlgorithm(declared.to_string()))
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while decoding a signed request
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignedRequestError {
    /// The value could not be split, base64-decoded or parsed as a JSON object
    #[error("malformed signed request: {0}")]
    Malformed(String),

    /// The payload declares an algorithm other than the required one
    #[error("unknown signature algorithm: {0}")]
    UnknownAlgorithm(String),

    /// The recomputed signature does not match the supplied one
    #[error("signed request signature mismatch")]
    SignatureMismatch,
}

/// A signed request whose signature has been verified
#[derive(Debug, Clone, PartialEq)]
pub struct SignedRequest {
    algorithm: SignatureAlgorithm,
    raw_payload: Vec<u8>,
    fields: Map<String, Value>,
}

impl SignedRequest {
    /// Decode `encoded` and verify it against `secret`.
    ///
    /// The payload must declare `required`. It is validated before any signature
    /// comparison. The HMAC is computed over the payload segment exactly as
    /// received and compared in constant time.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The separator is missing or either segment is empty or not base64url
    /// - The payload is not a UTF-8 JSON object with a string `algorithm`
    /// - The declared algorithm is not `required`
    /// - The signature does not match
    pub fn parse(
        encoded: &str,
        secret: &[u8],
        required: SignatureAlgorithm,
    ) -> Result<Self, SignedRequestError> {
        let (signature_segment, payload_segment) = encoded
            .split_once('.')
            .ok_or_else(|| SignedRequestError::Malformed("missing '.' separator".to_string()))?;

        if signature_segment.is_empty() || payload_segment.is_empty() {
            return Err(SignedRequestError::Malformed("empty segment".to_string()));
        }

        let signature = decode_segment(signature_segment, "signature")?;
        let raw_payload = decode_segment(payload_segment, "payload")?;

        let fields = match serde_json::from_slice::<Value>(&raw_payload) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) => {
                return Err(SignedRequestError::Malformed(
                    "payload is not a JSON object".to_string(),
                ))
            }
            Err(e) => {
                return Err(SignedRequestError::Malformed(format!(
                    "payload is not valid JSON: {e}"
                )))
            }
        };

        let declared = fields
            .get("algorithm")
            .and_then(Value::as_str)
            .ok_or_else(|| SignedRequestError::Malformed("payload has no algorithm".to_string()))?;
        let algorithm = SignatureAlgorithm::from_declared(declared)?;
        if algorithm != required {
            return Err(SignedRequestError::UnknownAlgorithm(declared.to_string()));
        }

        match algorithm {
            SignatureAlgorithm::HmacSha256 => {
                if !verify_hmac_sha256(secret, payload_segment.as_bytes(), &signature) {
                    return Err(SignedRequestError::SignatureMismatch);
                }
            }
        }

        Ok(Self {
            algorithm,
            raw_payload,
            fields,
        })
    }

    #[must_use]
    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Decoded payload bytes, before JSON parsing
    #[must_use]
    pub fn raw_payload(&self) -> &[u8] {
        &self.raw_payload
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Authorization code issued alongside the cookie, if any
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.fields.get("code").and_then(Value::as_str)
    }

    /// Provider user id. The SDK sends it as a string; older payloads use a number.
    #[must_use]
    pub fn user_id(&self) -> Option<String> {
        match self.fields.get("user_id")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    #[must_use]
    pub fn issued_at(&self) -> Option<i64> {
        self.fields.get("issued_at").and_then(Value::as_i64)
    }
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>, SignedRequestError> {
    URL_SAFE_LENIENT
        .decode(segment)
        .map_err(|e| SignedRequestError::Malformed(format!("{name} segment is not base64url: {e}")))
}
