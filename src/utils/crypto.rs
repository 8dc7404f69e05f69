// Cryptographic helpers: HMAC-SHA256 signing and verification, proofs and state tokens

use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Generate a cryptographically secure OAuth `state` token
///
/// 24 bytes (192 bits) of entropy, base64url encoded to 32 characters.
#[must_use]
pub fn generate_state_token() -> String {
    let mut nonce = [0u8; 24]; // 192 bits of entropy
    rand::rng().fill_bytes(&mut nonce);
    general_purpose::URL_SAFE_NO_PAD.encode(nonce)
}

/// Compute HMAC-SHA256 of `message` keyed by `secret`
#[must_use]
pub fn hmac_sha256(secret: &[u8], message: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so construction cannot fail
    let mut mac = match <HmacSha256 as Mac>::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts keys of any length"),
    };
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Verify an HMAC-SHA256 tag in constant time
#[must_use]
pub fn verify_hmac_sha256(secret: &[u8], message: &[u8], tag: &[u8]) -> bool {
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(secret) else {
        return false;
    };
    mac.update(message);
    mac.verify_slice(tag).is_ok()
}

/// Lowercase hex HMAC-SHA256 of `message`, as required for `appsecret_proof`
#[must_use]
pub fn hmac_sha256_hex(secret: &[u8], message: &[u8]) -> String {
    hex::encode(hmac_sha256(secret, message))
}
