//! Verification of access tokens supplied directly by the client
//!
//! A token passed as `access_token` skips the code exchange, so nothing proves it
//! was issued to this application. The verifier asks the provider's introspection
//! endpoint which scopes the token carries and rejects it when a required scope
//! was not granted.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::oauth::config::ProviderConfig;
use crate::oauth::exchange::GraphError;
use crate::utils::crypto::hmac_sha256_hex;
use crate::utils::logging::LoggingHelper;

/// A set of permission scopes, compared as a set rather than a sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma and/or whitespace separated scope string
    #[must_use]
    pub fn parse(scopes: &str) -> Self {
        scopes
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Scopes in `self` that are absent from `granted`, in sorted order
    #[must_use]
    pub fn missing_from(&self, granted: &ScopeSet) -> Vec<String> {
        self.0.difference(&granted.0).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(ToString::to_string).collect())
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        f.write_str(&joined.join(","))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenVerificationError {
    /// Introspection succeeded but required scopes were not granted
    #[error("access token is missing required scopes: {}", .0.join(", "))]
    MissingScopes(Vec<String>),

    /// Introspection itself failed, most often because the token belongs to another app
    #[error("access token was not issued to this application")]
    AppIdMismatch,
}

/// Token introspection endpoint
#[async_trait]
pub trait TokenIntrospector: Send + Sync {
    /// Return the scopes the provider reports as granted to `token`
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the provider rejects the token
    async fn introspect(&self, token: &str, app_access_proof: &str) -> Result<ScopeSet, GraphError>;
}

/// Compute `appsecret_proof`: lowercase hex HMAC-SHA256 of the token keyed by the app secret
#[must_use]
pub fn appsecret_proof(token: &str, client_secret: &[u8]) -> String {
    hmac_sha256_hex(client_secret, token.as_bytes())
}

#[derive(Debug, Clone)]
pub struct TokenVerifier {
    config: Arc<ProviderConfig>,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(config: Arc<ProviderConfig>) -> Self {
        Self { config }
    }

    /// Verify that `token` was granted every required scope
    ///
    /// The scope check only runs after a successful introspection round trip.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The introspection call fails (reported as [`TokenVerificationError::AppIdMismatch`])
    /// - One or more required scopes were not granted
    pub async fn verify(
        &self,
        token: &str,
        introspector: &dyn TokenIntrospector,
    ) -> Result<(), TokenVerificationError> {
        let granted = introspector
            .introspect(token, &self.config.app_access_proof())
            .await
            .map_err(|e| {
                LoggingHelper::log_introspection_failed(&e);
                TokenVerificationError::AppIdMismatch
            })?;

        let missing = self.config.required_scopes.missing_from(&granted);
        if !missing.is_empty() {
            return Err(TokenVerificationError::MissingScopes(missing));
        }

        log::debug!("Access token carries all {} required scopes", self.config.required_scopes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::TestFixtures;
    use crate::testing::mock::MockIntrospector;

    fn verifier_requiring(scopes: &[&str]) -> TokenVerifier {
        let mut config = TestFixtures::provider_config();
        config.required_scopes = scopes.iter().copied().collect();
        TokenVerifier::new(Arc::new(config))
    }

    #[test]
    fn test_scope_set_parsing() {
        let scopes = ScopeSet::parse("email, public_profile user_friends,,");

        assert_eq!(scopes.len(), 3);
        assert!(scopes.contains("public_profile"));
        assert_eq!(scopes.to_string(), "email,public_profile,user_friends");
        assert!(ScopeSet::parse("").is_empty());
    }

    #[test]
    fn test_scope_comparison_ignores_order_and_duplicates() {
        let a: ScopeSet = ["email", "public_profile"].into_iter().collect();
        let b: ScopeSet = ["public_profile", "email", "email"].into_iter().collect();

        assert_eq!(a, b);
        assert!(a.missing_from(&b).is_empty());
    }

    #[test]
    fn test_appsecret_proof_is_stable() {
        let first = appsecret_proof("token-abc", b"secret");
        let second = appsecret_proof("token-abc", b"secret");

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(first, appsecret_proof("token-abd", b"secret"));
        assert_ne!(first, appsecret_proof("token-abc", b"other"));
    }

    #[tokio::test]
    async fn test_verify_accepts_superset_of_required_scopes() {
        let verifier = verifier_requiring(&["email"]);
        let introspector = MockIntrospector::granting(&["public_profile", "email"]);

        assert_eq!(verifier.verify("token", &introspector).await, Ok(()));
        assert_eq!(
            introspector.calls(),
            vec![("token".to_string(), TestFixtures::app_access_proof())]
        );
    }

    #[tokio::test]
    async fn test_verify_reports_missing_scopes() {
        let verifier = verifier_requiring(&["email", "public_profile"]);
        let introspector = MockIntrospector::granting(&["email"]);

        assert_eq!(
            verifier.verify("token", &introspector).await,
            Err(TokenVerificationError::MissingScopes(vec![
                "public_profile".to_string()
            ]))
        );
    }

    #[tokio::test]
    async fn test_introspection_failure_becomes_app_id_mismatch() {
        let verifier = verifier_requiring(&["email"]);
        let introspector = MockIntrospector::failing("connection reset by peer");

        let err = verifier.verify("token", &introspector).await.unwrap_err();

        assert_eq!(err, TokenVerificationError::AppIdMismatch);
        assert!(!err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_no_required_scopes_still_introspects() {
        let verifier = verifier_requiring(&[]);
        let introspector = MockIntrospector::granting(&[]);

        assert_eq!(verifier.verify("token", &introspector).await, Ok(()));
        assert_eq!(introspector.calls().len(), 1);
    }
}
