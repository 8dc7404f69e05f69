//! Login callback orchestration
//!
//! ```text
//! Start -> CredentialResolved -> ExchangeDelegated -> Authenticated
//!                             \-> TokenVerified ----/
//! ```
//!
//! Every error raised along the way is mapped to a [`FailureCode`] in one place,
//! [`FailureCode::for_error`], so the externally visible vocabulary stays stable.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::oauth::config::ProviderConfig;
use crate::oauth::context::CallbackContext;
use crate::oauth::credential::{
    CodeOrigin, CredentialError, CredentialResolver, CredentialSource, SignedCookieOverride,
};
use crate::oauth::exchange::{AccessToken, CodeExchange, ExchangeOptions, GraphError};
use crate::oauth::signed_request::SignedRequestError;
use crate::oauth::token_verifier::{TokenIntrospector, TokenVerificationError, TokenVerifier};
use crate::utils::logging::LoggingHelper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackState {
    Start,
    CredentialResolved,
    ExchangeDelegated,
    TokenVerified,
    Authenticated,
    Failed(FailureCode),
}

impl CallbackState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Authenticated | Self::Failed(_))
    }

    fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Start, Self::CredentialResolved)
                | (Self::CredentialResolved, Self::ExchangeDelegated | Self::TokenVerified)
                | (Self::ExchangeDelegated | Self::TokenVerified, Self::Authenticated)
        ) || (!self.is_terminal() && matches!(next, Self::Failed(_)))
    }
}

/// Tracks the state of one callback and logs each transition
#[derive(Debug)]
struct StateMachine {
    current: CallbackState,
}

impl StateMachine {
    fn new() -> Self {
        Self {
            current: CallbackState::Start,
        }
    }

    fn advance(&mut self, next: CallbackState) {
        debug_assert!(
            self.current.can_advance_to(next),
            "invalid callback transition {:?} -> {next:?}",
            self.current
        );
        log::debug!("Callback state: {:?} -> {next:?}", self.current);
        self.current = next;
    }
}

/// Failure identifiers reported to the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    NoAuthorizationCode,
    InvalidSignedRequest,
    UnknownSignatureAlgorithm,
    InvalidSignature,
    MissingScopes,
    AppIdMismatch,
    CsrfDetected,
    InvalidCredentials,
}

impl FailureCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoAuthorizationCode => "no_authorization_code",
            Self::InvalidSignedRequest => "invalid_signed_request",
            Self::UnknownSignatureAlgorithm => "unknown_signature_algorithm",
            Self::InvalidSignature => "invalid_signature",
            Self::MissingScopes => "missing_scopes",
            Self::AppIdMismatch => "app_id_mismatch",
            Self::CsrfDetected => "csrf_detected",
            Self::InvalidCredentials => "invalid_credentials",
        }
    }

    /// The single mapping from internal error kinds to external failure codes
    #[must_use]
    pub fn for_error(error: &CallbackError) -> Self {
        match error {
            CallbackError::Credential(CredentialError::NoAuthorizationCode) => {
                Self::NoAuthorizationCode
            }
            CallbackError::Credential(CredentialError::SignedRequest(inner)) => match inner {
                SignedRequestError::Malformed(_) => Self::InvalidSignedRequest,
                SignedRequestError::UnknownAlgorithm(_) => Self::UnknownSignatureAlgorithm,
                SignedRequestError::SignatureMismatch => Self::InvalidSignature,
            },
            CallbackError::TokenVerification(TokenVerificationError::MissingScopes(_)) => {
                Self::MissingScopes
            }
            CallbackError::TokenVerification(TokenVerificationError::AppIdMismatch) => {
                Self::AppIdMismatch
            }
            CallbackError::StateMismatch => Self::CsrfDetected,
            CallbackError::Exchange(_) => Self::InvalidCredentials,
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    TokenVerification(#[from] TokenVerificationError),

    #[error("state parameter is missing or does not match the authorize request")]
    StateMismatch,

    #[error("authorization code exchange failed: {0}")]
    Exchange(#[from] GraphError),
}

/// Externally reported failure: a stable code plus a human readable message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallbackFailure {
    pub code: FailureCode,
    pub message: String,
}

impl CallbackFailure {
    #[must_use]
    pub fn from_error(error: &CallbackError) -> Self {
        let code = FailureCode::for_error(error);
        let message = match error {
            // Transport details stay in the logs
            CallbackError::Exchange(_) => "could not redeem the authorization code".to_string(),
            other => other.to_string(),
        };
        Self { code, message }
    }
}

impl fmt::Display for CallbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CallbackFailure {}

/// How the authenticated token was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthOrigin {
    AccessToken,
    Code,
    SignedRequestCookie,
}

impl From<CodeOrigin> for AuthOrigin {
    fn from(origin: CodeOrigin) -> Self {
        match origin {
            CodeOrigin::Direct => Self::Code,
            CodeOrigin::SignedCookie => Self::SignedRequestCookie,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthResult {
    pub access_token: AccessToken,
    pub origin: AuthOrigin,
}

#[derive(Clone)]
pub struct CallbackOrchestrator {
    config: Arc<ProviderConfig>,
    resolver: CredentialResolver,
    verifier: TokenVerifier,
    exchange: Arc<dyn CodeExchange>,
    introspector: Arc<dyn TokenIntrospector>,
}

impl CallbackOrchestrator {
    #[must_use]
    pub fn new(
        config: Arc<ProviderConfig>,
        exchange: Arc<dyn CodeExchange>,
        introspector: Arc<dyn TokenIntrospector>,
    ) -> Self {
        Self {
            resolver: CredentialResolver::new(Arc::clone(&config)),
            verifier: TokenVerifier::new(Arc::clone(&config)),
            config,
            exchange,
            introspector,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Run the callback for one request
    ///
    /// # Errors
    ///
    /// Returns a [`CallbackFailure`] carrying the external failure code when any
    /// step fails. Exactly one outcome is produced per call.
    pub async fn run(
        &self,
        ctx: &mut CallbackContext,
        cookies: &dyn Fn(&str) -> Option<String>,
    ) -> Result<AuthResult, CallbackFailure> {
        let mut machine = StateMachine::new();
        match self.authenticate(ctx, cookies, &mut machine).await {
            Ok(result) => {
                machine.advance(CallbackState::Authenticated);
                LoggingHelper::log_callback_authenticated(result.origin);
                Ok(result)
            }
            Err(error) => {
                let failure = CallbackFailure::from_error(&error);
                machine.advance(CallbackState::Failed(failure.code));
                LoggingHelper::log_callback_failure(failure.code, &error);
                Err(failure)
            }
        }
    }

    async fn authenticate(
        &self,
        ctx: &mut CallbackContext,
        cookies: &dyn Fn(&str) -> Option<String>,
        machine: &mut StateMachine,
    ) -> Result<AuthResult, CallbackError> {
        let source = self.resolver.resolve(ctx, cookies)?;
        machine.advance(CallbackState::CredentialResolved);
        LoggingHelper::log_credential_resolved(source.kind());

        match source {
            CredentialSource::BearerToken(token) => {
                self.verifier
                    .verify(&token, self.introspector.as_ref())
                    .await?;
                machine.advance(CallbackState::TokenVerified);

                let options = Self::exchange_options(ctx);
                Ok(AuthResult {
                    access_token: self.exchange.wrap_token(&token, &options),
                    origin: AuthOrigin::AccessToken,
                })
            }
            CredentialSource::AuthorizationCode {
                code,
                origin: CodeOrigin::SignedCookie,
            } => {
                let guard = SignedCookieOverride::apply(ctx, &code);
                let access_token = self.exchange_code(&guard).await?;
                drop(guard);
                machine.advance(CallbackState::ExchangeDelegated);
                Ok(AuthResult {
                    access_token,
                    origin: AuthOrigin::SignedRequestCookie,
                })
            }
            CredentialSource::AuthorizationCode {
                origin: CodeOrigin::Direct,
                ..
            } => {
                let access_token = self.exchange_code(ctx).await?;
                machine.advance(CallbackState::ExchangeDelegated);
                Ok(AuthResult {
                    access_token,
                    origin: AuthOrigin::Code,
                })
            }
        }
    }

    /// Redeem the `code` parameter of `ctx`, honouring its current options
    async fn exchange_code(&self, ctx: &CallbackContext) -> Result<AccessToken, CallbackError> {
        if !ctx.options().provider_ignores_state {
            Self::check_state(ctx)?;
        }

        let code = ctx
            .param("code")
            .ok_or(CredentialError::NoAuthorizationCode)?;
        let options = Self::exchange_options(ctx);
        Ok(self.exchange.exchange_code(code, &options).await?)
    }

    fn check_state(ctx: &CallbackContext) -> Result<(), CallbackError> {
        let matches: bool = match (ctx.param("state"), ctx.stored_state()) {
            (Some(received), Some(stored)) => received.as_bytes().ct_eq(stored.as_bytes()).into(),
            _ => false,
        };
        if matches {
            Ok(())
        } else {
            Err(CallbackError::StateMismatch)
        }
    }

    fn exchange_options(ctx: &CallbackContext) -> ExchangeOptions {
        ExchangeOptions::new(ctx.options().callback_url.clone())
    }

    /// Fetch the raw profile for an authenticated token
    ///
    /// `appsecret_proof` is attached from the request's memoized value.
    ///
    /// # Errors
    ///
    /// Returns a [`CallbackFailure`] with [`FailureCode::InvalidCredentials`] when
    /// the Graph API call fails
    pub async fn fetch_raw_info(
        &self,
        ctx: &CallbackContext,
        access_token: &AccessToken,
    ) -> Result<Value, CallbackFailure> {
        let proof = ctx.appsecret_proof(access_token.token(), self.config.secret_bytes());
        let params = [
            ("fields", self.config.info_fields.as_str()),
            ("appsecret_proof", proof.as_ref()),
        ];

        access_token.get("me", &params).await.map_err(|e| {
            let error = CallbackError::Exchange(e);
            let failure = CallbackFailure::from_error(&error);
            LoggingHelper::log_callback_failure(failure.code, &error);
            failure
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::constants::TEST_CLIENT_SECRET;
    use crate::testing::fixtures::{sign_payload, TestFixtures};
    use crate::testing::mock::{MockExchange, MockIntrospector};
    use serde_json::json;

    fn orchestrator(
        exchange: &Arc<MockExchange>,
        introspector: &Arc<MockIntrospector>,
    ) -> CallbackOrchestrator {
        let mut config = TestFixtures::provider_config();
        config.required_scopes = ["email", "public_profile"].into_iter().collect();
        CallbackOrchestrator::new(Arc::new(config), exchange.clone(), introspector.clone())
    }

    fn signed_cookie_jar(payload: &Value) -> impl Fn(&str) -> Option<String> {
        let value = sign_payload(payload, TEST_CLIENT_SECRET.as_bytes());
        move |name: &str| (name == TestFixtures::signed_request_cookie_name()).then(|| value.clone())
    }

    #[tokio::test]
    async fn test_direct_code_with_valid_state() {
        let exchange = Arc::new(MockExchange::succeeding("exchanged-token"));
        let introspector = Arc::new(MockIntrospector::granting(&[]));
        let mut ctx = TestFixtures::callback_context(&[("code", "abc"), ("state", "s1")])
            .with_stored_state(Some("s1".to_string()));

        let result = orchestrator(&exchange, &introspector)
            .run(&mut ctx, &|_: &str| None)
            .await
            .unwrap();

        assert_eq!(result.origin, AuthOrigin::Code);
        assert_eq!(result.access_token.token(), "exchanged-token");
        let calls = exchange.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].code, "abc");
        assert_eq!(calls[0].options.redirect_uri, TestFixtures::provider_config().callback_url);
        assert!(introspector.calls().is_empty());
    }

    #[tokio::test]
    async fn test_direct_code_requires_matching_state() {
        let exchange = Arc::new(MockExchange::succeeding("exchanged-token"));
        let introspector = Arc::new(MockIntrospector::granting(&[]));

        for (received, stored) in [
            (Some("s1"), Some("s2")),
            (Some("s1"), Some("s1-longer")),
            (Some("S1"), Some("s1")),
            (None, Some("s1")),
            (Some("s1"), None),
        ] {
            let mut params = vec![("code", "abc")];
            if let Some(state) = received {
                params.push(("state", state));
            }
            let mut ctx = TestFixtures::callback_context(&params)
                .with_stored_state(stored.map(ToString::to_string));

            let failure = orchestrator(&exchange, &introspector)
                .run(&mut ctx, &|_: &str| None)
                .await
                .unwrap_err();
            assert_eq!(failure.code, FailureCode::CsrfDetected);
        }
        assert!(exchange.calls().is_empty());
    }

    #[tokio::test]
    async fn test_direct_code_beats_signed_cookie() {
        let exchange = Arc::new(MockExchange::succeeding("t"));
        let introspector = Arc::new(MockIntrospector::granting(&[]));
        let mut ctx = TestFixtures::callback_context(&[("code", "abc"), ("state", "s1")])
            .with_stored_state(Some("s1".to_string()));
        let cookies = signed_cookie_jar(&json!({"algorithm": "HMAC-SHA256", "code": "xyz"}));

        let result = orchestrator(&exchange, &introspector)
            .run(&mut ctx, &cookies)
            .await
            .unwrap();

        assert_eq!(result.origin, AuthOrigin::Code);
        assert_eq!(exchange.calls()[0].code, "abc");
    }

    #[tokio::test]
    async fn test_signed_cookie_code_uses_overrides_then_restores() {
        let exchange = Arc::new(MockExchange::succeeding("cookie-token"));
        let introspector = Arc::new(MockIntrospector::granting(&[]));
        // No state at all: the check must be skipped for the cookie flow
        let mut ctx = TestFixtures::callback_context(&[]);
        let original = ctx.options().clone();
        let cookies = signed_cookie_jar(&json!({"algorithm": "HMAC-SHA256", "code": "xyz"}));

        let result = orchestrator(&exchange, &introspector)
            .run(&mut ctx, &cookies)
            .await
            .unwrap();

        assert_eq!(result.origin, AuthOrigin::SignedRequestCookie);
        let calls = exchange.calls();
        assert_eq!(calls[0].code, "xyz");
        assert_eq!(calls[0].options.redirect_uri, "");

        assert_eq!(ctx.options(), &original);
        assert!(!ctx.options().provider_ignores_state);
        assert_eq!(ctx.param("code"), None);
    }

    #[tokio::test]
    async fn test_signed_cookie_overrides_restored_after_exchange_failure() {
        let exchange = Arc::new(MockExchange::failing("invalid code"));
        let introspector = Arc::new(MockIntrospector::granting(&[]));
        let mut ctx = TestFixtures::callback_context(&[]);
        let original = ctx.options().clone();
        let cookies = signed_cookie_jar(&json!({"algorithm": "HMAC-SHA256", "code": "xyz"}));

        let failure = orchestrator(&exchange, &introspector)
            .run(&mut ctx, &cookies)
            .await
            .unwrap_err();

        assert_eq!(failure.code, FailureCode::InvalidCredentials);
        assert!(!failure.message.contains("invalid code"));
        assert_eq!(ctx.options(), &original);
        assert_eq!(ctx.param("code"), None);
    }

    #[tokio::test]
    async fn test_bearer_token_verified_against_required_scopes() {
        let exchange = Arc::new(MockExchange::succeeding("unused"));
        let introspector = Arc::new(MockIntrospector::granting(&["email", "public_profile"]));
        let mut ctx = TestFixtures::callback_context(&[("access_token", "direct-token")]);

        let result = orchestrator(&exchange, &introspector)
            .run(&mut ctx, &|_: &str| None)
            .await
            .unwrap();

        assert_eq!(result.origin, AuthOrigin::AccessToken);
        assert_eq!(result.access_token.token(), "direct-token");
        assert!(exchange.calls().is_empty());
        assert_eq!(introspector.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_bearer_token_missing_scopes() {
        let exchange = Arc::new(MockExchange::succeeding("unused"));
        let introspector = Arc::new(MockIntrospector::granting(&["email"]));
        let mut ctx = TestFixtures::callback_context(&[("access_token", "direct-token")]);

        let failure = orchestrator(&exchange, &introspector)
            .run(&mut ctx, &|_: &str| None)
            .await
            .unwrap_err();

        assert_eq!(failure.code, FailureCode::MissingScopes);
        assert!(failure.message.contains("public_profile"));
    }

    #[tokio::test]
    async fn test_bearer_token_introspection_error() {
        let exchange = Arc::new(MockExchange::succeeding("unused"));
        let introspector = Arc::new(MockIntrospector::failing("tls handshake eof"));
        let mut ctx = TestFixtures::callback_context(&[("access_token", "direct-token")]);

        let failure = orchestrator(&exchange, &introspector)
            .run(&mut ctx, &|_: &str| None)
            .await
            .unwrap_err();

        assert_eq!(failure.code, FailureCode::AppIdMismatch);
        assert!(!failure.message.contains("tls"));
    }

    #[tokio::test]
    async fn test_signed_request_failures_are_mapped() {
        let exchange = Arc::new(MockExchange::succeeding("unused"));
        let introspector = Arc::new(MockIntrospector::granting(&[]));
        let orchestrator = orchestrator(&exchange, &introspector);

        type Jar = Box<dyn Fn(&str) -> Option<String>>;
        let cases: Vec<(Jar, FailureCode)> = vec![
            (
                Box::new(|_: &str| None::<String>) as Jar,
                FailureCode::NoAuthorizationCode,
            ),
            (
                Box::new(|_: &str| Some("junk".to_string())) as Jar,
                FailureCode::InvalidSignedRequest,
            ),
            (
                Box::new(signed_cookie_jar(&json!({"algorithm": "none", "code": "x"}))) as Jar,
                FailureCode::UnknownSignatureAlgorithm,
            ),
            (
                Box::new(signed_cookie_jar(&json!({"algorithm": "hmac-sha256", "code": "x"})))
                    as Jar,
                FailureCode::UnknownSignatureAlgorithm,
            ),
            (
                Box::new(|_: &str| {
                    Some(sign_payload(
                        &json!({"algorithm": "HMAC-SHA256", "code": "x"}),
                        b"not-the-secret",
                    ))
                }) as Jar,
                FailureCode::InvalidSignature,
            ),
            (
                Box::new(signed_cookie_jar(&json!({"algorithm": "HMAC-SHA256"}))) as Jar,
                FailureCode::NoAuthorizationCode,
            ),
        ];

        for (cookies, expected) in cases {
            let mut ctx = TestFixtures::callback_context(&[]);
            let failure = orchestrator.run(&mut ctx, cookies.as_ref()).await.unwrap_err();
            assert_eq!(failure.code, expected);
        }
        assert!(exchange.calls().is_empty());
    }

    #[test]
    fn test_failure_code_strings() {
        assert_eq!(FailureCode::NoAuthorizationCode.as_str(), "no_authorization_code");
        assert_eq!(
            FailureCode::UnknownSignatureAlgorithm.to_string(),
            "unknown_signature_algorithm"
        );
        assert_eq!(
            serde_json::to_value(FailureCode::AppIdMismatch).unwrap(),
            json!("app_id_mismatch")
        );
    }

    #[test]
    fn test_state_transitions() {
        assert!(CallbackState::Start.can_advance_to(CallbackState::CredentialResolved));
        assert!(CallbackState::CredentialResolved.can_advance_to(CallbackState::TokenVerified));
        assert!(CallbackState::TokenVerified.can_advance_to(CallbackState::Authenticated));
        assert!(CallbackState::Start.can_advance_to(CallbackState::Failed(FailureCode::CsrfDetected)));
        assert!(!CallbackState::Start.can_advance_to(CallbackState::Authenticated));
        assert!(!CallbackState::Authenticated
            .can_advance_to(CallbackState::Failed(FailureCode::CsrfDetected)));
        assert!(CallbackState::Failed(FailureCode::MissingScopes).is_terminal());
    }
}
