//! Facebook login module
//!
//! Signed request decoding, credential resolution, token verification and the
//! callback orchestrator that ties them together.

pub mod authorize;
pub mod callback;
pub mod config;
pub mod context;
pub mod credential;
pub mod exchange;
pub mod signed_request;
pub mod token_verifier;

// Re-export configuration and flow entry points
pub use authorize::{build_authorize_url, AuthorizeRequest};
pub use callback::{
    AuthOrigin, AuthResult, CallbackError, CallbackFailure, CallbackOrchestrator, FailureCode,
};
pub use config::{ConfigError, ProviderConfig};
pub use context::{CallbackContext, StrategyOptions};

// Re-export building blocks
pub use credential::{CodeOrigin, CredentialError, CredentialResolver, CredentialSource};
pub use exchange::{AccessToken, CodeExchange, ExchangeOptions, GraphClient, GraphError};
pub use signed_request::{SignatureAlgorithm, SignedRequest, SignedRequestError};
pub use token_verifier::{ScopeSet, TokenIntrospector, TokenVerificationError, TokenVerifier};
