//! Mock collaborators for isolated flow tests
//!
//! Both mocks record every call so tests can assert on what reached the provider.

use std::sync::Mutex;

use async_trait::async_trait;

use super::fixtures::TestFixtures;
use crate::oauth::exchange::{AccessToken, CodeExchange, ExchangeOptions, GraphClient, GraphError};
use crate::oauth::token_verifier::{ScopeSet, TokenIntrospector};

/// One recorded call to [`MockExchange::exchange_code`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeCall {
    pub code: String,
    pub options: ExchangeOptions,
}

/// Code exchange that answers with a fixed token or a fixed error
pub struct MockExchange {
    outcome: Result<String, String>,
    client: GraphClient,
    calls: Mutex<Vec<ExchangeCall>>,
}

impl MockExchange {
    #[must_use]
    pub fn succeeding(token: &str) -> Self {
        Self::with_outcome(Ok(token.to_string()))
    }

    #[must_use]
    pub fn failing(reason: &str) -> Self {
        Self::with_outcome(Err(reason.to_string()))
    }

    fn with_outcome(outcome: Result<String, String>) -> Self {
        Self {
            outcome,
            client: TestFixtures::graph_client("http://127.0.0.1:9"),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// # Panics
    ///
    /// Panics if the call log mutex is poisoned
    #[must_use]
    pub fn calls(&self) -> Vec<ExchangeCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeExchange for MockExchange {
    async fn exchange_code(
        &self,
        code: &str,
        options: &ExchangeOptions,
    ) -> Result<AccessToken, GraphError> {
        self.calls.lock().unwrap().push(ExchangeCall {
            code: code.to_string(),
            options: options.clone(),
        });
        match &self.outcome {
            Ok(token) => Ok(AccessToken::new(
                token.as_str(),
                None,
                options,
                self.client.clone(),
            )),
            Err(reason) => Err(GraphError::Transport(reason.clone())),
        }
    }

    fn wrap_token(&self, token: &str, options: &ExchangeOptions) -> AccessToken {
        AccessToken::new(token, None, options, self.client.clone())
    }
}

/// Introspection endpoint that grants a fixed scope set or fails
pub struct MockIntrospector {
    outcome: Result<ScopeSet, String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockIntrospector {
    #[must_use]
    pub fn granting(scopes: &[&str]) -> Self {
        Self {
            outcome: Ok(scopes.iter().copied().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn failing(reason: &str) -> Self {
        Self {
            outcome: Err(reason.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Recorded `(token, app_access_proof)` pairs
    ///
    /// # Panics
    ///
    /// Panics if the call log mutex is poisoned
    #[must_use]
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenIntrospector for MockIntrospector {
    async fn introspect(&self, token: &str, app_access_proof: &str) -> Result<ScopeSet, GraphError> {
        self.calls
            .lock()
            .unwrap()
            .push((token.to_string(), app_access_proof.to_string()));
        self.outcome.clone().map_err(GraphError::Transport)
    }
}
