//! Shared test utilities
//!
//! Available to unit tests and, through the `testing` feature, to the
//! integration tests under `tests/`.
//!
//! - [`fixtures`] - Pre-built configuration, contexts and signed cookies
//! - [`mock`] - In-memory exchange and introspection collaborators
//!
//! ```rust,ignore
//! use fbsr::testing::fixtures::{sign_payload, TestFixtures};
//!
//! let cookie = sign_payload(&serde_json::json!({"algorithm": "HMAC-SHA256", "code": "xyz"}), b"secret");
//! let ctx = TestFixtures::callback_context(&[("state", "abc")]);
//! ```

pub mod fixtures;
pub mod mock;

pub use fixtures::TestFixtures;

/// Common test constants
pub mod constants {
    /// Application id of the test provider
    pub const TEST_CLIENT_ID: &str = "123456789";

    /// Application secret of the test provider
    pub const TEST_CLIENT_SECRET: &str = "53cr3t-app-secret";

    /// Signed request cookie name for [`TEST_CLIENT_ID`]
    pub const TEST_SIGNED_REQUEST_COOKIE: &str = "fbsr_123456789";

    /// Base URL the test application is served from
    pub const TEST_REDIRECT_BASE_URL: &str = "https://app.example.com";
}
