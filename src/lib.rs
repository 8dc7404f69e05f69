#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the fbsr service
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod handlers;
pub mod oauth;
pub mod settings;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use handlers::{auth_failure, facebook_callback, facebook_request_phase, health};
pub use oauth::{CallbackOrchestrator, ProviderConfig};
pub use settings::FbsrSettings;
