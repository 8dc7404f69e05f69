pub mod cookie_utils;
pub mod crypto;
pub mod logging;
pub mod response_builder;
