//! Common utilities and types shared across tsgate

pub mod config;
pub mod error;
pub mod utils;

pub use config::Config;
pub use error::{Error, Result};
pub use utils::{retry_with_backoff, timestamp_now, timestamp_now_millis};
