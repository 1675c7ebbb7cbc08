//! Configuration module
//!
//! Handles loading and validating configuration from TOML files and environment variables.

pub mod loader;
pub mod types;

pub use loader::{ROLE_SLUG_MAX_LEN, ROLE_SLUG_MIN_LEN, load_config, load_config_from_str};
pub use types::*;
