//! Authentication module
//!
//! Resolves the caller of an admin API request to a [`Principal`](crate::access_control::Principal).
//! Currently supports static bearer tokens from configuration, behind a trait
//! so a JWT-backed resolver can be plugged in.

pub mod provider;
pub mod token;

pub use provider::{PrincipalResolver, SharedPrincipalResolver, bearer_token};
pub use token::TokenPrincipalResolver;

use crate::config::AuthConfig;
use crate::store::AccessStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Create a principal resolver from configuration
pub fn create_principal_resolver(
    config: &AuthConfig,
    store: Arc<dyn AccessStore>,
) -> SharedPrincipalResolver {
    let resolver = TokenPrincipalResolver::new(config, store);
    if resolver.is_empty() {
        warn!("No auth tokens configured, every admin API request will be rejected");
    } else {
        info!(
            auth_type = resolver.auth_type(),
            tokens = resolver.len(),
            "Principal resolver ready"
        );
    }
    Arc::new(resolver)
}
