//! Principal resolver trait
//!
//! Turns the credentials of a request into the [`Principal`] the decision
//! engine evaluates. Token issuance lives outside this crate; resolvers only
//! recognize tokens and look up roles.

use crate::access_control::Principal;
use crate::error::AuthError;
// async_trait required for dyn-compatibility with Arc<dyn PrincipalResolver>
use async_trait::async_trait;
use std::sync::Arc;

/// Resolves a bearer token to the calling principal
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    /// Resolve `token` to a principal with its current role grants
    ///
    /// Roles are read at call time, so role changes apply to the next request.
    async fn resolve(&self, token: &str) -> Result<Principal, AuthError>;

    /// Get a description of the resolver (for logging)
    fn auth_type(&self) -> &'static str;
}

/// Shared resolver handle
pub type SharedPrincipalResolver = Arc<dyn PrincipalResolver>;

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MissingToken)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingToken);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    Ok(token)
}
