//! Static bearer token authentication
//!
//! Tokens come from configuration. Each maps to a user and a list of role
//! slugs; the roles themselves, with their permissions, are loaded from the
//! store on every call.

use crate::access_control::{Principal, RoleGrant};
use crate::auth::provider::PrincipalResolver;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::store::AccessStore;
use crate::util::SecretString;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct TokenEntry {
    token: SecretString,
    user_id: String,
    username: String,
    roles: Vec<String>,
}

/// Configured bearer token resolver
pub struct TokenPrincipalResolver {
    entries: Vec<TokenEntry>,
    store: Arc<dyn AccessStore>,
}

impl TokenPrincipalResolver {
    /// Create a resolver from the `[auth]` configuration section
    pub fn new(config: &AuthConfig, store: Arc<dyn AccessStore>) -> Self {
        let entries = config
            .tokens
            .iter()
            .map(|t| TokenEntry {
                token: t.token.clone(),
                user_id: t.user_id.clone(),
                username: t.username.clone(),
                roles: if t.roles.is_empty() {
                    config.default_role.iter().cloned().collect()
                } else {
                    t.roles.clone()
                },
            })
            .collect();

        Self { entries, store }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl PrincipalResolver for TokenPrincipalResolver {
    async fn resolve(&self, token: &str) -> Result<Principal, AuthError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.token.matches(token))
            .ok_or(AuthError::InvalidToken)?;

        let mut roles = Vec::with_capacity(entry.roles.len());
        for slug in &entry.roles {
            match self.store.get_role_by_slug(slug).await? {
                Some(role) => roles.push(RoleGrant::from(&role)),
                None => debug!(user = %entry.username, role = %slug, "Dropping unknown role"),
            }
        }

        Ok(Principal::new(
            entry.user_id.clone(),
            entry.username.clone(),
            roles,
        ))
    }

    fn auth_type(&self) -> &'static str {
        "Static bearer token"
    }
}
