//! Access control types
//!
//! Core types used by the access control system: the persisted permission and
//! role records, the per-request principal, and declared requirements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A permission record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: i64,
    /// Normalized `resource.action` slug, may contain `*`
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Permission {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Input for creating a permission record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPermission {
    pub slug: String,
    pub description: Option<String>,
}

/// A role record together with its permission set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    /// Normalized kebab-case slug
    pub slug: String,
    pub description: Option<String>,
    /// Unique by permission id
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Role {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn has_permission(&self, permission_id: i64) -> bool {
        self.permissions.iter().any(|p| p.id == permission_id)
    }

    pub fn permission_slugs(&self) -> Vec<String> {
        self.permissions.iter().map(|p| p.slug.clone()).collect()
    }

    /// Append permissions not already held, keeping membership unique by id.
    /// Returns the number of permissions added.
    pub fn grant(&mut self, permissions: impl IntoIterator<Item = Permission>) -> usize {
        let mut added = 0;
        for permission in permissions {
            if !self.has_permission(permission.id) {
                self.permissions.push(permission);
                added += 1;
            }
        }
        added
    }
}

/// Input for creating a role record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    pub slug: String,
    pub description: Option<String>,
    pub permission_ids: Vec<i64>,
}

/// A role as seen by the decision engine: its slug and granted permission slugs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub slug: String,
    pub permissions: Vec<String>,
}

impl RoleGrant {
    pub fn new<S: Into<String>>(slug: impl Into<String>, permissions: impl IntoIterator<Item = S>) -> Self {
        Self {
            slug: slug.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<&Role> for RoleGrant {
    fn from(role: &Role) -> Self {
        Self {
            slug: role.slug.clone(),
            permissions: role.permission_slugs(),
        }
    }
}

/// The authenticated caller, produced by a
/// [`PrincipalResolver`](crate::auth::PrincipalResolver) for each request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub username: String,
    pub roles: Vec<RoleGrant>,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, roles: Vec<RoleGrant>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            roles,
        }
    }

    pub fn role_slugs(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(|r| r.slug.as_str())
    }

    pub fn has_role(&self, slug: &str) -> bool {
        self.role_slugs().any(|r| r == slug)
    }

    /// Deduplicated union of permission slugs across all roles
    pub fn effective_permissions(&self) -> Vec<String> {
        effective_permissions(&self.roles)
    }
}

/// Flatten the permission slugs of `roles`, dropping duplicates and keeping
/// first-seen order.
pub fn effective_permissions(roles: &[RoleGrant]) -> Vec<String> {
    let mut seen = HashSet::new();
    roles
        .iter()
        .flat_map(|r| r.permissions.iter())
        .filter(|slug| seen.insert(slug.as_str()))
        .cloned()
        .collect()
}

/// Requirements declared by a protected operation
///
/// - both present: any required role AND all required permissions
/// - one present: only that dimension is checked
/// - neither: authentication alone suffices
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequirement {
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl AccessRequirement {
    /// Authentication only
    pub fn none() -> Self {
        Self::default()
    }

    pub fn roles<S: Into<String>>(roles: impl IntoIterator<Item = S>) -> Self {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            permissions: Vec::new(),
        }
    }

    pub fn permissions<S: Into<String>>(permissions: impl IntoIterator<Item = S>) -> Self {
        Self {
            roles: Vec::new(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_roles<S: Into<String>>(mut self, roles: impl IntoIterator<Item = S>) -> Self {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_permissions<S: Into<String>>(
        mut self,
        permissions: impl IntoIterator<Item = S>,
    ) -> Self {
        self.permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.permissions.is_empty()
    }
}

/// Trait for operations that declare their access requirements
pub trait Declares {
    /// Permission slugs the caller must hold (all-of)
    fn required_permissions(&self) -> &[&'static str];

    /// Role slugs the caller must have (any-of)
    fn required_roles(&self) -> &[&'static str];

    /// Owned requirement for the decision engine
    fn requirement(&self) -> AccessRequirement {
        AccessRequirement::roles(self.required_roles().iter().copied())
            .with_permissions(self.required_permissions().iter().copied())
    }
}
