//! Role and permission management
//!
//! Validates admin requests and applies them to the store. Role slugs are
//! normalized to kebab-case and permission slugs to `resource.action` before
//! anything is persisted.

use crate::access_control::{
    NewPermission, NewRole, Permission, Role, is_valid_permission_slug, normalize_permission_slug,
    normalize_role_slug,
};
use crate::config::{ROLE_SLUG_MAX_LEN, ROLE_SLUG_MIN_LEN};
use crate::error::{AccessError, AccessResult, DbError};
use crate::store::AccessStore;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Maximum description length for roles and permissions
pub const DESCRIPTION_MAX_LEN: usize = 255;

/// Request body for creating a role
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRole {
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permission_ids: Vec<i64>,
}

/// Request body for updating a role
///
/// Absent fields are left unchanged. `permission_ids: []` clears the set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRole {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permission_ids: Option<Vec<i64>>,
}

/// Request body for the assign/add/remove permission operations
#[derive(Debug, Clone, Deserialize)]
pub struct AssignPermissions {
    pub permission_ids: Vec<i64>,
}

/// Request body for creating a permission by hand
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePermission {
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Role and permission CRUD over an [`AccessStore`]
#[derive(Clone)]
pub struct AccessControlService {
    store: Arc<dyn AccessStore>,
}

impl AccessControlService {
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        Self { store }
    }

    // =========================================================================
    // Roles
    // =========================================================================

    pub async fn create_role(&self, input: CreateRole) -> AccessResult<Role> {
        let slug = role_slug(&input.slug)?;
        validate_description(input.description.as_deref())?;

        if self.store.get_role_by_slug(&slug).await?.is_some() {
            return Err(AccessError::conflict(format!(
                "Role with slug '{}' already exists",
                slug
            )));
        }

        let permissions = self.resolve_permissions(&input.permission_ids).await?;
        let role = self
            .store
            .create_role(NewRole {
                slug,
                description: input.description,
                permission_ids: permissions.iter().map(|p| p.id).collect(),
            })
            .await?;

        info!(role_id = role.id, slug = %role.slug, "Role created");
        Ok(role)
    }

    /// All active roles, newest first
    pub async fn list_roles(&self) -> AccessResult<Vec<Role>> {
        Ok(self.store.list_roles().await?)
    }

    pub async fn get_role(&self, id: i64) -> AccessResult<Role> {
        self.store
            .get_role(id)
            .await?
            .ok_or_else(|| AccessError::role_not_found(id))
    }

    pub async fn update_role(&self, id: i64, input: UpdateRole) -> AccessResult<Role> {
        let mut role = self.get_role(id).await?;

        if let Some(raw) = &input.slug {
            let slug = role_slug(raw)?;
            if slug != role.slug {
                if self.store.get_role_by_slug(&slug).await?.is_some() {
                    return Err(AccessError::conflict(format!(
                        "Role with slug '{}' already exists",
                        slug
                    )));
                }
                role.slug = slug;
            }
        }

        if let Some(description) = input.description {
            validate_description(Some(&description))?;
            role.description = Some(description);
        }

        if let Some(ids) = &input.permission_ids {
            role.permissions = self.resolve_permissions(ids).await?;
        }

        let role = self.store.save_role(&role).await?;
        info!(role_id = role.id, slug = %role.slug, "Role updated");
        Ok(role)
    }

    /// Soft-delete a role
    pub async fn remove_role(&self, id: i64) -> AccessResult<()> {
        let role = self.get_role(id).await?;
        self.store.soft_delete_role(id).await?;
        info!(role_id = id, slug = %role.slug, "Role soft deleted");
        Ok(())
    }

    // =========================================================================
    // Role permissions
    // =========================================================================

    /// Replace a role's permission set
    pub async fn assign_permissions(&self, role_id: i64, input: AssignPermissions) -> AccessResult<Role> {
        require_ids(&input.permission_ids)?;
        let mut role = self.get_role(role_id).await?;

        role.permissions = self.resolve_permissions(&input.permission_ids).await?;
        let role = self.store.save_role(&role).await?;

        info!(
            slug = %role.slug,
            permissions = ?role.permission_slugs(),
            "Permissions assigned to role"
        );
        Ok(role)
    }

    /// Append permissions a role does not hold yet
    pub async fn add_permissions(&self, role_id: i64, input: AssignPermissions) -> AccessResult<Role> {
        require_ids(&input.permission_ids)?;
        let mut role = self.get_role(role_id).await?;

        let requested = self.resolve_permissions(&input.permission_ids).await?;
        let to_add: Vec<Permission> = requested
            .into_iter()
            .filter(|p| !role.has_permission(p.id))
            .collect();

        if to_add.is_empty() {
            return Err(AccessError::conflict(
                "All specified permissions are already assigned to this role",
            ));
        }

        let added: Vec<String> = to_add.iter().map(|p| p.slug.clone()).collect();
        role.grant(to_add);
        let role = self.store.save_role(&role).await?;

        info!(slug = %role.slug, permissions = ?added, "Permissions added to role");
        Ok(role)
    }

    /// Drop the listed permissions from a role. Ids the role does not hold are ignored.
    pub async fn remove_permissions(&self, role_id: i64, input: AssignPermissions) -> AccessResult<Role> {
        require_ids(&input.permission_ids)?;
        let mut role = self.get_role(role_id).await?;

        role.permissions
            .retain(|p| !input.permission_ids.contains(&p.id));
        let role = self.store.save_role(&role).await?;

        info!(slug = %role.slug, ids = ?input.permission_ids, "Permissions removed from role");
        Ok(role)
    }

    // =========================================================================
    // Permissions
    // =========================================================================

    /// All active permissions, ordered by slug
    pub async fn list_permissions(&self) -> AccessResult<Vec<Permission>> {
        Ok(self.store.list_permissions().await?)
    }

    pub async fn get_permission(&self, id: i64) -> AccessResult<Permission> {
        self.store
            .get_permission(id)
            .await?
            .ok_or_else(|| AccessError::permission_not_found(id))
    }

    /// Create a permission outside of a sync run
    pub async fn create_permission(&self, input: CreatePermission) -> AccessResult<Permission> {
        let slug = normalize_permission_slug(&input.slug);
        if !is_valid_permission_slug(&slug) {
            return Err(AccessError::validation(format!(
                "Invalid permission slug '{}', expected 'resource.action'",
                input.slug
            )));
        }
        validate_description(input.description.as_deref())?;

        if !self
            .store
            .find_permissions_by_slugs(std::slice::from_ref(&slug))
            .await?
            .is_empty()
        {
            return Err(AccessError::conflict(format!(
                "Permission '{}' already exists",
                slug
            )));
        }

        let permission = self
            .store
            .insert_permissions(vec![NewPermission {
                slug,
                description: input.description,
            }])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AccessError::Store(DbError::Internal("insert returned no rows".into())))?;

        info!(permission_id = permission.id, slug = %permission.slug, "Permission created");
        Ok(permission)
    }

    /// Load the permissions behind `ids`, failing with the list of unknown ids
    async fn resolve_permissions(&self, ids: &[i64]) -> AccessResult<Vec<Permission>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let unique: Vec<i64> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let found = self.store.find_permissions_by_ids(&unique).await?;
        let invalid: Vec<i64> = unique
            .iter()
            .copied()
            .filter(|id| !found.iter().any(|p| p.id == *id))
            .collect();

        if !invalid.is_empty() {
            return Err(AccessError::invalid_permission_ids(invalid));
        }

        Ok(found)
    }
}

fn role_slug(raw: &str) -> AccessResult<String> {
    let slug = normalize_role_slug(raw);
    if !(ROLE_SLUG_MIN_LEN..=ROLE_SLUG_MAX_LEN).contains(&slug.len()) {
        return Err(AccessError::validation(format!(
            "Role slug must be {}-{} characters after normalization, got '{}'",
            ROLE_SLUG_MIN_LEN, ROLE_SLUG_MAX_LEN, slug
        )));
    }
    Ok(slug)
}

fn validate_description(description: Option<&str>) -> AccessResult<()> {
    match description {
        Some(d) if d.chars().count() > DESCRIPTION_MAX_LEN => Err(AccessError::validation(
            format!("Description must be at most {} characters", DESCRIPTION_MAX_LEN),
        )),
        _ => Ok(()),
    }
}

fn require_ids(ids: &[i64]) -> AccessResult<()> {
    if ids.is_empty() {
        return Err(AccessError::validation("permission_ids must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn service_with(slugs: &[&str]) -> (AccessControlService, Vec<Permission>) {
        let store = Arc::new(MemoryStore::new());
        let permissions = store
            .insert_permissions(
                slugs
                    .iter()
                    .map(|s| NewPermission {
                        slug: s.to_string(),
                        description: None,
                    })
                    .collect(),
            )
            .await
            .unwrap();
        (AccessControlService::new(store), permissions)
    }

    fn create(slug: &str, permission_ids: Vec<i64>) -> CreateRole {
        CreateRole {
            slug: slug.to_string(),
            description: None,
            permission_ids,
        }
    }

    #[tokio::test]
    async fn test_create_role_normalizes_slug() {
        let (service, _) = service_with(&[]).await;
        let role = service.create_role(create("Content Editor", vec![])).await.unwrap();
        assert_eq!(role.slug, "content-editor");
    }

    #[tokio::test]
    async fn test_create_role_rejects_short_slug() {
        let (service, _) = service_with(&[]).await;
        assert!(matches!(
            service.create_role(create("a!", vec![])).await,
            Err(AccessError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_role_lists_invalid_ids() {
        let (service, permissions) = service_with(&["users.read"]).await;
        let err = service
            .create_role(create("editor", vec![permissions[0].id, 99, 100]))
            .await
            .unwrap_err();

        match err {
            AccessError::Conflict { invalid_ids, .. } => assert_eq!(invalid_ids, vec![99, 100]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_role_duplicate_slug() {
        let (service, _) = service_with(&[]).await;
        service.create_role(create("editor", vec![])).await.unwrap();
        assert!(matches!(
            service.create_role(create("Editor", vec![])).await,
            Err(AccessError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_role_empty_ids_clears() {
        let (service, permissions) = service_with(&["users.read"]).await;
        let role = service
            .create_role(create("editor", vec![permissions[0].id]))
            .await
            .unwrap();

        let updated = service
            .update_role(
                role.id,
                UpdateRole {
                    permission_ids: Some(vec![]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.permissions.is_empty());

        let untouched = service
            .update_role(
                role.id,
                UpdateRole {
                    description: Some("Edits things".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(untouched.description.as_deref(), Some("Edits things"));
        assert!(untouched.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_add_permissions_all_already_assigned() {
        let (service, permissions) = service_with(&["users.read", "users.create"]).await;
        let role = service
            .create_role(create("editor", vec![permissions[0].id]))
            .await
            .unwrap();

        let err = service
            .add_permissions(
                role.id,
                AssignPermissions {
                    permission_ids: vec![permissions[0].id],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Conflict { .. }));

        let role = service
            .add_permissions(
                role.id,
                AssignPermissions {
                    permission_ids: vec![permissions[0].id, permissions[1].id],
                },
            )
            .await
            .unwrap();
        assert_eq!(role.permissions.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_permissions_ignores_unheld() {
        let (service, permissions) = service_with(&["users.read", "users.create"]).await;
        let role = service
            .create_role(create("editor", vec![permissions[0].id, permissions[1].id]))
            .await
            .unwrap();

        let role = service
            .remove_permissions(
                role.id,
                AssignPermissions {
                    permission_ids: vec![permissions[0].id, 500],
                },
            )
            .await
            .unwrap();
        assert_eq!(role.permission_slugs(), vec!["users.create"]);
    }

    #[tokio::test]
    async fn test_empty_id_list_is_validation_error() {
        let (service, _) = service_with(&[]).await;
        let role = service.create_role(create("editor", vec![])).await.unwrap();
        assert!(matches!(
            service
                .assign_permissions(role.id, AssignPermissions { permission_ids: vec![] })
                .await,
            Err(AccessError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_role_then_not_found() {
        let (service, _) = service_with(&[]).await;
        let role = service.create_role(create("editor", vec![])).await.unwrap();
        service.remove_role(role.id).await.unwrap();

        assert!(matches!(
            service.get_role(role.id).await,
            Err(AccessError::NotFound { .. })
        ));
        assert!(service.remove_role(role.id).await.is_err());
    }

    #[tokio::test]
    async fn test_create_permission() {
        let (service, _) = service_with(&["users.read"]).await;

        let created = service
            .create_permission(CreatePermission {
                slug: " Reports.Export ".into(),
                description: None,
            })
            .await
            .unwrap();
        assert_eq!(created.slug, "reports.export");

        assert!(matches!(
            service
                .create_permission(CreatePermission {
                    slug: "users.read".into(),
                    description: None,
                })
                .await,
            Err(AccessError::Conflict { .. })
        ));
        assert!(matches!(
            service
                .create_permission(CreatePermission {
                    slug: "reports".into(),
                    description: None,
                })
                .await,
            Err(AccessError::Validation(_))
        ));
    }
}
