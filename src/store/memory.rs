//! In-memory [`AccessStore`]
//!
//! All tables live behind one `RwLock`, so every trait call is atomic with
//! respect to the others.

use super::AccessStore;
use crate::access_control::{NewPermission, NewRole, Permission, Role};
use crate::error::{DbError, DbResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct RoleRow {
    id: i64,
    slug: String,
    description: Option<String>,
    permission_ids: Vec<i64>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
    deleted_at: Option<chrono::DateTime<Utc>>,
}

impl RoleRow {
    fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

#[derive(Debug, Default)]
struct Tables {
    permissions: Vec<Permission>,
    roles: Vec<RoleRow>,
    next_permission_id: i64,
    next_role_id: i64,
}

impl Tables {
    fn active_permission(&self, id: i64) -> Option<&Permission> {
        self.permissions.iter().find(|p| p.id == id && p.is_active())
    }

    fn slug_taken(&self, slug: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p.is_active() && p.slug == slug)
    }

    fn role_slug_taken(&self, slug: &str, except: Option<i64>) -> bool {
        self.roles
            .iter()
            .any(|r| r.is_active() && r.slug == slug && Some(r.id) != except)
    }

    /// Dedup `ids` keeping order, failing on ids without an active permission
    fn resolve_permission_ids(&self, ids: &[i64]) -> DbResult<Vec<i64>> {
        let mut seen = HashSet::new();
        let unique: Vec<i64> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let unknown: Vec<String> = unique
            .iter()
            .filter(|id| self.active_permission(**id).is_none())
            .map(|id| id.to_string())
            .collect();

        if !unknown.is_empty() {
            return Err(DbError::Conflict(format!(
                "Some permission IDs are invalid: [{}]",
                unknown.join(", ")
            )));
        }

        Ok(unique)
    }

    fn load_role(&self, row: &RoleRow) -> Role {
        Role {
            id: row.id,
            slug: row.slug.clone(),
            description: row.description.clone(),
            permissions: row
                .permission_ids
                .iter()
                .filter_map(|id| self.active_permission(*id).cloned())
                .collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

/// [`AccessStore`] kept entirely in process memory
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                next_permission_id: 1,
                next_role_id: 1,
                ..Default::default()
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccessStore for MemoryStore {
    async fn list_permissions(&self) -> DbResult<Vec<Permission>> {
        let tables = self.tables.read().await;
        let mut permissions: Vec<Permission> = tables
            .permissions
            .iter()
            .filter(|p| p.is_active())
            .cloned()
            .collect();
        permissions.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(permissions)
    }

    async fn get_permission(&self, id: i64) -> DbResult<Option<Permission>> {
        let tables = self.tables.read().await;
        Ok(tables.active_permission(id).cloned())
    }

    async fn find_permissions_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Permission>> {
        let tables = self.tables.read().await;
        Ok(tables
            .permissions
            .iter()
            .filter(|p| p.is_active() && ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn find_permissions_by_slugs(&self, slugs: &[String]) -> DbResult<Vec<Permission>> {
        let tables = self.tables.read().await;
        Ok(tables
            .permissions
            .iter()
            .filter(|p| p.is_active() && slugs.contains(&p.slug))
            .cloned()
            .collect())
    }

    async fn insert_permissions(
        &self,
        permissions: Vec<NewPermission>,
    ) -> DbResult<Vec<Permission>> {
        let mut tables = self.tables.write().await;

        let mut batch = HashSet::new();
        for new in &permissions {
            if tables.slug_taken(&new.slug) || !batch.insert(new.slug.as_str()) {
                return Err(DbError::Conflict(format!(
                    "Permission '{}' already exists",
                    new.slug
                )));
            }
        }

        let now = Utc::now();
        let mut inserted = Vec::with_capacity(permissions.len());
        for new in permissions {
            let permission = Permission {
                id: tables.next_permission_id,
                slug: new.slug,
                description: new.description,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            tables.next_permission_id += 1;
            tables.permissions.push(permission.clone());
            inserted.push(permission);
        }

        debug!(count = inserted.len(), "Inserted permissions");
        Ok(inserted)
    }

    async fn create_role(&self, input: NewRole) -> DbResult<Role> {
        let mut tables = self.tables.write().await;

        if tables.role_slug_taken(&input.slug, None) {
            return Err(DbError::Conflict(format!(
                "Role with slug '{}' already exists",
                input.slug
            )));
        }

        let permission_ids = tables.resolve_permission_ids(&input.permission_ids)?;
        let now = Utc::now();
        let row = RoleRow {
            id: tables.next_role_id,
            slug: input.slug,
            description: input.description,
            permission_ids,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.next_role_id += 1;

        let role = tables.load_role(&row);
        tables.roles.push(row);

        debug!(role_id = role.id, slug = %role.slug, "Created role");
        Ok(role)
    }

    async fn list_roles(&self) -> DbResult<Vec<Role>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&RoleRow> = tables.roles.iter().filter(|r| r.is_active()).collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows.into_iter().map(|row| tables.load_role(row)).collect())
    }

    async fn get_role(&self, id: i64) -> DbResult<Option<Role>> {
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .iter()
            .find(|r| r.id == id && r.is_active())
            .map(|row| tables.load_role(row)))
    }

    async fn get_role_by_slug(&self, slug: &str) -> DbResult<Option<Role>> {
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .iter()
            .find(|r| r.slug == slug && r.is_active())
            .map(|row| tables.load_role(row)))
    }

    async fn save_role(&self, role: &Role) -> DbResult<Role> {
        let mut tables = self.tables.write().await;

        if tables.role_slug_taken(&role.slug, Some(role.id)) {
            return Err(DbError::Conflict(format!(
                "Role with slug '{}' already exists",
                role.slug
            )));
        }

        let ids: Vec<i64> = role.permissions.iter().map(|p| p.id).collect();
        let permission_ids = tables.resolve_permission_ids(&ids)?;

        let row = tables
            .roles
            .iter_mut()
            .find(|r| r.id == role.id && r.is_active())
            .ok_or_else(|| DbError::NotFound(format!("Role with ID {} not found", role.id)))?;

        row.slug = role.slug.clone();
        row.description = role.description.clone();
        row.permission_ids = permission_ids;
        row.updated_at = Utc::now();

        let row = row.clone();
        Ok(tables.load_role(&row))
    }

    async fn soft_delete_role(&self, id: i64) -> DbResult<()> {
        let mut tables = self.tables.write().await;

        let row = tables
            .roles
            .iter_mut()
            .find(|r| r.id == id && r.is_active())
            .ok_or_else(|| DbError::NotFound(format!("Role with ID {} not found", id)))?;

        let now = Utc::now();
        row.deleted_at = Some(now);
        row.updated_at = now;

        debug!(role_id = id, "Soft-deleted role");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_permission(slug: &str) -> NewPermission {
        NewPermission {
            slug: slug.to_string(),
            description: None,
        }
    }

    fn new_role(slug: &str, permission_ids: Vec<i64>) -> NewRole {
        NewRole {
            slug: slug.to_string(),
            description: None,
            permission_ids,
        }
    }

    #[tokio::test]
    async fn test_insert_and_list_permissions_sorted() {
        let store = MemoryStore::new();
        store
            .insert_permissions(vec![new_permission("users.read"), new_permission("auth.login")])
            .await
            .unwrap();

        let slugs: Vec<_> = store
            .list_permissions()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.slug)
            .collect();
        assert_eq!(slugs, vec!["auth.login", "users.read"]);
    }

    #[tokio::test]
    async fn test_insert_permissions_is_all_or_nothing() {
        let store = MemoryStore::new();
        store
            .insert_permissions(vec![new_permission("users.read")])
            .await
            .unwrap();

        let result = store
            .insert_permissions(vec![new_permission("users.delete"), new_permission("users.read")])
            .await;
        assert!(matches!(result, Err(DbError::Conflict(_))));
        assert_eq!(store.list_permissions().await.unwrap().len(), 1);

        let result = store
            .insert_permissions(vec![new_permission("a.read"), new_permission("a.read")])
            .await;
        assert!(matches!(result, Err(DbError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_role_rejects_unknown_permissions() {
        let store = MemoryStore::new();
        let result = store.create_role(new_role("admin", vec![42])).await;
        assert!(matches!(result, Err(DbError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_role_slug_unique_among_active() {
        let store = MemoryStore::new();
        let role = store.create_role(new_role("admin", vec![])).await.unwrap();
        assert!(store.create_role(new_role("admin", vec![])).await.is_err());

        store.soft_delete_role(role.id).await.unwrap();
        assert!(store.get_role(role.id).await.unwrap().is_none());
        assert!(store.create_role(new_role("admin", vec![])).await.is_ok());
    }

    #[tokio::test]
    async fn test_save_role_replaces_and_dedups_association() {
        let store = MemoryStore::new();
        let inserted = store
            .insert_permissions(vec![new_permission("a.read"), new_permission("b.read")])
            .await
            .unwrap();
        let mut role = store
            .create_role(new_role("editor", vec![inserted[0].id]))
            .await
            .unwrap();

        role.permissions = vec![inserted[1].clone(), inserted[1].clone()];
        let saved = store.save_role(&role).await.unwrap();

        assert_eq!(saved.permission_slugs(), vec!["b.read"]);
        let reloaded = store.get_role_by_slug("editor").await.unwrap().unwrap();
        assert_eq!(reloaded.permission_slugs(), vec!["b.read"]);
    }

    #[tokio::test]
    async fn test_list_roles_newest_first() {
        let store = MemoryStore::new();
        store.create_role(new_role("first", vec![])).await.unwrap();
        store.create_role(new_role("second", vec![])).await.unwrap();

        let slugs: Vec<_> = store
            .list_roles()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.slug)
            .collect();
        assert_eq!(slugs, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_soft_delete_missing_role() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.soft_delete_role(9).await,
            Err(DbError::NotFound(_))
        ));
    }
}
