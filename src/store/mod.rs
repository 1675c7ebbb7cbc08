//! Persistence for permission and role records
//!
//! The [`AccessStore`] trait is the seam between the engine and whatever
//! database backs it. [`SqliteStore`] persists to SQLite through `sqlx`;
//! [`MemoryStore`] keeps everything in process and backs the tests.
//!
//! All queries exclude soft-deleted rows. Records are never hard-deleted.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::access_control::{NewPermission, NewRole, Permission, Role};
use crate::error::DbResult;
use async_trait::async_trait;

/// Repository for permissions, roles and the role → permission association
#[async_trait]
pub trait AccessStore: Send + Sync {
    // =========================================================================
    // Permissions
    // =========================================================================

    /// List all active permissions, ordered by slug.
    async fn list_permissions(&self) -> DbResult<Vec<Permission>>;

    /// Get an active permission by its ID.
    async fn get_permission(&self, id: i64) -> DbResult<Option<Permission>>;

    /// Get the active permissions whose IDs are in `ids`. Unknown IDs are
    /// simply absent from the result.
    async fn find_permissions_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Permission>>;

    /// Get the active permissions whose slugs are in `slugs`.
    async fn find_permissions_by_slugs(&self, slugs: &[String]) -> DbResult<Vec<Permission>>;

    /// Insert a batch of permissions.
    ///
    /// The batch is all-or-nothing: if any slug collides with an active
    /// permission (or appears twice in the batch) nothing is written and a
    /// `Conflict` is returned.
    async fn insert_permissions(&self, permissions: Vec<NewPermission>)
    -> DbResult<Vec<Permission>>;

    // =========================================================================
    // Roles
    // =========================================================================

    /// Create a role with an initial permission set.
    ///
    /// # Errors
    /// `Conflict` if an active role already uses the slug or a permission ID
    /// does not exist.
    async fn create_role(&self, input: NewRole) -> DbResult<Role>;

    /// List all active roles with their permissions, newest first.
    async fn list_roles(&self) -> DbResult<Vec<Role>>;

    /// Get an active role by its ID, with permissions.
    async fn get_role(&self, id: i64) -> DbResult<Option<Role>>;

    /// Get an active role by its slug, with permissions.
    async fn get_role_by_slug(&self, slug: &str) -> DbResult<Option<Role>>;

    /// Persist a role's slug, description and full permission set.
    ///
    /// The stored association is replaced by `role.permissions` (deduplicated
    /// by id). Last writer wins.
    async fn save_role(&self, role: &Role) -> DbResult<Role>;

    /// Soft-delete a role by setting `deleted_at`.
    async fn soft_delete_role(&self, id: i64) -> DbResult<()>;
}
