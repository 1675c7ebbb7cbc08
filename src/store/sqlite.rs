//! SQLite-backed [`AccessStore`]
//!
//! Schema lives in `migrations/`. Slug uniqueness is enforced by partial
//! unique indexes over active rows, so a soft-deleted role frees its slug.

use super::AccessStore;
use crate::access_control::{NewPermission, NewRole, Permission, Role};
use crate::config::DatabaseConfig;
use crate::error::{DbError, DbResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const PERMISSION_COLUMNS: &str = "id, slug, description, created_at, updated_at, deleted_at";
const ROLE_COLUMNS: &str = "id, slug, description, created_at, updated_at, deleted_at";

/// [`AccessStore`] persisted in a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `config.url`, creating the database file if needed
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        let in_memory = config.is_in_memory();

        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(if in_memory {
                SqliteJournalMode::Memory
            } else {
                SqliteJournalMode::Wal
            })
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
        if in_memory {
            // Every connection to `:memory:` is a separate database
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        debug!(url = %config.url, "Connected to SQLite");
        Ok(Self::new(pool))
    }

    /// Apply the embedded migrations
    pub async fn migrate(&self) -> DbResult<()> {
        info!("Running SQLite migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn parse_permission(row: &SqliteRow) -> DbResult<Permission> {
    Ok(Permission {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

async fn permissions_by_ids(conn: &mut SqliteConnection, ids: &[i64]) -> DbResult<Vec<Permission>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT {PERMISSION_COLUMNS} FROM permissions \
         WHERE deleted_at IS NULL AND id IN ({}) ORDER BY id",
        placeholders(ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(*id);
    }

    query
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(parse_permission)
        .collect()
}

/// Dedup `ids` keeping order, failing on ids without an active permission
async fn resolve_permission_ids(conn: &mut SqliteConnection, ids: &[i64]) -> DbResult<Vec<i64>> {
    let mut seen = HashSet::new();
    let unique: Vec<i64> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

    let found: HashSet<i64> = permissions_by_ids(conn, &unique)
        .await?
        .into_iter()
        .map(|p| p.id)
        .collect();

    let unknown: Vec<String> = unique
        .iter()
        .filter(|id| !found.contains(id))
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

async fn role_permissions(conn: &mut SqliteConnection, role_id: i64) -> DbResult<Vec<Permission>> {
    sqlx::query(
        r#"
        SELECT p.id, p.slug, p.description, p.created_at, p.updated_at, p.deleted_at
        FROM role_permissions rp
        JOIN permissions p ON p.id = rp.permission_id
        WHERE rp.role_id = ? AND p.deleted_at IS NULL
        ORDER BY rp.position
        "#,
    )
    .bind(role_id)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(parse_permission)
    .collect()
}

async fn write_role_permissions(
    conn: &mut SqliteConnection,
    role_id: i64,
    permission_ids: &[i64],
) -> DbResult<()> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
        .bind(role_id)
        .execute(&mut *conn)
        .await?;

    for (position, permission_id) in permission_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id, position) VALUES (?, ?, ?)",
        )
        .bind(role_id)
        .bind(permission_id)
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn load_role(conn: &mut SqliteConnection, row: &SqliteRow) -> DbResult<Role> {
    let id: i64 = row.try_get("id")?;
    let permissions = role_permissions(conn, id).await?;

    Ok(Role {
        id,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        permissions,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

async fn role_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Role>> {
    let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = ? AND deleted_at IS NULL");
    let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *conn).await?;

    match row {
        Some(row) => Ok(Some(load_role(conn, &row).await?)),
        None => Ok(None),
    }
}

fn role_conflict(slug: &str) -> impl FnOnce(sqlx::Error) -> DbError + '_ {
    move |e| match e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DbError::Conflict(format!("Role with slug '{}' already exists", slug))
        }
        _ => DbError::from(e),
    }
}

#[async_trait]
impl AccessStore for SqliteStore {
    async fn list_permissions(&self) -> DbResult<Vec<Permission>> {
        let sql = format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE deleted_at IS NULL ORDER BY slug"
        );
        sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(parse_permission)
            .collect()
    }

    async fn get_permission(&self, id: i64) -> DbResult<Option<Permission>> {
        let sql = format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = ? AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(parse_permission).transpose()
    }

    async fn find_permissions_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Permission>> {
        let mut conn = self.pool.acquire().await?;
        permissions_by_ids(&mut conn, ids).await
    }

    async fn find_permissions_by_slugs(&self, slugs: &[String]) -> DbResult<Vec<Permission>> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions \
             WHERE deleted_at IS NULL AND slug IN ({}) ORDER BY id",
            placeholders(slugs.len())
        );
        let mut query = sqlx::query(&sql);
        for slug in slugs {
            query = query.bind(slug);
        }

        query
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(parse_permission)
            .collect()
    }

    async fn insert_permissions(
        &self,
        permissions: Vec<NewPermission>,
    ) -> DbResult<Vec<Permission>> {
        if permissions.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(permissions.len());

        for new in permissions {
            let result = sqlx::query(
                "INSERT INTO permissions (slug, description, created_at, updated_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&new.slug)
            .bind(&new.description)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                    DbError::Conflict(format!("Permission '{}' already exists", new.slug))
                }
                _ => DbError::from(e),
            })?;

            inserted.push(Permission {
                id: result.last_insert_rowid(),
                slug: new.slug,
                description: new.description,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            });
        }

        tx.commit().await?;

        debug!(count = inserted.len(), "Inserted permissions");
        Ok(inserted)
    }

    async fn create_role(&self, input: NewRole) -> DbResult<Role> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let permission_ids = resolve_permission_ids(&mut tx, &input.permission_ids).await?;

        let id = sqlx::query(
            "INSERT INTO roles (slug, description, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&input.slug)
        .bind(&input.description)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(role_conflict(&input.slug))?
        .last_insert_rowid();

        write_role_permissions(&mut tx, id, &permission_ids).await?;

        let role = role_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::Internal(format!("Role {} vanished after insert", id)))?;

        tx.commit().await?;

        debug!(role_id = role.id, slug = %role.slug, "Created role");
        Ok(role)
    }

    async fn list_roles(&self) -> DbResult<Vec<Role>> {
        let mut conn = self.pool.acquire().await?;

        let sql = format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;

        let mut roles = Vec::with_capacity(rows.len());
        for row in &rows {
            roles.push(load_role(&mut conn, row).await?);
        }
        Ok(roles)
    }

    async fn get_role(&self, id: i64) -> DbResult<Option<Role>> {
        let mut conn = self.pool.acquire().await?;
        role_by_id(&mut conn, id).await
    }

    async fn get_role_by_slug(&self, slug: &str) -> DbResult<Option<Role>> {
        let mut conn = self.pool.acquire().await?;

        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE slug = ? AND deleted_at IS NULL");
        let row = sqlx::query(&sql).bind(slug).fetch_optional(&mut *conn).await?;

        match row {
            Some(row) => Ok(Some(load_role(&mut conn, &row).await?)),
            None => Ok(None),
        }
    }

    async fn save_role(&self, role: &Role) -> DbResult<Role> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<i64> = role.permissions.iter().map(|p| p.id).collect();
        let permission_ids = resolve_permission_ids(&mut tx, &ids).await?;

        let updated = sqlx::query(
            "UPDATE roles SET slug = ?, description = ?, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&role.slug)
        .bind(&role.description)
        .bind(Utc::now())
        .bind(role.id)
        .execute(&mut *tx)
        .await
        .map_err(role_conflict(&role.slug))?;

        if updated.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Role with ID {} not found", role.id)));
        }

        write_role_permissions(&mut tx, role.id, &permission_ids).await?;

        let saved = role_by_id(&mut tx, role.id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Role with ID {} not found", role.id)))?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn soft_delete_role(&self, id: i64) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE roles SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Role with ID {} not found", id)));
        }

        debug!(role_id = id, "Soft-deleted role");
        Ok(())
    }
}
