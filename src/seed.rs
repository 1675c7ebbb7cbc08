//! Startup seeding
//!
//! Creates the roles listed under `[seed.roles]` when they do not exist yet.
//! Auto-assignment rules only grant to roles that exist, so seeding runs
//! before the first sync.

use crate::access_control::NewRole;
use crate::config::SeedConfig;
use crate::error::DbResult;
use crate::store::AccessStore;
use tracing::{debug, info};

/// Create missing seed roles, returning the slugs that were created
pub async fn seed_roles(store: &dyn AccessStore, config: &SeedConfig) -> DbResult<Vec<String>> {
    let mut created = Vec::new();

    for (slug, role) in &config.roles {
        if store.get_role_by_slug(slug).await?.is_some() {
            debug!(role = %slug, "Seed role already exists");
            continue;
        }

        store
            .create_role(NewRole {
                slug: slug.clone(),
                description: role.description.clone(),
                permission_ids: Vec::new(),
            })
            .await?;
        created.push(slug.clone());
    }

    if !created.is_empty() {
        info!(roles = ?created, "Seeded roles");
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeedRole;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = MemoryStore::new();
        let mut config = SeedConfig::default();
        config.roles.insert(
            "admin".to_string(),
            SeedRole {
                description: Some("Administrators".to_string()),
            },
        );
        config.roles.insert("viewer".to_string(), SeedRole::default());

        let first = seed_roles(&store, &config).await.unwrap();
        let second = seed_roles(&store, &config).await.unwrap();

        assert_eq!(first, vec!["admin", "viewer"]);
        assert!(second.is_empty());
        assert_eq!(store.list_roles().await.unwrap().len(), 2);
    }
}
