//! Auto-assignment of newly created permissions
//!
//! Configured rules map a role slug to wildcard patterns. After a sync creates
//! permissions, each rule grants the matching new ones to its role:
//!
//! ```toml
//! [auto_assign]
//! admin = ["*"]
//! viewer = ["*.read"]
//! ```
//!
//! Only permissions created by the current run are considered; permissions
//! that already existed are never re-checked against the rules.

use crate::access_control::{Permission, PatternMatcher};
use crate::error::{ConfigError, DbResult, SyncError};
use crate::store::AccessStore;
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// One rule: grant permissions matching `matcher` to role `role`
#[derive(Debug, Clone)]
pub struct AutoAssignRule {
    pub role: String,
    pub matcher: PatternMatcher,
}

/// Compiled auto-assignment rules, in configuration order
#[derive(Debug, Clone, Default)]
pub struct AutoAssignRules {
    rules: Vec<AutoAssignRule>,
}

impl AutoAssignRules {
    /// Compile the configured role → patterns mapping
    pub fn compile(config: &IndexMap<String, Vec<String>>) -> Result<Self, ConfigError> {
        let rules = config
            .iter()
            .map(|(role, patterns)| {
                Ok(AutoAssignRule {
                    role: role.clone(),
                    matcher: PatternMatcher::new(patterns)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self { rules })
    }

    pub fn iter(&self) -> impl Iterator<Item = &AutoAssignRule> {
        self.rules.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

/// A rule that could not be applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFailure {
    pub role: String,
    pub error: String,
}

/// Outcome of one auto-assignment pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutoAssignReport {
    /// Role slug → permission slugs granted by this pass
    pub granted: IndexMap<String, Vec<String>>,
    /// Rules whose role does not exist
    pub skipped: Vec<String>,
    /// Rules that failed while loading or saving their role
    pub failed: Vec<RuleFailure>,
}

/// Applies [`AutoAssignRules`] to freshly created permissions
#[derive(Clone)]
pub struct AutoAssigner {
    store: Arc<dyn AccessStore>,
    rules: Arc<AutoAssignRules>,
}

impl AutoAssigner {
    pub fn new(store: Arc<dyn AccessStore>, rules: Arc<AutoAssignRules>) -> Self {
        Self { store, rules }
    }

    pub fn rules(&self) -> &AutoAssignRules {
        &self.rules
    }

    /// Grant `new_slugs` to the roles whose rules match them
    ///
    /// Failing to load the new permissions aborts the pass. A failure inside
    /// one rule is logged and recorded, and the remaining rules still run.
    #[instrument(skip_all, fields(new = new_slugs.len(), rules = self.rules.len()))]
    pub async fn auto_assign(&self, new_slugs: &[String]) -> Result<AutoAssignReport, SyncError> {
        let mut report = AutoAssignReport::default();

        if self.rules.is_empty() || new_slugs.is_empty() {
            debug!("Nothing to auto-assign");
            return Ok(report);
        }

        let new_permissions = self
            .store
            .find_permissions_by_slugs(new_slugs)
            .await
            .map_err(SyncError::auto_assigning)?;

        for rule in self.rules.iter() {
            match self.apply_rule(rule, &new_permissions).await {
                Ok(Some(granted)) => {
                    if !granted.is_empty() {
                        report.granted.insert(rule.role.clone(), granted);
                    }
                }
                Ok(None) => {
                    warn!(role = %rule.role, "Auto-assign rule targets a role that does not exist");
                    report.skipped.push(rule.role.clone());
                }
                Err(e) => {
                    error!(role = %rule.role, error = %e, "Auto-assign rule failed");
                    report.failed.push(RuleFailure {
                        role: rule.role.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Returns the granted slugs, or `None` when the role is missing
    async fn apply_rule(
        &self,
        rule: &AutoAssignRule,
        new_permissions: &[Permission],
    ) -> DbResult<Option<Vec<String>>> {
        let Some(mut role) = self.store.get_role_by_slug(&rule.role).await? else {
            return Ok(None);
        };

        let matching: Vec<Permission> = new_permissions
            .iter()
            .filter(|p| rule.matcher.matches(&p.slug) && !role.has_permission(p.id))
            .cloned()
            .collect();

        if matching.is_empty() {
            debug!(role = %rule.role, "No new permissions match rule");
            return Ok(Some(Vec::new()));
        }

        let granted: Vec<String> = matching.iter().map(|p| p.slug.clone()).collect();
        role.grant(matching);
        self.store.save_role(&role).await?;

        info!(role = %rule.role, permissions = ?granted, "Auto-assigned permissions");
        Ok(Some(granted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_control::{NewPermission, NewRole};
    use crate::store::MemoryStore;

    fn rules(entries: &[(&str, Vec<&str>)]) -> Arc<AutoAssignRules> {
        let config: IndexMap<String, Vec<String>> = entries
            .iter()
            .map(|(role, patterns)| {
                (
                    role.to_string(),
                    patterns.iter().map(|p| p.to_string()).collect(),
                )
            })
            .collect();
        Arc::new(AutoAssignRules::compile(&config).unwrap())
    }

    async fn seeded(slugs: &[&str], roles: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
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
        for role in roles {
            store
                .create_role(NewRole {
                    slug: role.to_string(),
                    description: None,
                    permission_ids: vec![],
                })
                .await
                .unwrap();
        }
        store
    }

    fn slugs(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compile_keeps_config_order() {
        let compiled = rules(&[("viewer", vec!["*.read"]), ("admin", vec!["*"])]);
        let roles: Vec<_> = compiled.iter().map(|r| r.role.as_str()).collect();
        assert_eq!(roles, vec!["viewer", "admin"]);
    }

    #[test]
    fn test_compile_rejects_malformed_pattern() {
        let mut config = IndexMap::new();
        config.insert("admin".to_string(), vec!["not-a-slug".to_string()]);
        assert!(AutoAssignRules::compile(&config).is_err());
    }

    #[tokio::test]
    async fn test_grants_matching_permissions() {
        let store = seeded(&["users.read", "users.delete", "products.read"], &["viewer"]).await;
        let assigner = AutoAssigner::new(store.clone(), rules(&[("viewer", vec!["*.read"])]));

        let report = assigner
            .auto_assign(&slugs(&["users.read", "users.delete", "products.read"]))
            .await
            .unwrap();

        assert_eq!(report.granted["viewer"], vec!["users.read", "products.read"]);
        let viewer = store.get_role_by_slug("viewer").await.unwrap().unwrap();
        assert_eq!(viewer.permissions.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_role_is_skipped() {
        let store = seeded(&["users.read"], &["admin"]).await;
        let assigner = AutoAssigner::new(
            store.clone(),
            rules(&[("ghost", vec!["*"]), ("admin", vec!["*"])]),
        );

        let report = assigner.auto_assign(&slugs(&["users.read"])).await.unwrap();

        assert_eq!(report.skipped, vec!["ghost"]);
        assert_eq!(report.granted["admin"], vec!["users.read"]);
    }

    #[tokio::test]
    async fn test_second_pass_grants_nothing() {
        let store = seeded(&["users.read"], &["admin"]).await;
        let assigner = AutoAssigner::new(store.clone(), rules(&[("admin", vec!["*"])]));

        assigner.auto_assign(&slugs(&["users.read"])).await.unwrap();
        let report = assigner.auto_assign(&slugs(&["users.read"])).await.unwrap();

        assert!(report.granted.is_empty());
        let admin = store.get_role_by_slug("admin").await.unwrap().unwrap();
        assert_eq!(admin.permission_slugs(), vec!["users.read"]);
    }

    #[tokio::test]
    async fn test_no_rules_is_noop() {
        let store = seeded(&["users.read"], &["admin"]).await;
        let assigner = AutoAssigner::new(store, Arc::new(AutoAssignRules::default()));

        let report = assigner.auto_assign(&slugs(&["users.read"])).await.unwrap();
        assert_eq!(report, AutoAssignReport::default());
    }
}
