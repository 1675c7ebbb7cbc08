//! Sync reconciler
//!
//! Diffs the scanned permission catalog against the persisted one and creates
//! whatever is missing, in a single batch.

use crate::access_control::NewPermission;
use crate::declarations::{DeclarationLocation, ScanResult};
use crate::error::SyncError;
use crate::store::AccessStore;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Outcome of one reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Every scanned slug, in scan order
    pub found: Vec<String>,
    /// Slugs persisted by this run
    pub created: Vec<String>,
    /// Slugs that already had an active record
    pub existing: Vec<String>,
}

/// Creates permission records for newly declared slugs
#[derive(Clone)]
pub struct SyncReconciler {
    store: Arc<dyn AccessStore>,
}

impl SyncReconciler {
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        Self { store }
    }

    /// Persist every scanned slug that has no active record yet
    ///
    /// Running it twice with the same scan writes nothing the second time.
    #[instrument(skip_all, fields(found = scan.len()))]
    pub async fn reconcile(&self, scan: &ScanResult) -> Result<ReconcileReport, SyncError> {
        let persisted = self
            .store
            .list_permissions()
            .await
            .map_err(SyncError::reconciling)?;
        let persisted: HashSet<String> = persisted.into_iter().map(|p| p.slug).collect();

        let mut report = ReconcileReport {
            found: scan.keys().cloned().collect(),
            ..Default::default()
        };
        let mut batch = Vec::new();

        for (slug, location) in scan {
            if persisted.contains(slug) {
                report.existing.push(slug.clone());
            } else {
                debug!(slug = %slug, declared_at = %location, "New permission");
                batch.push(NewPermission {
                    slug: slug.clone(),
                    description: Some(describe(slug, location)),
                });
            }
        }

        if batch.is_empty() {
            debug!("Permission catalog already up to date");
            return Ok(report);
        }

        let created = self
            .store
            .insert_permissions(batch)
            .await
            .map_err(SyncError::reconciling)?;
        report.created = created.into_iter().map(|p| p.slug).collect();

        info!(
            created = report.created.len(),
            existing = report.existing.len(),
            "Created new permissions"
        );
        Ok(report)
    }
}

/// Human readable description derived from where a slug was declared
///
/// `users.read` declared in `users.list` becomes `read users (users.list)`.
pub fn describe(slug: &str, location: &DeclarationLocation) -> String {
    let mut parts = slug.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(resource), Some(action), None) => {
            format!("{} {} ({})", action, resource, location)
        }
        _ => format!("Permission: {} ({})", slug, location),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn scan(entries: &[(&str, &str, &str)]) -> ScanResult {
        entries
            .iter()
            .map(|(slug, controller, method)| {
                (slug.to_string(), DeclarationLocation::new(*controller, *method))
            })
            .collect()
    }

    #[test]
    fn test_describe() {
        let location = DeclarationLocation::new("users", "list");
        assert_eq!(describe("users.read", &location), "read users (users.list)");
        assert_eq!(describe("*", &location), "Permission: * (users.list)");
    }

    #[tokio::test]
    async fn test_reconcile_creates_missing_only() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_permissions(vec![NewPermission {
                slug: "users.read".into(),
                description: None,
            }])
            .await
            .unwrap();

        let reconciler = SyncReconciler::new(store.clone());
        let report = reconciler
            .reconcile(&scan(&[
                ("users.read", "users", "list"),
                ("users.delete", "users", "remove"),
            ]))
            .await
            .unwrap();

        assert_eq!(report.found, vec!["users.read", "users.delete"]);
        assert_eq!(report.created, vec!["users.delete"]);
        assert_eq!(report.existing, vec!["users.read"]);

        let created = store
            .find_permissions_by_slugs(&["users.delete".to_string()])
            .await
            .unwrap();
        assert_eq!(
            created[0].description.as_deref(),
            Some("delete users (users.remove)")
        );
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let reconciler = SyncReconciler::new(store.clone());
        let scanned = scan(&[("a.read", "a", "list")]);

        let first = reconciler.reconcile(&scanned).await.unwrap();
        let second = reconciler.reconcile(&scanned).await.unwrap();

        assert_eq!(first.created, vec!["a.read"]);
        assert!(second.created.is_empty());
        assert_eq!(second.existing, vec!["a.read"]);
        assert_eq!(store.list_permissions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_empty_scan() {
        let reconciler = SyncReconciler::new(Arc::new(MemoryStore::new()));
        let report = reconciler.reconcile(&ScanResult::new()).await.unwrap();
        assert_eq!(report, ReconcileReport::default());
    }
}
