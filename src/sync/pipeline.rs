//! Permission sync pipeline
//!
//! Runs scan → reconcile → auto-assign as one unit. Only one run may be in
//! flight at a time; a concurrent trigger fails fast instead of queueing.

use super::auto_assign::{AutoAssignReport, AutoAssignRules, AutoAssigner};
use super::reconciler::{ReconcileReport, SyncReconciler};
use crate::declarations::{DeclarationRegistry, DeclarationScanner};
use crate::error::{ConfigError, SyncError};
use crate::store::AccessStore;
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Observable pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Scanning,
    Reconciling,
    AutoAssigning,
}

impl SyncState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SyncState::Scanning,
            2 => SyncState::Reconciling,
            3 => SyncState::AutoAssigning,
            _ => SyncState::Idle,
        }
    }
}

/// Counts of one sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub total_found: usize,
    pub created: usize,
    pub existing: usize,
}

/// Result of one sync run, as returned by the admin API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub message: String,
    pub summary: SyncSummary,
    pub details: ReconcileReport,
    pub auto_assign: AutoAssignReport,
}

impl SyncReport {
    fn new(details: ReconcileReport, auto_assign: AutoAssignReport) -> Self {
        let summary = SyncSummary {
            total_found: details.found.len(),
            created: details.created.len(),
            existing: details.existing.len(),
        };
        let message = if summary.created == 0 {
            "Permissions are already in sync".to_string()
        } else {
            format!("Synchronized permissions, {} created", summary.created)
        };

        Self {
            message,
            summary,
            details,
            auto_assign,
        }
    }
}

/// Single-flight scan → reconcile → auto-assign runner
pub struct PermissionSync {
    scanner: DeclarationScanner,
    reconciler: SyncReconciler,
    assigner: AutoAssigner,
    state: AtomicU8,
    running: Mutex<()>,
}

impl PermissionSync {
    pub fn new(
        scanner: DeclarationScanner,
        reconciler: SyncReconciler,
        assigner: AutoAssigner,
    ) -> Self {
        Self {
            scanner,
            reconciler,
            assigner,
            state: AtomicU8::new(SyncState::Idle as u8),
            running: Mutex::new(()),
        }
    }

    /// Wire a pipeline over `registry` and `store` with the configured
    /// auto-assign rules
    pub fn build(
        registry: Arc<DeclarationRegistry>,
        store: Arc<dyn AccessStore>,
        auto_assign: &IndexMap<String, Vec<String>>,
    ) -> Result<Self, ConfigError> {
        let rules = AutoAssignRules::compile(auto_assign)?;
        Ok(Self::new(
            DeclarationScanner::new(registry),
            SyncReconciler::new(store.clone()),
            AutoAssigner::new(store, Arc::new(rules)),
        ))
    }

    /// Current pipeline state
    pub fn state(&self) -> SyncState {
        SyncState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn scanner(&self) -> &DeclarationScanner {
        &self.scanner
    }

    /// Run one sync pass
    ///
    /// Permissions created before a later stage fails stay persisted; the
    /// error names the stage that failed.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Permission sync requested while another run is in progress");
            return Err(SyncError::AlreadyRunning);
        };

        let _idle = ResetOnDrop(&self.state);

        let result = self.run_stages().await;

        match &result {
            Ok(report) => info!(
                found = report.summary.total_found,
                created = report.summary.created,
                existing = report.summary.existing,
                "Permission sync completed"
            ),
            Err(e) => warn!(error = %e, "Permission sync failed"),
        }

        result
    }

    async fn run_stages(&self) -> Result<SyncReport, SyncError> {
        self.set_state(SyncState::Scanning);
        let scanned = self.scanner.scan();

        self.set_state(SyncState::Reconciling);
        let reconciled = self.reconciler.reconcile(&scanned).await?;

        self.set_state(SyncState::AutoAssigning);
        let assigned = self.assigner.auto_assign(&reconciled.created).await?;

        Ok(SyncReport::new(reconciled, assigned))
    }

    fn set_state(&self, state: SyncState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Puts the pipeline back to `Idle` when a run ends, including when the run
/// future is dropped mid-stage
struct ResetOnDrop<'a>(&'a AtomicU8);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(SyncState::Idle as u8, Ordering::Release);
    }
}
