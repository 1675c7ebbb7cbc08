//! Permission synchronization
//!
//! Keeps the persisted permission catalog in step with the declarations in
//! the code, then hands newly created permissions to the configured roles.
//!
//! ```text
//! DeclarationScanner ──▶ SyncReconciler ──▶ AutoAssigner
//!     (slug → location)     (batch insert)     (grant by rule)
//! ```

pub mod auto_assign;
pub mod pipeline;
pub mod reconciler;

pub use auto_assign::{AutoAssignReport, AutoAssignRule, AutoAssignRules, AutoAssigner, RuleFailure};
pub use pipeline::{PermissionSync, SyncReport, SyncState, SyncSummary};
pub use reconciler::{ReconcileReport, SyncReconciler, describe};
