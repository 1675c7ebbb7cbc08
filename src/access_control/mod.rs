//! Access control module
//!
//! Wildcard-aware permission matching and the per-request authorization decision.
//!
//! ## Access Control Model
//!
//! Users hold roles; roles hold permissions. A protected operation declares
//! required roles (any-of) and/or required permissions (all-of):
//!
//! ```text
//! principal.roles ──flatten──▶ effective permissions ──has_all──▶ declared permissions
//!        └──────────── any-of ─────────────────────────────────▶ declared roles
//! ```
//!
//! Granted permissions may be wildcards:
//! - `users.*` - every action on `users`
//! - `*.read` - `read` on every resource
//! - `*` - everything

pub mod decision;
pub mod patterns;
pub mod types;

pub use decision::{AccessDecision, DenyReason, decide};
pub use patterns::{
    PatternMatcher, WildcardPattern, expand, has_all, has_any, is_valid_permission_slug, matches,
    normalize_permission_slug, normalize_role_slug,
};
pub use types::{
    AccessRequirement, Declares, NewPermission, NewRole, Permission, Principal, Role, RoleGrant,
    effective_permissions,
};
