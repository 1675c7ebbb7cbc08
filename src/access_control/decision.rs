//! Authorization decision engine
//!
//! Evaluates a caller's roles against an operation's declared requirement:
//! 1. Nothing required → allowed (authentication was verified upstream)
//! 2. Caller has no roles → denied, permissions only ever come from roles
//! 3. Required roles → caller needs at least one of them
//! 4. Required permissions → every one must be covered by a granted slug,
//!    wildcards on the granted side (`users.*` covers `users.read`)
//!
//! Roles are checked before permissions and the first failure wins.

use crate::access_control::patterns;
use crate::access_control::types::{AccessRequirement, Principal, RoleGrant, effective_permissions};
use serde::Serialize;
use std::fmt;
use tracing::trace;

/// Why an authorization check failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenyReason {
    /// The caller holds no roles at all
    NoRolesAssigned,
    /// None of the required roles is held
    MissingRole { required: Vec<String> },
    /// Some required permissions are not covered
    MissingPermission {
        required: Vec<String>,
        missing: Vec<String>,
    },
}

impl DenyReason {
    /// The unmet dimension: `"role"` or `"permission"`
    pub fn dimension(&self) -> &'static str {
        match self {
            DenyReason::NoRolesAssigned | DenyReason::MissingRole { .. } => "role",
            DenyReason::MissingPermission { .. } => "permission",
        }
    }

    /// The requirement list of the unmet dimension
    pub fn required(&self) -> &[String] {
        match self {
            DenyReason::NoRolesAssigned => &[],
            DenyReason::MissingRole { required } => required,
            DenyReason::MissingPermission { required, .. } => required,
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::NoRolesAssigned => write!(f, "no roles assigned"),
            DenyReason::MissingRole { required } => {
                write!(f, "missing required role: one of [{}]", required.join(", "))
            }
            DenyReason::MissingPermission { missing, .. } => {
                write!(f, "missing required permission: [{}]", missing.join(", "))
            }
        }
    }
}

/// Result of an authorization check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Access is allowed
    Allowed,
    /// Access is denied with a reason
    Denied(DenyReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, AccessDecision::Denied(_))
    }

    pub fn reason(&self) -> Option<&DenyReason> {
        match self {
            AccessDecision::Allowed => None,
            AccessDecision::Denied(reason) => Some(reason),
        }
    }
}

/// Decide whether a caller holding `roles` satisfies `requirement`
pub fn decide(roles: &[RoleGrant], requirement: &AccessRequirement) -> AccessDecision {
    if requirement.is_empty() {
        trace!("No requirement declared, authentication suffices");
        return AccessDecision::Allowed;
    }

    if roles.is_empty() {
        return AccessDecision::Denied(DenyReason::NoRolesAssigned);
    }

    if !requirement.roles.is_empty() {
        let has_role = roles
            .iter()
            .any(|held| requirement.roles.iter().any(|r| *r == held.slug));

        if !has_role {
            return AccessDecision::Denied(DenyReason::MissingRole {
                required: requirement.roles.clone(),
            });
        }
    }

    if !requirement.permissions.is_empty() {
        let granted = effective_permissions(roles);

        if !patterns::has_all(&requirement.permissions, &granted) {
            let missing = requirement
                .permissions
                .iter()
                .filter(|required| !granted.iter().any(|g| patterns::matches(required, g)))
                .cloned()
                .collect();

            return AccessDecision::Denied(DenyReason::MissingPermission {
                required: requirement.permissions.clone(),
                missing,
            });
        }
    }

    AccessDecision::Allowed
}

impl Principal {
    /// Decide whether this principal satisfies `requirement`
    pub fn decide(&self, requirement: &AccessRequirement) -> AccessDecision {
        decide(&self.roles, requirement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(slug: &str, permissions: &[&str]) -> RoleGrant {
        RoleGrant::new(slug, permissions.iter().copied())
    }

    #[test]
    fn test_empty_requirement_allows_anyone() {
        assert!(decide(&[], &AccessRequirement::none()).is_allowed());
    }

    #[test]
    fn test_no_roles_denied() {
        let decision = decide(&[], &AccessRequirement::permissions(["users.read"]));
        assert_eq!(decision, AccessDecision::Denied(DenyReason::NoRolesAssigned));

        let decision = decide(&[], &AccessRequirement::roles(["admin"]));
        assert_eq!(decision, AccessDecision::Denied(DenyReason::NoRolesAssigned));
    }

    #[test]
    fn test_roles_any_of() {
        let req = AccessRequirement::roles(["admin", "editor"]);

        assert!(decide(&[role("editor", &[])], &req).is_allowed());
        assert!(decide(&[role("admin", &[])], &req).is_allowed());

        let decision = decide(&[role("viewer", &[])], &req);
        assert_eq!(decision.reason().unwrap().dimension(), "role");
    }

    #[test]
    fn test_permissions_all_of_with_wildcards() {
        let req = AccessRequirement::permissions(["a.read", "b.read"]);

        let decision = decide(&[role("r", &["a.*"])], &req);
        assert_eq!(
            decision,
            AccessDecision::Denied(DenyReason::MissingPermission {
                required: vec!["a.read".into(), "b.read".into()],
                missing: vec!["b.read".into()],
            })
        );

        assert!(decide(&[role("r", &["a.*"]), role("s", &["b.read"])], &req).is_allowed());
        assert!(decide(&[role("r", &["*.read"])], &req).is_allowed());
        assert!(decide(&[role("r", &["*"])], &req).is_allowed());
    }

    #[test]
    fn test_roles_checked_before_permissions() {
        let req = AccessRequirement::roles(["admin"]).with_permissions(["roles.create"]);

        let decision = decide(&[role("editor", &[])], &req);
        assert_eq!(decision.reason().unwrap().dimension(), "role");

        let decision = decide(&[role("admin", &["roles.read"])], &req);
        assert_eq!(decision.reason().unwrap().dimension(), "permission");

        assert!(decide(&[role("admin", &["roles.*"])], &req).is_allowed());
    }

    #[test]
    fn test_required_wildcard_needs_matching_grant() {
        // A required slug is matched literally against the granted patterns
        let req = AccessRequirement::permissions(["users.*"]);
        assert!(decide(&[role("r", &["users.*"])], &req).is_allowed());
        assert!(decide(&[role("r", &["*"])], &req).is_allowed());
        assert!(decide(&[role("r", &["users.read"])], &req).is_denied());
    }

    #[test]
    fn test_deny_reason_display() {
        assert_eq!(DenyReason::NoRolesAssigned.to_string(), "no roles assigned");
        let reason = DenyReason::MissingPermission {
            required: vec!["a.read".into()],
            missing: vec!["a.read".into()],
        };
        assert!(reason.to_string().starts_with("missing required permission"));
    }

    #[test]
    fn test_principal_decide() {
        let principal = Principal::new("7", "bob", vec![role("editor", &["posts.*"])]);
        assert!(
            principal
                .decide(&AccessRequirement::permissions(["posts.update"]))
                .is_allowed()
        );
    }
}
