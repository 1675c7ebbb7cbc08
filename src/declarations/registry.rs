//! Operation declaration registry
//!
//! Holds the access declarations of every protected operation in the process.

use crate::access_control::Declares;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Access declaration of one protected operation
///
/// Built in const context so the `#[protected]` macro can submit it to the
/// compile-time registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationDeclaration {
    /// Handler group, e.g. `access_control`
    pub controller: &'static str,
    /// Handler name, e.g. `create_role`
    pub method: &'static str,
    /// Required permission slugs (all-of)
    pub permissions: &'static [&'static str],
    /// Required role slugs (any-of)
    pub roles: &'static [&'static str],
}

impl OperationDeclaration {
    pub const fn new(
        controller: &'static str,
        method: &'static str,
        permissions: &'static [&'static str],
        roles: &'static [&'static str],
    ) -> Self {
        Self {
            controller,
            method,
            permissions,
            roles,
        }
    }

    pub fn location(&self) -> DeclarationLocation {
        DeclarationLocation {
            controller: self.controller.to_string(),
            method: self.method.to_string(),
        }
    }
}

impl Declares for OperationDeclaration {
    fn required_permissions(&self) -> &[&'static str] {
        self.permissions
    }

    fn required_roles(&self) -> &[&'static str] {
        self.roles
    }
}

inventory::collect!(OperationDeclaration);

/// Where a permission slug was declared
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeclarationLocation {
    pub controller: String,
    pub method: String,
}

impl DeclarationLocation {
    pub fn new(controller: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for DeclarationLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.controller, self.method)
    }
}

/// Ordered set of operation declarations
///
/// Iteration order is registration order, so repeated scans attribute each
/// slug to the same first location.
#[derive(Debug, Clone, Default)]
pub struct DeclarationRegistry {
    operations: Vec<OperationDeclaration>,
}

impl DeclarationRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every declaration submitted via `#[protected]`
    pub fn discovered() -> Self {
        let mut registry = Self::new();
        registry.register_all_auto();
        registry
    }

    /// Register an operation. A second registration of the same
    /// controller/method pair is ignored.
    pub fn register(&mut self, declaration: OperationDeclaration) {
        if self.get(declaration.controller, declaration.method).is_some() {
            debug!(
                controller = declaration.controller,
                method = declaration.method,
                "Operation already registered, ignoring duplicate"
            );
            return;
        }

        debug!(
            controller = declaration.controller,
            method = declaration.method,
            permissions = declaration.permissions.len(),
            roles = declaration.roles.len(),
            "Registered operation"
        );
        self.operations.push(declaration);
    }

    /// Register all operations discovered via the `#[protected]` macro
    ///
    /// Registered sorted by controller, then method. `inventory` link order
    /// is unspecified.
    pub fn register_all_auto(&mut self) {
        let mut discovered: Vec<OperationDeclaration> =
            inventory::iter::<OperationDeclaration>.into_iter().copied().collect();
        discovered.sort_by_key(|d| (d.controller, d.method));

        for declaration in discovered {
            self.register(declaration);
        }
    }

    /// Get an operation by controller and method
    pub fn get(&self, controller: &str, method: &str) -> Option<&OperationDeclaration> {
        self.operations
            .iter()
            .find(|d| d.controller == controller && d.method == method)
    }

    /// All operations, in registration order
    pub fn iter(&self) -> impl Iterator<Item = &OperationDeclaration> {
        self.operations.iter()
    }

    /// Get the number of registered operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl FromIterator<OperationDeclaration> for DeclarationRegistry {
    fn from_iter<I: IntoIterator<Item = OperationDeclaration>>(iter: I) -> Self {
        let mut registry = Self::new();
        for declaration in iter {
            registry.register(declaration);
        }
        registry
    }
}
