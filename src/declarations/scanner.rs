//! Declaration scanner
//!
//! Walks every registered operation and collects the permission slugs they
//! declare, remembering where each slug was first seen.

use super::registry::{DeclarationLocation, DeclarationRegistry};
use crate::access_control::{is_valid_permission_slug, normalize_permission_slug};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Discovered slug → first declaring location, in discovery order
pub type ScanResult = IndexMap<String, DeclarationLocation>;

/// Scans a [`DeclarationRegistry`] for declared permission slugs
#[derive(Debug, Clone)]
pub struct DeclarationScanner {
    registry: Arc<DeclarationRegistry>,
}

impl DeclarationScanner {
    pub fn new(registry: Arc<DeclarationRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &DeclarationRegistry {
        &self.registry
    }

    /// Collect every declared permission slug
    ///
    /// Slugs are normalized before they are recorded; anything that is still
    /// not a valid permission slug is skipped.
    pub fn scan(&self) -> ScanResult {
        let mut found = ScanResult::new();

        for operation in self.registry.iter() {
            for declared in operation.permissions {
                let slug = normalize_permission_slug(declared);
                if !is_valid_permission_slug(&slug) {
                    debug!(
                        slug = %declared,
                        controller = operation.controller,
                        method = operation.method,
                        "Skipping malformed permission declaration"
                    );
                    continue;
                }

                found.entry(slug).or_insert_with(|| operation.location());
            }
        }

        if found.is_empty() {
            warn!("No permission declarations found in registered operations");
        } else {
            info!(
                operations = self.registry.len(),
                permissions = found.len(),
                "Scanned permission declarations"
            );
        }

        found
    }
}
