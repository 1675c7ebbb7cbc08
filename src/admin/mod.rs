//! Admin API
//!
//! Role and permission management plus the permission sync trigger, served
//! under `/access-control`.

pub mod routes;
pub mod service;

pub use service::{
    AccessControlService, AssignPermissions, CreatePermission, CreateRole, DESCRIPTION_MAX_LEN,
    UpdateRole,
};
