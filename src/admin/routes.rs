//! Admin API handlers
//!
//! Every handler declares its requirements with `#[protected]`. The same
//! declarations feed the permission scanner and the route guard, so a route
//! can never require a permission the sync does not know about.

use super::service::{AssignPermissions, CreatePermission, CreateRole, UpdateRole};
use crate::access_control::{Permission, Principal, Role};
use crate::error::http_mapper::ApiResult;
use crate::server::AppState;
use crate::sync::SyncReport;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use tollgate_macros::protected;
use tracing::info;

// =============================================================================
// Sync
// =============================================================================

#[protected(controller = "access_control", permission = "permissions.sync")]
pub async fn sync_permissions(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<SyncReport>> {
    info!(user = %principal.username, "Permission sync triggered");
    Ok(Json(state.sync.run().await?))
}

// =============================================================================
// Permissions
// =============================================================================

#[protected(controller = "access_control", permission = "permissions.read")]
pub async fn list_permissions(State(state): State<AppState>) -> ApiResult<Json<Vec<Permission>>> {
    Ok(Json(state.service.list_permissions().await?))
}

#[protected(controller = "access_control", permission = "permissions.read")]
pub async fn get_permission(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Permission>> {
    Ok(Json(state.service.get_permission(id).await?))
}

#[protected(
    controller = "access_control",
    role = "admin",
    permission = "permissions.create"
)]
pub async fn create_permission(
    State(state): State<AppState>,
    Json(body): Json<CreatePermission>,
) -> ApiResult<(StatusCode, Json<Permission>)> {
    let permission = state.service.create_permission(body).await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

// =============================================================================
// Roles
// =============================================================================

#[protected(controller = "access_control", role = "admin", permission = "roles.create")]
pub async fn create_role(
    State(state): State<AppState>,
    Json(body): Json<CreateRole>,
) -> ApiResult<(StatusCode, Json<Role>)> {
    let role = state.service.create_role(body).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

#[protected(controller = "access_control", permission = "roles.read")]
pub async fn list_roles(State(state): State<AppState>) -> ApiResult<Json<Vec<Role>>> {
    Ok(Json(state.service.list_roles().await?))
}

#[protected(controller = "access_control", permission = "roles.read")]
pub async fn get_role(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Role>> {
    Ok(Json(state.service.get_role(id).await?))
}

#[protected(controller = "access_control", role = "admin", permission = "roles.update")]
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateRole>,
) -> ApiResult<Json<Role>> {
    Ok(Json(state.service.update_role(id, body).await?))
}

#[protected(controller = "access_control", role = "admin", permission = "roles.delete")]
pub async fn remove_role(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.service.remove_role(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Role permissions
// =============================================================================

#[protected(controller = "access_control", role = "admin", permission = "roles.update")]
pub async fn assign_permissions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<AssignPermissions>,
) -> ApiResult<Json<Role>> {
    Ok(Json(state.service.assign_permissions(id, body).await?))
}

#[protected(controller = "access_control", role = "admin", permission = "roles.update")]
pub async fn add_permissions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<AssignPermissions>,
) -> ApiResult<Json<Role>> {
    Ok(Json(state.service.add_permissions(id, body).await?))
}

#[protected(controller = "access_control", role = "admin", permission = "roles.update")]
pub async fn remove_permissions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<AssignPermissions>,
) -> ApiResult<Json<Role>> {
    Ok(Json(state.service.remove_permissions(id, body).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_control::Declares;

    #[test]
    fn test_generated_declarations() {
        assert_eq!(CREATE_ROLE_ACCESS.controller, "access_control");
        assert_eq!(CREATE_ROLE_ACCESS.method, "create_role");
        assert_eq!(CREATE_ROLE_ACCESS.required_roles(), &["admin"]);
        assert_eq!(CREATE_ROLE_ACCESS.required_permissions(), &["roles.create"]);

        assert!(LIST_ROLES_ACCESS.required_roles().is_empty());
        assert_eq!(SYNC_PERMISSIONS_ACCESS.required_permissions(), &["permissions.sync"]);
    }
}
