//! HTTP server for the admin API
//!
//! Builds the axum router, wires each route to its guard and serves it until
//! Ctrl+C.

pub mod guard;

pub use guard::{GuardState, enforce};

use crate::admin::AccessControlService;
use crate::admin::routes::{
    self, ADD_PERMISSIONS_ACCESS, ASSIGN_PERMISSIONS_ACCESS, CREATE_PERMISSION_ACCESS,
    CREATE_ROLE_ACCESS, GET_PERMISSION_ACCESS, GET_ROLE_ACCESS, LIST_PERMISSIONS_ACCESS,
    LIST_ROLES_ACCESS, REMOVE_PERMISSIONS_ACCESS, REMOVE_ROLE_ACCESS, SYNC_PERMISSIONS_ACCESS,
    UPDATE_ROLE_ACCESS,
};
use crate::auth::{SharedPrincipalResolver, create_principal_resolver};
use crate::config::AppConfig;
use crate::declarations::{DeclarationRegistry, OperationDeclaration};
use crate::error::ConfigError;
use crate::store::AccessStore;
use crate::sync::PermissionSync;
use axum::{
    Router, middleware,
    routing::{MethodRouter, delete, get, patch, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Prefix of every admin route
pub const API_PREFIX: &str = "/access-control";

/// Shared state for admin handlers
#[derive(Clone)]
pub struct AppState {
    pub service: AccessControlService,
    pub sync: Arc<PermissionSync>,
    pub resolver: SharedPrincipalResolver,
}

impl AppState {
    /// Wire the service, sync pipeline and principal resolver over one store
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn AccessStore>,
        registry: Arc<DeclarationRegistry>,
    ) -> Result<Self, ConfigError> {
        let sync = PermissionSync::build(registry, store.clone(), &config.auto_assign)?;

        Ok(Self {
            service: AccessControlService::new(store.clone()),
            sync: Arc::new(sync),
            resolver: create_principal_resolver(&config.auth, store),
        })
    }
}

/// Listen address of the admin API
#[derive(Debug, Clone)]
pub struct ListenConfig {
    /// Address to bind the server
    pub bind: SocketAddr,
}

impl ListenConfig {
    /// Create config from host and port
    pub fn new(host: &str, port: u16) -> Result<Self, std::net::AddrParseError> {
        let bind: SocketAddr = format!("{}:{}", host, port).parse()?;
        Ok(Self { bind })
    }
}

/// Wrap `route` with the guard for `declaration`
fn guarded(
    state: &AppState,
    declaration: &'static OperationDeclaration,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(
        GuardState::new(state.resolver.clone(), declaration),
        enforce,
    ))
}

/// Build the admin API router
pub fn build_router(state: AppState) -> Router {
    let s = &state;
    let api = Router::new()
        .route(
            "/permissions/sync",
            guarded(s, &SYNC_PERMISSIONS_ACCESS, post(routes::sync_permissions)),
        )
        .route(
            "/permissions",
            guarded(s, &LIST_PERMISSIONS_ACCESS, get(routes::list_permissions)),
        )
        .route(
            "/permissions",
            guarded(s, &CREATE_PERMISSION_ACCESS, post(routes::create_permission)),
        )
        .route(
            "/permissions/{id}",
            guarded(s, &GET_PERMISSION_ACCESS, get(routes::get_permission)),
        )
        .route(
            "/roles",
            guarded(s, &CREATE_ROLE_ACCESS, post(routes::create_role)),
        )
        .route(
            "/roles",
            guarded(s, &LIST_ROLES_ACCESS, get(routes::list_roles)),
        )
        .route(
            "/roles/{id}",
            guarded(s, &GET_ROLE_ACCESS, get(routes::get_role)),
        )
        .route(
            "/roles/{id}",
            guarded(s, &UPDATE_ROLE_ACCESS, patch(routes::update_role)),
        )
        .route(
            "/roles/{id}",
            guarded(s, &REMOVE_ROLE_ACCESS, delete(routes::remove_role)),
        )
        .route(
            "/roles/{id}/permissions",
            guarded(s, &ASSIGN_PERMISSIONS_ACCESS, post(routes::assign_permissions)),
        )
        .route(
            "/roles/{id}/permissions/add",
            guarded(s, &ADD_PERMISSIONS_ACCESS, patch(routes::add_permissions)),
        )
        .route(
            "/roles/{id}/permissions/remove",
            guarded(s, &REMOVE_PERMISSIONS_ACCESS, patch(routes::remove_permissions)),
        );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest(API_PREFIX, api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Serve the admin API until Ctrl+C or `cancel` fires
pub async fn run_server(
    config: ListenConfig,
    state: AppState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = TcpListener::bind(config.bind).await?;

    info!("Admin API listening on http://{}{}", config.bind, API_PREFIX);
    info!("Press Ctrl+C to stop the server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                }
                _ = cancel.cancelled() => {
                    info!("Server cancelled");
                }
            }
        })
        .await?;

    info!("Admin API stopped");
    Ok(())
}
