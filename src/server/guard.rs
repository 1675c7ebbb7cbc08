//! Route guard
//!
//! Middleware that authenticates the caller and evaluates the route's
//! [`OperationDeclaration`] before the handler runs. The resolved
//! [`Principal`](crate::access_control::Principal) is stored in the request
//! extensions for the handler.

use crate::access_control::Declares;
use crate::auth::{SharedPrincipalResolver, bearer_token};
use crate::declarations::OperationDeclaration;
use crate::error::AuthError;
use crate::error::http_mapper::{ApiError, forbidden};
use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

/// Per-route guard state: who resolves callers, and what the route requires
#[derive(Clone)]
pub struct GuardState {
    resolver: SharedPrincipalResolver,
    declaration: &'static OperationDeclaration,
}

impl GuardState {
    pub fn new(resolver: SharedPrincipalResolver, declaration: &'static OperationDeclaration) -> Self {
        Self {
            resolver,
            declaration,
        }
    }
}

/// Reject the request unless the caller satisfies the route's declaration
///
/// - no or malformed `Authorization` header → 401
/// - unknown token → 401
/// - requirement not met → 403
pub async fn enforce(
    State(guard): State<GuardState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::MissingToken)?;
    let token = bearer_token(header_value)?;

    let principal = guard.resolver.resolve(token).await.inspect_err(|e| {
        debug!(error = %e, "Principal resolution failed");
    })?;

    let declaration = guard.declaration;
    let decision = principal.decide(&declaration.requirement());

    if let Some(reason) = decision.reason() {
        warn!(
            user = %principal.username,
            controller = declaration.controller,
            method = declaration.method,
            reason = %reason,
            "Access denied"
        );
        return Err(forbidden(reason));
    }

    debug!(
        user = %principal.username,
        controller = declaration.controller,
        method = declaration.method,
        "Access granted"
    );
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
