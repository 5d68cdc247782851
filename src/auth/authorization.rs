//! Per-route permission checks.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::Span;

use crate::auth::principal::Principal;
use crate::http::response::ApiError;
use crate::observability::metrics;

/// Allow `principal` iff it is an administrator or holds `required` exactly.
pub fn authorize(principal: &Principal, required: &str) -> Result<(), ApiError> {
    if principal.authenticated && principal.has_permission(required) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// Route-layer state naming the permission a route requires.
#[derive(Debug, Clone)]
pub struct RequiredPermission {
    pub permission: &'static str,
    pub span: Span,
}

impl RequiredPermission {
    pub fn new(permission: &'static str, parent: &Span) -> Self {
        Self {
            permission,
            span: tracing::info_span!(parent: parent, "authorization", permission),
        }
    }
}

/// Middleware enforcing [`RequiredPermission`] on the matched route.
pub async fn require_permission(
    State(required): State<RequiredPermission>,
    request: Request,
    next: Next,
) -> Response {
    let Some(principal) = request.extensions().get::<Principal>() else {
        tracing::error!(parent: &required.span, "no principal attached to request");
        return ApiError::Unauthenticated.into_response();
    };

    match authorize(principal, required.permission) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::warn!(parent: &required.span, user = %principal.name, "permission denied");
            metrics::record_authorization_denied(required.permission);
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(is_admin: bool, grants: &[&str]) -> Principal {
        Principal {
            id: 7,
            name: "bob".into(),
            password_hash: String::new(),
            is_admin,
            permissions: grants.iter().map(|s| s.to_string()).collect(),
            authenticated: true,
        }
    }

    #[test]
    fn admin_passes_anything() {
        let admin = principal(true, &[]);
        assert!(authorize(&admin, "get:user").is_ok());
        assert!(authorize(&admin, "create:cars").is_ok());
    }

    #[test]
    fn non_admin_needs_exact_grant() {
        let user = principal(false, &["get:user", "create:user"]);
        assert!(authorize(&user, "get:user").is_ok());
        assert!(matches!(authorize(&user, "create:cars"), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn unauthenticated_principal_is_denied() {
        let mut admin = principal(true, &[]);
        admin.authenticated = false;
        assert!(authorize(&admin, "get:user").is_err());
    }
}
