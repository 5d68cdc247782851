//! Route table and the dispatcher built from it.

use axum::extract::DefaultBodyLimit;
use axum::handler::Handler as AxumHandler;
use axum::http::Method;
use axum::middleware;
use axum::routing::{on, MethodFilter, MethodRouter};
use axum::Router;
use tracing::Span;

use crate::auth::permissions::{GROUPPERMISSION_ADD, GROUP_ADD, USERGROUP_ADD, USER_ADD, USER_GET};
use crate::auth::{require_permission, RequiredPermission};
use crate::http::handlers::{self, AppState};

/// One routable operation.
pub struct Route {
    pub method: Method,
    pub path: &'static str,
    /// Permission the caller must hold. `None` still requires authentication.
    pub permission: Option<&'static str>,
    handler: MethodRouter<AppState>,
}

impl Route {
    fn new<H, T>(
        method: Method,
        filter: MethodFilter,
        path: &'static str,
        permission: Option<&'static str>,
        handler: H,
    ) -> Self
    where
        H: AxumHandler<T, AppState>,
        T: 'static,
    {
        Self {
            method,
            path,
            permission,
            handler: on(filter, handler),
        }
    }

    pub fn get<H, T>(path: &'static str, permission: Option<&'static str>, handler: H) -> Self
    where
        H: AxumHandler<T, AppState>,
        T: 'static,
    {
        Self::new(Method::GET, MethodFilter::GET, path, permission, handler)
    }

    pub fn post<H, T>(path: &'static str, permission: Option<&'static str>, handler: H) -> Self
    where
        H: AxumHandler<T, AppState>,
        T: 'static,
    {
        Self::new(Method::POST, MethodFilter::POST, path, permission, handler)
    }
}

/// Every operation the API serves.
pub fn routes() -> Vec<Route> {
    vec![
        Route::get("/system/health", None, handlers::health),
        Route::post("/auth/user/add", Some(USER_ADD), handlers::user_add),
        Route::post("/auth/user/search", Some(USER_GET), handlers::user_search),
        Route::post("/auth/group/add", Some(GROUP_ADD), handlers::group_add),
        Route::post("/auth/usergroup/add", Some(USERGROUP_ADD), handlers::usergroup_add),
        Route::post(
            "/auth/grouppermission/add",
            Some(GROUPPERMISSION_ADD),
            handlers::grouppermission_add,
        ),
    ]
}

/// Build the innermost handler: route matching, per-route authorization, body limit.
pub fn dispatcher(state: AppState, max_body_bytes: usize, parent: &Span) -> Router {
    let mut router = Router::new();
    for route in routes() {
        tracing::debug!(
            parent: parent,
            method = %route.method,
            path = route.path,
            permission = ?route.permission,
            "registering route"
        );
        let handler = match route.permission {
            Some(permission) => route.handler.route_layer(middleware::from_fn_with_state(
                RequiredPermission::new(permission, parent),
                require_permission,
            )),
            None => route.handler,
        };
        router = router.route(route.path, handler);
    }

    router
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}
