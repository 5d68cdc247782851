//! Interceptor chain composition.
//!
//! # Responsibilities
//! - Type-erased request [`Handler`] shared by every stage
//! - [`Interceptor`] capability: wrap the rest of the chain
//! - [`compose`] folds an ordered interceptor list around a dispatcher
//!
//! # Design Decisions
//! - The first interceptor in the list is the outermost one
//! - An interceptor either calls `next` once or answers on its own
//! - No interceptor spawns tasks; the chain runs inside the request's task

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tower::ServiceExt;

type HandlerFn = dyn Fn(Request<Body>) -> BoxFuture<'static, Response> + Send + Sync;

/// A cloneable, type-erased request handler.
#[derive(Clone)]
pub struct Handler {
    inner: Arc<HandlerFn>,
}

impl Handler {
    /// Wrap an async function as a handler.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |request| f(request).boxed()),
        }
    }

    /// Use an axum router as the innermost handler.
    pub fn from_router(router: Router) -> Self {
        Self::new(move |request| {
            let router = router.clone();
            async move {
                match router.oneshot(request).await {
                    Ok(response) => response,
                    Err(never) => match never {},
                }
            }
        })
    }

    /// Run the request through this handler.
    pub async fn call(&self, request: Request<Body>) -> Response {
        (self.inner)(request).await
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Handler")
    }
}

/// One stage of the request pipeline.
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    /// Short stage name used in logs.
    fn name(&self) -> &'static str;

    /// Handle `request`, delegating to `next` at most once.
    async fn intercept(&self, request: Request<Body>, next: Handler) -> Response;
}

/// Fold `interceptors` around `dispatcher`.
///
/// Wrapping starts from the end of the list so that, at request time, the
/// interceptors run in the order they were supplied.
pub fn compose(interceptors: Vec<Arc<dyn Interceptor>>, dispatcher: Handler) -> Handler {
    interceptors
        .into_iter()
        .rev()
        .fold(dispatcher, |next, interceptor| {
            Handler::new(move |request| {
                let interceptor = Arc::clone(&interceptor);
                let next = next.clone();
                async move { interceptor.intercept(request, next).await }
            })
        })
}
