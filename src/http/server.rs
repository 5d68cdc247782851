//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Assemble the interceptor chain around the route dispatcher
//! - Bind the listener (plain or TLS) and serve until shutdown
//! - Track in-flight requests and drain them on shutdown
//! - Own the background sweeper for idle client buckets

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware;
use axum::response::Response;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tokio::task::JoinHandle;
use tower_http::timeout::TimeoutLayer;
use tracing::Span;

use crate::auth::Authenticator;
use crate::config::NexusConfig;
use crate::http::handlers::AppState;
use crate::http::interceptors::{Logging, Recovery};
use crate::http::pipeline::{compose, Handler, Interceptor};
use crate::http::response::message;
use crate::http::routes::dispatcher;
use crate::lifecycle::Shutdown;
use crate::net::RequestTracker;
use crate::security::{ClientRateLimit, ClientRateLimiter, GlobalRateLimit};
use crate::store::{BoundedStore, Store};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid bind address '{0}'")]
    InvalidAddress(String),

    #[error("pipeline already started")]
    AlreadyStarted,

    #[error("pipeline not started")]
    NotStarted,

    #[error("listener failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("serve task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{remaining} request(s) still open after shutdown deadline")]
    ShutdownTimeout { remaining: u64 },
}

/// The request pipeline and the listener serving it.
pub struct Pipeline {
    bind_address: String,
    request_timeout: Duration,
    client_idle: Duration,
    handler: Handler,
    client_limiter: Arc<ClientRateLimiter>,
    tls: Option<RustlsConfig>,
    tracker: RequestTracker,
    shutdown: Shutdown,
    handle: Handle,
    serve_task: Mutex<Option<JoinHandle<std::io::Result<()>>>>,
    span: Span,
}

impl Pipeline {
    /// Build the chain: recovery → logging → global limit → client limit →
    /// authentication → dispatcher.
    pub fn new(config: &NexusConfig, store: Arc<dyn Store>, parent: &Span) -> Self {
        let span = tracing::info_span!(parent: parent, "pipeline");

        let store: Arc<dyn Store> =
            Arc::new(BoundedStore::new(store, config.database.query_timeout()));
        let state = AppState {
            store: Arc::clone(&store),
            hashing: config.security.password_hashing.clone(),
        };
        let router = dispatcher(state, config.listener.max_body_bytes, &span);

        let limits = &config.rate_limit;
        let client_limiter =
            Arc::new(ClientRateLimiter::new(limits.client_rate, limits.client_burst));

        let stages: Vec<Arc<dyn Interceptor>> = vec![
            Arc::new(Recovery::new(&span)),
            Arc::new(Logging::new(&span)),
            Arc::new(GlobalRateLimit::new(limits.global_rate, limits.global_burst, &span)),
            Arc::new(ClientRateLimit::new(Arc::clone(&client_limiter), &span)),
            Arc::new(Authenticator::new(store, &config.security.password_hashing, &span)),
        ];
        tracing::debug!(
            parent: &span,
            stages = ?stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "interceptor chain assembled"
        );

        Self {
            bind_address: config.listener.bind_address.clone(),
            request_timeout: config.listener.request_timeout(),
            client_idle: Duration::from_secs(limits.client_idle_secs),
            handler: compose(stages, Handler::from_router(router)),
            client_limiter,
            tls: None,
            tracker: RequestTracker::new(),
            shutdown: Shutdown::new(),
            handle: Handle::new(),
            serve_task: Mutex::new(None),
            span,
        }
    }

    /// Serve over TLS with preloaded material.
    pub fn with_tls(mut self, tls: RustlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// The composed chain, for driving requests without a socket.
    pub fn handler(&self) -> Handler {
        self.handler.clone()
    }

    pub fn in_flight(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Bind and start serving in the background. Returns the bound address.
    pub async fn start(&self) -> Result<SocketAddr, PipelineError> {
        let addr: SocketAddr = self
            .bind_address
            .parse()
            .map_err(|_| PipelineError::InvalidAddress(self.bind_address.clone()))?;

        {
            let mut slot = self.serve_task.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() {
                return Err(PipelineError::AlreadyStarted);
            }

            let make_service = self.app().into_make_service_with_connect_info::<SocketAddr>();
            let handle = self.handle.clone();
            let task = match &self.tls {
                Some(tls) => tokio::spawn(
                    axum_server::bind_rustls(addr, tls.clone())
                        .handle(handle)
                        .serve(make_service),
                ),
                None => tokio::spawn(axum_server::bind(addr).handle(handle).serve(make_service)),
            };
            *slot = Some(task);
        }

        let Some(local) = self.handle.listening().await else {
            let task = self.serve_task.lock().unwrap_or_else(PoisonError::into_inner).take();
            return match task {
                Some(task) => match task.await? {
                    Err(e) => Err(e.into()),
                    Ok(()) => Err(PipelineError::NotStarted),
                },
                None => Err(PipelineError::NotStarted),
            };
        };

        if !self.client_idle.is_zero() {
            self.client_limiter
                .spawn_sweeper(self.client_idle, &self.shutdown, self.span.clone());
        }

        tracing::info!(
            parent: &self.span,
            address = %local,
            tls = self.tls.is_some(),
            "listening for requests"
        );
        Ok(local)
    }

    /// Stop accepting connections and wait up to `deadline` for in-flight requests.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), PipelineError> {
        let task = self
            .serve_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(PipelineError::NotStarted)?;

        tracing::info!(
            parent: &self.span,
            in_flight = self.in_flight(),
            deadline = ?deadline,
            "shutting down"
        );
        self.shutdown.trigger();
        self.handle.graceful_shutdown(Some(deadline));

        let remaining = self.tracker.wait_idle(deadline).await;
        if remaining > 0 {
            tracing::error!(
                parent: &self.span,
                remaining,
                "abandoning requests still open after deadline"
            );
            task.abort();
            return Err(PipelineError::ShutdownTimeout { remaining });
        }

        task.await??;
        tracing::info!(parent: &self.span, "server stopped");
        Ok(())
    }

    /// Outer router: timeout and in-flight tracking around the composed chain.
    #[allow(deprecated)]
    fn app(&self) -> Router {
        let handler = self.handler.clone();
        let tracker = self.tracker.clone();
        let service = tower::service_fn(move |request: Request<Body>| {
            let handler = handler.clone();
            let guard = tracker.track();
            async move {
                let response = handler.call(request).await;
                drop(guard);
                Ok::<_, Infallible>(response)
            }
        });

        Router::new()
            .fallback_service(service)
            .layer(TimeoutLayer::new(self.request_timeout))
            .layer(middleware::map_response(timeout_envelope))
    }
}

/// Give the bare 408 from the timeout layer the usual message body.
async fn timeout_envelope(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        return message(StatusCode::REQUEST_TIMEOUT, "request timed out");
    }
    response
}
