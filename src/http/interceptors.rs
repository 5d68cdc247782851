//! Recovery and logging stages.

use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::Response;
use futures_util::FutureExt;
use tracing::{Instrument, Span};

use crate::http::pipeline::{Handler, Interceptor};
use crate::http::request::{RequestId, X_REQUEST_ID};
use crate::http::response::{message, INTERNAL_MESSAGE};
use crate::observability::metrics;

/// Outermost stage: turns a panic anywhere below into a 500.
pub struct Recovery {
    span: Span,
}

impl Recovery {
    pub fn new(parent: &Span) -> Self {
        Self {
            span: tracing::info_span!(parent: parent, "recovery"),
        }
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[async_trait]
impl Interceptor for Recovery {
    fn name(&self) -> &'static str {
        "recovery"
    }

    async fn intercept(&self, request: Request<Body>, next: Handler) -> Response {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        match AssertUnwindSafe(next.call(request)).catch_unwind().await {
            Ok(response) => response,
            Err(payload) => {
                tracing::error!(
                    parent: &self.span,
                    method = %method,
                    path = %path,
                    panic = panic_detail(payload.as_ref()),
                    "recovered from panic while handling request"
                );
                metrics::record_panic();
                message(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
            }
        }
    }
}

/// Logs every request and tags it with a [`RequestId`].
pub struct Logging {
    span: Span,
}

impl Logging {
    pub fn new(parent: &Span) -> Self {
        Self {
            span: parent.clone(),
        }
    }
}

#[async_trait]
impl Interceptor for Logging {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn intercept(&self, mut request: Request<Body>, next: Handler) -> Response {
        let start = Instant::now();
        let id = RequestId::new();
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let client = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_else(|| "-".to_string());
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();

        let span = tracing::info_span!(
            parent: &self.span,
            "request",
            request_id = %id,
            method = %method,
            path = %path
        );
        tracing::info!(
            parent: &span,
            client = %client,
            user_agent = %user_agent,
            "request received"
        );

        request.extensions_mut().insert(id);
        let mut response = next.call(request).instrument(span.clone()).await;

        let status = response.status();
        if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }
        metrics::record_request(method.as_str(), status.as_u16(), start);
        tracing::info!(
            parent: &span,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "request completed"
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::pipeline::compose;
    use axum::response::IntoResponse;
    use std::sync::Arc;

    fn request() -> Request<Body> {
        Request::builder().uri("/boom").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn panic_becomes_internal_error() {
        let span = Span::none();
        let dispatcher = Handler::new(|_request| async move {
            if true {
                panic!("handler exploded");
            }
            StatusCode::OK.into_response()
        });
        let stages: Vec<Arc<dyn Interceptor>> = vec![Arc::new(Recovery::new(&span))];
        let chain = compose(stages, dispatcher);

        let response = chain.call(request()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn logging_sets_request_id_header() {
        let span = Span::none();
        let dispatcher = Handler::new(|request: Request<Body>| async move {
            assert!(request.extensions().get::<RequestId>().is_some());
            StatusCode::NO_CONTENT.into_response()
        });
        let stages: Vec<Arc<dyn Interceptor>> = vec![Arc::new(Logging::new(&span))];
        let chain = compose(stages, dispatcher);

        let response = chain.call(request()).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let id = response.headers().get(X_REQUEST_ID).unwrap().to_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }

    #[test]
    fn panic_detail_reads_strings() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_detail(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_detail(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_detail(payload.as_ref()), "non-string panic payload");
    }
}
