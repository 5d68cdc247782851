//! Basic-auth authentication stage.
//!
//! # Responsibilities
//! - Parse `Authorization: Basic ...`
//! - Resolve the named principal and verify the password against its stored hash
//! - Attach the authenticated [`Principal`] to the request
//!
//! # Design Decisions
//! - A missing header is rejected before the store is touched
//! - Unknown user, wrong password and undecodable hash all produce the same 401
//! - A failed lookup still pays for one key derivation against a decoy hash,
//!   so response time does not reveal whether the user exists

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::Span;

use crate::auth::principal::resolve_principal;
use crate::http::pipeline::{Handler, Interceptor};
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::security::{hash_password, verify_password, HashingParams};
use crate::store::Store;

/// Username and password taken from a request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// Extract Basic credentials. Anything malformed counts as absent.
pub fn parse_basic_auth(headers: &HeaderMap) -> Option<Credentials> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    if username.is_empty() || password.is_empty() {
        return None;
    }

    Some(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Pipeline stage verifying Basic credentials against the store.
pub struct Authenticator {
    store: Arc<dyn Store>,
    decoy: Option<String>,
    span: Span,
}

impl Authenticator {
    /// `hashing` sets the cost of the decoy hash checked for unknown users.
    pub fn new(store: Arc<dyn Store>, hashing: &HashingParams, parent: &Span) -> Self {
        let span = tracing::info_span!(parent: parent, "authentication");
        let decoy = match hash_password("resource-nexus decoy credential", hashing) {
            Ok(hash) => Some(hash),
            Err(e) => {
                tracing::warn!(
                    parent: &span,
                    error = %e,
                    "decoy hash unavailable, unknown users answer faster"
                );
                None
            }
        };
        Self { store, decoy, span }
    }

    fn verify_decoy(&self, password: &str) {
        if let Some(decoy) = &self.decoy {
            let _ = verify_password(password, decoy);
        }
    }

    fn reject(&self, reason: &'static str, username: Option<&str>) -> Response {
        tracing::warn!(
            parent: &self.span,
            user = username.unwrap_or("-"),
            reason,
            "authentication failed"
        );
        metrics::record_auth_failure(reason);
        ApiError::Unauthenticated.into_response()
    }
}

#[async_trait]
impl Interceptor for Authenticator {
    fn name(&self) -> &'static str {
        "authentication"
    }

    async fn intercept(&self, mut request: Request<Body>, next: Handler) -> Response {
        let Some(credentials) = parse_basic_auth(request.headers()) else {
            return self.reject("missing credentials", None);
        };

        let lookup = resolve_principal(self.store.as_ref(), &credentials.username).await;
        let mut principal = match lookup {
            Ok(principal) => principal,
            Err(e) => {
                tracing::debug!(parent: &self.span, error = %e, "principal lookup failed");
                self.verify_decoy(&credentials.password);
                return self.reject("unknown user", Some(&credentials.username));
            }
        };

        match verify_password(&credentials.password, &principal.password_hash) {
            Ok(true) => {}
            Ok(false) => return self.reject("wrong password", Some(&credentials.username)),
            Err(e) => {
                tracing::error!(
                    parent: &self.span,
                    user = %credentials.username,
                    error = %e,
                    "stored hash is unusable"
                );
                return self.reject("invalid stored hash", Some(&credentials.username));
            }
        }

        principal.authenticated = true;
        tracing::debug!(
            parent: &self.span,
            user = %principal.name,
            admin = principal.is_admin,
            "authenticated"
        );
        request.extensions_mut().insert(principal);
        next.call(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn basic(raw: &str) -> HeaderMap {
        headers(&format!("Basic {}", STANDARD.encode(raw)))
    }

    #[test]
    fn parses_user_and_password() {
        let credentials = parse_basic_auth(&basic("alice:pa:ss")).unwrap();
        assert_eq!(credentials.username, "alice");
        assert_eq!(credentials.password, "pa:ss");
    }

    #[test]
    fn malformed_headers_are_absent() {
        assert_eq!(parse_basic_auth(&HeaderMap::new()), None);
        assert_eq!(parse_basic_auth(&headers("Bearer abc")), None);
        assert_eq!(parse_basic_auth(&headers("Basic !!!")), None);
        assert_eq!(parse_basic_auth(&basic("no-colon")), None);
        assert_eq!(parse_basic_auth(&basic(":password")), None);
        assert_eq!(parse_basic_auth(&basic("alice:")), None);
    }

    #[test]
    fn debug_hides_password() {
        let credentials = parse_basic_auth(&basic("alice:hunter2")).unwrap();
        assert!(!format!("{:?}", credentials).contains("hunter2"));
    }
}
