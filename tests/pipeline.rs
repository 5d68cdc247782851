//! End-to-end behavior of the composed request pipeline, driven without a socket.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use serde_json::json;

use resource_nexus::http::handlers::{SystemHealth, UserView};
use resource_nexus::http::{Message, X_REQUEST_ID};
use resource_nexus::store::Store;

mod common;

use common::{basic, client_addr, request, ADMIN_PASSWORD};

#[tokio::test]
async fn wrong_password_and_unknown_user_are_indistinguishable() {
    let store = common::seeded_store().await;
    let handler = common::pipeline(&common::test_config(), store).handler();

    let health = |auth: String| {
        request(Method::GET, "/system/health", Some(&auth), None, client_addr(1))
    };
    let wrong_password = handler.call(health(basic("admin", "nope"))).await;
    let unknown_user = handler.call(health(basic("ghost", "nope"))).await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(common::body_text(wrong_password).await, common::body_text(unknown_user).await);
}

#[tokio::test]
async fn unknown_user_costs_as_much_as_wrong_password() {
    let hashing = resource_nexus::security::HashingParams {
        iterations: 1,
        memory_cost: 4096,
        parallelism: 1,
        ..Default::default()
    };
    let store = Arc::new(common::MemoryStore::new());
    let hash = resource_nexus::security::hash_password("secret", &hashing).unwrap();
    store.insert_user("carol", &hash, false).await.unwrap();

    let mut config = common::test_config();
    config.security.password_hashing = hashing;
    let handler = common::pipeline(&config, store).handler();

    let timed = |user: &'static str| {
        let handler = handler.clone();
        async move {
            let start = std::time::Instant::now();
            for _ in 0..3 {
                let auth = basic(user, "nope");
                let response = handler
                    .call(request(Method::GET, "/system/health", Some(&auth), None, client_addr(1)))
                    .await;
                assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            }
            start.elapsed()
        }
    };

    let wrong_password = timed("carol").await;
    let unknown_user = timed("ghost").await;
    assert!(
        unknown_user * 4 >= wrong_password,
        "unknown user took {unknown_user:?}, wrong password took {wrong_password:?}"
    );
}

#[tokio::test]
async fn missing_credentials_are_rejected() {
    let store = common::seeded_store().await;
    let handler = common::pipeline(&common::test_config(), store).handler();

    let response = handler
        .call(request(Method::GET, "/system/health", None, None, client_addr(1)))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Message = common::json(response).await;
    assert_eq!(body.message, "unauthorized");
}

#[tokio::test]
async fn admin_reads_health() {
    let store = common::seeded_store().await;
    let handler = common::pipeline(&common::test_config(), store).handler();

    let response = handler
        .call(request(
            Method::GET,
            "/system/health",
            Some(&basic("admin", ADMIN_PASSWORD)),
            None,
            client_addr(1),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(X_REQUEST_ID));

    let health: SystemHealth = common::json(response).await;
    assert!(health.database_connection);
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn global_limit_applies_across_clients() {
    let mut config = common::test_config();
    config.rate_limit.global_rate = 0.001;
    config.rate_limit.global_burst = 2;
    let store = common::seeded_store().await;
    let handler = common::pipeline(&config, store).handler();

    let auth = basic("admin", ADMIN_PASSWORD);
    for octet in 1..=2 {
        let response = handler
            .call(request(Method::GET, "/system/health", Some(&auth), None, client_addr(octet)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = handler
        .call(request(Method::GET, "/system/health", Some(&auth), None, client_addr(3)))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn client_limit_is_per_address() {
    let mut config = common::test_config();
    config.rate_limit.client_rate = 0.001;
    config.rate_limit.client_burst = 1;
    let store = common::seeded_store().await;
    let handler = common::pipeline(&config, store).handler();

    let auth = basic("admin", ADMIN_PASSWORD);
    let first = handler
        .call(request(Method::GET, "/system/health", Some(&auth), None, client_addr(1)))
        .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = handler
        .call(request(Method::GET, "/system/health", Some(&auth), None, client_addr(1)))
        .await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

    let other = handler
        .call(request(Method::GET, "/system/health", Some(&auth), None, client_addr(2)))
        .await;
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn rate_limit_runs_before_authentication() {
    let mut config = common::test_config();
    config.rate_limit.client_rate = 0.001;
    config.rate_limit.client_burst = 1;
    let store = common::seeded_store().await;
    let handler = common::pipeline(&config, store).handler();

    let bad = basic("ghost", "nope");
    let first = handler
        .call(request(Method::GET, "/system/health", Some(&bad), None, client_addr(9)))
        .await;
    assert_eq!(first.status(), StatusCode::UNAUTHORIZED);

    let second = handler
        .call(request(Method::GET, "/system/health", Some(&bad), None, client_addr(9)))
        .await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn permissions_flow_through_groups() {
    let store = common::seeded_store().await;
    let handler = common::pipeline(&common::test_config(), store).handler();
    let admin = basic("admin", ADMIN_PASSWORD);
    let from = client_addr(1);

    let response = handler
        .call(request(
            Method::POST,
            "/auth/user/add",
            Some(&admin),
            Some(json!({"name": "carol", "password": "carol-pw"})),
            from,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Message = common::json(response).await;
    assert_eq!(body.message, "entity created successfully");

    let carol = basic("carol", "carol-pw");
    let search = json!({"filter": {"key": "name", "operator": "=", "value": "admin"}});

    // Authenticated but without a grant.
    let denied = handler
        .call(request(Method::POST, "/auth/user/search", Some(&carol), Some(search.clone()), from))
        .await;
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    for (path, body) in [
        ("/auth/group/add", json!({"name": "readers"})),
        ("/auth/usergroup/add", json!({"username": "carol", "group_name": "readers"})),
        (
            "/auth/grouppermission/add",
            json!({"group_name": "readers", "permission": "auth:user:get"}),
        ),
    ] {
        let response = handler
            .call(request(Method::POST, path, Some(&admin), Some(body), from))
            .await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }

    let allowed = handler
        .call(request(Method::POST, "/auth/user/search", Some(&carol), Some(search), from))
        .await;
    assert_eq!(allowed.status(), StatusCode::OK);
    let users: Vec<UserView> = common::json(allowed).await;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "admin");
    assert!(users[0].is_admin);

    // Still no grant for adding users.
    let response = handler
        .call(request(
            Method::POST,
            "/auth/user/add",
            Some(&carol),
            Some(json!({"name": "dave", "password": "pw"})),
            from,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicates_and_missing_references_are_bad_requests() {
    let store = common::seeded_store().await;
    let handler = common::pipeline(&common::test_config(), store).handler();
    let admin = basic("admin", ADMIN_PASSWORD);
    let from = client_addr(1);

    let cases = [
        ("/auth/group/add", json!({"name": "ops"}), StatusCode::OK, "entity created successfully"),
        (
            "/auth/group/add",
            json!({"name": "ops"}),
            StatusCode::BAD_REQUEST,
            "entity with the same name already exists",
        ),
        (
            "/auth/user/add",
            json!({"name": "admin", "password": "x"}),
            StatusCode::BAD_REQUEST,
            "entity with the same name already exists",
        ),
        (
            "/auth/usergroup/add",
            json!({"username": "nobody", "group_name": "ops"}),
            StatusCode::BAD_REQUEST,
            "user not found",
        ),
        (
            "/auth/usergroup/add",
            json!({"username": "admin", "group_name": "missing"}),
            StatusCode::BAD_REQUEST,
            "group not found",
        ),
        (
            "/auth/usergroup/add",
            json!({"username": "admin", "group_name": "ops"}),
            StatusCode::OK,
            "user group reference added",
        ),
        (
            "/auth/usergroup/add",
            json!({"username": "admin", "group_name": "ops"}),
            StatusCode::BAD_REQUEST,
            "user already in group",
        ),
        (
            "/auth/grouppermission/add",
            json!({"group_name": "ops", "permission": "auth:cars:drive"}),
            StatusCode::BAD_REQUEST,
            "permission not found",
        ),
        (
            "/auth/grouppermission/add",
            json!({"group_name": "ops", "permission": "auth:group:add"}),
            StatusCode::OK,
            "permission group reference added",
        ),
        (
            "/auth/grouppermission/add",
            json!({"group_name": "ops", "permission": "auth:group:add"}),
            StatusCode::BAD_REQUEST,
            "permission already assigned to group",
        ),
    ];

    for (path, body, status, text) in cases {
        let response = handler
            .call(request(Method::POST, path, Some(&admin), Some(body.clone()), from))
            .await;
        assert_eq!(response.status(), status, "{path} {body}");
        let message: Message = common::json(response).await;
        assert_eq!(message.message, text, "{path} {body}");
    }
}

#[tokio::test]
async fn malformed_input_is_a_bad_request() {
    let store = common::seeded_store().await;
    let handler = common::pipeline(&common::test_config(), store).handler();
    let admin = basic("admin", ADMIN_PASSWORD);
    let from = client_addr(1);

    let malformed_permission = handler
        .call(request(
            Method::POST,
            "/auth/grouppermission/add",
            Some(&admin),
            Some(json!({"group_name": "ops", "permission": "user"})),
            from,
        ))
        .await;
    assert_eq!(malformed_permission.status(), StatusCode::BAD_REQUEST);

    let wrong_shape = handler
        .call(request(
            Method::POST,
            "/auth/group/add",
            Some(&admin),
            Some(json!({"title": 3})),
            from,
        ))
        .await;
    assert_eq!(wrong_shape.status(), StatusCode::BAD_REQUEST);
    let body: Message = common::json(wrong_shape).await;
    assert_eq!(body.message, "invalid json");

    let forbidden_field = handler
        .call(request(
            Method::POST,
            "/auth/user/search",
            Some(&admin),
            Some(json!({"filter": {"key": "password_hash", "operator": "=", "value": "x"}})),
            from,
        ))
        .await;
    assert_eq!(forbidden_field.status(), StatusCode::BAD_REQUEST);

    let injected_operator = handler
        .call(request(
            Method::POST,
            "/auth/user/search",
            Some(&admin),
            Some(json!({"filter": {"key": "name", "operator": "= 'x' OR 1=1 --", "value": "x"}})),
            from,
        ))
        .await;
    assert_eq!(injected_operator.status(), StatusCode::BAD_REQUEST);

    for filter in [
        json!({"key": "id", "operator": "=", "value": "abc"}),
        json!({"key": "is_admin", "operator": "LIKE", "value": 5}),
        json!({"key": "id", "operator": "LIKE", "value": 5}),
        json!({"key": "name", "operator": "="}),
    ] {
        let response = handler
            .call(request(
                Method::POST,
                "/auth/user/search",
                Some(&admin),
                Some(json!({ "filter": filter })),
                from,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{filter}");
    }

    let mistyped = handler
        .call(request(
            Method::POST,
            "/auth/user/search",
            Some(&admin),
            Some(json!({"filter": {"key": "id", "operator": "=", "value": "abc"}})),
            from,
        ))
        .await;
    let body: Message = common::json(mistyped).await;
    assert_eq!(body.message, "invalid filter: field 'id' expects integer values, got text");
}

#[tokio::test]
async fn search_supports_logical_filters() {
    let store = common::seeded_store().await;
    let hash = resource_nexus::security::hash_password("pw", &common::fast_hashing()).unwrap();
    store.insert_user("erin", &hash, false).await.unwrap();
    store.insert_user("frank", &hash, false).await.unwrap();
    let handler = common::pipeline(&common::test_config(), store).handler();

    let filter = json!({"filter": {"operator": "OR", "filters": [
        {"key": "name", "operator": "=", "value": "erin"},
        {"key": "name", "operator": "=", "value": "frank"}
    ]}});
    let response = handler
        .call(request(
            Method::POST,
            "/auth/user/search",
            Some(&basic("admin", ADMIN_PASSWORD)),
            Some(filter),
            client_addr(1),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut names: Vec<String> = common::json::<Vec<UserView>>(response)
        .await
        .into_iter()
        .map(|u| u.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["erin", "frank"]);
}

#[tokio::test]
async fn unknown_path_and_wrong_method() {
    let store = common::seeded_store().await;
    let handler = common::pipeline(&common::test_config(), store).handler();
    let admin = basic("admin", ADMIN_PASSWORD);

    let missing = handler
        .call(request(Method::GET, "/nowhere", Some(&admin), None, client_addr(1)))
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let wrong_method = handler
        .call(request(Method::GET, "/auth/group/add", Some(&admin), None, client_addr(1)))
        .await;
    assert_eq!(wrong_method.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn slow_store_times_out_instead_of_hanging() {
    let mut config = common::test_config();
    config.database.query_timeout_secs = 1;
    let store = Arc::new(common::MemoryStore::with_delay(Duration::from_secs(5)));
    let handler = common::pipeline(&config, store).handler();

    let started = std::time::Instant::now();
    let response = handler
        .call(request(
            Method::GET,
            "/system/health",
            Some(&basic("admin", ADMIN_PASSWORD)),
            None,
            client_addr(1),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn missing_caller_address_is_internal_error() {
    let store = common::seeded_store().await;
    let handler = common::pipeline(&common::test_config(), store).handler();

    let mut req = request(Method::GET, "/system/health", None, None, client_addr(1));
    req.extensions_mut()
        .remove::<axum::extract::ConnectInfo<std::net::SocketAddr>>();
    let response = handler.call(req).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
