//! Management API exercised in-process.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tower::ServiceExt;
use url::form_urlencoded;

use dynamic_proxy::admin::{auth::Credentials, setup_admin_router, AdminState};
use dynamic_proxy::config::AdminConfig;
use dynamic_proxy::routing::RoutingKey;
use dynamic_proxy::storage::{MemoryStore, SharedStorage, SqliteStore, Storage};

const FORM: &str = "application/x-www-form-urlencoded";

fn admin(storage: SharedStorage) -> Router {
    setup_admin_router(AdminState::new(storage, None))
}

fn form_request(method: Method, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri("/")
        .header(header::CONTENT_TYPE, FORM)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn routes_of(response: Response) -> BTreeMap<String, String> {
    form_urlencoded::parse(body_text(response).await.as_bytes())
        .into_owned()
        .collect()
}

fn loaded(storage: &SharedStorage, key: &str) -> Option<String> {
    storage.load(&RoutingKey::new(key)).map(|e| e.to_string())
}

#[tokio::test]
async fn test_put_then_get_all() {
    let storage: SharedStorage = Arc::new(MemoryStore::new());
    let app = admin(storage.clone());

    let res = app
        .clone()
        .oneshot(form_request(
            Method::PUT,
            "a=http%3A%2F%2Fa.internal&b=https%3A%2F%2Fb.internal%2Fv1%3Fk%3D1",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.oneshot(get("/")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], FORM);

    let routes = routes_of(res).await;
    assert_eq!(routes.len(), 2);
    assert_eq!(routes["a"], "http://a.internal");
    assert_eq!(routes["b"], "https://b.internal/v1?k=1");
}

#[tokio::test]
async fn test_get_requested_keys() {
    let storage: SharedStorage = Arc::new(MemoryStore::new());
    let app = admin(storage.clone());
    app.clone()
        .oneshot(form_request(Method::PUT, "a=http%3A%2F%2Fa.internal&c=http%3A%2F%2Fc.internal"))
        .await
        .unwrap();

    let res = app.clone().oneshot(get("/?a&missing")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let routes = routes_of(res).await;
    assert_eq!(routes.keys().collect::<Vec<_>>(), vec!["a"]);

    let res = app.oneshot(get("/?missing")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_on_empty_storage_is_ok() {
    let res = admin(Arc::new(MemoryStore::new())).oneshot(get("/")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.is_empty());
}

#[tokio::test]
async fn test_put_rejects_bad_scheme() {
    let storage: SharedStorage = Arc::new(MemoryStore::new());
    let res = admin(storage.clone())
        .oneshot(form_request(Method::PUT, "x=ftp%3A%2F%2Fbad"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(res).await.contains("x"));
    assert_eq!(loaded(&storage, "x"), None);
}

#[tokio::test]
async fn test_put_is_applied_in_order_until_first_invalid() {
    let storage: SharedStorage = Arc::new(MemoryStore::new());
    let res = admin(storage.clone())
        .oneshot(form_request(
            Method::PUT,
            "a=http%3A%2F%2Fa.internal&x=not-a-url&c=http%3A%2F%2Fc.internal",
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(res).await, "invalid or missing scheme for: x");
    assert_eq!(loaded(&storage, "a").as_deref(), Some("http://a.internal"));
    assert_eq!(loaded(&storage, "c"), None);
}

#[tokio::test]
async fn test_put_rejects_malformed_url() {
    for body in ["x=http%3A%2F%2F%5Bbad", "x=http%3A%2F%2F"] {
        let storage: SharedStorage = Arc::new(MemoryStore::new());
        let res = admin(storage.clone())
            .oneshot(form_request(Method::PUT, body))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(body_text(res).await, "invalid url for: x");
        assert_eq!(loaded(&storage, "x"), None);
    }
}

#[tokio::test]
async fn test_put_from_query_string() {
    let storage: SharedStorage = Arc::new(MemoryStore::new());
    let res = admin(storage.clone())
        .oneshot(
            Request::builder()
                .method(Method::PUT)
                .uri("/?q=http%3A%2F%2Fq.internal%2Fbase")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(loaded(&storage, "q").as_deref(), Some("http://q.internal/base"));
}

#[tokio::test]
async fn test_delete_removes_keys() {
    let storage: SharedStorage = Arc::new(MemoryStore::new());
    let app = admin(storage.clone());
    app.clone()
        .oneshot(form_request(Method::PUT, "a=http%3A%2F%2Fa&b=http%3A%2F%2Fb"))
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(form_request(Method::DELETE, "a&never-stored"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(loaded(&storage, "a"), None);
    assert!(loaded(&storage, "b").is_some());
}

#[tokio::test]
async fn test_unsupported_method() {
    let res = admin(Arc::new(MemoryStore::new()))
        .oneshot(form_request(Method::POST, "a=http%3A%2F%2Fa"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.headers()[header::ALLOW], "GET, PUT, DELETE");
}

#[tokio::test]
async fn test_basic_auth_enforced() {
    let state = AdminState::new(
        Arc::new(MemoryStore::new()),
        Credentials::new("ops", "s3cret"),
    );
    let app = setup_admin_router(state);

    let res = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.headers()[header::WWW_AUTHENTICATE],
        "Basic realm=\"dynamic-proxy\""
    );

    let with_auth = |user_pass: &str| {
        Request::builder()
            .uri("/")
            .header(
                header::AUTHORIZATION,
                format!("Basic {}", STANDARD.encode(user_pass)),
            )
            .body(Body::empty())
            .unwrap()
    };

    let res = app.clone().oneshot(with_auth("ops:wrong")).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app.oneshot(with_auth("ops:s3cret")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_half_configured_credentials_disable_auth() {
    let config = AdminConfig {
        username: "ops".to_string(),
        ..AdminConfig::default()
    };
    let app = setup_admin_router(AdminState::from_config(Arc::new(MemoryStore::new()), &config));

    let res = app.oneshot(get("/")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_delete_disallowed_keeps_routes() {
    let storage: SharedStorage = Arc::new(MemoryStore::new());
    let config = AdminConfig {
        allow_delete: false,
        ..AdminConfig::default()
    };
    let app = setup_admin_router(AdminState::from_config(storage.clone(), &config));

    app.clone()
        .oneshot(form_request(Method::PUT, "a=http%3A%2F%2Fa.internal"))
        .await
        .unwrap();
    let res = app.oneshot(form_request(Method::DELETE, "a")).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(loaded(&storage, "a").as_deref(), Some("http://a.internal"));
}

#[tokio::test]
async fn test_sqlite_backed_routes_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.db");

    {
        let storage: SharedStorage = Arc::new(SqliteStore::open(&path).unwrap());
        let res = admin(storage)
            .oneshot(form_request(Method::PUT, "k=http%3A%2F%2Fk.internal%2Fp"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let storage: SharedStorage = Arc::new(SqliteStore::open(&path).unwrap());
    let routes = routes_of(admin(storage).oneshot(get("/")).await.unwrap()).await;
    assert_eq!(routes["k"], "http://k.internal/p");
}
