//! Router-level behavior of the introspection gate.
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use introspection_gate::app::build_router;
use introspection_gate::config::Config;
use introspection_gate::response::{ResponseFormat, ResponseWriter};
use introspection_gate::services::auth::introspection::{
    IntrospectionError, IntrospectionResult, TokenIntrospector,
};
use introspection_gate::services::auth::{AuthorizationGate, BearerToken, build_gate};
use introspection_gate::services::cache::CachePolicy;
use introspection_gate::state::AppState;

/// Answers per token; counts every upstream call.
struct FakeAuthorizationServer {
    calls: AtomicUsize,
    delay: Duration,
}

impl FakeAuthorizationServer {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIntrospector for FakeAuthorizationServer {
    async fn introspect(
        &self,
        token: &BearerToken,
    ) -> Result<IntrospectionResult, IntrospectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        match token.as_str() {
            "good" => Ok(IntrospectionResult::active()
                .with_subject("user-42")
                .with_scopes(["read", "write"])),
            "down" => Err(IntrospectionError::Transport("connection refused".into())),
            "misconfigured" => Err(IntrospectionError::CredentialConfig("401".into())),
            _ => Ok(IntrospectionResult::inactive()),
        }
    }
}

fn router_with(
    upstream: Arc<FakeAuthorizationServer>,
    format: ResponseFormat,
    request_timeout: Duration,
) -> Router {
    let gate = Arc::new(AuthorizationGate::new(upstream, CachePolicy::default()));
    let state = AppState::new(gate, ResponseWriter::new(format.marshaller()));
    build_router(state, request_timeout)
}

fn router(upstream: Arc<FakeAuthorizationServer>) -> Router {
    router_with(upstream, ResponseFormat::Json, Duration::from_secs(30))
}

fn get(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let upstream = FakeAuthorizationServer::new(Duration::ZERO);
    let resp = router(upstream.clone())
        .oneshot(get("/api/v1/health", None))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn missing_header_is_401_without_upstream_call() {
    let upstream = FakeAuthorizationServer::new(Duration::ZERO);
    let resp = router(upstream.clone())
        .oneshot(get("/api/v1/me", None))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Bearer");
    let body = json_body(resp).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn non_bearer_scheme_is_401_without_upstream_call() {
    let upstream = FakeAuthorizationServer::new(Duration::ZERO);
    let resp = router(upstream.clone())
        .oneshot(get("/api/v1/me", Some("Basic abc123")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn authorized_request_reaches_handler_with_context() {
    let upstream = FakeAuthorizationServer::new(Duration::ZERO);
    let resp = router(upstream.clone())
        .oneshot(get("/api/v1/me", Some("Bearer good")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["subject"], "user-42");
    assert_eq!(body["scopes"], serde_json::json!(["read", "write"]));
}

#[tokio::test]
async fn inactive_token_is_401_and_negatively_cached() {
    let upstream = FakeAuthorizationServer::new(Duration::ZERO);
    let app = router(upstream.clone());

    for _ in 0..3 {
        let resp = app
            .clone()
            .oneshot(get("/api/v1/me", Some("Bearer revoked")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers()[header::WWW_AUTHENTICATE],
            r#"Bearer error="invalid_token""#
        );
    }
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn upstream_failure_is_503_not_401() {
    let upstream = FakeAuthorizationServer::new(Duration::ZERO);
    let app = router(upstream.clone());

    for token in ["down", "misconfigured"] {
        let resp = app
            .clone()
            .oneshot(get("/api/v1/me", Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!resp.headers().contains_key(header::WWW_AUTHENTICATE));
        let body = json_body(resp).await;
        assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
        // upstream details stay in the logs
        assert!(!body.to_string().contains("connection refused"));
    }
}

#[tokio::test]
async fn upstream_failure_is_not_cached() {
    let upstream = FakeAuthorizationServer::new(Duration::ZERO);
    let app = router(upstream.clone());

    for _ in 0..2 {
        let resp = app
            .clone()
            .oneshot(get("/api/v1/me", Some("Bearer down")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
    assert_eq!(upstream.calls(), 2);
}

#[tokio::test]
async fn concurrent_requests_share_one_introspection() {
    let upstream = FakeAuthorizationServer::new(Duration::from_millis(100));
    let app = router(upstream.clone());

    let requests = (0..20).map(|_| {
        let app = app.clone();
        tokio::spawn(async move {
            app.oneshot(get("/api/v1/me", Some("Bearer good")))
                .await
                .unwrap()
                .status()
        })
    });

    for handle in requests.collect::<Vec<_>>() {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn plain_text_format() {
    let upstream = FakeAuthorizationServer::new(Duration::ZERO);
    let resp = router_with(upstream, ResponseFormat::Text, Duration::from_secs(30))
        .oneshot(get("/api/v1/me", Some("Bearer revoked")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"UNAUTHORIZED: inactive token");
}

#[tokio::test]
async fn slow_authorization_server_is_503_not_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/introspect"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "active": true }))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let introspection_endpoint = format!("{}/introspect", server.uri());
    let config = Config::from_lookup(|key| match key {
        "INTROSPECTION_ISSUER" => Some(server.uri()),
        "INTROSPECTION_ENDPOINT" => Some(introspection_endpoint.clone()),
        "INTROSPECTION_CLIENT_ID" => Some("resource-server".to_string()),
        "INTROSPECTION_CLIENT_SECRET" => Some("s3cr3t".to_string()),
        "INTROSPECTION_TIMEOUT_MS" => Some("200".to_string()),
        "HTTP_REQUEST_TIMEOUT_SECONDS" => Some("2".to_string()),
        _ => None,
    })
    .unwrap();

    let gate = build_gate(&config).await.unwrap();
    let state = AppState::new(gate, ResponseWriter::new(config.response_format.marshaller()));
    let resp = build_router(state, config.http_request_timeout)
        .oneshot(get("/api/v1/me", Some("Bearer tok")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(resp).await;
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
    assert_eq!(body["error"]["message"], "authorization service unavailable");
}
