use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    middleware::from_fn_with_state,
    routing::{get, post},
};
use http_body_util::BodyExt;
use library_backend::{
    config::Config,
    middleware::{CorsPolicy, RateLimiter, cors, rate_limit},
};
use tower::ServiceExt;

fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/unused".into(),
        server_host: "127.0.0.1".into(),
        server_port: 0,
        ingest_api_key: None,
        rate_limit_window_secs: 60,
        rate_limit_requests: 5,
        public_origin: "https://theevolvingpm.com".into(),
        resend_api_key: None,
        email_from: "noreply@theevolvingpm.com".into(),
        max_body_bytes: 1024 * 1024,
    }
}

/// The API router with the full request gate but stub handlers, so the
/// middleware contract can be exercised without a database.
fn gated_app() -> Router {
    let config = test_config();
    let rate_limiter = Arc::new(RateLimiter::new(&config));
    let cors_policy = Arc::new(CorsPolicy::new(&config));

    let api = Router::new()
        .route("/submit", post(|| async { "ok" }))
        .route("/resources", get(|| async { "ok" }));

    Router::new()
        .nest("/api", api)
        .layer(from_fn_with_state(rate_limiter, rate_limit))
        .layer(from_fn_with_state(cors_policy, cors))
}

fn submit_request(ip: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/submit")
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

fn header<'a>(response: &'a axum::response::Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn preflight_returns_204_with_cors_headers() {
    let app = gated_app();
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/whatever")
                .header(header::ORIGIN, "https://theevolvingpm.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        header(&response, "access-control-allow-origin"),
        Some("https://theevolvingpm.com")
    );
    assert_eq!(
        header(&response, "access-control-allow-methods"),
        Some("GET, POST, OPTIONS")
    );
    assert_eq!(
        header(&response, "access-control-allow-headers"),
        Some("Content-Type, Authorization, X-API-Key")
    );
    assert_eq!(header(&response, "access-control-max-age"), Some("86400"));
}

#[tokio::test]
async fn preflight_from_unknown_origin_never_echoes_it() {
    let app = gated_app();
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/submit")
                .header(header::ORIGIN, "https://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(header(&response, "access-control-allow-origin"), None);
    assert_eq!(
        header(&response, "access-control-allow-methods"),
        Some("GET, POST, OPTIONS")
    );
}

#[tokio::test]
async fn sixth_submit_in_a_window_is_rejected() {
    let app = gated_app();

    for n in 1..=5u32 {
        let response = app.clone().oneshot(submit_request("9.9.9.9")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {}", n);
        assert_eq!(header(&response, "x-ratelimit-limit"), Some("5"));
        assert_eq!(
            header(&response, "x-ratelimit-remaining"),
            Some((5 - n).to_string().as_str())
        );
    }

    let response = app.clone().oneshot(submit_request("9.9.9.9")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header(&response, "x-ratelimit-remaining"), Some("0"));
    assert_eq!(
        header(&response, "retry-after"),
        header(&response, "x-ratelimit-reset")
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Too Many Requests");
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn quota_is_per_client_identifier() {
    let app = gated_app();

    for _ in 0..6 {
        app.clone().oneshot(submit_request("1.1.1.1")).await.unwrap();
    }
    let exhausted = app.clone().oneshot(submit_request("1.1.1.1")).await.unwrap();
    assert_eq!(exhausted.status(), StatusCode::TOO_MANY_REQUESTS);

    let other = app.clone().oneshot(submit_request("2.2.2.2")).await.unwrap();
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn other_api_routes_are_exempt_from_the_quota() {
    let app = gated_app();

    for _ in 0..20 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/api/resources")
                    .header("x-forwarded-for", "9.9.9.9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "x-ratelimit-limit"), None);
    }
}

#[tokio::test]
async fn allowed_origin_is_echoed_on_normal_responses() {
    let app = gated_app();
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/api/resources")
                .header(header::ORIGIN, "http://localhost:4005")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header(&response, "access-control-allow-origin"),
        Some("http://localhost:4005")
    );
    assert_eq!(
        header(&response, "access-control-allow-headers"),
        Some("Content-Type, Authorization, X-API-Key")
    );
}

#[tokio::test]
async fn disallowed_origin_still_reaches_the_handler_without_allow_origin() {
    let app = gated_app();
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/api/resources")
                .header(header::ORIGIN, "https://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "access-control-allow-origin"), None);
    assert_eq!(
        header(&response, "access-control-allow-methods"),
        Some("GET, POST, OPTIONS")
    );
}
