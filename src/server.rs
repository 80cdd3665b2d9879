/// HTTP server setup and routing
use crate::{
    context::AppContext,
    error::{KeyringError, KeyringResult},
    metrics,
};
use axum::{
    extract::{MatchedPath, Request},
    http::{header, Method, StatusCode},
    middleware::{self, Next},
    response::{Json, Response},
    Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
/// Returns Router<()> because state is already provided
pub fn build_router(ctx: AppContext) -> Router {
    // Create CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .merge(crate::api::routes(&ctx))
        // Provide state - converts Router<AppContext> to Router<()>
        .with_state(ctx)
        .fallback(not_found)
        .layer(middleware::from_fn(track_requests))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Count requests per matched route and status
async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    metrics::record_http_request(&route, response.status().as_u16());
    response
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server. Returns once the context's shutdown token fires
/// and in-flight requests have drained.
pub async fn serve(ctx: AppContext) -> KeyringResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("Endpoint keyring listening on {}", addr);
    info!("   Server name: {}", ctx.crypto_manager.server_name());

    let shutdown = ctx.shutdown.clone();
    let app = build_router(ctx);

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| KeyringError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| KeyringError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FrontendConfig, ServerConfig, StoreBackend};
    use crate::engine::CryptoEngine;
    use crate::testutil::*;
    use axum::body::{to_bytes, Body};
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn context() -> AppContext {
        let mut config = ServerConfig {
            frontend: Some(FrontendConfig {
                certificate: SERVER_CERTIFICATE.to_string(),
                private_key: SERVER_PRIVATE_KEY.to_string(),
            }),
            ..ServerConfig::default()
        };
        config.storage.backend = StoreBackend::Memory;
        config.admin.token = Some(ADMIN_TOKEN.to_string());
        AppContext::new(config).await.unwrap()
    }

    const ADMIN_TOKEN: &str = "operator-token";

    fn delete_client(client_id: &str, token: Option<&str>) -> axum::http::Request<Body> {
        let mut request = axum::http::Request::delete(format!("/api/v1/clients/{}", client_id));
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        request.body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: axum::http::Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    fn enroll_request(csr: &str) -> axum::http::Request<Body> {
        axum::http::Request::post("/api/v1/enroll")
            .header(header::CONTENT_TYPE, "application/x-pem-file")
            .body(Body::from(csr.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let ctx = context().await;
        let app = build_router(ctx.clone());

        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, _) = send(&app, get("/health/ready")).await;
        assert_eq!(status, StatusCode::OK);

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_enroll_and_fetch_key() {
        let ctx = context().await;
        let app = build_router(ctx.clone());

        let (status, body) = send(&app, enroll_request(CLIENT_A_CSR)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["client_id"], CLIENT_A_ID);

        let (status, body) = send(&app, get(&format!("/api/v1/clients/{}/key", CLIENT_A_ID))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["pem"]
            .as_str()
            .unwrap()
            .starts_with("-----BEGIN PUBLIC KEY-----"));

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_enroll_rejections_map_to_bad_request() {
        let ctx = context().await;
        let app = build_router(ctx.clone());

        let (status, body) = send(&app, enroll_request(CLIENT_A_MISMATCH_CSR)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "IdentityMismatch");

        let (status, body) = send(&app, enroll_request(CLIENT_EC_CSR)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "UnsupportedAlgorithm");

        let (status, body) = send(&app, enroll_request("garbage")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "MalformedRequest");

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_client_key_is_not_found() {
        let ctx = context().await;
        let app = build_router(ctx.clone());

        let (status, _) = send(&app, get(&format!("/api/v1/clients/{}/key", CLIENT_B_ID))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, get("/api/v1/clients/not-a-client/key")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_client_removes_key() {
        let ctx = context().await;
        let app = build_router(ctx.clone());

        send(&app, enroll_request(CLIENT_A_CSR)).await;

        let (status, _) = send(&app, delete_client(CLIENT_A_ID, Some(ADMIN_TOKEN))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let uri = format!("/api/v1/clients/{}/key", CLIENT_A_ID);
        let (status, _) = send(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_client_requires_admin_token() {
        let ctx = context().await;
        let app = build_router(ctx.clone());
        let key_uri = format!("/api/v1/clients/{}/key", CLIENT_A_ID);

        send(&app, enroll_request(CLIENT_A_CSR)).await;

        let (status, body) = send(&app, delete_client(CLIENT_A_ID, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "AuthenticationRequired");

        let (status, _) = send(&app, delete_client(CLIENT_A_ID, Some("guess"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // The key survives rejected removals
        let (status, _) = send(&app, get(&key_uri)).await;
        assert_eq!(status, StatusCode::OK);

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_client_disabled_without_admin_token() {
        let base = context().await;
        let mut config = (*base.config).clone();
        base.shutdown().await;
        config.admin.token = None;
        let ctx = AppContext::new(config).await.unwrap();
        let app = build_router(ctx.clone());

        let (status, _) = send(&app, delete_client(CLIENT_A_ID, Some(ADMIN_TOKEN))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_verify_message() {
        let ctx = context().await;
        let app = build_router(ctx.clone());

        let client =
            CryptoEngine::new(CLIENT_A_ID, CLIENT_A_KEY, ctx.crypto_manager.resolver().clone())
                .unwrap();
        let message = client.sign(SERVER_NAME, b"hello").unwrap();
        let verify = || {
            axum::http::Request::post("/api/v1/messages/verify")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&message).unwrap()))
                .unwrap()
        };

        let (status, body) = send(&app, verify()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "AuthenticationRequired");

        send(&app, enroll_request(CLIENT_A_CSR)).await;

        let (status, body) = send(&app, verify()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], CLIENT_A_ID);

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_describe_server() {
        let ctx = context().await;
        let app = build_router(ctx.clone());

        let (status, body) = send(&app, get("/api/v1/server")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["server_name"], SERVER_NAME);

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_enroll_is_rate_limited() {
        let mut config = ServerConfig {
            frontend: Some(FrontendConfig {
                certificate: SERVER_CERTIFICATE.to_string(),
                private_key: SERVER_PRIVATE_KEY.to_string(),
            }),
            ..ServerConfig::default()
        };
        config.storage.backend = StoreBackend::Memory;
        config.rate_limit.enroll_requests_per_second = 1;
        config.rate_limit.enroll_burst = 1;
        let ctx = AppContext::new(config).await.unwrap();
        let app = build_router(ctx.clone());

        let (status, _) = send(&app, enroll_request(CLIENT_A_CSR)).await;
        assert_eq!(status, StatusCode::OK);

        let response = app.clone().oneshot(enroll_request(CLIENT_A_CSR)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let ctx = context().await;
        let app = build_router(ctx.clone());

        let (status, body) = send(&app, get("/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NotFound");

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let mut ctx = context().await;
        let mut config = (*ctx.config).clone();
        config.service.port = 0;
        ctx.config = std::sync::Arc::new(config);

        let server = tokio::spawn(serve(ctx.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;

        ctx.shutdown().await;
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}
