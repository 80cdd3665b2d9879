/// Message authentication and server identity endpoints
use crate::{
    context::AppContext,
    engine::{SignedMessage, VerifiedMessage},
    error::KeyringResult,
};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/v1/messages/verify", post(verify_message))
        .route("/api/v1/server", get(describe_server))
}

/// Verify a signed message against its sender's enrolled key
pub async fn verify_message(
    State(ctx): State<AppContext>,
    Json(message): Json<SignedMessage>,
) -> KeyringResult<Json<VerifiedMessage>> {
    let verified = ctx.crypto_manager.verify(&message).await?;
    Ok(Json(verified))
}

#[derive(Debug, Serialize)]
pub struct ServerDescription {
    pub server_name: String,
    pub certificate: String,
}

/// The frontend's own identity, for clients pinning the server
pub async fn describe_server(State(ctx): State<AppContext>) -> Json<ServerDescription> {
    Json(ServerDescription {
        server_name: ctx.crypto_manager.server_name().to_string(),
        certificate: ctx.crypto_manager.server_certificate_pem().to_string(),
    })
}
