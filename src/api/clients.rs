/// Client key lookup and removal
use crate::{
    api::middleware::require_admin,
    context::AppContext,
    crypto::CLIENT_ID_PREFIX,
    error::{KeyringError, KeyringResult},
    identity::remove_client,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{delete, get},
    Router,
};
use serde::{Deserialize, Serialize};

pub fn routes(ctx: &AppContext) -> Router<AppContext> {
    Router::new()
        .route("/api/v1/clients/:client_id", delete(delete_client))
        .route_layer(middleware::from_fn_with_state(ctx.clone(), require_admin))
        .route("/api/v1/clients/:client_id/key", get(get_client_key))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClientKeyResponse {
    pub client_id: String,
    pub pem: String,
}

fn validate_client_id(client_id: &str) -> KeyringResult<()> {
    let valid = client_id.starts_with(CLIENT_ID_PREFIX)
        && client_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_');

    if !valid {
        return Err(KeyringError::Validation(format!(
            "Invalid client id: {}",
            client_id
        )));
    }
    Ok(())
}

/// Return the key a client is currently authenticated with
pub async fn get_client_key(
    State(ctx): State<AppContext>,
    Path(client_id): Path<String>,
) -> KeyringResult<Json<ClientKeyResponse>> {
    validate_client_id(&client_id)?;

    let key = ctx
        .crypto_manager
        .resolver()
        .get_public_key(&client_id)
        .await
        .ok_or_else(|| KeyringError::NotFound(format!("No key for {}", client_id)))?;

    Ok(Json(ClientKeyResponse {
        client_id,
        pem: key.to_pem(),
    }))
}

/// Remove a client's key and announce the deletion (admin only)
pub async fn delete_client(
    State(ctx): State<AppContext>,
    Path(client_id): Path<String>,
) -> KeyringResult<StatusCode> {
    validate_client_id(&client_id)?;

    remove_client(ctx.key_store.as_ref(), ctx.journal.as_ref(), &client_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
