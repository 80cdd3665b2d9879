/// Enrollment endpoint
///
/// Clients post their CSR as PEM text and get back the id they are now
/// known by. No authentication: the CSR proves nothing beyond "this key
/// hashes to this id", which is all enrollment needs.
use crate::{context::AppContext, error::KeyringResult, rate_limit::enroll_rate_limit};
use axum::{
    body::Bytes, extract::State, middleware, response::Json, routing::post, Router,
};
use serde::{Deserialize, Serialize};

pub fn routes(ctx: &AppContext) -> Router<AppContext> {
    Router::new()
        .route("/api/v1/enroll", post(enroll))
        .route_layer(middleware::from_fn_with_state(ctx.clone(), enroll_rate_limit))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnrollResponse {
    pub client_id: String,
}

pub async fn enroll(
    State(ctx): State<AppContext>,
    body: Bytes,
) -> KeyringResult<Json<EnrollResponse>> {
    let client_id = ctx.crypto_manager.add_certificate_request(&body).await?;
    Ok(Json(EnrollResponse { client_id }))
}
