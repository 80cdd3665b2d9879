/// API routes and handlers
pub mod clients;
pub mod enroll;
pub mod health;
pub mod messages;
pub mod middleware;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes(ctx: &AppContext) -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(enroll::routes(ctx))
        .merge(clients::routes(ctx))
        .merge(messages::routes())
}
