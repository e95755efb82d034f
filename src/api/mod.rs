/// HTTP API surface
pub mod auth;
pub mod middleware;

use crate::context::AppContext;
use axum::Router;

/// All versioned API routes
pub fn routes() -> Router<AppContext> {
    Router::new().merge(auth::routes())
}
