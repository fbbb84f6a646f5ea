/// API routes and handlers
pub mod accounts;
pub mod configurations;
pub mod features;
pub mod feedback;
pub mod middleware;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(accounts::routes())
        .merge(features::routes())
        .merge(feedback::routes())
        .merge(configurations::routes())
}
