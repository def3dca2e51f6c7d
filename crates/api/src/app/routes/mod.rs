use axum::{Router, routing::get};

pub mod accounts;
pub mod jobs;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/accounts", accounts::router())
        .nest("/jobs", jobs::router())
}
