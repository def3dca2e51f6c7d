//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, index and service wiring plus the rebuild worker
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses
//! - `extract.rs`: extractors that reject with those error responses
//! - `blocking.rs`: offloads synchronous service calls

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod blocking;
pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>, jwt_secret: &str) -> Router {
    let jwt = Arc::new(mixbook_auth::Hs256JwtValidator::new(jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState {
        jwt,
        accounts: services.accounts.clone(),
    };

    // Protected routes: require a valid token.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .fallback(errors::no_route)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::log_requests)))
}
