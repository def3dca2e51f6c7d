use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use mixbook_auth::JwtValidator;
use mixbook_infra::AccountDirectory;

use crate::app::{blocking, errors};
use crate::context::{PrincipalContext, TenantContext};

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub accounts: AccountDirectory,
}

/// Validate the bearer token and attach the request's identity.
///
/// The tenant context is only attached when the token's subject is a
/// registered, enabled account.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer(req.headers()) else {
        return errors::unauthenticated();
    };

    let claims = match state.jwt.validate(token, Utc::now()) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "rejected bearer token");
            return errors::unauthenticated();
        }
    };

    if let Some(subject) = claims.tenant_id() {
        let accounts = state.accounts.clone();
        match blocking::run(move || accounts.resolve_tenant(&subject)).await {
            Ok(Some(tenant_id)) => {
                req.extensions_mut().insert(TenantContext::new(tenant_id));
            }
            Ok(None) => tracing::debug!(subject = %claims.sub, "token subject has no enabled account"),
            Err(e) => return errors::service_error_to_response(e),
        }
    }
    req.extensions_mut()
        .insert(PrincipalContext::new(claims.sub, claims.roles));

    next.run(req).await
}

/// One log line per request with its status and latency.
pub async fn log_requests(req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "request served"
    );
    response
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
