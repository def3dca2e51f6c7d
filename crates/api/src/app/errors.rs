use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use mixbook_auth::AuthzError;
use mixbook_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Precondition(msg) => json_error(StatusCode::BAD_REQUEST, "failed_precondition", msg),
        ServiceError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        ServiceError::AlreadyExists => json_error(StatusCode::CONFLICT, "already_exists", "already exists"),
        ServiceError::Internal => json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", "internal error"),
    }
}

pub fn authz_error_to_response(err: AuthzError) -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}

/// Malformed or mistyped request input.
pub fn bad_request(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "failed_precondition", message)
}

pub fn unauthenticated() -> axum::response::Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "missing or invalid bearer token")
}

/// Fallback for paths no route matches.
pub async fn no_route() -> axum::response::Response {
    json_error(StatusCode::NOT_FOUND, "not_found", "no such route")
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
