//! Account directory routes (administrative).

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use mixbook_core::TenantId;

use crate::app::extract::{JsonBody, PathParam};
use crate::app::services::AppServices;
use crate::app::{blocking, dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_accounts).post(create_account))
        .route("/:id", get(get_account).put(update_account))
        .route("/:id/disable", post(disable_account))
}

pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = authz::require_account_admin(&principal) {
        return errors::authz_error_to_response(e);
    }

    match blocking::run(move || services.accounts.list()).await {
        Ok(accounts) => {
            let items = accounts.into_iter().map(dto::AccountView::from).collect();
            (StatusCode::OK, Json(dto::Items::new(items))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    PathParam(id): PathParam<String>,
) -> axum::response::Response {
    if let Err(e) = authz::require_account_admin(&principal) {
        return errors::authz_error_to_response(e);
    }

    match blocking::run(move || services.accounts.get(&TenantId::new(id))).await {
        Ok(account) => (StatusCode::OK, Json(dto::AccountView::from(account))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    JsonBody(body): JsonBody<dto::CreateAccountRequest>,
) -> axum::response::Response {
    if let Err(e) = authz::require_account_admin(&principal) {
        return errors::authz_error_to_response(e);
    }

    let result = blocking::run(move || services.accounts.create(&TenantId::new(body.id), &body.password)).await;
    match result {
        Ok(account) => (StatusCode::CREATED, Json(dto::AccountView::from(account))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    PathParam(id): PathParam<String>,
    JsonBody(body): JsonBody<dto::UpdateAccountRequest>,
) -> axum::response::Response {
    if let Err(e) = authz::require_account_admin(&principal) {
        return errors::authz_error_to_response(e);
    }

    let result = blocking::run(move || {
        services
            .accounts
            .update(&TenantId::new(id), body.hash.into_bytes(), body.state)
    })
    .await;
    match result {
        Ok(account) => (StatusCode::OK, Json(dto::AccountView::from(account))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn disable_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    PathParam(id): PathParam<String>,
) -> axum::response::Response {
    if let Err(e) = authz::require_account_admin(&principal) {
        return errors::authz_error_to_response(e);
    }

    match blocking::run(move || services.accounts.disable(&TenantId::new(id))).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
