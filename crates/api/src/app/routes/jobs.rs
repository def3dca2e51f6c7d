//! Tenant-scoped job routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use mixbook_core::{JobId, TenantId};
use mixbook_infra::ServiceResult;
use mixbook_jobs::JobDetails;

use crate::app::extract::{JsonBody, PathParam, QueryParams};
use crate::app::services::AppServices;
use crate::app::{blocking, dto, errors};
use crate::context::{self, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_jobs).post(create_job))
        .route("/search", get(search_jobs))
        .route("/:id", get(get_job).put(update_job).delete(delete_job))
}

/// Resolve the tenant, then run `op` for it on the blocking pool.
async fn for_tenant<T, F>(tenant: Option<Extension<TenantContext>>, op: F) -> ServiceResult<T>
where
    F: FnOnce(TenantId) -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    let tenant = context::require_tenant(tenant)?;
    blocking::run(move || op(tenant)).await
}

pub async fn list_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    tenant: Option<Extension<TenantContext>>,
) -> axum::response::Response {
    match for_tenant(tenant, move |t| services.jobs.list(&t)).await {
        Ok(jobs) => (StatusCode::OK, Json(dto::Items::new(jobs))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn search_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    tenant: Option<Extension<TenantContext>>,
    QueryParams(query): QueryParams<dto::SearchQuery>,
) -> axum::response::Response {
    match for_tenant(tenant, move |t| services.jobs.search(&t, &query.term)).await {
        Ok(hits) => (StatusCode::OK, Json(dto::Items::new(hits))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    tenant: Option<Extension<TenantContext>>,
    PathParam(id): PathParam<String>,
) -> axum::response::Response {
    match for_tenant(tenant, move |t| services.jobs.get(&t, &JobId::new(id))).await {
        Ok(job) => (StatusCode::OK, Json(job)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_job(
    Extension(services): Extension<Arc<AppServices>>,
    tenant: Option<Extension<TenantContext>>,
    JsonBody(body): JsonBody<JobDetails>,
) -> axum::response::Response {
    match for_tenant(tenant, move |t| services.jobs.create(&t, body)).await {
        Ok(job) => (StatusCode::CREATED, Json(dto::CreatedJob { id: job.id })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_job(
    Extension(services): Extension<Arc<AppServices>>,
    tenant: Option<Extension<TenantContext>>,
    PathParam(id): PathParam<String>,
    JsonBody(body): JsonBody<JobDetails>,
) -> axum::response::Response {
    match for_tenant(tenant, move |t| services.jobs.update(&t, &JobId::new(id), body)).await {
        Ok(job) => (StatusCode::OK, Json(job)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_job(
    Extension(services): Extension<Arc<AppServices>>,
    tenant: Option<Extension<TenantContext>>,
    PathParam(id): PathParam<String>,
) -> axum::response::Response {
    match for_tenant(tenant, move |t| services.jobs.delete(&t, &JobId::new(id))).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
