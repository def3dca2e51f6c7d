use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::context::{PrincipalContext, TenantContext};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    tenant: Option<Extension<TenantContext>>,
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "tenant_id": tenant.map(|Extension(t)| t.tenant_id().to_string()),
        "subject": principal.subject(),
        "roles": principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
    }))
}
