//! Request-scoped identity placed by the auth middleware.

use axum::Extension;

use mixbook_auth::Role;
use mixbook_core::TenantId;
use mixbook_infra::ServiceError;

/// The account a request acts for.
///
/// Only present when the token's subject is a registered, enabled account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }
}

/// Principal context for a request (token subject + roles).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    subject: String,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(subject: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            subject: subject.into(),
            roles,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}

/// Resolve the tenant for a tenant-scoped route.
///
/// A request without one fails as a precondition before any service runs.
pub fn require_tenant(ctx: Option<Extension<TenantContext>>) -> Result<TenantId, ServiceError> {
    match ctx {
        Some(Extension(ctx)) if !ctx.tenant_id.is_empty() => Ok(ctx.tenant_id),
        _ => Err(ServiceError::precondition("account required")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_tenant_is_a_precondition() {
        assert!(matches!(require_tenant(None), Err(ServiceError::Precondition(_))));
        assert!(matches!(
            require_tenant(Some(Extension(TenantContext::new(TenantId::default())))),
            Err(ServiceError::Precondition(_))
        ));
        assert_eq!(
            require_tenant(Some(Extension(TenantContext::new(TenantId::new("acct1"))))),
            Ok(TenantId::new("acct1"))
        );
    }
}
