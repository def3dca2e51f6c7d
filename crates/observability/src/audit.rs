//! Audit trail.
//!
//! Audit events go through `tracing` on the `audit` target so they can be
//! routed separately with `RUST_LOG=audit=info`.

/// A successful mutation worth recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    AccountCreated,
    AccountUpdated,
    AccountDisabled,
    JobCreated,
    JobUpdated,
    JobDeleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::AccountCreated => "account.created",
            AuditAction::AccountUpdated => "account.updated",
            AuditAction::AccountDisabled => "account.disabled",
            AuditAction::JobCreated => "job.created",
            AuditAction::JobUpdated => "job.updated",
            AuditAction::JobDeleted => "job.deleted",
        }
    }
}

impl core::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record a tenant-independent mutation (account directory).
pub fn record(action: AuditAction, subject: &str) {
    ::tracing::info!(target: "audit", action = action.as_str(), subject, "audit");
}

/// Record a mutation inside a tenant.
pub fn record_scoped(action: AuditAction, tenant: &str, subject: &str) {
    ::tracing::info!(target: "audit", action = action.as_str(), tenant, subject, "audit");
}
