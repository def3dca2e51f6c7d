use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mixbook_core::TenantId;

use crate::Role;

/// JWT claims model (transport-agnostic).
///
/// `sub` is the account id the caller authenticated as. Operator tokens may
/// carry an empty `sub`; such callers have no tenant and can only reach
/// routes that are not tenant-scoped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    #[serde(default)]
    pub sub: String,

    #[serde(default)]
    pub roles: Vec<Role>,

    /// Issued-at, seconds since the epoch.
    pub iat: i64,

    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

impl JwtClaims {
    pub fn for_account(account: &TenantId, issued_at: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self {
            sub: account.to_string(),
            roles: Vec::new(),
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        }
    }

    pub fn with_roles(mut self, roles: Vec<Role>) -> Self {
        self.roles = roles;
        self
    }

    /// The tenant this token acts for, if any.
    pub fn tenant_id(&self) -> Option<TenantId> {
        if self.sub.is_empty() {
            None
        } else {
            Some(TenantId::new(self.sub.clone()))
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Deterministically validate the claim time window.
///
/// Signature verification happens in `jwt`; this only looks at the claims.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
