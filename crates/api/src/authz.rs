//! API-side authorization guard for administrative routes.

use mixbook_auth::{AuthzError, Permission, authorize};

use crate::context::PrincipalContext;

/// Check that the caller may manage the account directory.
pub fn require_account_admin(principal: &PrincipalContext) -> Result<(), AuthzError> {
    authorize(principal.roles(), &Permission::ACCOUNTS_MANAGE)
}
