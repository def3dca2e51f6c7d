use thiserror::Error;

use crate::{Permission, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Check that some role grants `required`.
///
/// - No IO
/// - No panics
/// - Pure policy check
pub fn authorize(roles: &[Role], required: &Permission) -> Result<(), AuthzError> {
    let granted = roles
        .iter()
        .flat_map(Role::permissions)
        .any(|p| p.grants(required));

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
