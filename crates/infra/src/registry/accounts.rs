//! Account Directory: the tenant registry.

use std::sync::Arc;

use tracing::error;

use mixbook_auth::{Account, AccountState, CredentialHasher};
use mixbook_core::{Clock, TenantId};
use mixbook_observability::audit::{self, AuditAction};

use super::error::{ServiceError, ServiceResult, store_failure};
use crate::store::{AccountStore, StoreError};

fn require_id(id: &TenantId) -> ServiceResult<()> {
    if id.is_empty() {
        return Err(ServiceError::precondition("id required"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct AccountDirectory {
    store: Arc<dyn AccountStore>,
    hasher: Arc<dyn CredentialHasher>,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for AccountDirectory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccountDirectory").finish_non_exhaustive()
    }
}

impl AccountDirectory {
    pub fn new(
        store: Arc<dyn AccountStore>,
        hasher: Arc<dyn CredentialHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, hasher, clock }
    }

    pub fn get(&self, id: &TenantId) -> ServiceResult<Account> {
        require_id(id)?;
        self.store
            .get_account(id)
            .map_err(|e| store_failure("get_account", e))
    }

    pub fn list(&self) -> ServiceResult<Vec<Account>> {
        self.store
            .get_all_accounts()
            .map_err(|e| store_failure("get_all_accounts", e))
    }

    /// Register a new, enabled account.
    pub fn create(&self, id: &TenantId, password: &str) -> ServiceResult<Account> {
        require_id(id)?;
        if password.is_empty() {
            return Err(ServiceError::precondition("password required"));
        }

        let hash = self.hasher.hash(password).map_err(|err| {
            error!(account = %id, error = %err, "credential hashing failed");
            ServiceError::Internal
        })?;

        let account = Account::register(id.clone(), hash, self.clock.now());
        self.store
            .create_account(account.clone())
            .map_err(|e| store_failure("create_account", e))?;

        audit::record(AuditAction::AccountCreated, id.as_str());
        Ok(account)
    }

    /// Rewrite the credential hash and state, keeping `created`.
    pub fn update(
        &self,
        id: &TenantId,
        credential_hash: Vec<u8>,
        state: AccountState,
    ) -> ServiceResult<Account> {
        require_id(id)?;
        let current = self
            .store
            .get_account(id)
            .map_err(|e| store_failure("get_account", e))?;

        let account = Account {
            id: current.id,
            credential_hash,
            state,
            created: current.created,
            modified: self.clock.now(),
        };
        self.store
            .update_account(account.clone())
            .map_err(|e| store_failure("update_account", e))?;

        audit::record(AuditAction::AccountUpdated, id.as_str());
        Ok(account)
    }

    /// The tenant a token subject may act for.
    ///
    /// Only a registered, enabled account is a tenant. Unknown, disabled and
    /// empty subjects resolve to `None`; a storage failure is an error.
    pub fn resolve_tenant(&self, subject: &TenantId) -> ServiceResult<Option<TenantId>> {
        if subject.is_empty() {
            return Ok(None);
        }
        match self.store.get_account(subject) {
            Ok(account) if account.is_enabled() => Ok(Some(account.id)),
            Ok(_) | Err(StoreError::NotFound) => Ok(None),
            Err(err) => Err(store_failure("get_account", err)),
        }
    }

    /// Mark the account disabled. Disabling twice is not an error.
    pub fn disable(&self, id: &TenantId) -> ServiceResult<()> {
        require_id(id)?;
        self.store
            .disable_account(id, self.clock.now())
            .map_err(|e| store_failure("disable_account", e))?;

        audit::record(AuditAction::AccountDisabled, id.as_str());
        Ok(())
    }
}
