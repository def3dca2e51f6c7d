//! Account records: the tenant registry.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mixbook_core::{DomainError, Entity, TenantId};

/// Account lifecycle state. `Disabled` is terminal in practice but can be
/// reverted by an explicit update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    #[default]
    Enabled,
    Disabled,
}

impl core::fmt::Display for AccountState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AccountState::Enabled => f.write_str("enabled"),
            AccountState::Disabled => f.write_str("disabled"),
        }
    }
}

impl FromStr for AccountState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "enabled" => Ok(AccountState::Enabled),
            "disabled" => Ok(AccountState::Disabled),
            other => Err(DomainError::validation(format!(
                "unknown account state '{other}' (expected enabled or disabled)"
            ))),
        }
    }
}

/// An account. Its id is the tenant key for all job and formula data.
///
/// # Invariants
/// - `id` is globally unique and never changes after creation.
/// - `created` is fixed at registration; every write moves `modified`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: TenantId,
    pub credential_hash: Vec<u8>,
    pub state: AccountState,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Account {
    /// A newly registered, enabled account.
    pub fn register(id: TenantId, credential_hash: Vec<u8>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            credential_hash,
            state: AccountState::Enabled,
            created: now,
            modified: now,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state == AccountState::Enabled
    }

    pub fn disable(&mut self, now: DateTime<Utc>) {
        self.state = AccountState::Disabled;
        self.modified = now;
    }
}

impl Entity for Account {
    type Id = TenantId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_accounts_start_enabled() {
        let now = Utc::now();
        let account = Account::register(TenantId::new("acct1"), b"hash".to_vec(), now);
        assert!(account.is_enabled());
        assert_eq!(account.created, account.modified);
    }

    #[test]
    fn disable_twice_converges() {
        let t0 = DateTime::<Utc>::UNIX_EPOCH;
        let mut account = Account::register(TenantId::new("acct1"), Vec::new(), t0);
        account.disable(t0 + chrono::Duration::seconds(1));
        account.disable(t0 + chrono::Duration::seconds(2));

        assert_eq!(account.state, AccountState::Disabled);
        assert_eq!(account.created, t0);
    }

    #[test]
    fn state_parses_case_insensitively() {
        assert_eq!("Disabled".parse::<AccountState>().unwrap(), AccountState::Disabled);
        assert!("archived".parse::<AccountState>().is_err());
    }
}
