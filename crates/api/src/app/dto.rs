use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mixbook_auth::{Account, AccountState};
use mixbook_core::{JobId, TenantId};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateAccountRequest {
    pub id: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateAccountRequest {
    /// Stored credential hash, as text.
    pub hash: String,
    pub state: AccountState,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub term: String,
}

// -------------------------
// Response DTOs
// -------------------------

/// Account as shown to callers; the credential hash never leaves the service.
#[derive(Debug, Serialize)]
pub struct AccountView {
    pub id: TenantId,
    pub state: AccountState,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            state: account.state,
            created: account.created,
            modified: account.modified,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedJob {
    pub id: JobId,
}

#[derive(Debug, Serialize)]
pub struct Items<T> {
    pub items: Vec<T>,
}

impl<T> Items<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }
}
