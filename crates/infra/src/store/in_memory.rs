use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};

use mixbook_auth::Account;
use mixbook_core::{Entity, FormulaId, JobId, TenantId};
use mixbook_jobs::{Formula, Job};

use super::{AccountStore, FormulaStore, JobStore, StoreError, StoreResult};

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Storage("store lock poisoned".to_string())
}

/// Tenant-isolated table of entities keyed by `(tenant, entity id)`.
#[derive(Debug)]
struct TenantTable<V: Entity> {
    inner: RwLock<HashMap<(TenantId, V::Id), V>>,
}

impl<V> TenantTable<V>
where
    V: Entity + Clone,
    V::Id: Ord,
{
    fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, tenant: &TenantId, id: &V::Id) -> StoreResult<V> {
        let map = self.inner.read().map_err(poisoned)?;
        map.get(&(tenant.clone(), id.clone()))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    /// All records of one tenant, ordered by id.
    fn list(&self, tenant: &TenantId) -> StoreResult<Vec<V>> {
        let map = self.inner.read().map_err(poisoned)?;
        let mut items: Vec<V> = map
            .iter()
            .filter_map(|((t, _), v)| if t == tenant { Some(v.clone()) } else { None })
            .collect();
        items.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(items)
    }

    fn tenants(&self) -> StoreResult<Vec<TenantId>> {
        let map = self.inner.read().map_err(poisoned)?;
        let tenants: BTreeSet<TenantId> = map.keys().map(|(t, _)| t.clone()).collect();
        Ok(tenants.into_iter().collect())
    }

    fn insert_new(&self, tenant: &TenantId, value: V) -> StoreResult<()> {
        let mut map = self.inner.write().map_err(poisoned)?;
        let key = (tenant.clone(), value.id().clone());
        if map.contains_key(&key) {
            return Err(StoreError::AlreadyExists);
        }
        map.insert(key, value);
        Ok(())
    }

    fn replace(&self, tenant: &TenantId, value: V) -> StoreResult<()> {
        let mut map = self.inner.write().map_err(poisoned)?;
        match map.get_mut(&(tenant.clone(), value.id().clone())) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn upsert(&self, tenant: &TenantId, value: V) -> StoreResult<()> {
        let mut map = self.inner.write().map_err(poisoned)?;
        map.insert((tenant.clone(), value.id().clone()), value);
        Ok(())
    }

    fn remove(&self, tenant: &TenantId, id: &V::Id) -> StoreResult<()> {
        let mut map = self.inner.write().map_err(poisoned)?;
        map.remove(&(tenant.clone(), id.clone()))
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

/// In-memory store for tests/dev.
///
/// Each call takes the relevant lock once, so every single-record operation
/// is atomic; nothing spans two calls.
#[derive(Debug)]
pub struct InMemoryStore {
    accounts: RwLock<HashMap<TenantId, Account>>,
    jobs: TenantTable<Job>,
    formulas: TenantTable<Formula>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            jobs: TenantTable::new(),
            formulas: TenantTable::new(),
        }
    }

    /// Seed or overwrite a formula record. Formula authoring lives outside
    /// this service; this is how such records get here in dev/tests.
    pub fn put_formula(&self, tenant: &TenantId, formula: Formula) -> StoreResult<()> {
        self.formulas.upsert(tenant, formula)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountStore for InMemoryStore {
    fn get_account(&self, id: &TenantId) -> StoreResult<Account> {
        let map = self.accounts.read().map_err(poisoned)?;
        map.get(id).cloned().ok_or(StoreError::NotFound)
    }

    fn get_all_accounts(&self) -> StoreResult<Vec<Account>> {
        let map = self.accounts.read().map_err(poisoned)?;
        let mut accounts: Vec<Account> = map.values().cloned().collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(accounts)
    }

    fn create_account(&self, account: Account) -> StoreResult<()> {
        let mut map = self.accounts.write().map_err(poisoned)?;
        if map.contains_key(&account.id) {
            return Err(StoreError::AlreadyExists);
        }
        map.insert(account.id.clone(), account);
        Ok(())
    }

    fn update_account(&self, account: Account) -> StoreResult<()> {
        let mut map = self.accounts.write().map_err(poisoned)?;
        match map.get_mut(&account.id) {
            Some(slot) => {
                *slot = account;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn disable_account(&self, id: &TenantId, now: DateTime<Utc>) -> StoreResult<()> {
        let mut map = self.accounts.write().map_err(poisoned)?;
        let account = map.get_mut(id).ok_or(StoreError::NotFound)?;
        account.disable(now);
        Ok(())
    }
}

impl JobStore for InMemoryStore {
    fn get_job(&self, tenant: &TenantId, id: &JobId) -> StoreResult<Job> {
        self.jobs.get(tenant, id)
    }

    fn get_all_jobs(&self, tenant: &TenantId) -> StoreResult<Vec<Job>> {
        self.jobs.list(tenant)
    }

    fn tenants(&self) -> StoreResult<Vec<TenantId>> {
        self.jobs.tenants()
    }

    fn add_job(&self, tenant: &TenantId, job: Job) -> StoreResult<()> {
        self.jobs.insert_new(tenant, job)
    }

    fn update_job(&self, tenant: &TenantId, job: Job) -> StoreResult<()> {
        self.jobs.replace(tenant, job)
    }

    fn delete_job(&self, tenant: &TenantId, id: &JobId) -> StoreResult<()> {
        self.jobs.remove(tenant, id)
    }
}

impl FormulaStore for InMemoryStore {
    fn get_formula(&self, tenant: &TenantId, id: &FormulaId) -> StoreResult<Formula> {
        self.formulas.get(tenant, id)
    }

    fn update_formula(&self, tenant: &TenantId, formula: Formula) -> StoreResult<()> {
        self.formulas.replace(tenant, formula)
    }
}
