//! In-memory ledger store
//!
//! Mirrors the PostgreSQL store closely enough to exercise the transfer engine
//! without a database:
//!
//! - every write inside a transaction is staged and only becomes visible on commit
//! - updated rows are locked (one async mutex per row) until the transaction ends
//! - `balance >= 0`, `amount > 0`, ledger foreign keys and unique keys are enforced
//! - a lock wait longer than `lock_timeout` is reported as [`StoreError::Deadlock`]
//!
//! Dropping a [`MemTx`] without committing discards its writes and releases its locks.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};

use super::error::StoreError;
use super::models::*;
use super::tx::{TxBackend, TxHandle};
use super::{LedgerTx, Store, UserTx};

/// How long a verification code stays valid.
const VERIFY_EMAIL_TTL_MINUTES: i64 = 15;

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RowKey {
    Account(i64),
    Username(String),
    Email(String),
    VerifyEmail(i64),
}

#[derive(Debug, Default, Clone)]
struct Tables {
    accounts: BTreeMap<i64, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
    users: BTreeMap<String, User>,
    verify_emails: BTreeMap<i64, VerifyEmail>,
}

impl Tables {
    fn merge(&mut self, staged: Tables) {
        self.accounts.extend(staged.accounts);
        self.entries.extend(staged.entries);
        self.transfers.extend(staged.transfers);
        self.users.extend(staged.users);
        self.verify_emails.extend(staged.verify_emails);
    }
}

struct Sequence(AtomicI64);

impl Sequence {
    fn new() -> Self {
        Self(AtomicI64::new(1))
    }

    fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

struct Inner {
    committed: Mutex<Tables>,
    row_locks: Mutex<HashMap<RowKey, Arc<RowMutex<()>>>>,
    account_seq: Sequence,
    entry_seq: Sequence,
    transfer_seq: Sequence,
    verify_email_seq: Sequence,
    lock_timeout: Duration,
}

impl Inner {
    fn committed(&self) -> MutexGuard<'_, Tables> {
        self.committed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn row_locks(&self) -> MutexGuard<'_, HashMap<RowKey, Arc<RowMutex<()>>>> {
        self.row_locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn row_lock(&self, key: &RowKey) -> Arc<RowMutex<()>> {
        self.row_locks().entry(key.clone()).or_default().clone()
    }

    /// Forget lock entries nobody holds or waits on. Holders and waiters keep
    /// an `Arc` clone, so a count of 1 means only the map refers to it.
    fn prune_row_locks<'a>(&self, keys: impl IntoIterator<Item = &'a RowKey>) {
        let mut locks = self.row_locks();
        for key in keys {
            if locks.get(key).is_some_and(|m| Arc::strong_count(m) == 1) {
                locks.remove(key);
            }
        }
    }
}

/// In-memory store with row-lock semantics
#[derive(Clone)]
pub struct MemStore {
    inner: Arc<Inner>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Lock waits longer than `lock_timeout` fail with [`StoreError::Deadlock`].
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                committed: Mutex::new(Tables::default()),
                row_locks: Mutex::new(HashMap::new()),
                account_seq: Sequence::new(),
                entry_seq: Sequence::new(),
                transfer_seq: Sequence::new(),
                verify_email_seq: Sequence::new(),
                lock_timeout,
            }),
        }
    }

    #[cfg(test)]
    fn row_lock_count(&self) -> usize {
        self.inner.row_locks().len()
    }

    /// Total number of committed transfers and entries (all accounts).
    pub fn ledger_size(&self) -> (usize, usize) {
        let tables = self.inner.committed();
        (tables.transfers.len(), tables.entries.len())
    }
}

/// Transaction on a [`MemStore`]
pub struct MemTx {
    inner: Arc<Inner>,
    locks: HashMap<RowKey, OwnedMutexGuard<()>>,
    staged: Tables,
}

impl MemTx {
    async fn lock_row(&mut self, key: RowKey) -> Result<(), StoreError> {
        if self.locks.contains_key(&key) {
            return Ok(());
        }

        let mutex = self.inner.row_lock(&key);
        match tokio::time::timeout(self.inner.lock_timeout, mutex.lock_owned()).await {
            Ok(guard) => {
                self.locks.insert(key, guard);
                Ok(())
            }
            Err(_) => {
                self.inner.prune_row_locks([&key]);
                Err(StoreError::Deadlock(format!(
                    "lock wait on {:?} exceeded {:?}",
                    key, self.inner.lock_timeout
                )))
            }
        }
    }

    fn account(&self, id: i64) -> Option<Account> {
        if let Some(account) = self.staged.accounts.get(&id) {
            return Some(account.clone());
        }
        self.inner.committed().accounts.get(&id).cloned()
    }

    fn user(&self, username: &str) -> Option<User> {
        if let Some(user) = self.staged.users.get(username) {
            return Some(user.clone());
        }
        self.inner.committed().users.get(username).cloned()
    }

    fn require_account(&self, id: i64, constraint: &str) -> Result<(), StoreError> {
        match self.account(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::ForeignKeyViolation(format!(
                "{constraint}: account {id} does not exist"
            ))),
        }
    }
}

#[async_trait]
impl TxHandle for MemTx {
    async fn commit(mut self) -> Result<(), StoreError> {
        let staged = std::mem::take(&mut self.staged);
        self.inner.committed().merge(staged);
        // Row locks are released on drop, after the writes are visible.
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}

impl Drop for MemTx {
    fn drop(&mut self) {
        let keys: Vec<RowKey> = self.locks.keys().cloned().collect();
        self.locks.clear();
        self.inner.prune_row_locks(&keys);
    }
}

#[async_trait]
impl TxBackend for MemStore {
    type Tx = MemTx;

    async fn begin(&self) -> Result<MemTx, StoreError> {
        Ok(MemTx {
            inner: self.inner.clone(),
            locks: HashMap::new(),
            staged: Tables::default(),
        })
    }
}

#[async_trait]
impl LedgerTx for MemTx {
    async fn create_transfer(&mut self, arg: CreateTransferParams) -> Result<Transfer, StoreError> {
        if arg.amount <= 0 {
            return Err(StoreError::CheckViolation(
                "transfers_amount_check: amount must be positive".to_string(),
            ));
        }
        self.require_account(arg.from_account_id, "transfers_from_account_id_fkey")?;
        self.require_account(arg.to_account_id, "transfers_to_account_id_fkey")?;

        let transfer = Transfer {
            id: self.inner.transfer_seq.next(),
            from_account_id: arg.from_account_id,
            to_account_id: arg.to_account_id,
            amount: arg.amount,
            created_at: Utc::now(),
        };
        self.staged.transfers.insert(transfer.id, transfer.clone());
        Ok(transfer)
    }

    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, StoreError> {
        self.require_account(arg.account_id, "entries_account_id_fkey")?;

        let entry = Entry {
            id: self.inner.entry_seq.next(),
            account_id: arg.account_id,
            amount: arg.amount,
            created_at: Utc::now(),
        };
        self.staged.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn add_account_balance(
        &mut self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        self.lock_row(RowKey::Account(arg.id)).await?;

        let mut account = self.account(arg.id).ok_or(StoreError::NotFound)?;
        let balance = account.balance.checked_add(arg.amount).ok_or_else(|| {
            StoreError::CheckViolation("accounts_balance_check: balance overflow".to_string())
        })?;
        if balance < 0 {
            return Err(StoreError::CheckViolation(format!(
                "accounts_balance_check: account {} balance would become {}",
                arg.id, balance
            )));
        }

        account.balance = balance;
        self.staged.accounts.insert(account.id, account.clone());
        Ok(account)
    }
}

#[async_trait]
impl UserTx for MemTx {
    async fn create_user(&mut self, arg: CreateUserParams) -> Result<User, StoreError> {
        self.lock_row(RowKey::Username(arg.username.clone())).await?;
        self.lock_row(RowKey::Email(arg.email.clone())).await?;

        if self.user(&arg.username).is_some() {
            return Err(StoreError::UniqueViolation(format!(
                "users_pkey: username {} already exists",
                arg.username
            )));
        }
        let email_taken = self.staged.users.values().any(|u| u.email == arg.email)
            || self
                .inner
                .committed()
                .users
                .values()
                .any(|u| u.email == arg.email);
        if email_taken {
            return Err(StoreError::UniqueViolation(format!(
                "users_email_key: email {} already exists",
                arg.email
            )));
        }

        let now = Utc::now();
        let user = User {
            username: arg.username,
            hashed_password: arg.hashed_password,
            full_name: arg.full_name,
            email: arg.email,
            role: arg.role,
            is_active: true,
            is_email_verified: false,
            password_changed_at: now,
            created_at: now,
        };
        self.staged.users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    async fn create_verify_email(
        &mut self,
        arg: CreateVerifyEmailParams,
    ) -> Result<VerifyEmail, StoreError> {
        if self.user(&arg.username).is_none() {
            return Err(StoreError::ForeignKeyViolation(format!(
                "verify_emails_username_fkey: user {} does not exist",
                arg.username
            )));
        }

        let now = Utc::now();
        let verify_email = VerifyEmail {
            id: self.inner.verify_email_seq.next(),
            username: arg.username,
            email: arg.email,
            secret_code: arg.secret_code,
            is_used: false,
            created_at: now,
            expired_at: now + chrono::Duration::minutes(VERIFY_EMAIL_TTL_MINUTES),
        };
        self.staged
            .verify_emails
            .insert(verify_email.id, verify_email.clone());
        Ok(verify_email)
    }

    async fn update_verify_email(
        &mut self,
        arg: UpdateVerifyEmailParams,
    ) -> Result<VerifyEmail, StoreError> {
        self.lock_row(RowKey::VerifyEmail(arg.id)).await?;

        let current = match self.staged.verify_emails.get(&arg.id) {
            Some(v) => Some(v.clone()),
            None => self.inner.committed().verify_emails.get(&arg.id).cloned(),
        };
        let mut verify_email = current
            .filter(|v| v.secret_code == arg.secret_code && !v.is_used && v.expired_at > Utc::now())
            .ok_or(StoreError::NotFound)?;

        verify_email.is_used = true;
        self.staged
            .verify_emails
            .insert(verify_email.id, verify_email.clone());
        Ok(verify_email)
    }

    async fn mark_email_verified(&mut self, username: &str) -> Result<User, StoreError> {
        self.lock_row(RowKey::Username(username.to_string())).await?;

        let mut user = self.user(username).ok_or(StoreError::NotFound)?;
        user.is_email_verified = true;
        self.staged.users.insert(user.username.clone(), user.clone());
        Ok(user)
    }
}

fn page<T: Clone>(rows: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    rows.skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl Store for MemStore {
    async fn create_account(&self, arg: CreateAccountParams) -> Result<Account, StoreError> {
        if arg.balance < 0 {
            return Err(StoreError::CheckViolation(
                "accounts_balance_check: balance must not be negative".to_string(),
            ));
        }

        // accounts.owner is not checked against users here; fixtures create
        // accounts without registering their owners.
        let mut tables = self.inner.committed();
        let duplicate = tables
            .accounts
            .values()
            .any(|a| a.owner == arg.owner && a.currency == arg.currency);
        if duplicate {
            return Err(StoreError::UniqueViolation(format!(
                "owner_currency_key: {} already has a {} account",
                arg.owner, arg.currency
            )));
        }

        let account = Account {
            id: self.inner.account_seq.next(),
            owner: arg.owner,
            balance: arg.balance,
            currency: arg.currency,
            created_at: Utc::now(),
        };
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, id: i64) -> Result<Account, StoreError> {
        self.inner
            .committed()
            .accounts
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_accounts(&self, arg: ListAccountsParams) -> Result<Vec<Account>, StoreError> {
        let tables = self.inner.committed();
        let rows = tables
            .accounts
            .values()
            .filter(|a| a.owner == arg.owner)
            .cloned();
        Ok(page(rows, arg.limit, arg.offset))
    }

    async fn get_entry(&self, id: i64) -> Result<Entry, StoreError> {
        self.inner
            .committed()
            .entries
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_entries(&self, arg: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        let tables = self.inner.committed();
        let rows = tables
            .entries
            .values()
            .filter(|e| e.account_id == arg.account_id)
            .cloned();
        Ok(page(rows, arg.limit, arg.offset))
    }

    async fn get_transfer(&self, id: i64) -> Result<Transfer, StoreError> {
        self.inner
            .committed()
            .transfers
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_transfers(&self, arg: ListTransfersParams) -> Result<Vec<Transfer>, StoreError> {
        let tables = self.inner.committed();
        let rows = tables
            .transfers
            .values()
            .filter(|t| t.from_account_id == arg.account_id || t.to_account_id == arg.account_id)
            .cloned();
        Ok(page(rows, arg.limit, arg.offset))
    }

    async fn get_user(&self, username: &str) -> Result<User, StoreError> {
        self.inner
            .committed()
            .users
            .get(username)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_verify_email(&self, username: &str) -> Result<VerifyEmail, StoreError> {
        self.inner
            .committed()
            .verify_emails
            .values()
            .rev()
            .find(|v| v.username == username)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
