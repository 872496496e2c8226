//! PostgreSQL ledger store
//!
//! Balance updates are single `UPDATE ... SET balance = balance + $1 RETURNING`
//! statements: the row lock is taken by the update itself and held until the
//! transaction ends.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::error::StoreError;
use super::models::*;
use super::tx::{TxBackend, TxHandle};
use super::{LedgerTx, Store, UserTx};

const ACCOUNT_COLUMNS: &str = "id, owner, balance, currency, created_at";
const ENTRY_COLUMNS: &str = "id, account_id, amount, created_at";
const TRANSFER_COLUMNS: &str = "id, from_account_id, to_account_id, amount, created_at";
const USER_COLUMNS: &str = "username, hashed_password, full_name, email, role, is_active, \
                            is_email_verified, password_changed_at, created_at";
const VERIFY_EMAIL_COLUMNS: &str =
    "id, username, email, secret_code, is_used, created_at, expired_at";

/// Store backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Query handle bound to one open PostgreSQL transaction
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TxHandle for PgTx {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl TxBackend for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgTx { tx })
    }
}

#[async_trait]
impl LedgerTx for PgTx {
    async fn create_transfer(&mut self, arg: CreateTransferParams) -> Result<Transfer, StoreError> {
        let transfer = sqlx::query_as::<_, Transfer>(&format!(
            "INSERT INTO transfers (from_account_id, to_account_id, amount) \
             VALUES ($1, $2, $3) RETURNING {TRANSFER_COLUMNS}"
        ))
        .bind(arg.from_account_id)
        .bind(arg.to_account_id)
        .bind(arg.amount)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(transfer)
    }

    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, StoreError> {
        let entry = sqlx::query_as::<_, Entry>(&format!(
            "INSERT INTO entries (account_id, amount) VALUES ($1, $2) RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(arg.account_id)
        .bind(arg.amount)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(entry)
    }

    async fn add_account_balance(
        &mut self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "UPDATE accounts SET balance = balance + $1 WHERE id = $2 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(arg.amount)
        .bind(arg.id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(account)
    }
}

#[async_trait]
impl UserTx for PgTx {
    async fn create_user(&mut self, arg: CreateUserParams) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, hashed_password, full_name, email, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(&arg.username)
        .bind(&arg.hashed_password)
        .bind(&arg.full_name)
        .bind(&arg.email)
        .bind(&arg.role)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(user)
    }

    async fn create_verify_email(
        &mut self,
        arg: CreateVerifyEmailParams,
    ) -> Result<VerifyEmail, StoreError> {
        let verify_email = sqlx::query_as::<_, VerifyEmail>(&format!(
            "INSERT INTO verify_emails (username, email, secret_code) \
             VALUES ($1, $2, $3) RETURNING {VERIFY_EMAIL_COLUMNS}"
        ))
        .bind(&arg.username)
        .bind(&arg.email)
        .bind(&arg.secret_code)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(verify_email)
    }

    async fn update_verify_email(
        &mut self,
        arg: UpdateVerifyEmailParams,
    ) -> Result<VerifyEmail, StoreError> {
        let verify_email = sqlx::query_as::<_, VerifyEmail>(&format!(
            "UPDATE verify_emails SET is_used = TRUE \
             WHERE id = $1 AND secret_code = $2 AND is_used = FALSE AND expired_at > NOW() \
             RETURNING {VERIFY_EMAIL_COLUMNS}"
        ))
        .bind(arg.id)
        .bind(&arg.secret_code)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(verify_email)
    }

    async fn mark_email_verified(&mut self, username: &str) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_email_verified = TRUE WHERE username = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_account(&self, arg: CreateAccountParams) -> Result<Account, StoreError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO accounts (owner, balance, currency) VALUES ($1, $2, $3) \
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(&arg.owner)
        .bind(arg.balance)
        .bind(&arg.currency)
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }

    async fn get_account(&self, id: i64) -> Result<Account, StoreError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }

    async fn list_accounts(&self, arg: ListAccountsParams) -> Result<Vec<Account>, StoreError> {
        let accounts = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE owner = $1 ORDER BY id LIMIT $2 OFFSET $3"
        ))
        .bind(&arg.owner)
        .bind(arg.limit)
        .bind(arg.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    async fn get_entry(&self, id: i64) -> Result<Entry, StoreError> {
        let entry = sqlx::query_as::<_, Entry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn list_entries(&self, arg: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        let entries = sqlx::query_as::<_, Entry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE account_id = $1 ORDER BY id LIMIT $2 OFFSET $3"
        ))
        .bind(arg.account_id)
        .bind(arg.limit)
        .bind(arg.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn get_transfer(&self, id: i64) -> Result<Transfer, StoreError> {
        let transfer = sqlx::query_as::<_, Transfer>(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(transfer)
    }

    async fn list_transfers(&self, arg: ListTransfersParams) -> Result<Vec<Transfer>, StoreError> {
        let transfers = sqlx::query_as::<_, Transfer>(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers \
             WHERE from_account_id = $1 OR to_account_id = $1 \
             ORDER BY id LIMIT $2 OFFSET $3"
        ))
        .bind(arg.account_id)
        .bind(arg.limit)
        .bind(arg.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(transfers)
    }

    async fn get_user(&self, username: &str) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_verify_email(&self, username: &str) -> Result<VerifyEmail, StoreError> {
        let verify_email = sqlx::query_as::<_, VerifyEmail>(&format!(
            "SELECT {VERIFY_EMAIL_COLUMNS} FROM verify_emails \
             WHERE username = $1 ORDER BY id DESC LIMIT 1"
        ))
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(verify_email)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
