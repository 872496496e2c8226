//! Ledger data access
//!
//! Plain create/read operations on accounts, entries, transfers, users and
//! verification records. Nothing here knows about transfers as a business
//! operation; multi-statement writes compose these primitives through
//! [`exec_tx`].
//!
//! # Capabilities
//!
//! - [`Store`]: pool-level reads and single-row creates (no transaction)
//! - [`LedgerTx`]: the narrow handle the transfer engine gets inside a transaction
//! - [`UserTx`]: the handle user registration and email verification get
//!
//! Backends: [`postgres::PgStore`] and, with the `mem-store` feature,
//! [`memory::MemStore`].

pub mod error;
#[cfg(feature = "mem-store")]
pub mod memory;
pub mod models;
pub mod postgres;
pub mod tx;

use async_trait::async_trait;

pub use error::StoreError;
pub use models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, CreateUserParams, CreateVerifyEmailParams, Entry, ListAccountsParams,
    ListEntriesParams, ListTransfersParams, ROLE_BANKER, ROLE_DEPOSITOR, SUPPORTED_CURRENCIES,
    Transfer, UpdateVerifyEmailParams, User, VerifyEmail, is_supported_currency,
    is_supported_role,
};
pub use postgres::{PgStore, PgTx};
pub use tx::{TxBackend, TxHandle, exec_tx};

#[cfg(feature = "mem-store")]
pub use memory::{MemStore, MemTx};

/// Writes available to the transfer engine inside an open transaction.
#[async_trait]
pub trait LedgerTx: Send {
    async fn create_transfer(&mut self, arg: CreateTransferParams) -> Result<Transfer, StoreError>;

    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, StoreError>;

    /// Atomic increment; takes the row lock and returns the post-update row.
    async fn add_account_balance(
        &mut self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, StoreError>;
}

/// Writes available to user registration and email verification.
#[async_trait]
pub trait UserTx: Send {
    async fn create_user(&mut self, arg: CreateUserParams) -> Result<User, StoreError>;

    async fn create_verify_email(
        &mut self,
        arg: CreateVerifyEmailParams,
    ) -> Result<VerifyEmail, StoreError>;

    /// Marks a matching, unused, unexpired code as used. `NotFound` otherwise.
    async fn update_verify_email(
        &mut self,
        arg: UpdateVerifyEmailParams,
    ) -> Result<VerifyEmail, StoreError>;

    async fn mark_email_verified(&mut self, username: &str) -> Result<User, StoreError>;
}

/// Full store: transactional backend plus non-transactional reads.
#[async_trait]
pub trait Store: TxBackend<Tx: LedgerTx + UserTx> + 'static {
    async fn create_account(&self, arg: CreateAccountParams) -> Result<Account, StoreError>;

    async fn get_account(&self, id: i64) -> Result<Account, StoreError>;

    async fn list_accounts(&self, arg: ListAccountsParams) -> Result<Vec<Account>, StoreError>;

    async fn get_entry(&self, id: i64) -> Result<Entry, StoreError>;

    async fn list_entries(&self, arg: ListEntriesParams) -> Result<Vec<Entry>, StoreError>;

    async fn get_transfer(&self, id: i64) -> Result<Transfer, StoreError>;

    async fn list_transfers(&self, arg: ListTransfersParams) -> Result<Vec<Transfer>, StoreError>;

    async fn get_user(&self, username: &str) -> Result<User, StoreError>;

    /// Latest verification record for the user.
    async fn get_verify_email(&self, username: &str) -> Result<VerifyEmail, StoreError>;

    /// Connectivity check for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}
