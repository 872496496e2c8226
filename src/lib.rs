//! Meta Bank - banking backend
//!
//! Accounts, double-entry transfers, users and email verification on top of
//! PostgreSQL.
//!
//! # Modules
//!
//! - [`store`] - Ledger data access, transactional executor, PostgreSQL and in-memory backends
//! - [`ledger`] - Transfer engine, balance guard, ledger service
//! - [`auth`] - Password hashing and access tokens
//! - [`users`] - Registration, login, email verification
//! - [`worker`] - Background task queue (verification emails)
//! - [`mail`] - Email sender
//! - [`gateway`] - HTTP API
//! - [`db`] - Connection pool and schema bootstrap
//! - [`config`] / [`logging`] - Application config and tracing setup
//!
//! ```text
//! HTTP ──▶ gateway ──▶ LedgerService ──▶ BalanceGuard ──▶ transfer_tx ──▶ exec_tx ──▶ Store
//!                 └──▶ UserService ──▶ exec_tx ──▶ Store
//!                                  └──▶ TaskDistributor ──▶ TaskProcessor ──▶ EmailSender
//! ```

pub mod auth;
pub mod config;
pub mod db;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod mail;
pub mod store;
pub mod users;
pub mod worker;

// Convenient re-exports at crate root
pub use ledger::{
    BalanceGuard, LedgerService, TransferError, TransferRequest, TransferTxParams,
    TransferTxResult, transfer_tx,
};
pub use store::{PgStore, Store, StoreError, exec_tx};

#[cfg(feature = "mem-store")]
pub use store::MemStore;
