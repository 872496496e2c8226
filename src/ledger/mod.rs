//! Ledger: transfer engine, balance guard and the caller-facing service.
//!
//! - [`transfer`] - atomic five-write transfer with ordered row locking
//! - [`guard`] - pre-transaction funds/currency check
//! - [`service`] - validation, guard, engine, plus account/entry/transfer reads

pub mod error;
pub mod guard;
pub mod service;
pub mod transfer;

pub use error::TransferError;
pub use guard::BalanceGuard;
pub use service::{LedgerService, Page, TransferRequest};
pub use transfer::{TransferTxParams, TransferTxResult, add_money, ordered_pair, transfer_tx};
