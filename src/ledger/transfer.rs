//! Transfer Engine
//!
//! One transfer is one transaction of five writes:
//!
//! ```text
//! create_transfer(from, to, amount)
//! create_entry(from, -amount)
//! create_entry(to,   +amount)
//! add_money((lower_id, delta), (higher_id, delta))
//! ```
//!
//! Balance rows are always updated in ascending account-id order, whichever
//! side is the source. Two transfers touching the same pair therefore request
//! the row locks in the same order and cannot wait on each other in a cycle.
//!
//! The engine checks structure only (`amount > 0`, distinct accounts). Funds
//! and currency are the balance guard's job and are checked before this runs.

use serde::{Deserialize, Serialize};

use super::error::TransferError;
use crate::store::{
    Account, AddAccountBalanceParams, CreateEntryParams, CreateTransferParams, Entry, LedgerTx,
    Store, StoreError, Transfer, exec_tx,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

impl TransferTxParams {
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.amount <= 0 {
            return Err(TransferError::Validation(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        if self.from_account_id == self.to_account_id {
            return Err(TransferError::Validation(format!(
                "cannot transfer from account [{}] to itself",
                self.from_account_id
            )));
        }
        Ok(())
    }

    /// Balance delta this transfer applies to `account_id`.
    fn delta_for(&self, account_id: i64) -> i64 {
        if account_id == self.from_account_id {
            -self.amount
        } else {
            self.amount
        }
    }
}

/// Everything one committed transfer wrote, labelled by role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    #[serde(rename = "transfer_account")]
    pub from_account: Account,
    #[serde(rename = "receive_account")]
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

/// Lock order for a pair of accounts: lower id first.
pub fn ordered_pair(id1: i64, id2: i64) -> (i64, i64) {
    if id1 <= id2 { (id1, id2) } else { (id2, id1) }
}

/// Apply two balance deltas in the order given.
///
/// Callers pass the pair already sorted with [`ordered_pair`]; each update takes
/// that row's lock and holds it until the transaction ends.
pub async fn add_money<Q: LedgerTx + ?Sized>(
    tx: &mut Q,
    (first_id, first_delta): (i64, i64),
    (second_id, second_delta): (i64, i64),
) -> Result<(Account, Account), StoreError> {
    let first = tx
        .add_account_balance(AddAccountBalanceParams {
            id: first_id,
            amount: first_delta,
        })
        .await?;

    let second = tx
        .add_account_balance(AddAccountBalanceParams {
            id: second_id,
            amount: second_delta,
        })
        .await?;

    Ok((first, second))
}

/// Run one transfer atomically. Never retries.
pub async fn transfer_tx<S: Store>(
    store: &S,
    params: TransferTxParams,
) -> Result<TransferTxResult, TransferError> {
    params.validate()?;

    let result = exec_tx(store, move |tx| {
        Box::pin(async move {
            let transfer = tx
                .create_transfer(CreateTransferParams {
                    from_account_id: params.from_account_id,
                    to_account_id: params.to_account_id,
                    amount: params.amount,
                })
                .await?;

            let from_entry = tx
                .create_entry(CreateEntryParams {
                    account_id: params.from_account_id,
                    amount: -params.amount,
                })
                .await?;

            let to_entry = tx
                .create_entry(CreateEntryParams {
                    account_id: params.to_account_id,
                    amount: params.amount,
                })
                .await?;

            let (first, second) = ordered_pair(params.from_account_id, params.to_account_id);
            tracing::debug!(
                transfer_id = transfer.id,
                from = params.from_account_id,
                to = params.to_account_id,
                amount = params.amount,
                lock_first = first,
                "Updating balances"
            );

            let (first_account, second_account) = add_money(
                tx,
                (first, params.delta_for(first)),
                (second, params.delta_for(second)),
            )
            .await?;

            let (from_account, to_account) = if first == params.from_account_id {
                (first_account, second_account)
            } else {
                (second_account, first_account)
            };

            Ok(TransferTxResult {
                transfer,
                from_account,
                to_account,
                from_entry,
                to_entry,
            })
        })
    })
    .await;

    match result {
        Ok(result) => {
            tracing::debug!(
                transfer_id = result.transfer.id,
                from = params.from_account_id,
                to = params.to_account_id,
                amount = params.amount,
                "Transfer committed"
            );
            Ok(result)
        }
        Err(e) => {
            tracing::warn!(
                from = params.from_account_id,
                to = params.to_account_id,
                amount = params.amount,
                error = %e,
                "Transfer transaction failed"
            );
            Err(TransferError::Transaction(e))
        }
    }
}
