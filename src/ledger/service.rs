use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::TransferError;
use super::guard::BalanceGuard;
use super::transfer::{TransferTxParams, TransferTxResult, transfer_tx};
use crate::store::{
    Account, CreateAccountParams, Entry, ListAccountsParams, ListEntriesParams,
    ListTransfersParams, Store, StoreError, Transfer, is_supported_currency,
};

/// Caller-facing transfer request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub currency: String,
}

/// 1-based page selector for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page_id: i32,
    pub page_size: i32,
}

impl Page {
    pub const MIN_SIZE: i32 = 3;
    pub const MAX_SIZE: i32 = 10;

    pub fn validate(&self) -> Result<(), TransferError> {
        if self.page_id < 1 {
            return Err(TransferError::Validation(format!(
                "page_id must be >= 1, got {}",
                self.page_id
            )));
        }
        if !(Self::MIN_SIZE..=Self::MAX_SIZE).contains(&self.page_size) {
            return Err(TransferError::Validation(format!(
                "page_size must be within [{}, {}], got {}",
                Self::MIN_SIZE,
                Self::MAX_SIZE,
                self.page_size
            )));
        }
        Ok(())
    }

    /// `(limit, offset)` for the store query.
    pub fn limit_offset(&self) -> (i64, i64) {
        let limit = i64::from(self.page_size);
        (limit, (i64::from(self.page_id) - 1) * limit)
    }
}

/// Accounts, transfers and entries on top of a [`Store`]
pub struct LedgerService<S> {
    store: Arc<S>,
}

impl<S> Clone for LedgerService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: Store> LedgerService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Validate, guard, then run the transfer transaction.
    pub async fn transfer(&self, req: TransferRequest) -> Result<TransferTxResult, TransferError> {
        let params = TransferTxParams {
            from_account_id: req.from_account_id,
            to_account_id: req.to_account_id,
            amount: req.amount,
        };
        params.validate()?;

        let from = self.get_account(req.from_account_id).await?;
        self.guarded_transfer(from, params, &req.currency).await
    }

    /// Same as [`transfer`](Self::transfer), but the source account must belong to `owner`.
    pub async fn transfer_as(
        &self,
        owner: &str,
        req: TransferRequest,
    ) -> Result<TransferTxResult, TransferError> {
        let params = TransferTxParams {
            from_account_id: req.from_account_id,
            to_account_id: req.to_account_id,
            amount: req.amount,
        };
        params.validate()?;

        let from = self.get_account(req.from_account_id).await?;
        if from.owner != owner {
            tracing::warn!(
                owner,
                account_id = from.id,
                "Transfer from account owned by another user rejected"
            );
            return Err(TransferError::Forbidden);
        }
        self.guarded_transfer(from, params, &req.currency).await
    }

    async fn guarded_transfer(
        &self,
        from: Account,
        params: TransferTxParams,
        currency: &str,
    ) -> Result<TransferTxResult, TransferError> {
        BalanceGuard::check(&from, params.amount, currency)?;

        let to = self.get_account(params.to_account_id).await?;
        BalanceGuard::check_currency(&to, currency)?;

        transfer_tx(self.store.as_ref(), params).await
    }

    pub async fn create_account(
        &self,
        owner: &str,
        currency: &str,
        balance: i64,
    ) -> Result<Account, TransferError> {
        if !is_supported_currency(currency) {
            return Err(TransferError::Validation(format!(
                "unsupported currency: {currency}"
            )));
        }
        if balance < 0 {
            return Err(TransferError::Validation(format!(
                "initial balance must not be negative, got {balance}"
            )));
        }

        let account = self
            .store
            .create_account(CreateAccountParams {
                owner: owner.to_string(),
                balance,
                currency: currency.to_string(),
            })
            .await?;

        tracing::info!(
            account_id = account.id,
            owner,
            currency,
            "Account created"
        );
        Ok(account)
    }

    pub async fn get_account(&self, id: i64) -> Result<Account, TransferError> {
        self.store.get_account(id).await.map_err(|e| match e {
            StoreError::NotFound => TransferError::AccountNotFound(id),
            other => TransferError::Transaction(other),
        })
    }

    /// Account lookup that only succeeds for its owner.
    pub async fn get_owned_account(&self, owner: &str, id: i64) -> Result<Account, TransferError> {
        let account = self.get_account(id).await?;
        if account.owner != owner {
            return Err(TransferError::Forbidden);
        }
        Ok(account)
    }

    pub async fn list_accounts(&self, owner: &str, page: Page) -> Result<Vec<Account>, TransferError> {
        page.validate()?;
        let (limit, offset) = page.limit_offset();
        let accounts = self
            .store
            .list_accounts(ListAccountsParams {
                owner: owner.to_string(),
                limit,
                offset,
            })
            .await?;
        Ok(accounts)
    }

    pub async fn get_transfer(&self, id: i64) -> Result<Transfer, TransferError> {
        Ok(self.store.get_transfer(id).await?)
    }

    /// Transfer lookup restricted to the owner of the source account.
    pub async fn get_owned_transfer(&self, owner: &str, id: i64) -> Result<Transfer, TransferError> {
        let transfer = self.get_transfer(id).await?;
        self.get_owned_account(owner, transfer.from_account_id)
            .await?;
        Ok(transfer)
    }

    pub async fn list_transfers(
        &self,
        account_id: i64,
        page: Page,
    ) -> Result<Vec<Transfer>, TransferError> {
        page.validate()?;
        let (limit, offset) = page.limit_offset();
        let transfers = self
            .store
            .list_transfers(ListTransfersParams {
                account_id,
                limit,
                offset,
            })
            .await?;
        Ok(transfers)
    }

    pub async fn get_entry(&self, id: i64) -> Result<Entry, TransferError> {
        Ok(self.store.get_entry(id).await?)
    }

    pub async fn list_entries(&self, account_id: i64, page: Page) -> Result<Vec<Entry>, TransferError> {
        page.validate()?;
        let (limit, offset) = page.limit_offset();
        let entries = self
            .store
            .list_entries(ListEntriesParams {
                account_id,
                limit,
                offset,
            })
            .await?;
        Ok(entries)
    }
}
