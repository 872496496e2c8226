//! Balance Guard
//!
//! Fast-fail business check run before a transfer transaction is opened.
//!
//! The guard reads the account outside the transaction, so the balance can
//! change between the check and the debit. That window is accepted: the atomic
//! `balance = balance + delta` update and the `balance >= 0` constraint reject
//! any transfer that slips through.

use super::error::TransferError;
use crate::store::Account;

pub struct BalanceGuard;

impl BalanceGuard {
    /// Full check for the debited account: funds and currency.
    pub fn check(account: &Account, amount: i64, currency: &str) -> Result<(), TransferError> {
        if account.balance <= 0 || amount > account.balance {
            return Err(TransferError::InsufficientFunds {
                account_id: account.id,
                balance: account.balance,
                amount,
            });
        }
        Self::check_currency(account, currency)
    }

    /// Currency-only check for the credited account.
    pub fn check_currency(account: &Account, currency: &str) -> Result<(), TransferError> {
        if account.currency != currency {
            return Err(TransferError::CurrencyMismatch {
                account_id: account.id,
                expected: currency.to_string(),
                actual: account.currency.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn account(balance: i64, currency: &str) -> Account {
        Account {
            id: 11,
            owner: "alice".to_string(),
            balance,
            currency: currency.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_sufficient_funds_passes() {
        assert!(BalanceGuard::check(&account(100, "USD"), 100, "USD").is_ok());
        assert!(BalanceGuard::check(&account(100, "USD"), 1, "USD").is_ok());
    }

    #[test]
    fn test_amount_above_balance_rejected() {
        let err = BalanceGuard::check(&account(100, "USD"), 101, "USD").unwrap_err();
        assert!(matches!(
            err,
            TransferError::InsufficientFunds {
                account_id: 11,
                balance: 100,
                amount: 101
            }
        ));
    }

    #[test]
    fn test_empty_account_rejected_even_for_zero_amount() {
        let err = BalanceGuard::check(&account(0, "USD"), 0, "USD").unwrap_err();
        assert!(matches!(err, TransferError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_currency_mismatch() {
        let err = BalanceGuard::check(&account(100, "EURO"), 10, "USD").unwrap_err();
        match err {
            TransferError::CurrencyMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, "USD");
                assert_eq!(actual, "EURO");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_funds_checked_before_currency() {
        let err = BalanceGuard::check(&account(5, "EURO"), 10, "USD").unwrap_err();
        assert!(matches!(err, TransferError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_currency_only_ignores_balance() {
        assert!(BalanceGuard::check_currency(&account(0, "USD"), "USD").is_ok());
        assert!(BalanceGuard::check_currency(&account(0, "USD"), "JPY").is_err());
    }
}
