//! Transactional Executor
//!
//! All multi-statement writes run through [`exec_tx`]: begin, hand the unit of
//! work a scoped handle bound to the open transaction, then commit on `Ok` or
//! roll back on `Err`. Exactly one terminal action is issued per invocation.
//!
//! ```text
//! begin ──▶ unit of work ──Ok──▶ commit
//!                 │
//!                 └──Err──▶ rollback ──Err──▶ StoreError::Rollback { source, rollback }
//! ```

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::error::StoreError;

/// An open transaction. Dropping it without a terminal action rolls it back.
#[async_trait]
pub trait TxHandle: Send + Sized {
    async fn commit(self) -> Result<(), StoreError>;
    async fn rollback(self) -> Result<(), StoreError>;
}

/// Something that can open transactions.
#[async_trait]
pub trait TxBackend: Send + Sync {
    type Tx: TxHandle;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

/// Run `f` inside one transaction.
///
/// If `f` fails and the rollback fails too, both errors are returned together;
/// the rollback error never replaces the original one.
pub async fn exec_tx<B, T, F>(backend: &B, f: F) -> Result<T, StoreError>
where
    B: TxBackend + ?Sized,
    T: Send,
    F: for<'t> FnOnce(&'t mut B::Tx) -> BoxFuture<'t, Result<T, StoreError>> + Send,
{
    let mut tx = backend.begin().await?;

    match f(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => match tx.rollback().await {
            Ok(()) => Err(err),
            Err(rollback_err) => {
                tracing::error!(
                    error = %err,
                    rollback_error = %rollback_err,
                    "Rollback failed after transaction error"
                );
                Err(StoreError::Rollback {
                    source: Box::new(err),
                    rollback: Box::new(rollback_err),
                })
            }
        },
    }
}
