//! Transfer handlers
//!
//! Only the owner of the source account may move or inspect its funds.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};

use super::super::state::AppState;
use super::super::types::{
    AccountPageQuery, ApiResult, CreateTransferRequest, created, ok, validated,
};
use crate::auth::Payload;
use crate::ledger::{TransferRequest, TransferTxResult};
use crate::store::{Store, Transfer};

/// POST /api/v1/transfers
pub async fn create_transfer<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(payload): Extension<Payload>,
    Json(req): Json<CreateTransferRequest>,
) -> ApiResult<TransferTxResult> {
    let req = validated(req)?;
    tracing::info!(
        username = %payload.sub,
        from = req.from_account_id,
        to = req.to_account_id,
        amount = req.amount,
        "Transfer request"
    );

    let result = state
        .ledger
        .transfer_as(
            &payload.sub,
            TransferRequest {
                from_account_id: req.from_account_id,
                to_account_id: req.to_account_id,
                amount: req.amount,
                currency: req.currency,
            },
        )
        .await?;
    created(result)
}

/// GET /api/v1/transfers/{id}
pub async fn get_transfer<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(payload): Extension<Payload>,
    Path(id): Path<i64>,
) -> ApiResult<Transfer> {
    let transfer = state.ledger.get_owned_transfer(&payload.sub, id).await?;
    ok(transfer)
}

/// GET /api/v1/transfers?account_id=..&page_id=..&page_size=..
pub async fn list_transfers<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(payload): Extension<Payload>,
    Query(query): Query<AccountPageQuery>,
) -> ApiResult<Vec<Transfer>> {
    let query = validated(query)?;
    state
        .ledger
        .get_owned_account(&payload.sub, query.account_id)
        .await?;

    let transfers = state
        .ledger
        .list_transfers(query.account_id, (&query).into())
        .await?;
    ok(transfers)
}
