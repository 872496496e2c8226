//! Account handlers (authenticated; owner comes from the token)

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};

use super::super::state::AppState;
use super::super::types::{
    ApiResult, CreateAccountRequest, PageQuery, created, ok, validated,
};
use crate::auth::Payload;
use crate::store::{Account, Store};

/// POST /api/v1/accounts
pub async fn create_account<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(payload): Extension<Payload>,
    Json(req): Json<CreateAccountRequest>,
) -> ApiResult<Account> {
    let req = validated(req)?;
    let account = state
        .ledger
        .create_account(&payload.sub, &req.currency, 0)
        .await?;
    created(account)
}

/// GET /api/v1/accounts/{id}
pub async fn get_account<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(payload): Extension<Payload>,
    Path(id): Path<i64>,
) -> ApiResult<Account> {
    let account = state.ledger.get_owned_account(&payload.sub, id).await?;
    ok(account)
}

/// GET /api/v1/accounts?page_id=..&page_size=..
pub async fn list_accounts<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(payload): Extension<Payload>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Vec<Account>> {
    let query = validated(query)?;
    let accounts = state
        .ledger
        .list_accounts(&payload.sub, (&query).into())
        .await?;
    ok(accounts)
}
