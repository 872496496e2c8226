use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, Query, State},
};

use super::super::state::AppState;
use super::super::types::{AccountPageQuery, ApiResult, ok, validated};
use crate::auth::Payload;
use crate::store::{Entry, Store};

/// GET /api/v1/entries/{id}
pub async fn get_entry<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(payload): Extension<Payload>,
    Path(id): Path<i64>,
) -> ApiResult<Entry> {
    let entry = state.ledger.get_entry(id).await?;
    state
        .ledger
        .get_owned_account(&payload.sub, entry.account_id)
        .await?;
    ok(entry)
}

/// GET /api/v1/entries?account_id=..&page_id=..&page_size=..
pub async fn list_entries<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(payload): Extension<Payload>,
    Query(query): Query<AccountPageQuery>,
) -> ApiResult<Vec<Entry>> {
    let query = validated(query)?;
    state
        .ledger
        .get_owned_account(&payload.sub, query.account_id)
        .await?;

    let entries = state
        .ledger
        .list_entries(query.account_id, (&query).into())
        .await?;
    ok(entries)
}
