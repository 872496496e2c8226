//! Registration, login and email verification (public), user lookup (owner only)

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Serialize;

use super::super::state::AppState;
use super::super::types::{
    ApiError, ApiResult, LoginUserRequest, VerifyEmailQuery, created, ok, validated,
};
use crate::auth::Payload;
use crate::store::{Store, User};
use crate::users::{CreateUserRequest, LoginResult};

#[derive(Debug, Serialize)]
pub struct VerifyEmailResponse {
    pub is_verified: bool,
}

/// POST /api/v1/users
pub async fn create_user<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<User> {
    let user = state.users.create_user(req).await?;
    created(user)
}

/// POST /api/v1/users/login
pub async fn login_user<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<LoginUserRequest>,
) -> ApiResult<LoginResult> {
    let req = validated(req)?;
    let result = state.users.login(&req.username, &req.password).await?;
    ok(result)
}

/// GET /api/v1/verify_email?email_id=..&secret_code=..
pub async fn verify_email<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<VerifyEmailQuery>,
) -> ApiResult<VerifyEmailResponse> {
    let query = validated(query)?;
    let result = state
        .users
        .verify_email(query.email_id, &query.secret_code)
        .await?;
    ok(VerifyEmailResponse {
        is_verified: result.user.is_email_verified,
    })
}

/// GET /api/v1/users/{username}
pub async fn get_user<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(payload): Extension<Payload>,
    Path(username): Path<String>,
) -> ApiResult<User> {
    if payload.sub != username {
        return ApiError::forbidden("user doesn't belong to the authenticated user").into_err();
    }
    let user = state.users.get_user(&username).await?;
    ok(user)
}
