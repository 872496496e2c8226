//! HTTP Gateway
//!
//! ```text
//! /api/v1
//!   GET  /health
//!   POST /users                 POST /users/login          GET /verify_email
//!   ---- bearer token required ----
//!   GET  /users/{username}
//!   POST /accounts              GET  /accounts             GET /accounts/{id}
//!   POST /transfers             GET  /transfers            GET /transfers/{id}
//!   GET  /entries               GET  /entries/{id}
//! ```

pub mod handlers;
pub mod middleware;
pub mod state;
pub mod types;

use anyhow::Context;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::store::Store;
use handlers::{account, entry, health, transfer, user};
use state::AppState;

/// Build the full `/api/v1` router.
pub fn router<S: Store>(state: Arc<AppState<S>>) -> Router {
    let public = Router::new()
        .route("/health", get(health::health_check::<S>))
        .route("/users", post(user::create_user::<S>))
        .route("/users/login", post(user::login_user::<S>))
        .route("/verify_email", get(user::verify_email::<S>));

    let private = Router::new()
        .route("/users/{username}", get(user::get_user::<S>))
        .route(
            "/accounts",
            post(account::create_account::<S>).get(account::list_accounts::<S>),
        )
        .route("/accounts/{id}", get(account::get_account::<S>))
        .route(
            "/transfers",
            post(transfer::create_transfer::<S>).get(transfer::list_transfers::<S>),
        )
        .route("/transfers/{id}", get(transfer::get_transfer::<S>))
        .route("/entries", get(entry::list_entries::<S>))
        .route("/entries/{id}", get(entry::get_entry::<S>))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::jwt_auth_middleware::<S>,
        ));

    Router::new()
        .nest("/api/v1", public.merge(private))
        .with_state(state)
}

/// Start HTTP Gateway server; returns after Ctrl-C.
pub async fn run_server<S: Store>(
    config: &GatewayConfig,
    state: Arc<AppState<S>>,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(%addr, "Gateway listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("Gateway server error")?;
    Ok(())
}

#[cfg(all(test, feature = "mem-store"))]
mod tests {
    use super::*;
    use crate::auth::JwtMaker;
    use crate::ledger::LedgerService;
    use crate::store::MemStore;
    use crate::users::UserService;
    use crate::worker::{TaskReceiver, task_queue};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const KEY: &str = "0123456789abcdefghijklmnopqrstuv";

    fn app() -> (Router, Arc<AppState<MemStore>>, TaskReceiver) {
        let store = Arc::new(MemStore::new());
        let maker = Arc::new(JwtMaker::new(KEY).unwrap());
        let (distributor, receiver) = task_queue(16);
        let state = Arc::new(AppState::new(
            LedgerService::new(store.clone()),
            UserService::new(
                store,
                maker.clone(),
                distributor,
                chrono::Duration::minutes(15),
            ),
            maker,
        ));
        (router(state.clone()), state, receiver)
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_with(uri: &str, token: &str) -> Request<Body> {
        Request::get(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn register_and_login(app: &Router, username: &str) -> String {
        let (status, _) = call(
            app,
            post_json(
                "/api/v1/users",
                None,
                json!({
                    "username": username,
                    "password": "secret123",
                    "full_name": "Test User",
                    "email": format!("{username}@example.com"),
                    "role": "depositor",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(
            app,
            post_json(
                "/api/v1/users/login",
                None,
                json!({"username": username, "password": "secret123"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _rx) = app();
        let req = Request::get("/api/v1/health").body(Body::empty()).unwrap();
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 0);
        assert!(body["data"]["timestamp_ms"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_private_routes_require_token() {
        let (app, _, _rx) = app();
        let req = Request::get("/api/v1/accounts?page_id=1&page_size=5")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], types::error_codes::MISSING_AUTH);

        let (status, _) = call(&app, get_with("/api/v1/accounts/1", "garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_transfer_flow() {
        let (app, state, _rx) = app();
        let alice = register_and_login(&app, "alice").await;
        let bob = register_and_login(&app, "bob").await;

        let (status, body) = call(
            &app,
            post_json("/api/v1/accounts", Some(&alice), json!({"currency": "USD"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let alice_account = body["data"]["id"].as_i64().unwrap();

        let (_, body) = call(
            &app,
            post_json("/api/v1/accounts", Some(&bob), json!({"currency": "USD"})),
        )
        .await;
        let bob_account = body["data"]["id"].as_i64().unwrap();

        // New accounts start empty: the guard rejects the debit.
        let transfer = json!({
            "from_account_id": alice_account,
            "to_account_id": bob_account,
            "amount": 10,
            "currency": "USD",
        });
        let (status, body) = call(
            &app,
            post_json("/api/v1/transfers", Some(&alice), transfer.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], types::error_codes::INSUFFICIENT_BALANCE);

        // Fund alice through a transfer from a seeded account.
        let bank = state
            .ledger
            .create_account("bank", "USD", 1_000)
            .await
            .unwrap();
        state
            .ledger
            .transfer(crate::ledger::TransferRequest {
                from_account_id: bank.id,
                to_account_id: alice_account,
                amount: 100,
                currency: "USD".into(),
            })
            .await
            .unwrap();

        let (status, body) = call(
            &app,
            post_json("/api/v1/transfers", Some(&alice), transfer.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["transfer_account"]["balance"], 90);
        assert_eq!(body["data"]["receive_account"]["balance"], 10);
        let transfer_id = body["data"]["transfer"]["id"].as_i64().unwrap();

        // Bob cannot spend from alice's account or read her transfer.
        let (status, _) = call(&app, post_json("/api/v1/transfers", Some(&bob), transfer)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(
            &app,
            get_with(&format!("/api/v1/transfers/{transfer_id}"), &bob),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            &app,
            get_with(
                &format!("/api/v1/entries?account_id={alice_account}&page_id=1&page_size=5"),
                &alice,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let amounts: Vec<i64> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["amount"].as_i64().unwrap())
            .collect();
        assert_eq!(amounts, vec![100, -10]);
    }

    #[tokio::test]
    async fn test_verify_email_endpoint() {
        let (app, state, _rx) = app();
        register_and_login(&app, "carol").await;
        let record = state.store().get_verify_email("carol").await.unwrap();

        let uri = format!(
            "/api/v1/verify_email?email_id={}&secret_code={}",
            record.id, record.secret_code
        );
        let req = Request::get(&uri).body(Body::empty()).unwrap();
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["is_verified"], true);

        let req = Request::get(&uri).body(Body::empty()).unwrap();
        let (status, _) = call(&app, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_user_owner_only() {
        let (app, _, _rx) = app();
        let alice = register_and_login(&app, "alice").await;
        register_and_login(&app, "bob").await;

        let (status, body) = call(&app, get_with("/api/v1/users/alice", &alice)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["username"], "alice");
        assert_eq!(body["data"]["role"], "depositor");
        assert!(body["data"].get("hashed_password").is_none());

        let (status, body) = call(&app, get_with("/api/v1/users/bob", &alice)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], types::error_codes::FORBIDDEN);

        let req = Request::get("/api/v1/users/alice").body(Body::empty()).unwrap();
        let (status, _) = call(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unsupported_role_rejected() {
        let (app, _, _rx) = app();
        let (status, body) = call(
            &app,
            post_json(
                "/api/v1/users",
                None,
                json!({
                    "username": "mallory",
                    "password": "secret123",
                    "full_name": "Mallory Smith",
                    "email": "mallory@example.com",
                    "role": "admin",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], types::error_codes::INVALID_PARAMETER);
    }

    #[tokio::test]
    async fn test_invalid_registration_rejected() {
        let (app, _, _rx) = app();
        let (status, body) = call(
            &app,
            post_json(
                "/api/v1/users",
                None,
                json!({
                    "username": "Bad Name",
                    "password": "123",
                    "full_name": "X",
                    "email": "nope",
                    "role": "depositor",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], types::error_codes::INVALID_PARAMETER);
    }
}
