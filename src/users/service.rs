use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::error::UserError;
use crate::auth::{JwtMaker, check_password, hash_password};
use crate::store::{
    CreateUserParams, CreateVerifyEmailParams, Store, StoreError, UpdateVerifyEmailParams, User,
    UserTx, VerifyEmail, exec_tx, is_supported_role,
};
use crate::worker::{PayloadSendVerifyEmail, TaskDistributor};

pub const SECRET_CODE_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 100), custom(function = "validate_username"))]
    pub username: String,
    #[validate(length(min = 6, max = 100))]
    pub password: String,
    #[validate(length(min = 3, max = 100), custom(function = "validate_full_name"))]
    pub full_name: String,
    #[validate(length(min = 3, max = 200), email)]
    pub email: String,
    #[validate(custom(function = "validate_role"))]
    pub role: String,
}

fn validate_username(value: &str) -> Result<(), ValidationError> {
    if value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        Ok(())
    } else {
        Err(ValidationError::new("username")
            .with_message("must contain only lowercase letters, digits, or underscore".into()))
    }
}

fn validate_full_name(value: &str) -> Result<(), ValidationError> {
    if value.chars().all(|c| c.is_alphabetic() || c == ' ') {
        Ok(())
    } else {
        Err(ValidationError::new("full_name")
            .with_message("must contain only letters or spaces".into()))
    }
}

fn validate_role(value: &str) -> Result<(), ValidationError> {
    if is_supported_role(value) {
        Ok(())
    } else {
        Err(ValidationError::new("role").with_message("unsupported role".into()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyEmailResult {
    pub user: User,
    pub verify_email: VerifyEmail,
}

/// Random lowercase code for email verification links.
pub fn random_secret_code() -> String {
    let mut rng = rand::thread_rng();
    (0..SECRET_CODE_LEN)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect()
}

pub struct UserService<S> {
    store: Arc<S>,
    token_maker: Arc<JwtMaker>,
    distributor: TaskDistributor,
    access_token_duration: Duration,
}

impl<S> Clone for UserService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            token_maker: self.token_maker.clone(),
            distributor: self.distributor.clone(),
            access_token_duration: self.access_token_duration,
        }
    }
}

impl<S: Store> UserService<S> {
    pub fn new(
        store: Arc<S>,
        token_maker: Arc<JwtMaker>,
        distributor: TaskDistributor,
        access_token_duration: Duration,
    ) -> Self {
        Self {
            store,
            token_maker,
            distributor,
            access_token_duration,
        }
    }

    /// Create the user and its verification record in one transaction.
    ///
    /// A queue slot for the verification email is reserved inside the
    /// transaction (no slot, no user) and filled only after commit, so the
    /// processor never sees a task for an uncommitted user.
    pub async fn create_user(&self, req: CreateUserRequest) -> Result<User, UserError> {
        req.validate()
            .map_err(|e| UserError::Validation(e.to_string()))?;

        let hashed_password = hash_password(&req.password)?;
        let secret_code = random_secret_code();
        let distributor = self.distributor.clone();
        let params = CreateUserParams {
            username: req.username,
            hashed_password,
            full_name: req.full_name,
            email: req.email,
            role: req.role,
        };

        let (user, permit) = exec_tx(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let user = tx.create_user(params).await?;
                tx.create_verify_email(CreateVerifyEmailParams {
                    username: user.username.clone(),
                    email: user.email.clone(),
                    secret_code,
                })
                .await?;

                // after-create hook
                let permit = distributor
                    .reserve_send_verify_email(&PayloadSendVerifyEmail {
                        username: user.username.clone(),
                    })
                    .map_err(|e| StoreError::Aborted(format!("failed to distribute task: {e}")))?;

                Ok((user, permit))
            })
        })
        .await?;
        permit.send();

        tracing::info!(username = %user.username, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResult, UserError> {
        let user = self.store.get_user(username).await?;
        check_password(password, &user.hashed_password)?;

        let (access_token, payload) =
            self.token_maker
                .create_token(&user.username, &user.role, self.access_token_duration)?;
        let access_token_expires_at = Utc
            .timestamp_opt(payload.exp, 0)
            .single()
            .unwrap_or_else(Utc::now);

        tracing::info!(username = %user.username, "User logged in");
        Ok(LoginResult {
            access_token,
            access_token_expires_at,
            user,
        })
    }

    pub async fn get_user(&self, username: &str) -> Result<User, UserError> {
        Ok(self.store.get_user(username).await?)
    }

    /// Consume the code and mark the user's email verified, atomically.
    pub async fn verify_email(
        &self,
        email_id: i64,
        secret_code: &str,
    ) -> Result<VerifyEmailResult, UserError> {
        if email_id <= 0 {
            return Err(UserError::Validation(format!(
                "email_id must be positive, got {email_id}"
            )));
        }
        if secret_code.len() != SECRET_CODE_LEN {
            return Err(UserError::Validation(format!(
                "secret_code must be {SECRET_CODE_LEN} characters"
            )));
        }

        let update = UpdateVerifyEmailParams {
            id: email_id,
            secret_code: secret_code.to_string(),
        };
        let result = exec_tx(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let verify_email = tx.update_verify_email(update).await?;
                let user = tx.mark_email_verified(&verify_email.username).await?;
                Ok(VerifyEmailResult { user, verify_email })
            })
        })
        .await?;

        tracing::info!(username = %result.user.username, "Email verified");
        Ok(result)
    }
}

#[cfg(all(test, feature = "mem-store"))]
mod tests {
    use super::*;
    use crate::store::{MemStore, ROLE_BANKER, ROLE_DEPOSITOR};
    use crate::worker::{TaskReceiver, task_queue};

    const KEY: &str = "0123456789abcdefghijklmnopqrstuv";

    fn service(queue: usize) -> (UserService<MemStore>, Arc<MemStore>, TaskReceiver) {
        let store = Arc::new(MemStore::new());
        let (distributor, receiver) = task_queue(queue);
        let maker = Arc::new(JwtMaker::new(KEY).unwrap());
        let service = UserService::new(store.clone(), maker, distributor, Duration::minutes(15));
        (service, store, receiver)
    }

    fn maker() -> JwtMaker {
        JwtMaker::new(KEY).unwrap()
    }

    fn request(username: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: username.to_string(),
            password: "secret123".to_string(),
            full_name: "Alice Smith".to_string(),
            email: format!("{username}@example.com"),
            role: ROLE_DEPOSITOR.to_string(),
        }
    }

    #[test]
    fn test_random_secret_code() {
        let code = random_secret_code();
        assert_eq!(code.len(), SECRET_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_lowercase()));
        assert_ne!(code, random_secret_code());
    }

    #[test]
    fn test_request_validation() {
        assert!(request("alice_1").validate().is_ok());
        assert!(request("Alice").validate().is_err());
        assert!(request("al").validate().is_err());

        let mut bad_email = request("alice");
        bad_email.email = "not-an-email".to_string();
        assert!(bad_email.validate().is_err());

        let mut bad_name = request("alice");
        bad_name.full_name = "R2 D2".to_string();
        assert!(bad_name.validate().is_err());

        let mut banker = request("alice");
        banker.role = ROLE_BANKER.to_string();
        assert!(banker.validate().is_ok());

        let mut bad_role = request("alice");
        bad_role.role = "admin".to_string();
        assert!(bad_role.validate().is_err());
    }

    #[tokio::test]
    async fn test_create_user_enqueues_verification() {
        let (service, store, mut receiver) = service(4);

        let user = service.create_user(request("alice")).await.unwrap();
        assert!(!user.is_email_verified);
        assert!(user.hashed_password.starts_with("$argon2"));

        let task = receiver.recv().await.unwrap();
        let payload: PayloadSendVerifyEmail = task.decode().unwrap();
        assert_eq!(payload.username, "alice");

        let verify = store.get_verify_email("alice").await.unwrap();
        assert_eq!(verify.email, "alice@example.com");
        assert_eq!(verify.secret_code.len(), SECRET_CODE_LEN);
    }

    #[tokio::test]
    async fn test_hook_failure_rolls_back_user() {
        let (service, store, receiver) = service(1);
        drop(receiver);

        let err = service.create_user(request("alice")).await.unwrap_err();
        assert!(matches!(err, UserError::Store(StoreError::Aborted(_))));
        assert!(store.get_user("alice").await.unwrap_err().is_not_found());
        assert!(store.get_verify_email("alice").await.is_err());
    }

    #[tokio::test]
    async fn test_full_queue_rolls_back_user() {
        let (service, store, _receiver) = service(1);
        service.create_user(request("alice")).await.unwrap();

        let err = service.create_user(request("bob")).await.unwrap_err();
        assert!(matches!(err, UserError::Store(StoreError::Aborted(_))));
        assert!(store.get_user("bob").await.unwrap_err().is_not_found());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_task_delivered_after_commit() {
        let (service, store, mut receiver) = service(64);

        // Consumer reads the verification record as soon as a task arrives.
        let consumer = tokio::spawn(async move {
            let mut seen = 0;
            let mut missing = Vec::new();
            while let Some(task) = receiver.recv().await {
                let payload: PayloadSendVerifyEmail = task.decode().unwrap();
                if store.get_verify_email(&payload.username).await.is_err() {
                    missing.push(payload.username);
                }
                seen += 1;
            }
            (seen, missing)
        });

        let mut handles = Vec::new();
        for i in 0..50 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.create_user(request(&format!("user_{i}"))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        drop(service);

        let (seen, missing) = consumer.await.unwrap();
        assert_eq!(seen, 50);
        assert!(missing.is_empty(), "tasks before commit: {missing:?}");
    }

    #[tokio::test]
    async fn test_failed_registration_enqueues_nothing() {
        let (service, _store, mut receiver) = service(4);
        service.create_user(request("alice")).await.unwrap();
        receiver.recv().await.unwrap();

        let mut again = request("alice");
        again.email = "other@example.com".to_string();
        assert!(service.create_user(again).await.is_err());
        drop(service);

        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_role_is_stored_and_signed() {
        let (service, _store, _receiver) = service(4);
        let mut req = request("carol");
        req.role = ROLE_BANKER.to_string();
        service.create_user(req).await.unwrap();

        assert_eq!(service.get_user("carol").await.unwrap().role, ROLE_BANKER);
        let result = service.login("carol", "secret123").await.unwrap();
        let payload = maker().verify_token(&result.access_token).unwrap();
        assert_eq!(payload.role, ROLE_BANKER);
        assert!(matches!(
            service.get_user("nobody").await,
            Err(UserError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let (service, _store, _receiver) = service(4);
        service.create_user(request("alice")).await.unwrap();

        let mut again = request("alice");
        again.email = "other@example.com".to_string();
        let err = service.create_user(again).await.unwrap_err();
        assert!(matches!(err, UserError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_login() {
        let (service, _store, _receiver) = service(4);
        service.create_user(request("alice")).await.unwrap();

        let result = service.login("alice", "secret123").await.unwrap();
        let payload = maker().verify_token(&result.access_token).unwrap();
        assert_eq!(payload.sub, "alice");
        assert_eq!(payload.role, ROLE_DEPOSITOR);
        assert!(result.access_token_expires_at > Utc::now());

        assert!(matches!(
            service.login("alice", "wrong-password").await,
            Err(UserError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login("nobody", "secret123").await,
            Err(UserError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_verify_email_once() {
        let (service, store, _receiver) = service(4);
        service.create_user(request("alice")).await.unwrap();
        let record = store.get_verify_email("alice").await.unwrap();

        let result = service
            .verify_email(record.id, &record.secret_code)
            .await
            .unwrap();
        assert!(result.user.is_email_verified);
        assert!(result.verify_email.is_used);
        assert!(store.get_user("alice").await.unwrap().is_email_verified);

        let err = service
            .verify_email(record.id, &record.secret_code)
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::NotFound));
    }

    #[tokio::test]
    async fn test_verify_email_wrong_code() {
        let (service, store, _receiver) = service(4);
        service.create_user(request("alice")).await.unwrap();
        let record = store.get_verify_email("alice").await.unwrap();

        let wrong = "z".repeat(SECRET_CODE_LEN);
        let err = service.verify_email(record.id, &wrong).await.unwrap_err();
        assert!(matches!(err, UserError::NotFound));
        assert!(!store.get_user("alice").await.unwrap().is_email_verified);

        let err = service.verify_email(record.id, "short").await.unwrap_err();
        assert!(matches!(err, UserError::Validation(_)));
    }
}
