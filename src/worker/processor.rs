//! Task Processor
//!
//! Consumes the task queue. Each task runs on its own tokio task and is retried
//! with exponential backoff up to `max_retry` times. Payloads that cannot be
//! decoded are dropped without retry. When the queue closes, `run` waits for
//! in-flight tasks (including pending retries) before returning.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use super::TaskError;
use super::distributor::TaskReceiver;
use super::task::{PayloadSendVerifyEmail, TASK_SEND_VERIFY_EMAIL, Task};
use crate::mail::EmailSender;
use crate::store::Store;

/// Configuration for the task processor
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Retries after the first attempt
    pub max_retry: u32,
    /// Delay before the first retry; doubled on each further retry
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Public URL the verification link points at
    pub base_url: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_retry: 3,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl ProcessorConfig {
    /// Delay before retry number `retry` (0-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }
}

pub struct TaskProcessor<S, E> {
    store: Arc<S>,
    mailer: Arc<E>,
    config: ProcessorConfig,
}

impl<S: Store, E: EmailSender> TaskProcessor<S, E> {
    pub fn new(store: Arc<S>, mailer: Arc<E>, config: ProcessorConfig) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }

    /// Run until every distributor is dropped and in-flight tasks finish.
    pub async fn run(self: Arc<Self>, mut receiver: TaskReceiver) {
        info!(
            max_retry = self.config.max_retry,
            base_backoff_ms = self.config.base_backoff.as_millis() as u64,
            "Starting task processor"
        );

        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                task = receiver.recv() => match task {
                    Some(task) => {
                        let processor = self.clone();
                        in_flight.spawn(async move { processor.process_with_retry(&task).await });
                    }
                    None => break,
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => reap(joined),
            }
        }

        info!(
            in_flight = in_flight.len(),
            "Task queue closed, draining in-flight tasks"
        );
        while let Some(joined) = in_flight.join_next().await {
            reap(joined);
        }
        info!("Task processor stopped");
    }

    /// Process one task, retrying retryable failures.
    pub async fn process_with_retry(&self, task: &Task) -> Result<(), TaskError> {
        let mut retry = 0;
        loop {
            match self.process_task(task).await {
                Ok(()) => return Ok(()),
                Err(e) if !e.is_retryable() => {
                    error!(kind = task.kind, error = %e, "Task failed, not retrying");
                    return Err(e);
                }
                Err(e) if retry >= self.config.max_retry => {
                    error!(
                        kind = task.kind,
                        retries = retry,
                        error = %e,
                        "Task failed, retries exhausted"
                    );
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.config.backoff(retry);
                    warn!(
                        kind = task.kind,
                        retry = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Task failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
            }
        }
    }

    pub async fn process_task(&self, task: &Task) -> Result<(), TaskError> {
        match task.kind {
            TASK_SEND_VERIFY_EMAIL => self.process_send_verify_email(task).await,
            other => Err(TaskError::UnknownKind(other.to_string())),
        }
    }

    async fn process_send_verify_email(&self, task: &Task) -> Result<(), TaskError> {
        let payload: PayloadSendVerifyEmail = task.decode()?;
        let verify_email = self.store.get_verify_email(&payload.username).await?;

        let verify_url = format!(
            "{}/api/v1/verify_email?email_id={}&secret_code={}",
            self.config.base_url.trim_end_matches('/'),
            verify_email.id,
            verify_email.secret_code
        );
        let subject = "Welcome to Meta Bank";
        let content = format!(
            "Hello {},<br/>\n\
             Thank you for registering with us!<br/>\n\
             Please <a href=\"{}\">click here</a> to verify your email address.<br/>\n",
            verify_email.username, verify_url
        );
        let to = [verify_email.email.clone()];

        self.mailer.send_email(subject, &content, &to).await?;

        debug!(
            kind = task.kind,
            username = %payload.username,
            email = %verify_email.email,
            "Processed task"
        );
        Ok(())
    }
}

/// Task results are logged inside `process_with_retry`; only panics surface here.
fn reap(joined: Result<Result<(), TaskError>, JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Task panicked");
    }
}
