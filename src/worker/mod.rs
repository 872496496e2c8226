//! Background tasks
//!
//! In-process replacement for a broker-backed queue: a bounded tokio channel
//! between the [`TaskDistributor`] (request side) and the [`TaskProcessor`].

pub mod distributor;
pub mod processor;
pub mod task;

use thiserror::Error;

use crate::mail::MailError;
use crate::store::StoreError;

pub use distributor::{TaskDistributor, TaskPermit, TaskReceiver, task_queue};
pub use processor::{ProcessorConfig, TaskProcessor};
pub use task::{PayloadSendVerifyEmail, TASK_SEND_VERIFY_EMAIL, Task};

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("failed to marshal task payload: {0}")]
    Encode(String),

    #[error("failed to unmarshal task payload: {0}")]
    Decode(String),

    #[error("task queue is full")]
    QueueFull,

    #[error("task queue is closed")]
    QueueClosed,

    #[error("unknown task kind: {0}")]
    UnknownKind(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to send verify email: {0}")]
    Mail(#[from] MailError),
}

impl TaskError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Store(_) | TaskError::Mail(_))
    }
}
