use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::TaskError;

pub const TASK_SEND_VERIFY_EMAIL: &str = "task:send_verify_email";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadSendVerifyEmail {
    pub username: String,
}

/// Queued unit of background work. `payload` is JSON.
#[derive(Debug, Clone)]
pub struct Task {
    pub kind: &'static str,
    pub payload: Vec<u8>,
}

impl Task {
    pub fn send_verify_email(payload: &PayloadSendVerifyEmail) -> Result<Self, TaskError> {
        let payload =
            serde_json::to_vec(payload).map_err(|e| TaskError::Encode(e.to_string()))?;
        Ok(Self {
            kind: TASK_SEND_VERIFY_EMAIL,
            payload,
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, TaskError> {
        serde_json::from_slice(&self.payload).map_err(|e| TaskError::Decode(e.to_string()))
    }
}
