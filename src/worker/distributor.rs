use tokio::sync::mpsc;
use tracing::info;

use super::TaskError;
use super::task::{PayloadSendVerifyEmail, Task};

/// Producer side of the task queue (used inside request handling)
#[derive(Clone)]
pub struct TaskDistributor {
    tx: mpsc::Sender<Task>,
}

impl TaskDistributor {
    /// Reserve a queue slot for the verification email without waiting.
    ///
    /// Called inside the registration transaction: a full or closed queue
    /// aborts it. The task is only delivered by [`TaskPermit::send`] once the
    /// transaction has committed; dropping the permit frees the slot.
    pub fn reserve_send_verify_email(
        &self,
        payload: &PayloadSendVerifyEmail,
    ) -> Result<TaskPermit, TaskError> {
        let task = Task::send_verify_email(payload)?;
        let permit = self.tx.clone().try_reserve_owned().map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TaskError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => TaskError::QueueClosed,
        })?;

        Ok(TaskPermit {
            permit,
            task,
            username: payload.username.clone(),
        })
    }
}

/// A reserved slot plus the task that will fill it
pub struct TaskPermit {
    permit: mpsc::OwnedPermit<Task>,
    task: Task,
    username: String,
}

impl TaskPermit {
    pub fn send(self) {
        let kind = self.task.kind;
        self.permit.send(self.task);
        info!(kind, username = %self.username, "Enqueued task");
    }
}

/// Consumer side of the task queue (owned by the processor)
pub struct TaskReceiver {
    rx: mpsc::Receiver<Task>,
}

impl TaskReceiver {
    /// Receive a task (waits until available or every distributor is dropped)
    pub async fn recv(&mut self) -> Option<Task> {
        self.rx.recv().await
    }
}

/// Create a bounded task queue
pub fn task_queue(capacity: usize) -> (TaskDistributor, TaskReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (TaskDistributor { tx }, TaskReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::task::TASK_SEND_VERIFY_EMAIL;

    fn payload(name: &str) -> PayloadSendVerifyEmail {
        PayloadSendVerifyEmail {
            username: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_enqueue_and_receive() {
        let (distributor, mut receiver) = task_queue(4);
        distributor
            .reserve_send_verify_email(&payload("alice"))
            .unwrap()
            .send();

        let task = receiver.recv().await.unwrap();
        assert_eq!(task.kind, TASK_SEND_VERIFY_EMAIL);
        assert_eq!(task.payload, br#"{"username":"alice"}"#.to_vec());
        assert_eq!(
            task.decode::<PayloadSendVerifyEmail>().unwrap(),
            payload("alice")
        );
    }

    #[tokio::test]
    async fn test_full_queue_rejected() {
        let (distributor, _receiver) = task_queue(1);
        distributor
            .reserve_send_verify_email(&payload("a"))
            .unwrap()
            .send();
        assert!(matches!(
            distributor.reserve_send_verify_email(&payload("b")),
            Err(TaskError::QueueFull)
        ));
    }

    #[tokio::test]
    async fn test_dropped_permit_frees_slot() {
        let (distributor, mut receiver) = task_queue(1);
        let permit = distributor.reserve_send_verify_email(&payload("a")).unwrap();
        assert!(matches!(
            distributor.reserve_send_verify_email(&payload("b")),
            Err(TaskError::QueueFull)
        ));
        drop(permit);

        distributor
            .reserve_send_verify_email(&payload("b"))
            .unwrap()
            .send();
        let task = receiver.recv().await.unwrap();
        assert_eq!(task.decode::<PayloadSendVerifyEmail>().unwrap(), payload("b"));
    }

    #[tokio::test]
    async fn test_closed_queue_rejected() {
        let (distributor, receiver) = task_queue(1);
        drop(receiver);
        assert!(matches!(
            distributor.reserve_send_verify_email(&payload("a")),
            Err(TaskError::QueueClosed)
        ));
    }
}
