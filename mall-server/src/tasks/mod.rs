//! Background task queue
//!
//! Request handlers enqueue work without waiting for it; a single
//! [`TaskWorker`] drains the channel. Enqueueing never blocks: a full or
//! closed queue drops the task with a warning.

mod sms;
mod worker;

pub use sms::{HttpSmsSender, LogSmsSender, SmsSender};
pub use worker::TaskWorker;

use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    SendSmsCode { mobile: String, code: String },
}

impl Task {
    /// Identity used to suppress duplicate deliveries
    pub fn key(&self) -> String {
        match self {
            Task::SendSmsCode { mobile, code } => format!("sms:{mobile}:{code}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<Task>,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Task>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Hand the task to the worker; `false` when it was dropped
    pub fn enqueue(&self, task: Task) -> bool {
        match self.tx.try_send(task) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(task)) => {
                tracing::warn!(task = %task.key(), "Task queue full, task dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(task)) => {
                tracing::warn!(task = %task.key(), "Task queue closed, task dropped");
                false
            }
        }
    }
}
