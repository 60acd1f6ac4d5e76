//! Task worker
//!
//! Consumes [`Task`]s until every sender is gone. A failed task is retried
//! with a linear backoff up to `max_attempts`, then logged and dropped.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::{SmsSender, Task};

/// Delivered task keys remembered for duplicate suppression
const DELIVERED_WINDOW: usize = 1024;

pub struct TaskWorker {
    sms: Arc<dyn SmsSender>,
    sms_ttl_minutes: u64,
    max_attempts: u32,
    backoff: Duration,
    delivered: HashSet<String>,
    delivered_order: VecDeque<String>,
}

impl TaskWorker {
    pub fn new(sms: Arc<dyn SmsSender>, sms_ttl_minutes: u64) -> Self {
        Self {
            sms,
            sms_ttl_minutes,
            max_attempts: 3,
            backoff: Duration::from_secs(1),
            delivered: HashSet::new(),
            delivered_order: VecDeque::new(),
        }
    }

    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// Run until the channel closes
    pub async fn run(mut self, mut rx: mpsc::Receiver<Task>) {
        tracing::info!("Task worker started");

        while let Some(task) = rx.recv().await {
            let key = task.key();
            if self.delivered.contains(&key) {
                tracing::debug!(task = %key, "Duplicate task skipped");
                continue;
            }
            if self.execute(&task).await {
                self.remember(key);
            }
        }

        tracing::info!("Task channel closed, worker stopping");
    }

    async fn execute(&self, task: &Task) -> bool {
        for attempt in 1..=self.max_attempts {
            let result = match task {
                Task::SendSmsCode { mobile, code } => {
                    self.sms.send(mobile, code, self.sms_ttl_minutes).await
                }
            };
            match result {
                Ok(()) => {
                    tracing::debug!(task = %task.key(), attempt, "Task done");
                    return true;
                }
                Err(e) if attempt < self.max_attempts => {
                    tracing::warn!(task = %task.key(), attempt, error = %e, "Task failed, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => {
                    tracing::error!(task = %task.key(), attempt, error = %e, "Task abandoned");
                }
            }
        }
        false
    }

    fn remember(&mut self, key: String) {
        if self.delivered_order.len() == DELIVERED_WINDOW {
            if let Some(oldest) = self.delivered_order.pop_front() {
                self.delivered.remove(&oldest);
            }
        }
        self.delivered.insert(key.clone());
        self.delivered_order.push_back(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoxError;
    use crate::tasks::TaskQueue;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Fails the first `failures` sends, records the rest
    #[derive(Default)]
    struct Recorder {
        failures: Mutex<u32>,
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SmsSender for Recorder {
        async fn send(&self, mobile: &str, code: &str, _: u64) -> Result<(), BoxError> {
            {
                let mut failures = self.failures.lock();
                if *failures > 0 {
                    *failures -= 1;
                    return Err("gateway down".into());
                }
            }
            self.sent.lock().push((mobile.to_string(), code.to_string()));
            Ok(())
        }
    }

    fn sms(code: &str) -> Task {
        Task::SendSmsCode {
            mobile: "13800138000".into(),
            code: code.into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_delivers_once() {
        let recorder = Arc::new(Recorder {
            failures: Mutex::new(2),
            ..Default::default()
        });
        let (queue, rx) = TaskQueue::new(8);
        queue.enqueue(sms("123456"));
        queue.enqueue(sms("123456"));
        drop(queue);

        TaskWorker::new(recorder.clone(), 5)
            .with_retry(3, Duration::from_millis(10))
            .run(rx)
            .await;

        assert_eq!(
            *recorder.sent.lock(),
            vec![("13800138000".to_string(), "123456".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let recorder = Arc::new(Recorder {
            failures: Mutex::new(5),
            ..Default::default()
        });
        let (queue, rx) = TaskQueue::new(8);
        queue.enqueue(sms("654321"));
        drop(queue);

        TaskWorker::new(recorder.clone(), 5)
            .with_retry(2, Duration::from_millis(10))
            .run(rx)
            .await;

        assert!(recorder.sent.lock().is_empty());
        assert_eq!(*recorder.failures.lock(), 3);
    }
}
