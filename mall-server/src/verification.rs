//! SMS verification codes
//!
//! `sms_{mobile}` holds the current code for `code_ttl` seconds and
//! `send_flag_{mobile}` blocks another send for `interval` seconds. The flag
//! is claimed with SET NX, so two concurrent requests cannot both send.

use std::sync::Arc;

use shared::error::{AppError, ErrorCode};

use crate::cache::{KvStore, send_flag_key, sms_code_key};
use crate::error::ServiceResult;
use crate::tasks::{Task, TaskQueue};
use crate::util::{generate_code, is_valid_mobile};

#[derive(Clone)]
pub struct SmsCodeService {
    kv: Arc<dyn KvStore>,
    queue: TaskQueue,
    code_ttl_secs: u64,
    interval_secs: u64,
}

impl SmsCodeService {
    pub fn new(
        kv: Arc<dyn KvStore>,
        queue: TaskQueue,
        code_ttl_secs: u64,
        interval_secs: u64,
    ) -> Self {
        Self {
            kv,
            queue,
            code_ttl_secs,
            interval_secs,
        }
    }

    /// Issue a fresh code and queue its delivery.
    ///
    /// Fails with `SmsRateLimited` inside the send interval. Delivery happens
    /// in the background; a dropped task is only logged.
    pub async fn request_code(&self, mobile: &str) -> ServiceResult<()> {
        if !is_valid_mobile(mobile) {
            return Err(AppError::new(ErrorCode::MobileInvalid)
                .with_detail("mobile", mobile)
                .into());
        }

        let claimed = self
            .kv
            .set_nx_ex(&send_flag_key(mobile), "1", self.interval_secs)
            .await?;
        if !claimed {
            tracing::info!(mobile, "SMS code requested inside send interval");
            return Err(AppError::rate_limited().into());
        }

        let code = generate_code();
        self.kv
            .set_ex(&sms_code_key(mobile), &code, self.code_ttl_secs)
            .await?;

        if !self.queue.enqueue(Task::SendSmsCode {
            mobile: mobile.to_string(),
            code,
        }) {
            tracing::error!(mobile, "SMS code stored but delivery was not queued");
        }
        Ok(())
    }

    /// Compare `code` with the cached one for `mobile`
    pub async fn check_code(&self, mobile: &str, code: &str) -> ServiceResult<()> {
        let Some(expected) = self.kv.get(&sms_code_key(mobile)).await? else {
            return Err(AppError::new(ErrorCode::SmsCodeExpired).into());
        };
        if expected != code.trim() {
            return Err(AppError::new(ErrorCode::SmsCodeInvalid).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryKv;
    use crate::error::ServiceError;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const MOBILE: &str = "13800138000";

    fn service() -> (SmsCodeService, mpsc::Receiver<Task>) {
        let (queue, rx) = TaskQueue::new(8);
        (
            SmsCodeService::new(Arc::new(MemoryKv::new()), queue, 300, 60),
            rx,
        )
    }

    fn code_of(err: ServiceError) -> ErrorCode {
        match err {
            ServiceError::App(e) => e.code,
            ServiceError::Db(e) => panic!("unexpected storage error: {e}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_request_inside_interval_is_rate_limited() {
        let (service, mut rx) = service();
        service.request_code(MOBILE).await.unwrap();

        let err = service.request_code(MOBILE).await.unwrap_err();
        assert_eq!(code_of(err), ErrorCode::SmsRateLimited);

        let first = rx.try_recv().unwrap();
        assert!(matches!(first, Task::SendSmsCode { ref mobile, .. } if mobile == MOBILE));
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(61)).await;
        service.request_code(MOBILE).await.unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_check_code() {
        let (service, mut rx) = service();
        service.request_code(MOBILE).await.unwrap();
        let Some(Task::SendSmsCode { code, .. }) = rx.recv().await else {
            panic!("no delivery queued");
        };

        service.check_code(MOBILE, &code).await.unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };
        assert_eq!(
            code_of(service.check_code(MOBILE, wrong).await.unwrap_err()),
            ErrorCode::SmsCodeInvalid
        );
        assert_eq!(
            code_of(service.check_code("13900139000", &code).await.unwrap_err()),
            ErrorCode::SmsCodeExpired
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_code_expires() {
        let (service, mut rx) = service();
        service.request_code(MOBILE).await.unwrap();
        let Some(Task::SendSmsCode { code, .. }) = rx.recv().await else {
            panic!("no delivery queued");
        };

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(
            code_of(service.check_code(MOBILE, &code).await.unwrap_err()),
            ErrorCode::SmsCodeExpired
        );
    }

    #[tokio::test]
    async fn test_invalid_mobile_is_rejected() {
        let (service, mut rx) = service();
        assert_eq!(
            code_of(service.request_code("12345").await.unwrap_err()),
            ErrorCode::MobileInvalid
        );
        assert!(rx.try_recv().is_err());
    }
}
