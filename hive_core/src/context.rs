//! Cancellation and deadline propagation for core operations.
//!
//! Every remote call issued by the core is raced against the caller's
//! cancellation token and deadline, so an operation aborts at the next
//! remote call boundary rather than only at entry.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;
use crate::store::StoreError;

/// Per-operation cancellation token plus an optional deadline.
///
/// Cloning shares the token: cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    /// A context that is never cancelled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline_at(Instant::now() + timeout)
    }

    /// Replaces the deadline.
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Replaces the cancellation token, e.g. to tie the operation to a
    /// parent token owned by the caller.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` if there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Fails fast if the operation was cancelled or its deadline passed.
    pub fn check(&self) -> Result<(), CoreError> {
        if self.cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(CoreError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Store-side variant of [`check`](Self::check) for `RemoteStore`
    /// implementations.
    pub fn check_store(&self) -> Result<(), StoreError> {
        self.check().map_err(|err| match err {
            CoreError::DeadlineExceeded => StoreError::DeadlineExceeded,
            _ => StoreError::Cancelled,
        })
    }

    /// Runs one remote call, aborting it on cancellation or deadline expiry.
    ///
    /// Cancellation wins over a call that completes in the same poll.
    pub async fn run<F, T, E>(&self, call: F) -> Result<T, CoreError>
    where
        F: Future<Output = Result<T, E>>,
        CoreError: From<E>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CoreError::Cancelled),
            _ = deadline_elapsed(self.deadline) => Err(CoreError::DeadlineExceeded),
            res = call => res.map_err(CoreError::from),
        }
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_run_passes_result_through() {
        let ctx = OpContext::new();
        let value = ctx.run(async { Ok::<_, StoreError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_run_maps_store_errors() {
        let ctx = OpContext::new();
        let err = ctx
            .run(async { Err::<(), _>(StoreError::NotFound("x".into())) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_cancelled_before_call() {
        let ctx = OpContext::new();
        ctx.cancel();
        let err = ctx
            .run(async { Ok::<_, StoreError>(()) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_call() {
        let ctx = OpContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let err = ctx
            .run(std::future::pending::<Result<(), StoreError>>())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_deadline_interrupts_pending_call() {
        let ctx = OpContext::with_timeout(Duration::from_millis(10));
        let err = ctx
            .run(std::future::pending::<Result<(), StoreError>>())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_check_after_deadline() {
        let ctx = OpContext::new().deadline_at(Instant::now());
        assert_eq!(ctx.check().unwrap_err().kind(), ErrorKind::DeadlineExceeded);
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }
}
