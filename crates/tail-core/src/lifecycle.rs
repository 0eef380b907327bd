//! Background task ownership for consumer loops.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// Handle to a consumer loop running on its own tokio task.
///
/// Stopping is cooperative: the token is cancelled and the task joined, so by
/// the time [`ConsumerHandle::stop`] returns the loop has exited and written
/// its final checkpoint.
#[derive(Debug)]
pub struct ConsumerHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl ConsumerHandle {
    /// Launch a consumer loop. The closure receives the cancellation token the
    /// loop must observe between document deliveries.
    pub fn spawn<F>(make: impl FnOnce(CancellationToken) -> F) -> Self
    where
        F: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(make(cancel.clone()));
        Self { cancel, task }
    }

    /// True once the loop has exited on its own, e.g. after a fatal error.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the loop to stop at its next safe point and wait for it.
    pub async fn stop(self) -> anyhow::Result<()> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| anyhow::anyhow!("consumer task aborted: {e}"))??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_joins_the_loop() {
        let ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let ran_in_task = ran.clone();
        let handle = ConsumerHandle::spawn(|cancel| async move {
            cancel.cancelled().await;
            ran_in_task.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        });
        handle.stop().await.unwrap();
        assert!(ran.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn stop_surfaces_the_loop_error() {
        let handle = ConsumerHandle::spawn(|_cancel| async move {
            Err(crate::TailError::config("bad increasing field"))
        });
        let err = handle.stop().await.unwrap_err();
        assert!(err.to_string().contains("bad increasing field"));
    }

    #[tokio::test]
    async fn is_finished_tracks_exit() {
        let handle = ConsumerHandle::spawn(|_cancel| async move { Ok(()) });
        tokio::task::yield_now().await;
        // The task has no awaits before returning, one yield is enough.
        assert!(handle.is_finished());
        handle.stop().await.unwrap();
    }
}
