// Stop signal checked at every suspension point of the turn loop.
use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use crate::errors::{ScreenLoopError, ScreenLoopResult};

/// Cloneable handle that asks a running loop to stop.
#[derive(Clone)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        tracing::info!("stop requested");
        self.tx.send_replace(true);
    }
}

pub struct LoopController {
    rx: watch::Receiver<bool>,
    // Keeps the channel open when no StopHandle is held elsewhere.
    _tx: watch::Sender<bool>,
}

impl LoopController {
    pub fn new() -> (Self, StopHandle) {
        let (tx, rx) = watch::channel(false);
        let handle = StopHandle { tx: tx.clone() };
        (Self { rx, _tx: tx }, handle)
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Runs `fut` unless a stop arrives first, in which case `fut` is dropped.
    pub async fn guard<F, T>(&self, fut: F) -> ScreenLoopResult<T>
    where
        F: Future<Output = ScreenLoopResult<T>>,
    {
        if self.is_stopped() {
            return Err(ScreenLoopError::Cancelled);
        }
        let mut rx = self.rx.clone();
        tokio::select! {
            res = fut => res,
            _ = rx.wait_for(|stopped| *stopped) => Err(ScreenLoopError::Cancelled),
        }
    }

    pub async fn sleep(&self, duration: Duration) -> ScreenLoopResult<()> {
        if duration.is_zero() {
            return if self.is_stopped() { Err(ScreenLoopError::Cancelled) } else { Ok(()) };
        }
        self.guard(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guard_passes_results_through() {
        let (ctrl, _handle) = LoopController::new();
        let v = ctrl.guard(async { Ok::<_, ScreenLoopError>(7) }).await.unwrap();
        assert_eq!(v, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_a_pending_sleep() {
        let (ctrl, handle) = LoopController::new();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.stop();
        });
        let err = ctrl.sleep(Duration::from_secs(3600)).await.unwrap_err();
        assert!(matches!(err, ScreenLoopError::Cancelled));
        assert!(ctrl.is_stopped());
    }

    #[tokio::test]
    async fn stopped_controller_refuses_new_work() {
        let (ctrl, handle) = LoopController::new();
        handle.stop();
        let err = ctrl.guard(async { Ok::<_, ScreenLoopError>(()) }).await.unwrap_err();
        assert!(matches!(err, ScreenLoopError::Cancelled));
        assert!(ctrl.sleep(Duration::ZERO).await.is_err());
    }
}
