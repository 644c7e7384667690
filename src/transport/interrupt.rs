//! Run-wide Ctrl-C flag.

use std::sync::Arc;
use tokio::sync::watch;

/// Set once when the user interrupts; shared by the transport and the
/// orchestrator.
///
/// Tokio keeps a signal handler installed for the life of the process once
/// `ctrl_c()` has been awaited, so there is exactly one listener per run and
/// everything else reads this flag.
#[derive(Debug, Clone)]
pub struct Interrupt {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for Interrupt {
    fn default() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }
}

impl Interrupt {
    /// A flag raised by the first Ctrl-C.
    ///
    /// Must be called from within a tokio runtime.
    pub fn ctrl_c() -> Self {
        let interrupt = Self::default();
        let flag = interrupt.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping after cleanup");
                flag.trigger();
            }
        });
        interrupt
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_set(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the flag is raised.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as `self`, so this only returns once set
        let _ = rx.wait_for(|set| *set).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_starts_clear() {
        assert!(!Interrupt::default().is_set());
    }

    #[test]
    fn test_trigger_is_seen_by_clones() {
        let interrupt = Interrupt::default();
        let other = interrupt.clone();
        interrupt.trigger();
        assert!(other.is_set());
    }

    #[tokio::test]
    async fn test_wait_returns_after_trigger() {
        let interrupt = Interrupt::default();
        let waiter = interrupt.clone();
        let handle = tokio::spawn(async move { waiter.wait().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());
        interrupt.trigger();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_on_raised_flag_is_immediate() {
        let interrupt = Interrupt::default();
        interrupt.trigger();
        tokio::time::timeout(Duration::from_millis(100), interrupt.wait())
            .await
            .unwrap();
    }
}
