//! Shared cancellation for concurrent readiness checks.

use async_channel::{Receiver, Sender};

/// Cloneable cancellation handle.
///
/// Cancelling closes an internal channel; every clone observes it.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Sender<()>,
    receiver: Receiver<()>,
}

impl CancelToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        let (sender, receiver) = async_channel::bounded(1);
        Self { sender, receiver }
    }

    /// Cancel the token. Idempotent.
    pub fn cancel(&self) {
        self.sender.close();
    }

    /// Whether the token has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.sender.is_closed()
    }

    /// Resolve once the token is cancelled
    pub async fn cancelled(&self) {
        // nothing is ever sent, so recv only returns once the channel closes
        let _ = self.receiver.recv().await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_is_observed_by_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_cancelled_resolves_after_cancel() {
        smol::block_on(async {
            let token = CancelToken::new();
            let waiter = token.clone();

            let task = smol::spawn(async move { waiter.cancelled().await });
            smol::Timer::after(Duration::from_millis(10)).await;
            token.cancel();

            task.await;
            assert!(token.is_cancelled());
        });
    }
}
