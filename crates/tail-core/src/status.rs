//! Consumer session status reporting.

use tokio::sync::watch;

/// Lifecycle states of a consumer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerStatus {
    /// Session created, loop not yet tailing.
    Starting,
    /// Blocked on cursor I/O, delivering documents as they arrive.
    Tailing,
    /// Cursor lost or exhausted, waiting before reopening.
    Backoff,
    /// Stop requested, final checkpoint in progress.
    Stopping,
    /// Terminal.
    Stopped,
}

impl std::fmt::Display for ConsumerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConsumerStatus::Starting => "starting",
            ConsumerStatus::Tailing => "tailing",
            ConsumerStatus::Backoff => "backoff",
            ConsumerStatus::Stopping => "stopping",
            ConsumerStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Write half of a session's status channel, owned by the driver task.
#[derive(Debug)]
pub struct StatusPublisher {
    tx: watch::Sender<ConsumerStatus>,
}

impl StatusPublisher {
    pub fn channel() -> (Self, watch::Receiver<ConsumerStatus>) {
        let (tx, rx) = watch::channel(ConsumerStatus::Starting);
        (Self { tx }, rx)
    }

    pub fn set(&self, status: ConsumerStatus) {
        tracing::debug!(%status, "consumer status");
        // The receiver may already be gone when the owner dropped its handle.
        let _ = self.tx.send(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_transitions() {
        let (publisher, rx) = StatusPublisher::channel();
        assert_eq!(*rx.borrow(), ConsumerStatus::Starting);
        publisher.set(ConsumerStatus::Tailing);
        assert_eq!(*rx.borrow(), ConsumerStatus::Tailing);
        publisher.set(ConsumerStatus::Stopped);
        assert_eq!(*rx.borrow(), ConsumerStatus::Stopped);
    }

    #[test]
    fn survives_dropped_receiver() {
        let (publisher, rx) = StatusPublisher::channel();
        drop(rx);
        publisher.set(ConsumerStatus::Backoff);
    }
}
