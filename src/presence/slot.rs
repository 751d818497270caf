use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use super::traits::{ReceivedSecret, SecretReceiver};

/// Sending side for one kind of secret.
///
/// Sequence numbers keep counting across [`clear`](Self::clear), so a
/// delivery after a clear never looks like the one before it.
pub struct SecretSlot {
    sender: watch::Sender<Option<ReceivedSecret>>,
    next_seq: AtomicU64,
}

impl SecretSlot {
    pub fn new() -> Self {
        Self {
            sender: watch::Sender::new(None),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Record a delivery and wake every subscriber
    pub fn deliver(&self, secret: impl Into<String>) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.sender.send_replace(Some(ReceivedSecret {
            secret: secret.into(),
            seq,
        }));
        seq
    }

    pub fn clear(&self) {
        self.sender.send_replace(None);
    }

    pub fn subscribe(&self) -> SecretReceiver {
        self.sender.subscribe()
    }
}

impl Default for SecretSlot {
    fn default() -> Self {
        Self::new()
    }
}
