use async_trait::async_trait;
use tokio::sync::watch;

use super::activity::PartyActivity;

/// Which secret a watcher reads from the presence client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    /// Secret delivered when the current player joins someone else's party
    Join,
    /// Secret delivered when the current player spectates someone else's game
    Spectate,
}

/// A secret pushed by the presence service.
///
/// `seq` grows with every delivery, so the same secret arriving twice is
/// still two events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedSecret {
    pub secret: String,
    pub seq: u64,
}

/// Latest secret of one kind, shared between a client and its readers
pub type SecretReceiver = watch::Receiver<Option<ReceivedSecret>>;

/// Trait for presence backends (Discord, or a fake in tests)
#[async_trait]
pub trait PresenceClient: Send + Sync + 'static {
    /// Error raised by the backend, handed back to callers unchanged
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the name of this presence client (for logging)
    fn name(&self) -> &'static str;

    /// Publish the full activity as a single update
    async fn update_activity(&self, activity: &PartyActivity) -> Result<(), Self::Error>;

    /// Remove the activity from the user's profile
    async fn clear_activity(&self) -> Result<(), Self::Error>;

    /// Follow the secrets of the given kind as the service delivers them
    fn subscribe(&self, kind: SecretKind) -> SecretReceiver;

    /// Most recent delivery of the given kind, if any
    fn received(&self, kind: SecretKind) -> Option<ReceivedSecret> {
        let secrets = self.subscribe(kind);
        let current = secrets.borrow().clone();
        current
    }

    /// Latest join secret received from the presence service, if any
    fn join_secret(&self) -> Option<String> {
        self.received(SecretKind::Join).map(|r| r.secret)
    }

    /// Latest spectate secret received from the presence service, if any
    fn spectate_secret(&self) -> Option<String> {
        self.received(SecretKind::Spectate).map(|r| r.secret)
    }

    /// Close the connection to the presence service
    async fn disconnect(&self) {}
}
