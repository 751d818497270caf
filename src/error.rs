use std::time::Duration;

/// Why a secret watch ended without a new secret
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("no new secret after {ticks} ticks ({waited:?})")]
    Timeout { waited: Duration, ticks: u64 },

    #[error("secret watch was cancelled")]
    Cancelled,

    #[error("secret watch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors from [`Party`](crate::Party) operations that involve more than a commit
#[derive(Debug, thiserror::Error)]
pub enum PartyError<E> {
    #[error(transparent)]
    Client(E),

    #[error("party is not connected to a presence client")]
    NotConnected,

    #[error(transparent)]
    Watch(#[from] WatchError),
}
