//! Polls the presence client for a new join (or spectate) secret, or
//! follows every delivery with a callback

use std::future::{self, Future};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::WatchError;
use crate::presence::{PresenceClient, SecretKind};

/// Poll interval used when the caller does not pick one
pub const DEFAULT_TICK_DELAY: Duration = Duration::from_millis(500);

/// Waits until the presence client delivers a secret after the one it held
/// when the watch began.
///
/// Each tick sleeps for `delay`, runs `on_tick`, then reads the latest
/// delivery. A delivery counts even if it repeats the previous secret; a
/// secret being cleared does not. Without [`max_wait`](Self::max_wait) the
/// watch only ends on a delivery or cancellation.
pub struct JoinWatcher<C> {
    client: Arc<C>,
    kind: SecretKind,
    delay: Duration,
    max_wait: Option<Duration>,
    cancel: CancellationToken,
}

impl<C: PresenceClient> JoinWatcher<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            kind: SecretKind::Join,
            delay: DEFAULT_TICK_DELAY,
            max_wait: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    pub fn kind(mut self, kind: SecretKind) -> Self {
        self.kind = kind;
        self
    }

    /// Tie this watch to an existing token, e.g. a child of an app-wide one
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the watch on the current task
    pub async fn wait<F>(&self, mut on_tick: F) -> Result<String, WatchError>
    where
        F: FnMut(),
    {
        self.wait_async(move || {
            on_tick();
            future::ready(())
        })
        .await
    }

    /// Run the watch on the current task, awaiting `on_tick` on every tick.
    /// Cancelling the watch also abandons a tick that is still running.
    pub async fn wait_async<F, Fut>(&self, mut on_tick: F) -> Result<String, WatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let baseline = self.client.received(self.kind).map(|r| r.seq);
        let started = Instant::now();
        let mut ticks: u64 = 0;

        tracing::debug!(
            "Watching {} for a new {:?} secret every {:?}",
            self.client.name(),
            self.kind,
            self.delay
        );

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(self.cancelled(ticks)),
                _ = tokio::time::sleep(self.delay) => {}
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(self.cancelled(ticks)),
                _ = on_tick() => {}
            }
            ticks += 1;

            if let Some(received) = self.client.received(self.kind) {
                if baseline != Some(received.seq) {
                    tracing::info!("New {:?} secret observed after {} ticks", self.kind, ticks);
                    return Ok(received.secret);
                }
            }

            if let Some(max_wait) = self.max_wait {
                let waited = started.elapsed();
                if waited >= max_wait {
                    tracing::debug!("Secret watch timed out after {:?}", waited);
                    return Err(WatchError::Timeout { waited, ticks });
                }
            }
        }
    }

    fn cancelled(&self, ticks: u64) -> WatchError {
        tracing::debug!("Secret watch cancelled after {} ticks", ticks);
        WatchError::Cancelled
    }

    /// Run the watch on a tokio task, returning a handle that can cancel it
    pub fn spawn<F>(self, on_tick: F) -> WatchHandle
    where
        F: FnMut() + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let task = tokio::spawn(async move { self.wait(on_tick).await });
        WatchHandle { cancel, task }
    }

    /// [`spawn`](Self::spawn) with an async tick callback
    pub fn spawn_async<F, Fut>(self, on_tick: F) -> WatchHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let cancel = self.cancel.clone();
        let task = tokio::spawn(async move { self.wait_async(on_tick).await });
        WatchHandle { cancel, task }
    }
}

/// Call `handler` with every secret of `kind` the client delivers from now on.
///
/// Runs until cancelled, or until the client stops delivering (its channel
/// closes), in which case the handle yields the number of secrets handled.
/// Deliveries that land before the listener task next runs are coalesced
/// into the latest one.
pub fn listen<C, F>(client: &C, kind: SecretKind, mut handler: F) -> WatchHandle<u64>
where
    C: PresenceClient,
    F: FnMut(String) + Send + 'static,
{
    let mut secrets = client.subscribe(kind);
    let mut last_seq = secrets.borrow_and_update().as_ref().map(|r| r.seq);
    let name = client.name();
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut handled: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(WatchError::Cancelled),
                changed = secrets.changed() => {
                    if changed.is_err() {
                        tracing::debug!("{} stopped delivering {:?} secrets", name, kind);
                        return Ok(handled);
                    }
                }
            }

            let current = secrets.borrow_and_update().clone();
            if let Some(received) = current {
                if last_seq != Some(received.seq) {
                    last_seq = Some(received.seq);
                    handled += 1;
                    handler(received.secret);
                }
            }
        }
    });

    WatchHandle { cancel, task }
}

/// Handle to a spawned watch or listener.
///
/// Dropping the handle detaches the task; call [`cancel`](Self::cancel) to stop it.
pub struct WatchHandle<T = String> {
    cancel: CancellationToken,
    task: JoinHandle<Result<T, WatchError>>,
}

impl<T> WatchHandle<T> {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to end
    pub async fn join(self) -> Result<T, WatchError> {
        self.task.await?
    }
}
