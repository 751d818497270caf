//! The party object: a handful of presence fields and the calls that publish them

use std::future::{self, Future};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::PartyError;
use crate::presence::{PartyActivity, PresenceClient, SecretKind};
use crate::watcher::{self, JoinWatcher, WatchHandle};

struct UpdateLoop {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Represents the party.
///
/// Field setters only change local state; nothing reaches the presence
/// service until [`commit`](Self::commit) (or the update loop) runs.
/// A party without a client is *detached*: commits are silent no-ops so
/// callers don't have to care whether Discord is running.
pub struct Party<C: PresenceClient> {
    client: Option<Arc<C>>,
    activity: watch::Sender<PartyActivity>,
    updating: Option<UpdateLoop>,
}

impl<C: PresenceClient> Party<C> {
    pub fn new(client: C) -> Self {
        Self::from_arc(Arc::new(client))
    }

    pub fn from_arc(client: Arc<C>) -> Self {
        Self {
            client: Some(client),
            activity: watch::Sender::new(PartyActivity::default()),
            updating: None,
        }
    }

    pub fn detached() -> Self {
        Self {
            client: None,
            activity: watch::Sender::new(PartyActivity::default()),
            updating: None,
        }
    }

    /// Build a party from a connection attempt.
    ///
    /// A failed attempt yields a detached party unless `raise_on_fail` is set,
    /// in which case the connection error is returned.
    pub fn connect_or_detach<E>(result: Result<C, E>, raise_on_fail: bool) -> Result<Self, E>
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(client) => Ok(Self::new(client)),
            Err(e) if raise_on_fail => Err(e),
            Err(e) => {
                tracing::warn!("Presence client not available, party is detached: {}", e);
                Ok(Self::detached())
            }
        }
    }

    /// Returns true if a presence client is attached
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    pub fn client(&self) -> Option<&Arc<C>> {
        self.client.as_ref()
    }

    /// Snapshot of everything that the next commit will send
    pub fn activity(&self) -> PartyActivity {
        self.activity.borrow().clone()
    }

    /// Change any activity field
    pub fn edit(&mut self, f: impl FnOnce(&mut PartyActivity)) {
        self.activity.send_modify(f);
    }

    pub fn state(&self) -> Option<String> {
        self.activity.borrow().state.clone()
    }

    pub fn set_state(&mut self, state: impl Into<String>) {
        let state = state.into();
        self.edit(|a| a.state = Some(state));
    }

    pub fn id(&self) -> Option<String> {
        self.activity.borrow().party_id.clone()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.edit(|a| a.party_id = Some(id));
    }

    pub fn join_secret(&self) -> Option<String> {
        self.activity.borrow().join_secret.clone()
    }

    pub fn set_join_secret(&mut self, secret: impl Into<String>) {
        let secret = secret.into();
        self.edit(|a| a.join_secret = Some(secret));
    }

    pub fn size(&self) -> Option<u32> {
        self.activity.borrow().size()
    }

    pub fn set_size(&mut self, size: u32) {
        self.edit(|a| a.set_size(size));
    }

    pub fn max(&self) -> Option<u32> {
        self.activity.borrow().max()
    }

    pub fn set_max(&mut self, max: u32) {
        self.edit(|a| a.set_max(max));
    }

    /// Send the current fields to the presence service as one update
    pub async fn commit(&self) -> Result<(), C::Error> {
        let Some(client) = &self.client else {
            tracing::debug!("Party is detached, skipping commit");
            return Ok(());
        };

        let activity = self.activity();
        for warning in activity.warnings() {
            tracing::warn!("Committing party anyway: {}", warning);
        }

        tracing::debug!("Committing party to {}: {:?}", client.name(), activity);
        client.update_activity(&activity).await
    }

    /// Commit the live fields every `interval` on a background task.
    /// Replaces any loop that is already running.
    pub fn start_update_loop(&mut self, interval: Duration) {
        self.stop_update_loop();

        let Some(client) = self.client.clone() else {
            tracing::debug!("Party is detached, not starting update loop");
            return;
        };

        let mut activity = self.activity.subscribe();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            loop {
                let snapshot = activity.borrow_and_update().clone();
                if let Err(e) = client.update_activity(&snapshot).await {
                    tracing::warn!("Failed to update {} activity: {}", client.name(), e);
                }

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            tracing::debug!("Party update loop stopped");
        });

        tracing::info!("Started party update loop every {:?}", interval);
        self.updating = Some(UpdateLoop { cancel, task });
    }

    pub fn stop_update_loop(&mut self) {
        if let Some(update_loop) = self.updating.take() {
            update_loop.cancel.cancel();
        }
    }

    pub fn is_updating(&self) -> bool {
        self.updating
            .as_ref()
            .is_some_and(|update_loop| !update_loop.task.is_finished())
    }

    /// A watcher bound to this party's client, for callers that want a
    /// timeout or a spawned watch
    pub fn watcher(&self) -> Option<JoinWatcher<C>> {
        self.client.clone().map(JoinWatcher::new)
    }

    /// Wait until *the current player* joins someone else's party.
    ///
    /// Commits the party, then calls `on_tick` every `delay` until the
    /// client reports a new join secret, which is returned.
    pub async fn wait_for_player_join<F>(
        &self,
        mut on_tick: F,
        delay: Duration,
    ) -> Result<String, PartyError<C::Error>>
    where
        F: FnMut(),
    {
        let on_tick = move || {
            on_tick();
            future::ready(())
        };
        self.wait_for_secret(SecretKind::Join, on_tick, delay).await
    }

    /// [`wait_for_player_join`](Self::wait_for_player_join) with an async
    /// tick callback, awaited once per tick
    pub async fn wait_for_player_join_async<F, Fut>(
        &self,
        on_tick: F,
        delay: Duration,
    ) -> Result<String, PartyError<C::Error>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        self.wait_for_secret(SecretKind::Join, on_tick, delay).await
    }

    /// Like [`wait_for_player_join`](Self::wait_for_player_join), for when
    /// the current player starts spectating someone else's game
    pub async fn wait_for_spectate<F>(
        &self,
        mut on_tick: F,
        delay: Duration,
    ) -> Result<String, PartyError<C::Error>>
    where
        F: FnMut(),
    {
        let on_tick = move || {
            on_tick();
            future::ready(())
        };
        self.wait_for_secret(SecretKind::Spectate, on_tick, delay).await
    }

    async fn wait_for_secret<F, Fut>(
        &self,
        kind: SecretKind,
        on_tick: F,
        delay: Duration,
    ) -> Result<String, PartyError<C::Error>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let client = self
            .client
            .clone()
            .ok_or(PartyError::<C::Error>::NotConnected)?;
        self.commit().await.map_err(PartyError::Client)?;

        let secret = JoinWatcher::new(client)
            .kind(kind)
            .delay(delay)
            .wait_async(on_tick)
            .await?;
        Ok(secret)
    }

    /// Call `handler` every time the current player joins a party, until
    /// the returned handle is cancelled
    pub fn on_player_join<F>(&self, handler: F) -> Result<WatchHandle<u64>, PartyError<C::Error>>
    where
        F: FnMut(String) + Send + 'static,
    {
        self.listen(SecretKind::Join, handler)
    }

    /// Call `handler` every time the current player starts spectating
    pub fn on_spectate<F>(&self, handler: F) -> Result<WatchHandle<u64>, PartyError<C::Error>>
    where
        F: FnMut(String) + Send + 'static,
    {
        self.listen(SecretKind::Spectate, handler)
    }

    fn listen<F>(&self, kind: SecretKind, handler: F) -> Result<WatchHandle<u64>, PartyError<C::Error>>
    where
        F: FnMut(String) + Send + 'static,
    {
        let client = self.client.as_ref().ok_or(PartyError::<C::Error>::NotConnected)?;
        tracing::debug!("Listening for {:?} secrets from {}", kind, client.name());
        Ok(watcher::listen(client.as_ref(), kind, handler))
    }

    /// Close the connection to the presence service. Goodbye.
    /// Stops the update loop first, letting an update already in flight
    /// land before the clear; the party is detached afterwards.
    pub async fn close(&mut self) {
        if let Some(update_loop) = self.updating.take() {
            update_loop.cancel.cancel();
            if let Err(e) = update_loop.task.await {
                tracing::debug!("Party update loop ended abnormally: {}", e);
            }
        }

        if let Some(client) = self.client.take() {
            if let Err(e) = client.clear_activity().await {
                tracing::debug!("Failed to clear {} activity: {}", client.name(), e);
            }
            client.disconnect().await;
            tracing::info!("{} presence closed", client.name());
        }
    }
}

impl<C: PresenceClient> Drop for Party<C> {
    fn drop(&mut self) {
        self.stop_update_loop();
    }
}
