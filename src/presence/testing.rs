//! In-memory presence client for tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{PartyActivity, PresenceClient, SecretKind, SecretReceiver, SecretSlot};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("fake presence failure")]
pub struct FakeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Update,
    Clear,
}

#[derive(Default)]
pub struct FakeClient {
    updates: Mutex<Vec<PartyActivity>>,
    calls: Mutex<Vec<Call>>,
    join: SecretSlot,
    spectate: SecretSlot,
    fail_updates: AtomicBool,
    update_delay: Mutex<Option<Duration>>,
    disconnected: AtomicBool,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_join_secret(secret: &str) -> Self {
        let client = Self::new();
        client.set_join_secret(secret);
        client
    }

    /// Deliver a join secret, as Discord does when the player joins a party
    pub fn set_join_secret(&self, secret: &str) {
        self.join.deliver(secret);
    }

    pub fn clear_join_secret(&self) {
        self.join.clear();
    }

    pub fn set_spectate_secret(&self, secret: &str) {
        self.spectate.deliver(secret);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Make every update take `delay` before it lands
    pub fn slow_updates(&self, delay: Duration) {
        *self.update_delay.lock().unwrap() = Some(delay);
    }

    pub fn updates(&self) -> Vec<PartyActivity> {
        self.updates.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clears(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Clear).count()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PresenceClient for FakeClient {
    type Error = FakeError;

    fn name(&self) -> &'static str {
        "Fake"
    }

    async fn update_activity(&self, activity: &PartyActivity) -> Result<(), FakeError> {
        let delay = *self.update_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(FakeError);
        }
        self.updates.lock().unwrap().push(activity.clone());
        self.calls.lock().unwrap().push(Call::Update);
        Ok(())
    }

    async fn clear_activity(&self) -> Result<(), FakeError> {
        self.calls.lock().unwrap().push(Call::Clear);
        Ok(())
    }

    fn subscribe(&self, kind: SecretKind) -> SecretReceiver {
        match kind {
            SecretKind::Join => self.join.subscribe(),
            SecretKind::Spectate => self.spectate.subscribe(),
        }
    }

    async fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}
