mod activity;
mod slot;
mod traits;

pub use activity::{PartyActivity, PartySize};
pub use slot::SecretSlot;
pub use traits::{PresenceClient, ReceivedSecret, SecretKind, SecretReceiver};

#[cfg(test)]
pub(crate) mod testing;
