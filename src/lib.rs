//! Handle Discord Rich Presence party logic with ease.
//!
//! ```no_run
//! use std::time::Duration;
//! use discord_party::{DiscordClient, DiscordConfig, Party};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DiscordClient::connect(&DiscordConfig::new(1234567890)).await;
//! let mut party = Party::connect_or_detach(client, false)?;
//!
//! party.set_state("Looking for Players");
//! party.set_id("lobby-42");
//! party.set_join_secret("s3cret"); // must differ from the party id
//! party.set_size(1);
//! party.set_max(4);
//! party.commit().await?;
//!
//! // redraw the game window every half second while waiting
//! let secret = party
//!     .wait_for_player_join(|| {}, Duration::from_millis(500))
//!     .await?;
//! // join someone else's party with `secret`
//! # let _ = secret;
//! # Ok(())
//! # }
//! ```

pub mod discord;
mod error;
pub mod logging;
mod party;
pub mod presence;
pub mod settings;
pub mod watcher;

pub use discord::{DiscordClient, DiscordConfig, DiscordError};
pub use error::{PartyError, WatchError};
pub use party::Party;
pub use presence::{
    PartyActivity, PartySize, PresenceClient, ReceivedSecret, SecretKind, SecretReceiver, SecretSlot,
};
pub use settings::{Settings, SettingsError};
pub use watcher::{listen, JoinWatcher, WatchHandle};
