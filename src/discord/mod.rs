mod presence;

pub use presence::{
    build_activity, DiscordClient, DiscordConfig, DiscordError, HANDSHAKE_TIMEOUT,
};
