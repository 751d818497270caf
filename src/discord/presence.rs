//! Discord Rich Presence integration using discord-sdk

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use discord_sdk::{
    activity::{events::ActivityEvent, ActivityBuilder, Assets, PartyPrivacy, Secrets},
    wheel::{ActivitySpoke, UserState, Wheel},
    Discord, Subscriptions,
};
use tokio::sync::{mpsc, oneshot};

use crate::presence::{PartyActivity, PresenceClient, SecretKind, SecretReceiver, SecretSlot};

/// Default timeout for waiting for Discord handshake
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("discord error: {0}")]
    Sdk(#[from] discord_sdk::Error),

    #[error("discord handshake timed out")]
    HandshakeTimeout,

    #[error("discord disconnected: {0}")]
    Disconnected(String),

    #[error("discord task is no longer running")]
    TaskClosed,
}

/// How to reach the local Discord client
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// ID of your Discord application, see https://discord.com/developers/applications
    pub app_id: i64,
    pub handshake_timeout: Duration,
}

impl DiscordConfig {
    pub fn new(app_id: i64) -> Self {
        Self {
            app_id,
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }
}

type Reply = oneshot::Sender<Result<(), discord_sdk::Error>>;

enum Command {
    Update(Box<ActivityBuilder>, Reply),
    Clear(Reply),
    Disconnect(oneshot::Sender<()>),
}

/// Presence client talking to the local Discord app.
///
/// The `Discord` handle lives on a background task; this type only holds the
/// command channel and the latest secrets pushed by Discord.
pub struct DiscordClient {
    commands: mpsc::UnboundedSender<Command>,
    join_secret: SecretReceiver,
    spectate_secret: SecretReceiver,
}

impl DiscordClient {
    /// Attempt to connect to Discord and wait for the handshake
    pub async fn connect(config: &DiscordConfig) -> Result<Self, DiscordError> {
        let (wheel, handler) = Wheel::new(Box::new(|err| {
            tracing::warn!("Discord error: {:?}", err);
        }));

        let mut user_spoke = wheel.user();
        let activity_spoke = wheel.activity();

        let discord = Discord::new(config.app_id, Subscriptions::ACTIVITY, Box::new(handler))?;

        tracing::info!("Discord connecting...");

        let user = match tokio::time::timeout(config.handshake_timeout, async {
            if user_spoke.0.changed().await.is_err() {
                Err(DiscordError::Disconnected(
                    "Discord connection closed".to_string(),
                ))
            } else {
                match &*user_spoke.0.borrow() {
                    UserState::Connected(user) => Ok(user.clone()),
                    UserState::Disconnected(err) => {
                        Err(DiscordError::Disconnected(format!("{:?}", err)))
                    }
                }
            }
        })
        .await
        {
            Ok(Ok(user)) => user,
            Ok(Err(e)) => {
                discord.disconnect().await;
                return Err(e);
            }
            Err(_) => {
                discord.disconnect().await;
                return Err(DiscordError::HandshakeTimeout);
            }
        };

        tracing::info!(
            "Discord Rich Presence connected as {}#{}",
            user.username,
            user.discriminator.unwrap_or(0)
        );

        let (commands, command_rx) = mpsc::unbounded_channel();
        let secrets = SecretSenders::default();
        let join_secret = secrets.join.subscribe();
        let spectate_secret = secrets.spectate.subscribe();

        tokio::spawn(Self::run_discord_task(
            discord,
            command_rx,
            activity_spoke,
            secrets,
        ));

        Ok(Self {
            commands,
            join_secret,
            spectate_secret,
        })
    }

    /// Background task that owns the Discord handle, applies activity
    /// commands and records secrets from activity events
    async fn run_discord_task(
        discord: Discord,
        mut command_rx: mpsc::UnboundedReceiver<Command>,
        mut activity_spoke: ActivitySpoke,
        secrets: SecretSenders,
    ) {
        let mut events_open = true;
        let mut disconnected = None;

        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    let Some(command) = command else { break };
                    match command {
                        Command::Update(activity, reply) => {
                            let result = discord.update_activity(*activity).await.map(|_| ());
                            let _ = reply.send(result);
                        }
                        Command::Clear(reply) => {
                            let result = discord.clear_activity().await.map(|_| ());
                            let _ = reply.send(result);
                        }
                        Command::Disconnect(reply) => {
                            disconnected = Some(reply);
                            break;
                        }
                    }
                }
                event = activity_spoke.0.recv(), if events_open => {
                    match event {
                        Ok(event) => secrets.record(event),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                            tracing::debug!("Missed {} Discord activity events", missed);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            tracing::debug!("Discord activity events closed");
                            events_open = false;
                        }
                    }
                }
            }
        }

        discord.disconnect().await;
        tracing::info!("Discord Rich Presence disconnected");

        if let Some(reply) = disconnected {
            let _ = reply.send(());
        }
    }

    async fn send(
        &self,
        make: impl FnOnce(Reply) -> Command,
    ) -> Result<(), DiscordError> {
        let (reply, result) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| DiscordError::TaskClosed)?;
        result.await.map_err(|_| DiscordError::TaskClosed)??;
        Ok(())
    }
}

/// Owned by the Discord task; subscribers see their channel close when it ends
#[derive(Default)]
struct SecretSenders {
    join: SecretSlot,
    spectate: SecretSlot,
}

impl SecretSenders {
    fn record(&self, event: ActivityEvent) {
        match event {
            ActivityEvent::Join(join) => {
                tracing::info!("Discord asked us to join a party");
                self.join.deliver(join.secret);
            }
            ActivityEvent::Spectate(spectate) => {
                tracing::info!("Discord asked us to spectate a game");
                self.spectate.deliver(spectate.secret);
            }
            other => {
                tracing::debug!("Ignoring Discord activity event: {:?}", other);
            }
        }
    }
}

/// Translate party fields into a Discord activity
pub fn build_activity(activity: &PartyActivity) -> ActivityBuilder {
    let mut builder = ActivityBuilder::new();

    if let Some(state) = &activity.state {
        builder = builder.state(state);
    }
    if let Some(details) = &activity.details {
        builder = builder.details(details);
    }

    if let Some(id) = &activity.party_id {
        let (current, max) = party_size(activity);
        builder = builder.party(id, current, max, PartyPrivacy::Private);
    }

    if activity.join_secret.is_some() || activity.spectate_secret.is_some() {
        builder = builder.secrets(Secrets {
            join: activity.join_secret.clone(),
            spectate: activity.spectate_secret.clone(),
            ..Default::default()
        });
    }

    if let Some(start) = activity.start {
        builder = builder.start_timestamp(start);
    }
    if let Some(end) = activity.end {
        builder = builder.end_timestamp(end);
    }

    if activity.large_image.is_some() || activity.small_image.is_some() {
        let mut assets = Assets::default();
        if let Some(image) = &activity.large_image {
            assets = assets.large(image, activity.large_text.as_deref());
        }
        if let Some(image) = &activity.small_image {
            assets = assets.small(image, activity.small_text.as_deref());
        }
        builder = builder.assets(assets);
    }

    builder
}

/// Discord drops party sizes of zero, so they are sent as absent
fn party_size(activity: &PartyActivity) -> (Option<NonZeroU32>, Option<NonZeroU32>) {
    match activity.party_size {
        Some(size) => (NonZeroU32::new(size.current), NonZeroU32::new(size.max)),
        None => (None, None),
    }
}

#[async_trait]
impl PresenceClient for DiscordClient {
    type Error = DiscordError;

    fn name(&self) -> &'static str {
        "Discord"
    }

    async fn update_activity(&self, activity: &PartyActivity) -> Result<(), DiscordError> {
        let builder = Box::new(build_activity(activity));
        self.send(|reply| Command::Update(builder, reply)).await
    }

    async fn clear_activity(&self) -> Result<(), DiscordError> {
        self.send(Command::Clear).await
    }

    fn subscribe(&self, kind: SecretKind) -> SecretReceiver {
        match kind {
            SecretKind::Join => self.join_secret.clone(),
            SecretKind::Spectate => self.spectate_secret.clone(),
        }
    }

    async fn disconnect(&self) {
        let (reply, done) = oneshot::channel();
        if self.commands.send(Command::Disconnect(reply)).is_ok() {
            let _ = done.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::PartySize;
    use crate::Party;
    use discord_sdk::activity::{events::SecretEvent, ActivityArgs};
    use serde_json::{json, Value};

    /// Client whose commands are answered by a stand-in for the Discord task
    fn offline_client() -> (DiscordClient, SecretSenders) {
        let secrets = SecretSenders::default();
        let (commands, mut command_rx) = mpsc::unbounded_channel();
        let client = DiscordClient {
            commands,
            join_secret: secrets.join.subscribe(),
            spectate_secret: secrets.spectate.subscribe(),
        };

        tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                match command {
                    Command::Update(_, reply) | Command::Clear(reply) => {
                        let _ = reply.send(Ok(()));
                    }
                    Command::Disconnect(reply) => {
                        let _ = reply.send(());
                        break;
                    }
                }
            }
        });

        (client, secrets)
    }

    fn join(secret: &str) -> ActivityEvent {
        ActivityEvent::Join(SecretEvent {
            secret: secret.to_string(),
        })
    }

    /// What discord-sdk would put on the wire for this activity
    fn wire_activity(activity: &PartyActivity) -> Value {
        let args = ActivityArgs::from(build_activity(activity));
        serde_json::to_value(args.activity).unwrap()
    }

    #[test]
    fn test_party_size_drops_zero() {
        let mut activity = PartyActivity::default();
        assert_eq!(party_size(&activity), (None, None));

        activity.party_size = Some(PartySize::new(0, 4));
        assert_eq!(party_size(&activity), (None, NonZeroU32::new(4)));

        activity.party_size = Some(PartySize::new(2, 4));
        assert_eq!(party_size(&activity), (NonZeroU32::new(2), NonZeroU32::new(4)));
    }

    #[test]
    fn test_default_config() {
        let config = DiscordConfig::new(1383904378154651768);
        assert_eq!(config.app_id, 1383904378154651768);
        assert_eq!(config.handshake_timeout, HANDSHAKE_TIMEOUT);
    }

    #[test]
    fn test_build_activity_party_needs_id() {
        let mut activity = PartyActivity {
            state: Some("Looking for Players".to_string()),
            ..Default::default()
        };
        activity.set_size(1);
        activity.set_max(4);

        let wire = wire_activity(&activity);
        assert_eq!(wire["state"], "Looking for Players");
        assert!(wire.get("party").is_none());

        activity.party_id = Some("lobby-42".to_string());
        let wire = wire_activity(&activity);
        assert_eq!(wire["party"]["id"], "lobby-42");
        assert_eq!(wire["party"]["size"], json!([1, 4]));
        assert_eq!(wire["party"]["privacy"], 0);
    }

    #[test]
    fn test_build_activity_secrets() {
        let wire = wire_activity(&PartyActivity {
            party_id: Some("lobby-42".to_string()),
            join_secret: Some("join-me".to_string()),
            spectate_secret: Some("watch-me".to_string()),
            ..Default::default()
        });
        assert_eq!(
            wire["secrets"],
            json!({ "join": "join-me", "spectate": "watch-me" })
        );

        let wire = wire_activity(&PartyActivity {
            join_secret: Some("join-me".to_string()),
            ..Default::default()
        });
        assert_eq!(wire["secrets"], json!({ "join": "join-me" }));

        let wire = wire_activity(&PartyActivity {
            state: Some("Solo".to_string()),
            ..Default::default()
        });
        assert!(wire.get("secrets").is_none());
    }

    #[test]
    fn test_build_activity_assets_and_timestamps() {
        let wire = wire_activity(&PartyActivity {
            large_image: Some("logo".to_string()),
            large_text: Some("Colonial Marines".to_string()),
            small_image: Some("rank".to_string()),
            start: Some(1_700_000_000),
            end: Some(1_700_003_600),
            ..Default::default()
        });

        assert_eq!(
            wire["assets"],
            json!({
                "large_image": "logo",
                "large_text": "Colonial Marines",
                "small_image": "rank",
            })
        );
        assert_eq!(
            wire["timestamps"],
            json!({ "start": 1_700_000_000i64, "end": 1_700_003_600i64 })
        );
    }

    #[test]
    fn test_empty_activity_has_no_optional_sections() {
        let wire = wire_activity(&PartyActivity::default());
        for key in ["state", "details", "party", "secrets", "assets", "timestamps"] {
            assert!(wire.get(key).is_none(), "unexpected {}", key);
        }
    }

    #[tokio::test]
    async fn test_secrets_are_recorded() {
        let (client, secrets) = offline_client();
        assert_eq!(client.join_secret(), None);

        secrets.record(join("party-secret"));
        secrets.record(ActivityEvent::Spectate(SecretEvent {
            secret: "watch-secret".to_string(),
        }));

        assert_eq!(client.join_secret().as_deref(), Some("party-secret"));
        assert_eq!(client.spectate_secret().as_deref(), Some("watch-secret"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejoining_same_party_ends_wait() {
        let (client, secrets) = offline_client();
        secrets.record(join("lobby-7"));

        let party = Party::new(client);
        let mut ticks = 0;
        let secret = tokio::time::timeout(
            Duration::from_secs(60),
            party.wait_for_player_join(
                || {
                    ticks += 1;
                    if ticks == 2 {
                        secrets.record(join("lobby-7"));
                    }
                },
                Duration::from_millis(500),
            ),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(secret, "lobby-7");
        assert_eq!(ticks, 2);
    }

    #[tokio::test]
    async fn test_update_fails_when_task_is_gone() {
        let secrets = SecretSenders::default();
        let (commands, command_rx) = mpsc::unbounded_channel();
        drop(command_rx);
        let client = DiscordClient {
            commands,
            join_secret: secrets.join.subscribe(),
            spectate_secret: secrets.spectate.subscribe(),
        };

        let result = client.update_activity(&PartyActivity::default()).await;
        assert!(matches!(result, Err(DiscordError::TaskClosed)));
    }
}
