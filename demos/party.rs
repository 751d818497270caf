//! Advertise a party on Discord and wait until the player joins someone else's.
//!
//! Run with `DISCORD_PARTY_CLIENT_ID=<application id> cargo run --example party`.

use std::time::Duration;

use discord_party::{logging, DiscordClient, Party, PartyError, Settings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = logging::init_logging(&logging::LogOptions::default());

    let settings = Settings::load(&Settings::default_path())?;
    let client = DiscordClient::connect(&settings.discord_config()).await;
    let mut party = Party::connect_or_detach(client, settings.raise_on_fail)?;

    if !party.is_connected() {
        tracing::warn!("Discord is not running, nothing to wait for");
        return Ok(());
    }

    party.set_state("Looking for Players");
    party.set_id(format!("party-{}", std::process::id()));
    party.set_join_secret(format!("join-{}", std::process::id()));
    party.set_size(1);
    party.set_max(4);
    party.edit(|activity| activity.details = Some("In the lobby".to_string()));
    party.commit().await?;

    let mut ticks: u64 = 0;
    let on_tick = || {
        ticks += 1;
        if ticks % 20 == 0 {
            tracing::info!("Still waiting for a join ({} ticks)", ticks);
        }
    };

    let result = match settings.max_wait() {
        Some(max_wait) => match party.watcher() {
            Some(watcher) => watcher
                .delay(settings.tick_delay())
                .max_wait(max_wait)
                .wait(on_tick)
                .await
                .map_err(PartyError::Watch),
            None => Err(PartyError::NotConnected),
        },
        None => party.wait_for_player_join(on_tick, settings.tick_delay()).await,
    };

    match result {
        Ok(secret) => tracing::info!("Joining party with secret {}", secret),
        Err(e) => tracing::warn!("No party joined: {}", e),
    }

    party.start_update_loop(settings.update_interval());
    tokio::time::sleep(Duration::from_secs(1)).await;
    party.close().await;

    Ok(())
}
