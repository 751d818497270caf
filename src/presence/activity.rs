//! Activity data mirrored onto the presence service

use serde::{Deserialize, Serialize};

/// Current and maximum number of players in a party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySize {
    pub current: u32,
    pub max: u32,
}

impl PartySize {
    pub fn new(current: u32, max: u32) -> Self {
        Self { current, max }
    }

    /// True when the party holds more players than it allows
    pub fn is_overfull(&self) -> bool {
        self.current > self.max
    }
}

/// Everything that gets sent to the presence service on commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyActivity {
    /// The user's current status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// What the player is currently doing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ID of the player's party, lobby, or group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party_size: Option<PartySize>,
    /// Secret for chat invitations and ask to join, must not equal the party id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_secret: Option<String>,
    /// Secret for the spectate button
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectate_secret: Option<String>,
    /// Epoch seconds for game start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    /// Epoch seconds for game end
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_text: Option<String>,
}

impl PartyActivity {
    pub fn size(&self) -> Option<u32> {
        self.party_size.map(|s| s.current)
    }

    pub fn max(&self) -> Option<u32> {
        self.party_size.map(|s| s.max)
    }

    /// Set the player count. The first of size/max to be set fills both.
    pub fn set_size(&mut self, value: u32) {
        match &mut self.party_size {
            Some(size) => size.current = value,
            None => self.party_size = Some(PartySize::new(value, value)),
        }
    }

    /// Set the party capacity. The first of size/max to be set fills both.
    pub fn set_max(&mut self, value: u32) {
        match &mut self.party_size {
            Some(size) => size.max = value,
            None => self.party_size = Some(PartySize::new(value, value)),
        }
    }

    /// Problems a careful caller would want to hear about before publishing.
    /// None of them stop the update.
    pub fn warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();
        if self.party_size.is_some_and(|s| s.is_overfull()) {
            warnings.push("party size exceeds party max");
        }
        if self.join_secret.is_some() && self.join_secret == self.party_id {
            warnings.push("join secret is the same as the party id");
        }
        if self.party_size.is_some() && self.party_id.is_none() {
            warnings.push("party size is ignored without a party id");
        }
        warnings
    }
}
