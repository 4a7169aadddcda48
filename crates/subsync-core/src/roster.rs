// Roster snapshot model: slots, occupants, and starter/bench queries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::position::{PositionCode, SlotPosition};

/// A player occupying a roster slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosteredPlayer {
    /// Remote player id (scorer id). Unique within a roster.
    pub id: String,
    pub name: String,
    /// Primary/default position as reported on the player record, if any
    /// (e.g. "M", "Midfielder", "GK").
    #[serde(default)]
    pub primary_position: Option<String>,
    /// Listed positions from the player record. Empty if not available.
    #[serde(default)]
    pub positions: Vec<String>,
}

impl RosteredPlayer {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            primary_position: None,
            positions: Vec::new(),
        }
    }
}

/// A single slot on a team's roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterSlot {
    /// The player occupying this slot, if any.
    pub player: Option<RosteredPlayer>,
    /// The slot designation. Bench for reserves.
    pub slot: SlotPosition,
    /// Whether the occupant is currently active.
    pub is_starter: bool,
    /// Opaque metadata from the remote row. Only the eligibility resolver and
    /// the lock classifier look inside it.
    #[serde(default)]
    pub raw: Map<String, Value>,
}

impl RosterSlot {
    pub fn starter(player: RosteredPlayer, code: PositionCode) -> Self {
        Self {
            player: Some(player),
            slot: SlotPosition::Field(code),
            is_starter: true,
            raw: Map::new(),
        }
    }

    pub fn bench(player: RosteredPlayer) -> Self {
        Self {
            player: Some(player),
            slot: SlotPosition::Bench,
            is_starter: false,
            raw: Map::new(),
        }
    }

    pub fn with_raw(mut self, raw: Map<String, Value>) -> Self {
        self.raw = raw;
        self
    }

    pub fn player_id(&self) -> Option<&str> {
        self.player.as_ref().map(|p| p.id.as_str())
    }

    pub fn player_name(&self) -> Option<&str> {
        self.player.as_ref().map(|p| p.name.as_str())
    }

    /// The starter bucket, when this slot is an active field slot.
    pub fn starter_code(&self) -> Option<PositionCode> {
        if self.is_starter {
            self.slot.code()
        } else {
            None
        }
    }
}

/// A full roster snapshot for one team, as returned by the roster-fetch
/// collaborator. Never cached across planning calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    pub team_id: String,
    pub slots: Vec<RosterSlot>,
    /// Roster limit period reported alongside the roster, if any.
    #[serde(default)]
    pub period: Option<u32>,
}

impl Roster {
    pub fn new(team_id: impl Into<String>, slots: Vec<RosterSlot>) -> Self {
        Self {
            team_id: team_id.into(),
            slots,
            period: None,
        }
    }

    /// Occupied slots only.
    pub fn occupied(&self) -> impl Iterator<Item = &RosterSlot> {
        self.slots.iter().filter(|s| s.player.is_some())
    }

    /// Ids of active players in roster order.
    pub fn starter_ids(&self) -> Vec<String> {
        self.occupied()
            .filter(|s| s.is_starter)
            .filter_map(|s| s.player_id().map(str::to_string))
            .collect()
    }

    /// Ids of reserve players in roster order.
    pub fn bench_ids(&self) -> Vec<String> {
        self.occupied()
            .filter(|s| !s.is_starter)
            .filter_map(|s| s.player_id().map(str::to_string))
            .collect()
    }

    pub fn find(&self, player_id: &str) -> Option<&RosterSlot> {
        self.occupied().find(|s| s.player_id() == Some(player_id))
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.find(player_id).is_some()
    }

    pub fn is_starter(&self, player_id: &str) -> bool {
        self.find(player_id).is_some_and(|s| s.is_starter)
    }

    /// Case-insensitive substring match on player names.
    pub fn find_by_name(&self, name: &str) -> Option<&RosterSlot> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.occupied().find(|s| {
            s.player_name()
                .is_some_and(|n| n.to_lowercase().contains(&needle))
        })
    }

    /// Display name for a player id, falling back to the id itself.
    pub fn name_of<'a>(&'a self, player_id: &'a str) -> &'a str {
        self.find(player_id)
            .and_then(|s| s.player_name())
            .unwrap_or(player_id)
    }

    pub fn filled_count(&self) -> usize {
        self.occupied().count()
    }
}
