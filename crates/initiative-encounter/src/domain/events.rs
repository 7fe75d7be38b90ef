//! Domain events for the encounter context.

use initiative_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};

use super::roster::{CombatantId, Strength};

/// Emitted when a roster is built and round 1 is about to begin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterStarted {
    /// Number of combatants in the new roster.
    pub combatant_count: usize,
    /// Number of slots on the new track.
    pub track_length: usize,
}

/// Emitted when a combatant joins mid-encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantAdded {
    /// The assigned id.
    pub combatant_id: CombatantId,
    /// Tier of the new combatant.
    pub strength: Strength,
}

/// Emitted when a combatant leaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantRemoved {
    /// The removed id.
    pub combatant_id: CombatantId,
    /// Whether the roster is now empty and the encounter was reset.
    pub roster_emptied: bool,
}

/// Emitted when a die result moves the cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorAdvanced {
    /// Cursor before the move.
    pub from: usize,
    /// Cursor after the move.
    pub to: usize,
    /// Owner of the destination slot.
    pub owner_id: CombatantId,
    /// Whether the move ran past the end of the track.
    pub wrapped: bool,
}

/// Emitted when an elite is forced to act to close a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EliteForced {
    /// The elite made to act.
    pub elite_id: CombatantId,
    /// Its first slot.
    pub cursor: usize,
}

/// Emitted when a round begins on a randomly chosen combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStarted {
    /// The new round number.
    pub round_number: u32,
    /// The combatant opening the round.
    pub starter_id: CombatantId,
    /// Its first slot.
    pub cursor: usize,
}

/// Emitted when the encounter is cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterReset {
    /// Whether the raw input fields were cleared too.
    pub inputs_cleared: bool,
}

/// Event payload variants for the encounter context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncounterEventKind {
    /// A new roster was built.
    EncounterStarted(EncounterStarted),
    /// A combatant joined.
    CombatantAdded(CombatantAdded),
    /// A combatant left.
    CombatantRemoved(CombatantRemoved),
    /// The cursor moved.
    CursorAdvanced(CursorAdvanced),
    /// An elite was forced to act.
    EliteForced(EliteForced),
    /// A round began.
    RoundStarted(RoundStarted),
    /// The encounter was cleared.
    EncounterReset(EncounterReset),
}

/// Domain event envelope for the encounter context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncounterEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: EncounterEventKind,
}

impl EncounterEventKind {
    /// Returns the routing name of this payload.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::EncounterStarted(_) => "encounter.started",
            Self::CombatantAdded(_) => "encounter.combatant_added",
            Self::CombatantRemoved(_) => "encounter.combatant_removed",
            Self::CursorAdvanced(_) => "encounter.cursor_advanced",
            Self::EliteForced(_) => "encounter.elite_forced",
            Self::RoundStarted(_) => "encounter.round_started",
            Self::EncounterReset(_) => "encounter.reset",
        }
    }
}

impl DomainEvent for EncounterEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).unwrap_or(serde_json::Value::Null)
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
