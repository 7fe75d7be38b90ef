//! The ordered slot sequence derived from a roster.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use super::roster::{CombatantId, Roster, Strength};

/// One position on the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    /// Combatant owning this slot.
    pub owner_id: CombatantId,
    /// Strength of the owning combatant.
    pub owner_strength: Strength,
    /// Position within the owner's group, `1..=owner_strength`.
    pub slot_index: u8,
}

/// Ordered slot sequence. Never mutated; rebuilt wholesale from the roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Track {
    slots: Vec<Slot>,
}

impl Track {
    /// All slots in order.
    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the track has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// Owner of the slot at `index`.
    #[must_use]
    pub fn owner_at(&self, index: usize) -> Option<CombatantId> {
        self.get(index).map(|s| s.owner_id)
    }

    /// Position of the first slot belonging to `id`, or `None` if the
    /// combatant has no slots on this track.
    #[must_use]
    pub fn locate_first_slot(&self, id: CombatantId) -> Option<usize> {
        self.slots.iter().position(|s| s.owner_id == id)
    }
}

/// Builds the track for `roster`: owners ordered by strength descending then
/// id ascending, each contributing `strength` consecutive slots.
#[must_use]
pub fn build_track(roster: &Roster) -> Track {
    let mut ordered = roster.combatants().to_vec();
    ordered.sort_by_key(|c| (Reverse(c.strength), c.id));

    let slots = ordered
        .iter()
        .flat_map(|c| {
            (1..=c.strength.slots()).map(move |slot_index| Slot {
                owner_id: c.id,
                owner_strength: c.strength,
                slot_index,
            })
        })
        .collect();

    Track { slots }
}
