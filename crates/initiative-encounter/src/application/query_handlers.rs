//! Read-only views of the sequencer state.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::roster::{CombatantId, Roster, Strength};
use crate::domain::round::RoundState;
use crate::domain::track::{Slot, Track};

/// One combatant's column in the display: its ordered slot indices and which
/// one, if any, the cursor is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombatantColumn {
    /// The combatant identifier.
    pub id: CombatantId,
    /// The combatant's tier.
    pub strength: Strength,
    /// Slot indices `1..=strength`.
    pub slots: Vec<u8>,
    /// The slot index under the cursor, if this combatant owns it.
    pub active_slot: Option<u8>,
}

/// Snapshot of the observable sequencer state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// The encounter identifier.
    pub encounter_id: Uuid,
    /// Current machine state as a string.
    pub phase: &'static str,
    /// The combatants, in insertion order.
    pub roster: Roster,
    /// The slot sequence.
    pub track: Track,
    /// Index of the active slot.
    pub cursor: usize,
    /// Current round; 0 when empty.
    pub round_number: u32,
    /// Whether the next roll starts a new round first.
    pub pending_round_start: bool,
    /// Combatants that acted this round.
    pub touched: Vec<CombatantId>,
    /// Per-combatant display columns in track order.
    pub columns: Vec<CombatantColumn>,
}

impl Snapshot {
    /// Captures the state of an encounter.
    #[must_use]
    pub fn capture(encounter_id: Uuid, roster: &Roster, track: &Track, round: &RoundState) -> Self {
        let cursor = round.cursor();
        Self {
            encounter_id,
            phase: round.phase().as_str(),
            roster: roster.clone(),
            track: track.clone(),
            cursor,
            round_number: round.round_number(),
            pending_round_start: round.pending_round_start(),
            touched: round.touched(),
            columns: columns(track, cursor),
        }
    }

    /// The slot under the cursor, if the track is non-empty.
    #[must_use]
    pub fn active_slot(&self) -> Option<&Slot> {
        self.track.get(self.cursor)
    }

    /// The combatant whose turn it is.
    #[must_use]
    pub fn active_combatant(&self) -> Option<CombatantId> {
        self.active_slot().map(|s| s.owner_id)
    }
}

fn columns(track: &Track, cursor: usize) -> Vec<CombatantColumn> {
    let active = track.get(cursor);
    let mut columns: Vec<CombatantColumn> = Vec::new();
    for slot in track.slots() {
        if columns.last().is_some_and(|c| c.id == slot.owner_id) {
            continue;
        }
        columns.push(CombatantColumn {
            id: slot.owner_id,
            strength: slot.owner_strength,
            slots: (1..=slot.owner_strength.slots()).collect(),
            active_slot: active
                .filter(|a| a.owner_id == slot.owner_id)
                .map(|a| a.slot_index),
        });
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::roster::RosterCounts;
    use crate::domain::track::build_track;
    use initiative_test_support::SequenceRng;

    #[test]
    fn test_columns_mark_the_active_slot() {
        let roster = Roster::initialize(&RosterCounts {
            powerful: 1,
            strong: 1,
            ..RosterCounts::default()
        });
        let track = build_track(&roster);
        let round = RoundState::start_encounter(&roster, &track, &mut SequenceRng::new(vec![1]))
            .state;
        let round = round
            .step(&roster, &track, 0, &mut SequenceRng::new(vec![]))
            .state;

        let snapshot = Snapshot::capture(Uuid::nil(), &roster, &track, &round);

        assert_eq!(snapshot.columns.len(), 2);
        assert_eq!(snapshot.columns[0].slots, vec![1, 2, 3, 4]);
        assert_eq!(snapshot.columns[0].active_slot, None);
        assert_eq!(snapshot.columns[1].slots, vec![1, 2, 3]);
        assert_eq!(snapshot.columns[1].active_slot, Some(2));
        assert_eq!(snapshot.active_combatant(), Some(CombatantId(2)));
    }

    #[test]
    fn test_empty_snapshot_has_no_columns() {
        let snapshot = Snapshot::capture(
            Uuid::nil(),
            &Roster::new(),
            &Track::default(),
            &RoundState::Empty,
        );

        assert_eq!(snapshot.phase, "empty");
        assert_eq!(snapshot.cursor, 0);
        assert_eq!(snapshot.round_number, 0);
        assert!(snapshot.columns.is_empty());
        assert!(snapshot.active_slot().is_none());
    }
}
