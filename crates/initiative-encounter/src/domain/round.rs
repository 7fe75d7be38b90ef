//! Round state machine.
//!
//! `RoundState` is a value: every operation returns a fresh state instead of
//! mutating in place, so each transition can be checked on its own. The
//! three variants are the machine's states:
//!
//! - `Empty`: no track, nothing to step.
//! - `Active`: the cursor sits on the combatant whose turn it is.
//! - `AwaitingRoundStart`: an elite was forced to act as the last act of the
//!   closing round; the next step picks the new round's starter before it
//!   moves the cursor.

use std::collections::BTreeSet;

use initiative_core::rng::DeterministicRng;
use tracing::debug;

use super::roster::{CombatantId, Roster};
use super::track::Track;

/// Cursor and bookkeeping for the round in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    cursor: usize,
    round_number: u32,
    touched: BTreeSet<CombatantId>,
}

impl Round {
    /// Index into the track of the active slot.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// One-based round counter.
    #[must_use]
    pub const fn round_number(&self) -> u32 {
        self.round_number
    }

    /// Combatants that acted this round.
    #[must_use]
    pub const fn touched(&self) -> &BTreeSet<CombatantId> {
        &self.touched
    }

    fn starting_with(cursor: usize, round_number: u32, starter: CombatantId) -> Self {
        Self {
            cursor,
            round_number,
            touched: BTreeSet::from([starter]),
        }
    }
}

/// Name of the machine state, for views and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No encounter in progress.
    Empty,
    /// Stepping normally.
    Active,
    /// A forced elite action is parked under the cursor.
    AwaitingRoundStart,
}

impl Phase {
    /// Returns the snake-case name of this phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Active => "active",
            Self::AwaitingRoundStart => "awaiting_round_start",
        }
    }
}

/// Observable effect of a transition, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// A new round began on `starter_id`'s first slot.
    RoundStarted {
        /// The new round number.
        round_number: u32,
        /// The combatant that opens the round.
        starter_id: CombatantId,
        /// Cursor position after the start.
        cursor: usize,
    },
    /// The cursor moved along the track.
    CursorAdvanced {
        /// Cursor before the move.
        from: usize,
        /// Cursor after the move.
        to: usize,
        /// Owner of the destination slot.
        owner_id: CombatantId,
        /// Whether the move ran past the end of the track.
        wrapped: bool,
    },
    /// No elite acted this round, so one was made to act.
    EliteForced {
        /// The elite now under the cursor.
        elite_id: CombatantId,
        /// Cursor position of the elite's first slot.
        cursor: usize,
    },
}

/// Result of a state-machine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// The state after the operation.
    pub state: RoundState,
    /// What happened, in order.
    pub outcomes: Vec<RoundOutcome>,
}

impl Transition {
    fn unchanged(state: &RoundState) -> Self {
        Self {
            state: state.clone(),
            outcomes: Vec::new(),
        }
    }
}

/// The round tracker's state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RoundState {
    /// No track.
    #[default]
    Empty,
    /// Track non-empty, stepping normally.
    Active(Round),
    /// An elite action was forced; the next step starts a new round first.
    AwaitingRoundStart(Round),
}

impl RoundState {
    /// Rebuilds a state from persisted parts. The caller guarantees `cursor`
    /// is within the track and `touched` only names roster members.
    #[must_use]
    pub fn restored(
        cursor: usize,
        round_number: u32,
        touched: BTreeSet<CombatantId>,
        pending_round_start: bool,
    ) -> Self {
        let round = Round {
            cursor,
            round_number,
            touched,
        };
        if pending_round_start {
            Self::AwaitingRoundStart(round)
        } else {
            Self::Active(round)
        }
    }

    /// Current machine state.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::Empty => Phase::Empty,
            Self::Active(_) => Phase::Active,
            Self::AwaitingRoundStart(_) => Phase::AwaitingRoundStart,
        }
    }

    /// The round in progress, if any.
    #[must_use]
    pub const fn round(&self) -> Option<&Round> {
        match self {
            Self::Empty => None,
            Self::Active(round) | Self::AwaitingRoundStart(round) => Some(round),
        }
    }

    /// Cursor position; 0 when empty.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.round().map_or(0, Round::cursor)
    }

    /// Round number; 0 when empty.
    #[must_use]
    pub fn round_number(&self) -> u32 {
        self.round().map_or(0, Round::round_number)
    }

    /// Whether the next step begins by starting a new round.
    #[must_use]
    pub const fn pending_round_start(&self) -> bool {
        matches!(self, Self::AwaitingRoundStart(_))
    }

    /// Combatants that acted this round, in id order.
    #[must_use]
    pub fn touched(&self) -> Vec<CombatantId> {
        self.round()
            .map(|r| r.touched.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Begins round 1 on a uniformly chosen combatant. An empty roster
    /// yields `Empty`.
    #[must_use]
    pub fn start_encounter(
        roster: &Roster,
        track: &Track,
        rng: &mut dyn DeterministicRng,
    ) -> Transition {
        match begin_round(1, roster, track, rng) {
            Some((round, outcome)) => Transition {
                state: Self::Active(round),
                outcomes: vec![outcome],
            },
            None => Transition::unchanged(&Self::Empty),
        }
    }

    /// Re-anchors the cursor after the roster changed.
    ///
    /// The cursor moves to the first slot of, in order of preference:
    /// `preferred`, the combatant previously under the cursor, or whoever
    /// owns the first slot. `touched` restarts as that single combatant.
    /// The phase and round number are kept. An empty `track` yields `Empty`.
    /// An `Empty` state has no round to re-anchor and stays `Empty`; new
    /// encounters begin through [`RoundState::start_encounter`].
    #[must_use]
    pub fn rebuild_after_roster_change(
        &self,
        previous_track: &Track,
        track: &Track,
        preferred: Option<CombatantId>,
    ) -> Self {
        let Some(round) = self.round() else {
            return Self::Empty;
        };
        if track.is_empty() {
            return Self::Empty;
        }

        let previous_owner = previous_track.owner_at(round.cursor);
        let anchor = [preferred, previous_owner]
            .into_iter()
            .flatten()
            .find_map(|id| track.locate_first_slot(id).map(|pos| (pos, id)))
            .or_else(|| track.owner_at(0).map(|id| (0, id)));

        let Some((cursor, owner)) = anchor else {
            return Self::Empty;
        };

        debug!(%owner, cursor, "re-anchored cursor after roster change");

        let rebuilt = Round::starting_with(cursor, round.round_number, owner);
        if self.pending_round_start() {
            Self::AwaitingRoundStart(rebuilt)
        } else {
            Self::Active(rebuilt)
        }
    }

    /// Advances the cursor by `roll + 1` slots.
    ///
    /// A move past the last slot closes the round. If elites exist and none
    /// acted, a random elite is forced to act and the state parks in
    /// `AwaitingRoundStart`; otherwise the next round starts immediately.
    /// Stepping an empty track is a no-op.
    #[must_use]
    pub fn step(
        &self,
        roster: &Roster,
        track: &Track,
        roll: u32,
        rng: &mut dyn DeterministicRng,
    ) -> Transition {
        let Ok(len) = u64::try_from(track.len()) else {
            return Transition::unchanged(self);
        };
        if len == 0 {
            return Transition::unchanged(self);
        }

        let (mut round, mut outcomes) = match self {
            Self::Empty => return Transition::unchanged(self),
            Self::Active(round) => (round.clone(), Vec::new()),
            Self::AwaitingRoundStart(round) => {
                let next = round.round_number.saturating_add(1);
                let Some((started, outcome)) = begin_round(next, roster, track, rng) else {
                    return Transition::unchanged(self);
                };
                (started, vec![outcome])
            }
        };

        let from = round.cursor;
        let target = u64::try_from(from)
            .unwrap_or(0)
            .saturating_add(u64::from(roll))
            .saturating_add(1);
        let wrapped = target > len - 1;
        let dest = usize::try_from(target % len).unwrap_or(0);

        round.cursor = dest;
        let Some(owner_id) = track.owner_at(dest) else {
            return Transition::unchanged(self);
        };
        outcomes.push(RoundOutcome::CursorAdvanced {
            from,
            to: dest,
            owner_id,
            wrapped,
        });

        if !wrapped {
            round.touched.insert(owner_id);
            debug!(from, to = dest, %owner_id, "cursor advanced");
            return Transition {
                state: Self::Active(round),
                outcomes,
            };
        }

        debug!(from, to = dest, round = round.round_number, "cursor wrapped, closing round");

        let elite_acted = round
            .touched
            .iter()
            .any(|id| roster.strength_of(*id).is_some_and(|s| s.is_elite()));

        if roster.has_elite() && !elite_acted {
            let elites = roster.elites();
            if let Some(elite_id) = rng.pick_index(elites.len()).and_then(|i| elites.get(i).copied()) {
                if let Some(pos) = track.locate_first_slot(elite_id) {
                    round.cursor = pos;
                    round.touched.insert(elite_id);
                    outcomes.push(RoundOutcome::EliteForced {
                        elite_id,
                        cursor: pos,
                    });
                    debug!(%elite_id, cursor = pos, "no elite acted this round, forcing one");
                }
            }
            return Transition {
                state: Self::AwaitingRoundStart(round),
                outcomes,
            };
        }

        let next = round.round_number.saturating_add(1);
        match begin_round(next, roster, track, rng) {
            Some((started, outcome)) => {
                outcomes.push(outcome);
                Transition {
                    state: Self::Active(started),
                    outcomes,
                }
            }
            None => Transition {
                state: Self::Active(round),
                outcomes,
            },
        }
    }
}

/// Picks a uniformly random starter from the whole roster and opens round
/// `round_number` on its first slot.
fn begin_round(
    round_number: u32,
    roster: &Roster,
    track: &Track,
    rng: &mut dyn DeterministicRng,
) -> Option<(Round, RoundOutcome)> {
    let index = rng.pick_index(roster.len())?;
    let starter_id = roster.combatants().get(index)?.id;
    let cursor = track.locate_first_slot(starter_id).unwrap_or(0);

    debug!(round_number, %starter_id, cursor, "round started");

    Some((
        Round::starting_with(cursor, round_number, starter_id),
        RoundOutcome::RoundStarted {
            round_number,
            starter_id,
            cursor,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::roster::{RosterCounts, Strength};
    use crate::domain::track::build_track;
    use initiative_core::rng::SystemRng;
    use initiative_test_support::{MockRng, SequenceRng};

    fn roster(powerful: u32, strong: u32, regular: u32, easy: u32) -> Roster {
        Roster::initialize(&RosterCounts {
            powerful,
            strong,
            regular,
            easy,
        })
    }

    fn started(roster: &Roster, starter_index: u32) -> (Track, RoundState) {
        let track = build_track(roster);
        let mut rng = SequenceRng::new(vec![starter_index]);
        let transition = RoundState::start_encounter(roster, &track, &mut rng);
        (track, transition.state)
    }

    // --- start_encounter ---

    #[test]
    fn test_start_encounter_places_cursor_on_starters_first_slot() {
        let roster = roster(1, 1, 0, 0);

        let (_, state) = started(&roster, 1);

        assert_eq!(state.phase(), Phase::Active);
        assert_eq!(state.cursor(), 4);
        assert_eq!(state.round_number(), 1);
        assert_eq!(state.touched(), vec![CombatantId(2)]);
    }

    #[test]
    fn test_start_encounter_with_empty_roster_stays_empty() {
        let roster = Roster::new();
        let track = build_track(&roster);

        let transition = RoundState::start_encounter(&roster, &track, &mut MockRng);

        assert_eq!(transition.state, RoundState::Empty);
        assert!(transition.outcomes.is_empty());
    }

    // --- step without wraparound ---

    #[test]
    fn test_step_advances_by_roll_plus_one() {
        let roster = roster(1, 1, 0, 0);
        let (track, state) = started(&roster, 0);

        let transition = state.step(&roster, &track, 3, &mut MockRng);

        assert_eq!(transition.state.cursor(), 4);
        assert_eq!(
            transition.state.touched(),
            vec![CombatantId(1), CombatantId(2)]
        );
        assert_eq!(
            transition.outcomes,
            vec![RoundOutcome::CursorAdvanced {
                from: 0,
                to: 4,
                owner_id: CombatantId(2),
                wrapped: false,
            }]
        );
    }

    #[test]
    fn test_step_on_empty_state_is_noop() {
        let track = Track::default();
        let transition = RoundState::Empty.step(&Roster::new(), &track, 4, &mut MockRng);

        assert_eq!(transition.state, RoundState::Empty);
        assert!(transition.outcomes.is_empty());
    }

    #[test]
    fn test_step_landing_on_last_slot_does_not_wrap() {
        let roster = roster(0, 0, 0, 3);
        let (track, state) = started(&roster, 0);

        let transition = state.step(&roster, &track, 1, &mut MockRng);

        assert_eq!(transition.state.cursor(), 2);
        assert_eq!(transition.state.round_number(), 1);
    }

    // --- single elite scenario ---

    #[test]
    fn test_single_elite_round_closes_without_intervention() {
        let roster = roster(1, 0, 0, 0);
        let (track, state) = started(&roster, 0);
        assert_eq!(state.cursor(), 0);

        let after_first = state.step(&roster, &track, 0, &mut MockRng).state;
        assert_eq!(after_first.cursor(), 1);
        assert_eq!(after_first.touched(), vec![CombatantId(1)]);

        let transition = after_first.step(&roster, &track, 5, &mut MockRng);

        assert_eq!(transition.state.phase(), Phase::Active);
        assert_eq!(transition.state.round_number(), 2);
        assert_eq!(transition.state.cursor(), 0);
        assert_eq!(transition.state.touched(), vec![CombatantId(1)]);
        assert!(
            !transition
                .outcomes
                .iter()
                .any(|o| matches!(o, RoundOutcome::EliteForced { .. }))
        );
    }

    // --- forced elite scenario ---

    #[test]
    fn test_wrap_without_elite_action_forces_elite() {
        let roster = roster(1, 0, 0, 1);
        let (track, state) = started(&roster, 1);
        assert_eq!(state.cursor(), 4);

        let transition = state.step(&roster, &track, 0, &mut MockRng);

        assert_eq!(transition.state.phase(), Phase::AwaitingRoundStart);
        assert!(transition.state.pending_round_start());
        assert_eq!(transition.state.cursor(), 0);
        assert_eq!(transition.state.round_number(), 1);
        assert_eq!(
            transition.state.touched(),
            vec![CombatantId(1), CombatantId(2)]
        );
        assert_eq!(
            transition.outcomes.last(),
            Some(&RoundOutcome::EliteForced {
                elite_id: CombatantId(1),
                cursor: 0,
            })
        );
    }

    #[test]
    fn test_step_after_forced_elite_starts_new_round_before_moving() {
        let roster = roster(1, 0, 0, 1);
        let (track, state) = started(&roster, 1);
        let parked = state.step(&roster, &track, 0, &mut MockRng).state;

        // New starter: the tier-1 combatant (index 1), then move one slot;
        // the second draw picks the forced elite.
        let mut rng = SequenceRng::new(vec![1, 0]);
        let transition = parked.step(&roster, &track, 0, &mut rng);

        assert_eq!(transition.state.round_number(), 2);
        assert!(!transition.state.pending_round_start());
        assert_eq!(
            transition.outcomes[0],
            RoundOutcome::RoundStarted {
                round_number: 2,
                starter_id: CombatantId(2),
                cursor: 4,
            }
        );
        // From slot 4 one step wraps again with no elite touched: forced again.
        assert_eq!(transition.state.phase(), Phase::AwaitingRoundStart);
        assert_eq!(transition.state.round_number(), 2);
    }

    #[test]
    fn test_step_after_forced_elite_moves_from_new_starter() {
        let roster = roster(1, 0, 0, 1);
        let (track, state) = started(&roster, 1);
        let parked = state.step(&roster, &track, 0, &mut MockRng).state;

        // New starter: the elite (index 0) at slot 0, then move two slots.
        let transition = parked.step(&roster, &track, 1, &mut MockRng);

        assert_eq!(transition.state.phase(), Phase::Active);
        assert_eq!(transition.state.round_number(), 2);
        assert_eq!(transition.state.cursor(), 2);
        assert_eq!(transition.state.touched(), vec![CombatantId(1)]);
    }

    #[test]
    fn test_wrap_without_elites_starts_round_immediately() {
        let roster = roster(0, 1, 0, 1);
        let (track, state) = started(&roster, 1);

        let mut rng = SequenceRng::new(vec![0]);
        let transition = state.step(&roster, &track, 0, &mut rng);

        assert_eq!(transition.state.phase(), Phase::Active);
        assert_eq!(transition.state.round_number(), 2);
        assert_eq!(transition.state.cursor(), 0);
        assert_eq!(transition.state.touched(), vec![CombatantId(1)]);
    }

    #[test]
    fn test_wrap_destination_is_not_counted_as_acting() {
        // Cursor on the tier-1 (slot 4) wraps onto the elite's slot 0: the
        // elite did not act, so enforcement still runs.
        let roster = roster(1, 0, 0, 1);
        let (track, state) = started(&roster, 1);

        let transition = state.step(&roster, &track, 0, &mut MockRng);

        assert!(matches!(
            transition.outcomes[0],
            RoundOutcome::CursorAdvanced {
                to: 0,
                wrapped: true,
                ..
            }
        ));
        assert!(
            transition
                .outcomes
                .iter()
                .any(|o| matches!(o, RoundOutcome::EliteForced { .. })),
            "enforcement re-picks even when the wrap lands on an unacted elite"
        );
    }

    #[test]
    fn test_forced_elite_is_picked_among_elites_only() {
        let roster = roster(2, 0, 0, 1);
        let (track, state) = started(&roster, 2);
        assert_eq!(state.cursor(), 8);

        let mut rng = SequenceRng::new(vec![1]);
        let transition = state.step(&roster, &track, 0, &mut rng);

        assert_eq!(transition.state.cursor(), 4);
        assert_eq!(
            transition.state.touched(),
            vec![CombatantId(2), CombatantId(3)]
        );
    }

    #[test]
    fn test_huge_roll_wraps_without_overflow() {
        let roster = roster(0, 0, 1, 0);
        let (track, state) = started(&roster, 0);

        let transition = state.step(&roster, &track, u32::MAX, &mut MockRng);

        assert!(transition.state.cursor() < track.len());
        assert_eq!(transition.state.round_number(), 2);
    }

    // --- rebuild_after_roster_change ---

    #[test]
    fn test_rebuild_prefers_requested_combatant() {
        let roster = roster(1, 1, 1, 0);
        let (track, state) = started(&roster, 0);
        let remaining = roster.without(CombatantId(1)).unwrap();
        let new_track = build_track(&remaining);

        let rebuilt = state.rebuild_after_roster_change(&track, &new_track, Some(CombatantId(3)));

        assert_eq!(rebuilt.cursor(), 3);
        assert_eq!(rebuilt.touched(), vec![CombatantId(3)]);
        assert_eq!(rebuilt.round_number(), 1);
    }

    #[test]
    fn test_rebuild_keeps_combatant_under_cursor() {
        let roster = roster(0, 1, 0, 1);
        let (track, state) = started(&roster, 1);
        assert_eq!(state.cursor(), 3);
        let (grown, _) = roster.with_added(Strength::Powerful);
        let new_track = build_track(&grown);

        let rebuilt = state.rebuild_after_roster_change(&track, &new_track, None);

        assert_eq!(rebuilt.cursor(), 7);
        assert_eq!(rebuilt.touched(), vec![CombatantId(2)]);
    }

    #[test]
    fn test_rebuild_falls_back_to_first_slot() {
        let roster = roster(0, 1, 0, 1);
        let (track, state) = started(&roster, 1);
        let remaining = roster.without(CombatantId(2)).unwrap();
        let new_track = build_track(&remaining);

        let rebuilt =
            state.rebuild_after_roster_change(&track, &new_track, Some(CombatantId(2)));

        assert_eq!(rebuilt.cursor(), 0);
        assert_eq!(rebuilt.touched(), vec![CombatantId(1)]);
    }

    #[test]
    fn test_rebuild_to_empty_track_is_empty() {
        let roster = roster(0, 0, 0, 1);
        let (track, state) = started(&roster, 0);

        let rebuilt = state.rebuild_after_roster_change(&track, &Track::default(), None);

        assert_eq!(rebuilt, RoundState::Empty);
        assert_eq!(rebuilt.cursor(), 0);
        assert_eq!(rebuilt.round_number(), 0);
    }

    #[test]
    fn test_rebuild_of_empty_state_stays_empty() {
        let roster = roster(1, 0, 0, 0);
        let track = build_track(&roster);

        let rebuilt =
            RoundState::Empty.rebuild_after_roster_change(&Track::default(), &track, None);

        assert_eq!(rebuilt, RoundState::Empty);
    }

    #[test]
    fn test_rebuild_keeps_pending_round_start() {
        let roster = roster(1, 0, 0, 1);
        let (track, state) = started(&roster, 1);
        let parked = state.step(&roster, &track, 0, &mut MockRng).state;
        let (grown, _) = roster.with_added(Strength::Easy);
        let new_track = build_track(&grown);

        let rebuilt = parked.rebuild_after_roster_change(&track, &new_track, None);

        assert!(rebuilt.pending_round_start());
        assert_eq!(rebuilt.cursor(), 0);
        assert_eq!(rebuilt.touched(), vec![CombatantId(1)]);
    }

    #[test]
    fn test_transitions_do_not_mutate_previous_state() {
        let roster = roster(0, 0, 0, 3);
        let (track, state) = started(&roster, 0);
        let before = state.clone();

        let _ = state.step(&roster, &track, 1, &mut MockRng);

        assert_eq!(state, before);
    }

    // --- long-run invariants ---

    #[test]
    fn test_every_completed_round_saw_an_elite() {
        let roster = roster(2, 1, 2, 3);
        let track = build_track(&roster);
        let mut rng = SystemRng::seeded(2024);
        let mut state = RoundState::start_encounter(&roster, &track, &mut rng).state;

        for roll in (0..2_000u32).map(|i| i % 9) {
            let before = state.clone();
            let transition = state.step(&roster, &track, roll, &mut rng);
            if transition.state.round_number() > before.round_number() {
                // The round that just closed is the one before the step, plus
                // any movement within this step before the new round began.
                let closed_touched: Vec<CombatantId> = match &before {
                    RoundState::AwaitingRoundStart(round) => {
                        round.touched.iter().copied().collect()
                    }
                    _ => {
                        let mut touched = before.touched();
                        for outcome in &transition.outcomes {
                            if let RoundOutcome::CursorAdvanced {
                                owner_id,
                                wrapped: false,
                                ..
                            } = outcome
                            {
                                touched.push(*owner_id);
                            }
                        }
                        touched
                    }
                };
                assert!(
                    closed_touched
                        .iter()
                        .any(|id| roster.strength_of(*id) == Some(Strength::Powerful)),
                    "round {} closed without an elite acting",
                    before.round_number()
                );
            }
            assert!(transition.state.cursor() < track.len());
            state = transition.state;
        }
    }
}
