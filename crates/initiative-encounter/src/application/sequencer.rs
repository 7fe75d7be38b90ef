//! The sequencer facade.
//!
//! `Sequencer` is the only entry point external collaborators use. It owns
//! the roster, the derived track and the round state for one encounter,
//! validates raw input, records domain events, and persists after every
//! command. Commands never fail: invalid input clamps, impossible requests
//! are no-ops, and persistence errors are swallowed.

use std::fmt;
use std::sync::Arc;

use initiative_core::clock::Clock;
use initiative_core::command::Command;
use initiative_core::event::EventMetadata;
use initiative_core::rng::DeterministicRng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::persistence::{PersistedState, StateStore};
use crate::application::query_handlers::Snapshot;
use crate::domain::commands::{
    AddCombatant, RawInputs, Ready, RemoveCombatant, Reset, SubmitRoll, UpdateInputs,
};
use crate::domain::events::{
    CombatantAdded, CombatantRemoved, CursorAdvanced, EliteForced, EncounterEvent,
    EncounterEventKind, EncounterReset, EncounterStarted, RoundStarted,
};
use crate::domain::roster::Roster;
use crate::domain::round::{RoundOutcome, RoundState, Transition};
use crate::domain::track::{Track, build_track};

/// Turn sequencer for a single encounter.
pub struct Sequencer {
    encounter_id: Uuid,
    roster: Roster,
    track: Track,
    round: RoundState,
    inputs: RawInputs,
    rng: Box<dyn DeterministicRng>,
    clock: Arc<dyn Clock>,
    store: Option<StateStore>,
    next_sequence_number: i64,
    uncommitted_events: Vec<EncounterEvent>,
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field("encounter_id", &self.encounter_id)
            .field("roster", &self.roster)
            .field("round", &self.round)
            .field("inputs", &self.inputs)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Sequencer {
    /// Creates an empty sequencer without persistence.
    #[must_use]
    pub fn new(encounter_id: Uuid, rng: Box<dyn DeterministicRng>, clock: Arc<dyn Clock>) -> Self {
        Self {
            encounter_id,
            roster: Roster::new(),
            track: Track::default(),
            round: RoundState::Empty,
            inputs: RawInputs::default(),
            rng,
            clock,
            store: None,
            next_sequence_number: 1,
            uncommitted_events: Vec::new(),
        }
    }

    /// Attaches a store that every subsequent command saves to. Existing
    /// saved state is not read; use [`Sequencer::restore`] for that.
    #[must_use]
    pub fn with_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Creates a sequencer from whatever `store` holds, falling back to an
    /// empty encounter.
    #[must_use]
    pub fn restore(
        encounter_id: Uuid,
        rng: Box<dyn DeterministicRng>,
        clock: Arc<dyn Clock>,
        store: StateStore,
    ) -> Self {
        let PersistedState {
            inputs,
            roster,
            track,
            round,
            next_sequence_number,
        } = store.load();

        info!(
            %encounter_id,
            combatants = roster.len(),
            round_number = round.round_number(),
            "restored encounter"
        );

        let mut sequencer = Self::new(encounter_id, rng, clock).with_store(store);
        sequencer.inputs = inputs;
        sequencer.roster = roster;
        sequencer.track = track;
        sequencer.round = round;
        sequencer.next_sequence_number = next_sequence_number;
        sequencer
    }

    /// The encounter identifier.
    #[must_use]
    pub const fn encounter_id(&self) -> Uuid {
        self.encounter_id
    }

    /// The raw input fields.
    #[must_use]
    pub const fn inputs(&self) -> &RawInputs {
        &self.inputs
    }

    /// The current round state.
    #[must_use]
    pub const fn round(&self) -> &RoundState {
        &self.round
    }

    /// Read-only view of the current state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(self.encounter_id, &self.roster, &self.track, &self.round)
    }

    /// Returns and clears the events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<EncounterEvent> {
        std::mem::take(&mut self.uncommitted_events)
    }

    /// Builds a roster from `command.counts` and starts round 1. All-zero
    /// counts reset the encounter instead.
    pub fn ready(&mut self, command: &Ready) -> Snapshot {
        log_command(command);

        let roster = Roster::initialize(&command.counts);
        if roster.is_empty() {
            self.clear(command.correlation_id, false);
            return self.commit();
        }

        let track = build_track(&roster);
        self.record(
            command.correlation_id,
            EncounterEventKind::EncounterStarted(EncounterStarted {
                combatant_count: roster.len(),
                track_length: track.len(),
            }),
        );
        let transition = RoundState::start_encounter(&roster, &track, self.rng.as_mut());
        self.roster = roster;
        self.track = track;
        self.apply(command.correlation_id, transition);
        self.commit()
    }

    /// Parses the raw count fields and runs [`Sequencer::ready`].
    pub fn ready_from_inputs(&mut self, correlation_id: Uuid) -> Snapshot {
        let counts = self.inputs.counts();
        self.ready(&Ready {
            correlation_id,
            counts,
        })
    }

    /// Appends a combatant and re-anchors the cursor, keeping the combatant
    /// currently under it when possible. Adding to an empty encounter starts
    /// a new one.
    pub fn add_combatant(&mut self, command: &AddCombatant) -> Snapshot {
        log_command(command);

        let (roster, combatant_id) = self.roster.with_added(command.strength);
        let track = build_track(&roster);
        self.record(
            command.correlation_id,
            EncounterEventKind::CombatantAdded(CombatantAdded {
                combatant_id,
                strength: command.strength,
            }),
        );

        if self.round == RoundState::Empty {
            let transition = RoundState::start_encounter(&roster, &track, self.rng.as_mut());
            self.roster = roster;
            self.track = track;
            self.apply(command.correlation_id, transition);
        } else {
            self.round = self
                .round
                .rebuild_after_roster_change(&self.track, &track, None);
            self.roster = roster;
            self.track = track;
        }
        self.commit()
    }

    /// Removes a combatant. The cursor moves to a randomly chosen survivor;
    /// removing the last combatant resets the encounter. Unknown ids are a
    /// no-op.
    pub fn remove_combatant(&mut self, command: &RemoveCombatant) -> Snapshot {
        log_command(command);

        let Some(remaining) = self.roster.without(command.combatant_id) else {
            debug!(combatant_id = %command.combatant_id, "remove of unknown combatant ignored");
            return self.snapshot();
        };

        let roster_emptied = remaining.is_empty();
        self.record(
            command.correlation_id,
            EncounterEventKind::CombatantRemoved(CombatantRemoved {
                combatant_id: command.combatant_id,
                roster_emptied,
            }),
        );

        if roster_emptied {
            self.roster = remaining;
            self.track = Track::default();
            self.round = RoundState::Empty;
            return self.commit();
        }

        let preferred = self
            .rng
            .pick_index(remaining.len())
            .and_then(|i| remaining.combatants().get(i))
            .map(|c| c.id);
        let track = build_track(&remaining);
        self.round = self
            .round
            .rebuild_after_roster_change(&self.track, &track, preferred);
        self.roster = remaining;
        self.track = track;
        self.commit()
    }

    /// Advances the cursor by the sanitized roll. No-op on an empty track.
    pub fn submit_roll(&mut self, command: &SubmitRoll) -> Snapshot {
        log_command(command);

        if self.track.is_empty() {
            debug!("roll ignored: no encounter in progress");
            return self.snapshot();
        }

        let roll = command.roll.sanitize();
        let transition = self
            .round
            .step(&self.roster, &self.track, roll, self.rng.as_mut());
        self.apply(command.correlation_id, transition);
        self.commit()
    }

    /// Submits the raw roll field via [`Sequencer::submit_roll`].
    pub fn apply_roll_input(&mut self, correlation_id: Uuid) -> Snapshot {
        let roll = self.inputs.roll_input();
        self.submit_roll(&SubmitRoll {
            correlation_id,
            roll,
        })
    }

    /// Clears the roster and round state, and the raw inputs when asked.
    pub fn reset(&mut self, command: &Reset) -> Snapshot {
        log_command(command);
        self.clear(command.correlation_id, command.clear_inputs);
        self.commit()
    }

    /// Replaces the raw input fields.
    pub fn update_inputs(&mut self, command: &UpdateInputs) -> Snapshot {
        log_command(command);
        self.inputs = command.inputs.clone();
        self.commit()
    }

    fn clear(&mut self, correlation_id: Uuid, clear_inputs: bool) {
        self.roster = Roster::new();
        self.track = Track::default();
        self.round = RoundState::Empty;
        if clear_inputs {
            self.inputs = RawInputs::default();
        }
        self.record(
            correlation_id,
            EncounterEventKind::EncounterReset(EncounterReset {
                inputs_cleared: clear_inputs,
            }),
        );
    }

    fn apply(&mut self, correlation_id: Uuid, transition: Transition) {
        for outcome in transition.outcomes {
            let kind = match outcome {
                RoundOutcome::RoundStarted {
                    round_number,
                    starter_id,
                    cursor,
                } => EncounterEventKind::RoundStarted(RoundStarted {
                    round_number,
                    starter_id,
                    cursor,
                }),
                RoundOutcome::CursorAdvanced {
                    from,
                    to,
                    owner_id,
                    wrapped,
                } => EncounterEventKind::CursorAdvanced(CursorAdvanced {
                    from,
                    to,
                    owner_id,
                    wrapped,
                }),
                RoundOutcome::EliteForced { elite_id, cursor } => {
                    EncounterEventKind::EliteForced(EliteForced { elite_id, cursor })
                }
            };
            self.record(correlation_id, kind);
        }
        self.round = transition.state;
    }

    fn record(&mut self, correlation_id: Uuid, kind: EncounterEventKind) {
        let event = EncounterEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                encounter_id: self.encounter_id,
                sequence_number: self.next_sequence_number,
                correlation_id,
                causation_id: correlation_id,
                occurred_at: self.clock.now(),
            },
            kind,
        };
        self.next_sequence_number += 1;
        self.uncommitted_events.push(event);
    }

    /// Saves the current state to the attached store, if any.
    pub fn persist(&self) {
        if let Some(store) = &self.store {
            store.save(&PersistedState {
                inputs: self.inputs.clone(),
                roster: self.roster.clone(),
                track: self.track.clone(),
                round: self.round.clone(),
                next_sequence_number: self.next_sequence_number,
            });
        }
    }

    fn commit(&self) -> Snapshot {
        self.persist();
        self.snapshot()
    }
}

fn log_command(command: &dyn Command) {
    info!(
        correlation_id = %command.correlation_id(),
        command_type = command.command_type(),
        "handling command"
    );
}
