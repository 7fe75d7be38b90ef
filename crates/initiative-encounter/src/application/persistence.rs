//! Saving and restoring sequencer state through a `KeyValueStore`.
//!
//! Each piece of state lives under its own key. Restoring never fails: a
//! missing or malformed key falls back to its default, and the result is
//! repaired so the round state agrees with the roster.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use initiative_core::store::KeyValueStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::warn;

use crate::domain::commands::RawInputs;
use crate::domain::roster::{CombatantId, Roster};
use crate::domain::round::RoundState;
use crate::domain::track::{Track, build_track};

const ROSTER: &str = "roster";
const TRACK: &str = "track";
const CURSOR: &str = "cursor";
const ROUND_NUMBER: &str = "roundNumber";
const PENDING_ROUND_START: &str = "pendingRoundStart";
const TOUCHED: &str = "touched";
const ROLL: &str = "roll";
const NEXT_SEQUENCE_NUMBER: &str = "nextSequenceNumber";
const COUNT_KEYS: [&str; 4] = ["c4", "c3", "c2", "c1"];

/// Everything the sequencer persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedState {
    /// Raw input fields.
    pub inputs: RawInputs,
    /// The roster.
    pub roster: Roster,
    /// The track, always consistent with `roster`.
    pub track: Track,
    /// The round state.
    pub round: RoundState,
    /// Sequence number the next recorded event receives.
    pub next_sequence_number: i64,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            inputs: RawInputs::default(),
            roster: Roster::default(),
            track: Track::default(),
            round: RoundState::default(),
            next_sequence_number: 1,
        }
    }
}

/// A `KeyValueStore` plus an optional key namespace, so that several
/// encounters can share one store.
#[derive(Clone)]
pub struct StateStore {
    store: Arc<dyn KeyValueStore>,
    namespace: Option<String>,
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl StateStore {
    /// Uses bare keys (`cursor`, `roster`, ...).
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            namespace: None,
        }
    }

    /// Prefixes every key with `<namespace>:`.
    #[must_use]
    pub fn namespaced(store: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: Some(namespace.into()),
        }
    }

    fn key(&self, name: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}:{name}"),
            None => name.to_owned(),
        }
    }

    /// Whether a roster has ever been saved under this namespace.
    #[must_use]
    pub fn has_saved_state(&self) -> bool {
        matches!(self.store.get(&self.key(ROSTER)), Ok(Some(_)))
    }

    /// Writes every key as one batch. Failures are logged and otherwise
    /// ignored.
    pub fn save(&self, state: &PersistedState) {
        let round = &state.round;
        let inputs = &state.inputs;
        let counts = [
            &inputs.powerful,
            &inputs.strong,
            &inputs.regular,
            &inputs.easy,
        ];

        let mut batch: Vec<(String, Value)> = COUNT_KEYS
            .iter()
            .zip(counts)
            .map(|(key, raw)| (self.key(key), json!(raw)))
            .collect();
        batch.push((self.key(ROLL), json!(inputs.roll)));
        self.push_serialized(&mut batch, ROSTER, &state.roster);
        self.push_serialized(&mut batch, TRACK, &state.track);
        batch.push((self.key(CURSOR), json!(round.cursor())));
        batch.push((self.key(ROUND_NUMBER), json!(round.round_number())));
        batch.push((
            self.key(PENDING_ROUND_START),
            json!(round.pending_round_start()),
        ));
        self.push_serialized(&mut batch, TOUCHED, &round.touched());
        batch.push((
            self.key(NEXT_SEQUENCE_NUMBER),
            json!(state.next_sequence_number),
        ));

        if let Err(e) = self.store.set_many(batch) {
            warn!(namespace = ?self.namespace, error = %e, "failed to persist encounter state");
        }
    }

    /// Reads every key, falling back per key to the defaults: empty roster,
    /// cursor 0, round 1, no pending round start.
    #[must_use]
    pub fn load(&self) -> PersistedState {
        let [powerful, strong, regular, easy] =
            COUNT_KEYS.map(|key| self.read::<String>(key).unwrap_or_default());
        let inputs = RawInputs {
            powerful,
            strong,
            regular,
            easy,
            roll: self.read::<String>(ROLL).unwrap_or_default(),
        };

        let roster = self
            .read::<Roster>(ROSTER)
            .map(|r| Roster::from_combatants(r.combatants().to_vec()))
            .unwrap_or_default();
        let track = build_track(&roster);
        if let Some(saved) = self.read::<Track>(TRACK)
            && saved != track
        {
            warn!(namespace = ?self.namespace, "saved track disagrees with roster; rebuilt it");
        }

        let round = if roster.is_empty() {
            RoundState::Empty
        } else {
            let cursor = self
                .read::<usize>(CURSOR)
                .filter(|c| *c < track.len())
                .unwrap_or(0);
            let round_number = self.read::<u32>(ROUND_NUMBER).unwrap_or(1);
            let pending = self.read::<bool>(PENDING_ROUND_START).unwrap_or(false);
            let mut touched: BTreeSet<CombatantId> = self
                .read::<Vec<CombatantId>>(TOUCHED)
                .unwrap_or_default()
                .into_iter()
                .filter(|id| roster.contains(*id))
                .collect();
            if touched.is_empty() {
                touched.extend(track.owner_at(cursor));
            }
            RoundState::restored(cursor, round_number, touched, pending)
        };

        let next_sequence_number = self
            .read::<i64>(NEXT_SEQUENCE_NUMBER)
            .filter(|n| *n >= 1)
            .unwrap_or(1);

        PersistedState {
            inputs,
            roster,
            track,
            round,
            next_sequence_number,
        }
    }

    fn push_serialized<T: Serialize>(
        &self,
        batch: &mut Vec<(String, Value)>,
        name: &str,
        value: &T,
    ) {
        match serde_json::to_value(value) {
            Ok(json) => batch.push((self.key(name), json)),
            Err(e) => warn!(key = name, error = %e, "failed to serialize encounter state"),
        }
    }

    fn read<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let key = self.key(name);
        let value = match self.store.get(&key) {
            Ok(value) => value?,
            Err(e) => {
                warn!(%key, error = %e, "failed to load encounter state");
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(%key, error = %e, "ignoring malformed encounter state");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::roster::RosterCounts;
    use initiative_core::store::InMemoryStore;
    use initiative_test_support::{FailingStore, MockRng, RecordingStore};

    fn active_state() -> PersistedState {
        let roster = Roster::initialize(&RosterCounts {
            powerful: 1,
            easy: 1,
            ..RosterCounts::default()
        });
        let track = build_track(&roster);
        let round = RoundState::start_encounter(&roster, &track, &mut MockRng).state;
        let round = round.step(&roster, &track, 1, &mut MockRng).state;
        PersistedState {
            inputs: RawInputs {
                powerful: "1".into(),
                easy: "1".into(),
                roll: "1".into(),
                ..RawInputs::default()
            },
            roster,
            track,
            round,
            next_sequence_number: 5,
        }
    }

    #[test]
    fn test_save_then_load_restores_state() {
        let store = StateStore::new(Arc::new(InMemoryStore::new()));
        let state = active_state();

        store.save(&state);
        let loaded = store.load();

        assert_eq!(loaded, state);
    }

    #[test]
    fn test_save_writes_documented_keys() {
        let recording = Arc::new(RecordingStore::new());
        let store = StateStore::new(recording.clone());

        store.save(&active_state());

        assert_eq!(recording.value("cursor"), Some(json!(2)));
        assert_eq!(recording.value("roundNumber"), Some(json!(1)));
        assert_eq!(recording.value("pendingRoundStart"), Some(json!(false)));
        assert_eq!(recording.value("touched"), Some(json!([1])));
        assert_eq!(recording.value("c4"), Some(json!("1")));
        assert_eq!(recording.value("nextSequenceNumber"), Some(json!(5)));
        assert_eq!(recording.value("roll"), Some(json!("1")));
        assert_eq!(
            recording.value("roster"),
            Some(json!([{"id": 1, "strength": 4}, {"id": 2, "strength": 1}]))
        );
    }

    #[test]
    fn test_save_is_a_single_batch() {
        let recording = Arc::new(RecordingStore::new());
        let store = StateStore::new(recording.clone());

        store.save(&active_state());

        assert_eq!(recording.batch_count(), 1);
        assert_eq!(recording.written_keys().len(), 12);
    }

    #[test]
    fn test_load_ignores_non_positive_sequence_number() {
        let store = StateStore::new(Arc::new(RecordingStore::with_entries([(
            "nextSequenceNumber",
            json!(0),
        )])));

        assert_eq!(store.load().next_sequence_number, 1);
    }

    #[test]
    fn test_namespace_prefixes_keys() {
        let recording = Arc::new(RecordingStore::new());
        let store = StateStore::namespaced(recording.clone(), "abc");

        store.save(&active_state());

        assert!(recording.written_keys().iter().all(|k| k.starts_with("abc:")));
        assert!(store.has_saved_state());
        assert!(!StateStore::new(recording).has_saved_state());
    }

    #[test]
    fn test_load_from_empty_store_uses_defaults() {
        let store = StateStore::new(Arc::new(InMemoryStore::new()));

        let loaded = store.load();

        assert_eq!(loaded, PersistedState::default());
    }

    #[test]
    fn test_load_from_failing_store_uses_defaults() {
        let store = StateStore::new(Arc::new(FailingStore));

        store.save(&active_state());
        let loaded = store.load();

        assert_eq!(loaded, PersistedState::default());
    }

    #[test]
    fn test_load_defaults_round_number_to_one() {
        let store = StateStore::new(Arc::new(RecordingStore::with_entries([(
            "roster",
            json!([{"id": 1, "strength": 2}]),
        )])));

        let loaded = store.load();

        assert_eq!(loaded.round.round_number(), 1);
        assert_eq!(loaded.round.cursor(), 0);
        assert!(!loaded.round.pending_round_start());
        assert_eq!(loaded.round.touched(), vec![CombatantId(1)]);
    }

    #[test]
    fn test_load_repairs_out_of_range_cursor_and_stale_touched() {
        let store = StateStore::new(Arc::new(RecordingStore::with_entries([
            ("roster", json!([{"id": 3, "strength": 1}])),
            ("cursor", json!(8)),
            ("touched", json!([3, 9])),
            ("pendingRoundStart", json!(true)),
            ("roundNumber", json!(4)),
        ])));

        let loaded = store.load();

        assert_eq!(loaded.round.cursor(), 0);
        assert_eq!(loaded.round.touched(), vec![CombatantId(3)]);
        assert!(loaded.round.pending_round_start());
        assert_eq!(loaded.round.round_number(), 4);
    }

    #[test]
    fn test_load_ignores_malformed_values() {
        let store = StateStore::new(Arc::new(RecordingStore::with_entries([
            ("roster", json!([{"id": 1, "strength": 7}])),
            ("cursor", json!("two")),
            ("c4", json!(12)),
        ])));

        let loaded = store.load();

        assert!(loaded.roster.is_empty());
        assert_eq!(loaded.round, RoundState::Empty);
        assert_eq!(loaded.inputs.powerful, "");
    }

    #[test]
    fn test_load_rebuilds_stale_track() {
        let store = StateStore::new(Arc::new(RecordingStore::with_entries([
            ("roster", json!([{"id": 1, "strength": 2}])),
            ("track", json!([])),
        ])));

        let loaded = store.load();

        assert_eq!(loaded.track.len(), 2);
    }
}
