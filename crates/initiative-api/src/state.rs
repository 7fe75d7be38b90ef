//! Shared application state.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use initiative_core::clock::Clock;
use initiative_core::error::DomainError;
use initiative_core::rng::DeterministicRng;
use initiative_core::store::KeyValueStore;
use initiative_encounter::application::persistence::StateStore;
use initiative_encounter::application::sequencer::Sequencer;
use tracing::debug;
use uuid::Uuid;

/// Number of encounters kept live when no capacity is configured.
pub const DEFAULT_SESSION_CAPACITY: usize = 1024;

/// Produces a fresh random source for each new encounter.
pub type RngFactory = Arc<dyn Fn() -> Box<dyn DeterministicRng> + Send + Sync>;

type SharedSequencer = Arc<Mutex<Sequencer>>;

#[derive(Debug)]
struct SessionEntry {
    sequencer: SharedSequencer,
    last_used: u64,
}

/// Live encounters, bounded by a capacity.
///
/// Past the capacity the least recently used idle encounter is dropped.
/// Every encounter is saved after each command, so a dropped one is
/// restored from the store on its next request.
#[derive(Debug)]
pub struct Sessions {
    entries: HashMap<Uuid, SessionEntry>,
    capacity: usize,
    tick: u64,
}

impl Sessions {
    /// Creates an empty map holding at most `capacity` encounters (at
    /// least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            tick: 0,
        }
    }

    /// Number of live encounters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no encounter is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `encounter_id` is live.
    #[must_use]
    pub fn contains(&self, encounter_id: Uuid) -> bool {
        self.entries.contains_key(&encounter_id)
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn touch(&mut self, encounter_id: Uuid) -> Option<SharedSequencer> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(&encounter_id)?;
        entry.last_used = tick;
        Some(entry.sequencer.clone())
    }

    fn insert(&mut self, encounter_id: Uuid, sequencer: Sequencer) -> SharedSequencer {
        let last_used = self.next_tick();
        let sequencer = Arc::new(Mutex::new(sequencer));
        self.entries.insert(
            encounter_id,
            SessionEntry {
                sequencer: sequencer.clone(),
                last_used,
            },
        );
        self.evict_idle();
        sequencer
    }

    fn evict_idle(&mut self) {
        while self.entries.len() > self.capacity {
            // Encounters with a command in flight hold a second reference.
            let victim = self
                .entries
                .iter()
                .filter(|(_, entry)| Arc::strong_count(&entry.sequencer) == 1)
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| *id);
            let Some(encounter_id) = victim else {
                break;
            };
            self.entries.remove(&encounter_id);
            debug!(%encounter_id, "evicted idle encounter");
        }
    }
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live encounters, keyed by encounter id.
    pub sessions: Arc<Mutex<Sessions>>,
    /// Backing store; each encounter writes under its own key namespace.
    pub store: Arc<dyn KeyValueStore>,
    /// Clock for event timestamps.
    pub clock: Arc<dyn Clock>,
    /// Source of per-encounter random number generators.
    pub rng_factory: RngFactory,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create new application state holding up to
    /// [`DEFAULT_SESSION_CAPACITY`] live encounters.
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        rng_factory: RngFactory,
    ) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(Sessions::new(DEFAULT_SESSION_CAPACITY))),
            store,
            clock,
            rng_factory,
        }
    }

    /// Replaces the live-encounter capacity.
    #[must_use]
    pub fn with_session_capacity(mut self, capacity: usize) -> Self {
        self.sessions = Arc::new(Mutex::new(Sessions::new(capacity)));
        self
    }

    /// Registers and saves a new, empty encounter and returns its id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the session map is poisoned
    /// or the blocking task fails.
    pub async fn create_encounter(&self) -> Result<Uuid, DomainError> {
        let state = self.clone();
        run_blocking(move || state.create_encounter_blocking()).await
    }

    /// Runs `f` against the encounter, restoring it from the store first if
    /// it is not live in this process. Store I/O happens on the blocking
    /// pool, and only this encounter is locked while `f` runs.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EncounterNotFound` if the encounter is neither
    /// live nor saved, or `DomainError::Infrastructure` if a lock is
    /// poisoned or the blocking task fails.
    pub async fn with_encounter<T, F>(&self, encounter_id: Uuid, f: F) -> Result<T, DomainError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Sequencer) -> T + Send + 'static,
    {
        let state = self.clone();
        run_blocking(move || {
            let sequencer = state.session(encounter_id)?;
            let mut sequencer = sequencer.lock().map_err(|e| {
                DomainError::Infrastructure(format!("encounter lock poisoned: {e}"))
            })?;
            Ok(f(&mut sequencer))
        })
        .await
    }

    fn create_encounter_blocking(&self) -> Result<Uuid, DomainError> {
        let encounter_id = Uuid::new_v4();
        let sequencer = Sequencer::new(encounter_id, (self.rng_factory)(), self.clock.clone())
            .with_store(self.state_store(encounter_id));
        sequencer.persist();
        self.lock_sessions()?.insert(encounter_id, sequencer);
        Ok(encounter_id)
    }

    fn session(&self, encounter_id: Uuid) -> Result<SharedSequencer, DomainError> {
        let mut sessions = self.lock_sessions()?;
        if let Some(sequencer) = sessions.touch(encounter_id) {
            return Ok(sequencer);
        }

        let store = self.state_store(encounter_id);
        if !store.has_saved_state() {
            return Err(DomainError::EncounterNotFound(encounter_id));
        }
        debug!(%encounter_id, "restoring encounter from store");
        let sequencer =
            Sequencer::restore(encounter_id, (self.rng_factory)(), self.clock.clone(), store);
        Ok(sessions.insert(encounter_id, sequencer))
    }

    fn state_store(&self, encounter_id: Uuid) -> StateStore {
        StateStore::namespaced(self.store.clone(), encounter_id.to_string())
    }

    fn lock_sessions(&self) -> Result<MutexGuard<'_, Sessions>, DomainError> {
        self.sessions
            .lock()
            .map_err(|e| DomainError::Infrastructure(format!("session lock poisoned: {e}")))
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, DomainError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, DomainError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DomainError::Infrastructure(format!("encounter task failed: {e}")))?
}
