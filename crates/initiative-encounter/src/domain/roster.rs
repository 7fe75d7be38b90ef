//! Roster of combatants and id assignment.
//!
//! A `Roster` is an immutable value: adding or removing a combatant yields a
//! new roster and leaves the original untouched.

use std::fmt;

use initiative_core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Upper bound applied to each tier count when initializing a roster.
pub const MAX_TIER_COUNT: u32 = 999;

/// Strength tier of a combatant. A tier-N combatant occupies N slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Strength {
    /// Tier 1.
    Easy = 1,
    /// Tier 2.
    Regular = 2,
    /// Tier 3.
    Strong = 3,
    /// Tier 4, the elite tier.
    Powerful = 4,
}

impl Strength {
    /// All tiers, strongest first.
    pub const DESCENDING: [Self; 4] = [Self::Powerful, Self::Strong, Self::Regular, Self::Easy];

    /// Number of track slots a combatant of this tier occupies.
    #[must_use]
    pub const fn slots(self) -> u8 {
        self as u8
    }

    /// Whether this tier is subject to the per-round forced action.
    #[must_use]
    pub const fn is_elite(self) -> bool {
        matches!(self, Self::Powerful)
    }
}

impl TryFrom<u8> for Strength {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Easy),
            2 => Ok(Self::Regular),
            3 => Ok(Self::Strong),
            4 => Ok(Self::Powerful),
            other => Err(DomainError::Validation(format!(
                "strength must be between 1 and 4, got {other}"
            ))),
        }
    }
}

impl From<Strength> for u8 {
    fn from(strength: Strength) -> Self {
        strength.slots()
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.slots())
    }
}

/// Identifier of a combatant, unique within a roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CombatantId(pub u32);

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A participant in the encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    /// Roster-unique identifier.
    pub id: CombatantId,
    /// Strength tier.
    pub strength: Strength,
}

/// Number of combatants requested per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterCounts {
    /// Tier-4 combatants.
    #[serde(rename = "4", default)]
    pub powerful: u32,
    /// Tier-3 combatants.
    #[serde(rename = "3", default)]
    pub strong: u32,
    /// Tier-2 combatants.
    #[serde(rename = "2", default)]
    pub regular: u32,
    /// Tier-1 combatants.
    #[serde(rename = "1", default)]
    pub easy: u32,
}

impl RosterCounts {
    /// Returns the count requested for `strength`.
    #[must_use]
    pub const fn of(&self, strength: Strength) -> u32 {
        match strength {
            Strength::Powerful => self.powerful,
            Strength::Strong => self.strong,
            Strength::Regular => self.regular,
            Strength::Easy => self.easy,
        }
    }

    /// Checks every tier against [`MAX_TIER_COUNT`].
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` naming the first tier over the
    /// limit.
    pub fn validate(&self) -> Result<(), DomainError> {
        match Strength::DESCENDING
            .into_iter()
            .find(|s| self.of(*s) > MAX_TIER_COUNT)
        {
            Some(strength) => Err(DomainError::Validation(format!(
                "at most {MAX_TIER_COUNT} combatants per tier, got {} for tier {}",
                self.of(strength),
                strength.slots()
            ))),
            None => Ok(()),
        }
    }

    /// Total number of combatants requested.
    #[must_use]
    pub fn total(&self) -> u64 {
        Strength::DESCENDING
            .iter()
            .map(|s| u64::from(self.of(*s)))
            .sum()
    }
}

/// The current set of combatants, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    combatants: Vec<Combatant>,
}

impl Roster {
    /// Creates an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates fresh ids `1..=N`, strongest tier first, so that id order
    /// agrees with track order. Counts above [`MAX_TIER_COUNT`] are capped.
    #[must_use]
    pub fn initialize(counts: &RosterCounts) -> Self {
        let mut combatants = Vec::new();
        let mut next = 1;
        for strength in Strength::DESCENDING {
            for _ in 0..counts.of(strength).min(MAX_TIER_COUNT) {
                combatants.push(Combatant {
                    id: CombatantId(next),
                    strength,
                });
                next += 1;
            }
        }
        Self { combatants }
    }

    /// Builds a roster from existing combatants, dropping repeated ids.
    #[must_use]
    pub fn from_combatants(combatants: Vec<Combatant>) -> Self {
        let mut unique: Vec<Combatant> = Vec::with_capacity(combatants.len());
        for combatant in combatants {
            if !unique.iter().any(|c| c.id == combatant.id) {
                unique.push(combatant);
            }
        }
        Self { combatants: unique }
    }

    /// Combatants in insertion order.
    #[must_use]
    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }

    /// Number of combatants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    /// Whether the roster has no combatants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.combatants.is_empty()
    }

    /// Looks up a combatant by id.
    #[must_use]
    pub fn get(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    /// Whether a combatant with `id` is present.
    #[must_use]
    pub fn contains(&self, id: CombatantId) -> bool {
        self.get(id).is_some()
    }

    /// Strength of the combatant with `id`, if present.
    #[must_use]
    pub fn strength_of(&self, id: CombatantId) -> Option<Strength> {
        self.get(id).map(|c| c.strength)
    }

    /// Whether any combatant is elite.
    #[must_use]
    pub fn has_elite(&self) -> bool {
        self.combatants.iter().any(|c| c.strength.is_elite())
    }

    /// Ids of the elite combatants, in roster order.
    #[must_use]
    pub fn elites(&self) -> Vec<CombatantId> {
        self.combatants
            .iter()
            .filter(|c| c.strength.is_elite())
            .map(|c| c.id)
            .collect()
    }

    /// The id the next added combatant receives: one past the largest
    /// existing id, or 1 for an empty roster.
    #[must_use]
    pub fn next_id(&self) -> CombatantId {
        let max = self.combatants.iter().map(|c| c.id.0).max().unwrap_or(0);
        CombatantId(max.saturating_add(1))
    }

    /// Returns a roster with a new combatant appended, and its id.
    #[must_use]
    pub fn with_added(&self, strength: Strength) -> (Self, CombatantId) {
        let id = self.next_id();
        let mut combatants = self.combatants.clone();
        combatants.push(Combatant { id, strength });
        (Self { combatants }, id)
    }

    /// Returns a roster without the combatant `id`, or `None` if no such
    /// combatant is present.
    #[must_use]
    pub fn without(&self, id: CombatantId) -> Option<Self> {
        if !self.contains(id) {
            return None;
        }
        let combatants = self
            .combatants
            .iter()
            .copied()
            .filter(|c| c.id != id)
            .collect();
        Some(Self { combatants })
    }
}
