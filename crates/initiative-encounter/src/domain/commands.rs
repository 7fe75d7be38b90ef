//! Commands for the encounter context.

use initiative_core::command::Command;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::roster::{CombatantId, RosterCounts, Strength};

/// A die result as submitted: either a number or raw text from an input
/// field. Sanitized to a non-negative integer before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RollInput {
    /// A numeric roll.
    Number(f64),
    /// A textual roll, parsed leniently.
    Text(String),
}

impl From<u32> for RollInput {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<f64> for RollInput {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RollInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// A tier count as submitted: a JSON number or text. Sanitized to a
/// non-negative integer before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CountInput {
    /// A numeric count; fractions floor, negatives become 0.
    Number(f64),
    /// A textual count, read like the count input fields.
    Text(String),
}

/// Per-tier counts as submitted. Missing tiers count as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountsInput {
    /// Tier-4 count.
    #[serde(rename = "4", default)]
    pub powerful: Option<CountInput>,
    /// Tier-3 count.
    #[serde(rename = "3", default)]
    pub strong: Option<CountInput>,
    /// Tier-2 count.
    #[serde(rename = "2", default)]
    pub regular: Option<CountInput>,
    /// Tier-1 count.
    #[serde(rename = "1", default)]
    pub easy: Option<CountInput>,
}

/// Raw text of the roster-count and roll input fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInputs {
    /// Tier-4 count field.
    #[serde(rename = "4", default)]
    pub powerful: String,
    /// Tier-3 count field.
    #[serde(rename = "3", default)]
    pub strong: String,
    /// Tier-2 count field.
    #[serde(rename = "2", default)]
    pub regular: String,
    /// Tier-1 count field.
    #[serde(rename = "1", default)]
    pub easy: String,
    /// Die result field.
    #[serde(default)]
    pub roll: String,
}

/// Command to build a fresh roster and start an encounter.
#[derive(Debug, Clone)]
pub struct Ready {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Combatants requested per tier.
    pub counts: RosterCounts,
}

impl Command for Ready {
    fn command_type(&self) -> &'static str {
        "encounter.ready"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to add one combatant mid-encounter.
#[derive(Debug, Clone)]
pub struct AddCombatant {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Tier of the new combatant.
    pub strength: Strength,
}

impl Command for AddCombatant {
    fn command_type(&self) -> &'static str {
        "encounter.add_combatant"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to remove a combatant.
#[derive(Debug, Clone)]
pub struct RemoveCombatant {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The combatant to remove.
    pub combatant_id: CombatantId,
}

impl Command for RemoveCombatant {
    fn command_type(&self) -> &'static str {
        "encounter.remove_combatant"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to advance the cursor by a die result.
#[derive(Debug, Clone)]
pub struct SubmitRoll {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The die result.
    pub roll: RollInput,
}

impl Command for SubmitRoll {
    fn command_type(&self) -> &'static str {
        "encounter.submit_roll"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to clear the roster and round state.
#[derive(Debug, Clone)]
pub struct Reset {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Also clear the raw input fields.
    pub clear_inputs: bool,
}

impl Command for Reset {
    fn command_type(&self) -> &'static str {
        "encounter.reset"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to replace the raw input fields.
#[derive(Debug, Clone)]
pub struct UpdateInputs {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The new field contents.
    pub inputs: RawInputs,
}

impl Command for UpdateInputs {
    fn command_type(&self) -> &'static str {
        "encounter.update_inputs"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
