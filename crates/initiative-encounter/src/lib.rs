//! Initiative — encounter turn sequencing bounded context.
//!
//! Tracks whose turn it is in a round-based encounter. Combatants occupy a
//! track of slots sized by their strength tier, a cursor advances along it
//! by die rolls, and every round is guaranteed to include an action by an
//! elite (tier 4) combatant whenever one is present.

pub mod application;
pub mod domain;
