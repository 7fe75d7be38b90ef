//! Domain model: roster, track and the round state machine.

pub mod commands;
pub mod events;
pub mod roster;
pub mod round;
pub mod track;
