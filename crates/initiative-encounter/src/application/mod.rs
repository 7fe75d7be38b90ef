//! Application layer: the sequencer facade and its adapters.

pub mod input;
pub mod persistence;
pub mod query_handlers;
pub mod sequencer;
