//! Initiative Core — shared abstractions.
//!
//! This crate defines the traits and types the encounter context and its
//! adapters depend on: errors, randomness, time, commands, events and the
//! key-value persistence seam. It contains no turn-sequencing logic.

pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod rng;
pub mod store;
