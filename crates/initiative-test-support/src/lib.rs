//! Shared test mocks and utilities for the initiative turn sequencer.

mod clock;
mod rng;
mod store;

pub use clock::{FixedClock, fixed_clock};
pub use rng::{MockRng, SequenceRng};
pub use store::{FailingStore, RecordingStore};
