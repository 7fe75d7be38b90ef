//! Initiative Store — persistence adapters for the turn sequencer.

pub mod json_file_store;

pub use json_file_store::JsonFileStore;
