//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
///
/// The turn sequencer itself is total; these errors only surface at the
/// seams around it (input validation, session lookup, persistence).
#[derive(Debug, Error)]
pub enum DomainError {
    /// No encounter session exists for the identifier.
    #[error("encounter not found: {0}")]
    EncounterNotFound(Uuid),

    /// A validation error in caller-supplied input.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
