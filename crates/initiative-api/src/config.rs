//! Server configuration read from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::AppError;
use crate::state::DEFAULT_SESSION_CAPACITY;

/// Runtime configuration for the API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Interface to bind (`HOST`, default `0.0.0.0`).
    pub host: String,
    /// Port to bind (`PORT`, default `3000`).
    pub port: u16,
    /// JSON file that encounter state is saved to (`STATE_FILE`). State is
    /// kept in memory only when unset.
    pub state_file: Option<PathBuf>,
    /// Seed for reproducible rolls (`RNG_SEED`). Entropy is used when unset.
    pub rng_seed: Option<u64>,
    /// Live encounters kept in memory (`SESSION_CAPACITY`, default 1024).
    /// Older idle encounters are reloaded from the store on demand.
    pub session_capacity: usize,
}

impl ApiConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set to an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?,
            None => 3000,
        };
        let state_file = lookup("STATE_FILE")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        let rng_seed = lookup("RNG_SEED")
            .map(|raw| {
                raw.parse::<u64>()
                    .map_err(|e| AppError::Config(format!("RNG_SEED must be a valid u64: {e}")))
            })
            .transpose()?;
        let session_capacity = match lookup("SESSION_CAPACITY") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|capacity| *capacity > 0)
                .ok_or_else(|| {
                    AppError::Config(format!(
                        "SESSION_CAPACITY must be a positive integer, got {raw:?}"
                    ))
                })?,
            None => DEFAULT_SESSION_CAPACITY,
        };

        Ok(Self {
            host,
            port,
            state_file,
            rng_seed,
            session_capacity,
        })
    }

    /// The socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `host` and `port` do not form a valid
    /// address.
    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}
