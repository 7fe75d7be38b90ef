//! Initiative API server entry point.

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use initiative_api::build_router;
use initiative_api::config::ApiConfig;
use initiative_api::state::{AppState, RngFactory};
use initiative_core::clock::SystemClock;
use initiative_core::rng::{DeterministicRng, SystemRng};
use initiative_core::store::{InMemoryStore, KeyValueStore};
use initiative_store::JsonFileStore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting initiative API server");

    let config = ApiConfig::from_env()?;

    let store: Arc<dyn KeyValueStore> = match &config.state_file {
        Some(path) => {
            tracing::info!(path = %path.display(), "persisting encounters to file");
            Arc::new(JsonFileStore::open(path)?)
        }
        None => Arc::new(InMemoryStore::new()),
    };

    let app_state = AppState::new(store, Arc::new(SystemClock), rng_factory(config.rng_seed))
        .with_session_capacity(config.session_capacity);

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = build_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.socket_addr()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}

/// Each encounter gets its own generator. With a seed, the n-th encounter
/// created is seeded with `seed + n`, so a run is reproducible.
fn rng_factory(seed: Option<u64>) -> RngFactory {
    match seed {
        Some(seed) => {
            let next = AtomicU64::new(seed);
            Arc::new(move || {
                let seed = next.fetch_add(1, Ordering::Relaxed);
                Box::new(SystemRng::seeded(seed)) as Box<dyn DeterministicRng>
            })
        }
        None => Arc::new(|| Box::new(SystemRng::from_entropy()) as Box<dyn DeterministicRng>),
    }
}
