//! Routes for encounter sessions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use initiative_core::error::DomainError;
use initiative_encounter::application::query_handlers::Snapshot;
use initiative_encounter::application::sequencer::Sequencer;
use initiative_encounter::domain::commands::{
    AddCombatant, CountsInput, RawInputs, Ready, RemoveCombatant, Reset, RollInput, SubmitRoll,
    UpdateInputs,
};
use initiative_encounter::domain::events::EncounterEvent;
use initiative_encounter::domain::roster::{CombatantId, Strength};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /{id}/ready.
#[derive(Debug, Default, Deserialize)]
pub struct ReadyRequest {
    /// Per-tier counts as numbers or text. When absent, the stored count
    /// fields are parsed.
    #[serde(default)]
    pub counts: Option<CountsInput>,
}

/// Request body for POST /{id}/combatants.
#[derive(Debug, Deserialize)]
pub struct AddCombatantRequest {
    /// Tier of the new combatant, 1-4.
    pub strength: i64,
}

/// Request body for POST /{id}/rolls.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitRollRequest {
    /// The die result. When absent, the stored roll field is used.
    #[serde(default)]
    pub roll: Option<RollInput>,
}

/// Request body for POST /{id}/reset.
#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    /// Also clear the stored input fields.
    #[serde(default)]
    pub clear_inputs: bool,
}

/// Response body returned after a command or query.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// State after the command.
    pub state: Snapshot,
    /// Events the command produced, in order.
    pub events: Vec<EncounterEvent>,
}

fn respond(sequencer: &mut Sequencer, state: Snapshot) -> CommandResponse {
    CommandResponse {
        state,
        events: sequencer.take_events(),
    }
}

/// POST /
#[instrument(skip(state))]
async fn create_encounter(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CommandResponse>), ApiError> {
    let encounter_id = state.create_encounter().await?;
    info!(%encounter_id, "created encounter");

    let response = state
        .with_encounter(encounter_id, |sequencer| {
            let snapshot = sequencer.snapshot();
            respond(sequencer, snapshot)
        })
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /{id}
#[instrument(skip(state))]
async fn get_encounter(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
) -> Result<Json<Snapshot>, ApiError> {
    let snapshot = state
        .with_encounter(encounter_id, |sequencer| sequencer.snapshot())
        .await?;
    Ok(Json(snapshot))
}

/// POST /{id}/ready
#[instrument(skip(state, request))]
async fn ready(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<ReadyRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let correlation_id = Uuid::new_v4();
    info!(%correlation_id, "handling ready command");

    let response = state
        .with_encounter(encounter_id, move |sequencer| {
            let counts = match &request.counts {
                Some(counts) => counts.counts(),
                None => sequencer.inputs().counts(),
            };
            counts.validate()?;
            let snapshot = sequencer.ready(&Ready {
                correlation_id,
                counts,
            });
            Ok::<_, DomainError>(respond(sequencer, snapshot))
        })
        .await??;

    Ok(Json(response))
}

/// POST /{id}/combatants
#[instrument(skip(state, request), fields(strength = request.strength))]
async fn add_combatant(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<AddCombatantRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let strength = u8::try_from(request.strength)
        .map_err(|_| {
            DomainError::Validation(format!(
                "strength must be between 1 and 4, got {}",
                request.strength
            ))
        })
        .and_then(Strength::try_from)?;
    let command = AddCombatant {
        correlation_id: Uuid::new_v4(),
        strength,
    };

    info!(correlation_id = %command.correlation_id, "handling add_combatant command");

    let response = state
        .with_encounter(encounter_id, move |sequencer| {
            let snapshot = sequencer.add_combatant(&command);
            respond(sequencer, snapshot)
        })
        .await?;

    Ok(Json(response))
}

/// DELETE /{id}/combatants/{combatant_id}
#[instrument(skip(state))]
async fn remove_combatant(
    State(state): State<AppState>,
    Path((encounter_id, combatant_id)): Path<(Uuid, u32)>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = RemoveCombatant {
        correlation_id: Uuid::new_v4(),
        combatant_id: CombatantId(combatant_id),
    };

    info!(correlation_id = %command.correlation_id, "handling remove_combatant command");

    let response = state
        .with_encounter(encounter_id, move |sequencer| {
            let snapshot = sequencer.remove_combatant(&command);
            respond(sequencer, snapshot)
        })
        .await?;

    Ok(Json(response))
}

/// POST /{id}/rolls
#[instrument(skip(state, request))]
async fn submit_roll(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<SubmitRollRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let correlation_id = Uuid::new_v4();
    info!(%correlation_id, "handling submit_roll command");

    let response = state
        .with_encounter(encounter_id, move |sequencer| {
            let snapshot = match request.roll {
                Some(roll) => sequencer.submit_roll(&SubmitRoll {
                    correlation_id,
                    roll,
                }),
                None => sequencer.apply_roll_input(correlation_id),
            };
            respond(sequencer, snapshot)
        })
        .await?;

    Ok(Json(response))
}

/// POST /{id}/reset
#[instrument(skip(state, request), fields(clear_inputs = request.clear_inputs))]
async fn reset(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = Reset {
        correlation_id: Uuid::new_v4(),
        clear_inputs: request.clear_inputs,
    };

    info!(correlation_id = %command.correlation_id, "handling reset command");

    let response = state
        .with_encounter(encounter_id, move |sequencer| {
            let snapshot = sequencer.reset(&command);
            respond(sequencer, snapshot)
        })
        .await?;

    Ok(Json(response))
}

/// PUT /{id}/inputs
#[instrument(skip(state, inputs))]
async fn update_inputs(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(inputs): Json<RawInputs>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = UpdateInputs {
        correlation_id: Uuid::new_v4(),
        inputs,
    };

    info!(correlation_id = %command.correlation_id, "handling update_inputs command");

    let response = state
        .with_encounter(encounter_id, move |sequencer| {
            let snapshot = sequencer.update_inputs(&command);
            respond(sequencer, snapshot)
        })
        .await?;

    Ok(Json(response))
}

/// Returns the router for encounter sessions.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_encounter))
        .route("/{id}", get(get_encounter))
        .route("/{id}/ready", post(ready))
        .route("/{id}/combatants", post(add_combatant))
        .route("/{id}/combatants/{combatant_id}", delete(remove_combatant))
        .route("/{id}/rolls", post(submit_roll))
        .route("/{id}/reset", post(reset))
        .route("/{id}/inputs", put(update_inputs))
}
