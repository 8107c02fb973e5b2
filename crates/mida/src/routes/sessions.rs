//! Session history endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use mida_common::{AimSession, Collection, MidaError, SalesSession};
use crate::routes::{ApiResult, require_email};
use crate::state::AppState;
use crate::store::Claim;

#[derive(Debug, Serialize)]
pub struct SavedSession {
    id: String,
    /// True when this playthrough was already stored and nothing was written
    duplicate: bool,
}

/// A finished summary tagged with the client's playthrough id. Replays of
/// the same playthrough are answered with the first write's id.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest<T> {
    playthrough_id: String,
    #[serde(flatten)]
    session: T,
}

/// Store a finished aim trainer game
pub async fn save_aim(
    State(state): State<AppState>,
    Json(request): Json<SaveRequest<AimSession>>,
) -> ApiResult<SavedSession> {
    let SaveRequest {
        playthrough_id,
        mut session,
    } = request;
    require_email(&session.email)?;
    check_bounds(session.start_time <= session.end_time)?;
    if let Some(saved) = claim(&state, Collection::Aim, &playthrough_id).await? {
        return Ok(Json(saved));
    }

    session.created_at = state.now();
    let result = state.sessions.save_aim(&session).await;
    let saved = settle(&state, Collection::Aim, &playthrough_id, result).await?;
    tracing::info!(id = %saved.id, score = session.score, mode = ?session.game_mode, "Aim session saved");
    Ok(Json(saved))
}

/// Store a finished sales simulation
pub async fn save_sales(
    State(state): State<AppState>,
    Json(request): Json<SaveRequest<SalesSession>>,
) -> ApiResult<SavedSession> {
    let SaveRequest {
        playthrough_id,
        mut session,
    } = request;
    require_email(&session.email)?;
    check_bounds(session.start_time <= session.end_time)?;
    if let Some(saved) = claim(&state, Collection::Sales, &playthrough_id).await? {
        return Ok(Json(saved));
    }

    session.created_at = state.now();
    let result = state.sessions.save_sales(&session).await;
    let saved = settle(&state, Collection::Sales, &playthrough_id, result).await?;
    tracing::info!(id = %saved.id, project = %session.project, "Sales session saved");
    Ok(Json(saved))
}

/// Take the playthrough's single write. `Some` means it is already stored.
async fn claim(
    state: &AppState,
    collection: Collection,
    playthrough_id: &str,
) -> Result<Option<SavedSession>, MidaError> {
    if playthrough_id.trim().is_empty() {
        return Err(MidaError::InvalidInput("playthroughId is required".to_string()));
    }

    match state.sessions.claim_playthrough(collection, playthrough_id).await? {
        Claim::Granted => Ok(None),
        Claim::Stored(id) => {
            tracing::debug!(playthrough_id = %playthrough_id, id = %id, "Duplicate session ignored");
            Ok(Some(SavedSession {
                id,
                duplicate: true,
            }))
        }
        Claim::InFlight => Err(MidaError::Conflict(
            "this playthrough is already being saved".to_string(),
        )),
    }
}

/// Finish a claimed write: remember the id, or free the claim for a retry
async fn settle(
    state: &AppState,
    collection: Collection,
    playthrough_id: &str,
    result: Result<String, MidaError>,
) -> Result<SavedSession, MidaError> {
    match result {
        Ok(id) => {
            if let Err(e) = state
                .sessions
                .complete_playthrough(collection, playthrough_id, &id)
                .await
            {
                tracing::warn!(playthrough_id = %playthrough_id, error = %e, "Failed to record stored playthrough");
            }
            Ok(SavedSession {
                id,
                duplicate: false,
            })
        }
        Err(e) => {
            if let Err(release) = state
                .sessions
                .release_playthrough(collection, playthrough_id)
                .await
            {
                tracing::warn!(playthrough_id = %playthrough_id, error = %release, "Failed to release playthrough");
            }
            Err(e)
        }
    }
}

fn check_bounds(ordered: bool) -> Result<(), MidaError> {
    if ordered {
        Ok(())
    } else {
        Err(MidaError::InvalidInput("endTime is before startTime".to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    page_size: Option<usize>,
    cursor: Option<String>,
}

/// One page of a user's sessions, newest first
pub async fn list_sessions(
    State(state): State<AppState>,
    Path((collection, email)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> ApiResult<serde_json::Value> {
    let collection: Collection = collection.parse()?;
    require_email(&email)?;
    let page_size = state.config.history.page_size(query.page_size);
    let cursor = query.cursor.as_deref().filter(|c| !c.is_empty());

    let page = match collection {
        Collection::Chapca => to_json(state.sessions.list_chapca(&email, page_size, cursor).await?),
        Collection::Aim => to_json(state.sessions.list_aim(&email, page_size, cursor).await?),
        Collection::Sales => to_json(state.sessions.list_sales(&email, page_size, cursor).await?),
    }?;
    Ok(Json(page))
}

fn to_json<T: Serialize>(page: T) -> Result<serde_json::Value, MidaError> {
    serde_json::to_value(page).map_err(|e| MidaError::Internal(e.to_string()))
}
