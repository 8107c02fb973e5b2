//! Chapca flow endpoints.
//!
//! Flows live in the shared registry. Every mutation happens under its
//! write lock, so the save guard is already `Saving` by the time the lock
//! is released and the session write is awaited.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use mida_common::{CaptchaKind, ChapcaSession, MidaError};
use crate::flow::{ChapcaFlow, ChapcaSettings, ChapcaStep, FlowStatus, SaveState};
use crate::routes::{ApiResult, require_email};
use crate::state::AppState;
use crate::store::generate_id;

/// Snapshot of a flow for the client
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowView {
    id: String,
    email: String,
    status: FlowStatus,
    plan: Vec<CaptchaKind>,
    current: Option<CaptchaKind>,
    /// Expected literal for the current date widget
    #[serde(skip_serializing_if = "Option::is_none")]
    expected: Option<String>,
    attempts: usize,
    save_state: SaveState,
}

impl FlowView {
    fn of(id: &str, flow: &ChapcaFlow) -> Self {
        let current = flow.current();
        Self {
            id: id.to_string(),
            email: flow.email().to_string(),
            status: flow.status(),
            plan: flow.plan().to_vec(),
            current,
            expected: current.and_then(|kind| flow.settings().expected_for(kind)),
            attempts: flow.attempts().len(),
            save_state: flow.save_state(),
        }
    }
}

fn unknown_flow(id: &str) -> MidaError {
    MidaError::NotFound(format!("chapca flow '{}'", id))
}

#[derive(Deserialize)]
pub struct StartRequest {
    email: String,
    settings: ChapcaSettings,
}

/// Create and start a flow
pub async fn start_flow(
    State(state): State<AppState>,
    Json(payload): Json<StartRequest>,
) -> ApiResult<FlowView> {
    require_email(&payload.email)?;
    let now = state.now();
    let mut flow = ChapcaFlow::new(payload.email.trim(), payload.settings, &mut rand::rng())?;
    flow.start(now)?;

    let id = generate_id();
    let view = FlowView::of(&id, &flow);
    let evicted = state.chapca_flows.write().await.insert(id.clone(), flow, now);
    if evicted > 0 {
        tracing::info!(evicted, "Evicted idle chapca flows");
    }

    tracing::info!(flow_id = %id, widgets = view.plan.len(), "Chapca flow started");
    Ok(Json(view))
}

pub async fn get_flow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<FlowView> {
    let flows = state.chapca_flows.read().await;
    let flow = flows.get(&id).ok_or_else(|| unknown_flow(&id))?;
    Ok(Json(FlowView::of(&id, flow)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRequest {
    is_correct: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Retry,
    Advanced,
    Finished,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResponse {
    step: StepKind,
    flow: FlowView,
    /// Id of the stored session when this attempt completed the flow
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

/// Report the outcome of the current widget
pub async fn record_attempt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<AttemptRequest>,
) -> ApiResult<AttemptResponse> {
    let now = state.now();
    let (step, view) = {
        let mut flows = state.chapca_flows.write().await;
        let flow = flows.get_mut(&id, now).ok_or_else(|| unknown_flow(&id))?;
        let step = flow.record(payload.is_correct, now)?;
        (step, FlowView::of(&id, flow))
    };

    let response = match step {
        ChapcaStep::Retry => AttemptResponse {
            step: StepKind::Retry,
            flow: view,
            session_id: None,
        },
        ChapcaStep::Advanced { .. } => AttemptResponse {
            step: StepKind::Advanced,
            flow: view,
            session_id: None,
        },
        ChapcaStep::Finished(None) => AttemptResponse {
            step: StepKind::Finished,
            flow: view,
            session_id: None,
        },
        ChapcaStep::Finished(Some(session)) => {
            let (session_id, view) = persist(&state, &id, session).await?;
            AttemptResponse {
                step: StepKind::Finished,
                flow: view,
                session_id: Some(session_id),
            }
        }
    };
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedResponse {
    flow: FlowView,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

/// Retry the session write after a failure
pub async fn retry_save(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SavedResponse> {
    let session = {
        let mut flows = state.chapca_flows.write().await;
        let flow = flows
            .get_mut(&id, state.now())
            .ok_or_else(|| unknown_flow(&id))?;
        flow.retry_save()
            .ok_or_else(|| MidaError::Conflict("no failed save to retry".to_string()))?
    };

    let (session_id, flow) = persist(&state, &id, session).await?;
    Ok(Json(SavedResponse {
        flow,
        session_id: Some(session_id),
    }))
}

/// Leave a flow; progress so far is stored if any attempt was made.
/// A flow whose partial write failed or is in flight stays registered so
/// the save can still be retried.
pub async fn abandon_flow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SavedResponse> {
    let now = state.now();
    let partial = {
        let mut flows = state.chapca_flows.write().await;
        let flow = flows.get_mut(&id, now).ok_or_else(|| unknown_flow(&id))?;
        match flow.abandon(now) {
            Some(session) => session,
            None => {
                let view = FlowView::of(&id, flow);
                if flow.is_settled() {
                    flows.remove(&id);
                }
                return Ok(Json(SavedResponse {
                    flow: view,
                    session_id: None,
                }));
            }
        }
    };

    tracing::info!(flow_id = %id, attempts = partial.attempts.len(), "Chapca flow abandoned");
    let (session_id, flow) = persist(&state, &id, partial).await?;
    Ok(Json(SavedResponse {
        flow,
        session_id: Some(session_id),
    }))
}

/// Write a claimed session and report the result back to its flow.
/// Finished flows leave the registry once stored.
async fn persist(
    state: &AppState,
    id: &str,
    session: ChapcaSession,
) -> Result<(String, FlowView), MidaError> {
    let result = state.sessions.save_chapca(&session).await;

    let mut flows = state.chapca_flows.write().await;
    let flow = flows
        .get_mut(id, state.now())
        .ok_or_else(|| unknown_flow(id))?;
    match result {
        Ok(session_id) => {
            flow.save_succeeded();
            let view = FlowView::of(id, flow);
            if flow.is_settled() {
                flows.remove(id);
            }
            tracing::info!(flow_id = %id, session_id = %session_id, "Chapca session saved");
            Ok((session_id, view))
        }
        Err(e) => {
            flow.save_failed();
            tracing::error!(flow_id = %id, error = %e, "Failed to save chapca session");
            Err(e)
        }
    }
}
