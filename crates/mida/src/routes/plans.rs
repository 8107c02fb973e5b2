//! Plan previews for the chapca exercise and the sales wizard.

use axum::{Json, extract::State};
use serde::Serialize;

use mida_common::{CaptchaKind, PlanEntry};
use crate::flow::{ChapcaSettings, SalesSettings, expand_plan, generate_plan};
use crate::routes::ApiResult;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ChapcaPlanResponse {
    plan: Vec<CaptchaKind>,
}

/// Expand a chapca selection into its widget sequence
pub async fn chapca_plan(Json(settings): Json<ChapcaSettings>) -> ApiResult<ChapcaPlanResponse> {
    settings.validate()?;
    let plan = expand_plan(&settings, &mut rand::rng());
    Ok(Json(ChapcaPlanResponse { plan }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesPlanResponse {
    plan: Vec<PlanEntry>,
    settings: SalesSettings,
}

/// Generate a sales wizard plan; the configured settings apply when the
/// request carries none
pub async fn sales_plan(
    State(state): State<AppState>,
    body: Option<Json<SalesSettings>>,
) -> ApiResult<SalesPlanResponse> {
    let settings = match body {
        Some(Json(settings)) => settings,
        None => state.config.sales.clone(),
    };
    let plan = generate_plan(&settings, &mut rand::rng());
    Ok(Json(SalesPlanResponse { plan, settings }))
}
