use axum::Json;
use axum::extract::State;
use serde_json::Value;

use crate::errors::AppResult;
use crate::models::UserRole;
use crate::services::{Claims, SettingsUpdate};
use crate::web::AppState;
use crate::web::responses::data;

pub async fn get(State(state): State<AppState>, _claims: Claims) -> AppResult<Json<Value>> {
    let settings = state.settings.get().await?;
    Ok(data(settings))
}

/// Rejected with a conflict while any channel status is `running`
pub async fn update(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<SettingsUpdate>,
) -> AppResult<Json<Value>> {
    claims.require(UserRole::Admin)?;
    let settings = state.settings.update(request).await?;
    Ok(data(settings))
}
