use axum::Json;
use axum::extract::State;
use serde_json::Value;

use crate::errors::AppResult;
use crate::services::Claims;
use crate::web::AppState;
use crate::web::responses::data;

pub async fn info(State(state): State<AppState>, _claims: Claims) -> AppResult<Json<Value>> {
    let info = state.probe.system_info().await;
    Ok(data(info))
}
