use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::errors::AppResult;
use crate::services::Claims;
use crate::web::AppState;
use crate::web::responses::data;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<Value>> {
    let tokens = state.auth.login(&request.email, &request.password).await?;
    Ok(data(tokens))
}

/// Tokens are stateless; logout is client-side disposal
pub async fn logout() -> Json<Value> {
    data(json!({ "message": "logged out" }))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> AppResult<Json<Value>> {
    let tokens = state.auth.refresh(&request.refresh_token).await?;
    Ok(data(tokens))
}

pub async fn me(State(state): State<AppState>, claims: Claims) -> AppResult<Json<Value>> {
    let user = state.auth.user(claims.user_id).await?;
    Ok(data(user))
}
