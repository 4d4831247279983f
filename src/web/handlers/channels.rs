use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{LogoConfig, OutputConfig, UserRole};
use crate::services::Claims;
use crate::web::AppState;
use crate::web::responses::data;

#[derive(Debug, Deserialize)]
pub struct CreateChannelRequest {
    pub name: String,
    pub source_url: String,
    pub logo: Option<LogoConfig>,
    pub output_config: Option<OutputConfig>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateChannelRequest {
    pub name: Option<String>,
    pub source_url: Option<String>,
    pub logo: Option<LogoConfig>,
    pub output_config: Option<OutputConfig>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub channel_ids: Vec<String>,
}

impl BatchRequest {
    /// Parse and validate the id list; any malformed id rejects the batch
    fn ids(&self) -> AppResult<Vec<Uuid>> {
        if self.channel_ids.is_empty() {
            return Err(AppError::validation("at least one channel id is required"));
        }
        self.channel_ids
            .iter()
            .map(|raw| {
                Uuid::parse_str(raw)
                    .map_err(|_| AppError::validation(format!("invalid channel id: {raw}")))
            })
            .collect()
    }
}

pub async fn list(State(state): State<AppState>, _claims: Claims) -> AppResult<Json<Value>> {
    let channels = state.channels.list().await?;
    Ok(data(channels))
}

pub async fn get(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let channel = state.channels.get(id).await?;
    Ok(data(channel))
}

pub async fn create(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<CreateChannelRequest>,
) -> AppResult<Json<Value>> {
    claims.require(UserRole::Operator)?;
    let channel = state
        .channels
        .create(
            request.name,
            request.source_url,
            request.logo,
            request.output_config,
        )
        .await?;
    Ok(data(channel))
}

pub async fn update(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateChannelRequest>,
) -> AppResult<Json<Value>> {
    claims.require(UserRole::Operator)?;
    let channel = state
        .channels
        .update(
            id,
            request.name,
            request.source_url,
            request.logo,
            request.output_config,
        )
        .await?;
    Ok(data(channel))
}

pub async fn delete(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    claims.require(UserRole::Admin)?;
    state.channels.delete(id).await?;
    Ok(data(json!({ "message": "channel deleted" })))
}

pub async fn start(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    claims.require(UserRole::Operator)?;
    state.channels.start(id).await?;
    Ok(data(json!({ "message": "channel started" })))
}

pub async fn stop(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    claims.require(UserRole::Operator)?;
    state.channels.stop(id).await?;
    Ok(data(json!({ "message": "channel stopped" })))
}

pub async fn restart(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    claims.require(UserRole::Operator)?;
    state.channels.restart(id).await?;
    Ok(data(json!({ "message": "channel restarted" })))
}

pub async fn metrics(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let metrics = state.channels.metrics(id).await?;
    Ok(data(metrics))
}

pub async fn all_metrics(State(state): State<AppState>, _claims: Claims) -> AppResult<Json<Value>> {
    let metrics = state.channels.all_metrics().await;
    Ok(data(metrics))
}

pub async fn logs(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let logs = state.channels.logs(id).await?;
    Ok(data(logs))
}

pub async fn batch_start(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<BatchRequest>,
) -> AppResult<Json<Value>> {
    claims.require(UserRole::Operator)?;
    let result = state.channels.batch_start(request.ids()?).await;
    Ok(data(result))
}

pub async fn batch_stop(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<BatchRequest>,
) -> AppResult<Json<Value>> {
    claims.require(UserRole::Operator)?;
    let result = state.channels.batch_stop(request.ids()?).await;
    Ok(data(result))
}

pub async fn batch_restart(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<BatchRequest>,
) -> AppResult<Json<Value>> {
    claims.require(UserRole::Operator)?;
    let result = state.channels.batch_restart(request.ids()?).await;
    Ok(data(result))
}

pub async fn batch_delete(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<BatchRequest>,
) -> AppResult<Json<Value>> {
    claims.require(UserRole::Admin)?;
    let result = state.channels.batch_delete(request.ids()?).await;
    Ok(data(result))
}
