use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

use crate::auth::{AppState, blocking};
use crate::error::ApiResult;

pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Shared Transportation API", "status": "running" }))
}

pub async fn health(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    blocking(&state, |db| Ok(db.ping()?)).await?;
    Ok(Json(json!({ "status": "healthy" })))
}
