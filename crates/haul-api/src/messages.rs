use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::info;

use haul_db::models::LoadRow;
use haul_types::api::{MessageResponse, SendMessageRequest};
use haul_types::models::LoadStatus;

use crate::auth::{AppState, blocking, required};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, CurrentUser};

/// Only the load's owner and its assigned driver may read or write its thread.
fn check_participant(load: &LoadRow, user_id: i64) -> ApiResult<()> {
    if load.owner_id == user_id || load.driver_id == Some(user_id) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only the owner and the assigned driver can access these messages"))
    }
}

pub async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let body = required("message", &req.message)?;
    let load_id = req.load_id;
    let sender_id = user.id;

    let message = blocking(&state, move |db| {
        let load = db.get_load(load_id)?.ok_or_else(|| ApiError::load_not_found(load_id))?;
        check_participant(&load, sender_id)?;

        // A thread only exists once a driver is attached.
        if load.driver_id.is_none() {
            return Err(ApiError::InvalidState {
                current: load.parsed_status()?,
                expected: LoadStatus::Claimed,
            });
        }

        let row = db.insert_message(load_id, sender_id, &body, Utc::now())?;
        Ok(MessageResponse::from(row))
    })
    .await?;

    info!("Message {} on load {} from user {}", message.id, load_id, sender_id);
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn get_messages(
    State(state): State<AppState>,
    ApiPath(load_id): ApiPath<i64>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<MessageResponse>>> {
    let messages = blocking(&state, move |db| {
        let load = db.get_load(load_id)?.ok_or_else(|| ApiError::load_not_found(load_id))?;
        check_participant(&load, user.id)?;

        let rows = db.get_messages(load_id)?;
        Ok(rows.into_iter().map(MessageResponse::from).collect())
    })
    .await?;

    Ok(Json(messages))
}
