use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use tracing::info;

use haul_db::models::{LoadChanges, NewLoad, Transition};
use haul_types::api::{CreateLoadRequest, LoadQuery, LoadResponse, UpdateLoadRequest};
use haul_types::models::{LoadStatus, User, UserRole};

use crate::auth::{AppState, blocking, non_blank, required};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};

pub async fn create_load(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<CreateLoadRequest>,
) -> ApiResult<impl IntoResponse> {
    if !user.is_load_owner() {
        return Err(ApiError::forbidden("Only load owners can create loads"));
    }

    let now = Utc::now();
    check_weight(req.weight)?;
    check_pickup_date(req.pickup_date, now)?;

    let new_load = NewLoad {
        owner_id: user.id,
        title: required("title", &req.title)?,
        description: required("description", &req.description)?,
        pickup_location: required("pickup_location", &req.pickup_location)?,
        delivery_location: required("delivery_location", &req.delivery_location)?,
        weight: req.weight,
        dimensions: non_blank(req.dimensions.as_deref()),
        pickup_date: req.pickup_date,
        special_requirements: non_blank(req.special_requirements.as_deref()),
        images: req.images.map(clean_images).transpose()?,
    };

    let load = blocking(&state, move |db| Ok(db.insert_load(&new_load, now)?.into_response()?)).await?;
    info!("Load {} posted by owner {}", load.id, user.id);

    Ok((StatusCode::CREATED, Json(load)))
}

pub async fn list_loads(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LoadQuery>,
) -> ApiResult<Json<Vec<LoadResponse>>> {
    let status = query
        .status
        .as_deref()
        .map(|raw| raw.parse::<LoadStatus>().map_err(|_| ApiError::InvalidStatus(raw.to_string())))
        .transpose()?;

    let loads = blocking(&state, move |db| {
        db.list_loads(status)?
            .into_iter()
            .map(|row| row.into_response().map_err(ApiError::from))
            .collect()
    })
    .await?;

    Ok(Json(loads))
}

/// Owners see the loads they posted; drivers see the loads assigned to them.
pub async fn my_loads(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<LoadResponse>>> {
    let loads = blocking(&state, move |db| {
        let rows = match user.role() {
            UserRole::LoadOwner => db.get_loads_by_owner(user.id)?,
            UserRole::Driver => db.get_loads_by_driver(user.id)?,
        };
        rows.into_iter()
            .map(|row| row.into_response().map_err(ApiError::from))
            .collect()
    })
    .await?;

    Ok(Json(loads))
}

pub async fn get_load(
    State(state): State<AppState>,
    ApiPath(load_id): ApiPath<i64>,
) -> ApiResult<Json<LoadResponse>> {
    let load = blocking(&state, move |db| {
        let row = db.get_load(load_id)?.ok_or_else(|| ApiError::load_not_found(load_id))?;
        Ok(row.into_response()?)
    })
    .await?;

    Ok(Json(load))
}

pub async fn update_load(
    State(state): State<AppState>,
    ApiPath(load_id): ApiPath<i64>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<UpdateLoadRequest>,
) -> ApiResult<Json<LoadResponse>> {
    let load = blocking(&state, move |db| {
        let existing = db.get_load(load_id)?.ok_or_else(|| ApiError::load_not_found(load_id))?;
        if existing.owner_id != user.id {
            return Err(ApiError::forbidden("Only the owner can update this load"));
        }

        let now = Utc::now();
        let changes = validate_changes(req, now)?;
        let row = db
            .update_load(load_id, &changes, now)?
            .ok_or_else(|| ApiError::load_not_found(load_id))?;
        Ok(row.into_response()?)
    })
    .await?;

    info!("Load {} updated by owner {}", load_id, load.owner_id);
    Ok(Json(load))
}

pub async fn delete_load(
    State(state): State<AppState>,
    ApiPath(load_id): ApiPath<i64>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let owner_id = user.id;
    blocking(&state, move |db| {
        let existing = db.get_load(load_id)?.ok_or_else(|| ApiError::load_not_found(load_id))?;
        if existing.owner_id != owner_id {
            return Err(ApiError::forbidden("Only the owner can delete this load"));
        }
        if !db.delete_load(load_id, owner_id)? {
            return Err(ApiError::load_not_found(load_id));
        }
        Ok(())
    })
    .await?;

    info!("Load {} deleted by owner {}", load_id, owner_id);
    Ok(Json(serde_json::json!({ "message": "Load deleted successfully" })))
}

pub async fn claim_load(
    State(state): State<AppState>,
    ApiPath(load_id): ApiPath<i64>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<LoadResponse>> {
    transition(state, user, load_id, LoadStatus::Claimed).await.map(Json)
}

pub async fn accept_load(
    State(state): State<AppState>,
    ApiPath(load_id): ApiPath<i64>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<LoadResponse>> {
    transition(state, user, load_id, LoadStatus::Accepted).await.map(Json)
}

pub async fn start_load(
    State(state): State<AppState>,
    ApiPath(load_id): ApiPath<i64>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<LoadResponse>> {
    transition(state, user, load_id, LoadStatus::InTransit).await.map(Json)
}

pub async fn deliver_load(
    State(state): State<AppState>,
    ApiPath(load_id): ApiPath<i64>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<LoadResponse>> {
    transition(state, user, load_id, LoadStatus::Delivered).await.map(Json)
}

/// Move a load one step forward. Who may do so depends on the target:
/// any driver claims, the owner accepts, the assigned driver starts and
/// delivers. The write itself is conditional on the expected prior status,
/// so of several concurrent attempts exactly one succeeds.
async fn transition(
    state: AppState,
    user: User,
    load_id: i64,
    target: LoadStatus,
) -> ApiResult<LoadResponse> {
    let Some(from) = target.predecessor() else {
        return Err(ApiError::Validation(format!("Loads cannot move to {}", target)));
    };
    if target == LoadStatus::Claimed && !user.is_driver() {
        return Err(ApiError::forbidden("Only drivers can claim loads"));
    }

    let user_id = user.id;
    let load = blocking(&state, move |db| {
        let existing = db.get_load(load_id)?.ok_or_else(|| ApiError::load_not_found(load_id))?;
        check_actor(target, user_id, existing.owner_id, existing.driver_id)?;

        let current = existing.parsed_status()?;
        if current != from {
            return Err(ApiError::InvalidState {
                current,
                expected: from,
            });
        }

        let applied = db.transition_load(
            &Transition {
                load_id,
                from,
                to: target,
                assign_driver: (target == LoadStatus::Claimed).then_some(user_id),
            },
            Utc::now(),
        )?;

        let row = db.get_load(load_id)?.ok_or_else(|| ApiError::load_not_found(load_id))?;
        if !applied {
            // Someone else moved it between our read and our write.
            return Err(ApiError::InvalidState {
                current: row.parsed_status()?,
                expected: from,
            });
        }
        Ok(row.into_response()?)
    })
    .await?;

    info!("Load {} moved {} -> {} by user {}", load_id, from, target, user_id);
    Ok(load)
}

fn check_actor(target: LoadStatus, user_id: i64, owner_id: i64, driver_id: Option<i64>) -> ApiResult<()> {
    match target {
        // Role was checked before touching the database.
        LoadStatus::Claimed => Ok(()),
        LoadStatus::Accepted if owner_id != user_id => {
            Err(ApiError::forbidden("Only the owner can accept a claim"))
        }
        LoadStatus::InTransit | LoadStatus::Delivered if driver_id != Some(user_id) => {
            Err(ApiError::forbidden("Only the assigned driver can update delivery progress"))
        }
        _ => Ok(()),
    }
}

fn check_weight(weight: Option<f64>) -> ApiResult<()> {
    match weight {
        Some(w) if !(w.is_finite() && w > 0.0) => Err(ApiError::InvalidWeight),
        _ => Ok(()),
    }
}

fn check_pickup_date(pickup_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> ApiResult<()> {
    match pickup_date {
        Some(date) if date < now => Err(ApiError::InvalidPickupDate),
        _ => Ok(()),
    }
}

fn clean_images(images: Vec<String>) -> ApiResult<Vec<String>> {
    images
        .into_iter()
        .map(|url| {
            non_blank(Some(&url)).ok_or_else(|| ApiError::Validation("Image URLs cannot be blank".into()))
        })
        .collect()
}

fn validate_changes(req: UpdateLoadRequest, now: DateTime<Utc>) -> ApiResult<LoadChanges> {
    check_weight(req.weight)?;
    check_pickup_date(req.pickup_date, now)?;

    let text = |field: &str, value: Option<String>| value.map(|v| required(field, &v)).transpose();

    Ok(LoadChanges {
        title: text("title", req.title)?,
        description: text("description", req.description)?,
        pickup_location: text("pickup_location", req.pickup_location)?,
        delivery_location: text("delivery_location", req.delivery_location)?,
        weight: req.weight,
        dimensions: non_blank(req.dimensions.as_deref()),
        pickup_date: req.pickup_date,
        special_requirements: non_blank(req.special_requirements.as_deref()),
        images: req.images.map(clean_images).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn weight_must_be_positive() {
        assert!(check_weight(None).is_ok());
        assert!(check_weight(Some(0.1)).is_ok());
        assert!(matches!(check_weight(Some(0.0)), Err(ApiError::InvalidWeight)));
        assert!(matches!(check_weight(Some(-100.0)), Err(ApiError::InvalidWeight)));
        assert!(matches!(check_weight(Some(f64::NAN)), Err(ApiError::InvalidWeight)));
    }

    #[test]
    fn pickup_date_cannot_be_past() {
        let now = Utc::now();
        assert!(check_pickup_date(None, now).is_ok());
        assert!(check_pickup_date(Some(now), now).is_ok());
        assert!(check_pickup_date(Some(now + Duration::days(1)), now).is_ok());
        assert!(matches!(
            check_pickup_date(Some(now - Duration::seconds(1)), now),
            Err(ApiError::InvalidPickupDate)
        ));
    }

    #[test]
    fn actor_rules() {
        let (owner, driver, stranger) = (1, 2, 3);
        assert!(check_actor(LoadStatus::Claimed, stranger, owner, None).is_ok());
        assert!(check_actor(LoadStatus::Accepted, owner, owner, Some(driver)).is_ok());
        assert!(check_actor(LoadStatus::Accepted, driver, owner, Some(driver)).is_err());
        assert!(check_actor(LoadStatus::InTransit, driver, owner, Some(driver)).is_ok());
        assert!(check_actor(LoadStatus::InTransit, owner, owner, Some(driver)).is_err());
        assert!(check_actor(LoadStatus::Delivered, stranger, owner, Some(driver)).is_err());
    }

    #[test]
    fn blank_patch_text_is_rejected() {
        let req = UpdateLoadRequest {
            title: Some("   ".into()),
            ..Default::default()
        };
        assert!(matches!(validate_changes(req, Utc::now()), Err(ApiError::Validation(_))));

        let req = UpdateLoadRequest {
            images: Some(vec!["a.jpg".into(), " b.jpg ".into()]),
            ..Default::default()
        };
        let changes = validate_changes(req, Utc::now()).unwrap();
        assert_eq!(changes.images, Some(vec!["a.jpg".to_string(), "b.jpg".to_string()]));
        assert!(changes.title.is_none());
    }
}
