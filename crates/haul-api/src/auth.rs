use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::{error, info, warn};

use haul_db::Database;
use haul_db::models::NewUser;
use haul_types::api::{AuthResponse, LoginRequest, RegisterRequest};
use haul_types::models::{UserProfile, UserRole};

use crate::config::AuthConfig;
use crate::credentials::{self, TokenKeys};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, CurrentUser};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenKeys,
}

impl AppStateInner {
    pub fn new(db: Database, auth: &AuthConfig) -> AppState {
        Arc::new(Self {
            db,
            tokens: TokenKeys::new(auth),
        })
    }
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = required("name", &req.name)?;
    let phone = required("phone", &req.phone)?;
    required("password", &req.password)?;
    let email = normalize_email(&req.email);
    if !is_plausible_email(&email) {
        return Err(ApiError::Validation("Invalid email address".into()));
    }
    let profile = build_profile(&req)?;

    let password = req.password;
    let user = blocking(&state, move |db| {
        let password_hash = credentials::hash_password(&password)?;
        let row = db
            .create_user(
                &NewUser {
                    name: &name,
                    email: &email,
                    phone: &phone,
                    password_hash: &password_hash,
                    profile: &profile,
                },
                Utc::now(),
            )?
            .ok_or(ApiError::DuplicateEmail)?;
        Ok(row.into_user()?)
    })
    .await?;

    let access_token = state.tokens.issue(&user.email)?;
    info!("Registered {} {} ({})", user.role(), user.id, user.email);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            access_token,
            token_type: "bearer",
            user,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = normalize_email(&req.email);
    let password = req.password;

    // Unknown email and wrong password must be indistinguishable.
    let user = blocking(&state, move |db| match db.get_user_by_email(&email)? {
        Some(row) if credentials::verify_password(&password, &row.password_hash) => {
            Ok(row.into_user()?)
        }
        Some(_) => Err(ApiError::InvalidCredentials),
        None => {
            credentials::verify_against_dummy(&password);
            Err(ApiError::InvalidCredentials)
        }
    })
    .await
    .inspect_err(|e| {
        if matches!(e, ApiError::InvalidCredentials) {
            warn!("Rejected login attempt");
        }
    })?;

    let access_token = state.tokens.issue(&user.email)?;
    info!("User {} logged in", user.id);

    Ok(Json(AuthResponse {
        access_token,
        token_type: "bearer",
        user,
    }))
}

/// Tokens are stateless; the client discards its copy.
pub async fn logout(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    info!("User {} logged out", user.id);
    Json(serde_json::json!({ "message": "Successfully logged out" }))
}

pub async fn me(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    Json(user)
}

pub(crate) fn required(field: &str, value: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Blank optional text counts as absent.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

/// Turn the flat registration form into a role-specific profile, refusing
/// fields that belong to the other role.
fn build_profile(req: &RegisterRequest) -> ApiResult<UserProfile> {
    let role: UserRole = req.user_type.trim().parse().map_err(|_| ApiError::InvalidRole)?;

    match role {
        UserRole::LoadOwner => {
            if req.vehicle_info.is_some() || req.service_area.is_some() || req.license_info.is_some() {
                return Err(ApiError::Validation(
                    "vehicle_info, service_area and license_info only apply to drivers".into(),
                ));
            }
            Ok(UserProfile::LoadOwner {
                location: non_blank(req.location.as_deref()),
            })
        }
        UserRole::Driver => {
            if req.location.is_some() {
                return Err(ApiError::Validation("location only applies to load owners".into()));
            }
            if let Some(vehicle) = &req.vehicle_info {
                if vehicle.vehicle_type.trim().is_empty() {
                    return Err(ApiError::Validation("vehicle_info.type is required".into()));
                }
            }
            Ok(UserProfile::Driver {
                vehicle_info: req.vehicle_info.clone(),
                service_area: non_blank(req.service_area.as_deref()),
                license_info: non_blank(req.license_info.as_deref()),
            })
        }
    }
}
