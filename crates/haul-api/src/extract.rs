use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query},
    http::request::Parts,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tracing::warn;

use haul_types::models::User;

use crate::auth::{AppState, blocking};
use crate::error::ApiError;

/// `axum::Json` with rejections reported as [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Path` with rejections reported as [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// `axum::extract::Query` with rejections reported as [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// The user behind the request's bearer token.
///
/// Missing header, bad signature, expiry and a subject that no longer
/// resolves to a user all reject with 401.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Unauthorized)?;

        let claims = state.tokens.decode(bearer.token()).map_err(|e| {
            warn!("Rejected bearer token: {}", e);
            ApiError::Unauthorized
        })?;

        let email = claims.sub;
        let user = blocking(state, move |db| {
            let row = db.get_user_by_email(&email)?.ok_or_else(|| {
                warn!("Token subject {} no longer exists", email);
                ApiError::Unauthorized
            })?;
            Ok(row.into_user()?)
        })
        .await?;

        Ok(CurrentUser(user))
    }
}
