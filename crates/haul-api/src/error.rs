use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use haul_types::models::LoadStatus;
use serde::Serialize;
use tracing::error;

/// Every failure a handler can report to a client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid user type. Must be 'load_owner' or 'driver'")]
    InvalidRole,

    #[error("Weight must be positive")]
    InvalidWeight,

    #[error("Pickup date cannot be in the past")]
    InvalidPickupDate,

    #[error("Invalid status '{0}'")]
    InvalidStatus(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Could not validate credentials")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Load is {current}; this action requires it to be {expected}")]
    InvalidState {
        current: LoadStatus,
        expected: LoadStatus,
    },

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn load_not_found(id: i64) -> Self {
        Self::NotFound(format!("Load {}", id))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::InvalidRole
            | Self::InvalidWeight
            | Self::InvalidPickupDate
            | Self::InvalidStatus(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidCredentials | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateEmail | Self::InvalidState { .. } => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidRole => "INVALID_ROLE",
            Self::InvalidWeight => "INVALID_WEIGHT",
            Self::InvalidPickupDate => "INVALID_PICKUP_DATE",
            Self::InvalidStatus(_) => "INVALID_STATUS",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::DuplicateEmail => "DUPLICATE_EMAIL",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            error!("Internal error: {:#}", e);
        }

        let status = self.status_code();
        let body = ErrorBody {
            code: self.error_code(),
            message: self.to_string(),
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self, Self::Unauthorized | Self::InvalidCredentials) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}
