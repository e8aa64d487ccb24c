use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{LoadStatus, User, VehicleInfo};

// -- JWT Claims --

/// Bearer token claims. `sub` is the user's email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub user_type: String,
    pub password: String,
    // Load owner
    #[serde(default)]
    pub location: Option<String>,
    // Driver
    #[serde(default)]
    pub license_info: Option<String>,
    #[serde(default)]
    pub service_area: Option<String>,
    #[serde(default)]
    pub vehicle_info: Option<VehicleInfo>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: User,
}

// -- Loads --

#[derive(Debug, Deserialize)]
pub struct CreateLoadRequest {
    pub title: String,
    pub description: String,
    pub pickup_location: String,
    pub delivery_location: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub dimensions: Option<String>,
    #[serde(default, deserialize_with = "crate::time::deserialize_optional")]
    pub pickup_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub special_requirements: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
}

/// Partial update. A field that is absent or `null` is left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateLoadRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pickup_location: Option<String>,
    #[serde(default)]
    pub delivery_location: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub dimensions: Option<String>,
    #[serde(default, deserialize_with = "crate::time::deserialize_optional")]
    pub pickup_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub special_requirements: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoadQuery {
    pub status: Option<String>,
}

/// A load with owner and driver display fields folded in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResponse {
    pub id: i64,
    pub owner_id: i64,
    pub driver_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub pickup_location: String,
    pub delivery_location: String,
    pub status: LoadStatus,
    pub weight: Option<f64>,
    pub dimensions: Option<String>,
    pub pickup_date: Option<DateTime<Utc>>,
    pub special_requirements: Option<String>,
    pub images: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner_name: String,
    pub owner_email: String,
    pub owner_phone: String,
    pub driver_name: Option<String>,
    pub driver_email: Option<String>,
    pub driver_phone: Option<String>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub load_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: i64,
    pub load_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
