//! Database row types. These map directly to SQLite rows.
//! Distinct from haul-types API models to keep the DB layer independent.

use chrono::{DateTime, Utc};
use haul_types::models::{LoadStatus, UserProfile};

pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub user_type: String,
    pub password_hash: String,
    pub location: Option<String>,
    /// Serialized `VehicleInfo`.
    pub vehicle_info: Option<String>,
    pub service_area: Option<String>,
    pub license_info: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A load joined with its owner's and (if any) driver's contact details.
pub struct LoadRow {
    pub id: i64,
    pub owner_id: i64,
    pub driver_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub pickup_location: String,
    pub delivery_location: String,
    pub status: String,
    pub weight: Option<f64>,
    pub dimensions: Option<String>,
    pub pickup_date: Option<DateTime<Utc>>,
    pub special_requirements: Option<String>,
    /// Serialized list of image URLs.
    pub images: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner_name: String,
    pub owner_email: String,
    pub owner_phone: String,
    pub driver_name: Option<String>,
    pub driver_email: Option<String>,
    pub driver_phone: Option<String>,
}

pub struct MessageRow {
    pub id: i64,
    pub load_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

// -- Inserts / updates --

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub password_hash: &'a str,
    pub profile: &'a UserProfile,
}

pub struct NewLoad {
    pub owner_id: i64,
    pub title: String,
    pub description: String,
    pub pickup_location: String,
    pub delivery_location: String,
    pub weight: Option<f64>,
    pub dimensions: Option<String>,
    pub pickup_date: Option<DateTime<Utc>>,
    pub special_requirements: Option<String>,
    pub images: Option<Vec<String>>,
}

/// Column changes for `update_load`. `None` keeps the stored value.
#[derive(Default)]
pub struct LoadChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub pickup_location: Option<String>,
    pub delivery_location: Option<String>,
    pub weight: Option<f64>,
    pub dimensions: Option<String>,
    pub pickup_date: Option<DateTime<Utc>>,
    pub special_requirements: Option<String>,
    pub images: Option<Vec<String>>,
}

/// Guarded status change: applied only while the load is still in `from`.
pub struct Transition {
    pub load_id: i64,
    pub from: LoadStatus,
    pub to: LoadStatus,
    /// Set the driver as part of the same update (claim).
    pub assign_driver: Option<i64>,
}
