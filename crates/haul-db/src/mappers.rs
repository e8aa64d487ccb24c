//! Row → API model conversion.
//!
//! Enum columns are constrained by the schema, so an unknown value is a hard
//! error. JSON columns that fail to decode degrade to `None` with a warning.

use anyhow::{Context, Result};
use haul_types::api::{LoadResponse, MessageResponse};
use haul_types::models::{LoadStatus, User, UserProfile, UserRole, VehicleInfo};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::models::{LoadRow, MessageRow, UserRow};

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        let role: UserRole = self
            .user_type
            .parse()
            .with_context(|| format!("user {} has a corrupt user_type", self.id))?;

        let profile = match role {
            UserRole::LoadOwner => UserProfile::LoadOwner {
                location: self.location,
            },
            UserRole::Driver => UserProfile::Driver {
                vehicle_info: decode_json::<VehicleInfo>(
                    self.vehicle_info.as_deref(),
                    "vehicle_info",
                    self.id,
                ),
                service_area: self.service_area,
                license_info: self.license_info,
            },
        };

        Ok(User {
            id: self.id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            profile,
            created_at: self.created_at,
        })
    }
}

impl LoadRow {
    pub fn parsed_status(&self) -> Result<LoadStatus> {
        self.status
            .parse()
            .with_context(|| format!("load {} has a corrupt status", self.id))
    }

    pub fn into_response(self) -> Result<LoadResponse> {
        let status = self.parsed_status()?;
        let images = decode_json::<Vec<String>>(self.images.as_deref(), "images", self.id);

        Ok(LoadResponse {
            id: self.id,
            owner_id: self.owner_id,
            driver_id: self.driver_id,
            title: self.title,
            description: self.description,
            pickup_location: self.pickup_location,
            delivery_location: self.delivery_location,
            status,
            weight: self.weight,
            dimensions: self.dimensions,
            pickup_date: self.pickup_date,
            special_requirements: self.special_requirements,
            images,
            created_at: self.created_at,
            updated_at: self.updated_at,
            owner_name: self.owner_name,
            owner_email: self.owner_email,
            owner_phone: self.owner_phone,
            driver_name: self.driver_name,
            driver_email: self.driver_email,
            driver_phone: self.driver_phone,
        })
    }
}

impl From<MessageRow> for MessageResponse {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            load_id: row.load_id,
            sender_id: row.sender_id,
            sender_name: row.sender_name,
            message: row.message,
            timestamp: row.timestamp,
        }
    }
}

fn decode_json<T: DeserializeOwned>(raw: Option<&str>, column: &str, row_id: i64) -> Option<T> {
    let raw = raw?;
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Corrupt {} on row {}: {}", column, row_id, e);
            None
        }
    }
}
