use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Returned when a stored or submitted enum value is not one we recognise.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    LoadOwner,
    Driver,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadOwner => "load_owner",
            Self::Driver => "driver",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "load_owner" => Ok(Self::LoadOwner),
            "driver" => Ok(Self::Driver),
            other => Err(UnknownVariant {
                kind: "user type",
                value: other.to_string(),
            }),
        }
    }
}

/// Lifecycle of a load. Each status has at most one legal successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Posted,
    Claimed,
    Accepted,
    InTransit,
    Delivered,
}

impl LoadStatus {
    pub const ALL: [LoadStatus; 5] = [
        Self::Posted,
        Self::Claimed,
        Self::Accepted,
        Self::InTransit,
        Self::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Posted => "posted",
            Self::Claimed => "claimed",
            Self::Accepted => "accepted",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
        }
    }

    /// The only status this one may move to, or `None` once delivered.
    pub fn next(&self) -> Option<LoadStatus> {
        match self {
            Self::Posted => Some(Self::Claimed),
            Self::Claimed => Some(Self::Accepted),
            Self::Accepted => Some(Self::InTransit),
            Self::InTransit => Some(Self::Delivered),
            Self::Delivered => None,
        }
    }

    /// The status a load must be in for a transition into `self`.
    pub fn predecessor(&self) -> Option<LoadStatus> {
        Self::ALL.into_iter().find(|s| s.next() == Some(*self))
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "load status",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleInfo {
    #[serde(rename = "type")]
    pub vehicle_type: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub capacity: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub dimensions: Option<String>,
}

/// Clients send `"1000 kg"` as often as a bare `1000`; both are kept as text.
fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Integer(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    }))
}

/// Role-specific profile data. Owners and drivers carry disjoint fields,
/// so a driver can never have a `location` and an owner never a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "user_type", rename_all = "snake_case")]
pub enum UserProfile {
    LoadOwner {
        #[serde(default)]
        location: Option<String>,
    },
    Driver {
        #[serde(default)]
        vehicle_info: Option<VehicleInfo>,
        #[serde(default)]
        service_area: Option<String>,
        #[serde(default)]
        license_info: Option<String>,
    },
}

impl UserProfile {
    pub fn role(&self) -> UserRole {
        match self {
            Self::LoadOwner { .. } => UserRole::LoadOwner,
            Self::Driver { .. } => UserRole::Driver,
        }
    }
}

/// A registered user as exposed to clients. The password hash never leaves
/// the database layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(flatten)]
    pub profile: UserProfile,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> UserRole {
        self.profile.role()
    }

    pub fn is_driver(&self) -> bool {
        self.role() == UserRole::Driver
    }

    pub fn is_load_owner(&self) -> bool {
        self.role() == UserRole::LoadOwner
    }
}
