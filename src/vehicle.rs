//! Vehicles as supplied by the host dashboard, and their demonstration routes.

use chrono::{DateTime, Utc};
use egui::Color32;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::projection::GeoPos;

/// Number of steps in a generated demonstration route.
pub const ROUTE_STEPS: usize = 10;

/// Maximum offset, in degrees, of a single route step on each axis.
pub const ROUTE_STEP_DEGREES: f64 = 0.005;

/// Operational status of a vehicle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    /// Ready for deployment.
    Available,
    /// Active monitoring.
    OnPatrol,
    /// Emergency response.
    Responding,
    /// Maintenance or break.
    OutOfService,
    /// Any status this dashboard does not know about.
    #[default]
    #[serde(other)]
    Unknown,
}

impl VehicleStatus {
    /// The statuses shown in the legend.
    pub const KNOWN: [VehicleStatus; 4] = [
        VehicleStatus::Available,
        VehicleStatus::OnPatrol,
        VehicleStatus::Responding,
        VehicleStatus::OutOfService,
    ];

    /// Marker and route color.
    pub fn color(self) -> Color32 {
        match self {
            VehicleStatus::Available => Color32::from_rgb(0x2e, 0xcc, 0x71),
            VehicleStatus::OnPatrol => Color32::from_rgb(0x34, 0x98, 0xdb),
            VehicleStatus::Responding => Color32::from_rgb(0xe7, 0x4c, 0x3c),
            VehicleStatus::OutOfService => Color32::from_rgb(0x95, 0xa5, 0xa6),
            VehicleStatus::Unknown => Color32::from_rgb(0x7f, 0x8c, 0x8d),
        }
    }

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            VehicleStatus::Available => "Available",
            VehicleStatus::OnPatrol => "On Patrol",
            VehicleStatus::Responding => "Responding",
            VehicleStatus::OutOfService => "Out of Service",
            VehicleStatus::Unknown => "Unknown",
        }
    }

    /// Short explanation shown in the legend.
    pub fn hint(self) -> &'static str {
        match self {
            VehicleStatus::Available => "Ready for deployment",
            VehicleStatus::OnPatrol => "Active monitoring",
            VehicleStatus::Responding => "Emergency response",
            VehicleStatus::OutOfService => "Maintenance/Break",
            VehicleStatus::Unknown => "No status reported",
        }
    }

    /// Marker diameter in points.
    pub fn marker_size(self) -> f32 {
        match self {
            VehicleStatus::Responding => 30.0,
            _ => 25.0,
        }
    }
}

/// Kind of vehicle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    /// A motorcycle unit.
    Motorcycle,
    /// A dog unit.
    K9,
    /// A special purpose van.
    Special,
    /// A patrol car, also used for types this dashboard does not know about.
    #[default]
    #[serde(other)]
    Patrol,
}

impl VehicleType {
    /// Glyph drawn inside the marker.
    pub fn symbol(self) -> &'static str {
        match self {
            VehicleType::Patrol => "🚔",
            VehicleType::Motorcycle => "🏍",
            VehicleType::K9 => "🐕",
            VehicleType::Special => "🚐",
        }
    }

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            VehicleType::Patrol => "patrol",
            VehicleType::Motorcycle => "motorcycle",
            VehicleType::K9 => "k9",
            VehicleType::Special => "special",
        }
    }
}

/// A reported location: either a serialized `"[lat, lon]"` string or a plain JSON array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportedLocation {
    /// A pair already decoded by the feed.
    Pair(Vec<f64>),
    /// A pair serialized as JSON text.
    Encoded(String),
}

impl Default for ReportedLocation {
    fn default() -> Self {
        Self::Encoded(String::new())
    }
}

/// Parses a reported `[lat, lon]` location. Malformed or out-of-range input yields `None`.
pub fn parse_location(location: &ReportedLocation) -> Option<GeoPos> {
    let pair = match location {
        ReportedLocation::Pair(pair) => pair.clone(),
        ReportedLocation::Encoded(text) => serde_json::from_str::<Vec<f64>>(text).ok()?,
    };
    match pair.as_slice() {
        [lat, lon] => GeoPos::from_lat_lon(*lat, *lon),
        _ => None,
    }
}

/// Feeds send identifiers as strings or numbers; keep both as text.
fn de_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_optional_text(deserializer)?.unwrap_or_default())
}

fn de_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::Null => None,
        JsonValue::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

/// A year as a number or numeric text. Anything else is dropped.
fn de_year<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        JsonValue::String(text) => text.trim().parse().ok(),
        _ => None,
    })
}

/// An RFC 3339 timestamp. Anything else is dropped.
fn de_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        _ => None,
    })
}

/// A dispatchable vehicle.
///
/// Decoding is lenient: identifiers may be numbers, and a malformed `year` or `lastUpdate` is
/// dropped instead of rejecting the vehicle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Vehicle {
    /// Unique identifier.
    #[serde(deserialize_with = "de_text")]
    pub id: String,

    /// Call sign shown in popups.
    #[serde(deserialize_with = "de_text")]
    pub vehicle_id: String,

    /// Kind of vehicle.
    pub vehicle_type: VehicleType,

    /// Operational status.
    pub status: VehicleStatus,

    /// Last reported position.
    pub current_location: ReportedLocation,

    /// Manufacturer.
    #[serde(deserialize_with = "de_optional_text")]
    pub make: Option<String>,

    /// Model name.
    #[serde(deserialize_with = "de_optional_text")]
    pub model: Option<String>,

    /// Model year.
    #[serde(deserialize_with = "de_year")]
    pub year: Option<u16>,

    /// License plate.
    #[serde(deserialize_with = "de_optional_text")]
    pub license_plate: Option<String>,

    /// Badge number of the assigned officer.
    #[serde(deserialize_with = "de_optional_text")]
    pub assigned_officer_id: Option<String>,

    /// Time of the last position report.
    #[serde(deserialize_with = "de_timestamp")]
    pub last_update: Option<DateTime<Utc>>,
}

impl Vehicle {
    /// The vehicle's position, if its reported location is valid.
    pub fn position(&self) -> Option<GeoPos> {
        parse_location(&self.current_location)
    }

    /// `make model (year)`, skipping what is missing.
    pub fn description(&self) -> String {
        let name = [self.make.as_deref(), self.model.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        match self.year {
            Some(year) if name.is_empty() => year.to_string(),
            Some(year) => format!("{name} ({year})"),
            None => name,
        }
    }
}

/// Generates a demonstration route: `start` followed by `ROUTE_STEPS` random steps.
pub fn generate_route(start: GeoPos, rng: &mut impl Rng) -> Vec<GeoPos> {
    let mut route = Vec::with_capacity(ROUTE_STEPS + 1);
    route.push(start);
    let mut last = start;
    for _ in 0..ROUTE_STEPS {
        last = GeoPos {
            lon: last.lon + rng.random_range(-ROUTE_STEP_DEGREES..ROUTE_STEP_DEGREES),
            lat: last.lat + rng.random_range(-ROUTE_STEP_DEGREES..ROUTE_STEP_DEGREES),
        };
        route.push(last);
    }
    route
}
