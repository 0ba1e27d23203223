//! Forward and reverse geocoding against a Nominatim instance.
//!
//! All calls are blocking; the dashboard runs them on background threads through
//! `poll_promise`.

use log::{debug, warn};
use reqwest::Url;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::CLIENT;
use crate::projection::GeoPos;

/// Errors that can occur while talking to the geocoding service.
#[derive(Error, Debug)]
pub enum GeocodeError {
    /// An error occurred while making a web request.
    #[error("Connection error")]
    ConnectionError(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("Geocoding request failed. HTTP Status: `{0}`")]
    StatusError(String),

    /// The response body was not the expected JSON.
    #[error("Unable to decode geocoding response")]
    DecodeError(#[from] serde_json::Error),

    /// The configured base URL cannot be used.
    #[error("Invalid geocoder URL: {0}")]
    InvalidUrl(String),
}

/// Structured address details of a place. Only the fields the dashboard shows are kept.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    /// House number.
    pub house_number: Option<String>,
    /// Street.
    pub road: Option<String>,
    /// Suburb or neighbourhood.
    pub suburb: Option<String>,
    /// City.
    pub city: Option<String>,
    /// Town, for places smaller than a city.
    pub town: Option<String>,
    /// Village, for places smaller than a town.
    pub village: Option<String>,
    /// County.
    pub county: Option<String>,
    /// State or province.
    pub state: Option<String>,
    /// Postal code.
    pub postcode: Option<String>,
    /// Country.
    pub country: Option<String>,
}

impl Address {
    /// City, town or village, whichever is set first.
    pub fn locality(&self) -> Option<&str> {
        self.city
            .as_deref()
            .or(self.town.as_deref())
            .or(self.village.as_deref())
    }
}

/// One search result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Latitude.
    #[serde(deserialize_with = "de_coordinate")]
    pub lat: f64,

    /// Longitude.
    #[serde(deserialize_with = "de_coordinate")]
    pub lon: f64,

    /// Full human readable name.
    pub display_name: String,

    /// Structured address, requested with `addressdetails=1`.
    #[serde(default)]
    pub address: Option<Address>,

    /// Nominatim place id.
    #[serde(default)]
    pub place_id: Option<u64>,

    /// OSM class, e.g. `place` or `highway`.
    #[serde(default)]
    pub class: Option<String>,

    /// OSM type, e.g. `city` or `residential`.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    /// Ranking score between 0 and 1.
    #[serde(default)]
    pub importance: Option<f64>,
}

impl Place {
    /// The place's position.
    pub fn position(&self) -> GeoPos {
        GeoPos {
            lon: self.lon,
            lat: self.lat,
        }
    }

    /// Short name for lists: the locality, else the first part of the display name.
    pub fn short_name(&self) -> &str {
        self.address
            .as_ref()
            .and_then(Address::locality)
            .unwrap_or_else(|| {
                self.display_name
                    .split(',')
                    .next()
                    .unwrap_or_default()
                    .trim()
            })
    }

    /// `class • type` when both are known.
    pub fn category(&self) -> Option<String> {
        match (&self.class, &self.kind) {
            (Some(class), Some(kind)) => Some(format!("{class} • {kind}")),
            _ => None,
        }
    }
}

/// The address found for a coordinate.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReverseHit {
    /// Full human readable name.
    pub display_name: String,

    /// Structured address.
    #[serde(default)]
    pub address: Option<Address>,

    /// Nominatim place id.
    #[serde(default)]
    pub place_id: Option<u64>,
}

/// The coordinates found for an address.
#[derive(Clone, Debug, PartialEq)]
pub struct GeocodeHit {
    /// Position of the best match.
    pub position: GeoPos,

    /// Display name of the best match.
    pub display_name: String,

    /// All matches, best first.
    pub results: Vec<Place>,
}

/// Nominatim sends coordinates as strings; accept numbers too.
fn de_coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Coordinate {
        Number(f64),
        Text(String),
    }

    match Coordinate::deserialize(deserializer)? {
        Coordinate::Number(value) => Ok(value),
        Coordinate::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// A geocoding backend.
pub trait Geocoder: Send + Sync {
    /// Searches for places matching `query`, best first, at most `limit` of them.
    fn search(&self, query: &str, limit: u32) -> Result<Vec<Place>, GeocodeError>;

    /// Finds the address at `pos`. `Ok(None)` when the service knows nothing there.
    fn reverse(&self, pos: GeoPos) -> Result<Option<ReverseHit>, GeocodeError>;

    /// Resolves an address to coordinates, taking the best match.
    fn geocode(&self, address: &str, limit: u32) -> Result<Option<GeocodeHit>, GeocodeError> {
        let results = self.search(address, limit)?;
        Ok(results.first().map(|best| GeocodeHit {
            position: best.position(),
            display_name: best.display_name.clone(),
            results: results.clone(),
        }))
    }
}

/// [`Geocoder`] backed by the Nominatim REST API.
#[derive(Clone, Debug)]
pub struct NominatimClient {
    base_url: String,
}

impl Default for NominatimClient {
    fn default() -> Self {
        Self::new("https://nominatim.openstreetmap.org")
    }
}

impl NominatimClient {
    /// Creates a client for the instance at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, GeocodeError> {
        Url::parse_with_params(&format!("{}/{}", self.base_url, path), params)
            .map_err(|e| GeocodeError::InvalidUrl(e.to_string()))
    }

    /// URL of a forward search.
    pub fn search_url(&self, query: &str, limit: u32) -> Result<Url, GeocodeError> {
        self.endpoint(
            "search",
            &[
                ("format", "json".to_string()),
                ("addressdetails", "1".to_string()),
                ("limit", limit.to_string()),
                ("q", query.to_string()),
            ],
        )
    }

    /// URL of a reverse lookup.
    pub fn reverse_url(&self, pos: GeoPos) -> Result<Url, GeocodeError> {
        self.endpoint(
            "reverse",
            &[
                ("format", "json".to_string()),
                ("lat", pos.lat.to_string()),
                ("lon", pos.lon.to_string()),
                ("addressdetails", "1".to_string()),
            ],
        )
    }

    fn fetch(&self, url: Url) -> Result<String, GeocodeError> {
        debug!("Geocoding request {}", url);
        let response = CLIENT.get(url).send()?;
        if !response.status().is_success() {
            return Err(GeocodeError::StatusError(response.status().to_string()));
        }
        Ok(response.text()?)
    }
}

/// Decodes a `/search` response body. Places whose coordinates are not a valid `(lat, lon)`
/// pair are dropped.
pub(crate) fn parse_search(body: &str) -> Result<Vec<Place>, GeocodeError> {
    let places: Vec<Place> = serde_json::from_str(body)?;
    Ok(places
        .into_iter()
        .filter(|place| {
            let valid = GeoPos::from_lat_lon(place.lat, place.lon).is_some();
            if !valid {
                warn!(
                    "Dropping place {:?} with invalid coordinates ({}, {})",
                    place.display_name, place.lat, place.lon
                );
            }
            valid
        })
        .collect())
}

/// Decodes a `/reverse` response body. Nominatim answers `{"error": ...}` for unknown spots.
pub(crate) fn parse_reverse(body: &str) -> Result<Option<ReverseHit>, GeocodeError> {
    #[derive(Deserialize)]
    struct Reverse {
        display_name: Option<String>,
        #[serde(default)]
        address: Option<Address>,
        #[serde(default)]
        place_id: Option<u64>,
    }

    let reverse: Reverse = serde_json::from_str(body)?;
    Ok(reverse.display_name.map(|display_name| ReverseHit {
        display_name,
        address: reverse.address,
        place_id: reverse.place_id,
    }))
}

impl Geocoder for NominatimClient {
    fn search(&self, query: &str, limit: u32) -> Result<Vec<Place>, GeocodeError> {
        let body = self.fetch(self.search_url(query, limit)?)?;
        parse_search(&body)
    }

    fn reverse(&self, pos: GeoPos) -> Result<Option<ReverseHit>, GeocodeError> {
        let body = self.fetch(self.reverse_url(pos)?)?;
        parse_reverse(&body)
    }
}
