//! GeoJSON export of the dashboard overlays.

use super::pins::LocationPin;
use super::search::SearchMarker;
use crate::projection::GeoPos;
use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Value as JsonValue};

fn geo_pos_to_vec(gp: &GeoPos) -> Vec<f64> {
    vec![gp.lon, gp.lat]
}

fn point_feature(pos: &GeoPos, id: Id, properties: Map<String, JsonValue>) -> Feature {
    Feature {
        geometry: Some(Geometry::new(Value::Point(geo_pos_to_vec(pos)))),
        id: Some(id),
        properties: Some(properties),
        ..Default::default()
    }
}

impl From<&LocationPin> for Feature {
    fn from(pin: &LocationPin) -> Self {
        let mut properties = Map::new();
        properties.insert("layer".to_string(), JsonValue::from("pin"));
        properties.insert("kind".to_string(), JsonValue::from(pin.kind.label()));
        properties.insert("address".to_string(), JsonValue::from(pin.address.as_str()));
        properties.insert(
            "description".to_string(),
            JsonValue::from(pin.description.as_str()),
        );
        properties.insert(
            "timestamp".to_string(),
            JsonValue::from(pin.timestamp.to_rfc3339()),
        );
        properties.insert("geocoded".to_string(), JsonValue::from(pin.geocoded));
        properties.insert(
            "color".to_string(),
            JsonValue::String(pin.kind.color().to_hex()),
        );

        point_feature(&pin.position, Id::Number(pin.id.into()), properties)
    }
}

impl From<&SearchMarker> for Feature {
    fn from(marker: &SearchMarker) -> Self {
        let mut properties = Map::new();
        properties.insert("layer".to_string(), JsonValue::from("search"));
        properties.insert("title".to_string(), JsonValue::from(marker.title.as_str()));
        properties.insert("importance".to_string(), JsonValue::from(marker.importance));
        properties.insert("main".to_string(), JsonValue::from(marker.is_main));
        if let Some(class) = &marker.place_class {
            properties.insert("class".to_string(), JsonValue::from(class.as_str()));
        }
        if let Some(kind) = &marker.place_type {
            properties.insert("type".to_string(), JsonValue::from(kind.as_str()));
        }

        point_feature(&marker.position, Id::String(marker.id.clone()), properties)
    }
}

/// A vehicle route as a `LineString` feature.
pub fn route_feature(vehicle_id: &str, route: &[GeoPos]) -> Feature {
    let mut properties = Map::new();
    properties.insert("layer".to_string(), JsonValue::from("route"));
    properties.insert("vehicle".to_string(), JsonValue::from(vehicle_id));

    let line_string: Vec<Vec<f64>> = route.iter().map(geo_pos_to_vec).collect();
    Feature {
        geometry: Some(Geometry::new(Value::LineString(line_string))),
        id: Some(Id::String(format!("route-{vehicle_id}"))),
        properties: Some(properties),
        ..Default::default()
    }
}

/// Collects pins, search markers and routes into one `FeatureCollection`.
pub fn overlays(
    pins: &[LocationPin],
    markers: &[SearchMarker],
    routes: &[(String, Vec<GeoPos>)],
) -> FeatureCollection {
    let features = pins
        .iter()
        .map(Feature::from)
        .chain(markers.iter().map(Feature::from))
        .chain(routes.iter().map(|(id, route)| route_feature(id, route)))
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
