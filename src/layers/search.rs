//! A layer for geocoding search results.

use egui::{Color32, Painter, Response};
use std::any::Any;

use crate::geocoding::{Address, Place};
use crate::layers::{Layer, draw_badge, handle_marker_click};
use crate::projection::{GeoPos, MapProjection};

/// Color of the highlighted result.
pub const MAIN_COLOR: Color32 = Color32::from_rgb(0x2e, 0xcc, 0x71);
/// Color of the other results.
pub const OTHER_COLOR: Color32 = Color32::from_rgb(0x34, 0x98, 0xdb);

/// A marker for one search result.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchMarker {
    /// Identifier of the form `search-<batch>-<index>`.
    pub id: String,

    /// Where the result is.
    pub position: GeoPos,

    /// The result's display name.
    pub title: String,

    /// Nominatim importance, 0 when not reported.
    pub importance: f64,

    /// Whether this is the highlighted result.
    pub is_main: bool,

    /// Structured address, when the service returned one.
    pub address: Option<Address>,

    /// OSM class of the place, e.g. `boundary`.
    pub place_class: Option<String>,

    /// OSM type of the place, e.g. `administrative`.
    pub place_type: Option<String>,
}

impl SearchMarker {
    /// Builds the marker for `place`.
    pub fn from_place(batch: u64, index: usize, place: &Place, is_main: bool) -> Self {
        Self {
            id: format!("search-{batch}-{index}"),
            position: place.position(),
            title: place.display_name.clone(),
            importance: place.importance.unwrap_or(0.0),
            is_main,
            address: place.address.clone(),
            place_class: place.class.clone(),
            place_type: place.kind.clone(),
        }
    }

    /// Marker diameter in points.
    pub fn diameter(&self) -> f32 {
        if self.is_main { 28.0 } else { 22.0 }
    }

    /// Marker color.
    pub fn color(&self) -> Color32 {
        if self.is_main { MAIN_COLOR } else { OTHER_COLOR }
    }
}

/// Layer holding the markers of the latest search.
#[derive(Clone, Default)]
pub struct SearchLayer {
    markers: Vec<SearchMarker>,

    /// The marker clicked last. Taken by the owner of the map.
    pub last_clicked: Option<String>,
}

impl SearchLayer {
    /// Replaces all markers.
    pub fn replace(&mut self, markers: Vec<SearchMarker>) {
        self.markers = markers;
        self.last_clicked = None;
    }

    /// Removes one marker. Returns whether it existed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.markers.len();
        self.markers.retain(|m| m.id != id);
        self.markers.len() != before
    }

    /// Looks up a marker.
    pub fn get(&self, id: &str) -> Option<&SearchMarker> {
        self.markers.iter().find(|m| m.id == id)
    }

    /// All markers.
    pub fn markers(&self) -> &[SearchMarker] {
        &self.markers
    }

    /// Number of markers.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Whether there are no markers.
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

impl Layer for SearchLayer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn handle_input(&mut self, response: &Response, projection: &MapProjection) -> bool {
        let markers = self
            .markers
            .iter()
            .map(|m| (m.position, m.diameter() / 2.0));

        match handle_marker_click(response, projection, markers) {
            Some(index) => {
                self.last_clicked = self.markers.get(index).map(|m| m.id.clone());
                true
            }
            None => false,
        }
    }

    fn draw(&self, painter: &Painter, projection: &MapProjection) {
        // The main result goes last so it is drawn above the others.
        let ordered = self
            .markers
            .iter()
            .filter(|m| !m.is_main)
            .chain(self.markers.iter().filter(|m| m.is_main));

        for marker in ordered {
            let glyph_size = if marker.is_main { 16.0 } else { 12.0 };
            draw_badge(
                painter,
                projection.project(marker.position),
                marker.diameter(),
                marker.color(),
                "🔍",
                glyph_size,
            );
        }
    }
}
