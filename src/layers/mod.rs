//! Layers for the map view that can handle input, and draw on top of the map view different kinds of data.
//!
use egui::{Align2, Color32, FontId, Painter, Pos2, Response, Stroke};
use std::any::Any;

use crate::projection::{GeoPos, MapProjection};

/// GeoJSON export of the dashboard overlays.
#[cfg(feature = "geojson")]
pub mod geojson;

/// Location pins placed by the user.
pub mod pins;

/// Markers for geocoding search results.
pub mod search;

/// Vehicle markers and routes.
pub mod vehicles;

/// A trait for map layers.
pub trait Layer: Any {
    /// Handles user input for the layer. Returns `true` if the input was handled and should not be
    /// processed further by the map.
    fn handle_input(&mut self, response: &Response, projection: &MapProjection) -> bool;

    /// Draws the layer.
    fn draw(&self, painter: &Painter, projection: &MapProjection);

    /// Gets the layer as a `dyn Any`.
    fn as_any(&self) -> &dyn Any;

    /// Gets the layer as a mutable `dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Extra screen distance, in points, accepted around a marker when hit testing.
const CLICK_TOLERANCE: f32 = 4.0;

/// Finds the topmost marker under `screen_pos`.
///
/// `markers` yields `(position, radius)` in draw order, so later markers win.
pub(crate) fn find_marker_at(
    markers: impl Iterator<Item = (GeoPos, f32)>,
    screen_pos: Pos2,
    projection: &MapProjection,
) -> Option<usize> {
    let mut hit = None;
    for (index, (pos, radius)) in markers.enumerate() {
        let reach = radius + CLICK_TOLERANCE;
        if projection.project(pos).distance_sq(screen_pos) <= reach * reach {
            hit = Some(index);
        }
    }
    hit
}

/// Shared click handling for marker layers: records the marker under a click and shows a
/// pointing hand while hovering one. Returns whether the click landed on a marker.
pub(crate) fn handle_marker_click(
    response: &Response,
    projection: &MapProjection,
    markers: impl Iterator<Item = (GeoPos, f32)> + Clone,
) -> Option<usize> {
    if let Some(hover_pos) = response.hover_pos() {
        if find_marker_at(markers.clone(), hover_pos, projection).is_some() {
            response.ctx.set_cursor_icon(egui::CursorIcon::PointingHand);
        }
    }

    if response.clicked() {
        if let Some(pointer_pos) = response.interact_pointer_pos() {
            return find_marker_at(markers, pointer_pos, projection);
        }
    }
    None
}

/// Draws a round badge with a white border and a centered glyph.
pub(crate) fn draw_badge(
    painter: &Painter,
    center: Pos2,
    diameter: f32,
    fill: Color32,
    glyph: &str,
    glyph_size: f32,
) {
    let radius = diameter / 2.0;
    // Soft shadow under the badge.
    painter.circle_filled(
        center + egui::vec2(0.0, 2.0),
        radius + 1.0,
        Color32::from_black_alpha(70),
    );
    painter.circle(center, radius, fill, Stroke::new(3.0, Color32::WHITE));
    painter.text(
        center,
        Align2::CENTER_CENTER,
        glyph,
        FontId::proportional(glyph_size),
        Color32::WHITE,
    );
}
