//! A layer for location pins placed by the dispatcher.

use chrono::{DateTime, Utc};
use egui::{Align2, Color32, FontId, Painter, Pos2, Response, Shape, Stroke};
use serde::{Deserialize, Serialize};
use std::any::Any;

use crate::layers::{Layer, handle_marker_click};
use crate::projection::{GeoPos, MapProjection};

/// Height of a pin from its tip to the top of its head.
const PIN_HEIGHT: f32 = 26.0;
/// Radius of the round head of a pin.
const PIN_HEAD_RADIUS: f32 = 10.0;

/// What a pin marks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinKind {
    /// An incident scene.
    #[default]
    Incident,
    /// A checkpoint.
    Checkpoint,
    /// A station.
    Station,
    /// An emergency.
    Emergency,
}

impl PinKind {
    /// All kinds, in the order the form offers them.
    pub const ALL: [PinKind; 4] = [
        PinKind::Incident,
        PinKind::Checkpoint,
        PinKind::Station,
        PinKind::Emergency,
    ];

    /// Pin color.
    pub fn color(self) -> Color32 {
        match self {
            PinKind::Incident => Color32::from_rgb(0xe7, 0x4c, 0x3c),
            PinKind::Checkpoint => Color32::from_rgb(0x34, 0x98, 0xdb),
            PinKind::Station => Color32::from_rgb(0x2e, 0xcc, 0x71),
            PinKind::Emergency => Color32::from_rgb(0xf3, 0x9c, 0x12),
        }
    }

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            PinKind::Incident => "Incident",
            PinKind::Checkpoint => "Checkpoint",
            PinKind::Station => "Station",
            PinKind::Emergency => "Emergency",
        }
    }
}

/// A point annotation placed by the user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationPin {
    /// Identifier, unique within the layer.
    pub id: u64,

    /// Where the pin sits.
    pub position: GeoPos,

    /// Address shown in the popup.
    pub address: String,

    /// Free text description.
    pub description: String,

    /// What the pin marks.
    pub kind: PinKind,

    /// When the pin was added.
    pub timestamp: DateTime<Utc>,

    /// Whether the position came from geocoding a typed address.
    pub geocoded: bool,
}

/// Layer holding the location pins.
#[derive(Clone, Default)]
pub struct PinLayer {
    pins: Vec<LocationPin>,

    next_id: u64,

    /// The pin whose marker was clicked last. Taken by the owner of the map.
    pub last_clicked: Option<u64>,
}

impl PinLayer {
    /// Adds a pin and returns its id. The `id` field of `pin` is overwritten.
    pub fn add(&mut self, mut pin: LocationPin) -> u64 {
        self.next_id += 1;
        pin.id = self.next_id;
        self.pins.push(pin);
        self.next_id
    }

    /// Removes a pin. Returns whether it existed.
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.pins.len();
        self.pins.retain(|p| p.id != id);
        self.pins.len() != before
    }

    /// Looks up a pin.
    pub fn get(&self, id: u64) -> Option<&LocationPin> {
        self.pins.iter().find(|p| p.id == id)
    }

    /// All pins in insertion order.
    pub fn pins(&self) -> &[LocationPin] {
        &self.pins
    }

    /// Number of pins.
    pub fn len(&self) -> usize {
        self.pins.len()
    }

    /// Whether there are no pins.
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

/// Screen point of the pin's head center, given the screen point of its tip.
fn head_center(tip: Pos2) -> Pos2 {
    tip - egui::vec2(0.0, PIN_HEIGHT - PIN_HEAD_RADIUS)
}

impl Layer for PinLayer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn handle_input(&mut self, response: &Response, projection: &MapProjection) -> bool {
        // Hit test against the head: shift the geo position so it projects onto the head center.
        let markers = self.pins.iter().map(|pin| {
            let head = head_center(projection.project(pin.position));
            (projection.unproject(head), PIN_HEAD_RADIUS)
        });

        match handle_marker_click(response, projection, markers) {
            Some(index) => {
                self.last_clicked = self.pins.get(index).map(|p| p.id);
                true
            }
            None => false,
        }
    }

    fn draw(&self, painter: &Painter, projection: &MapProjection) {
        for pin in &self.pins {
            let tip = projection.project(pin.position);
            let head = head_center(tip);
            let color = pin.kind.color();

            painter.add(Shape::convex_polygon(
                vec![
                    tip,
                    head + egui::vec2(-PIN_HEAD_RADIUS * 0.7, PIN_HEAD_RADIUS * 0.7),
                    head + egui::vec2(PIN_HEAD_RADIUS * 0.7, PIN_HEAD_RADIUS * 0.7),
                ],
                color,
                Stroke::NONE,
            ));
            painter.circle(head, PIN_HEAD_RADIUS, color, Stroke::new(2.0, Color32::WHITE));
            painter.text(
                head,
                Align2::CENTER_CENTER,
                &pin.kind.label()[..1],
                FontId::proportional(11.0),
                Color32::WHITE,
            );
        }
    }
}
