//! A layer showing dispatch vehicles and their routes.

use egui::{Color32, Painter, Response, Shape, Stroke};
use std::any::Any;
use std::collections::BTreeMap;

use crate::layers::{Layer, draw_badge, handle_marker_click};
use crate::projection::{GeoPos, MapProjection};
use crate::vehicle::{Vehicle, VehicleStatus};

/// Vehicle markers, optionally with the routes attached to them.
#[derive(Clone, Default)]
pub struct VehicleLayer {
    vehicles: Vec<Vehicle>,

    routes: BTreeMap<String, Vec<GeoPos>>,

    /// Whether routes are drawn.
    pub show_routes: bool,

    /// The vehicle highlighted on the map.
    pub selected: Option<String>,

    /// The vehicle whose marker was clicked last. Taken by the owner of the map.
    pub last_clicked: Option<String>,
}

impl VehicleLayer {
    /// Replaces the vehicle list. Routes of vehicles that are gone are dropped.
    pub fn set_vehicles(&mut self, vehicles: Vec<Vehicle>) {
        self.vehicles = vehicles;
        let vehicles = &self.vehicles;
        self.routes
            .retain(|id, _| vehicles.iter().any(|v| &v.id == id));
    }

    /// The current vehicles.
    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    /// Looks up a vehicle by id.
    pub fn vehicle(&self, id: &str) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id == id)
    }

    /// The route attached to a vehicle.
    pub fn route(&self, id: &str) -> Option<&[GeoPos]> {
        self.routes.get(id).map(Vec::as_slice)
    }

    /// All routes by vehicle id.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &[GeoPos])> {
        self.routes.iter().map(|(id, r)| (id.as_str(), r.as_slice()))
    }

    /// Attaches a route to a vehicle, replacing any previous one.
    pub fn set_route(&mut self, id: &str, route: Vec<GeoPos>) {
        self.routes.insert(id.to_string(), route);
    }

    /// Detaches a vehicle's route. Returns whether there was one.
    pub fn remove_route(&mut self, id: &str) -> bool {
        self.routes.remove(id).is_some()
    }

    /// Routes that should be drawn: routes are visible, the vehicle still exists and the route
    /// has at least two points. Yields the route with its vehicle's status.
    pub fn drawable_routes(&self) -> impl Iterator<Item = (&[GeoPos], VehicleStatus)> {
        self.routes
            .iter()
            .filter(|_| self.show_routes)
            .filter(|(_, route)| route.len() >= 2)
            .filter_map(|(id, route)| self.vehicle(id).map(|v| (route.as_slice(), v.status)))
    }

    fn markers(&self) -> impl Iterator<Item = (&Vehicle, GeoPos)> + Clone {
        self.vehicles
            .iter()
            .filter_map(|v| v.position().map(|pos| (v, pos)))
    }
}

impl Layer for VehicleLayer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn handle_input(&mut self, response: &Response, projection: &MapProjection) -> bool {
        let markers = self
            .markers()
            .map(|(v, pos)| (pos, v.status.marker_size() / 2.0));
        let hit = handle_marker_click(response, projection, markers);

        let clicked = hit
            .and_then(|index| self.markers().nth(index))
            .map(|(vehicle, _)| vehicle.id.clone());
        match clicked {
            Some(id) => {
                self.last_clicked = Some(id);
                true
            }
            None => false,
        }
    }

    fn draw(&self, painter: &Painter, projection: &MapProjection) {
        for (route, status) in self.drawable_routes() {
            let points: Vec<egui::Pos2> = route.iter().map(|p| projection.project(*p)).collect();
            let stroke = Stroke::new(3.0, status.color().gamma_multiply(0.8));
            painter.extend(Shape::dashed_line(&points, stroke, 5.0, 10.0));
        }

        for (vehicle, pos) in self.markers() {
            let center = projection.project(pos);
            let size = vehicle.status.marker_size();

            if self.selected.as_deref() == Some(vehicle.id.as_str()) {
                painter.circle_stroke(
                    center,
                    size / 2.0 + 5.0,
                    Stroke::new(2.0, Color32::from_rgb(0xf1, 0xc4, 0x0f)),
                );
            }

            draw_badge(
                painter,
                center,
                size,
                vehicle.status.color(),
                vehicle.vehicle_type.symbol(),
                12.0,
            );

            if vehicle.status == VehicleStatus::Responding {
                let corner = center + egui::vec2(size / 2.0 - 2.0, -size / 2.0 + 2.0);
                painter.circle_filled(corner, 4.0, VehicleStatus::Responding.color());
            }
        }
    }
}
