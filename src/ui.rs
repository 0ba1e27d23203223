//! Draws the dashboard: header, map or summary, marker popups, the pin form, the legend and
//! notices.
//!
//! Buttons only record what was clicked while the `egui` closures hold their borrows; the
//! matching [`Dashboard`] transition runs once the closure returns.

use chrono::{DateTime, Utc};
use eframe::egui;
use egui::{Align2, Color32, CursorIcon, Id, Pos2, RichText, Sense, Ui, Vec2, vec2};
use std::time::Instant;

use crate::dashboard::{Dashboard, MarkerPopup};
use crate::geocoding::Address;
use crate::layers::pins::PinKind;
use crate::layers::search::{MAIN_COLOR, OTHER_COLOR};
use crate::projection::GeoPos;
use crate::vehicle::VehicleStatus;

/// How many search results the dropdown lists.
const DROPDOWN_RESULTS: usize = 8;

/// Offset of a popup from the marker it belongs to.
const POPUP_OFFSET: Vec2 = vec2(14.0, -14.0);

fn pin_kind_hint(kind: PinKind) -> &'static str {
    match kind {
        PinKind::Incident => "Active incident",
        PinKind::Checkpoint => "Security checkpoint",
        PinKind::Station => "Police station",
        PinKind::Emergency => "Emergency location",
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// A small filled circle used as a legend key.
fn swatch(ui: &mut Ui, color: Color32) {
    let (rect, _) = ui.allocate_exact_size(Vec2::splat(14.0), Sense::hover());
    ui.painter().circle_filled(rect.center(), 6.0, color);
}

fn popup_window<'open>(
    title: impl Into<egui::WidgetText>,
    anchor: Pos2,
) -> egui::Window<'open> {
    egui::Window::new(title)
        .id(Id::new("dispatch_marker_popup"))
        .fixed_pos(anchor + POPUP_OFFSET)
        .collapsible(false)
        .resizable(false)
}

fn address_rows(ui: &mut Ui, address: Option<&Address>) {
    let Some(address) = address else {
        return;
    };
    if let Some(city) = address.locality() {
        ui.label("City:");
        ui.label(city);
        ui.end_row();
    }
    if let Some(country) = &address.country {
        ui.label("Country:");
        ui.label(country);
        ui.end_row();
    }
}

impl Dashboard {
    /// Draws the whole dashboard for one frame and applies what the user did.
    pub fn show(&mut self, ctx: &egui::Context) {
        let now = Instant::now();
        self.poll(now);

        let dropdown_anchor = self.render_header(ctx);
        if self.search_results_open() {
            self.render_search_results(ctx, dropdown_anchor);
        }

        if self.minimized {
            self.render_summary(ctx);
        } else {
            self.render_map(ctx);
            self.collect_map_clicks();
            self.render_marker_popup(ctx);
            self.render_address_popup(ctx, now);
            if self.show_legend {
                self.render_legend(ctx);
            }
        }

        self.render_pin_form(ctx);
        self.render_notice(ctx);

        if self.has_pending_requests() {
            ctx.request_repaint();
        }
    }

    /// Returns where the search dropdown should open.
    fn render_header(&mut self, ctx: &egui::Context) -> Pos2 {
        let mut dropdown_anchor = Pos2::ZERO;

        egui::TopBottomPanel::top("dispatch_header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(&self.config.title);
                ui.label(format!("{} Active Units", self.vehicles().len()));

                let label = if self.minimized { "Maximize" } else { "Minimize" };
                if ui.button(label).clicked() {
                    self.toggle_minimized();
                }
            });

            ui.horizontal(|ui| {
                let response = ui.add(
                    egui::TextEdit::singleline(&mut self.search_query)
                        .hint_text("Search address or place...")
                        .desired_width(280.0),
                );
                dropdown_anchor = response.rect.left_bottom();

                if response.changed() {
                    let query = self.search_query.clone();
                    self.set_search_query(query);
                }
                if response.gained_focus() {
                    self.focus_search();
                }

                let enter = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                let searching = self.is_searching();
                let label = if searching { "Searching..." } else { "Search" };
                let clicked = ui.add_enabled(!searching, egui::Button::new(label)).clicked();
                if enter || clicked {
                    self.submit_search();
                }

                ui.separator();

                for mode in crate::config::TileMode::ALL {
                    let button = egui::Button::new(mode.label()).selected(self.tile_mode == mode);
                    if ui.add(button).clicked() {
                        self.set_tile_mode(mode);
                    }
                }

                ui.separator();

                if ui
                    .add(egui::Button::new("Routes").selected(self.routes_visible()))
                    .clicked()
                {
                    self.toggle_routes_visible();
                }
                if ui
                    .add(egui::Button::new("Pin").selected(self.placing_pin))
                    .on_hover_text("Click on the map to add a location pin")
                    .clicked()
                {
                    self.toggle_pin_placement();
                }
                if ui.button("My Location").clicked() {
                    self.locate_me();
                }
                if ui
                    .add(egui::Button::new("Legend").selected(self.show_legend))
                    .clicked()
                {
                    self.toggle_legend();
                }
            });
        });

        dropdown_anchor
    }

    fn render_search_results(&mut self, ctx: &egui::Context, anchor: Pos2) {
        let mut chosen = None;

        egui::Area::new(Id::new("dispatch_search_results"))
            .fixed_pos(anchor)
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.set_max_width(360.0);
                    for (index, place) in self
                        .search_results
                        .iter()
                        .take(DROPDOWN_RESULTS)
                        .enumerate()
                    {
                        let response = ui
                            .vertical(|ui| {
                                ui.label(RichText::new(place.short_name()).strong());
                                ui.label(RichText::new(&place.display_name).small());
                                if let Some(category) = place.category() {
                                    ui.label(RichText::new(category).small().weak());
                                }
                            })
                            .response
                            .interact(Sense::click())
                            .on_hover_cursor(CursorIcon::PointingHand);
                        if response.clicked() {
                            chosen = Some(index);
                        }
                        ui.separator();
                    }
                });
            });

        if let Some(index) = chosen {
            self.select_search_result(index);
        }
    }

    fn render_map(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let response = ui.add(&mut self.map);
                if self.placing_pin {
                    response.on_hover_cursor(CursorIcon::Crosshair);
                }
            });
    }

    fn render_summary(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(40.0);
                ui.heading(&self.config.title);
                ui.add_space(10.0);
                ui.label(format!("{} Active Units", self.vehicles().len()));
                ui.label(format!("{} Location Pins", self.pins().len()));
                ui.label(format!("{} Search Results", self.search_markers().len()));
                ui.add_space(10.0);
                if ui.button("Expand Map View").clicked() {
                    self.toggle_minimized();
                }
            });
        });
    }

    fn render_marker_popup(&mut self, ctx: &egui::Context) {
        let Some(projection) = self.map.projection() else {
            return;
        };
        let Some(popup) = self.open_popup.clone() else {
            return;
        };

        let mut open = true;
        match popup {
            MarkerPopup::Vehicle(id) => {
                let Some(vehicle) = self
                    .vehicle_layer()
                    .and_then(|layer| layer.vehicle(&id))
                    .cloned()
                else {
                    self.close_popup();
                    return;
                };
                let position = vehicle.position();
                let anchor = projection.project(position.unwrap_or(self.map.center));
                let has_route = self
                    .vehicle_layer()
                    .is_some_and(|layer| layer.route(&id).is_some());
                let tracking = self.tracking() == Some(id.as_str());
                let (mut toggle_route, mut toggle_tracking) = (false, false);

                popup_window(&vehicle.vehicle_id, anchor)
                    .open(&mut open)
                    .show(ctx, |ui| {
                        ui.label(
                            RichText::new(vehicle.status.label())
                                .color(vehicle.status.color())
                                .strong(),
                        );
                        egui::Grid::new("vehicle_popup_grid")
                            .num_columns(2)
                            .show(ui, |ui| {
                                ui.label("Type:");
                                ui.label(vehicle.vehicle_type.label());
                                ui.end_row();

                                let description = vehicle.description();
                                if !description.is_empty() {
                                    ui.label("Vehicle:");
                                    ui.label(description);
                                    ui.end_row();
                                }
                                if let Some(plate) = &vehicle.license_plate {
                                    ui.label("Plate:");
                                    ui.label(plate);
                                    ui.end_row();
                                }
                                if let Some(officer) = &vehicle.assigned_officer_id {
                                    ui.label("Officer:");
                                    ui.label(officer);
                                    ui.end_row();
                                }
                                if let Some(updated) = &vehicle.last_update {
                                    ui.label("Updated:");
                                    ui.label(format_time(updated));
                                    ui.end_row();
                                }
                                ui.label("Location:");
                                ui.label(
                                    position
                                        .as_ref()
                                        .map(GeoPos::to_lat_lon_string)
                                        .unwrap_or_else(|| "Unknown".to_string()),
                                );
                                ui.end_row();
                            });

                        ui.horizontal(|ui| {
                            let label = if has_route { "Hide Route" } else { "Show Route" };
                            toggle_route = ui.button(label).clicked();
                            let label = if tracking { "Stop Tracking" } else { "Track" };
                            toggle_tracking = ui.button(label).clicked();
                        });
                    });

                if toggle_route {
                    self.toggle_route(&id);
                }
                if toggle_tracking {
                    self.toggle_tracking(&id);
                }
            }
            MarkerPopup::Pin(id) => {
                let Some(pin) = self
                    .pin_layer()
                    .and_then(|layer| layer.get(id))
                    .cloned()
                else {
                    self.close_popup();
                    return;
                };
                let mut remove = false;

                popup_window(pin.kind.label(), projection.project(pin.position))
                    .open(&mut open)
                    .show(ctx, |ui| {
                        egui::Grid::new("pin_popup_grid")
                            .num_columns(2)
                            .show(ui, |ui| {
                                ui.label("Address:");
                                ui.label(&pin.address);
                                ui.end_row();
                                if !pin.description.is_empty() {
                                    ui.label("Description:");
                                    ui.label(&pin.description);
                                    ui.end_row();
                                }
                                ui.label("Added:");
                                ui.label(format_time(&pin.timestamp));
                                ui.end_row();
                                ui.label("Location:");
                                ui.label(pin.position.to_lat_lon_string());
                                ui.end_row();
                            });
                        if pin.geocoded {
                            ui.label(RichText::new("✓ Geocoded").color(Color32::GREEN));
                        }
                        remove = ui.button("Remove").clicked();
                    });

                if remove {
                    self.remove_pin(id);
                }
            }
            MarkerPopup::Search(id) => {
                let Some(marker) = self
                    .search_layer()
                    .and_then(|layer| layer.get(&id))
                    .cloned()
                else {
                    self.close_popup();
                    return;
                };
                let (mut add_pin, mut remove) = (false, false);

                popup_window("Search Result", projection.project(marker.position))
                    .open(&mut open)
                    .show(ctx, |ui| {
                        ui.label(RichText::new(&marker.title).strong());
                        egui::Grid::new("search_popup_grid")
                            .num_columns(2)
                            .show(ui, |ui| {
                                address_rows(ui, marker.address.as_ref());
                                if let (Some(class), Some(kind)) =
                                    (&marker.place_class, &marker.place_type)
                                {
                                    ui.label("Type:");
                                    ui.label(format!("{class} • {kind}"));
                                    ui.end_row();
                                }
                                ui.label("Location:");
                                ui.label(marker.position.to_lat_lon_string());
                                ui.end_row();
                            });
                        ui.horizontal(|ui| {
                            add_pin = ui.button("Add Pin Here").clicked();
                            remove = ui.button("Remove").clicked();
                        });
                    });

                if add_pin {
                    self.close_popup();
                    self.open_pin_form(marker.position, Some(marker.title.clone()));
                }
                if remove {
                    self.remove_search_marker(&id);
                }
            }
        }

        if !open {
            self.close_popup();
        }
    }

    fn render_address_popup(&mut self, ctx: &egui::Context, now: Instant) {
        let Some(projection) = self.map.projection() else {
            return;
        };
        let Some(popup) = self.address_popup.clone() else {
            return;
        };
        let (mut add_pin, mut close) = (false, false);

        egui::Window::new("Address")
            .id(Id::new("dispatch_address_popup"))
            .fixed_pos(projection.project(popup.position) + POPUP_OFFSET)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(RichText::new(&popup.hit.display_name).strong());
                egui::Grid::new("address_popup_grid")
                    .num_columns(2)
                    .show(ui, |ui| {
                        ui.label("Location:");
                        ui.label(popup.position.to_lat_lon_string());
                        ui.end_row();
                        address_rows(ui, popup.hit.address.as_ref());
                    });
                ui.horizontal(|ui| {
                    add_pin = ui.button("Add Pin Here").clicked();
                    close = ui.button("Close").clicked();
                });
            });

        if add_pin {
            self.pin_address_popup();
        } else if close {
            self.close_address_popup();
        } else {
            let shown_for = now.saturating_duration_since(popup.shown_at);
            ctx.request_repaint_after(
                self.config
                    .address_popup_lifetime()
                    .saturating_sub(shown_for),
            );
        }
    }

    fn render_legend(&mut self, ctx: &egui::Context) {
        let mut open = true;

        egui::Window::new("Command Center Legend")
            .anchor(Align2::RIGHT_BOTTOM, vec2(-10.0, -30.0))
            .collapsible(false)
            .resizable(false)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.strong("Vehicle Status");
                egui::Grid::new("legend_vehicles").show(ui, |ui| {
                    for status in VehicleStatus::KNOWN {
                        swatch(ui, status.color());
                        ui.label(status.label());
                        ui.label(RichText::new(status.hint()).small().weak());
                        ui.end_row();
                    }
                });

                ui.separator();
                ui.strong("Location Markers");
                egui::Grid::new("legend_pins").show(ui, |ui| {
                    for kind in PinKind::ALL {
                        swatch(ui, kind.color());
                        ui.label(kind.label());
                        ui.label(RichText::new(pin_kind_hint(kind)).small().weak());
                        ui.end_row();
                    }
                });

                ui.separator();
                ui.strong("Search Results");
                egui::Grid::new("legend_search").show(ui, |ui| {
                    swatch(ui, MAIN_COLOR);
                    ui.label("Main Result");
                    ui.label(RichText::new("Primary search match").small().weak());
                    ui.end_row();
                    swatch(ui, OTHER_COLOR);
                    ui.label("Other Results");
                    ui.label(RichText::new("Additional matches").small().weak());
                    ui.end_row();
                });
            });

        if !open {
            self.toggle_legend();
        }
    }

    fn render_pin_form(&mut self, ctx: &egui::Context) {
        let geocoding = self.is_geocoding_pin();
        let Some(form) = self.pin_form.as_mut() else {
            return;
        };
        let (mut submit, mut cancel) = (false, false);

        let modal = egui::Modal::new(Id::new("dispatch_pin_form")).show(ctx, |ui| {
            ui.set_width(320.0);
            ui.heading("Add Location Pin");
            ui.add_space(6.0);

            egui::ComboBox::from_label("Type")
                .selected_text(form.kind.label())
                .show_ui(ui, |ui| {
                    for kind in PinKind::ALL {
                        ui.selectable_value(&mut form.kind, kind, kind.label());
                    }
                });

            ui.label("Address:");
            ui.add(
                egui::TextEdit::singleline(&mut form.address)
                    .hint_text("Enter specific address to geocode...")
                    .desired_width(f32::INFINITY),
            );
            ui.label(
                RichText::new("Enter a new address to automatically find its location on the map")
                    .small()
                    .weak(),
            );

            ui.label("Description:");
            ui.add(
                egui::TextEdit::multiline(&mut form.description)
                    .hint_text("Enter description...")
                    .desired_rows(3)
                    .desired_width(f32::INFINITY),
            );

            ui.add_space(6.0);
            ui.horizontal(|ui| {
                cancel = ui.button("Cancel").clicked();
                let label = if geocoding { "Geocoding..." } else { "Add Pin" };
                submit = ui.add_enabled(!geocoding, egui::Button::new(label)).clicked();
            });
        });

        if cancel || (modal.should_close() && !geocoding) {
            self.cancel_pin();
        } else if submit {
            self.submit_pin();
        }
    }

    fn render_notice(&mut self, ctx: &egui::Context) {
        let Some(notice) = self.notice().map(str::to_string) else {
            return;
        };
        let mut dismiss = false;

        let modal = egui::Modal::new(Id::new("dispatch_notice")).show(ctx, |ui| {
            ui.set_max_width(320.0);
            ui.label(notice);
            ui.add_space(6.0);
            dismiss = ui.button("OK").clicked();
        });

        if dismiss || modal.should_close() {
            self.dismiss_notice();
        }
    }
}
