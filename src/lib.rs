#![warn(missing_docs)]

//! A dispatch dashboard map for `egui`.
//!
//! The crate is built around a slippy `Map` widget that downloads raster tiles, supports panning
//! and zooming, and draws a stack of [`layers::Layer`]s on top: vehicle markers and routes,
//! user placed location pins, and geocoding search results. [`dashboard::Dashboard`] owns the
//! whole dispatch view and wires the map to the [`geocoding`] client.
//!
//! # Example
//!
//! ```no_run
//! use eframe::egui;
//! use dispatch_map::{Map, config::OpenStreetMapConfig, layers::pins::PinLayer};
//!
//! struct MyApp {
//!     map: Map,
//! }
//!
//! impl Default for MyApp {
//!     fn default() -> Self {
//!         let mut map = Map::new(OpenStreetMapConfig::default());
//!         map.add_layer("pins", PinLayer::default());
//!         Self { map }
//!     }
//! }
//!
//! impl eframe::App for MyApp {
//!     fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
//!         egui::CentralPanel::default()
//!             .frame(egui::Frame::NONE)
//!             .show(ctx, |ui| {
//!                 ui.add(&mut self.map);
//!             });
//!     }
//! }
//! ```

/// Configuration traits and types for the map widget and the dashboard.
pub mod config;

/// The dispatch dashboard state and its transitions.
pub mod dashboard;

/// Forward and reverse geocoding against Nominatim.
pub mod geocoding;

/// Layers drawn on top of the map tiles.
pub mod layers;

/// Sources for the dispatcher's own position.
pub mod location;

/// Conversion between geographical and screen coordinates.
pub mod projection;

/// Dashboard chrome: header, popups, modal form and legend.
pub mod ui;

/// Vehicles supplied by the host dashboard.
pub mod vehicle;

use eframe::egui;
use egui::{Color32, Rect, Response, Sense, Ui, Vec2, Widget, pos2};
use eyre::{Context, Result};
use log::{debug, error};
use once_cell::sync::Lazy;
use poll_promise::Promise;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::MapConfig;
use crate::layers::Layer;
use crate::projection::{GeoPos, MapProjection};

// The size of a map tile in pixels.
pub(crate) const TILE_SIZE: u32 = 256;
/// The minimum zoom level.
pub const MIN_ZOOM: u8 = 0;
/// The maximum zoom level.
pub const MAX_ZOOM: u8 = 19;

// Reuse the reqwest client for all downloads by making it a static variable.
pub(crate) static CLIENT: Lazy<reqwest::blocking::Client> = Lazy::new(|| {
    reqwest::blocking::Client::builder()
        .user_agent(format!(
            "{}/{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ))
        .build()
        .expect("Failed to build reqwest client")
});

/// Errors that can occur while using the map widget.
#[derive(Error, Debug)]
pub enum MapError {
    /// An error occurred while making a web request.
    #[error("Connection error")]
    ConnectionError(#[from] reqwest::Error),

    /// A map tile failed to download.
    #[error("A map tile failed to download. HTTP Status: `{0}`")]
    TileDownloadError(String),

    /// The downloaded tile bytes could not be converted to an image.
    #[error("Unable to convert downloaded map tile bytes as image")]
    TileBytesConversionError(#[from] image::ImageError),
}

/// A unique identifier for a map tile.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct TileId {
    /// The zoom level.
    pub z: u8,

    /// The x-coordinate of the tile.
    pub x: u32,

    /// The y-coordinate of the tile.
    pub y: u32,
}

impl TileId {
    fn to_url(&self, config: &dyn MapConfig) -> String {
        config.tile_url(self)
    }
}

/// The state of a tile in the cache.
enum Tile {
    /// The tile is being downloaded.
    Loading(Promise<Result<egui::ColorImage, Arc<eyre::Report>>>),

    /// The tile is in memory.
    Loaded(egui::TextureHandle),

    /// The tile failed to download.
    Failed(Arc<eyre::Report>),
}

/// The map widget.
pub struct Map {
    /// The geographical center of the map.
    pub center: GeoPos,

    /// The zoom level of the map.
    pub zoom: u8,

    tiles: HashMap<TileId, Tile>,

    layers: Vec<(String, Box<dyn Layer>)>,

    /// The geographical position under the mouse pointer, if any.
    pub mouse_pos: Option<GeoPos>,

    clicked_pos: Option<GeoPos>,

    last_rect: Option<Rect>,

    /// Configuration for the map, such as the tile server URL.
    config: Box<dyn MapConfig>,
}

impl Map {
    /// Creates a new `Map` widget.
    ///
    /// # Arguments
    ///
    /// * `config` - A type that implements `MapConfig`, which provides configuration for the map.
    pub fn new<C: MapConfig + 'static>(config: C) -> Self {
        Self::with_boxed_config(Box::new(config))
    }

    /// Creates a new `Map` widget from an already boxed configuration.
    pub fn with_boxed_config(config: Box<dyn MapConfig>) -> Self {
        Self {
            center: config.default_center(),
            zoom: config.default_zoom(),
            tiles: HashMap::new(),
            layers: Vec::new(),
            mouse_pos: None,
            clicked_pos: None,
            last_rect: None,
            config,
        }
    }

    /// Switches the tile provider. Cached tiles of the previous provider are dropped.
    pub fn set_config(&mut self, config: Box<dyn MapConfig>) {
        self.tiles.clear();
        self.config = config;
    }

    /// Adds a layer under `key`. Layers added later are drawn on top.
    pub fn add_layer(&mut self, key: impl Into<String>, layer: impl Layer) {
        self.layers.push((key.into(), Box::new(layer)));
    }

    /// Gets a reference to the layer stored under `key`, if it has type `T`.
    pub fn layer<T: Layer>(&self, key: &str) -> Option<&T> {
        self.layers
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, layer)| layer.as_any().downcast_ref::<T>())
    }

    /// Gets a mutable reference to the layer stored under `key`, if it has type `T`.
    pub fn layer_mut<T: Layer>(&mut self, key: &str) -> Option<&mut T> {
        self.layers
            .iter_mut()
            .find(|(k, _)| k == key)
            .and_then(|(_, layer)| layer.as_any_mut().downcast_mut::<T>())
    }

    /// Centers the map on `pos` at `zoom`.
    pub fn focus(&mut self, pos: GeoPos, zoom: u8) {
        self.center = pos;
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// The projection of the most recently drawn frame.
    pub fn projection(&self) -> Option<MapProjection> {
        self.last_rect
            .map(|rect| MapProjection::new(self.zoom, self.center, rect))
    }

    /// Takes the position of the last plain click on the map that no layer consumed.
    pub fn take_click(&mut self) -> Option<GeoPos> {
        self.clicked_pos.take()
    }

    /// Handles user input for panning and zooming.
    fn handle_input(&mut self, ui: &Ui, rect: &Rect, response: &Response) {
        let projection = MapProjection::new(self.zoom, self.center, *rect);

        // Topmost layers get the first chance to consume the input.
        let mut consumed = false;
        for (_, layer) in self.layers.iter_mut().rev() {
            if layer.handle_input(response, &projection) {
                consumed = true;
                break;
            }
        }

        self.mouse_pos = response.hover_pos().map(|pos| projection.unproject(pos));

        if consumed {
            return;
        }

        // The second click of a double-click zooms; only the first one counts as a click.
        if response.clicked() && !response.double_clicked() {
            if let Some(pointer_pos) = response.interact_pointer_pos() {
                self.clicked_pos = Some(projection.unproject(pointer_pos));
            }
        }

        // Handle panning
        if response.dragged() {
            let delta = response.drag_delta();
            let center_in_tiles_x = lon_to_x(self.center.lon, self.zoom);
            let center_in_tiles_y = lat_to_y(self.center.lat, self.zoom);

            let mut new_center_x = center_in_tiles_x - (delta.x as f64 / TILE_SIZE as f64);
            let mut new_center_y = center_in_tiles_y - (delta.y as f64 / TILE_SIZE as f64);

            // Clamp the new center to the map boundaries.
            let world_size_in_tiles = 2.0_f64.powi(self.zoom as i32);
            let view_size_in_tiles_x = rect.width() as f64 / TILE_SIZE as f64;
            let view_size_in_tiles_y = rect.height() as f64 / TILE_SIZE as f64;

            let min_center_x = view_size_in_tiles_x / 2.0;
            let max_center_x = world_size_in_tiles - view_size_in_tiles_x / 2.0;
            let min_center_y = view_size_in_tiles_y / 2.0;
            let max_center_y = world_size_in_tiles - view_size_in_tiles_y / 2.0;

            // If the map is smaller than the viewport, center it. Otherwise, clamp the center.
            new_center_x = if min_center_x > max_center_x {
                world_size_in_tiles / 2.0
            } else {
                new_center_x.clamp(min_center_x, max_center_x)
            };
            new_center_y = if min_center_y > max_center_y {
                world_size_in_tiles / 2.0
            } else {
                new_center_y.clamp(min_center_y, max_center_y)
            };

            self.center = GeoPos {
                lon: x_to_lon(new_center_x, self.zoom),
                lat: y_to_lat(new_center_y, self.zoom),
            };
        }

        // Handle double-click to zoom and center
        if response.double_clicked() {
            if let Some(pointer_pos) = response.interact_pointer_pos() {
                let new_zoom = (self.zoom + 1).clamp(MIN_ZOOM, MAX_ZOOM);
                if new_zoom != self.zoom {
                    self.center = projection.unproject(pointer_pos);
                    self.zoom = new_zoom;
                }
            }
        }

        // Handle scroll zooming around the mouse position
        if let Some(mouse_pos) = response.hover_pos() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                let old_zoom = self.zoom;
                let mut new_zoom = (self.zoom as i32 + scroll.signum() as i32)
                    .clamp(MIN_ZOOM as i32, MAX_ZOOM as i32) as u8;

                // If we are zooming out, check if the new zoom level is valid.
                if scroll < 0.0 {
                    let world_pixel_size = 2.0_f64.powi(new_zoom as i32) * TILE_SIZE as f64;
                    // If the world size would become smaller than the widget size, reject the zoom.
                    if world_pixel_size < rect.width() as f64
                        || world_pixel_size < rect.height() as f64
                    {
                        new_zoom = old_zoom;
                    }
                }

                if new_zoom != old_zoom {
                    let target = projection.unproject(mouse_pos);
                    let mouse_rel = mouse_pos - rect.min;
                    let widget_center_x = rect.width() as f64 / 2.0;
                    let widget_center_y = rect.height() as f64 / 2.0;

                    self.zoom = new_zoom;

                    // Adjust the map center so the geo-coordinate under the mouse remains the same
                    let new_center_x = lon_to_x(target.lon, new_zoom)
                        - (mouse_rel.x as f64 - widget_center_x) / TILE_SIZE as f64;
                    let new_center_y = lat_to_y(target.lat, new_zoom)
                        - (mouse_rel.y as f64 - widget_center_y) / TILE_SIZE as f64;

                    self.center = GeoPos {
                        lon: x_to_lon(new_center_x, new_zoom),
                        lat: y_to_lat(new_center_y, new_zoom),
                    };
                }
            }
        }
    }

    /// Draws the map tiles, the layers and the attribution.
    fn draw(&mut self, ui: &mut Ui, rect: &Rect) {
        let painter = ui.painter_at(*rect);
        painter.rect_filled(*rect, 0.0, Color32::from_rgb(220, 220, 220)); // Background

        let projection = MapProjection::new(self.zoom, self.center, *rect);
        let visible: Vec<_> = visible_tiles(&projection).collect();
        for (tile_id, tile_pos) in visible {
            self.load_tile(ui.ctx(), tile_id);
            self.draw_tile(ui, &painter, tile_id, tile_pos);
        }

        for (_, layer) in &self.layers {
            layer.draw(&painter, &projection);
        }

        self.draw_attribution(ui, rect);
    }

    /// Starts downloading a tile, or moves a finished download into the texture cache.
    fn load_tile(&mut self, ctx: &egui::Context, tile_id: TileId) {
        let tile_state = self.tiles.entry(tile_id).or_insert_with(|| {
            let url = tile_id.to_url(self.config.as_ref());
            let promise =
                Promise::spawn_thread("download_tile", move || -> Result<_, Arc<eyre::Report>> {
                    let result: Result<_, eyre::Report> = (|| {
                        debug!("Downloading tile from {}", &url);
                        let response = CLIENT.get(&url).send().map_err(MapError::from)?;

                        if !response.status().is_success() {
                            return Err(MapError::TileDownloadError(response.status().to_string()));
                        }

                        let bytes = response.bytes().map_err(MapError::from)?.to_vec();
                        let image = image::load_from_memory(&bytes)
                            .map_err(MapError::from)?
                            .to_rgba8();

                        let size = [image.width() as _, image.height() as _];
                        let pixels = image.into_raw();
                        Ok(egui::ColorImage::from_rgba_unmultiplied(size, &pixels))
                    })()
                    .with_context(|| format!("Failed to download tile from {}", &url));

                    result.map_err(Arc::new)
                });
            Tile::Loading(promise)
        });

        if let Tile::Loading(promise) = tile_state {
            match promise.ready() {
                Some(Ok(color_image)) => {
                    let texture = ctx.load_texture(
                        format!("tile_{}_{}_{}", tile_id.z, tile_id.x, tile_id.y),
                        color_image.clone(),
                        Default::default(),
                    );
                    *tile_state = Tile::Loaded(texture);
                }
                Some(Err(e)) => {
                    error!("{:?}", e);
                    *tile_state = Tile::Failed(e.clone());
                }
                // The tile is still loading, so we need to tell egui to repaint.
                None => ctx.request_repaint(),
            }
        }
    }

    /// Draws a single map tile.
    fn draw_tile(&self, ui: &Ui, painter: &egui::Painter, tile_id: TileId, tile_pos: egui::Pos2) {
        let tile_rect =
            Rect::from_min_size(tile_pos, Vec2::new(TILE_SIZE as f32, TILE_SIZE as f32));

        match self.tiles.get(&tile_id) {
            Some(Tile::Loaded(texture)) => {
                painter.image(
                    texture.id(),
                    tile_rect,
                    Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                    Color32::WHITE,
                );
            }
            Some(Tile::Failed(e)) => {
                draw_placeholder(painter, tile_rect, "!", Color32::RED);
                let response = ui.interact(tile_rect, ui.id().with(tile_id), Sense::hover());
                response.on_hover_text(format!("{}", e));
            }
            Some(Tile::Loading(_)) | None => {
                draw_placeholder(painter, tile_rect, "?", Color32::ORANGE);
            }
        }
    }

    /// Draws the attribution text.
    fn draw_attribution(&self, ui: &mut Ui, rect: &Rect) {
        if let Some(attribution) = self.config.attribution() {
            let bg_color = if ui.visuals().dark_mode {
                Color32::from_black_alpha(150)
            } else {
                Color32::from_white_alpha(150)
            };

            let frame = egui::Frame::NONE
                .inner_margin(egui::Margin::same(5))
                .fill(bg_color)
                .corner_radius(3.0);

            egui::Area::new(ui.id().with("attribution"))
                .fixed_pos(rect.left_bottom())
                .anchor(egui::Align2::LEFT_BOTTOM, egui::vec2(5.0, -5.0))
                .show(ui.ctx(), |ui| {
                    frame.show(ui, |ui| {
                        ui.style_mut().override_text_style = Some(egui::TextStyle::Small);
                        ui.style_mut().wrap_mode = Some(egui::TextWrapMode::Extend); // Don't wrap attribution text.

                        if let Some(url) = self.config.attribution_url() {
                            ui.hyperlink_to(attribution, url);
                        } else {
                            ui.label(attribution);
                        }
                    });
                });
        }
    }
}

/// Draws a gray tile with a marker character in the center.
fn draw_placeholder(painter: &egui::Painter, tile_rect: Rect, mark: &str, color: Color32) {
    painter.rect_filled(tile_rect, 0.0, Color32::from_gray(220));
    painter.rect_stroke(
        tile_rect,
        0.0,
        egui::Stroke::new(1.0, Color32::GRAY),
        egui::StrokeKind::Inside,
    );
    painter.text(
        tile_rect.center(),
        egui::Align2::CENTER_CENTER,
        mark,
        egui::FontId::proportional(40.0),
        color,
    );
}

/// Returns an iterator over the tiles covering the projection's rectangle and their screen
/// positions. Tiles outside the world are skipped.
pub(crate) fn visible_tiles(
    projection: &MapProjection,
) -> impl Iterator<Item = (TileId, egui::Pos2)> + use<> {
    let rect = projection.rect();
    let zoom = projection.zoom();
    let center = projection.unproject(rect.center());
    let center_x = lon_to_x(center.lon, zoom);
    let center_y = lat_to_y(center.lat, zoom);

    let widget_center_x = rect.width() / 2.0;
    let widget_center_y = rect.height() / 2.0;

    let x_min = (center_x - widget_center_x as f64 / TILE_SIZE as f64).floor() as i64;
    let y_min = (center_y - widget_center_y as f64 / TILE_SIZE as f64).floor() as i64;
    let x_max = (center_x + widget_center_x as f64 / TILE_SIZE as f64).ceil() as i64;
    let y_max = (center_y + widget_center_y as f64 / TILE_SIZE as f64).ceil() as i64;

    let world_tiles = 1_i64 << zoom;
    let rect_min = rect.min;
    (x_min..=x_max)
        .flat_map(move |x| (y_min..=y_max).map(move |y| (x, y)))
        .filter(move |(x, y)| (0..world_tiles).contains(x) && (0..world_tiles).contains(y))
        .map(move |(x, y)| {
            let tile_id = TileId {
                z: zoom,
                x: x as u32,
                y: y as u32,
            };
            let screen_x = widget_center_x + (x as f64 - center_x) as f32 * TILE_SIZE as f32;
            let screen_y = widget_center_y + (y as f64 - center_y) as f32 * TILE_SIZE as f32;
            (tile_id, rect_min + Vec2::new(screen_x, screen_y))
        })
}

/// Converts longitude to the x-coordinate of a tile at a given zoom level.
pub(crate) fn lon_to_x(lon: f64, zoom: u8) -> f64 {
    (lon + 180.0) / 360.0 * (2.0_f64.powi(zoom as i32))
}

/// Converts latitude to the y-coordinate of a tile at a given zoom level.
pub(crate) fn lat_to_y(lat: f64, zoom: u8) -> f64 {
    (1.0 - lat.to_radians().tan().asinh() / std::f64::consts::PI) / 2.0
        * (2.0_f64.powi(zoom as i32))
}

/// Converts the x-coordinate of a tile to longitude at a given zoom level.
pub(crate) fn x_to_lon(x: f64, zoom: u8) -> f64 {
    x / (2.0_f64.powi(zoom as i32)) * 360.0 - 180.0
}

/// Converts the y-coordinate of a tile to latitude at a given zoom level.
pub(crate) fn y_to_lat(y: f64, zoom: u8) -> f64 {
    let n = std::f64::consts::PI - 2.0 * std::f64::consts::PI * y / (2.0_f64.powi(zoom as i32));
    n.sinh().atan().to_degrees()
}

impl Widget for &mut Map {
    fn ui(self, ui: &mut Ui) -> Response {
        let (rect, response) =
            ui.allocate_exact_size(ui.available_size(), Sense::drag().union(Sense::click()));
        self.last_rect = Some(rect);
        self.handle_input(ui, &rect, &response);
        self.draw(ui, &rect);

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenStreetMapConfig;
    use crate::layers::pins::PinLayer;
    use crate::layers::search::SearchLayer;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_coord_conversion_roundtrip() {
        let zoom: u8 = 10;
        for (lon, lat) in [(-74.5058, 45.0792), (-122.4194, 37.7749)] {
            let final_lon = x_to_lon(lon_to_x(lon, zoom), zoom);
            let final_lat = y_to_lat(lat_to_y(lat, zoom), zoom);
            assert!((lon - final_lon).abs() < EPSILON);
            assert!((lat - final_lat).abs() < EPSILON);
        }
    }

    #[test]
    fn test_y_to_lat_conversion() {
        // y, zoom, expected_lat
        let test_cases = vec![
            // Equator
            (0.5, 0, 0.0),
            (128.0, 8, 0.0),
            // Near poles (Mercator projection limits)
            (0.0, 0, 85.0511287798),
            (1.0, 0, -85.0511287798),
            (256.0, 8, -85.0511287798),
            // London
            (85.12653378959828, 8, 51.5074),
        ];

        for (y, zoom, expected_lat) in test_cases {
            assert!((y_to_lat(y, zoom) - expected_lat).abs() < EPSILON);
        }
    }

    #[test]
    fn test_lon_to_x_conversion() {
        // lon, zoom, expected_x
        let test_cases = vec![
            (0.0, 0, 0.5),
            (0.0, 8, 128.0),
            (-180.0, 0, 0.0),
            (180.0, 8, 256.0),
            (-0.1275, 8, 127.90933333333333),
        ];

        for (lon, zoom, expected_x) in test_cases {
            assert!((lon_to_x(lon, zoom) - expected_x).abs() < EPSILON);
        }
    }

    #[test]
    fn test_tile_id_to_url() {
        let config = OpenStreetMapConfig::default();
        let tile_id = TileId {
            z: 10,
            x: 559,
            y: 330,
        };
        assert_eq!(
            tile_id.to_url(&config),
            "https://tile.openstreetmap.org/10/559/330.png"
        );
    }

    #[test]
    fn test_map_new() {
        let config = OpenStreetMapConfig::default();
        let default_center = config.default_center();
        let default_zoom = config.default_zoom();

        let map = Map::new(config);

        assert_eq!(map.center, default_center);
        assert_eq!(map.zoom, default_zoom);
        assert!(map.mouse_pos.is_none());
        assert!(map.tiles.is_empty());
        assert!(map.projection().is_none());
    }

    #[test]
    fn focus_clamps_zoom() {
        let mut map = Map::new(OpenStreetMapConfig::default());
        let pos = GeoPos {
            lon: -73.56,
            lat: 45.5,
        };
        map.focus(pos, 42);
        assert_eq!(map.center, pos);
        assert_eq!(map.zoom, MAX_ZOOM);
    }

    #[test]
    fn layers_are_found_by_key_and_type() {
        let mut map = Map::new(OpenStreetMapConfig::default());
        map.add_layer("pins", PinLayer::default());
        map.add_layer("search", SearchLayer::default());

        assert!(map.layer::<PinLayer>("pins").is_some());
        assert!(map.layer_mut::<SearchLayer>("search").is_some());
        // Wrong type under an existing key.
        assert!(map.layer::<SearchLayer>("pins").is_none());
        assert!(map.layer::<PinLayer>("missing").is_none());
    }

    #[test]
    fn double_click_records_a_single_click() {
        let ctx = egui::Context::default();
        // Tiles from an unreachable server fail fast without touching the network.
        let mut map = Map::new(crate::config::DynMapConfig::new(|tile| {
            format!("http://127.0.0.1:9/{}/{}/{}.png", tile.z, tile.x, tile.y)
        }));
        let pos = pos2(300.0, 200.0);
        let button = |pressed| egui::Event::PointerButton {
            pos,
            button: egui::PointerButton::Primary,
            pressed,
            modifiers: egui::Modifiers::NONE,
        };

        let mut frame = |time: f64, events: Vec<egui::Event>| {
            let input = egui::RawInput {
                time: Some(time),
                events,
                ..Default::default()
            };
            let _ = ctx.run(input, |ctx| {
                egui::CentralPanel::default()
                    .frame(egui::Frame::NONE)
                    .show(ctx, |ui| {
                        ui.add_sized([600.0, 400.0], &mut map);
                    });
            });
            map.take_click()
        };

        assert!(frame(0.0, vec![egui::Event::PointerMoved(pos)]).is_none());
        assert!(frame(0.05, vec![button(true)]).is_none());
        assert!(frame(0.1, vec![button(false)]).is_some());
        assert!(frame(0.15, vec![button(true)]).is_none());
        // The second release completes a double-click: the map zooms instead.
        assert!(frame(0.2, vec![button(false)]).is_none());
    }

    #[test]
    fn visible_tiles_stay_inside_world() {
        let rect = Rect::from_min_size(pos2(0.0, 0.0), Vec2::new(1024.0, 768.0));
        // Zoom 1 has a 2x2 world, which is smaller than the viewport.
        let projection = MapProjection::new(1, GeoPos::default(), rect);
        let tiles: Vec<_> = visible_tiles(&projection).map(|(id, _)| id).collect();
        assert_eq!(tiles.len(), 4);
        assert!(tiles.iter().all(|t| t.x < 2 && t.y < 2 && t.z == 1));
    }

    #[test]
    fn visible_tile_under_center_is_positioned_around_it() {
        let rect = Rect::from_min_size(pos2(0.0, 0.0), Vec2::new(512.0, 512.0));
        let center = GeoPos {
            lon: -74.5058,
            lat: 45.0792,
        };
        let projection = MapProjection::new(12, center, rect);
        let x = lon_to_x(center.lon, 12).floor() as u32;
        let y = lat_to_y(center.lat, 12).floor() as u32;
        let (_, tile_pos) = visible_tiles(&projection)
            .find(|(id, _)| id.x == x && id.y == y)
            .unwrap();
        let tile_rect = Rect::from_min_size(tile_pos, Vec2::splat(TILE_SIZE as f32));
        assert!(tile_rect.contains(rect.center()));
    }
}
