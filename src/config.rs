//! Configuration for map providers and for the dispatch dashboard.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::TileId;
use crate::projection::GeoPos;

/// Configuration for a map provider.
pub trait MapConfig {
    /// Returns the URL for a given tile.
    fn tile_url(&self, tile: &TileId) -> String;

    /// Returns the attribution text to be displayed on the map. If returns `None`, no attribution is shown.
    fn attribution(&self) -> Option<&String>;

    /// Returns the attribution URL to be linked from the attribution text.
    fn attribution_url(&self) -> Option<&String>;

    /// The default geographical center of the map.
    fn default_center(&self) -> GeoPos;

    /// The default zoom level of the map.
    fn default_zoom(&self) -> u8;
}

/// Configuration for the OpenStreetMap tile server.
///
/// # Example
///
/// ```
/// use dispatch_map::config::OpenStreetMapConfig;
/// let config = OpenStreetMapConfig::default();
/// ```
pub struct OpenStreetMapConfig {
    base_url: String,
    attribution: String,
    attribution_url: String,
    default_center: GeoPos,
    default_zoom: u8,
}

impl Default for OpenStreetMapConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tile.openstreetmap.org".to_string(),
            attribution: "© OpenStreetMap contributors".to_string(),
            attribution_url: "https://www.openstreetmap.org/copyright".to_string(),
            default_center: DEFAULT_CENTER,
            default_zoom: 12,
        }
    }
}

impl MapConfig for OpenStreetMapConfig {
    fn tile_url(&self, tile: &TileId) -> String {
        format!("{}/{}/{}/{}.png", self.base_url, tile.z, tile.x, tile.y)
    }

    fn attribution(&self) -> Option<&String> {
        Some(&self.attribution)
    }

    fn attribution_url(&self) -> Option<&String> {
        Some(&self.attribution_url)
    }

    fn default_center(&self) -> GeoPos {
        self.default_center
    }

    fn default_zoom(&self) -> u8 {
        self.default_zoom
    }
}

/// Configuration for an ArcGIS Online raster tile service.
///
/// ArcGIS orders tile paths as `{z}/{y}/{x}`.
///
/// # Example
///
/// ```
/// use dispatch_map::config::ArcGisConfig;
/// let imagery = ArcGisConfig::world_imagery();
/// ```
pub struct ArcGisConfig {
    base_url: String,
    service: String,
    attribution: String,
    attribution_url: String,
    default_center: GeoPos,
    default_zoom: u8,
}

impl ArcGisConfig {
    /// Creates a configuration for the named `MapServer` service.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            base_url: "https://server.arcgisonline.com/ArcGIS/rest/services".to_string(),
            service: service.into(),
            attribution: "Tiles © Esri".to_string(),
            attribution_url: "https://www.esri.com".to_string(),
            default_center: DEFAULT_CENTER,
            default_zoom: 12,
        }
    }

    /// Satellite imagery.
    pub fn world_imagery() -> Self {
        Self::new("World_Imagery")
    }

    /// Shaded relief terrain.
    pub fn world_physical() -> Self {
        Self::new("World_Physical_Map")
    }
}

impl MapConfig for ArcGisConfig {
    fn tile_url(&self, tile: &TileId) -> String {
        format!(
            "{}/{}/MapServer/tile/{}/{}/{}",
            self.base_url, self.service, tile.z, tile.y, tile.x
        )
    }

    fn attribution(&self) -> Option<&String> {
        Some(&self.attribution)
    }

    fn attribution_url(&self) -> Option<&String> {
        Some(&self.attribution_url)
    }

    fn default_center(&self) -> GeoPos {
        self.default_center
    }

    fn default_zoom(&self) -> u8 {
        self.default_zoom
    }
}

/// The base map shown under the dashboard overlays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileMode {
    /// OpenStreetMap street map.
    #[default]
    Street,
    /// ArcGIS world imagery.
    Satellite,
    /// ArcGIS physical map.
    Terrain,
}

impl TileMode {
    /// All modes, in the order the header shows them.
    pub const ALL: [TileMode; 3] = [TileMode::Street, TileMode::Satellite, TileMode::Terrain];

    /// Builds the tile provider for this mode.
    pub fn config(self) -> Box<dyn MapConfig> {
        match self {
            TileMode::Street => Box::new(OpenStreetMapConfig::default()),
            TileMode::Satellite => Box::new(ArcGisConfig::world_imagery()),
            TileMode::Terrain => Box::new(ArcGisConfig::world_physical()),
        }
    }

    /// Button label.
    pub fn label(self) -> &'static str {
        match self {
            TileMode::Street => "Street",
            TileMode::Satellite => "Satellite",
            TileMode::Terrain => "Terrain",
        }
    }
}

const DEFAULT_CENTER: GeoPos = GeoPos {
    lon: -74.5058,
    lat: 45.0792,
};

/// Settings for the dispatch dashboard.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use dispatch_map::config::DashboardConfig;
/// let config: DashboardConfig = serde_json::from_str(r#"{ "title": "North Precinct" }"#).unwrap();
/// assert_eq!(config.title, "North Precinct");
/// assert_eq!(config.focus_zoom, 15);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Heading shown in the header and in the minimized view.
    pub title: String,

    /// Where the map starts.
    pub default_center: GeoPos,

    /// Zoom the map starts at.
    pub default_zoom: u8,

    /// Zoom used when focusing a vehicle or a search result.
    pub focus_zoom: u8,

    /// Zoom used when focusing a freshly added pin or "my location".
    pub pin_zoom: u8,

    /// Base map at start-up.
    pub tile_mode: TileMode,

    /// How long the clicked-address popup stays visible, in seconds.
    pub address_popup_secs: u64,

    /// Result limit for the place search box.
    pub search_limit: u32,

    /// How many search results get a marker on the map.
    pub search_marker_limit: usize,

    /// How many markers are kept when a single search result is picked.
    pub selected_marker_limit: usize,

    /// Result limit when geocoding a typed pin address.
    pub geocode_limit: u32,

    /// Base URL of the Nominatim instance.
    pub geocoder_url: String,

    /// Fixed position reported by "My Location". `None` disables the button's lookup.
    pub home_location: Option<GeoPos>,

    /// Street tile URL template with `{z}`, `{x}` and `{y}` placeholders, replacing
    /// OpenStreetMap (e.g. a local tile cache).
    pub street_tile_template: Option<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            title: "Police Command Center".to_string(),
            default_center: DEFAULT_CENTER,
            default_zoom: 12,
            focus_zoom: 15,
            pin_zoom: 16,
            tile_mode: TileMode::Street,
            address_popup_secs: 5,
            search_limit: 10,
            search_marker_limit: 8,
            selected_marker_limit: 5,
            geocode_limit: 5,
            geocoder_url: "https://nominatim.openstreetmap.org".to_string(),
            home_location: None,
            street_tile_template: None,
        }
    }
}

impl DashboardConfig {
    /// The address popup lifetime as a `Duration`.
    pub fn address_popup_lifetime(&self) -> Duration {
        Duration::from_secs(self.address_popup_secs)
    }

    /// Builds the tile provider for `mode`, honoring `street_tile_template`.
    pub fn tile_config(&self, mode: TileMode) -> Box<dyn MapConfig> {
        match (&self.street_tile_template, mode) {
            (Some(template), TileMode::Street) => {
                let template = template.clone();
                Box::new(DynMapConfig::new(move |tile| {
                    template
                        .replace("{z}", &tile.z.to_string())
                        .replace("{x}", &tile.x.to_string())
                        .replace("{y}", &tile.y.to_string())
                }))
            }
            _ => mode.config(),
        }
    }
}

/// A dynamic map configuration that allows defining a custom tile URL function at runtime.
///
/// # Example
///
/// ```
/// use dispatch_map::config::DynMapConfig;
/// let config = DynMapConfig::new(|tile| format!("http://localhost:8080/{}/{}/{}.png", tile.z, tile.x, tile.y));
/// ```
pub struct DynMapConfig {
    tile_url: Box<dyn Fn(&TileId) -> String>,
}

impl DynMapConfig {
    /// Creates a new `DynMapConfig` with a custom tile URL function.
    pub fn new(tile_url: impl Fn(&TileId) -> String + 'static) -> Self {
        Self {
            tile_url: Box::new(tile_url),
        }
    }
}

impl MapConfig for DynMapConfig {
    fn tile_url(&self, tile: &TileId) -> String {
        (self.tile_url)(tile)
    }

    fn attribution(&self) -> Option<&String> {
        None
    }

    fn attribution_url(&self) -> Option<&String> {
        None
    }

    fn default_center(&self) -> GeoPos {
        DEFAULT_CENTER
    }

    fn default_zoom(&self) -> u8 {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TileId;

    #[test]
    fn openstreetmap_config_default() {
        let config = OpenStreetMapConfig::default();
        assert_eq!(config.base_url, "https://tile.openstreetmap.org");
        assert_eq!(config.attribution, "© OpenStreetMap contributors");
        assert_eq!(config.default_center, DEFAULT_CENTER);
        assert_eq!(config.default_zoom, 12);
    }

    #[test]
    fn openstreetmap_config_tile_url() {
        let config = OpenStreetMapConfig::default();
        let tile_id = TileId { z: 10, x: 1, y: 2 };
        assert_eq!(
            config.tile_url(&tile_id),
            "https://tile.openstreetmap.org/10/1/2.png"
        );
    }

    #[test]
    fn arcgis_tile_url_puts_row_before_column() {
        let tile_id = TileId { z: 10, x: 1, y: 2 };
        assert_eq!(
            ArcGisConfig::world_imagery().tile_url(&tile_id),
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/10/2/1"
        );
        assert_eq!(
            ArcGisConfig::world_physical().tile_url(&tile_id),
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Physical_Map/MapServer/tile/10/2/1"
        );
    }

    #[test]
    fn tile_mode_selects_provider() {
        let tile_id = TileId { z: 3, x: 4, y: 5 };
        assert!(
            TileMode::Street
                .config()
                .tile_url(&tile_id)
                .starts_with("https://tile.openstreetmap.org/")
        );
        assert!(
            TileMode::Satellite
                .config()
                .tile_url(&tile_id)
                .contains("World_Imagery")
        );
        assert!(
            TileMode::Terrain
                .config()
                .tile_url(&tile_id)
                .contains("World_Physical_Map")
        );
    }

    #[test]
    fn dashboard_config_defaults() {
        let config = DashboardConfig::default();
        assert_eq!(config.default_zoom, 12);
        assert_eq!(config.search_limit, 10);
        assert_eq!(config.search_marker_limit, 8);
        assert_eq!(config.address_popup_lifetime(), Duration::from_secs(5));
        assert!(config.home_location.is_none());
    }

    #[test]
    fn dashboard_config_partial_json() {
        let config: DashboardConfig = serde_json::from_str(
            r#"{ "tile_mode": "satellite", "home_location": { "lon": -73.56, "lat": 45.5 } }"#,
        )
        .unwrap();
        assert_eq!(config.tile_mode, TileMode::Satellite);
        assert_eq!(
            config.home_location,
            Some(GeoPos {
                lon: -73.56,
                lat: 45.5
            })
        );
        assert_eq!(config.pin_zoom, 16);
    }

    #[test]
    fn street_template_overrides_street_only() {
        let config = DashboardConfig {
            street_tile_template: Some("http://localhost:8080/{z}/{x}/{y}.png".to_string()),
            ..Default::default()
        };
        let tile_id = TileId { z: 7, x: 37, y: 46 };
        assert_eq!(
            config.tile_config(TileMode::Street).tile_url(&tile_id),
            "http://localhost:8080/7/37/46.png"
        );
        assert!(
            config
                .tile_config(TileMode::Satellite)
                .tile_url(&tile_id)
                .contains("World_Imagery")
        );
    }

    #[test]
    fn dyn_config_uses_closure() {
        let config = DynMapConfig::new(|tile| format!("tiles/{}-{}-{}", tile.z, tile.x, tile.y));
        assert_eq!(config.tile_url(&TileId { z: 1, x: 0, y: 1 }), "tiles/1-0-1");
        assert!(config.attribution().is_none());
    }
}
