//! The dispatch dashboard: one state struct and the transitions the UI drives.
//!
//! Every user action maps to a method here. Network work (place search, reverse lookups and
//! geocoding of typed addresses) runs on background threads; [`Dashboard::poll`] picks up the
//! finished requests once per frame and applies them.

use chrono::Utc;
use log::{debug, error, warn};
use poll_promise::Promise;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use crate::Map;
use crate::config::{DashboardConfig, TileMode};
use crate::geocoding::{GeocodeError, GeocodeHit, Geocoder, NominatimClient, Place, ReverseHit};
use crate::layers::pins::{LocationPin, PinKind, PinLayer};
use crate::layers::search::{SearchLayer, SearchMarker};
use crate::layers::vehicles::VehicleLayer;
use crate::location::{FixedLocator, Locator};
use crate::projection::GeoPos;
use crate::vehicle::{Vehicle, generate_route};

pub(crate) const VEHICLE_LAYER: &str = "vehicles";
pub(crate) const SEARCH_LAYER: &str = "search";
pub(crate) const PIN_LAYER: &str = "pins";

/// Shown when a search returns nothing.
pub const NO_PLACES_NOTICE: &str = "No places found for your search. Please try a different query.";
/// Shown when a search request fails.
pub const SEARCH_FAILED_NOTICE: &str = "Search failed. Please try again.";
/// Shown when the locator fails.
pub const LOCATION_UNAVAILABLE_NOTICE: &str =
    "Unable to get your location. Please enable location services.";
/// Shown when no locator is configured.
pub const GEOLOCATION_UNSUPPORTED_NOTICE: &str = "Geolocation is not supported.";

/// Something the host application may want to react to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DashboardEvent {
    /// The dispatcher clicked a vehicle.
    VehicleSelected(String),
}

/// A marker popup that is currently open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkerPopup {
    /// Details of a vehicle.
    Vehicle(String),
    /// Details of a location pin.
    Pin(u64),
    /// Details of a search result.
    Search(String),
}

/// The "Add Location Pin" form.
#[derive(Clone, Debug, PartialEq)]
pub struct PinForm {
    /// Where the pin goes unless the address is geocoded elsewhere.
    pub position: GeoPos,

    /// What the pin marks.
    pub kind: PinKind,

    /// Address typed or prefilled.
    pub address: String,

    /// Free text description.
    pub description: String,

    suggested_address: String,
}

impl PinForm {
    fn new(position: GeoPos, suggested_address: Option<String>) -> Self {
        let suggested_address = suggested_address.unwrap_or_default();
        Self {
            position,
            kind: PinKind::default(),
            address: suggested_address.clone(),
            description: String::new(),
            suggested_address,
        }
    }

    /// The address the form was opened with.
    pub fn suggested_address(&self) -> &str {
        &self.suggested_address
    }

    /// Whether submitting needs to geocode the typed address.
    pub fn needs_geocoding(&self) -> bool {
        let typed = self.address.trim();
        !typed.is_empty() && typed != self.suggested_address.trim()
    }
}

/// The address shown after a plain click on the map.
#[derive(Clone, Debug, PartialEq)]
pub struct AddressPopup {
    /// The clicked position.
    pub position: GeoPos,

    /// What the geocoder found there.
    pub hit: ReverseHit,

    pub(crate) shown_at: Instant,
}

/// Why a reverse lookup was started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LookupPurpose {
    PlacePin,
    ShowAddress,
}

struct ReverseLookup {
    position: GeoPos,
    purpose: LookupPurpose,
    result: Result<Option<ReverseHit>, GeocodeError>,
}

/// Takes the value out of a finished promise, leaving `None` behind.
fn take_ready<T: Send + 'static>(slot: &mut Option<Promise<T>>) -> Option<T> {
    if slot.as_ref().is_some_and(|p| p.ready().is_some()) {
        slot.take().map(Promise::block_and_take)
    } else {
        None
    }
}

/// The dispatch dashboard.
pub struct Dashboard {
    /// Settings.
    pub config: DashboardConfig,

    pub(crate) map: Map,
    geocoder: Arc<dyn Geocoder>,
    locator: Option<Box<dyn Locator>>,

    pub(crate) tile_mode: TileMode,
    pub(crate) tracking: Option<String>,
    pub(crate) open_popup: Option<MarkerPopup>,

    pub(crate) search_query: String,
    pub(crate) search_results: Vec<Place>,
    pub(crate) show_search_results: bool,
    search: Option<Promise<Result<Vec<Place>, GeocodeError>>>,
    search_batch: u64,

    pub(crate) placing_pin: bool,
    reverse: Option<Promise<ReverseLookup>>,
    placing_lookup: bool,
    pub(crate) address_popup: Option<AddressPopup>,
    pub(crate) pin_form: Option<PinForm>,
    pin_geocode: Option<Promise<Result<Option<GeocodeHit>, GeocodeError>>>,

    pub(crate) minimized: bool,
    pub(crate) show_legend: bool,
    notices: VecDeque<String>,
    events: Vec<DashboardEvent>,
}

impl Dashboard {
    /// Creates a dashboard using Nominatim at `config.geocoder_url` and, when
    /// `config.home_location` is set, a fixed locator.
    pub fn new(config: DashboardConfig) -> Self {
        let geocoder = Arc::new(NominatimClient::new(config.geocoder_url.clone()));
        let locator = config
            .home_location
            .map(|pos| Box::new(FixedLocator(pos)) as Box<dyn Locator>);
        Self::with_services(config, geocoder, locator)
    }

    /// Creates a dashboard with explicit geocoding and location services.
    pub fn with_services(
        config: DashboardConfig,
        geocoder: Arc<dyn Geocoder>,
        locator: Option<Box<dyn Locator>>,
    ) -> Self {
        let mut map = Map::with_boxed_config(config.tile_config(config.tile_mode));
        map.focus(config.default_center, config.default_zoom);
        map.add_layer(VEHICLE_LAYER, VehicleLayer::default());
        map.add_layer(SEARCH_LAYER, SearchLayer::default());
        map.add_layer(PIN_LAYER, PinLayer::default());

        Self {
            tile_mode: config.tile_mode,
            config,
            map,
            geocoder,
            locator,
            tracking: None,
            open_popup: None,
            search_query: String::new(),
            search_results: Vec::new(),
            show_search_results: false,
            search: None,
            search_batch: 0,
            placing_pin: false,
            reverse: None,
            placing_lookup: false,
            address_popup: None,
            pin_form: None,
            pin_geocode: None,
            minimized: false,
            show_legend: true,
            notices: VecDeque::new(),
            events: Vec::new(),
        }
    }

    pub(crate) fn vehicle_layer(&self) -> Option<&VehicleLayer> {
        self.map.layer(VEHICLE_LAYER)
    }

    fn vehicle_layer_mut(&mut self) -> Option<&mut VehicleLayer> {
        self.map.layer_mut(VEHICLE_LAYER)
    }

    pub(crate) fn pin_layer(&self) -> Option<&PinLayer> {
        self.map.layer(PIN_LAYER)
    }

    fn pin_layer_mut(&mut self) -> Option<&mut PinLayer> {
        self.map.layer_mut(PIN_LAYER)
    }

    pub(crate) fn search_layer(&self) -> Option<&SearchLayer> {
        self.map.layer(SEARCH_LAYER)
    }

    fn search_layer_mut(&mut self) -> Option<&mut SearchLayer> {
        self.map.layer_mut(SEARCH_LAYER)
    }

    /// The map's current center.
    pub fn center(&self) -> GeoPos {
        self.map.center
    }

    /// The map's current zoom.
    pub fn zoom(&self) -> u8 {
        self.map.zoom
    }

    /// The vehicles on the map.
    pub fn vehicles(&self) -> &[Vehicle] {
        self.vehicle_layer()
            .map(VehicleLayer::vehicles)
            .unwrap_or_default()
    }

    /// The location pins.
    pub fn pins(&self) -> &[LocationPin] {
        self.pin_layer().map(PinLayer::pins).unwrap_or_default()
    }

    /// The search result markers.
    pub fn search_markers(&self) -> &[SearchMarker] {
        self.search_layer()
            .map(SearchLayer::markers)
            .unwrap_or_default()
    }

    /// The selected vehicle, if any.
    pub fn selected_vehicle(&self) -> Option<&Vehicle> {
        let layer = self.vehicle_layer()?;
        layer.vehicle(layer.selected.as_deref()?)
    }

    /// The id of the tracked vehicle, if any.
    pub fn tracking(&self) -> Option<&str> {
        self.tracking.as_deref()
    }

    /// Whether a place search is running.
    pub fn is_searching(&self) -> bool {
        self.search.is_some()
    }

    /// Whether a typed pin address is being geocoded.
    pub fn is_geocoding_pin(&self) -> bool {
        self.pin_geocode.is_some()
    }

    /// Whether a clicked position is being looked up.
    pub fn is_resolving_click(&self) -> bool {
        self.reverse.is_some()
    }

    /// Whether any background request is outstanding.
    pub fn has_pending_requests(&self) -> bool {
        self.is_searching() || self.is_geocoding_pin() || self.is_resolving_click()
    }

    /// The notice waiting for acknowledgement, if any.
    pub fn notice(&self) -> Option<&str> {
        self.notices.front().map(String::as_str)
    }

    /// Acknowledges the current notice.
    pub fn dismiss_notice(&mut self) {
        self.notices.pop_front();
    }

    fn push_notice(&mut self, notice: &str) {
        self.notices.push_back(notice.to_string());
    }

    /// Drains the events raised since the last call.
    pub fn take_events(&mut self) -> Vec<DashboardEvent> {
        std::mem::take(&mut self.events)
    }

    /// Replaces the vehicle list, following the tracked vehicle if there is one.
    pub fn set_vehicles(&mut self, vehicles: Vec<Vehicle>) {
        if let Some(layer) = self.vehicle_layer_mut() {
            layer.set_vehicles(vehicles);
        }
        self.follow_tracked();
    }

    fn follow_tracked(&mut self) {
        let position = self.tracking.as_deref().and_then(|id| {
            self.vehicle_layer()
                .and_then(|layer| layer.vehicle(id))
                .and_then(Vehicle::position)
        });
        if let Some(position) = position {
            self.map.center = position;
        }
    }

    /// Selects a vehicle, opens its popup and centers on it.
    pub fn select_vehicle(&mut self, id: &str) {
        let Some(layer) = self.vehicle_layer_mut() else {
            return;
        };
        let Some(position) = layer.vehicle(id).map(Vehicle::position) else {
            return;
        };
        layer.selected = Some(id.to_string());

        self.events
            .push(DashboardEvent::VehicleSelected(id.to_string()));
        self.open_popup = Some(MarkerPopup::Vehicle(id.to_string()));
        if let Some(position) = position {
            self.map.focus(position, self.config.focus_zoom);
        }
    }

    /// Shows or hides the demonstration route of a vehicle.
    pub fn toggle_route(&mut self, id: &str) {
        let Some(layer) = self.vehicle_layer_mut() else {
            return;
        };
        let Some(start) = layer.vehicle(id).and_then(Vehicle::position) else {
            return;
        };
        if !layer.remove_route(id) {
            layer.set_route(id, generate_route(start, &mut rand::rng()));
        }
    }

    /// Whether routes are drawn.
    pub fn routes_visible(&self) -> bool {
        self.vehicle_layer().is_some_and(|layer| layer.show_routes)
    }

    /// Shows or hides all routes.
    pub fn toggle_routes_visible(&mut self) {
        if let Some(layer) = self.vehicle_layer_mut() {
            layer.show_routes = !layer.show_routes;
        }
    }

    /// Starts or stops keeping the map centered on a vehicle.
    pub fn toggle_tracking(&mut self, id: &str) {
        if self.tracking.as_deref() == Some(id) {
            self.tracking = None;
        } else {
            self.tracking = Some(id.to_string());
            self.follow_tracked();
        }
    }

    /// The active base map.
    pub fn tile_mode(&self) -> TileMode {
        self.tile_mode
    }

    /// Switches the base map.
    pub fn set_tile_mode(&mut self, mode: TileMode) {
        if mode != self.tile_mode {
            debug!("Switching base map to {:?}", mode);
            self.map.set_config(self.config.tile_config(mode));
            self.tile_mode = mode;
        }
    }

    /// The text in the search box.
    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    /// Results of the last successful search.
    pub fn search_results(&self) -> &[Place] {
        &self.search_results
    }

    /// Whether the results dropdown is open.
    pub fn search_results_open(&self) -> bool {
        self.show_search_results && !self.search_results.is_empty()
    }

    /// Updates the search box. A blank query closes the dropdown.
    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
        if self.search_query.trim().is_empty() {
            self.show_search_results = false;
        }
    }

    /// Reopens the dropdown when the search box gains focus and there are results.
    pub fn focus_search(&mut self) {
        if !self.search_results.is_empty() {
            self.show_search_results = true;
        }
    }

    /// Closes the results dropdown.
    pub fn close_search_results(&mut self) {
        self.show_search_results = false;
    }

    /// Starts a place search for the current query. A blank query does nothing; a new search
    /// supersedes one still running.
    pub fn submit_search(&mut self) {
        let query = self.search_query.trim().to_string();
        if query.is_empty() {
            return;
        }
        self.show_search_results = false;

        let geocoder = Arc::clone(&self.geocoder);
        let limit = self.config.search_limit;
        self.search = Some(Promise::spawn_thread("place_search", move || {
            geocoder.search(&query, limit)
        }));
    }

    fn finish_search(&mut self, result: Result<Vec<Place>, GeocodeError>) {
        match result {
            Ok(places) if !places.is_empty() => {
                self.search_batch += 1;
                let batch = self.search_batch;
                let markers = places
                    .iter()
                    .take(self.config.search_marker_limit)
                    .enumerate()
                    .map(|(index, place)| SearchMarker::from_place(batch, index, place, index == 0))
                    .collect();
                if let Some(layer) = self.search_layer_mut() {
                    layer.replace(markers);
                }

                self.map.focus(places[0].position(), self.config.focus_zoom);
                self.search_results = places;
                self.show_search_results = true;
            }
            Ok(_) => self.push_notice(NO_PLACES_NOTICE),
            Err(e) => {
                error!("Place search failed: {:?}", e);
                self.push_notice(SEARCH_FAILED_NOTICE);
            }
        }
    }

    /// Picks one result from the dropdown: centers on it and rebuilds the markers around it.
    pub fn select_search_result(&mut self, index: usize) {
        let Some(selected) = self.search_results.get(index).cloned() else {
            return;
        };
        self.map.focus(selected.position(), self.config.focus_zoom);
        self.show_search_results = false;
        self.search_query = selected.display_name.clone();

        self.search_batch += 1;
        let batch = self.search_batch;
        let markers = self
            .search_results
            .iter()
            .take(self.config.selected_marker_limit)
            .enumerate()
            .map(|(i, place)| {
                let is_main = match (place.place_id, selected.place_id) {
                    (Some(a), Some(b)) => a == b,
                    _ => i == index,
                };
                SearchMarker::from_place(batch, i, place, is_main)
            })
            .collect();
        if let Some(layer) = self.search_layer_mut() {
            layer.replace(markers);
        }
    }

    /// Removes a single search marker.
    pub fn remove_search_marker(&mut self, id: &str) {
        if let Some(layer) = self.search_layer_mut() {
            layer.remove(id);
        }
        if self.open_popup == Some(MarkerPopup::Search(id.to_string())) {
            self.open_popup = None;
        }
    }

    /// Whether the next map click places a pin.
    pub fn is_placing_pin(&self) -> bool {
        self.placing_pin
    }

    /// Arms or disarms pin placement.
    pub fn toggle_pin_placement(&mut self) {
        self.placing_pin = !self.placing_pin;
    }

    /// Handles a plain click on the map. In placement mode the click opens the pin form once
    /// the address is known; otherwise the address is shown in a popup. Plain clicks are ignored
    /// while a pin placement lookup is still running.
    pub fn map_clicked(&mut self, position: GeoPos) {
        if self.placing_lookup && !self.placing_pin {
            debug!("Ignoring click at {:?} while a pin is being placed", position);
            return;
        }
        self.placing_lookup = self.placing_pin;

        let purpose = if self.placing_pin {
            self.placing_pin = false;
            LookupPurpose::PlacePin
        } else {
            LookupPurpose::ShowAddress
        };
        self.open_popup = None;

        let geocoder = Arc::clone(&self.geocoder);
        self.reverse = Some(Promise::spawn_thread("reverse_geocode", move || {
            ReverseLookup {
                position,
                purpose,
                result: geocoder.reverse(position),
            }
        }));
    }

    fn finish_reverse(&mut self, lookup: ReverseLookup, now: Instant) {
        let hit = match lookup.result {
            Ok(hit) => hit,
            Err(e) => {
                error!("Reverse geocoding failed: {:?}", e);
                None
            }
        };

        match lookup.purpose {
            LookupPurpose::PlacePin => {
                self.open_pin_form(lookup.position, hit.map(|h| h.display_name));
            }
            LookupPurpose::ShowAddress => {
                if let Some(hit) = hit {
                    self.address_popup = Some(AddressPopup {
                        position: lookup.position,
                        hit,
                        shown_at: now,
                    });
                }
            }
        }
    }

    /// Hides the clicked-address popup.
    pub fn close_address_popup(&mut self) {
        self.address_popup = None;
    }

    /// Opens the pin form at `position` with an optional prefilled address.
    pub fn open_pin_form(&mut self, position: GeoPos, address: Option<String>) {
        self.pin_form = Some(PinForm::new(position, address));
        self.pin_geocode = None;
        self.placing_pin = false;
    }

    /// Opens the pin form on the clicked-address popup, closing the popup.
    pub fn pin_address_popup(&mut self) {
        if let Some(popup) = self.address_popup.take() {
            self.open_pin_form(popup.position, Some(popup.hit.display_name));
        }
    }

    /// The pin form, if open.
    pub fn pin_form(&self) -> Option<&PinForm> {
        self.pin_form.as_ref()
    }

    /// The pin form, if open, for editing.
    pub fn pin_form_mut(&mut self) -> Option<&mut PinForm> {
        self.pin_form.as_mut()
    }

    /// Submits the pin form. A typed address that differs from the prefilled one is geocoded
    /// first; the pin is added once that finishes.
    pub fn submit_pin(&mut self) {
        let Some(form) = &self.pin_form else {
            return;
        };
        if self.pin_geocode.is_some() {
            return;
        }

        if form.needs_geocoding() {
            let address = form.address.trim().to_string();
            let geocoder = Arc::clone(&self.geocoder);
            let limit = self.config.geocode_limit;
            self.pin_geocode = Some(Promise::spawn_thread("pin_geocode", move || {
                geocoder.geocode(&address, limit)
            }));
        } else {
            self.commit_pin(None);
        }
    }

    fn commit_pin(&mut self, hit: Option<GeocodeHit>) {
        let Some(form) = self.pin_form.take() else {
            return;
        };
        let (position, address, geocoded) = match hit {
            Some(hit) => (hit.position, hit.display_name, true),
            None => (form.position, form.address.trim().to_string(), false),
        };

        let pin = LocationPin {
            id: 0,
            position,
            address,
            description: form.description.trim().to_string(),
            kind: form.kind,
            timestamp: Utc::now(),
            geocoded,
        };
        if let Some(layer) = self.pin_layer_mut() {
            let id = layer.add(pin);
            debug!("Added pin {} at {:?}", id, position);
        }
        self.map.focus(position, self.config.pin_zoom);
    }

    /// Closes the pin form without adding a pin.
    pub fn cancel_pin(&mut self) {
        self.pin_form = None;
        self.pin_geocode = None;
    }

    /// Removes a pin.
    pub fn remove_pin(&mut self, id: u64) {
        if let Some(layer) = self.pin_layer_mut() {
            layer.remove(id);
        }
        if self.open_popup == Some(MarkerPopup::Pin(id)) {
            self.open_popup = None;
        }
    }

    /// Centers the map on the dispatcher's own position.
    pub fn locate_me(&mut self) {
        let Some(locator) = &self.locator else {
            self.push_notice(GEOLOCATION_UNSUPPORTED_NOTICE);
            return;
        };
        match locator.current_position() {
            Ok(position) => self.map.focus(position, self.config.pin_zoom),
            Err(e) => {
                warn!("{}", e);
                self.push_notice(LOCATION_UNAVAILABLE_NOTICE);
            }
        }
    }

    /// Whether the map is collapsed into the summary view.
    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    /// Collapses or expands the map.
    pub fn toggle_minimized(&mut self) {
        self.minimized = !self.minimized;
    }

    /// Whether the legend is shown.
    pub fn legend_visible(&self) -> bool {
        self.show_legend
    }

    /// Shows or hides the legend.
    pub fn toggle_legend(&mut self) {
        self.show_legend = !self.show_legend;
    }

    /// The open marker popup, if any.
    pub fn open_popup(&self) -> Option<&MarkerPopup> {
        self.open_popup.as_ref()
    }

    /// Closes the open marker popup.
    pub fn close_popup(&mut self) {
        self.open_popup = None;
    }

    /// Routes the clicks recorded by the map and its layers during the last frame.
    pub fn collect_map_clicks(&mut self) {
        let vehicle = self
            .vehicle_layer_mut()
            .and_then(|layer| layer.last_clicked.take());
        let pin = self
            .pin_layer_mut()
            .and_then(|layer| layer.last_clicked.take());
        let search = self
            .search_layer_mut()
            .and_then(|layer| layer.last_clicked.take());

        if let Some(id) = vehicle {
            self.select_vehicle(&id);
        }
        if let Some(id) = pin {
            self.open_popup = Some(MarkerPopup::Pin(id));
        }
        if let Some(id) = search {
            self.open_popup = Some(MarkerPopup::Search(id));
        }
        if let Some(position) = self.map.take_click() {
            self.map_clicked(position);
        }
    }

    /// Applies finished background requests and expires the address popup.
    pub fn poll(&mut self, now: Instant) {
        if let Some(result) = take_ready(&mut self.search) {
            self.finish_search(result);
        }
        if let Some(lookup) = take_ready(&mut self.reverse) {
            self.placing_lookup = false;
            self.finish_reverse(lookup, now);
        }
        if let Some(result) = take_ready(&mut self.pin_geocode) {
            let hit = result.unwrap_or_else(|e| {
                error!("Geocoding failed: {:?}", e);
                None
            });
            self.commit_pin(hit);
        }

        let lifetime = self.config.address_popup_lifetime();
        if self
            .address_popup
            .as_ref()
            .is_some_and(|popup| now.saturating_duration_since(popup.shown_at) >= lifetime)
        {
            self.address_popup = None;
        }
    }

    /// GeoJSON `FeatureCollection` of the pins, search markers and routes.
    #[cfg(feature = "geojson")]
    pub fn overlays_geojson(&self) -> String {
        let routes: Vec<_> = self
            .vehicle_layer()
            .map(|layer| {
                layer
                    .routes()
                    .map(|(id, route)| (id.to_string(), route.to_vec()))
                    .collect()
            })
            .unwrap_or_default();
        let collection =
            crate::layers::geojson::overlays(self.pins(), self.search_markers(), &routes);
        geojson::GeoJson::from(collection).to_string()
    }

    /// Blocks until every outstanding request finished and applies them.
    #[cfg(test)]
    fn settle(&mut self, now: Instant) {
        while self.has_pending_requests() {
            if let Some(p) = &self.search {
                p.block_until_ready();
            }
            if let Some(p) = &self.reverse {
                p.block_until_ready();
            }
            if let Some(p) = &self.pin_geocode {
                p.block_until_ready();
            }
            self.poll(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoding::Address;
    use crate::location::LocateError;
    use crate::vehicle::{ReportedLocation, VehicleStatus};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Geocoder answering from canned data and recording the queries it saw.
    #[derive(Default)]
    struct StubGeocoder {
        places: Vec<Place>,
        reverse: Option<ReverseHit>,
        fail: bool,
        queries: Mutex<Vec<String>>,
    }

    impl Geocoder for StubGeocoder {
        fn search(&self, query: &str, limit: u32) -> Result<Vec<Place>, GeocodeError> {
            self.queries.lock().unwrap().push(query.to_string());
            if self.fail {
                return Err(GeocodeError::StatusError("503 Service Unavailable".to_string()));
            }
            Ok(self.places.iter().take(limit as usize).cloned().collect())
        }

        fn reverse(&self, _pos: GeoPos) -> Result<Option<ReverseHit>, GeocodeError> {
            if self.fail {
                return Err(GeocodeError::StatusError("503 Service Unavailable".to_string()));
            }
            Ok(self.reverse.clone())
        }
    }

    struct BrokenLocator;

    impl Locator for BrokenLocator {
        fn current_position(&self) -> Result<GeoPos, LocateError> {
            Err(LocateError::Unavailable("permission denied".to_string()))
        }
    }

    fn place(id: u64, lat: f64, lon: f64, name: &str) -> Place {
        Place {
            lat,
            lon,
            display_name: name.to_string(),
            place_id: Some(id),
            address: Some(Address {
                city: Some("Montréal".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn places(n: u64) -> Vec<Place> {
        (0..n)
            .map(|i| place(i + 1, 45.0 + i as f64 * 0.01, -74.0, &format!("Place {i}")))
            .collect()
    }

    fn dashboard(geocoder: StubGeocoder) -> (Dashboard, Arc<StubGeocoder>) {
        let geocoder = Arc::new(geocoder);
        let dashboard = Dashboard::with_services(
            DashboardConfig::default(),
            Arc::clone(&geocoder) as Arc<dyn Geocoder>,
            None,
        );
        (dashboard, geocoder)
    }

    fn vehicle(id: &str, location: &str) -> Vehicle {
        Vehicle {
            id: id.to_string(),
            vehicle_id: id.to_uppercase(),
            status: VehicleStatus::OnPatrol,
            current_location: ReportedLocation::Encoded(location.to_string()),
            ..Default::default()
        }
    }

    fn here() -> GeoPos {
        GeoPos {
            lon: -74.51,
            lat: 45.08,
        }
    }

    #[test]
    fn starts_at_configured_view() {
        let (dashboard, _) = dashboard(StubGeocoder::default());
        let config = DashboardConfig::default();
        assert_eq!(dashboard.center(), config.default_center);
        assert_eq!(dashboard.zoom(), config.default_zoom);
        assert!(dashboard.legend_visible());
        assert!(!dashboard.is_minimized());
        assert!(dashboard.pins().is_empty());
    }

    #[test]
    fn blank_search_does_nothing() {
        let (mut dashboard, geocoder) = dashboard(StubGeocoder {
            places: places(3),
            ..Default::default()
        });
        dashboard.set_search_query("   ");
        dashboard.submit_search();
        assert!(!dashboard.is_searching());
        assert!(geocoder.queries.lock().unwrap().is_empty());
    }

    #[test]
    fn search_centers_on_first_result_and_marks_eight() {
        let (mut dashboard, geocoder) = dashboard(StubGeocoder {
            places: places(10),
            ..Default::default()
        });
        dashboard.set_search_query("  montreal ");
        dashboard.submit_search();
        assert!(dashboard.is_searching());
        dashboard.settle(Instant::now());

        assert!(!dashboard.is_searching());
        assert_eq!(geocoder.queries.lock().unwrap().as_slice(), ["montreal"]);
        assert_eq!(dashboard.search_results().len(), 10);
        assert!(dashboard.search_results_open());
        assert_eq!(dashboard.zoom(), 15);
        assert_eq!(dashboard.center(), dashboard.search_results()[0].position());

        let markers = dashboard.search_markers();
        assert_eq!(markers.len(), 8);
        assert!(markers[0].is_main);
        assert!(markers[1..].iter().all(|m| !m.is_main));
    }

    #[test]
    fn empty_search_raises_notice_and_keeps_markers() {
        let (mut dashboard, _) = dashboard(StubGeocoder::default());
        dashboard.set_search_query("atlantis");
        dashboard.submit_search();
        dashboard.settle(Instant::now());

        assert_eq!(dashboard.notice(), Some(NO_PLACES_NOTICE));
        assert!(dashboard.search_markers().is_empty());
        dashboard.dismiss_notice();
        assert!(dashboard.notice().is_none());
    }

    #[test]
    fn failed_search_raises_notice() {
        let (mut dashboard, _) = dashboard(StubGeocoder {
            fail: true,
            ..Default::default()
        });
        dashboard.set_search_query("montreal");
        dashboard.submit_search();
        dashboard.settle(Instant::now());
        assert_eq!(dashboard.notice(), Some(SEARCH_FAILED_NOTICE));
        assert!(!dashboard.is_searching());
    }

    #[test]
    fn selecting_a_result_rebuilds_five_markers() {
        let (mut dashboard, _) = dashboard(StubGeocoder {
            places: places(10),
            ..Default::default()
        });
        dashboard.set_search_query("place");
        dashboard.submit_search();
        dashboard.settle(Instant::now());

        dashboard.select_search_result(2);
        let selected = dashboard.search_results()[2].clone();
        assert_eq!(dashboard.search_query(), selected.display_name);
        assert_eq!(dashboard.center(), selected.position());
        assert!(!dashboard.search_results_open());

        let markers = dashboard.search_markers();
        assert_eq!(markers.len(), 5);
        let main: Vec<_> = markers.iter().filter(|m| m.is_main).collect();
        assert_eq!(main.len(), 1);
        assert_eq!(main[0].title, selected.display_name);

        // Out of range selections are ignored.
        dashboard.select_search_result(99);
        assert_eq!(dashboard.search_markers().len(), 5);
    }

    #[test]
    fn dropdown_follows_query_and_focus() {
        let (mut dashboard, _) = dashboard(StubGeocoder {
            places: places(2),
            ..Default::default()
        });
        dashboard.set_search_query("place");
        dashboard.submit_search();
        dashboard.settle(Instant::now());
        assert!(dashboard.search_results_open());

        dashboard.set_search_query("");
        assert!(!dashboard.search_results_open());
        dashboard.focus_search();
        assert!(dashboard.search_results_open());
    }

    #[test]
    fn removing_a_search_marker() {
        let (mut dashboard, _) = dashboard(StubGeocoder {
            places: places(3),
            ..Default::default()
        });
        dashboard.set_search_query("place");
        dashboard.submit_search();
        dashboard.settle(Instant::now());

        let id = dashboard.search_markers()[1].id.clone();
        dashboard.remove_search_marker(&id);
        assert_eq!(dashboard.search_markers().len(), 2);
        assert!(dashboard.search_markers().iter().all(|m| m.id != id));
    }

    #[test]
    fn selecting_a_vehicle_centers_and_emits_event() {
        let (mut dashboard, _) = dashboard(StubGeocoder::default());
        dashboard.set_vehicles(vec![vehicle("a", "[45.1, -74.4]"), vehicle("b", "garbage")]);

        dashboard.select_vehicle("a");
        assert_eq!(dashboard.zoom(), 15);
        assert_eq!(
            dashboard.center(),
            GeoPos {
                lon: -74.4,
                lat: 45.1
            }
        );
        assert_eq!(dashboard.selected_vehicle().map(|v| v.id.as_str()), Some("a"));
        assert_eq!(
            dashboard.take_events(),
            [DashboardEvent::VehicleSelected("a".to_string())]
        );
        assert!(dashboard.take_events().is_empty());

        // A vehicle without a valid location is selected but the view stays put.
        let center = dashboard.center();
        dashboard.select_vehicle("b");
        assert_eq!(dashboard.center(), center);
        assert_eq!(dashboard.open_popup(), Some(&MarkerPopup::Vehicle("b".to_string())));

        // Unknown vehicles are ignored.
        dashboard.select_vehicle("zzz");
        assert!(dashboard.take_events().len() == 1);
    }

    #[test]
    fn toggling_routes() {
        let (mut dashboard, _) = dashboard(StubGeocoder::default());
        dashboard.set_vehicles(vec![vehicle("a", "[45.1, -74.4]"), vehicle("b", "[]")]);

        dashboard.toggle_route("a");
        let route = dashboard.vehicle_layer().unwrap().route("a").unwrap();
        assert_eq!(route.len(), 11);
        assert_eq!(
            route[0],
            GeoPos {
                lon: -74.4,
                lat: 45.1
            }
        );

        dashboard.toggle_route("a");
        assert!(dashboard.vehicle_layer().unwrap().route("a").is_none());

        // Missing vehicles and invalid locations are no-ops.
        dashboard.toggle_route("b");
        dashboard.toggle_route("nobody");
        assert_eq!(dashboard.vehicle_layer().unwrap().routes().count(), 0);

        assert!(!dashboard.routes_visible());
        dashboard.toggle_routes_visible();
        assert!(dashboard.routes_visible());
    }

    #[test]
    fn tracking_follows_vehicle_updates() {
        let (mut dashboard, _) = dashboard(StubGeocoder::default());
        dashboard.set_vehicles(vec![vehicle("a", "[45.1, -74.4]")]);
        let zoom = dashboard.zoom();

        dashboard.toggle_tracking("a");
        assert_eq!(dashboard.tracking(), Some("a"));
        assert_eq!(dashboard.center().lat, 45.1);

        dashboard.set_vehicles(vec![vehicle("a", "[45.2, -74.3]")]);
        assert_eq!(
            dashboard.center(),
            GeoPos {
                lon: -74.3,
                lat: 45.2
            }
        );
        assert_eq!(dashboard.zoom(), zoom);

        dashboard.toggle_tracking("a");
        assert!(dashboard.tracking().is_none());
        dashboard.set_vehicles(vec![vehicle("a", "[45.3, -74.2]")]);
        assert_eq!(dashboard.center().lat, 45.2);
    }

    #[test]
    fn placing_a_pin_prefills_address() {
        let (mut dashboard, _) = dashboard(StubGeocoder {
            reverse: Some(ReverseHit {
                display_name: "12 Rue Principale".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        });
        dashboard.toggle_pin_placement();
        assert!(dashboard.is_placing_pin());

        dashboard.map_clicked(here());
        assert!(!dashboard.is_placing_pin());
        dashboard.settle(Instant::now());

        let form = dashboard.pin_form().unwrap();
        assert_eq!(form.position, here());
        assert_eq!(form.address, "12 Rue Principale");
        assert_eq!(form.kind, PinKind::Incident);
        assert!(dashboard.address_popup.is_none());
    }

    #[test]
    fn second_click_does_not_cancel_pin_placement() {
        let (mut dashboard, _) = dashboard(StubGeocoder {
            reverse: Some(ReverseHit {
                display_name: "12 Rue Principale".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        });
        let elsewhere = GeoPos {
            lon: -74.0,
            lat: 45.0,
        };
        dashboard.toggle_pin_placement();
        dashboard.map_clicked(here());
        dashboard.map_clicked(elsewhere);
        dashboard.settle(Instant::now());

        assert_eq!(dashboard.pin_form().map(|f| f.position), Some(here()));
        assert!(dashboard.address_popup.is_none());

        // Once the form is open, plain clicks show addresses again.
        dashboard.map_clicked(elsewhere);
        dashboard.settle(Instant::now());
        assert_eq!(
            dashboard.address_popup.as_ref().map(|p| p.position),
            Some(elsewhere)
        );
    }

    #[test]
    fn search_skips_places_with_invalid_coordinates() {
        let places = crate::geocoding::parse_search(
            r#"[{ "lat": "NaN", "lon": "inf", "display_name": "nowhere" }]"#,
        )
        .unwrap();
        let (mut dashboard, _) = dashboard(StubGeocoder {
            places,
            ..Default::default()
        });
        let center = dashboard.center();
        dashboard.set_search_query("nowhere");
        dashboard.submit_search();
        dashboard.settle(Instant::now());

        assert_eq!(dashboard.center(), center);
        assert!(dashboard.search_markers().is_empty());
        assert_eq!(dashboard.notice(), Some(NO_PLACES_NOTICE));
    }

    #[test]
    fn placing_a_pin_without_address_still_opens_form() {
        let (mut dashboard, _) = dashboard(StubGeocoder {
            fail: true,
            ..Default::default()
        });
        dashboard.toggle_pin_placement();
        dashboard.map_clicked(here());
        dashboard.settle(Instant::now());
        let form = dashboard.pin_form().unwrap();
        assert!(form.address.is_empty());
        assert!(dashboard.notice().is_none());
    }

    #[test]
    fn submitting_prefilled_pin_adds_it_and_clears_form() {
        let (mut dashboard, geocoder) = dashboard(StubGeocoder::default());
        dashboard.open_pin_form(here(), Some("12 Rue Principale".to_string()));
        {
            let form = dashboard.pin_form_mut().unwrap();
            form.kind = PinKind::Checkpoint;
            form.description = " roadblock ".to_string();
        }
        dashboard.submit_pin();
        assert!(!dashboard.is_geocoding_pin());

        assert!(dashboard.pin_form().is_none());
        let pin = &dashboard.pins()[0];
        assert_eq!(pin.position, here());
        assert_eq!(pin.address, "12 Rue Principale");
        assert_eq!(pin.description, "roadblock");
        assert_eq!(pin.kind, PinKind::Checkpoint);
        assert!(!pin.geocoded);
        assert_eq!(dashboard.center(), here());
        assert_eq!(dashboard.zoom(), 16);
        assert!(geocoder.queries.lock().unwrap().is_empty());
    }

    #[test]
    fn typed_address_is_geocoded() {
        let target = place(42, 45.5, -73.56, "1 Rue Sainte-Catherine, Montréal");
        let (mut dashboard, geocoder) = dashboard(StubGeocoder {
            places: vec![target.clone()],
            ..Default::default()
        });
        dashboard.open_pin_form(here(), Some("12 Rue Principale".to_string()));
        dashboard.pin_form_mut().unwrap().address = "1 rue sainte-catherine".to_string();

        dashboard.submit_pin();
        assert!(dashboard.is_geocoding_pin());
        // A second submit while geocoding is ignored.
        dashboard.submit_pin();
        dashboard.settle(Instant::now());

        assert_eq!(geocoder.queries.lock().unwrap().len(), 1);
        let pin = &dashboard.pins()[0];
        assert_eq!(pin.position, target.position());
        assert_eq!(pin.address, target.display_name);
        assert!(pin.geocoded);
        assert!(dashboard.pin_form().is_none());
    }

    #[test]
    fn unresolved_address_keeps_clicked_position() {
        let (mut dashboard, _) = dashboard(StubGeocoder::default());
        dashboard.open_pin_form(here(), None);
        dashboard.pin_form_mut().unwrap().address = "somewhere unknown".to_string();
        dashboard.submit_pin();
        dashboard.settle(Instant::now());

        let pin = &dashboard.pins()[0];
        assert_eq!(pin.position, here());
        assert_eq!(pin.address, "somewhere unknown");
        assert!(!pin.geocoded);
    }

    #[test]
    fn cancel_discards_form() {
        let (mut dashboard, _) = dashboard(StubGeocoder::default());
        dashboard.open_pin_form(here(), None);
        dashboard.cancel_pin();
        assert!(dashboard.pin_form().is_none());
        dashboard.submit_pin();
        assert!(dashboard.pins().is_empty());
    }

    #[test]
    fn removing_a_pin_closes_its_popup() {
        let (mut dashboard, _) = dashboard(StubGeocoder::default());
        dashboard.open_pin_form(here(), None);
        dashboard.submit_pin();
        let id = dashboard.pins()[0].id;
        dashboard.open_popup = Some(MarkerPopup::Pin(id));

        dashboard.remove_pin(id);
        assert!(dashboard.pins().is_empty());
        assert!(dashboard.open_popup().is_none());
    }

    #[test]
    fn address_popup_expires() {
        let (mut dashboard, _) = dashboard(StubGeocoder {
            reverse: Some(ReverseHit {
                display_name: "12 Rue Principale".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        });
        let start = Instant::now();
        dashboard.map_clicked(here());
        dashboard.settle(start);

        let popup = dashboard.address_popup.as_ref().unwrap();
        assert_eq!(popup.position, here());
        assert!(dashboard.pin_form().is_none());

        dashboard.poll(start + Duration::from_secs(4));
        assert!(dashboard.address_popup.is_some());
        dashboard.poll(start + Duration::from_secs(5));
        assert!(dashboard.address_popup.is_none());
    }

    #[test]
    fn address_popup_can_become_a_pin() {
        let (mut dashboard, _) = dashboard(StubGeocoder {
            reverse: Some(ReverseHit {
                display_name: "12 Rue Principale".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        });
        dashboard.map_clicked(here());
        dashboard.settle(Instant::now());

        dashboard.pin_address_popup();
        assert!(dashboard.address_popup.is_none());
        assert_eq!(dashboard.pin_form().unwrap().address, "12 Rue Principale");
    }

    #[test]
    fn click_without_address_shows_nothing() {
        let (mut dashboard, _) = dashboard(StubGeocoder::default());
        dashboard.map_clicked(here());
        dashboard.settle(Instant::now());
        assert!(dashboard.address_popup.is_none());
        assert!(dashboard.notice().is_none());
    }

    #[test]
    fn locate_me_without_locator() {
        let (mut dashboard, _) = dashboard(StubGeocoder::default());
        dashboard.locate_me();
        assert_eq!(dashboard.notice(), Some(GEOLOCATION_UNSUPPORTED_NOTICE));
    }

    #[test]
    fn locate_me_with_locators() {
        let mut dashboard = Dashboard::with_services(
            DashboardConfig::default(),
            Arc::new(StubGeocoder::default()),
            Some(Box::new(FixedLocator(here()))),
        );
        dashboard.locate_me();
        assert_eq!(dashboard.center(), here());
        assert_eq!(dashboard.zoom(), 16);

        let mut dashboard = Dashboard::with_services(
            DashboardConfig::default(),
            Arc::new(StubGeocoder::default()),
            Some(Box::new(BrokenLocator)),
        );
        dashboard.locate_me();
        assert_eq!(dashboard.notice(), Some(LOCATION_UNAVAILABLE_NOTICE));
    }

    #[test]
    fn tile_mode_switch() {
        let (mut dashboard, _) = dashboard(StubGeocoder::default());
        assert_eq!(dashboard.tile_mode(), TileMode::Street);
        dashboard.set_tile_mode(TileMode::Satellite);
        assert_eq!(dashboard.tile_mode(), TileMode::Satellite);
    }

    #[test]
    fn chrome_toggles() {
        let (mut dashboard, _) = dashboard(StubGeocoder::default());
        dashboard.toggle_minimized();
        assert!(dashboard.is_minimized());
        dashboard.toggle_legend();
        assert!(!dashboard.legend_visible());
    }

    #[test]
    fn layer_clicks_open_popups() {
        let (mut dashboard, _) = dashboard(StubGeocoder::default());
        dashboard.set_vehicles(vec![vehicle("a", "[45.1, -74.4]")]);
        dashboard.vehicle_layer_mut().unwrap().last_clicked = Some("a".to_string());
        dashboard.collect_map_clicks();
        assert_eq!(dashboard.open_popup(), Some(&MarkerPopup::Vehicle("a".to_string())));
        assert_eq!(dashboard.take_events().len(), 1);
        assert!(!dashboard.is_resolving_click());
    }
}
