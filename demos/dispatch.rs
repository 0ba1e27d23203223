#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release
#![allow(rustdoc::missing_crate_level_docs)] // it's an example

use dispatch_map::{
    config::DashboardConfig,
    dashboard::{Dashboard, DashboardEvent},
    vehicle::Vehicle,
};
use eframe::egui;
use eyre::{Context, Result};
use log::{error, info};

const SAMPLE_VEHICLES: &str = r#"[
    {
        "id": "v-101", "vehicleId": "UNIT-101", "vehicleType": "patrol", "status": "on_patrol",
        "currentLocation": "[45.0792, -74.5058]",
        "make": "Ford", "model": "Interceptor", "year": 2022, "licensePlate": "POL 101",
        "assignedOfficerId": "B-4471", "lastUpdate": "2024-05-01T12:00:00Z"
    },
    {
        "id": "v-102", "vehicleId": "UNIT-102", "vehicleType": "k9", "status": "responding",
        "currentLocation": [45.0921, -74.4883],
        "make": "Chevrolet", "model": "Tahoe", "year": 2021
    },
    {
        "id": "v-103", "vehicleId": "MOTO-7", "vehicleType": "motorcycle", "status": "available",
        "currentLocation": "[45.0655, -74.5312]"
    },
    {
        "id": "v-104", "vehicleId": "VAN-1", "vehicleType": "special", "status": "out_of_service",
        "currentLocation": "[45.0710, -74.4950]", "make": "Ford", "model": "Transit"
    },
    {
        "id": "v-105", "vehicleId": "UNIT-105", "status": "on_patrol",
        "currentLocation": "not reported"
    }
]"#;

fn load_config(path: Option<String>) -> Result<DashboardConfig> {
    let Some(path) = path else {
        return Ok(DashboardConfig::default());
    };
    let text =
        std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path))
}

fn main() -> eframe::Result {
    env_logger::init();

    let config = load_config(std::env::args().nth(1)).unwrap_or_else(|e| {
        error!("{:?}", e);
        DashboardConfig::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1200.0, 800.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Dispatch map",
        options,
        Box::new(|_cc| Ok(Box::new(MyApp::new(config)))),
    )
}

struct MyApp {
    dashboard: Dashboard,
}

impl MyApp {
    fn new(config: DashboardConfig) -> Self {
        let mut dashboard = Dashboard::new(config);
        match serde_json::from_str::<Vec<Vehicle>>(SAMPLE_VEHICLES) {
            Ok(vehicles) => dashboard.set_vehicles(vehicles),
            Err(e) => error!("Invalid sample vehicles: {}", e),
        }
        Self { dashboard }
    }

    #[cfg(feature = "geojson")]
    fn save_geojson(&self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("GeoJSON", &["geojson", "json"])
            .save_file()
        {
            match std::fs::write(&path, self.dashboard.overlays_geojson()) {
                Ok(()) => info!("Saved overlays to {}", path.display()),
                Err(e) => error!("Failed to save {}: {}", path.display(), e),
            }
        }
    }
}

impl eframe::App for MyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        #[cfg(feature = "geojson")]
        egui::TopBottomPanel::bottom("export").show(ctx, |ui| {
            if ui.button("Export overlays as GeoJSON").clicked() {
                self.save_geojson();
            }
        });

        self.dashboard.show(ctx);

        for event in self.dashboard.take_events() {
            match event {
                DashboardEvent::VehicleSelected(id) => info!("Vehicle {} selected", id),
            }
        }
    }
}
