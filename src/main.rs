//! Notex - desktop notes and canvases kept as plain JSON files in a folder tree

use eframe::egui;
use notex::app::NotexApp;
use notex::core::config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> eframe::Result<()> {
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {e:#}");
        AppConfig::default()
    });

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(config.level_filter())
        .init();

    tracing::info!("Starting Notex...");

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("Notex"),
        ..Default::default()
    };

    eframe::run_native(
        "Notex",
        native_options,
        Box::new(|cc| Ok(Box::new(NotexApp::new(cc, config)?))),
    )
}
