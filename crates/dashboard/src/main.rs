//! # Event Monitor Dashboard
//!
//! Janela eframe/egui sobre o pipeline de amostragem: mostra a temperatura
//! atual, o status e o log de mudanças, e comanda Start/Stop e os toggles
//! Simulated / Publish.
//!
//! ## Atalhos
//! - `Q` / `Esc`: Sair

mod app;

use app::MonitorDashboard;
use monitor_core::config::AppConfig;
use monitor_pipeline::logging::init_logging;

fn main() -> eframe::Result<()> {
    // ── Config ──
    let config_path = AppConfig::default_path();
    let mut config = AppConfig::load(&config_path);

    if !config_path.exists() {
        let _ = config.save(&config_path);
    }

    // ── Logging ──
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Logging em arquivo desabilitado: {e}");
    }
    // Seções inválidas voltam ao padrão (os avisos saem no log)
    config.sanitize();

    // ── Janela eframe ──
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title("🌡 Temperature Event Monitor")
            .with_inner_size([640.0, 480.0])
            .with_min_inner_size([480.0, 360.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Temperature Event Monitor",
        options,
        Box::new(move |cc| Ok(Box::new(MonitorDashboard::new(cc, config)))),
    )
}
