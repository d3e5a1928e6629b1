//! App eframe/egui: drena as notificações e repassa os comandos ao Monitor.

use egui::{Color32, RichText};
use monitor_core::config::AppConfig;
use monitor_pipeline::{DisplayState, Monitor, NotificationReceiver};
use std::time::Duration;
use tracing::{error, info};

const TITLE: Color32 = Color32::from_rgb(0, 200, 255);
const RUNNING: Color32 = Color32::from_rgb(0, 255, 136);
const STOPPED: Color32 = Color32::from_rgb(255, 90, 90);
const DIM: Color32 = Color32::from_rgb(130, 130, 140);

/// Estado da janela.
pub struct MonitorDashboard {
    monitor: Monitor,
    notifications: NotificationReceiver,
    display: DisplayState,
    drain_interval: Duration,

    // Toggles espelhados em ModeFlags
    simulate: bool,
    publish: bool,
}

impl MonitorDashboard {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        let simulate = config.sampling.simulate_at_start;
        let publish = config.publisher.publish_at_start;
        let drain_interval = config.ui.drain_interval();
        let display = DisplayState::new(config.ui.change_log_capacity, "Stopped");

        let monitor = Monitor::new(config);
        let notifications = monitor.notifications();

        Self {
            monitor,
            notifications,
            display,
            drain_interval,
            simulate,
            publish,
        }
    }

    /// Aplica as notificações pendentes. `ForceSimulate` desmarca o Live.
    fn drain_notifications(&mut self) {
        for notification in self.notifications.drain() {
            let applied = self.display.apply_now(notification);
            if applied.force_simulate {
                self.simulate = true;
                self.monitor.flags().set_simulate(true);
            }
        }
    }

    fn render_controls(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.horizontal(|ui: &mut egui::Ui| {
            if ui.button("▶ Start").clicked() {
                if let Err(e) = self.monitor.start() {
                    error!("{e}");
                }
            }
            if ui.button("■ Stop").clicked() {
                self.monitor.stop();
            }

            ui.separator();

            if ui.checkbox(&mut self.simulate, "Simulated").changed() {
                self.monitor.flags().set_simulate(self.simulate);
                info!("Simulated: {}", self.simulate);
            }
            if ui.checkbox(&mut self.publish, "Publish").changed() {
                self.monitor.flags().set_publish_enabled(self.publish);
                info!("Publish: {}", self.publish);
            }

            ui.separator();

            if ui.button("Quit").clicked() {
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        });
    }
}

/// `Q` / `Esc` fecham a janela. O estado é lido dentro do lock de input e o
/// comando só é enviado depois de soltá-lo.
fn handle_shortcuts(ctx: &egui::Context) {
    let quit = ctx.input(|i: &egui::InputState| {
        i.key_pressed(egui::Key::Q) || i.key_pressed(egui::Key::Escape)
    });
    if quit {
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }
}

impl eframe::App for MonitorDashboard {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ── Poll pipeline ──
        self.drain_notifications();
        ctx.request_repaint_after(self.drain_interval);

        // ── Atalhos de teclado ──
        handle_shortcuts(ctx);

        egui::TopBottomPanel::top("controls").show(ctx, |ui: &mut egui::Ui| {
            ui.add_space(4.0);
            self.render_controls(ui, ctx);
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui: &mut egui::Ui| {
            ui.vertical_centered(|ui: &mut egui::Ui| {
                ui.label(
                    RichText::new(self.display.temperature())
                        .color(TITLE)
                        .size(22.0)
                        .strong()
                        .monospace(),
                );

                let color = if self.monitor.is_running() { RUNNING } else { STOPPED };
                ui.label(RichText::new(self.display.status()).color(color).monospace());
            });

            ui.add_space(8.0);
            ui.separator();
            ui.label(RichText::new("Change log").color(DIM).monospace().size(11.0));

            egui::ScrollArea::vertical()
                .stick_to_bottom(true)
                .auto_shrink([false, false])
                .show(ui, |ui: &mut egui::Ui| {
                    for line in self.display.change_log() {
                        ui.label(RichText::new(line).monospace().size(12.0));
                    }
                });
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        info!("Encerrando...");
        self.monitor.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_key(key: Option<egui::Key>) -> egui::FullOutput {
        let events = key
            .map(|key| egui::Event::Key {
                key,
                physical_key: None,
                pressed: true,
                repeat: false,
                modifiers: egui::Modifiers::NONE,
            })
            .into_iter()
            .collect();
        let input = egui::RawInput {
            events,
            ..Default::default()
        };
        egui::Context::default().run(input, |ctx: &egui::Context| handle_shortcuts(ctx))
    }

    fn closes(output: &egui::FullOutput) -> bool {
        output
            .viewport_output
            .values()
            .flat_map(|viewport| viewport.commands.iter())
            .any(|command| matches!(command, egui::ViewportCommand::Close))
    }

    #[test]
    fn quit_keys_close_the_window() {
        assert!(closes(&frame_with_key(Some(egui::Key::Q))));
        assert!(closes(&frame_with_key(Some(egui::Key::Escape))));
    }

    #[test]
    fn other_input_keeps_the_window_open() {
        assert!(!closes(&frame_with_key(None)));
        assert!(!closes(&frame_with_key(Some(egui::Key::S))));
    }
}
