//! Estado exibido pelo shell, alimentado pelas notificações do pipeline.
//!
//! O mesmo redutor serve o shell de terminal e o dashboard: atualiza as
//! linhas de temperatura e status e mantém um log de mudanças limitado.

use chrono::{DateTime, Local};
use monitor_core::types::Notification;
use std::collections::VecDeque;

/// Efeito de uma notificação aplicada.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applied {
    /// Linha acrescentada ao log de mudanças, se houve mudança visível.
    pub logged: Option<String>,
    /// O shell deve voltar o toggle para Simulated.
    pub force_simulate: bool,
}

/// Linhas de temperatura e status + log de mudanças.
#[derive(Debug, Clone)]
pub struct DisplayState {
    temperature: String,
    status: String,
    last_temp_key: Option<(i64, i64)>,
    change_log: VecDeque<String>,
    capacity: usize,
}

/// Texto da linha de temperatura.
pub fn format_temperature(temp_c: f64, temp_f: f64) -> String {
    format!("Temperature: {temp_c:.3} C / {temp_f:.3} F")
}

impl DisplayState {
    pub fn new(capacity: usize, initial_status: impl Into<String>) -> Self {
        Self {
            temperature: "Temperature: --".to_string(),
            status: initial_status.into(),
            last_temp_key: None,
            change_log: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    pub fn temperature(&self) -> &str {
        &self.temperature
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Entradas mais antigas primeiro.
    pub fn change_log(&self) -> impl Iterator<Item = &str> {
        self.change_log.iter().map(String::as_str)
    }

    pub fn apply_now(&mut self, notification: Notification) -> Applied {
        self.apply(notification, Local::now())
    }

    /// Aplica uma notificação. Repetições sem mudança visível não entram no log.
    pub fn apply(&mut self, notification: Notification, now: DateTime<Local>) -> Applied {
        match notification {
            Notification::Temp(temp_c, temp_f) => {
                // Compara no arredondamento exibido
                let key = ((temp_c * 1000.0).round() as i64, (temp_f * 1000.0).round() as i64);
                if self.last_temp_key == Some(key) {
                    return Applied::default();
                }
                self.last_temp_key = Some(key);
                let line = format_temperature(temp_c, temp_f);
                self.temperature = line.clone();
                Applied {
                    logged: Some(self.log(now, &line)),
                    force_simulate: false,
                }
            }
            Notification::Status(text) => {
                if text == self.status {
                    return Applied::default();
                }
                let line = format!("Status: {text}");
                self.status = text;
                Applied {
                    logged: Some(self.log(now, &line)),
                    force_simulate: false,
                }
            }
            Notification::ForceSimulate(text) => {
                let line = format!("Status: {text}");
                self.status = text;
                Applied {
                    logged: Some(self.log(now, &line)),
                    force_simulate: true,
                }
            }
        }
    }

    fn log(&mut self, now: DateTime<Local>, text: &str) -> String {
        let line = format!("[{}] {text}", now.format("%H:%M:%S"));
        if self.change_log.len() == self.capacity {
            self.change_log.pop_front();
        }
        self.change_log.push_back(line.clone());
        line
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, h, m, s).single().unwrap()
    }

    #[test]
    fn temperature_line_uses_three_decimals() {
        assert_eq!(format_temperature(21.5, 70.7), "Temperature: 21.500 C / 70.700 F");
    }

    #[test]
    fn temp_updates_and_logs_once_per_visible_change() {
        let mut state = DisplayState::new(10, "Stopped");

        let first = state.apply(Notification::Temp(21.5, 70.7), at(9, 0, 0));
        assert_eq!(
            first.logged.as_deref(),
            Some("[09:00:00] Temperature: 21.500 C / 70.700 F")
        );
        assert_eq!(state.temperature(), "Temperature: 21.500 C / 70.700 F");

        // Diferença abaixo da precisão exibida
        let same = state.apply(Notification::Temp(21.5000001, 70.70000018), at(9, 0, 1));
        assert_eq!(same, Applied::default());

        let next = state.apply(Notification::Temp(21.625, 70.925), at(9, 0, 2));
        assert!(next.logged.is_some());
        assert_eq!(state.change_log().count(), 2);
    }

    #[test]
    fn repeated_status_is_not_logged() {
        let mut state = DisplayState::new(10, "Stopped");
        assert!(state.apply(Notification::Status("Simulated mode active".into()), at(9, 0, 0)).logged.is_some());
        assert!(state.apply(Notification::Status("Simulated mode active".into()), at(9, 0, 1)).logged.is_none());
        assert_eq!(state.status(), "Simulated mode active");
        assert_eq!(
            state.change_log().collect::<Vec<_>>(),
            vec!["[09:00:00] Status: Simulated mode active"]
        );
    }

    #[test]
    fn force_simulate_sets_status_and_requests_resync() {
        let mut state = DisplayState::new(10, "Stopped");
        let applied = state.apply(
            Notification::ForceSimulate("Live mode is not supported on this host; switched to Simulated".into()),
            at(10, 30, 0),
        );
        assert!(applied.force_simulate);
        assert_eq!(state.status(), "Live mode is not supported on this host; switched to Simulated");
    }

    #[test]
    fn change_log_is_bounded() {
        let mut state = DisplayState::new(3, "Stopped");
        for i in 0..5 {
            state.apply(Notification::Status(format!("status {i}")), at(11, 0, i));
        }
        let log: Vec<&str> = state.change_log().collect();
        assert_eq!(
            log,
            vec![
                "[11:00:02] Status: status 2",
                "[11:00:03] Status: status 3",
                "[11:00:04] Status: status 4"
            ]
        );
    }
}
