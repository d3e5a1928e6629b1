//! Canal de notificações workers → shell.
//!
//! FIFO ilimitado: os workers nunca bloqueiam ao notificar. A ordem é
//! garantida apenas por produtor.

use crossbeam_channel::{Receiver, Sender, unbounded};
use monitor_core::types::Notification;
use tracing::debug;

/// Lado produtor, clonado para cada worker.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Sender<Notification>,
}

/// Lado consumidor, drenado pelo shell.
#[derive(Debug, Clone)]
pub struct NotificationReceiver {
    rx: Receiver<Notification>,
}

/// Cria o par produtor/consumidor.
pub fn channel() -> (Notifier, NotificationReceiver) {
    let (tx, rx) = unbounded();
    (Notifier { tx }, NotificationReceiver { rx })
}

impl Notifier {
    pub fn send(&self, notification: Notification) {
        // Só falha se o shell já foi embora; nada a fazer
        if let Err(e) = self.tx.send(notification) {
            debug!("Shell desconectado, descartando notificação {}", e.0.kind());
        }
    }

    pub fn temp(&self, temp_c: f64, temp_f: f64) {
        self.send(Notification::Temp(temp_c, temp_f));
    }

    pub fn status(&self, text: impl Into<String>) {
        self.send(Notification::Status(text.into()));
    }

    pub fn force_simulate(&self, text: impl Into<String>) {
        self.send(Notification::ForceSimulate(text.into()));
    }
}

impl NotificationReceiver {
    /// Retira tudo que está pendente, sem bloquear.
    pub fn drain(&self) -> Vec<Notification> {
        self.rx.try_iter().collect()
    }

    /// Channel subjacente, para `select!` ou `recv_timeout`.
    pub fn inner(&self) -> &Receiver<Notification> {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_producer_order() {
        let (notifier, receiver) = channel();
        notifier.status("Simulated mode active");
        notifier.temp(21.5, 70.7);
        notifier.force_simulate("switched");

        let drained = receiver.drain();
        assert_eq!(
            drained,
            vec![
                Notification::Status("Simulated mode active".into()),
                Notification::Temp(21.5, 70.7),
                Notification::ForceSimulate("switched".into()),
            ]
        );
        assert!(receiver.drain().is_empty());
    }

    #[test]
    fn send_after_shell_dropped_does_not_panic() {
        let (notifier, receiver) = channel();
        drop(receiver);
        notifier.status("ninguém ouvindo");
    }
}
