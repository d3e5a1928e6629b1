//! Laço de entrega.
//!
//! Consome a fila de eventos e dá a cada um exatamente um destino: publicado
//! ou gravado no spool. Ao parar, drena o que ainda estiver na fila.
//!
//! Status de estado (mensageria indisponível, publish desligado/religado)
//! são emitidos na borda, uma vez por transição.
//!
//! Durante a drenagem, a primeira falha de publicação manda o resto da fila
//! direto para o spool: o encerramento não espera um timeout por evento.

use crate::control::{ModeFlags, StopListener};
use crate::notify::Notifier;
use crate::publisher::{PublisherCapability, RemoteId};
use crate::spool::SpoolWriter;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use monitor_core::types::Event;
use std::time::Duration;
use tracing::{error, info, warn};

pub const STATUS_MESSAGING_UNAVAILABLE: &str = "Pub/Sub unavailable: spooling enabled";
pub const STATUS_PUBLISH_DISABLED: &str = "Publish disabled: events will be spooled";
pub const STATUS_PUBLISH_ENABLED: &str = "Publish enabled";
pub const STATUS_PUBLISH_FAILED: &str = "Publish failed: event spooled";
pub const STATUS_SPOOL_FAILED: &str = "Spool write failed: event lost";

/// Texto de status para um evento publicado.
pub fn published_status(sequence: u64) -> String {
    format!("Published event #{sequence}")
}

/// Destino final de um evento.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered(RemoteId),
    Spooled,
    /// Publicação e spool falharam (falha dupla, reportada à parte).
    Lost,
}

/// Estado do consumidor da fila de entrega.
pub struct DeliveryLoop {
    rx: Receiver<Event>,
    publisher: PublisherCapability,
    spool: SpoolWriter,
    flags: ModeFlags,
    notifier: Notifier,
    poll_interval: Duration,

    unavailable_reported: bool,
    last_publish_enabled: Option<bool>,
    draining: bool,
    spool_only: bool,
}

impl DeliveryLoop {
    pub fn new(
        rx: Receiver<Event>,
        publisher: PublisherCapability,
        spool: SpoolWriter,
        flags: ModeFlags,
        notifier: Notifier,
        poll_interval: Duration,
    ) -> Self {
        Self {
            rx,
            publisher,
            spool,
            flags,
            notifier,
            poll_interval,
            unavailable_reported: false,
            last_publish_enabled: None,
            draining: false,
            spool_only: false,
        }
    }

    /// Roda até a parada e a fila vazia.
    pub fn run(mut self, stop: StopListener) {
        info!("Laço de entrega iniciado ({:?})", self.publisher);
        let mut handled = 0u64;

        loop {
            if stop.is_stopped() {
                if self.rx.is_empty() {
                    break;
                }
                self.draining = true;
            }
            match self.rx.recv_timeout(self.poll_interval) {
                Ok(event) => {
                    self.deliver(event);
                    handled += 1;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        info!("Laço de entrega encerrado ({handled} eventos processados)");
    }

    /// Entrega um evento e devolve o destino.
    pub fn deliver(&mut self, event: Event) -> DeliveryOutcome {
        let publisher = match &mut self.publisher {
            PublisherCapability::Unavailable(_) => {
                if !self.unavailable_reported {
                    self.notifier.status(STATUS_MESSAGING_UNAVAILABLE);
                    self.unavailable_reported = true;
                }
                return self.spool_event(&event, "mensageria indisponível");
            }
            PublisherCapability::Ready(publisher) => publisher,
        };

        let enabled = self.flags.publish_enabled();
        let previous = self.last_publish_enabled.replace(enabled);

        if !enabled {
            if previous != Some(false) {
                self.notifier.status(STATUS_PUBLISH_DISABLED);
            }
            return self.spool_event(&event, "publish desabilitado");
        }
        if previous == Some(false) {
            self.notifier.status(STATUS_PUBLISH_ENABLED);
        }
        if self.spool_only {
            return self.spool_event(&event, "drenagem após falha");
        }

        match publisher.publish(&event) {
            Ok(remote_id) => {
                self.notifier.status(published_status(event.sequence));
                info!(
                    "Publicado pubsub_id={remote_id} message_id={} sequence={}",
                    event.message_id, event.sequence
                );
                DeliveryOutcome::Delivered(remote_id)
            }
            Err(e) => {
                error!(
                    "Falha ao publicar message_id={} sequence={}: {e}",
                    event.message_id, event.sequence
                );
                if self.draining && !self.spool_only {
                    warn!("Falha durante a drenagem: restante da fila vai para o spool");
                    self.spool_only = true;
                }
                let outcome = self.spool_event(&event, "falha de publicação");
                if outcome == DeliveryOutcome::Spooled {
                    self.notifier.status(STATUS_PUBLISH_FAILED);
                }
                outcome
            }
        }
    }

    fn spool_event(&self, event: &Event, reason: &str) -> DeliveryOutcome {
        match self.spool.spool(event) {
            Ok(()) => {
                info!(
                    "Spool ({reason}) message_id={} sequence={}",
                    event.message_id, event.sequence
                );
                DeliveryOutcome::Spooled
            }
            Err(e) => {
                error!(
                    "Evento perdido ({reason}) message_id={} sequence={}: {e}",
                    event.message_id, event.sequence
                );
                self.notifier.status(STATUS_SPOOL_FAILED);
                DeliveryOutcome::Lost
            }
        }
    }
}
