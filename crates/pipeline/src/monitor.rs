//! Controlador do pipeline: o que o shell chama.
//!
//! - `start()` garante o laço de entrega e inicia o de amostragem
//!   (no-op se já estiver rodando).
//! - `stop()` para só a amostragem; a entrega continua viva.
//! - `shutdown()` para os dois, drenando a fila de entrega. A amostragem é
//!   aguardada até `delivery.join_timeout_ms`; a entrega ganha ainda o
//!   timeout de uma publicação em andamento.
//!
//! Seções inválidas da configuração voltam ao padrão antes de chegar aos
//! workers (ver `AppConfig::sanitize`).

use crate::control::{ModeFlags, StopListener, StopSignal};
use crate::delivery::DeliveryLoop;
use crate::notify::{self, NotificationReceiver, Notifier};
use crate::publisher::PublisherCapability;
use crate::sampling::{SamplingLoop, SequenceCounter};
use crate::sensor::{LiveSensor, SensorReader, SimulatedSensor};
use crate::spool::SpoolWriter;
use chrono::Local;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use monitor_core::config::AppConfig;
use monitor_core::types::Event;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, warn};

/// Falhas do controlador.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Falha ao criar thread {name}: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },

    #[error("Monitor já foi encerrado")]
    ShutDown,
}

/// Thread de worker com parada cooperativa e join com timeout.
struct Worker {
    name: &'static str,
    stop: StopSignal,
    done: Receiver<()>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn spawn<F>(name: &'static str, body: F) -> Result<Self, MonitorError>
    where
        F: FnOnce(StopListener) + Send + 'static,
    {
        let stop = StopSignal::new();
        let listener = stop.listener();
        // O sender cai junto com a thread (inclusive em panic)
        let (done_tx, done) = bounded::<()>(0);

        let handle = std::thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                let _done = done_tx;
                body(listener);
            })
            .map_err(|source| MonitorError::Spawn { name, source })?;

        Ok(Self {
            name,
            stop,
            done,
            handle,
        })
    }

    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Sinaliza a parada e espera até `timeout`. `true` se a thread terminou.
    fn stop_and_join(mut self, timeout: Duration) -> bool {
        self.stop.stop();
        match self.done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    error!("Thread {} terminou com panic", self.name);
                }
                true
            }
            _ => {
                warn!(
                    "Thread {} não terminou em {:?}; seguindo sem aguardar",
                    self.name, timeout
                );
                false
            }
        }
    }
}

/// Pipeline completo: amostragem → fila → entrega.
pub struct Monitor {
    config: AppConfig,
    flags: ModeFlags,
    notifier: Notifier,
    notifications: NotificationReceiver,
    reader: Arc<Mutex<SensorReader>>,
    sequence: SequenceCounter,
    delivery_tx: Sender<Event>,
    delivery_rx: Receiver<Event>,
    publisher: Option<PublisherCapability>,

    sampler: Option<Worker>,
    delivery: Option<Worker>,
    shut_down: bool,
}

impl Monitor {
    /// Monta o pipeline a partir da configuração e negocia o Pub/Sub.
    pub fn new(mut config: AppConfig) -> Self {
        config.sanitize();
        let reader = SensorReader::new(
            LiveSensor::new(config.sensor.clone()),
            SimulatedSensor::new(&config.sampling, StdRng::from_entropy()),
        );
        let publisher = PublisherCapability::negotiate(&config.publisher);
        Self::with_parts(config, reader, publisher)
    }

    /// Monta o pipeline com leitor e publisher já construídos.
    pub fn with_parts(mut config: AppConfig, reader: SensorReader, publisher: PublisherCapability) -> Self {
        config.sanitize();
        let flags = ModeFlags::new(
            config.sampling.simulate_at_start,
            config.publisher.publish_at_start,
        );
        let (notifier, notifications) = notify::channel();
        let (delivery_tx, delivery_rx) = unbounded();

        Self {
            config,
            flags,
            notifier,
            notifications,
            reader: Arc::new(Mutex::new(reader)),
            sequence: SequenceCounter::new(),
            delivery_tx,
            delivery_rx,
            publisher: Some(publisher),
            sampler: None,
            delivery: None,
            shut_down: false,
        }
    }

    /// Toggles Live/Simulated e Publish.
    pub fn flags(&self) -> &ModeFlags {
        &self.flags
    }

    /// Consumidor das notificações para o shell.
    pub fn notifications(&self) -> NotificationReceiver {
        self.notifications.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.sampler.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Última sequência atribuída.
    pub fn last_sequence(&self) -> u64 {
        self.sequence.last()
    }

    /// Inicia a amostragem. Idempotente.
    pub fn start(&mut self) -> Result<(), MonitorError> {
        if self.shut_down {
            return Err(MonitorError::ShutDown);
        }
        if self.is_running() {
            return Ok(());
        }
        if let Some(stale) = self.sampler.take() {
            stale.stop_and_join(self.config.delivery.join_timeout());
        }

        self.ensure_delivery()?;

        let sampler = SamplingLoop::new(
            self.config.sampling.clone(),
            self.flags.clone(),
            Arc::clone(&self.reader),
            self.sequence.clone(),
            self.delivery_tx.clone(),
            self.notifier.clone(),
            StdRng::from_entropy(),
        );
        self.sampler = Some(Worker::spawn("sampling", move |stop| sampler.run(stop))?);

        let now = Local::now().format("%H:%M:%S");
        self.notifier.status(format!("Temp sensor started at {now}"));
        info!("Amostragem iniciada");
        Ok(())
    }

    /// Para a amostragem. Idempotente; a entrega segue drenando a fila.
    pub fn stop(&mut self) {
        let Some(sampler) = self.sampler.take() else {
            return;
        };
        sampler.stop_and_join(self.config.delivery.join_timeout());

        let now = Local::now().format("%H:%M:%S");
        self.notifier.status(format!("Temp sensor stopped at {now}"));
        info!("Amostragem parada");
    }

    /// Para tudo. A entrega drena a fila antes de sair.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.stop();
        if let Some(delivery) = self.delivery.take() {
            let pending = self.delivery_rx.len();
            if pending > 0 {
                info!("Drenando {pending} eventos pendentes");
            }
            let budget = self.config.delivery.join_timeout() + self.config.publisher.timeout();
            delivery.stop_and_join(budget);
        }
        self.shut_down = true;
        info!("Monitor encerrado (última sequência {})", self.sequence.last());
    }

    fn ensure_delivery(&mut self) -> Result<(), MonitorError> {
        if self.delivery.is_some() {
            return Ok(());
        }
        let Some(publisher) = self.publisher.take() else {
            return Ok(());
        };

        let delivery = DeliveryLoop::new(
            self.delivery_rx.clone(),
            publisher,
            SpoolWriter::new(&self.config.spool.path),
            self.flags.clone(),
            self.notifier.clone(),
            self.config.delivery.poll_interval(),
        );
        self.delivery = Some(Worker::spawn("delivery", move |stop| delivery.run(stop))?);
        Ok(())
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
