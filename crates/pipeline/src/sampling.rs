//! Laço de amostragem.
//!
//! A cada ciclo: lê o modo pedido pelo shell, aplica a restrição de
//! plataforma, lê o sensor, notifica a UI e enfileira um [`Event`] com a
//! próxima sequência. A fila de entrega é ilimitada, então enfileirar nunca
//! bloqueia o amostrador.

use crate::control::{ModeFlags, StopListener};
use crate::notify::Notifier;
use crate::sensor::{ReadError, SensorReader};
use crossbeam_channel::Sender;
use monitor_core::config::SamplingConfig;
use monitor_core::types::{Event, Mode};
use rand::Rng;
use rand::rngs::StdRng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{error, info, warn};

pub const STATUS_SIM_ACTIVE: &str = "Simulated mode active";
pub const STATUS_LIVE_ACTIVE: &str = "Live mode active";
pub const STATUS_SENSOR_UNAVAILABLE: &str = "Live mode: DS18B20 not available";
pub const STATUS_READ_ERROR: &str = "Temp read error";
pub const FORCE_SIMULATE_TEXT: &str = "Live mode is not supported on this host; switched to Simulated";

/// Contador de sequência do processo. Começa em 1 e nunca volta.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter(Arc<AtomicU64>);

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserva o próximo número.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Último número entregue (0 se nenhum).
    pub fn last(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Estado e dependências de um laço de amostragem.
pub struct SamplingLoop<R: Rng = StdRng> {
    cfg: SamplingConfig,
    flags: ModeFlags,
    reader: Arc<Mutex<SensorReader<R>>>,
    sequence: SequenceCounter,
    delivery_tx: Sender<Event>,
    notifier: Notifier,
    rng: R,
    live_supported: bool,

    last_mode: Option<Mode>,
    /// Geração do pedido de Live já sobrescrito.
    forced_generation: Option<u64>,
    last_error: Option<&'static str>,
}

impl<R: Rng> SamplingLoop<R> {
    /// `rng` sorteia os intervalos do modo simulado.
    pub fn new(
        cfg: SamplingConfig,
        flags: ModeFlags,
        reader: Arc<Mutex<SensorReader<R>>>,
        sequence: SequenceCounter,
        delivery_tx: Sender<Event>,
        notifier: Notifier,
        rng: R,
    ) -> Self {
        let live_supported = reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .live_supported();

        Self {
            cfg,
            flags,
            reader,
            sequence,
            delivery_tx,
            notifier,
            rng,
            live_supported,
            last_mode: None,
            forced_generation: None,
            last_error: None,
        }
    }

    /// Roda até o sinal de parada.
    pub fn run(mut self, stop: StopListener) {
        info!("Laço de amostragem iniciado");
        while !stop.is_stopped() {
            let pause = self.step(&stop);
            if stop.wait(pause) {
                break;
            }
        }
        info!(
            "Laço de amostragem encerrado (última sequência {})",
            self.sequence.last()
        );
    }

    /// Executa um ciclo e devolve quanto esperar até o próximo.
    pub fn step(&mut self, stop: &StopListener) -> Duration {
        let mode = self.effective_mode();

        if self.last_mode != Some(mode) {
            let text = match mode {
                Mode::Sim => STATUS_SIM_ACTIVE,
                Mode::Live => STATUS_LIVE_ACTIVE,
            };
            self.notifier.status(text);
            info!("{text}");
            self.last_mode = Some(mode);
        }

        let result = {
            let mut reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
            reader
                .read(mode, stop)
                .map(|sample| (sample, reader.device_id(mode, &self.cfg.device_id).to_string()))
        };

        match result {
            Ok((sample, device_id)) => {
                self.last_error = None;
                self.notifier.temp(sample.temp_c, sample.temp_f);
                info!(
                    "{mode} device={device_id} temp_c={:.3} temp_f={:.3}",
                    sample.temp_c, sample.temp_f
                );

                let event = Event::build(&device_id, mode, sample, self.sequence.next());
                if let Err(e) = self.delivery_tx.send(event) {
                    error!(
                        "Fila de entrega fechada; evento #{} descartado",
                        e.0.sequence
                    );
                }
                self.interval(mode)
            }
            Err(ReadError::Cancelled) => Duration::ZERO,
            Err(e) => {
                let text = match &e {
                    ReadError::DeviceUnavailable(_) => STATUS_SENSOR_UNAVAILABLE,
                    _ => STATUS_READ_ERROR,
                };
                if self.last_error != Some(text) {
                    self.notifier.status(text);
                    self.last_error = Some(text);
                }
                warn!("Erro de leitura: {e}");
                self.cfg.recovery_interval()
            }
        }
    }

    /// Modo pedido pelo shell, corrigido para simulado se o host não suporta
    /// leitura ao vivo. O aviso sai uma vez por pedido de Live, inclusive
    /// pedidos feitos e desfeitos entre dois ciclos.
    fn effective_mode(&mut self) -> Mode {
        let (requested_sim, generation) = self.flags.simulate_request();

        if !requested_sim && !self.live_supported {
            if self.forced_generation != Some(generation) {
                self.notifier.force_simulate(FORCE_SIMULATE_TEXT);
                warn!("{FORCE_SIMULATE_TEXT}");
                self.forced_generation = Some(generation);
            }
            return Mode::Sim;
        }
        Mode::from_simulate(requested_sim)
    }

    fn interval(&mut self, mode: Mode) -> Duration {
        match mode {
            Mode::Live => self.cfg.live_interval(),
            Mode::Sim => Duration::from_secs_f64(
                self.rng
                    .gen_range(self.cfg.sim_min_interval_secs..=self.cfg.sim_max_interval_secs),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{self, NotificationReceiver};
    use crate::sensor::{LiveSensor, SimulatedSensor};
    use crossbeam_channel::{Receiver, unbounded};
    use monitor_core::config::SensorConfig;
    use monitor_core::types::Notification;
    use rand::SeedableRng;

    struct Harness {
        sampler: SamplingLoop<StdRng>,
        flags: ModeFlags,
        events: Receiver<Event>,
        notes: NotificationReceiver,
    }

    fn harness(simulate: bool, live: LiveSensor) -> Harness {
        let cfg = SamplingConfig {
            sim_min_interval_secs: 0.8,
            sim_max_interval_secs: 2.5,
            ..Default::default()
        };
        let flags = ModeFlags::new(simulate, false);
        let reader = SensorReader::new(live, SimulatedSensor::new(&cfg, StdRng::seed_from_u64(11)));
        let (tx, events) = unbounded();
        let (notifier, notes) = notify::channel();
        let sampler = SamplingLoop::new(
            cfg,
            flags.clone(),
            Arc::new(Mutex::new(reader)),
            SequenceCounter::new(),
            tx,
            notifier,
            StdRng::seed_from_u64(12),
        );
        Harness {
            sampler,
            flags,
            events,
            notes,
        }
    }

    fn unsupported_live() -> LiveSensor {
        LiveSensor::with_support(SensorConfig::default(), false)
    }

    fn statuses(notes: &[Notification]) -> Vec<&str> {
        notes
            .iter()
            .filter_map(|n| match n {
                Notification::Status(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    fn force_count(notes: &[Notification]) -> usize {
        notes
            .iter()
            .filter(|n| matches!(n, Notification::ForceSimulate(_)))
            .count()
    }

    #[test]
    fn sequences_start_at_one_without_gaps() {
        let mut h = harness(true, unsupported_live());
        let stop = StopListener::never();
        for _ in 0..50 {
            h.sampler.step(&stop);
        }

        let sequences: Vec<u64> = h.events.try_iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, (1..=50).collect::<Vec<u64>>());
    }

    #[test]
    fn simulated_interval_is_drawn_from_range() {
        let mut h = harness(true, unsupported_live());
        let stop = StopListener::never();
        for _ in 0..100 {
            let pause = h.sampler.step(&stop);
            assert!(pause >= Duration::from_secs_f64(0.8));
            assert!(pause <= Duration::from_secs_f64(2.5));
        }
    }

    #[test]
    fn each_reading_notifies_temp_and_enqueues_event() {
        let mut h = harness(true, unsupported_live());
        h.sampler.step(&StopListener::never());

        let notes = h.notes.drain();
        assert_eq!(statuses(&notes), vec![STATUS_SIM_ACTIVE]);
        let Some(Notification::Temp(c, f)) = notes.last() else {
            panic!("esperava Temp, veio {notes:?}");
        };

        let event = h.events.try_recv().unwrap();
        assert_eq!(event.mode, Mode::Sim);
        assert_eq!(event.device_id, "dev-windows");
        assert_eq!((event.temp_c, event.temp_f), (*c, *f));
    }

    #[test]
    fn mode_status_is_emitted_once_per_change() {
        let mut h = harness(true, unsupported_live());
        let stop = StopListener::never();
        for _ in 0..5 {
            h.sampler.step(&stop);
        }
        assert_eq!(statuses(&h.notes.drain()), vec![STATUS_SIM_ACTIVE]);
    }

    #[test]
    fn live_on_unsupported_host_is_forced_to_sim_once() {
        let mut h = harness(false, unsupported_live());
        let stop = StopListener::never();
        for _ in 0..5 {
            h.sampler.step(&stop);
        }

        let notes = h.notes.drain();
        assert_eq!(force_count(&notes), 1);
        assert!(h.events.try_iter().all(|e| e.mode == Mode::Sim));
        // Continua simulado: nenhum status de modo ao vivo
        assert!(!statuses(&notes).contains(&STATUS_LIVE_ACTIVE));
    }

    #[test]
    fn each_new_live_request_is_overridden_again() {
        let mut h = harness(false, unsupported_live());
        let stop = StopListener::never();
        h.sampler.step(&stop);

        // Shell ressincroniza o toggle e o usuário tenta de novo
        h.flags.set_simulate(true);
        h.sampler.step(&stop);
        h.flags.set_simulate(false);
        h.sampler.step(&stop);
        h.sampler.step(&stop);

        assert_eq!(force_count(&h.notes.drain()), 2);
        assert!(h.events.try_iter().all(|e| e.mode == Mode::Sim));
    }

    #[test]
    fn live_request_between_two_cycles_is_still_overridden() {
        let mut h = harness(false, unsupported_live());
        let stop = StopListener::never();
        h.sampler.step(&stop);

        // Ressincronização e novo pedido de Live antes do próximo ciclo
        h.flags.set_simulate(true);
        h.flags.set_simulate(false);
        h.sampler.step(&stop);

        assert_eq!(force_count(&h.notes.drain()), 2);
        assert!(h.events.try_iter().all(|e| e.mode == Mode::Sim));
    }

    #[test]
    fn missing_sensor_reports_once_and_retries() {
        let dir = std::env::temp_dir().join(format!("w1-empty-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let live = LiveSensor::with_support(
            SensorConfig {
                base_dir: dir.clone(),
                load_kernel_modules: false,
                ..Default::default()
            },
            true,
        );
        let mut h = harness(false, live);
        let stop = StopListener::never();

        let pause = h.sampler.step(&stop);
        h.sampler.step(&stop);
        h.sampler.step(&stop);

        assert_eq!(pause, Duration::from_secs(1));
        assert_eq!(
            statuses(&h.notes.drain()),
            vec![STATUS_LIVE_ACTIVE, STATUS_SENSOR_UNAVAILABLE]
        );
        assert!(h.events.try_recv().is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn live_readings_use_rom_and_fixed_interval() {
        let dir = std::env::temp_dir().join(format!("w1-live-{}", uuid::Uuid::new_v4()));
        let device = dir.join("28-0316a2794cff");
        std::fs::create_dir_all(&device).unwrap();
        std::fs::write(device.join("w1_slave"), "aa : crc=1c YES\naa t=23125\n").unwrap();
        let live = LiveSensor::with_support(
            SensorConfig {
                base_dir: dir.clone(),
                load_kernel_modules: false,
                ..Default::default()
            },
            true,
        );
        let mut h = harness(false, live);

        let pause = h.sampler.step(&StopListener::never());
        assert_eq!(pause, Duration::from_secs(1));

        let event = h.events.try_recv().unwrap();
        assert_eq!(event.mode, Mode::Live);
        assert_eq!(event.device_id, "28-0316a2794cff");
        assert!((event.temp_c - 23.125).abs() < 1e-9);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn run_exits_on_stop() {
        let h = harness(true, unsupported_live());
        let mut signal = crate::control::StopSignal::new();
        let listener = signal.listener();
        let events = h.events;

        let handle = std::thread::spawn(move || h.sampler.run(listener));
        // Primeiro evento sai imediatamente; depois o laço dorme ≥ 0.8s
        let first = events.recv_timeout(Duration::from_secs(5)).unwrap();
        signal.stop();
        handle.join().unwrap();

        assert_eq!(first.sequence, 1);
    }
}
