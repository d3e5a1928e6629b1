//! Propriedades do pipeline com sensor simulado semeado.

use crossbeam_channel::unbounded;
use monitor_core::config::{AppConfig, SensorConfig};
use monitor_core::types::{Event, Mode, Notification};
use monitor_core::{decode_event_line, encode_event_line};
use monitor_pipeline::control::{ModeFlags, StopListener};
use monitor_pipeline::display::DisplayState;
use monitor_pipeline::notify;
use monitor_pipeline::sampling::{SamplingLoop, SequenceCounter};
use monitor_pipeline::sensor::{LiveSensor, SensorReader, SimulatedSensor};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex};

fn sim_loop(seed: u64) -> (SamplingLoop, crossbeam_channel::Receiver<Event>) {
    let config = AppConfig::default();
    let reader = SensorReader::new(
        LiveSensor::with_support(SensorConfig::default(), false),
        SimulatedSensor::new(&config.sampling, StdRng::seed_from_u64(seed)),
    );
    let (tx, rx) = unbounded();
    let (notifier, _notes) = notify::channel();
    let sampler = SamplingLoop::new(
        config.sampling.clone(),
        ModeFlags::new(true, false),
        Arc::new(Mutex::new(reader)),
        SequenceCounter::new(),
        tx,
        notifier,
        StdRng::seed_from_u64(seed.wrapping_add(1)),
    );
    (sampler, rx)
}

proptest! {
    #[test]
    fn simulated_events_stay_in_range_and_are_numbered(seed in any::<u64>(), steps in 1usize..200) {
        let (mut sampler, rx) = sim_loop(seed);
        let stop = StopListener::never();
        let cfg = AppConfig::default().sampling;

        for _ in 0..steps {
            let pause = sampler.step(&stop);
            prop_assert!(pause.as_secs_f64() >= cfg.sim_min_interval_secs - 1e-6);
            prop_assert!(pause.as_secs_f64() <= cfg.sim_max_interval_secs + 1e-6);
        }

        let events: Vec<Event> = rx.try_iter().collect();
        prop_assert_eq!(events.len(), steps);
        for (index, event) in events.iter().enumerate() {
            prop_assert_eq!(event.sequence, index as u64 + 1);
            prop_assert_eq!(event.mode, Mode::Sim);
            prop_assert!((10.0..=40.0).contains(&event.temp_c));
            prop_assert!((event.temp_f - (event.temp_c * 9.0 / 5.0 + 32.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn spool_line_preserves_the_event(seed in any::<u64>()) {
        let (mut sampler, rx) = sim_loop(seed);
        sampler.step(&StopListener::never());
        let event = rx.try_recv().unwrap();

        let line = encode_event_line(&event).unwrap();
        prop_assert!(line.ends_with('\n'));
        prop_assert_eq!(line.matches('\n').count(), 1);
        prop_assert_eq!(decode_event_line(&line).unwrap(), event);
    }

    #[test]
    fn change_log_never_exceeds_capacity(capacity in 1usize..20, temps in prop::collection::vec(10.0f64..40.0, 0..100)) {
        let mut display = DisplayState::new(capacity, "Stopped");
        for temp_c in temps {
            display.apply_now(Notification::Temp(temp_c, temp_c * 9.0 / 5.0 + 32.0));
            prop_assert!(display.change_log().count() <= capacity);
        }
    }
}

#[test]
fn sequence_counter_is_unique_across_threads() {
    let counter = SequenceCounter::new();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let counter = counter.clone();
            std::thread::spawn(move || (0..250).map(|_| counter.next()).collect::<Vec<u64>>())
        })
        .collect();

    let mut all: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all.sort_unstable();
    assert_eq!(all, (1..=1000).collect::<Vec<u64>>());
    assert_eq!(counter.last(), 1000);
}
