//! Estado compartilhado entre shell e workers, e sinais de parada.
//!
//! [`ModeFlags`] é a única memória mutável vista por mais de uma thread:
//! duas flags independentes, escritas pelo shell e lidas pelos laços a cada
//! ciclo. Uma mudança vale a partir da próxima iteração.
//!
//! O toggle de simulação carrega uma geração: cada `set_simulate` conta como
//! um novo pedido, mesmo que o valor final não mude entre duas leituras.
//!
//! A parada é cooperativa: [`StopSignal`] é um channel sem mensagens cujo
//! sender é descartado para cancelar; cada [`StopListener`] enxerga o
//! `Disconnected` na hora, inclusive no meio de uma espera.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

// ──────────────────────────────────────────────
// ModeFlags
// ──────────────────────────────────────────────

/// Bit 0: simulate. Demais bits: geração do pedido.
#[derive(Debug)]
struct Flags {
    simulate: AtomicU64,
    publish_enabled: AtomicBool,
}

fn pack_simulate(generation: u64, simulate: bool) -> u64 {
    (generation << 1) | u64::from(simulate)
}

/// Handle clonável para os toggles Live/Simulated e Publish.
#[derive(Debug, Clone)]
pub struct ModeFlags {
    inner: Arc<Flags>,
}

impl ModeFlags {
    pub fn new(simulate: bool, publish_enabled: bool) -> Self {
        Self {
            inner: Arc::new(Flags {
                simulate: AtomicU64::new(pack_simulate(0, simulate)),
                publish_enabled: AtomicBool::new(publish_enabled),
            }),
        }
    }

    pub fn simulate(&self) -> bool {
        self.simulate_request().0
    }

    /// Valor atual e geração do último pedido de modo.
    pub fn simulate_request(&self) -> (bool, u64) {
        let packed = self.inner.simulate.load(Ordering::Acquire);
        (packed & 1 == 1, packed >> 1)
    }

    pub fn set_simulate(&self, simulate: bool) {
        // O closure sempre retorna Some: o update não falha
        let _ = self.inner.simulate.fetch_update(Ordering::AcqRel, Ordering::Acquire, |packed| {
            Some(pack_simulate((packed >> 1).wrapping_add(1), simulate))
        });
    }

    pub fn publish_enabled(&self) -> bool {
        self.inner.publish_enabled.load(Ordering::Acquire)
    }

    pub fn set_publish_enabled(&self, enabled: bool) {
        self.inner.publish_enabled.store(enabled, Ordering::Release);
    }
}

// ──────────────────────────────────────────────
// Stop signal
// ──────────────────────────────────────────────

/// Lado do controlador. `stop()` (ou o drop) cancela todos os listeners.
#[derive(Debug)]
pub struct StopSignal {
    tx: Option<Sender<()>>,
    rx: Receiver<()>,
}

/// Lado do worker.
#[derive(Debug, Clone)]
pub struct StopListener {
    rx: Receiver<()>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, rx) = bounded::<()>(0);
        Self { tx: Some(tx), rx }
    }

    pub fn listener(&self) -> StopListener {
        StopListener {
            rx: self.rx.clone(),
        }
    }

    pub fn stop(&mut self) {
        self.tx.take();
    }

    pub fn is_stopped(&self) -> bool {
        self.tx.is_none()
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopListener {
    /// Listener que nunca é cancelado (útil para leituras avulsas).
    pub fn never() -> Self {
        Self {
            rx: crossbeam_channel::never(),
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Dorme até `timeout` ou até o cancelamento. Retorna `true` se cancelado.
    pub fn wait(&self, timeout: Duration) -> bool {
        matches!(
            self.rx.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }
}
