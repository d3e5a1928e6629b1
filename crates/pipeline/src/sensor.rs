//! Leitor de temperatura com dois caminhos.
//!
//! - **Live**: DS18B20 via [`crate::w1_therm`]. A descoberta do dispositivo
//!   é feita uma vez e reaproveitada enquanto o leitor existir.
//! - **Sim**: passeio aleatório a partir de 22 °C, passo uniforme em
//!   ±5 °C, limitado a 10–40 °C. Nunca falha.

use crate::control::StopListener;
use crate::w1_therm::{self, RetryPolicy, W1Device};
use monitor_core::config::{SamplingConfig, SensorConfig};
use monitor_core::types::{Mode, Sample};
use rand::Rng;
use rand::rngs::StdRng;
use tracing::info;

/// Falhas de leitura. Todas são recuperáveis pelo laço de amostragem.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReadError {
    #[error("Sensor indisponível: {0}")]
    DeviceUnavailable(String),

    #[error("Registro inválido: {0}")]
    ParseError(String),

    #[error("Leitura cancelada")]
    Cancelled,
}

/// `true` se o host expõe sensores one-wire.
pub fn platform_supports_live() -> bool {
    cfg!(target_os = "linux")
}

// ──────────────────────────────────────────────
// Simulado
// ──────────────────────────────────────────────

/// Passeio aleatório limitado.
#[derive(Debug)]
pub struct SimulatedSensor<R: Rng> {
    current_c: f64,
    max_variation_c: f64,
    min_c: f64,
    max_c: f64,
    rng: R,
}

impl<R: Rng> SimulatedSensor<R> {
    pub fn new(cfg: &SamplingConfig, rng: R) -> Self {
        Self {
            current_c: cfg.base_temp_c,
            max_variation_c: cfg.max_variation_c,
            min_c: cfg.min_temp_c,
            max_c: cfg.max_temp_c,
            rng,
        }
    }

    /// Dá um passo e devolve a nova amostra.
    pub fn read(&mut self) -> Sample {
        let delta = self
            .rng
            .gen_range(-self.max_variation_c..=self.max_variation_c);
        self.current_c = (self.current_c + delta).clamp(self.min_c, self.max_c);
        Sample::from_celsius(self.current_c)
    }

    pub fn current_c(&self) -> f64 {
        self.current_c
    }
}

// ──────────────────────────────────────────────
// Live
// ──────────────────────────────────────────────

/// DS18B20 com descoberta em cache.
#[derive(Debug)]
pub struct LiveSensor {
    cfg: SensorConfig,
    supported: bool,
    modules_loaded: bool,
    device: Option<W1Device>,
}

impl LiveSensor {
    pub fn new(cfg: SensorConfig) -> Self {
        Self::with_support(cfg, platform_supports_live())
    }

    /// Permite forçar o suporte de plataforma (testes, hosts sem one-wire).
    pub fn with_support(cfg: SensorConfig, supported: bool) -> Self {
        Self {
            cfg,
            supported,
            modules_loaded: false,
            device: None,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// ROM id do dispositivo já descoberto.
    pub fn rom(&self) -> Option<&str> {
        self.device.as_ref().map(|d| d.rom.as_str())
    }

    fn discover(&mut self) -> Result<W1Device, ReadError> {
        if !self.supported {
            return Err(ReadError::DeviceUnavailable(
                "Modo ao vivo não suportado neste host".into(),
            ));
        }
        if self.cfg.load_kernel_modules && !self.modules_loaded {
            w1_therm::load_kernel_modules();
            self.modules_loaded = true;
        }
        w1_therm::discover(
            &self.cfg.base_dir,
            &self.cfg.family_prefix,
            &self.cfg.register_file,
        )
    }

    pub fn read(&mut self, cancel: &StopListener) -> Result<Sample, ReadError> {
        let mut device = match self.device.take() {
            Some(device) => device,
            None => self.discover()?,
        };

        let result = w1_therm::read_celsius(&mut device, RetryPolicy::from(&self.cfg), cancel);
        let rom = device.rom.clone();
        // Dispositivo sumiu do barramento: redescobre no próximo ciclo
        if !matches!(result, Err(ReadError::DeviceUnavailable(_))) {
            self.device = Some(device);
        }

        let reading = result?;
        let sample = Sample::from_celsius(reading.temp_c);
        info!(
            "rom={rom} temp_c={:.3} temp_f={:.3} retries={}",
            sample.temp_c, sample.temp_f, reading.retries
        );
        Ok(sample)
    }
}

// ──────────────────────────────────────────────
// Leitor combinado
// ──────────────────────────────────────────────

/// Escolhe o caminho de leitura conforme o modo do ciclo.
#[derive(Debug)]
pub struct SensorReader<R: Rng = StdRng> {
    live: LiveSensor,
    sim: SimulatedSensor<R>,
}

impl<R: Rng> SensorReader<R> {
    pub fn new(live: LiveSensor, sim: SimulatedSensor<R>) -> Self {
        Self { live, sim }
    }

    pub fn read(&mut self, mode: Mode, cancel: &StopListener) -> Result<Sample, ReadError> {
        match mode {
            Mode::Live => self.live.read(cancel),
            Mode::Sim => Ok(self.sim.read()),
        }
    }

    pub fn live_supported(&self) -> bool {
        self.live.is_supported()
    }

    /// Identificador do dispositivo para eventos do modo dado.
    pub fn device_id<'a>(&'a self, mode: Mode, fallback: &'a str) -> &'a str {
        match mode {
            Mode::Live => self.live.rom().unwrap_or(fallback),
            Mode::Sim => fallback,
        }
    }
}
