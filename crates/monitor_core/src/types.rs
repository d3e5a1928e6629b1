//! Tipos do pipeline: amostra, modo, evento e notificações para a UI.
//!
//! O [`Event`] é o registro que atravessa a fila de entrega e termina
//! publicado ou gravado no spool; é imutável depois de criado.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Converte °C para °F (`c * 9/5 + 32`).
pub fn celsius_to_fahrenheit(temp_c: f64) -> f64 {
    temp_c * 9.0 / 5.0 + 32.0
}

// ──────────────────────────────────────────────
// Sample
// ──────────────────────────────────────────────

/// Uma leitura de temperatura, produzida uma vez por ciclo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub temp_c: f64,
    pub temp_f: f64,
}

impl Sample {
    /// Cria a amostra derivando °F de °C.
    pub fn from_celsius(temp_c: f64) -> Self {
        Self {
            temp_c,
            temp_f: celsius_to_fahrenheit(temp_c),
        }
    }
}

// ──────────────────────────────────────────────
// Mode
// ──────────────────────────────────────────────

/// Origem da leitura: sensor real ou passeio aleatório.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Live,
    Sim,
}

impl Mode {
    pub fn from_simulate(simulate: bool) -> Self {
        if simulate { Mode::Sim } else { Mode::Live }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Live => "live",
            Mode::Sim => "sim",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Event
// ──────────────────────────────────────────────

/// Tipo do evento. Hoje só existe leitura de temperatura.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "TEMP_READING")]
    TempReading,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TempReading => "TEMP_READING",
        }
    }
}

/// Evento de leitura com metadados de identidade e sequência.
///
/// A ordem dos campos é a mesma das linhas do spool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub message_id: Uuid,
    pub device_id: String,
    pub mode: Mode,
    pub temp_c: f64,
    pub temp_f: f64,
    /// `YYYY-MM-DDTHH:MM:SS.ffffffZ`
    pub timestamp_utc: String,
    /// Começa em 1 a cada execução do processo.
    pub sequence: u64,
    pub event_type: EventType,
}

impl Event {
    /// Monta o evento a partir de uma amostra. Sem I/O, sem falha.
    ///
    /// Gera um `message_id` aleatório e carimba o horário UTC atual; a
    /// sequência é atribuída por quem chama.
    pub fn build(device_id: &str, mode: Mode, sample: Sample, sequence: u64) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            device_id: device_id.to_string(),
            mode,
            temp_c: sample.temp_c,
            temp_f: sample.temp_f,
            timestamp_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            sequence,
            event_type: EventType::TempReading,
        }
    }

    pub fn sample(&self) -> Sample {
        Sample {
            temp_c: self.temp_c,
            temp_f: self.temp_f,
        }
    }
}

// ──────────────────────────────────────────────
// Notification
// ──────────────────────────────────────────────

/// Mensagem enviada dos workers para o shell de apresentação.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Nova leitura (°C, °F).
    Temp(f64, f64),
    /// Texto de status legível.
    Status(String),
    /// O modo ao vivo foi recusado; o shell deve voltar o toggle para simulado.
    ForceSimulate(String),
}

impl Notification {
    /// Tag curta usada nos logs (`temp`, `status`, `force_sim`).
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Temp(..) => "temp",
            Notification::Status(_) => "status",
            Notification::ForceSimulate(_) => "force_sim",
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
