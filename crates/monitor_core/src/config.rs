//! Configuração unificada via TOML.
//!
//! Um único `config.toml` ao lado do executável; seções ausentes usam o
//! valor padrão.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Marcadores que indicam projeto/tópico Pub/Sub não configurado.
pub const PLACEHOLDER_PROJECT_ID: &str = "YOUR_GCP_PROJECT_ID";
pub const PLACEHOLDER_TOPIC_ID: &str = "YOUR_TOPIC_ID";

/// Erros ao salvar a configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro ao serializar config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Erro de I/O em {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Sensor one-wire (DS18B20).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Diretório onde o kernel expõe os dispositivos one-wire
    pub base_dir: PathBuf,
    /// Prefixo da família do dispositivo (28 = DS18B20)
    pub family_prefix: String,
    /// Arquivo de registro dentro do diretório do dispositivo
    pub register_file: String,
    /// Executa `modprobe w1-gpio` / `modprobe w1-therm` antes da descoberta
    pub load_kernel_modules: bool,
    /// Espera entre leituras enquanto o registro não está pronto (ms)
    pub not_ready_backoff_ms: u64,
    /// Máximo de novas tentativas antes de declarar o dispositivo indisponível
    pub max_not_ready_retries: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("/sys/bus/w1/devices"),
            family_prefix: "28".into(),
            register_file: "w1_slave".into(),
            load_kernel_modules: true,
            not_ready_backoff_ms: 200,
            max_not_ready_retries: 25,
        }
    }
}

impl SensorConfig {
    pub fn not_ready_backoff(&self) -> Duration {
        Duration::from_millis(self.not_ready_backoff_ms)
    }
}

/// Laço de amostragem e passeio aleatório do modo simulado.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Identificador usado nos eventos simulados (e fallback do modo ao vivo)
    pub device_id: String,
    pub base_temp_c: f64,
    pub max_variation_c: f64,
    pub min_temp_c: f64,
    pub max_temp_c: f64,
    /// Intervalo fixo entre leituras ao vivo (s)
    pub live_interval_secs: f64,
    /// Intervalo aleatório entre leituras simuladas (s)
    pub sim_min_interval_secs: f64,
    pub sim_max_interval_secs: f64,
    /// Espera após uma leitura com erro (s)
    pub recovery_interval_secs: f64,
    /// Estado inicial do toggle Live/Simulated
    pub simulate_at_start: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            device_id: "dev-windows".into(),
            base_temp_c: 22.0,
            max_variation_c: 5.0,
            min_temp_c: 10.0,
            max_temp_c: 40.0,
            live_interval_secs: 1.0,
            sim_min_interval_secs: 0.8,
            sim_max_interval_secs: 2.5,
            recovery_interval_secs: 1.0,
            simulate_at_start: true,
        }
    }
}

impl SamplingConfig {
    pub fn live_interval(&self) -> Duration {
        Duration::from_secs_f64(self.live_interval_secs)
    }

    pub fn recovery_interval(&self) -> Duration {
        Duration::from_secs_f64(self.recovery_interval_secs)
    }
}

/// Destino Pub/Sub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub project_id: String,
    pub topic_id: String,
    /// URL base da API (ou do emulador local)
    pub endpoint: String,
    /// Tempo máximo por publicação (s)
    pub timeout_secs: f64,
    /// Estado inicial do toggle Publish
    pub publish_at_start: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            project_id: PLACEHOLDER_PROJECT_ID.into(),
            topic_id: PLACEHOLDER_TOPIC_ID.into(),
            endpoint: "https://pubsub.googleapis.com".into(),
            timeout_secs: 5.0,
            publish_at_start: false,
        }
    }
}

impl PublisherConfig {
    /// `true` se projeto e tópico foram preenchidos.
    pub fn is_configured(&self) -> bool {
        let project = self.project_id.trim();
        let topic = self.topic_id.trim();
        !project.is_empty()
            && !topic.is_empty()
            && project != PLACEHOLDER_PROJECT_ID
            && topic != PLACEHOLDER_TOPIC_ID
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

/// Arquivo de spool para eventos não entregues.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoolConfig {
    pub path: PathBuf,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("spool_unsent_events.jsonl"),
        }
    }
}

/// Laço de entrega.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Timeout de espera na fila, para rechecar o sinal de parada (ms)
    pub poll_interval_ms: u64,
    /// Espera máxima pelo término de cada worker no shutdown (ms)
    pub join_timeout_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            join_timeout_ms: 1500,
        }
    }
}

impl DeliveryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// Logging em console e arquivo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filtro padrão (sobrescrito por `RUST_LOG`)
    pub level: String,
    /// Arquivo de log (vazio = desabilitado)
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: "sensor_readings.log".into(),
        }
    }
}

/// Shell de apresentação.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Intervalo de drenagem das notificações (ms, ≤ 250)
    pub drain_interval_ms: u64,
    /// Linhas mantidas no change log
    pub change_log_capacity: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            drain_interval_ms: 200,
            change_log_capacity: 500,
        }
    }
}

impl UiConfig {
    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }
}

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sensor: SensorConfig,
    pub sampling: SamplingConfig,
    pub publisher: PublisherConfig,
    pub spool: SpoolConfig,
    pub delivery: DeliveryConfig,
    pub logging: LoggingConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = self.sampling.problems();
        errors.extend(self.publisher.problems());
        errors.extend(self.spool.problems());
        errors.extend(self.delivery.problems());
        errors.extend(self.ui.problems());
        errors
    }

    /// Troca pelo padrão cada seção que não passa na validação.
    ///
    /// Os workers confiam nas faixas (`gen_range`, `clamp`, `from_secs_f64`
    /// entram em pânico com faixas invertidas ou valores negativos), então
    /// uma configuração inválida nunca chega até eles.
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut replaced = Vec::new();
        reset_if_invalid(&mut self.sampling, "sampling", SamplingConfig::problems, &mut replaced);
        reset_if_invalid(&mut self.publisher, "publisher", PublisherConfig::problems, &mut replaced);
        reset_if_invalid(&mut self.spool, "spool", SpoolConfig::problems, &mut replaced);
        reset_if_invalid(&mut self.delivery, "delivery", DeliveryConfig::problems, &mut replaced);
        reset_if_invalid(&mut self.ui, "ui", UiConfig::problems, &mut replaced);
        replaced
    }
}

fn reset_if_invalid<T: Default>(
    section: &mut T,
    name: &str,
    problems: fn(&T) -> Vec<String>,
    replaced: &mut Vec<String>,
) {
    let found = problems(section);
    if found.is_empty() {
        return;
    }
    for problem in found {
        warn!("Config [{name}]: {problem}");
        replaced.push(format!("[{name}] {problem}; usando valores padrão"));
    }
    *section = T::default();
}

/// `true` para durações finitas e não negativas (aceitas por `from_secs_f64`).
fn is_valid_secs(secs: f64) -> bool {
    secs.is_finite() && secs >= 0.0
}

// ──────────────────────────────────────────────
// Validação por seção
// ──────────────────────────────────────────────

impl SamplingConfig {
    pub fn problems(&self) -> Vec<String> {
        let mut errors = Vec::new();

        // Comparações escritas para que NaN também seja rejeitado
        if !(self.min_temp_c.is_finite() && self.max_temp_c.is_finite() && self.min_temp_c < self.max_temp_c) {
            errors.push(format!(
                "Faixa simulada inválida: {} ≥ {}",
                self.min_temp_c, self.max_temp_c
            ));
        } else if !(self.base_temp_c >= self.min_temp_c && self.base_temp_c <= self.max_temp_c) {
            errors.push(format!(
                "Temperatura base {} fora da faixa {}–{}",
                self.base_temp_c, self.min_temp_c, self.max_temp_c
            ));
        }
        if !(self.max_variation_c.is_finite() && self.max_variation_c >= 0.0) {
            errors.push(format!("Variação máxima inválida: {}", self.max_variation_c));
        }
        if !(self.live_interval_secs > 0.0 && self.live_interval_secs <= 60.0) {
            errors.push(format!(
                "Intervalo ao vivo inválido: {} (0–60.0)",
                self.live_interval_secs
            ));
        }
        if !(is_valid_secs(self.sim_max_interval_secs)
            && self.sim_min_interval_secs > 0.0
            && self.sim_min_interval_secs <= self.sim_max_interval_secs)
        {
            errors.push(format!(
                "Intervalo simulado inválido: {}–{}",
                self.sim_min_interval_secs, self.sim_max_interval_secs
            ));
        }
        if !is_valid_secs(self.recovery_interval_secs) {
            errors.push(format!(
                "Intervalo de recuperação inválido: {}",
                self.recovery_interval_secs
            ));
        }
        if self.device_id.trim().is_empty() {
            errors.push("device_id não pode ser vazio".into());
        }
        errors
    }
}

impl PublisherConfig {
    pub fn problems(&self) -> Vec<String> {
        if self.timeout_secs > 0.0 && self.timeout_secs.is_finite() {
            Vec::new()
        } else {
            vec![format!("Timeout de publicação inválido: {}", self.timeout_secs)]
        }
    }
}

impl SpoolConfig {
    pub fn problems(&self) -> Vec<String> {
        if self.path.as_os_str().is_empty() {
            vec!["Caminho do spool não pode ser vazio".into()]
        } else {
            Vec::new()
        }
    }
}

impl DeliveryConfig {
    pub fn problems(&self) -> Vec<String> {
        if self.poll_interval_ms == 0 {
            vec!["poll_interval_ms não pode ser 0".into()]
        } else {
            Vec::new()
        }
    }
}

impl UiConfig {
    pub fn problems(&self) -> Vec<String> {
        if self.drain_interval_ms == 0 || self.drain_interval_ms > 250 {
            vec![format!(
                "Intervalo de drenagem da UI inválido: {}ms (1–250)",
                self.drain_interval_ms
            )]
        } else {
            Vec::new()
        }
    }
}
