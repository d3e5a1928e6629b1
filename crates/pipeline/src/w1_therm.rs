//! DS18B20 via driver one-wire do kernel (`w1-gpio` + `w1-therm`).
//!
//! O driver expõe `<base_dir>/28-xxxxxxxxxxxx/w1_slave` com duas linhas:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```
//!
//! A primeira traz o marcador de validade (`YES`); a segunda a leitura em
//! milésimos de grau. Logo após uma conversão o registro pode vir sem o
//! marcador por alguns instantes, então a leitura é repetida com backoff.

use crate::control::StopListener;
use crate::sensor::ReadError;
use monitor_core::config::SensorConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const VALID_MARKER: &str = "YES";
const TEMP_PREFIX: &str = "t=";
const KERNEL_MODULES: [&str; 2] = ["w1-gpio", "w1-therm"];

/// Fonte do texto do registro. Em produção, o arquivo `w1_slave`.
pub trait RegisterSource {
    fn read_register(&mut self) -> std::io::Result<String>;
}

/// Sensor descoberto no barramento.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct W1Device {
    /// ROM id (nome do diretório, ex: `28-0316a2794cff`)
    pub rom: String,
    pub register: PathBuf,
}

impl RegisterSource for W1Device {
    fn read_register(&mut self) -> std::io::Result<String> {
        std::fs::read_to_string(&self.register)
    }
}

/// Conteúdo interpretado do registro.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegisterState {
    /// Marcador de validade ausente; tentar de novo.
    NotReady,
    /// Temperatura em °C.
    Ready(f64),
}

/// Limites da espera pelo marcador de validade.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub backoff: Duration,
    pub max_retries: u32,
}

impl From<&SensorConfig> for RetryPolicy {
    fn from(cfg: &SensorConfig) -> Self {
        Self {
            backoff: cfg.not_ready_backoff(),
            max_retries: cfg.max_not_ready_retries,
        }
    }
}

/// Leitura bem-sucedida e quantas novas tentativas foram necessárias.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterReading {
    pub temp_c: f64,
    pub retries: u32,
}

/// Carrega os módulos do kernel. Falhas só vão para o log.
pub fn load_kernel_modules() {
    for module in KERNEL_MODULES {
        match std::process::Command::new("modprobe").arg(module).status() {
            Ok(status) if status.success() => debug!("modprobe {module}: ok"),
            Ok(status) => debug!("modprobe {module}: {status}"),
            Err(e) => debug!("modprobe {module} indisponível: {e}"),
        }
    }
}

/// Procura o primeiro dispositivo da família em `base_dir`.
pub fn discover(base_dir: &Path, family_prefix: &str, register_file: &str) -> Result<W1Device, ReadError> {
    let entries = std::fs::read_dir(base_dir).map_err(|e| {
        ReadError::DeviceUnavailable(format!("{} inacessível: {e}", base_dir.display()))
    })?;

    let mut roms: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(family_prefix))
        .collect();
    roms.sort();

    let Some(rom) = roms.into_iter().next() else {
        return Err(ReadError::DeviceUnavailable(format!(
            "Nenhum DS18B20 encontrado em {}",
            base_dir.display()
        )));
    };

    let register = base_dir.join(&rom).join(register_file);
    info!("✓ DS18B20 inicializado rom={rom} path={}", register.display());
    Ok(W1Device { rom, register })
}

/// Interpreta o texto do registro.
pub fn parse_register(text: &str) -> Result<RegisterState, ReadError> {
    let mut lines = text.lines();
    let (Some(status_line), Some(temp_line)) = (lines.next(), lines.next()) else {
        return Err(ReadError::ParseError(format!(
            "Registro incompleto: {:?}",
            text.trim()
        )));
    };

    if !status_line.contains(VALID_MARKER) {
        return Ok(RegisterState::NotReady);
    }

    let Some(pos) = temp_line.find(TEMP_PREFIX) else {
        return Err(ReadError::ParseError(format!(
            "Linha sem '{TEMP_PREFIX}': {temp_line:?}"
        )));
    };

    let raw = temp_line[pos + TEMP_PREFIX.len()..].trim();
    let millidegrees: f64 = raw
        .parse()
        .map_err(|e| ReadError::ParseError(format!("Valor inválido {raw:?}: {e}")))?;
    if !millidegrees.is_finite() {
        return Err(ReadError::ParseError(format!("Valor não finito {raw:?}")));
    }

    Ok(RegisterState::Ready(millidegrees / 1000.0))
}

/// Lê o registro até o marcador aparecer, respeitando `policy` e o cancelamento.
pub fn read_celsius<S: RegisterSource>(
    source: &mut S,
    policy: RetryPolicy,
    cancel: &StopListener,
) -> Result<RegisterReading, ReadError> {
    let mut retries = 0;
    loop {
        let text = source
            .read_register()
            .map_err(|e| ReadError::DeviceUnavailable(format!("Falha ao abrir registro: {e}")))?;

        match parse_register(&text)? {
            RegisterState::Ready(temp_c) => return Ok(RegisterReading { temp_c, retries }),
            RegisterState::NotReady => {
                if retries >= policy.max_retries {
                    warn!("Registro sem marcador após {retries} tentativas");
                    return Err(ReadError::DeviceUnavailable(format!(
                        "Registro não ficou pronto após {retries} tentativas"
                    )));
                }
                if cancel.wait(policy.backoff) {
                    return Err(ReadError::Cancelled);
                }
                retries += 1;
                debug!("Registro não pronto, tentativa {retries}");
            }
        }
    }
}
