//! Spool local de eventos não entregues (JSONL, append-only).
//!
//! O arquivo é aberto, sincronizado e fechado a cada evento: um crash no
//! meio da escrita corrompe no máximo a última linha. Se essa linha ficou
//! sem `\n`, o próximo evento começa numa linha nova. Só o laço de entrega
//! escreve aqui.

use monitor_core::protocol::{self, ProtocolError};
use monitor_core::types::Event;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Falhas do spool.
#[derive(Debug, thiserror::Error)]
pub enum SpoolError {
    #[error("Falha de I/O no spool {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Falha ao serializar evento: {0}")]
    Encode(#[from] ProtocolError),
}

/// Escritor do spool com caminho fixo.
#[derive(Debug, Clone)]
pub struct SpoolWriter {
    path: PathBuf,
}

impl SpoolWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acrescenta uma linha com o evento.
    pub fn spool(&self, event: &Event) -> Result<(), SpoolError> {
        let line = protocol::encode_event_line(event)?;
        let io_err = |source: std::io::Error| SpoolError::Io {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;

        let mut record = String::with_capacity(line.len() + 1);
        if ends_mid_line(&mut file).map_err(io_err)? {
            warn!("Spool {}: última linha incompleta, iniciando nova linha", self.path.display());
            record.push('\n');
        }
        record.push_str(&line);

        file.write_all(record.as_bytes()).map_err(io_err)?;
        file.sync_data().map_err(io_err)?;

        debug!(
            "Spool: message_id={} sequence={} → {}",
            event.message_id,
            event.sequence,
            self.path.display()
        );
        Ok(())
    }
}

/// `true` se o arquivo não vazio não termina em `\n` (escrita interrompida).
fn ends_mid_line(file: &mut File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Conteúdo de um spool relido para reconciliação.
#[derive(Debug, Default)]
pub struct SpoolContents {
    pub events: Vec<Event>,
    /// Linhas (1-based) que não puderam ser interpretadas.
    pub malformed_lines: Vec<usize>,
}

/// Relê o spool. Linhas corrompidas são reportadas, não abortam a leitura.
pub fn read_spool(path: &Path) -> Result<SpoolContents, SpoolError> {
    let io_err = |source: std::io::Error| SpoolError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;

    let mut contents = SpoolContents::default();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        match protocol::decode_event_line(&line) {
            Ok(event) => contents.events.push(event),
            Err(e) => {
                warn!("Spool {}:{}: {e}", path.display(), index + 1);
                contents.malformed_lines.push(index + 1);
            }
        }
    }
    Ok(contents)
}
