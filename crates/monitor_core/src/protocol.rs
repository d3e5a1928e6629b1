//! Formatos de fio do pipeline.
//!
//! - **Spool**: uma linha JSON por evento, terminada em `\n` (JSONL).
//! - **Pub/Sub**: corpo do `topics.publish` REST, com o evento serializado
//!   em base64 no `data` e os metadados de roteamento em `attributes`.
//!
//! ```text
//! {"messages":[{"data":"<base64(evento)>","attributes":{"message_id":…,"device_id":…,"mode":…,"event_type":…}}]}
//! ```

use crate::types::Event;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Erros de codificação.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Erro de serialização: {0}")]
    Serialize(String),

    #[error("Erro de deserialização: {0}")]
    Deserialize(String),

    #[error("Linha de spool vazia")]
    EmptyLine,
}

// ──────────────────────────────────────────────
// Spool (JSONL)
// ──────────────────────────────────────────────

/// Serializa um evento como uma linha de spool, já com `\n`.
pub fn encode_event_line(event: &Event) -> Result<String, ProtocolError> {
    let mut line =
        serde_json::to_string(event).map_err(|e| ProtocolError::Serialize(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

/// Reconstrói um evento a partir de uma linha do spool.
pub fn decode_event_line(line: &str) -> Result<Event, ProtocolError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Err(ProtocolError::EmptyLine);
    }
    serde_json::from_str(line).map_err(|e| ProtocolError::Deserialize(e.to_string()))
}

// ──────────────────────────────────────────────
// Pub/Sub REST
// ──────────────────────────────────────────────

/// Corpo de `POST …/topics/{topic}:publish`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub messages: Vec<PubsubMessage>,
}

/// Uma mensagem Pub/Sub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubsubMessage {
    /// Evento serializado (JSON) em base64.
    pub data: String,
    pub attributes: BTreeMap<String, String>,
}

/// Resposta de sucesso do publish.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishResponse {
    #[serde(rename = "messageIds", default)]
    pub message_ids: Vec<String>,
}

/// Atributos que permitem roteamento/dedup sem abrir o corpo.
pub fn message_attributes(event: &Event) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("message_id".to_string(), event.message_id.to_string()),
        ("device_id".to_string(), event.device_id.clone()),
        ("mode".to_string(), event.mode.as_str().to_string()),
        ("event_type".to_string(), event.event_type.as_str().to_string()),
    ])
}

/// Monta o corpo do publish para um único evento.
pub fn build_publish_request(event: &Event) -> Result<PublishRequest, ProtocolError> {
    let body = serde_json::to_vec(event).map_err(|e| ProtocolError::Serialize(e.to_string()))?;
    Ok(PublishRequest {
        messages: vec![PubsubMessage {
            data: STANDARD.encode(body),
            attributes: message_attributes(event),
        }],
    })
}

/// Decodifica o `data` de uma mensagem de volta para o evento.
pub fn decode_message_data(message: &PubsubMessage) -> Result<Event, ProtocolError> {
    let bytes = STANDARD
        .decode(&message.data)
        .map_err(|e| ProtocolError::Deserialize(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ProtocolError::Deserialize(e.to_string()))
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
