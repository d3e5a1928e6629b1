//! Publicação remota de eventos (Pub/Sub REST).
//!
//! A capacidade de publicar é negociada uma vez no início do processo:
//! [`PublisherCapability::Ready`] com um cliente pronto, ou
//! [`PublisherCapability::Unavailable`] para o resto da execução (todos os
//! eventos vão para o spool, sem nova tentativa de construir o cliente).

use monitor_core::config::PublisherConfig;
use monitor_core::protocol::{self, ProtocolError, PublishResponse};
use monitor_core::types::Event;
use reqwest::Url;
use reqwest::blocking::Client;
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// Identificador atribuído pelo servidor (`messageIds[0]`).
pub type RemoteId = String;

/// Falhas de publicação. Todas levam o evento para o spool.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Timeout de publicação ({0:?})")]
    Timeout(Duration),

    #[error("Erro de transporte: {0}")]
    Transport(String),

    #[error("Publicação rejeitada (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Mensageria indisponível: {0}")]
    MessagingUnavailable(String),

    #[error("Falha ao codificar evento: {0}")]
    Encode(#[from] ProtocolError),
}

/// Entrega remota de um evento.
pub trait Publish: Send {
    /// Publica e devolve o id remoto, ou falha dentro do timeout.
    fn publish(&mut self, event: &Event) -> Result<RemoteId, PublishError>;
}

// ──────────────────────────────────────────────
// Cliente Pub/Sub
// ──────────────────────────────────────────────

/// Cliente HTTP para `projects/{p}/topics/{t}:publish`.
pub struct PubSubPublisher {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl PubSubPublisher {
    /// Constrói o cliente. Falha se o destino não estiver configurado.
    pub fn connect(cfg: &PublisherConfig) -> Result<Self, PublishError> {
        if !cfg.is_configured() {
            return Err(PublishError::MessagingUnavailable(
                "projeto/tópico Pub/Sub não configurado".into(),
            ));
        }

        let raw = format!(
            "{}/v1/projects/{}/topics/{}:publish",
            cfg.endpoint.trim_end_matches('/'),
            cfg.project_id.trim(),
            cfg.topic_id.trim()
        );
        let url = Url::parse(&raw)
            .map_err(|e| PublishError::MessagingUnavailable(format!("URL inválida {raw}: {e}")))?;

        let timeout = cfg.timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::MessagingUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn classify(&self, e: reqwest::Error) -> PublishError {
        if e.is_timeout() {
            PublishError::Timeout(self.timeout)
        } else {
            PublishError::Transport(e.to_string())
        }
    }
}

impl Publish for PubSubPublisher {
    fn publish(&mut self, event: &Event) -> Result<RemoteId, PublishError> {
        let request = protocol::build_publish_request(event)?;

        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PublishResponse = response.json().map_err(|e| self.classify(e))?;
        parsed
            .message_ids
            .into_iter()
            .next()
            .ok_or_else(|| PublishError::Rejected {
                status: status.as_u16(),
                body: "resposta sem messageIds".into(),
            })
    }
}

// ──────────────────────────────────────────────
// Negociação
// ──────────────────────────────────────────────

/// Resultado da negociação de mensageria no início do processo.
pub enum PublisherCapability {
    Ready(Box<dyn Publish>),
    Unavailable(String),
}

impl PublisherCapability {
    /// Tenta construir o cliente Pub/Sub. Falha é permanente.
    pub fn negotiate(cfg: &PublisherConfig) -> Self {
        match PubSubPublisher::connect(cfg) {
            Ok(publisher) => {
                info!("✓ Pub/Sub: {}", publisher.url());
                PublisherCapability::Ready(Box::new(publisher))
            }
            Err(e) => {
                warn!("✗ Pub/Sub indisponível; usando apenas spool: {e}");
                PublisherCapability::Unavailable(e.to_string())
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, PublisherCapability::Ready(_))
    }
}

impl fmt::Debug for PublisherCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublisherCapability::Ready(_) => f.write_str("Ready"),
            PublisherCapability::Unavailable(reason) => {
                f.debug_tuple("Unavailable").field(reason).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_core::protocol::PublishRequest;
    use monitor_core::types::{Mode, Sample};
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    /// Servidor HTTP de uma requisição. Devolve (endpoint, handle com o request recebido).
    fn serve_once(status_line: &'static str, body: &'static str, delay: Duration) -> (String, JoinHandle<(String, String)>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());

        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();

            let mut content_length = 0usize;
            loop {
                let mut header = String::new();
                reader.read_line(&mut header).unwrap();
                if header == "\r\n" || header.is_empty() {
                    break;
                }
                if let Some((name, value)) = header.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body).unwrap();

            std::thread::sleep(delay);
            let mut stream = stream;
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).ok();

            (request_line, String::from_utf8(request_body).unwrap())
        });

        (endpoint, handle)
    }

    fn config(endpoint: &str, timeout_secs: f64) -> PublisherConfig {
        PublisherConfig {
            project_id: "greenhouse-prod".into(),
            topic_id: "temp-readings".into(),
            endpoint: endpoint.into(),
            timeout_secs,
            publish_at_start: true,
        }
    }

    fn event() -> Event {
        Event::build("28-0316a2794cff", Mode::Live, Sample::from_celsius(21.5), 3)
    }

    #[test]
    fn placeholder_config_is_unavailable() {
        let capability = PublisherCapability::negotiate(&PublisherConfig::default());
        assert!(!capability.is_ready());
        assert!(matches!(
            PubSubPublisher::connect(&PublisherConfig::default()),
            Err(PublishError::MessagingUnavailable(_))
        ));
    }

    #[test]
    fn configured_publisher_is_ready() {
        let capability = PublisherCapability::negotiate(&config("http://127.0.0.1:8085", 5.0));
        assert!(capability.is_ready());
    }

    #[test]
    fn publishes_to_topic_and_returns_remote_id() {
        let (endpoint, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"messageIds":["4213217463892135"]}"#,
            Duration::ZERO,
        );
        let mut publisher = PubSubPublisher::connect(&config(&endpoint, 5.0)).unwrap();
        let event = event();

        let remote_id = publisher.publish(&event).unwrap();
        assert_eq!(remote_id, "4213217463892135");

        let (request_line, body) = server.join().unwrap();
        assert!(request_line.starts_with(
            "POST /v1/projects/greenhouse-prod/topics/temp-readings:publish "
        ));
        let request: PublishRequest = serde_json::from_str(&body).unwrap();
        let message = &request.messages[0];
        assert_eq!(message.attributes["message_id"], event.message_id.to_string());
        assert_eq!(message.attributes["mode"], "live");
        assert_eq!(protocol::decode_message_data(message).unwrap(), event);
    }

    #[test]
    fn http_error_is_rejected() {
        let (endpoint, server) = serve_once(
            "HTTP/1.1 404 Not Found",
            r#"{"error":{"code":404,"message":"Resource not found"}}"#,
            Duration::ZERO,
        );
        let mut publisher = PubSubPublisher::connect(&config(&endpoint, 5.0)).unwrap();

        let result = publisher.publish(&event());
        assert!(matches!(result, Err(PublishError::Rejected { status: 404, .. })));
        server.join().unwrap();
    }

    #[test]
    fn success_without_ids_is_rejected() {
        let (endpoint, server) = serve_once("HTTP/1.1 200 OK", "{}", Duration::ZERO);
        let mut publisher = PubSubPublisher::connect(&config(&endpoint, 5.0)).unwrap();

        assert!(matches!(
            publisher.publish(&event()),
            Err(PublishError::Rejected { status: 200, .. })
        ));
        server.join().unwrap();
    }

    #[test]
    fn slow_server_times_out() {
        let (endpoint, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"messageIds":["1"]}"#,
            Duration::from_millis(1500),
        );
        let mut publisher = PubSubPublisher::connect(&config(&endpoint, 0.2)).unwrap();

        assert!(matches!(
            publisher.publish(&event()),
            Err(PublishError::Timeout(_))
        ));
        server.join().unwrap();
    }
}
