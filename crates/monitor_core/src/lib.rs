//! # Monitor Core
//!
//! Crate compartilhada que define o modelo de eventos, os formatos de fio
//! (spool JSONL e publish Pub/Sub) e a configuração TOML do Event Monitor.
//!
//! ## Módulos
//! - [`types`] – Amostra, modo, evento e notificações para a UI
//! - [`protocol`] – Linhas de spool e corpo do publish Pub/Sub
//! - [`config`] – Configuração unificada via TOML

pub mod types;
pub mod protocol;
pub mod config;

// Re-exports convenientes
pub use types::{Event, EventType, Mode, Notification, Sample};
pub use protocol::{decode_event_line, encode_event_line};
pub use config::AppConfig;
