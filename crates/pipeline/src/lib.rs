//! # Monitor Pipeline
//!
//! Núcleo concorrente do Event Monitor: lê o sensor one-wire (ou o
//! simulado), numera cada leitura como evento e o publica no Pub/Sub ou,
//! na falha, grava no spool JSONL local.
//!
//! ## Threads
//! - `sampling` – [`sampling::SamplingLoop`], produz eventos na fila
//! - `delivery` – [`delivery::DeliveryLoop`], consome a fila
//! - shell – drena [`notify::NotificationReceiver`] e comanda o [`Monitor`]

pub mod control;
pub mod delivery;
pub mod display;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod publisher;
pub mod sampling;
pub mod sensor;
pub mod spool;
pub mod w1_therm;

pub use control::ModeFlags;
pub use display::DisplayState;
pub use monitor::{Monitor, MonitorError};
pub use notify::NotificationReceiver;
