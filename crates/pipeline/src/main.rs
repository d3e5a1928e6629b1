//! # Event Monitor (headless)
//!
//! Shell de terminal para o pipeline: lê comandos do stdin e imprime o log
//! de mudanças (temperatura e status).
//!
//! ## Uso
//! ```bash
//! event_monitor            # espera `start`
//! event_monitor --start    # inicia a amostragem imediatamente
//! ```
//!
//! ## Comandos
//! `start`, `stop`, `sim on|off`, `publish on|off`, `status`, `quit`

use crossbeam_channel::{Receiver, select, tick, unbounded};
use monitor_core::config::AppConfig;
use monitor_pipeline::logging::init_logging;
use monitor_pipeline::{DisplayState, Monitor};
use std::io::BufRead;
use std::str::FromStr;
use tracing::{error, info};

/// Comando do shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Stop,
    Simulate(bool),
    Publish(bool),
    Status,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<String> = line.split_whitespace().map(str::to_ascii_lowercase).collect();
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        match words.as_slice() {
            ["start"] => Ok(Command::Start),
            ["stop"] => Ok(Command::Stop),
            ["status"] => Ok(Command::Status),
            ["quit"] | ["exit"] | ["q"] => Ok(Command::Quit),
            ["sim", flag] => parse_switch(flag).map(Command::Simulate),
            ["publish", flag] => parse_switch(flag).map(Command::Publish),
            _ => Err(format!("comando desconhecido: {}", line.trim())),
        }
    }
}

fn parse_switch(word: &str) -> Result<bool, String> {
    match word {
        "on" | "1" | "true" => Ok(true),
        "off" | "0" | "false" => Ok(false),
        other => Err(format!("esperado on/off, recebido {other}")),
    }
}

/// Thread que encaminha as linhas do stdin. O canal fecha no EOF.
fn spawn_stdin_reader() -> std::io::Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

fn main() {
    // ── Carregar config ──
    let config_path = AppConfig::default_path();
    let mut config = AppConfig::load(&config_path);

    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            eprintln!("Não foi possível salvar config padrão: {e}");
        }
    }

    // ── Logging ──
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Logging em arquivo desabilitado: {e}");
    }
    // Seções inválidas voltam ao padrão (os avisos saem no log)
    config.sanitize();

    let drain_interval = config.ui.drain_interval();
    let mut display = DisplayState::new(config.ui.change_log_capacity, "Stopped");

    // ── Pipeline ──
    let mut monitor = Monitor::new(config.clone());
    let notifications = monitor.notifications();

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   🌡 EVENT MONITOR – HEADLESS (Rust)");
    println!("══════════════════════════════════════════════");
    println!("  Modo:     {}", if config.sampling.simulate_at_start { "Simulated" } else { "Live" });
    println!("  Publish:  {}", if config.publisher.publish_at_start { "on" } else { "off" });
    println!("  Spool:    {}", config.spool.path.display());
    println!("  Comandos: start | stop | sim on|off | publish on|off | status | quit");
    println!("══════════════════════════════════════════════");
    println!();

    let commands = match spawn_stdin_reader() {
        Ok(rx) => rx,
        Err(e) => {
            error!("Falha ao iniciar leitura do stdin: {e}");
            return;
        }
    };

    if std::env::args().any(|a| a == "--start") {
        if let Err(e) = monitor.start() {
            error!("{e}");
        }
    }

    let ticker = tick(drain_interval);
    loop {
        let command = select! {
            recv(commands) -> line => match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some(line.parse::<Command>()),
                // EOF
                Err(_) => Some(Ok(Command::Quit)),
            },
            recv(ticker) -> _ => None,
        };

        match command {
            Some(Ok(Command::Start)) => {
                if let Err(e) = monitor.start() {
                    error!("{e}");
                }
            }
            Some(Ok(Command::Stop)) => monitor.stop(),
            Some(Ok(Command::Simulate(on))) => monitor.flags().set_simulate(on),
            Some(Ok(Command::Publish(on))) => monitor.flags().set_publish_enabled(on),
            Some(Ok(Command::Status)) => {
                println!("{}", display.temperature());
                println!("{}", display.status());
            }
            Some(Ok(Command::Quit)) => break,
            Some(Err(e)) => println!("{e}"),
            None => {}
        }

        for notification in notifications.drain() {
            let applied = display.apply_now(notification);
            if applied.force_simulate {
                monitor.flags().set_simulate(true);
            }
            if let Some(line) = applied.logged {
                println!("{line}");
            }
        }
    }

    info!("Encerrando...");
    monitor.shutdown();
    for notification in notifications.drain() {
        if let Some(line) = display.apply_now(notification).logged {
            println!("{line}");
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
