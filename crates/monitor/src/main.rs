//! # Bioreactor Monitor
//!
//! Painel de console do biorreator: recebe telemetria via MQTT, mostra os
//! canais contra setpoints/tolerâncias e envia novos setpoints digitados
//! pelo operador.
//!
//! ## Uso
//! ```bash
//! bioreactor_monitor                         # config.toml ao lado do executável
//! bioreactor_monitor --config ./config.toml
//! bioreactor_monitor --subsystem reactor-b   # tópicos escopados
//! bioreactor_monitor --offline               # sem transporte (modo degradado)
//! ```
//!
//! Credenciais do broker: `BIOREACTOR_MQTT_USERNAME` / `BIOREACTOR_MQTT_PASSWORD`.

mod commands;
mod panels;

use bioreactor_core::config::AppConfig;
use bioreactor_core::mqtt::MqttConnector;
use bioreactor_core::transport::NoTransport;
use bioreactor_core::{ConnectionManager, PublishOutcome, Reading};
use commands::{Command, HELP};
use crossbeam_channel::RecvTimeoutError;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

/// Intervalo máximo entre drenagens dos eventos do transporte.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> ExitCode {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let offline = args.iter().any(|a| a == "--offline");

    // ── Config ──
    let config_path = arg_value(&args, "--config")
        .map(PathBuf::from)
        .unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&config_path);

    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    config.apply_env_overrides();
    if let Some(subsystem) = arg_value(&args, "--subsystem") {
        config.topics.subsystem = subsystem;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Configuração inválida: {e}");
        }
        return ExitCode::FAILURE;
    }

    let tolerances = config.tolerances;

    // ── Conexão ──
    let mut manager = ConnectionManager::new(config);
    if offline {
        manager.start(&NoTransport {
            reason: "executado com --offline".into(),
        });
    } else {
        manager.start(&MqttConnector);
    }

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   🧪 BIOREACTOR MONITOR");
    println!("══════════════════════════════════════════════");
    println!("  Broker:     {}", manager.config().broker.url);
    println!("  Telemetria: {}", manager.telemetry_topic());
    println!("  Setpoints:  {}", manager.config().topics.setpoints_topic());
    println!("  {HELP}");
    println!("══════════════════════════════════════════════");
    println!();

    let input = commands::spawn_stdin_thread();
    let mut last_state = manager.state();
    let mut last_reading: Option<Reading> = None;

    // ── Loop principal ──
    loop {
        manager.poll();

        let state = manager.state();
        if state != last_state {
            info!("Conexão: {last_state} → {state}");
            last_state = state;
        }

        if manager.current_reading() != last_reading.as_ref() {
            last_reading = manager.current_reading().cloned();
            if let Some(reading) = &last_reading {
                println!(
                    "{}",
                    panels::render_reading(reading, &manager.setpoints(), &tolerances)
                );
            }
        }

        match input.recv_timeout(POLL_INTERVAL) {
            Ok(line) => match commands::parse_command(&line) {
                Ok(Command::Setpoints(patch)) => {
                    let outcome = manager.send_setpoints(patch);
                    let sp = manager.setpoints();
                    let note = match outcome {
                        PublishOutcome::Published => "publicados",
                        PublishOutcome::Skipped => "mantidos localmente (offline)",
                        PublishOutcome::Failed(_) => "falha no envio, mantidos localmente",
                        PublishOutcome::Disposed => "ignorados",
                    };
                    println!(
                        "Setpoints {note}: temp {:.1} | rpm {:.0} | pH {:.2}",
                        sp.temp, sp.rpm, sp.ph
                    );
                }
                Ok(Command::Status) => {
                    let snapshot = manager.snapshot();
                    println!("{}", panels::render_status(&snapshot, &tolerances, manager.now_ms()));
                }
                Ok(Command::History) => {
                    println!("{}", panels::render_history(manager.history()));
                }
                Ok(Command::Help) => println!("{HELP}"),
                Ok(Command::Quit) => break,
                Err(msg) => println!("{msg}. {HELP}"),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("stdin encerrado");
                break;
            }
        }
    }

    manager.dispose();
    ExitCode::SUCCESS
}

/// Valor após uma flag (`--flag valor`).
fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
