//! # Bioreactor Simulator
//!
//! Publica telemetria simulada no tópico do painel e segue os setpoints
//! publicados pelo operador. Útil para testar o monitor sem hardware.
//!
//! ## Uso
//! ```bash
//! bioreactor_simulator
//! bioreactor_simulator --config ./config.toml
//! ```

mod plant;

use bioreactor_core::config::AppConfig;
use bioreactor_core::mqtt::MqttConnector;
use bioreactor_core::pipeline::{Clock, SystemClock};
use bioreactor_core::protocol::{decode_setpoints, encode_telemetry};
use bioreactor_core::transport::{Connector, Session, TransportEvent};
use crossbeam_channel::TryRecvError;
use plant::Plant;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

fn main() -> ExitCode {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&config_path);
    config.apply_env_overrides();

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Configuração inválida: {e}");
        }
        return ExitCode::FAILURE;
    }

    let sim_cfg = &config.simulator;
    let telemetry_topic = config.topics.telemetry_topic();
    let setpoints_topic = config.topics.setpoints_topic();
    let interval = Duration::from_secs_f64(sim_cfg.interval_secs);

    // ── Sessão MQTT ──
    let mut broker = config.broker.clone();
    broker.client_id = sim_cfg.client_id.clone();
    let Session {
        mut transport,
        events,
    } = match MqttConnector.open(&broker) {
        Ok(session) => session,
        Err(e) => {
            error!("Não foi possível iniciar o transporte: {e}");
            return ExitCode::FAILURE;
        }
    };

    let clock = SystemClock;
    let mut plant = Plant::new(config.setpoints);
    let mut connected = false;

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   🧪 BIOREACTOR SIMULATOR – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Broker:     {}", broker.url);
    println!("  Telemetria: {telemetry_topic}");
    println!("  Setpoints:  {setpoints_topic}");
    println!("  Intervalo:  {:.1}s ({:?})", sim_cfg.interval_secs, sim_cfg.timestamp_unit);
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal ──
    loop {
        let cycle_start = Instant::now();

        loop {
            match events.try_recv() {
                Ok(TransportEvent::Connect) => {
                    info!("Simulador conectado ao MQTT");
                    connected = true;
                    if let Err(e) = transport.subscribe(&setpoints_topic) {
                        error!("Erro ao assinar {setpoints_topic}: {e}");
                    }
                }
                Ok(TransportEvent::Message { payload, .. }) => {
                    match decode_setpoints(&payload, &plant.setpoints()) {
                        Ok(sp) => {
                            info!(
                                "← Setpoints | temp {:.1} | rpm {:.0} | pH {:.2}",
                                sp.temp, sp.rpm, sp.ph
                            );
                            plant.set_setpoints(sp);
                        }
                        Err(e) => warn!("Setpoints inválidos: {e}"),
                    }
                }
                Ok(TransportEvent::Error(_) | TransportEvent::Close | TransportEvent::Reconnect) => {
                    connected = false;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    error!("Driver MQTT encerrado");
                    return ExitCode::FAILURE;
                }
            }
        }

        let reading = plant.step(interval.as_secs_f64(), clock.now_ms());
        if connected {
            match encode_telemetry(&reading, sim_cfg.timestamp_unit) {
                Ok(frame) => match transport.publish(&telemetry_topic, frame) {
                    Ok(()) => info!(
                        "→ {telemetry_topic} | temp {:.2} | rpm {:.0} | pH {:.3}",
                        reading.temp.unwrap_or_default(),
                        reading.rpm.unwrap_or_default(),
                        reading.ph.unwrap_or_default()
                    ),
                    Err(e) => error!("Erro ao publicar telemetria: {e}"),
                },
                Err(e) => error!("Erro ao serializar telemetria: {e}"),
            }
        }

        // Dormir pelo tempo restante do intervalo
        let elapsed = cycle_start.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }
}
