//! Driver MQTT (rumqttc) – thread de rede que traduz notificações do broker
//! em [`TransportEvent`]s e os envia por channel ao consumidor.
//!
//! Política de retry fica toda aqui: período fixo entre tentativas e
//! timeout de conexão, ambos do [`BrokerConfig`]. O núcleo só reflete os
//! eventos.

use crate::config::{BrokerConfig, Scheme};
use crate::transport::{Capability, Connector, Session, Transport, TransportError, TransportEvent};
use crossbeam_channel::{Sender, TrySendError, bounded};
use rumqttc::{Client, Event, MqttOptions, NetworkOptions, Packet, QoS};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Capacidade do channel de eventos.
const EVENT_BUFFER: usize = 256;
/// Capacidade da fila de requisições do cliente rumqttc.
const REQUEST_CAP: usize = 32;
/// Granularidade da espera entre reconexões (para reagir ao close).
const SLEEP_STEP: Duration = Duration::from_millis(100);

/// Monta as opções do cliente a partir da configuração do broker.
pub fn options(broker: &BrokerConfig) -> Result<MqttOptions, TransportError> {
    let endpoint = broker
        .endpoint()
        .map_err(|e| TransportError::Unavailable(e.to_string()))?;

    let mut opts = if endpoint.scheme.is_websocket() {
        MqttOptions::new(&broker.client_id, endpoint.url(), endpoint.port)
    } else {
        MqttOptions::new(&broker.client_id, &endpoint.host, endpoint.port)
    };
    opts.set_keep_alive(Duration::from_secs(broker.keep_alive_secs.max(1)));
    opts.set_clean_session(true);

    match endpoint.scheme {
        Scheme::Mqtt => {}
        Scheme::Mqtts => {
            opts.set_transport(rumqttc::Transport::tls_with_default_config());
        }
        Scheme::Ws => {
            opts.set_transport(rumqttc::Transport::Ws);
        }
        Scheme::Wss => {
            opts.set_transport(rumqttc::Transport::wss_with_default_config());
        }
    }

    if let Some((user, pass)) = broker.credentials() {
        opts.set_credentials(user, pass);
    }

    Ok(opts)
}

/// Traduz uma notificação do rumqttc em evento do núcleo.
pub fn translate(event: Event) -> Option<TransportEvent> {
    match event {
        Event::Incoming(Packet::ConnAck(_)) => Some(TransportEvent::Connect),
        Event::Incoming(Packet::Publish(p)) => Some(TransportEvent::Message {
            topic: p.topic,
            payload: p.payload.to_vec(),
        }),
        Event::Incoming(Packet::Disconnect) => Some(TransportEvent::Close),
        _ => None,
    }
}

// ──────────────────────────────────────────────
// Conector
// ──────────────────────────────────────────────

/// Abre sessões MQTT reais.
#[derive(Debug, Clone, Copy, Default)]
pub struct MqttConnector;

impl Connector for MqttConnector {
    fn capability(&self, broker: &BrokerConfig) -> Capability {
        match broker.endpoint() {
            Ok(_) => Capability::Available,
            Err(e) => Capability::Unavailable(e.to_string()),
        }
    }

    fn open(&self, broker: &BrokerConfig) -> Result<Session, TransportError> {
        let opts = options(broker)?;
        let (client, mut connection) = Client::new(opts, REQUEST_CAP);

        let mut net = NetworkOptions::new();
        net.set_connection_timeout(broker.connect_timeout_ms.div_ceil(1000).max(1));
        connection.eventloop.set_network_options(net);

        let (tx, rx) = bounded::<TransportEvent>(EVENT_BUFFER);
        let stop = Arc::new(AtomicBool::new(false));
        let reconnect_period = Duration::from_millis(broker.reconnect_period_ms);

        let thread_stop = Arc::clone(&stop);
        std::thread::Builder::new()
            .name("mqtt-driver".into())
            .spawn(move || driver_loop(connection.iter(), &tx, &thread_stop, reconnect_period))
            .map_err(|e| TransportError::Unavailable(format!("falha ao criar thread de rede: {e}")))?;

        Ok(Session {
            transport: Box::new(MqttTransport {
                client,
                stop,
                closed: false,
            }),
            events: rx,
        })
    }
}

/// Consome as notificações do rumqttc (`Connection::iter`) até o stop ou
/// até o consumidor largar o channel.
fn driver_loop<E: fmt::Display>(
    notifications: impl IntoIterator<Item = Result<Event, E>>,
    tx: &Sender<TransportEvent>,
    stop: &AtomicBool,
    reconnect_period: Duration,
) {
    for notification in notifications {
        if stop.load(Ordering::SeqCst) {
            break;
        }

        match notification {
            Ok(event) => {
                let Some(event) = translate(event) else {
                    continue;
                };
                let delivered = match event {
                    // Non-blocking: se o consumidor está lento, descarta telemetria
                    TransportEvent::Message { .. } => match tx.try_send(event) {
                        Ok(()) => true,
                        Err(TrySendError::Full(_)) => {
                            debug!("Channel cheio, descartando mensagem");
                            true
                        }
                        Err(TrySendError::Disconnected(_)) => false,
                    },
                    other => tx.send(other).is_ok(),
                };
                if !delivered {
                    break;
                }
            }
            Err(e) => {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                warn!("Conexão MQTT falhou: {e}. Tentando novamente em {reconnect_period:?}...");
                if tx.send(TransportEvent::Error(e.to_string())).is_err()
                    || tx.send(TransportEvent::Close).is_err()
                {
                    break;
                }
                if !sleep_unless_stopped(reconnect_period, stop) {
                    break;
                }
                if tx.send(TransportEvent::Reconnect).is_err() {
                    break;
                }
            }
        }
    }
    info!("Thread MQTT finalizada");
}

/// Dorme `total`, acordando cedo se `stop` for sinalizado. Retorna `false` se parou.
fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) -> bool {
    let mut slept = Duration::ZERO;
    while slept < total {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let step = SLEEP_STEP.min(total - slept);
        std::thread::sleep(step);
        slept += step;
    }
    !stop.load(Ordering::SeqCst)
}

// ──────────────────────────────────────────────
// Handle
// ──────────────────────────────────────────────

struct MqttTransport {
    client: Client,
    stop: Arc<AtomicBool>,
    closed: bool,
}

impl Transport for MqttTransport {
    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| TransportError::Subscribe(e.to_string()))
    }

    fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| TransportError::Publish(e.to_string()))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.stop.store(true, Ordering::SeqCst);
        if let Err(e) = self.client.try_disconnect() {
            debug!("Disconnect não enviado: {e}");
        }
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use rumqttc::{ConnAck, ConnectReturnCode, Publish};
    use std::time::Instant;

    #[test]
    fn options_for_secure_websocket() {
        let broker = BrokerConfig::default();
        let opts = options(&broker).unwrap();
        assert_eq!(
            opts.broker_address(),
            ("wss://broker.hivemq.com:8884/mqtt".to_string(), 8884)
        );
        assert_eq!(opts.keep_alive(), Duration::from_secs(30));
    }

    #[test]
    fn options_for_plain_tcp() {
        let broker = BrokerConfig {
            url: "mqtt://localhost:1884".into(),
            ..Default::default()
        };
        let opts = options(&broker).unwrap();
        assert_eq!(opts.broker_address(), ("localhost".to_string(), 1884));
    }

    #[test]
    fn invalid_url_is_unavailable() {
        let broker = BrokerConfig {
            url: "not-a-url".into(),
            ..Default::default()
        };
        assert!(matches!(options(&broker), Err(TransportError::Unavailable(_))));
        assert!(matches!(
            MqttConnector.capability(&broker),
            Capability::Unavailable(_)
        ));
    }

    #[test]
    fn translates_broker_notifications() {
        let connack = Event::Incoming(Packet::ConnAck(ConnAck::new(ConnectReturnCode::Success, false)));
        assert_eq!(translate(connack), Some(TransportEvent::Connect));

        let publish = Event::Incoming(Packet::Publish(Publish::new(
            "bioreactor/28/telemetry",
            QoS::AtMostOnce,
            br#"{"temp":30}"#.to_vec(),
        )));
        assert_eq!(
            translate(publish),
            Some(TransportEvent::Message {
                topic: "bioreactor/28/telemetry".into(),
                payload: br#"{"temp":30}"#.to_vec(),
            })
        );

        assert_eq!(translate(Event::Incoming(Packet::Disconnect)), Some(TransportEvent::Close));
        assert_eq!(translate(Event::Incoming(Packet::PingResp)), None);
    }

    #[test]
    fn sleep_stops_early() {
        let stop = AtomicBool::new(true);
        assert!(!sleep_unless_stopped(Duration::from_secs(5), &stop));
        let go = AtomicBool::new(false);
        assert!(sleep_unless_stopped(Duration::from_millis(1), &go));
    }

    fn connack() -> Result<Event, String> {
        Ok(Event::Incoming(Packet::ConnAck(ConnAck::new(ConnectReturnCode::Success, false))))
    }

    #[test]
    fn driver_reports_error_close_then_reconnect_after_period() {
        let (tx, rx) = unbounded();
        let stop = AtomicBool::new(false);
        let period = Duration::from_millis(30);
        let notifications = vec![
            connack(),
            Err("connection refused".to_string()),
            connack(),
        ];

        let started = Instant::now();
        driver_loop(notifications, &tx, &stop, period);
        assert!(started.elapsed() >= period);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                TransportEvent::Connect,
                TransportEvent::Error("connection refused".into()),
                TransportEvent::Close,
                TransportEvent::Reconnect,
                TransportEvent::Connect,
            ]
        );
    }

    #[test]
    fn driver_stops_without_reconnect_when_closed() {
        let (tx, rx) = unbounded();
        let stop = AtomicBool::new(true);
        driver_loop(
            vec![Err("closed".to_string()), connack()],
            &tx,
            &stop,
            Duration::from_secs(5),
        );
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn driver_exits_when_consumer_hangs_up() {
        let (tx, rx) = unbounded();
        drop(rx);
        let stop = AtomicBool::new(false);
        // Retornaria só depois de 5s se ignorasse o channel fechado
        let started = Instant::now();
        driver_loop(
            vec![Err("reset".to_string()), connack()],
            &tx,
            &stop,
            Duration::from_secs(5),
        );
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
