//! Máquina de estados da conexão e superfície observável do painel.
//!
//! ```text
//!              start()                  Connect
//! Disconnected ───────► Connecting ─────────────► Connected
//!      ▲                    │                        │ Reconnect
//!      │ Close / falha      │                        ▼
//!      └────────────────────┴──────────────────── Reconnecting
//!
//! Error (qualquer estado, via evento Error) não bloqueia Connect/Reconnect.
//! ```
//!
//! Todos os eventos são aplicados em série por [`ConnectionManager::poll`]
//! ou [`ConnectionManager::handle_event`]; não há locks internos.

use crate::config::AppConfig;
use crate::history::HistoryBuffer;
use crate::pipeline::{Clock, SystemClock, TelemetryPipeline};
use crate::setpoints::{PublishOutcome, Publisher, SetpointCoordinator};
use crate::tolerance::{ReadingVerdicts, evaluate_reading};
use crate::transport::{
    Capability, Connector, Transport, TransportError, TransportEvent,
};
use crate::types::{ConnectionState, Reading, Setpoints, SetpointsPatch, ToleranceSpec};
use crossbeam_channel::{Receiver, TryRecvError};
use tracing::{debug, error, info, warn};

/// Estado de link usado para publicar: estado atual + handle do transporte.
struct Link {
    state: ConnectionState,
    transport: Option<Box<dyn Transport>>,
}

impl Publisher for Link {
    fn is_connected(&self) -> bool {
        self.state.is_live() && self.transport.is_some()
    }

    fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        match self.transport.as_mut() {
            Some(t) => t.publish(topic, payload),
            None => Err(TransportError::Closed),
        }
    }
}

/// Cópia do estado observável, entregue por valor ao renderizador.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub state: ConnectionState,
    pub current: Option<Reading>,
    pub history: Vec<Reading>,
    pub setpoints: Setpoints,
    /// Motivo do modo degradado (sem transporte), se houver
    pub degraded: Option<String>,
}

impl DashboardSnapshot {
    /// Timestamp do produtor da leitura atual.
    pub fn last_update(&self) -> Option<i64> {
        self.current.as_ref().map(|r| r.timestamp)
    }

    /// Idade da leitura atual, medida pela chegada local.
    pub fn age_ms(&self, now_ms: i64) -> Option<i64> {
        self.current.as_ref().map(|r| (now_ms - r.received_at).max(0))
    }

    pub fn verdicts(&self, tolerances: &ToleranceSpec) -> ReadingVerdicts {
        evaluate_reading(self.current.as_ref(), &self.setpoints, tolerances)
    }
}

/// Dono exclusivo da sessão de transporte e do estado de conexão.
pub struct ConnectionManager {
    config: AppConfig,
    telemetry_topic: String,
    link: Link,
    events: Option<Receiver<TransportEvent>>,
    pipeline: TelemetryPipeline,
    setpoints: SetpointCoordinator,
    degraded: Option<String>,
    disposed: bool,
}

impl ConnectionManager {
    pub fn new(config: AppConfig) -> Self {
        Self::with_clock(config, Box::new(SystemClock))
    }

    pub fn with_clock(config: AppConfig, clock: Box<dyn Clock>) -> Self {
        let telemetry_topic = config.topics.telemetry_topic();
        let setpoints = SetpointCoordinator::new(config.setpoints, config.topics.setpoints_topic());
        let pipeline = TelemetryPipeline::new(clock, config.history.capacity);
        Self {
            config,
            telemetry_topic,
            link: Link {
                state: ConnectionState::Disconnected,
                transport: None,
            },
            events: None,
            pipeline,
            setpoints,
            degraded: None,
            disposed: false,
        }
    }

    // ──────────────────────────────────────────
    // Ciclo de vida
    // ──────────────────────────────────────────

    /// Abre a sessão de transporte.
    ///
    /// Sem driver utilizável o gerenciador volta a `Disconnected` e fica em
    /// modo degradado; nunca retorna erro.
    pub fn start(&mut self, connector: &dyn Connector) {
        if self.disposed {
            debug!("start() ignorado: gerenciador descartado");
            return;
        }
        if self.link.transport.is_some() {
            warn!("start() ignorado: sessão já aberta");
            return;
        }

        self.set_state(ConnectionState::Connecting);

        if let Capability::Unavailable(reason) = connector.capability(&self.config.broker) {
            self.enter_degraded(reason);
            return;
        }

        match connector.open(&self.config.broker) {
            Ok(session) => {
                info!("Conectando a {} (tópico {})", self.config.broker.url, self.telemetry_topic);
                self.link.transport = Some(session.transport);
                self.events = Some(session.events);
                self.degraded = None;
            }
            Err(e) => self.enter_degraded(e.to_string()),
        }
    }

    /// Encerra a sessão. Idempotente; depois disso nenhum evento altera estado.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.events = None;
        if let Some(mut transport) = self.link.transport.take() {
            transport.close();
            info!("Sessão MQTT encerrada");
        }
        self.link.state = ConnectionState::Disconnected;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // ──────────────────────────────────────────
    // Eventos
    // ──────────────────────────────────────────

    /// Drena os eventos pendentes do transporte. Retorna quantos foram aplicados.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let Some(rx) = self.events.as_ref() else {
                return handled;
            };
            match rx.try_recv() {
                Ok(event) => {
                    self.handle_event(event);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => return handled,
                Err(TryRecvError::Disconnected) => {
                    warn!("Driver de transporte encerrou o fluxo de eventos");
                    self.events = None;
                    if self.link.state != ConnectionState::Disconnected {
                        self.set_state(ConnectionState::Disconnected);
                    }
                    return handled;
                }
            }
        }
    }

    /// Aplica um único evento do transporte.
    pub fn handle_event(&mut self, event: TransportEvent) {
        if self.disposed {
            debug!("Evento ignorado após descarte: {event:?}");
            return;
        }

        match event {
            TransportEvent::Connect => {
                info!("Dashboard conectado ao MQTT");
                self.set_state(ConnectionState::Connected);
                self.subscribe_telemetry();
            }
            TransportEvent::Reconnect => self.set_state(ConnectionState::Reconnecting),
            TransportEvent::Close => self.set_state(ConnectionState::Disconnected),
            TransportEvent::Error(msg) => {
                warn!("Erro no transporte MQTT: {msg}");
                self.set_state(ConnectionState::Error);
            }
            TransportEvent::Message { topic, payload } => {
                if let Some(reading) = self.pipeline.ingest(&payload) {
                    debug!(
                        "← {topic} | temp {:?} | rpm {:?} | pH {:?}",
                        reading.temp, reading.rpm, reading.ph
                    );
                }
            }
        }
    }

    fn subscribe_telemetry(&mut self) {
        let topic = self.telemetry_topic.clone();
        if let Some(transport) = self.link.transport.as_mut() {
            match transport.subscribe(&topic) {
                Ok(()) => info!("Assinando telemetria em {topic}"),
                Err(e) => error!("Erro ao assinar {topic}: {e}"),
            }
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.link.state != state {
            debug!("Conexão: {} → {}", self.link.state, state);
            self.link.state = state;
        }
    }

    fn enter_degraded(&mut self, reason: String) {
        warn!("Transporte indisponível, painel em modo degradado: {reason}");
        self.degraded = Some(reason);
        self.set_state(ConnectionState::Disconnected);
    }

    // ──────────────────────────────────────────
    // Setpoints
    // ──────────────────────────────────────────

    /// Mescla o pedido do operador e publica se estiver conectado.
    ///
    /// O merge local vale mesmo offline.
    pub fn send_setpoints(&mut self, patch: SetpointsPatch) -> PublishOutcome {
        if self.disposed {
            warn!("Setpoints ignorados: gerenciador descartado");
            return PublishOutcome::Disposed;
        }
        let merged = self.setpoints.merge(&patch);
        self.setpoints.request_publish(&merged, &mut self.link)
    }

    // ──────────────────────────────────────────
    // Leitura
    // ──────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.link.state
    }

    pub fn current_reading(&self) -> Option<&Reading> {
        self.pipeline.current()
    }

    pub fn history(&self) -> &HistoryBuffer {
        self.pipeline.history()
    }

    pub fn setpoints(&self) -> Setpoints {
        self.setpoints.current()
    }

    pub fn degraded(&self) -> Option<&str> {
        self.degraded.as_deref()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn telemetry_topic(&self) -> &str {
        &self.telemetry_topic
    }

    /// Relógio local usado para carimbar leituras.
    pub fn now_ms(&self) -> i64 {
        self.pipeline.now_ms()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            state: self.link.state,
            current: self.pipeline.current().cloned(),
            history: self.pipeline.history().snapshot(),
            setpoints: self.setpoints.current(),
            degraded: self.degraded.clone(),
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
