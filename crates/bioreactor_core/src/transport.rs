//! Fronteira com o transporte pub/sub.
//!
//! O driver MQTT fica atrás da feature `mqtt`; aqui só ficam os contratos que o
//! [`ConnectionManager`](crate::connection::ConnectionManager) consome:
//! eventos discretos em um channel e um handle para subscribe/publish/close.

use crate::config::BrokerConfig;
use crossbeam_channel::Receiver;

/// Evento reportado pelo transporte.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Sessão estabelecida (CONNACK).
    Connect,
    /// Tentativa de reconexão em andamento.
    Reconnect,
    /// Conexão encerrada.
    Close,
    /// Erro reportado pelo transporte; recuperável.
    Error(String),
    /// Mensagem recebida em um tópico assinado.
    Message { topic: String, payload: Vec<u8> },
}

/// Erros do transporte.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transporte indisponível: {0}")]
    Unavailable(String),

    #[error("Falha ao publicar: {0}")]
    Publish(String),

    #[error("Falha ao assinar: {0}")]
    Subscribe(String),

    #[error("Transporte já encerrado")]
    Closed,
}

/// Handle exclusivo da sessão de transporte.
pub trait Transport: Send {
    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Publicação sem bloquear; o resultado só indica se o pedido foi aceito.
    fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Encerramento gracioso. Deve ser idempotente.
    fn close(&mut self);
}

/// Resultado da verificação de capacidade feita antes de conectar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Available,
    Unavailable(String),
}

/// Sessão aberta: handle + fluxo de eventos.
pub struct Session {
    pub transport: Box<dyn Transport>,
    pub events: Receiver<TransportEvent>,
}

/// Fábrica de sessões de transporte.
pub trait Connector {
    /// Existe driver utilizável para este broker?
    fn capability(&self, broker: &BrokerConfig) -> Capability;

    fn open(&self, broker: &BrokerConfig) -> Result<Session, TransportError>;
}

/// Conector sem driver: mantém o painel em modo degradado.
#[derive(Debug, Clone)]
pub struct NoTransport {
    pub reason: String,
}

impl Connector for NoTransport {
    fn capability(&self, _broker: &BrokerConfig) -> Capability {
        Capability::Unavailable(self.reason.clone())
    }

    fn open(&self, _broker: &BrokerConfig) -> Result<Session, TransportError> {
        Err(TransportError::Unavailable(self.reason.clone()))
    }
}
