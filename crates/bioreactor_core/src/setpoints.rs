//! Coordenação de setpoints: merge local + publicação para o controlador.

use crate::protocol::encode_setpoints;
use crate::transport::TransportError;
use crate::types::{Setpoints, SetpointsPatch};
use tracing::{error, info, warn};

/// Canal de saída usado pelo coordenador.
pub trait Publisher {
    fn is_connected(&self) -> bool;
    fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;
}

/// O que aconteceu com um pedido de publicação.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// Transporte offline; nada foi enviado nem enfileirado.
    Skipped,
    /// Transporte recusou o envio; estado local mantido.
    Failed(String),
    /// Gerenciador já descartado; nada foi alterado.
    Disposed,
}

/// Dono dos últimos setpoints conhecidos.
#[derive(Debug, Clone)]
pub struct SetpointCoordinator {
    current: Setpoints,
    topic: String,
}

impl SetpointCoordinator {
    pub fn new(defaults: Setpoints, topic: impl Into<String>) -> Self {
        Self {
            current: defaults,
            topic: topic.into(),
        }
    }

    pub fn current(&self) -> Setpoints {
        self.current
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Mescla o patch nos setpoints atuais e retorna o valor completo.
    pub fn merge(&mut self, patch: &SetpointsPatch) -> Setpoints {
        self.current = self.current.merged(patch);
        self.current
    }

    /// Publica `merged` se o transporte estiver conectado.
    ///
    /// Falhas não desfazem o merge local e não geram retry.
    pub fn request_publish(&self, merged: &Setpoints, link: &mut dyn Publisher) -> PublishOutcome {
        if !link.is_connected() {
            warn!("Setpoints não enviados: MQTT desconectado (mantidos localmente)");
            return PublishOutcome::Skipped;
        }

        let payload = match encode_setpoints(merged) {
            Ok(p) => p,
            Err(e) => {
                error!("Erro ao serializar setpoints: {e}");
                return PublishOutcome::Failed(e.to_string());
            }
        };

        match link.publish(&self.topic, payload) {
            Ok(()) => {
                info!(
                    "Setpoints → {} | temp {:.1} | rpm {:.0} | pH {:.2}",
                    self.topic, merged.temp, merged.rpm, merged.ph
                );
                PublishOutcome::Published
            }
            Err(e) => {
                warn!("Falha ao publicar setpoints: {e}");
                PublishOutcome::Failed(e.to_string())
            }
        }
    }
}
