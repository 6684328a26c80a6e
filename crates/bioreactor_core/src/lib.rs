//! # Bioreactor Core
//!
//! Núcleo do painel do biorreator: cliente de telemetria em tempo real e
//! sincronização de setpoints com o controlador remoto. O transporte entra
//! pelos traits de [`transport`]; o driver rumqttc só com a feature `mqtt`.
//!
//! ## Módulos
//! - [`types`] – Leitura, setpoints, tolerâncias e estado de conexão
//! - [`protocol`] – Mensagens JSON (normalização de telemetria, setpoints)
//! - [`tolerance`] – Avaliação de desvio vs. setpoint
//! - [`history`] – Histórico rolante para gráficos
//! - [`pipeline`] – Normalizador + histórico + leitura atual
//! - [`setpoints`] – Merge e publicação de setpoints
//! - [`transport`] – Contratos do transporte pub/sub
//! - [`connection`] – Máquina de estados da conexão
//! - [`config`] – Configuração unificada via TOML
//! - `mqtt` – Driver rumqttc (feature `mqtt`)

pub mod types;
pub mod protocol;
pub mod tolerance;
pub mod history;
pub mod pipeline;
pub mod setpoints;
pub mod transport;
pub mod connection;
pub mod config;
#[cfg(feature = "mqtt")]
pub mod mqtt;

// Re-exports convenientes
pub use types::{Channel, ConnectionState, Reading, Setpoints, SetpointsPatch, ToleranceSpec};
pub use protocol::{decode_reading, encode_setpoints, ProtocolError};
pub use tolerance::{evaluate, evaluate_reading, DeviationVerdict, VerdictStatus};
pub use history::HistoryBuffer;
pub use setpoints::{PublishOutcome, SetpointCoordinator};
pub use connection::{ConnectionManager, DashboardSnapshot};
pub use config::AppConfig;
