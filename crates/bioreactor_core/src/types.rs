//! Tipos de dados do biorreator: leituras, setpoints, tolerâncias e estado
//! de conexão.
//!
//! Os nomes no fio seguem o payload JSON do controlador (`pH`, `receivedAt`).

use serde::{Deserialize, Serialize};
use std::fmt;

// ──────────────────────────────────────────────
// Leitura
// ──────────────────────────────────────────────

/// Uma leitura de telemetria aceita pelo normalizador.
///
/// Canais ausentes no payload ficam `None` (não zero), para que o painel
/// diferencie "sem dado" de "leitura zero".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    /// Temperatura (°C)
    pub temp: Option<f64>,
    /// Agitação (RPM)
    pub rpm: Option<f64>,
    /// pH
    #[serde(rename = "pH")]
    pub ph: Option<f64>,
    /// Instante da amostra declarado pelo produtor (epoch ms)
    pub timestamp: i64,
    /// Instante de chegada local (epoch ms), nunca vindo do remetente
    #[serde(rename = "receivedAt")]
    pub received_at: i64,
}

impl Reading {
    /// Valor do canal pedido.
    pub fn channel(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::Temp => self.temp,
            Channel::Rpm => self.rpm,
            Channel::Ph => self.ph,
        }
    }
}

// ──────────────────────────────────────────────
// Canais controlados
// ──────────────────────────────────────────────

/// Variáveis controladas do biorreator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Temp,
    Rpm,
    Ph,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Temp, Channel::Rpm, Channel::Ph];

    /// Nome do campo no payload JSON.
    pub fn key(self) -> &'static str {
        match self {
            Channel::Temp => "temp",
            Channel::Rpm => "rpm",
            Channel::Ph => "pH",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Channel::Temp => "Temperatura",
            Channel::Rpm => "RPM",
            Channel::Ph => "pH",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Channel::Temp => "°C",
            Channel::Rpm => " RPM",
            Channel::Ph => "",
        }
    }

    /// Casas decimais usadas na exibição.
    pub fn precision(self) -> usize {
        match self {
            Channel::Temp => 1,
            Channel::Rpm => 0,
            Channel::Ph => 2,
        }
    }

    /// Aceita `temp`, `rpm` e `pH` (sem diferenciar maiúsculas).
    pub fn from_key(key: &str) -> Option<Channel> {
        match key.to_ascii_lowercase().as_str() {
            "temp" => Some(Channel::Temp),
            "rpm" => Some(Channel::Rpm),
            "ph" => Some(Channel::Ph),
            _ => None,
        }
    }
}

// ──────────────────────────────────────────────
// Setpoints
// ──────────────────────────────────────────────

/// Alvos de operação, sempre completos.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Setpoints {
    pub temp: f64,
    pub rpm: f64,
    #[serde(rename = "pH")]
    pub ph: f64,
}

impl Default for Setpoints {
    fn default() -> Self {
        Self {
            temp: 30.0,
            rpm: 1000.0,
            ph: 5.0,
        }
    }
}

impl Setpoints {
    pub fn channel(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Temp => self.temp,
            Channel::Rpm => self.rpm,
            Channel::Ph => self.ph,
        }
    }

    /// Aplica um patch parcial e retorna o novo valor completo.
    pub fn merged(&self, patch: &SetpointsPatch) -> Setpoints {
        Setpoints {
            temp: patch.temp.unwrap_or(self.temp),
            rpm: patch.rpm.unwrap_or(self.rpm),
            ph: patch.ph.unwrap_or(self.ph),
        }
    }
}

/// Subconjunto de setpoints pedido pelo operador.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SetpointsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpm: Option<f64>,
    #[serde(rename = "pH", default, skip_serializing_if = "Option::is_none")]
    pub ph: Option<f64>,
}

impl SetpointsPatch {
    pub fn is_empty(&self) -> bool {
        self.temp.is_none() && self.rpm.is_none() && self.ph.is_none()
    }

    fn set(&mut self, channel: Channel, value: f64) {
        match channel {
            Channel::Temp => self.temp = Some(value),
            Channel::Rpm => self.rpm = Some(value),
            Channel::Ph => self.ph = Some(value),
        }
    }

    pub fn with(mut self, channel: Channel, value: f64) -> Self {
        self.set(channel, value);
        self
    }
}

// ──────────────────────────────────────────────
// Tolerâncias
// ──────────────────────────────────────────────

/// Desvio absoluto permitido por canal. Constante, vem da configuração.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToleranceSpec {
    pub temp: f64,
    pub rpm: f64,
    #[serde(rename = "pH")]
    pub ph: f64,
}

impl Default for ToleranceSpec {
    fn default() -> Self {
        Self {
            temp: 0.5,
            rpm: 20.0,
            ph: 0.1,
        }
    }
}

impl ToleranceSpec {
    pub fn channel(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Temp => self.temp,
            Channel::Rpm => self.rpm,
            Channel::Ph => self.ph,
        }
    }
}

// ──────────────────────────────────────────────
// Estado de conexão
// ──────────────────────────────────────────────

/// Estado do ciclo de vida do transporte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Error => "error",
        }
    }

    /// Só `Connected` permite publicar.
    pub fn is_live(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_setpoints_are_canonical() {
        let sp = Setpoints::default();
        assert_eq!(sp, Setpoints { temp: 30.0, rpm: 1000.0, ph: 5.0 });
    }

    #[test]
    fn merged_keeps_unspecified_fields() {
        let sp = Setpoints::default();
        let patch = SetpointsPatch::default().with(Channel::Temp, 31.0);
        assert_eq!(sp.merged(&patch), Setpoints { temp: 31.0, rpm: 1000.0, ph: 5.0 });
    }

    #[test]
    fn reading_uses_wire_names() {
        let reading = Reading {
            temp: Some(30.1),
            rpm: None,
            ph: Some(5.05),
            timestamp: 1_700_000_000_000,
            received_at: 1_700_000_000_500,
        };
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["pH"], 5.05);
        assert_eq!(json["receivedAt"], 1_700_000_000_500_i64);
        assert!(json["rpm"].is_null());
    }

    #[test]
    fn channel_keys_round_trip() {
        for channel in Channel::ALL {
            assert_eq!(Channel::from_key(channel.key()), Some(channel));
        }
        assert_eq!(Channel::from_key("PH"), Some(Channel::Ph));
        assert_eq!(Channel::from_key("flow"), None);
    }

    #[test]
    fn connection_state_labels() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
        assert!(ConnectionState::Connected.is_live());
        assert!(!ConnectionState::Error.is_live());
    }
}
