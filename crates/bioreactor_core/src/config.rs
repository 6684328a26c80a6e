//! Configuração unificada via TOML.
//!
//! Credenciais do broker nunca ficam no código: vêm do `config.toml` (usuário)
//! ou das variáveis de ambiente `BIOREACTOR_MQTT_USERNAME` /
//! `BIOREACTOR_MQTT_PASSWORD`. A senha nunca é gravada por [`AppConfig::save`].

use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::protocol::TimestampUnit;
use crate::types::{Channel, Setpoints, ToleranceSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ENV_USERNAME: &str = "BIOREACTOR_MQTT_USERNAME";
pub const ENV_PASSWORD: &str = "BIOREACTOR_MQTT_PASSWORD";
pub const ENV_SUBSYSTEM: &str = "BIOREACTOR_SUBSYSTEM";

/// Marcador substituído pelo id do subsistema nos tópicos escopados.
const SUBSYSTEM_PLACEHOLDER: &str = "{subsystem}";

/// Erros de configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("URL do broker inválida: {0}")]
    InvalidBrokerUrl(String),

    #[error("Esquema não suportado: {0} (use mqtt, mqtts, ws ou wss)")]
    UnsupportedScheme(String),
}

// ──────────────────────────────────────────────
// Broker
// ──────────────────────────────────────────────

/// Conexão com o broker MQTT.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// URL do broker (ex: "wss://broker.hivemq.com:8884/mqtt")
    pub url: String,
    pub client_id: String,
    /// Usuário (vazio = anônimo)
    pub username: String,
    /// Senha – só via ambiente ou arquivo, nunca serializada
    #[serde(skip_serializing)]
    pub password: String,
    /// Timeout de conexão (ms)
    pub connect_timeout_ms: u64,
    /// Período fixo entre tentativas de reconexão (ms)
    pub reconnect_period_ms: u64,
    pub keep_alive_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: "wss://broker.hivemq.com:8884/mqtt".into(),
            client_id: "bioreactor-dashboard".into(),
            username: String::new(),
            password: String::new(),
            connect_timeout_ms: 4000,
            reconnect_period_ms: 2000,
            keep_alive_secs: 30,
        }
    }
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("url", &self.url)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("reconnect_period_ms", &self.reconnect_period_ms)
            .field("keep_alive_secs", &self.keep_alive_secs)
            .finish()
    }
}

impl BrokerConfig {
    /// Credenciais, se houver usuário configurado.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.username.is_empty() {
            None
        } else {
            Some((self.username.as_str(), self.password.as_str()))
        }
    }

    pub fn endpoint(&self) -> Result<BrokerEndpoint, ConfigError> {
        BrokerEndpoint::parse(&self.url)
    }
}

/// Esquema de transporte do broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Mqtt,
    Mqtts,
    Ws,
    Wss,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Mqtt => 1883,
            Scheme::Mqtts => 8883,
            Scheme::Ws => 80,
            Scheme::Wss => 443,
        }
    }

    pub fn is_websocket(self) -> bool {
        matches!(self, Scheme::Ws | Scheme::Wss)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Mqtt => "mqtt",
            Scheme::Mqtts => "mqtts",
            Scheme::Ws => "ws",
            Scheme::Wss => "wss",
        }
    }
}

/// URL do broker já validada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    /// Caminho do websocket (ex: "/mqtt"); vazio para TCP
    pub path: String,
}

impl BrokerEndpoint {
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| ConfigError::InvalidBrokerUrl(url.to_string()))?;
        let scheme = match scheme.to_ascii_lowercase().as_str() {
            "mqtt" | "tcp" => Scheme::Mqtt,
            "mqtts" | "ssl" => Scheme::Mqtts,
            "ws" => Scheme::Ws,
            "wss" => Scheme::Wss,
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        };

        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, ""),
        };
        let invalid = || ConfigError::InvalidBrokerUrl(url.to_string());
        // IPv6 vem entre colchetes: "[::1]" ou "[::1]:8884"
        let (host, port) = match authority.strip_prefix('[') {
            Some(bracketed) => {
                let (host, tail) = bracketed.split_once(']').ok_or_else(invalid)?;
                match tail {
                    "" => (host, None),
                    _ => (host, Some(tail.strip_prefix(':').ok_or_else(invalid)?)),
                }
            }
            None => match authority.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            },
        };
        let port = match port {
            Some(p) => p.parse::<u16>().map_err(|_| invalid())?,
            None => scheme.default_port(),
        };
        if host.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    /// URL completa, no formato esperado pelo cliente websocket.
    pub fn url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme.as_str(), self.host_for_url(), self.port, self.path)
    }

    /// Host pronto para URL (IPv6 volta aos colchetes).
    pub fn host_for_url(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

// ──────────────────────────────────────────────
// Tópicos
// ──────────────────────────────────────────────

/// Seleção de tópicos (padrão ou escopado por subsistema).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Id do subsistema (vazio = nenhum)
    pub subsystem: String,
    pub telemetry_default: String,
    pub setpoints_default: String,
    /// Modelo com `{subsystem}`
    pub telemetry_scoped: String,
    /// Modelo com `{subsystem}`
    pub setpoints_scoped: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            subsystem: String::new(),
            telemetry_default: "bioreactor/28/telemetry".into(),
            setpoints_default: "bioreactor/28/setpoints".into(),
            telemetry_scoped: "bioreactor/telemetry/{subsystem}".into(),
            setpoints_scoped: "bioreactor/{subsystem}/setpoints".into(),
        }
    }
}

impl TopicConfig {
    pub fn subsystem(&self) -> Option<&str> {
        let s = self.subsystem.trim();
        if s.is_empty() { None } else { Some(s) }
    }

    pub fn telemetry_topic(&self) -> String {
        self.select(&self.telemetry_scoped, &self.telemetry_default)
    }

    pub fn setpoints_topic(&self) -> String {
        self.select(&self.setpoints_scoped, &self.setpoints_default)
    }

    fn select(&self, scoped: &str, default: &str) -> String {
        match self.subsystem() {
            Some(id) => scoped.replace(SUBSYSTEM_PLACEHOLDER, id),
            None => default.to_string(),
        }
    }
}

// ──────────────────────────────────────────────
// Histórico e simulador
// ──────────────────────────────────────────────

/// Configuração de histórico.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// Configuração do simulador.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub client_id: String,
    /// Intervalo de publicação em segundos
    pub interval_secs: f64,
    /// Unidade do timestamp publicado
    pub timestamp_unit: TimestampUnit,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            client_id: "bioreactor-simulator".into(),
            interval_secs: 1.0,
            timestamp_unit: TimestampUnit::Seconds,
        }
    }
}

// ──────────────────────────────────────────────
// Raiz
// ──────────────────────────────────────────────

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub topics: TopicConfig,
    /// Setpoints canônicos no início do processo
    pub setpoints: Setpoints,
    pub tolerances: ToleranceSpec,
    pub history: HistoryConfig,
    pub simulator: SimulatorConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML (sem a senha).
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Aplica credenciais e subsistema do ambiente do processo.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Aplica overrides a partir de uma função de lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(user) = lookup(ENV_USERNAME) {
            self.broker.username = user;
        }
        if let Some(pass) = lookup(ENV_PASSWORD) {
            self.broker.password = pass;
        }
        if let Some(subsystem) = lookup(ENV_SUBSYSTEM) {
            info!("Subsistema definido pelo ambiente: {subsystem}");
            self.topics.subsystem = subsystem;
        }
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Err(e) = self.broker.endpoint() {
            errors.push(e.to_string());
        }
        if self.broker.connect_timeout_ms == 0 {
            errors.push("Timeout de conexão não pode ser 0".into());
        }
        if self.broker.reconnect_period_ms == 0 {
            errors.push("Período de reconexão não pode ser 0".into());
        }
        if !self.broker.username.is_empty() && self.broker.password.is_empty() {
            errors.push(format!("Usuário definido sem senha (defina {ENV_PASSWORD})"));
        }
        if let Some(id) = self.topics.subsystem() {
            if id.contains(['/', '+', '#']) {
                errors.push(format!("Subsistema inválido: {id:?}"));
            }
        }
        if self.history.capacity == 0 {
            errors.push("Capacidade do histórico não pode ser 0".into());
        }
        for channel in Channel::ALL {
            let setpoint = self.setpoints.channel(channel);
            if !setpoint.is_finite() {
                errors.push(format!("Setpoint de {} inválido: {setpoint}", channel.key()));
            }
            let tol = self.tolerances.channel(channel);
            if !tol.is_finite() || tol < 0.0 {
                errors.push(format!("Tolerância de {} inválida: {tol}", channel.key()));
            }
        }
        let interval = self.simulator.interval_secs;
        if !(0.05..=60.0).contains(&interval) {
            errors.push(format!(
                "Intervalo do simulador inválido: {} (0.05–60.0)",
                self.simulator.interval_secs
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "Erros: {:?}", errors);
    }

    #[test]
    fn roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.broker.url, parsed.broker.url);
        assert_eq!(config.setpoints, parsed.setpoints);
        assert_eq!(config.simulator.timestamp_unit, parsed.simulator.timestamp_unit);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let partial = r#"
[setpoints]
rpm = 600.0

[topics]
subsystem = "reactor-b"
"#;
        let config: AppConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.setpoints.rpm, 600.0);
        // Outros campos devem ter valor padrão
        assert_eq!(config.setpoints.temp, 30.0);
        assert_eq!(config.broker.reconnect_period_ms, 2000);
        assert_eq!(config.history.capacity, 200);
        assert_eq!(config.topics.telemetry_topic(), "bioreactor/telemetry/reactor-b");
    }

    #[test]
    fn password_is_never_serialized() {
        let mut config = AppConfig::default();
        config.broker.username = "operator".into();
        config.broker.password = "s3cret".into();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(!toml_str.contains("s3cret"));
        assert!(!format!("{:?}", config.broker).contains("s3cret"));
    }

    #[test]
    fn env_overrides_credentials_and_subsystem() {
        let mut config = AppConfig::default();
        config.apply_overrides_from(|key| match key {
            ENV_USERNAME => Some("operator".into()),
            ENV_PASSWORD => Some("s3cret".into()),
            ENV_SUBSYSTEM => Some("ph-loop".into()),
            _ => None,
        });
        assert_eq!(config.broker.credentials(), Some(("operator", "s3cret")));
        assert_eq!(config.topics.setpoints_topic(), "bioreactor/ph-loop/setpoints");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn username_without_password_is_flagged() {
        let mut config = AppConfig::default();
        config.broker.username = "operator".into();
        assert_eq!(config.validate().len(), 1);
    }

    #[test]
    fn default_topics_without_subsystem() {
        let topics = TopicConfig {
            subsystem: "   ".into(),
            ..Default::default()
        };
        assert_eq!(topics.telemetry_topic(), "bioreactor/28/telemetry");
        assert_eq!(topics.setpoints_topic(), "bioreactor/28/setpoints");
    }

    #[test]
    fn parses_websocket_endpoint() {
        let ep = BrokerEndpoint::parse("wss://broker.hivemq.com:8884/mqtt").unwrap();
        assert_eq!(ep.scheme, Scheme::Wss);
        assert_eq!(ep.host, "broker.hivemq.com");
        assert_eq!(ep.port, 8884);
        assert_eq!(ep.path, "/mqtt");
        assert_eq!(ep.url(), "wss://broker.hivemq.com:8884/mqtt");
    }

    #[test]
    fn endpoint_default_ports() {
        let ep = BrokerEndpoint::parse("mqtt://localhost").unwrap();
        assert_eq!(ep.port, 1883);
        assert!(ep.path.is_empty());
        assert!(!ep.scheme.is_websocket());
    }

    #[test]
    fn parses_bracketed_ipv6_hosts() {
        let ep = BrokerEndpoint::parse("wss://[::1]/mqtt").unwrap();
        assert_eq!(ep.host, "::1");
        assert_eq!(ep.port, 443);
        assert_eq!(ep.url(), "wss://[::1]:443/mqtt");

        let ep = BrokerEndpoint::parse("mqtt://[fe80::1]:1884").unwrap();
        assert_eq!(ep.host, "fe80::1");
        assert_eq!(ep.port, 1884);

        assert!(BrokerEndpoint::parse("mqtt://[::1").is_err());
        assert!(BrokerEndpoint::parse("mqtt://[::1]1884").is_err());
        assert!(BrokerEndpoint::parse("mqtt://[]:1884").is_err());
    }

    #[test]
    fn non_finite_values_from_toml_are_rejected() {
        let config: AppConfig = toml::from_str("[simulator]\ninterval_secs = nan").unwrap();
        assert_eq!(config.validate().len(), 1);

        let config: AppConfig = toml::from_str("[setpoints]\ntemp = nan\n[tolerances]\nrpm = inf").unwrap();
        let errors = config.validate();
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("Setpoint de temp")));
        assert!(errors.iter().any(|e| e.contains("Tolerância de rpm")));

        let config: AppConfig = toml::from_str("[tolerances]\npH = -0.1").unwrap();
        assert_eq!(config.validate().len(), 1);
    }

    #[test]
    fn rejects_bad_endpoints() {
        assert!(matches!(
            BrokerEndpoint::parse("broker.hivemq.com"),
            Err(ConfigError::InvalidBrokerUrl(_))
        ));
        assert!(matches!(
            BrokerEndpoint::parse("http://broker"),
            Err(ConfigError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            BrokerEndpoint::parse("wss://:8884/mqtt"),
            Err(ConfigError::InvalidBrokerUrl(_))
        ));
        assert!(matches!(
            BrokerEndpoint::parse("wss://host:port/mqtt"),
            Err(ConfigError::InvalidBrokerUrl(_))
        ));
    }
}
