//! Protocolo de mensagens JSON trocadas com o controlador.
//!
//! Telemetria (entrada):
//!
//! ```text
//! {"temp": 30.1, "rpm": 998, "pH": 5.05, "timestamp": 1700000000}
//! ```
//!
//! - `timestamp` (ou `time`) pode vir em segundos ou milissegundos; valores
//!   abaixo de [`SECONDS_THRESHOLD`] são tratados como segundos.
//! - `receivedAt` é sempre carimbado localmente.
//!
//! Setpoints (saída): objeto completo `{"temp", "rpm", "pH"}`.

use crate::types::{Reading, Setpoints, SetpointsPatch};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Abaixo deste valor o timestamp é interpretado como epoch em segundos
/// (10 dígitos); acima, já está em milissegundos (13 dígitos).
pub const SECONDS_THRESHOLD: f64 = 1e12;

/// Erros do protocolo.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON inválido: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Payload não é um objeto JSON (recebido: {0})")]
    NotAnObject(&'static str),

    #[error("Erro de serialização: {0}")]
    Serialize(String),
}

/// Unidade do timestamp emitido por um produtor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampUnit {
    #[default]
    Seconds,
    Millis,
}

// ──────────────────────────────────────────────
// Telemetria
// ──────────────────────────────────────────────

/// Decodifica um payload bruto de telemetria em [`Reading`].
///
/// `now_ms` é o relógio local: vira `received_at` sempre e `timestamp`
/// quando o produtor não mandou um valor numérico. Os canais não passam
/// por validação de faixa aqui.
pub fn decode_reading(data: &[u8], now_ms: i64) -> Result<Reading, ProtocolError> {
    let value: Value = serde_json::from_slice(data)?;
    let Value::Object(obj) = value else {
        return Err(ProtocolError::NotAnObject(json_kind(&value)));
    };

    let raw_ts = field(&obj, "timestamp").or_else(|| field(&obj, "time"));

    Ok(Reading {
        temp: numeric(&obj, "temp"),
        rpm: numeric(&obj, "rpm"),
        ph: numeric(&obj, "pH"),
        timestamp: normalize_timestamp(raw_ts, now_ms),
        received_at: now_ms,
    })
}

/// Converte o timestamp do produtor para epoch ms.
pub fn normalize_timestamp(raw: Option<&Value>, now_ms: i64) -> i64 {
    match raw.and_then(Value::as_f64) {
        Some(t) if t < SECONDS_THRESHOLD => (t * 1000.0).round() as i64,
        Some(t) => t.round() as i64,
        None => now_ms,
    }
}

/// Codifica uma leitura no formato do controlador (usado pelo simulador).
pub fn encode_telemetry(reading: &Reading, unit: TimestampUnit) -> Result<Vec<u8>, ProtocolError> {
    let mut obj = Map::new();
    insert_channel(&mut obj, "temp", reading.temp);
    insert_channel(&mut obj, "rpm", reading.rpm);
    insert_channel(&mut obj, "pH", reading.ph);
    let ts = match unit {
        TimestampUnit::Seconds => Value::from(reading.timestamp as f64 / 1000.0),
        TimestampUnit::Millis => Value::from(reading.timestamp),
    };
    obj.insert("timestamp".into(), ts);
    serde_json::to_vec(&Value::Object(obj)).map_err(|e| ProtocolError::Serialize(e.to_string()))
}

// ──────────────────────────────────────────────
// Setpoints
// ──────────────────────────────────────────────

/// Codifica os setpoints completos para publicação.
pub fn encode_setpoints(setpoints: &Setpoints) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(setpoints).map_err(|e| ProtocolError::Serialize(e.to_string()))
}

/// Decodifica uma mensagem de setpoints como patch parcial.
///
/// Campos ausentes ou não numéricos ficam fora do patch.
pub fn decode_setpoints_patch(data: &[u8]) -> Result<SetpointsPatch, ProtocolError> {
    let value: Value = serde_json::from_slice(data)?;
    let Value::Object(obj) = value else {
        return Err(ProtocolError::NotAnObject(json_kind(&value)));
    };
    Ok(SetpointsPatch {
        temp: numeric(&obj, "temp"),
        rpm: numeric(&obj, "rpm"),
        ph: numeric(&obj, "pH"),
    })
}

/// Decodifica uma mensagem de setpoints e mescla sobre `current`.
pub fn decode_setpoints(data: &[u8], current: &Setpoints) -> Result<Setpoints, ProtocolError> {
    decode_setpoints_patch(data).map(|patch| current.merged(&patch))
}

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

/// Campo presente e não nulo.
fn field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn numeric(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = field(obj, key)?;
    let n = value.as_f64();
    if n.is_none() {
        debug!("Campo {key} não numérico: {value}");
    }
    n
}

fn insert_channel(obj: &mut Map<String, Value>, key: &str, value: Option<f64>) {
    if let Some(v) = value {
        obj.insert(key.into(), Value::from(v));
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
