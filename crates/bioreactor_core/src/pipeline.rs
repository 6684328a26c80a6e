//! Pipeline de telemetria: payload bruto → [`Reading`] → histórico.

use crate::history::HistoryBuffer;
use crate::protocol::decode_reading;
use crate::types::Reading;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

// ──────────────────────────────────────────────
// Relógio
// ──────────────────────────────────────────────

/// Fonte de tempo local (epoch ms).
pub trait Clock: Send {
    fn now_ms(&self) -> i64;
}

/// Relógio do sistema.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Relógio controlado manualmente (testes e replays).
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self(Arc::new(AtomicI64::new(start_ms)))
    }

    pub fn set(&self, ms: i64) {
        self.0.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

// ──────────────────────────────────────────────
// Normalizador
// ──────────────────────────────────────────────

/// Converte payloads brutos em leituras, carimbando `received_at`.
///
/// `received_at` nunca regride, mesmo que o relógio do sistema volte.
pub struct TelemetryNormalizer {
    clock: Box<dyn Clock>,
    last_received_at: i64,
}

impl TelemetryNormalizer {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self {
            clock,
            last_received_at: i64::MIN,
        }
    }

    /// Payload inválido é registrado e descartado (`None`).
    pub fn normalize(&mut self, raw: &[u8]) -> Option<Reading> {
        let now = self.clock.now_ms().max(self.last_received_at);
        match decode_reading(raw, now) {
            Ok(reading) => {
                self.last_received_at = reading.received_at;
                Some(reading)
            }
            Err(e) => {
                debug!("Telemetria descartada ({} bytes): {e}", raw.len());
                None
            }
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }
}

// ──────────────────────────────────────────────
// Pipeline
// ──────────────────────────────────────────────

/// Dono do histórico e da leitura atual.
pub struct TelemetryPipeline {
    normalizer: TelemetryNormalizer,
    history: HistoryBuffer,
    current: Option<Reading>,
}

impl TelemetryPipeline {
    pub fn new(clock: Box<dyn Clock>, capacity: usize) -> Self {
        Self {
            normalizer: TelemetryNormalizer::new(clock),
            history: HistoryBuffer::new(capacity),
            current: None,
        }
    }

    /// Normaliza e, se aceito, anexa ao histórico e vira a leitura atual.
    pub fn ingest(&mut self, raw: &[u8]) -> Option<&Reading> {
        let reading = self.normalizer.normalize(raw)?;
        self.history.append(reading.clone());
        self.current = Some(reading);
        self.current.as_ref()
    }

    pub fn current(&self) -> Option<&Reading> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn now_ms(&self) -> i64 {
        self.normalizer.now_ms()
    }
}
