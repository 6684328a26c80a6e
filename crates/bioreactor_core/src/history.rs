//! Histórico rolante de leituras para os gráficos.

use crate::types::Reading;
use std::collections::VecDeque;

/// Capacidade padrão (pontos mantidos para os gráficos).
pub const DEFAULT_HISTORY_CAPACITY: usize = 200;

/// Buffer FIFO limitado, em ordem de inserção.
///
/// Não deduplica nem reordena: leituras fora de ordem são guardadas como
/// chegaram.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    readings: VecDeque<Reading>,
    capacity: usize,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryBuffer {
    /// Capacidade zero é promovida para 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, reading: Reading) {
        self.readings.push_back(reading);
        while self.readings.len() > self.capacity {
            self.readings.pop_front();
        }
    }

    /// Cópia ordenada do conteúdo atual.
    pub fn snapshot(&self) -> Vec<Reading> {
        self.readings.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(ts: i64) -> Reading {
        Reading {
            temp: Some(30.0),
            timestamp: ts,
            received_at: ts,
            ..Default::default()
        }
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut buf = HistoryBuffer::default();
        for i in 0..500 {
            buf.append(reading(i));
            assert!(buf.len() <= DEFAULT_HISTORY_CAPACITY);
        }
    }

    #[test]
    fn keeps_most_recent_in_insertion_order() {
        let mut buf = HistoryBuffer::default();
        for i in 0..250 {
            buf.append(reading(i));
        }
        let snap = buf.snapshot();
        assert_eq!(snap.len(), 200);
        let ts: Vec<i64> = snap.iter().map(|r| r.timestamp).collect();
        assert_eq!(ts, (50..250).collect::<Vec<_>>());
    }

    #[test]
    fn accepts_duplicates_and_out_of_order() {
        let mut buf = HistoryBuffer::new(10);
        buf.append(reading(5));
        buf.append(reading(3));
        buf.append(reading(3));
        let ts: Vec<i64> = buf.iter().map(|r| r.timestamp).collect();
        assert_eq!(ts, vec![5, 3, 3]);
        assert_eq!(buf.latest().map(|r| r.timestamp), Some(3));
    }

    #[test]
    fn snapshot_is_detached() {
        let mut buf = HistoryBuffer::new(4);
        buf.append(reading(1));
        let mut snap = buf.snapshot();
        snap.clear();
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut buf = HistoryBuffer::new(0);
        buf.append(reading(1));
        buf.append(reading(2));
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.snapshot()[0].timestamp, 2);
    }
}
