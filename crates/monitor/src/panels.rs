//! Linhas de status renderizadas no console.

use bioreactor_core::HistoryBuffer;
use bioreactor_core::tolerance::{DeviationVerdict, VerdictStatus, evaluate};
use bioreactor_core::types::{Channel, Reading, Setpoints, ToleranceSpec};
use bioreactor_core::{ConnectionState, DashboardSnapshot};

/// Marcador para valor ausente.
const NO_DATA: &str = "—";

/// Pontos mais recentes desenhados no sparkline do histórico.
const SPARK_POINTS: usize = 40;
const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

// ──────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────

pub fn format_value(value: Option<f64>, channel: Channel) -> String {
    match value {
        Some(v) if !v.is_nan() => format!("{v:.prec$}{}", channel.unit(), prec = channel.precision()),
        _ => NO_DATA.to_string(),
    }
}

fn format_delta(verdict: &DeviationVerdict, channel: Channel) -> String {
    match verdict.status() {
        VerdictStatus::NoData => match verdict.delta {
            Some(d) => format!("Δ {d:+.2}{}", channel.unit()),
            None => NO_DATA.to_string(),
        },
        VerdictStatus::WithinSpec => "dentro da tolerância".to_string(),
        VerdictStatus::OutOfSpec => {
            format!("Δ {:+.2}{} FORA", verdict.delta.unwrap_or_default(), channel.unit())
        }
    }
}

/// Hora UTC (HH:MM:SS) de um epoch em ms.
pub fn format_clock(epoch_ms: i64) -> String {
    let secs = epoch_ms.div_euclid(1000).rem_euclid(86_400);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

fn state_marker(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connected => "●",
        ConnectionState::Connecting | ConnectionState::Reconnecting => "◐",
        ConnectionState::Disconnected => "○",
        ConnectionState::Error => "✖",
    }
}

// ──────────────────────────────────────────
// Canal
// ──────────────────────────────────────────

pub fn render_channel(
    channel: Channel,
    reading: Option<&Reading>,
    setpoints: &Setpoints,
    tolerances: &ToleranceSpec,
) -> String {
    let value = reading.and_then(|r| r.channel(channel));
    let setpoint = setpoints.channel(channel);
    let tolerance = tolerances.channel(channel);
    let verdict = evaluate(value, Some(setpoint), Some(tolerance));

    format!(
        "{}: {} (alvo {} ±{}) {}",
        channel.label(),
        format_value(value, channel),
        format_value(Some(setpoint), channel),
        format_value(Some(tolerance), channel),
        format_delta(&verdict, channel),
    )
}

// ──────────────────────────────────────────
// Status
// ──────────────────────────────────────────

/// Cabeçalho: estado da conexão e idade da última leitura.
pub fn render_header(snapshot: &DashboardSnapshot, now_ms: i64) -> String {
    let mut line = format!("{} {}", state_marker(snapshot.state), snapshot.state);
    if let Some(reason) = &snapshot.degraded {
        line.push_str(&format!(" | modo degradado: {reason}"));
    }
    match (snapshot.last_update(), snapshot.age_ms(now_ms)) {
        (Some(sampled), Some(age)) => line.push_str(&format!(
            " | última leitura {} UTC (há {age}ms)",
            format_clock(sampled)
        )),
        _ => line.push_str(" | aguardando telemetria..."),
    }
    line
}

/// Bloco completo: cabeçalho + uma linha por canal.
pub fn render_status(snapshot: &DashboardSnapshot, tolerances: &ToleranceSpec, now_ms: i64) -> String {
    let mut out = render_header(snapshot, now_ms);
    for channel in Channel::ALL {
        out.push_str("\n  ");
        out.push_str(&render_channel(
            channel,
            snapshot.current.as_ref(),
            &snapshot.setpoints,
            tolerances,
        ));
    }
    out
}

/// Linha compacta emitida a cada leitura aceita.
pub fn render_reading(reading: &Reading, setpoints: &Setpoints, tolerances: &ToleranceSpec) -> String {
    Channel::ALL
        .into_iter()
        .map(|channel| {
            let value = reading.channel(channel);
            let verdict = evaluate(value, Some(setpoints.channel(channel)), Some(tolerances.channel(channel)));
            let flag = match verdict.status() {
                VerdictStatus::OutOfSpec => "!",
                _ => "",
            };
            format!("{} {}{flag}", channel.key(), format_value(value, channel))
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

// ──────────────────────────────────────────
// Histórico
// ──────────────────────────────────────────

/// Resumo do histórico: faixa e sparkline dos pontos recentes por canal.
pub fn render_history(history: &HistoryBuffer) -> String {
    let Some(latest) = history.latest() else {
        return "Histórico vazio".to_string();
    };

    let mut out = format!(
        "Histórico: {} pontos (último {} UTC)",
        history.len(),
        format_clock(latest.timestamp)
    );
    for channel in Channel::ALL {
        let values: Vec<f64> = history.iter().filter_map(|r| r.channel(channel)).collect();
        let range = match (
            values.iter().copied().reduce(f64::min),
            values.iter().copied().reduce(f64::max),
        ) {
            (Some(min), Some(max)) => format!(
                "{} – {}  {}",
                format_value(Some(min), channel),
                format_value(Some(max), channel),
                sparkline(&values[values.len().saturating_sub(SPARK_POINTS)..])
            ),
            _ => NO_DATA.to_string(),
        };
        out.push_str(&format!("\n  {}: {range}", channel.label()));
    }
    out
}

/// Uma barra por ponto, escalada entre o mínimo e o máximo da janela.
pub fn sparkline(values: &[f64]) -> String {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let span = max - min;
    let top = (SPARK_LEVELS.len() - 1) as f64;

    values
        .iter()
        .map(|v| match v {
            v if !v.is_finite() => ' ',
            _ if span.is_nan() || span <= 0.0 => SPARK_LEVELS[0],
            v => SPARK_LEVELS[(((v - min) / span) * top).round() as usize],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading() -> Reading {
        Reading {
            temp: Some(31.0),
            rpm: Some(1005.0),
            ph: None,
            timestamp: 1_700_000_000_000,
            received_at: 1_700_000_000_100,
        }
    }

    #[test]
    fn missing_value_renders_dash() {
        assert_eq!(format_value(None, Channel::Ph), "—");
        assert_eq!(format_value(Some(5.051), Channel::Ph), "5.05");
        assert_eq!(format_value(Some(30.04), Channel::Temp), "30.0°C");
        assert_eq!(format_value(Some(998.4), Channel::Rpm), "998 RPM");
    }

    #[test]
    fn channel_line_flags_out_of_spec() {
        let line = render_channel(
            Channel::Temp,
            Some(&reading()),
            &Setpoints::default(),
            &ToleranceSpec::default(),
        );
        assert!(line.contains("31.0°C"), "{line}");
        assert!(line.contains("Δ +1.00°C FORA"), "{line}");

        let ok = render_channel(Channel::Rpm, Some(&reading()), &Setpoints::default(), &ToleranceSpec::default());
        assert!(ok.contains("dentro da tolerância"), "{ok}");
    }

    #[test]
    fn header_reports_degraded_and_waiting() {
        let snapshot = DashboardSnapshot {
            state: ConnectionState::Disconnected,
            current: None,
            history: Vec::new(),
            setpoints: Setpoints::default(),
            degraded: Some("driver ausente".into()),
        };
        let header = render_header(&snapshot, 0);
        assert!(header.starts_with("○ disconnected"));
        assert!(header.contains("modo degradado: driver ausente"));
        assert!(header.contains("aguardando telemetria"));
    }

    #[test]
    fn status_block_has_all_channels() {
        let snapshot = DashboardSnapshot {
            state: ConnectionState::Connected,
            current: Some(reading()),
            history: vec![reading()],
            setpoints: Setpoints::default(),
            degraded: None,
        };
        let block = render_status(&snapshot, &ToleranceSpec::default(), 1_700_000_000_600);
        assert!(block.contains("última leitura 22:13:20 UTC (há 500ms)"), "{block}");
        assert_eq!(block.lines().count(), 4);
    }

    #[test]
    fn compact_reading_line() {
        let line = render_reading(&reading(), &Setpoints::default(), &ToleranceSpec::default());
        assert_eq!(line, "temp 31.0°C! | rpm 1005 RPM | pH —");
    }

    #[test]
    fn history_summary_ranges() {
        let mut history = HistoryBuffer::new(10);
        assert_eq!(render_history(&history), "Histórico vazio");

        let mut second = reading();
        second.temp = Some(29.5);
        history.append(reading());
        history.append(second);
        let summary = render_history(&history);
        assert!(summary.contains("2 pontos"));
        assert!(summary.contains("último 22:13:20 UTC"), "{summary}");
        assert!(summary.contains("29.5°C – 31.0°C  █▁"), "{summary}");
        assert!(summary.contains("pH: —"));
    }

    #[test]
    fn sparkline_scales_to_window() {
        assert_eq!(sparkline(&[0.0, 1.0, 2.0, 7.0]), "▁▂▃█");
        assert_eq!(sparkline(&[5.0, 5.0, 5.0]), "▁▁▁");
        assert_eq!(sparkline(&[]), "");
    }

    #[test]
    fn history_sparkline_keeps_recent_points() {
        let mut history = HistoryBuffer::new(200);
        for i in 0..100 {
            let mut r = reading();
            r.rpm = Some(i as f64);
            history.append(r);
        }
        let summary = render_history(&history);
        let rpm_line = summary.lines().find(|l| l.contains("RPM:")).unwrap();
        let bars = rpm_line.chars().filter(|c| SPARK_LEVELS.contains(c)).count();
        assert_eq!(bars, SPARK_POINTS);
    }

    #[test]
    fn clock_is_utc_time_of_day() {
        assert_eq!(format_clock(1_700_000_000_000), "22:13:20");
        assert_eq!(format_clock(0), "00:00:00");
    }
}
