//! Avaliação de tolerância – leitura vs. setpoint.

use crate::types::{Channel, Reading, Setpoints, ToleranceSpec};

/// Resultado da comparação de um valor com seu setpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviationVerdict {
    /// `value - setpoint`, quando ambos existem
    pub delta: Option<f64>,
    /// `|delta| <= tolerance`, quando delta e tolerância existem
    pub within_tolerance: Option<bool>,
}

/// Classificação usada pelo painel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictStatus {
    NoData,
    WithinSpec,
    OutOfSpec,
}

impl DeviationVerdict {
    pub fn status(&self) -> VerdictStatus {
        match self.within_tolerance {
            None => VerdictStatus::NoData,
            Some(true) => VerdictStatus::WithinSpec,
            Some(false) => VerdictStatus::OutOfSpec,
        }
    }
}

/// Compara `value` com `setpoint` dentro de `tolerance`.
///
/// Função total: entradas ausentes (ou NaN) viram `None` no veredito.
pub fn evaluate(value: Option<f64>, setpoint: Option<f64>, tolerance: Option<f64>) -> DeviationVerdict {
    let delta = match (defined(value), defined(setpoint)) {
        (Some(v), Some(s)) => Some(v - s),
        _ => None,
    };
    let within_tolerance = match (delta, defined(tolerance)) {
        (Some(d), Some(t)) => Some(d.abs() <= t),
        _ => None,
    };
    DeviationVerdict {
        delta,
        within_tolerance,
    }
}

fn defined(x: Option<f64>) -> Option<f64> {
    x.filter(|v| !v.is_nan())
}

/// Vereditos dos três canais de uma leitura.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadingVerdicts {
    pub temp: DeviationVerdict,
    pub rpm: DeviationVerdict,
    pub ph: DeviationVerdict,
}

impl ReadingVerdicts {
    pub fn channel(&self, channel: Channel) -> DeviationVerdict {
        match channel {
            Channel::Temp => self.temp,
            Channel::Rpm => self.rpm,
            Channel::Ph => self.ph,
        }
    }

    /// Canais com veredito fora de especificação.
    pub fn out_of_spec(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|c| self.channel(*c).status() == VerdictStatus::OutOfSpec)
            .collect()
    }
}

/// Avalia uma leitura completa contra setpoints e tolerâncias.
pub fn evaluate_reading(
    reading: Option<&Reading>,
    setpoints: &Setpoints,
    tolerances: &ToleranceSpec,
) -> ReadingVerdicts {
    let eval = |channel: Channel| {
        evaluate(
            reading.and_then(|r| r.channel(channel)),
            Some(setpoints.channel(channel)),
            Some(tolerances.channel(channel)),
        )
    };
    ReadingVerdicts {
        temp: eval(Channel::Temp),
        rpm: eval(Channel::Rpm),
        ph: eval(Channel::Ph),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    #[test]
    fn out_of_tolerance() {
        let v = evaluate(Some(31.0), Some(30.0), Some(0.5));
        assert_eq!(v.delta, Some(1.0));
        assert_eq!(v.within_tolerance, Some(false));
        assert_eq!(v.status(), VerdictStatus::OutOfSpec);
    }

    #[test]
    fn within_tolerance() {
        let v = evaluate(Some(30.2), Some(30.0), Some(0.5));
        assert!(approx(v.delta, 0.2));
        assert_eq!(v.within_tolerance, Some(true));
    }

    #[test]
    fn boundary_is_inclusive() {
        let v = evaluate(Some(1020.0), Some(1000.0), Some(20.0));
        assert_eq!(v.within_tolerance, Some(true));
    }

    #[test]
    fn missing_inputs_yield_none() {
        assert_eq!(evaluate(None, Some(30.0), Some(0.5)).delta, None);
        assert_eq!(evaluate(Some(30.0), None, Some(0.5)).within_tolerance, None);

        let no_tol = evaluate(Some(30.4), Some(30.0), None);
        assert!(approx(no_tol.delta, 0.4));
        assert_eq!(no_tol.within_tolerance, None);
        assert_eq!(no_tol.status(), VerdictStatus::NoData);
    }

    #[test]
    fn nan_is_treated_as_missing() {
        let v = evaluate(Some(f64::NAN), Some(30.0), Some(0.5));
        assert_eq!(v.delta, None);
        assert_eq!(v.within_tolerance, None);
    }

    #[test]
    fn reading_verdicts_per_channel() {
        let reading = Reading {
            temp: Some(31.0),
            rpm: Some(1005.0),
            ph: None,
            ..Default::default()
        };
        let verdicts = evaluate_reading(Some(&reading), &Setpoints::default(), &ToleranceSpec::default());
        assert_eq!(verdicts.temp.status(), VerdictStatus::OutOfSpec);
        assert_eq!(verdicts.rpm.status(), VerdictStatus::WithinSpec);
        assert_eq!(verdicts.ph.status(), VerdictStatus::NoData);
        assert_eq!(verdicts.out_of_spec(), vec![Channel::Temp]);
    }

    #[test]
    fn no_reading_means_no_data() {
        let verdicts = evaluate_reading(None, &Setpoints::default(), &ToleranceSpec::default());
        assert!(verdicts.out_of_spec().is_empty());
        assert_eq!(verdicts.temp.status(), VerdictStatus::NoData);
    }
}
