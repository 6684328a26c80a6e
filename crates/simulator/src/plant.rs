//! Modelo simplificado do biorreator.
//!
//! Cada canal segue o setpoint com atraso de primeira ordem
//! (`x += (alvo - x) * (1 - e^(-dt/τ))`) mais uma oscilação determinística,
//! para que o painel tenha o que mostrar sem depender de hardware.

use bioreactor_core::types::{Channel, Reading, Setpoints};

/// Constante de tempo τ por canal (segundos).
fn time_constant(channel: Channel) -> f64 {
    match channel {
        Channel::Temp => 20.0,
        Channel::Rpm => 3.0,
        Channel::Ph => 30.0,
    }
}

/// Amplitude da oscilação por canal.
fn wobble_amplitude(channel: Channel) -> f64 {
    match channel {
        Channel::Temp => 0.05,
        Channel::Rpm => 2.0,
        Channel::Ph => 0.01,
    }
}

/// Condição inicial: reator parado em temperatura ambiente.
const AMBIENT: Setpoints = Setpoints {
    temp: 22.0,
    rpm: 0.0,
    ph: 7.0,
};

pub struct Plant {
    temp: f64,
    rpm: f64,
    ph: f64,
    setpoints: Setpoints,
    ticks: u64,
}

impl Plant {
    pub fn new(setpoints: Setpoints) -> Self {
        Self::with_state(AMBIENT, setpoints)
    }

    pub fn with_state(initial: Setpoints, setpoints: Setpoints) -> Self {
        Self {
            temp: initial.temp,
            rpm: initial.rpm,
            ph: initial.ph,
            setpoints,
            ticks: 0,
        }
    }

    pub fn setpoints(&self) -> Setpoints {
        self.setpoints
    }

    pub fn set_setpoints(&mut self, setpoints: Setpoints) {
        self.setpoints = setpoints;
    }

    /// Avança `dt_secs` e retorna a leitura amostrada em `now_ms`.
    pub fn step(&mut self, dt_secs: f64, now_ms: i64) -> Reading {
        self.ticks += 1;
        for channel in Channel::ALL {
            let target = self.setpoints.channel(channel);
            let alpha = 1.0 - (-dt_secs / time_constant(channel)).exp();
            let x = self.state_mut(channel);
            *x += (target - *x) * alpha;
        }

        let phase = self.ticks as f64 * 0.7;
        let sample = |channel: Channel, x: f64, offset: f64| x + wobble_amplitude(channel) * (phase + offset).sin();

        Reading {
            temp: Some(sample(Channel::Temp, self.temp, 0.0)),
            rpm: Some(sample(Channel::Rpm, self.rpm, 2.1)),
            ph: Some(sample(Channel::Ph, self.ph, 4.2)),
            timestamp: now_ms,
            received_at: now_ms,
        }
    }

    fn state_mut(&mut self, channel: Channel) -> &mut f64 {
        match channel {
            Channel::Temp => &mut self.temp,
            Channel::Rpm => &mut self.rpm,
            Channel::Ph => &mut self.ph,
        }
    }
}
