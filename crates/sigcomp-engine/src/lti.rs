//! Transfer-function analysis: poles, zeros, stability, DC gain, frequency
//! and step responses.

use crate::config::EngineConfig;
use crate::error::{Fault, FaultResult};
use crate::rational::{decompose, poles_and_zeros};
use crate::sampler::{eval_at, sample_imaginary_axis};
use serde::{Deserialize, Serialize};
use sigcomp_symbolic::SymExpr;

const FREQ: &str = "s";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stability {
    Stable,
    MarginallyStable,
    Unstable,
}

impl Stability {
    /// Any right-half-plane pole is unstable; a pole at the origin is
    /// marginal
    pub fn from_poles(poles: &[f64]) -> Self {
        if poles.iter().any(|&p| p > 0.0) {
            Stability::Unstable
        } else if poles.iter().any(|&p| p == 0.0) {
            Stability::MarginallyStable
        } else {
            Stability::Stable
        }
    }
}

/// Only one real pole counts as first order; everything else is reported
/// as second order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SystemOrder {
    FirstOrder,
    SecondOrder,
}

impl SystemOrder {
    pub fn from_poles(poles: &[f64]) -> Self {
        if poles.len() == 1 {
            SystemOrder::FirstOrder
        } else {
            SystemOrder::SecondOrder
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyResponse {
    pub frequencies: Vec<f64>,
    pub magnitude: Vec<f64>,
    pub phase: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResponse {
    pub time: Vec<f64>,
    pub response: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LtiReport {
    pub transfer_function: String,
    pub poles: Vec<f64>,
    pub zeros: Vec<f64>,
    pub stability: Stability,
    #[serde(rename = "type")]
    pub order: SystemOrder,
    #[serde(rename = "dcGain")]
    pub dc_gain: f64,
    #[serde(rename = "frequencyResponse")]
    pub frequency_response: FrequencyResponse,
    #[serde(rename = "stepResponse")]
    pub step_response: StepResponse,
}

pub(crate) fn analyze(config: &EngineConfig, expr: &SymExpr) -> FaultResult<LtiReport> {
    if let Some(var) = expr.free_vars().into_iter().find(|v| v != FREQ) {
        return Err(Fault::Input(format!(
            "unexpected variable '{var}' in a transfer function"
        )));
    }

    let form = decompose(expr);
    let (poles, zeros) = poles_and_zeros(&form, FREQ);
    let stability = Stability::from_poles(&poles);
    let order = SystemOrder::from_poles(&poles);
    log::debug!(
        "'{expr}': {} real pole(s), {} real zero(s), {stability:?}",
        poles.len(),
        zeros.len()
    );

    let dc_gain = eval_at(expr, FREQ, 0.0).unwrap_or(config.sentinels.value);
    let frequency_response = frequency_response(config, expr);
    let step_response = step_response(config, &poles);

    Ok(LtiReport {
        transfer_function: expr.to_string(),
        poles,
        zeros,
        stability,
        order,
        dc_gain,
        frequency_response,
        step_response,
    })
}

/// Bode data: `20*log10|H(jw)|` in dB and `arg H(jw)` in degrees
pub fn frequency_response(config: &EngineConfig, expr: &SymExpr) -> FrequencyResponse {
    let frequencies = config.frequency.samples();
    let sentinels = &config.sentinels;

    let (magnitude, phase) = sample_imaginary_axis(expr, FREQ, &frequencies)
        .into_iter()
        .map(|value| match value {
            Some(h) if h.norm() > 0.0 => (20.0 * h.norm().log10(), h.arg().to_degrees()),
            Some(h) => (sentinels.magnitude_db, h.arg().to_degrees()),
            None => (sentinels.magnitude_db, sentinels.phase_deg),
        })
        .unzip();

    FrequencyResponse {
        frequencies,
        magnitude,
        phase,
    }
}

/// Closed-form step response summed over the real poles. Poles in the
/// right half-plane contribute nothing.
pub fn step_response(config: &EngineConfig, poles: &[f64]) -> StepResponse {
    let time = config.step.samples();
    let response = time
        .iter()
        .map(|&t| {
            poles
                .iter()
                .map(|&p| {
                    if p < 0.0 {
                        (1.0 / p.abs()) * (1.0 - (p * t).exp())
                    } else if p == 0.0 {
                        t
                    } else {
                        0.0
                    }
                })
                .sum()
        })
        .collect();
    StepResponse { time, response }
}
