//! Numeric convolution of two sampled time-domain signals.

use crate::config::EngineConfig;
use crate::error::{Fault, FaultResult};
use crate::sampler::{linspace, sample_real};
use serde::{Deserialize, Serialize};
use sigcomp_symbolic::SymExpr;

const TIME: &str = "t";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvolutionResult {
    pub signal_x: String,
    pub signal_h: String,
    pub time_array: Vec<f64>,
    pub output_y_array: Vec<f64>,
    pub symbolic_result: String,
}

/// Full discrete convolution, `a.len() + b.len() - 1` samples
pub fn full_convolution(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &ai) in a.iter().enumerate() {
        for (j, &bj) in b.iter().enumerate() {
            out[i + j] += ai * bj;
        }
    }
    out
}

pub(crate) fn convolve(
    config: &EngineConfig,
    (x_text, x): (&str, &SymExpr),
    (h_text, h): (&str, &SymExpr),
) -> FaultResult<ConvolutionResult> {
    for expr in [x, h] {
        if let Some(var) = expr.free_vars().into_iter().find(|v| v != TIME) {
            return Err(Fault::Input(format!(
                "unexpected variable '{var}' in signal '{expr}'"
            )));
        }
    }

    let grid = &config.convolution;
    let times = grid.samples();
    let (xs, hs) = sample_pair(x, h, &times, config.sentinels.value);

    let output = full_convolution(&xs, &hs);
    let time_array = linspace(2.0 * grid.start, 2.0 * grid.stop, output.len());
    log::debug!(
        "convolved '{x}' with '{h}' over {} samples into {}",
        times.len(),
        output.len()
    );

    Ok(ConvolutionResult {
        signal_x: x_text.to_string(),
        signal_h: h_text.to_string(),
        time_array,
        output_y_array: output,
        symbolic_result: format!("({x_text}) * ({h_text})"),
    })
}

/// Sample both signals; a point where either fails is `fallback` in both
fn sample_pair(x: &SymExpr, h: &SymExpr, times: &[f64], fallback: f64) -> (Vec<f64>, Vec<f64>) {
    sample_real(x, TIME, times)
        .into_iter()
        .zip(sample_real(h, TIME, times))
        .map(|pair| match pair {
            (Some(xv), Some(hv)) => (xv, hv),
            _ => (fallback, fallback),
        })
        .unzip()
}
