//! Signal transform and analysis engine
//!
//! [`SignalEngine`] exposes five text-in, value-out operations:
//! - [`SignalEngine::classify_system_properties`]: lexical property checks on a system equation
//! - [`SignalEngine::forward_laplace`]: one-sided Laplace transform with ROC, poles and zeros
//! - [`SignalEngine::inverse_laplace`]: partial-fraction inverse with a derivation trace
//! - [`SignalEngine::convolve`]: sampled discrete convolution of two signals
//! - [`SignalEngine::analyze_lti`]: stability, DC gain, frequency and step response
//!
//! Every operation is a pure computation over its arguments. One engine can
//! be shared between threads without locking.

pub mod config;
mod convolution;
mod derivation;
pub mod error;
mod inverse;
mod laplace;
mod lti;
mod properties;
mod rational;
pub mod sampler;

pub use config::{EngineConfig, LinearGrid, LogGrid, Sentinels};
pub use convolution::{full_convolution, ConvolutionResult};
pub use derivation::DerivationStep;
pub use error::{EngineError, Result};
pub use inverse::InverseResult;
pub use laplace::TransformPair;
pub use lti::{FrequencyResponse, LtiReport, Stability, StepResponse, SystemOrder};
pub use properties::{
    Causality, Linearity, Memory, PropertyVerdicts, Stability as StabilityVerdict, TimeInvariance,
};

use log::debug;
use sigcomp_parser::{parse_equation_with_table, parse_with_table};
use sigcomp_symbolic::{SymExpr, SymbolTable};

#[derive(Debug, Clone)]
pub struct SignalEngine {
    config: EngineConfig,
    symbols: &'static SymbolTable,
}

impl Default for SignalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalEngine {
    /// Engine with the default sampling grids
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        SignalEngine {
            config,
            symbols: SymbolTable::global(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn parse(&self, text: &str) -> Result<SymExpr> {
        parse_with_table(text, self.symbols).map_err(|err| EngineError::from_parse(err, text))
    }

    /// Linearity, causality, stability, memory and time invariance of a
    /// system equation such as `y[n] = x[n] + x[n-1]`
    pub fn classify_system_properties(&self, equation: &str) -> Result<PropertyVerdicts> {
        debug!("classifying '{equation}'");
        let parsed = parse_equation_with_table(equation, self.symbols)
            .map_err(|err| EngineError::from_parse(err, equation))?;
        Ok(properties::classify(&parsed))
    }

    pub fn forward_laplace(&self, expression: &str) -> Result<TransformPair> {
        debug!("forward Laplace transform of '{expression}'");
        let expr = self.parse(expression)?;
        laplace::forward(&expr).map_err(|fault| fault.at(expression))
    }

    /// Inverse transform of an s-domain expression. With `causal`, a
    /// `Heaviside(t)` factor is appended unless the result already has one.
    pub fn inverse_laplace(&self, expression: &str, causal: bool) -> Result<InverseResult> {
        debug!("inverse Laplace transform of '{expression}' (causal: {causal})");
        let expr = self.parse(expression)?;
        inverse::inverse(expression, &expr, causal).map_err(|fault| fault.at(expression))
    }

    pub fn convolve(&self, signal_x: &str, signal_h: &str) -> Result<ConvolutionResult> {
        debug!("convolving '{signal_x}' with '{signal_h}'");
        let x = self.parse(signal_x)?;
        let h = self.parse(signal_h)?;
        convolution::convolve(&self.config, (signal_x, &x), (signal_h, &h)).map_err(|fault| {
            let pair = format!("{signal_x}, {signal_h}");
            fault.at(&pair)
        })
    }

    pub fn analyze_lti(&self, transfer_function: &str) -> Result<LtiReport> {
        debug!("analyzing transfer function '{transfer_function}'");
        let expr = self.parse(transfer_function)?;
        lti::analyze(&self.config, &expr).map_err(|fault| fault.at(transfer_function))
    }
}
