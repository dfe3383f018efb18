//! Lexical classification of system equations.
//!
//! Each property starts in its well-behaved state (linear, causal, stable,
//! memoryless, time-invariant) and is flipped only when its marker shows up
//! in the lowercased canonical text of the equation. This is a coarse
//! heuristic over text, not a proof about the system.

use serde::{Deserialize, Serialize};
use sigcomp_parser::SystemEquation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Linearity {
    pub is_linear: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Causality {
    pub is_causal: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stability {
    pub is_stable: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    pub has_memory: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInvariance {
    pub is_invariant: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyVerdicts {
    pub linearity: Linearity,
    pub causality: Causality,
    pub stability: Stability,
    pub memory: Memory,
    pub time_invariance: TimeInvariance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Property {
    Linearity,
    Causality,
    Memory,
    TimeInvariance,
    Stability,
}

struct Rule {
    property: Property,
    default_key: &'static str,
    flip_key: &'static str,
    flips: fn(&str) -> bool,
}

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

const RULES: &[Rule] = &[
    Rule {
        property: Property::Linearity,
        default_key: "explanations.linearSystem",
        flip_key: "explanations.nonLinearSquare",
        flips: |text| text.contains("x[") && contains_any(text, &["^2", "**2", "*"]),
    },
    Rule {
        property: Property::Causality,
        default_key: "explanations.causalPastInput",
        flip_key: "explanations.nonCausalFuture",
        flips: |text| contains_any(text, &["x[t+1]", "x[n+1]", "x[t+2]"]),
    },
    Rule {
        property: Property::Memory,
        default_key: "explanations.memorylessCurrent",
        flip_key: "explanations.memoryPastInput",
        flips: |text| contains_any(text, &["x[t-1]", "x[n-1]", "y[t-1]"]),
    },
    Rule {
        property: Property::TimeInvariance,
        default_key: "explanations.timeInvariant",
        flip_key: "explanations.timeVariant",
        flips: |text| contains_any(text, &["t*", "n*"]),
    },
    Rule {
        property: Property::Stability,
        default_key: "explanations.stableSystem",
        flip_key: "explanations.unstableRamp",
        flips: |text| contains_any(text, &["t*", "n*", "ramp"]),
    },
];

/// Run every rule against the canonical text of `equation`
pub fn classify(equation: &SystemEquation) -> PropertyVerdicts {
    let text = equation.to_string().to_lowercase();

    let mut verdicts = PropertyVerdicts {
        linearity: Linearity {
            is_linear: true,
            explanation: String::new(),
        },
        causality: Causality {
            is_causal: true,
            explanation: String::new(),
        },
        stability: Stability {
            is_stable: true,
            explanation: String::new(),
        },
        memory: Memory {
            has_memory: false,
            explanation: String::new(),
        },
        time_invariance: TimeInvariance {
            is_invariant: true,
            explanation: String::new(),
        },
    };

    for rule in RULES {
        let flipped = (rule.flips)(&text);
        let explanation = if flipped { rule.flip_key } else { rule.default_key }.to_string();
        match rule.property {
            Property::Linearity => {
                verdicts.linearity = Linearity {
                    is_linear: !flipped,
                    explanation,
                }
            }
            Property::Causality => {
                verdicts.causality = Causality {
                    is_causal: !flipped,
                    explanation,
                }
            }
            Property::Memory => {
                verdicts.memory = Memory {
                    has_memory: flipped,
                    explanation,
                }
            }
            Property::TimeInvariance => {
                verdicts.time_invariance = TimeInvariance {
                    is_invariant: !flipped,
                    explanation,
                }
            }
            Property::Stability => {
                verdicts.stability = Stability {
                    is_stable: !flipped,
                    explanation,
                }
            }
        }
    }
    log::debug!("classified '{text}': {verdicts:?}");
    verdicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigcomp_parser::parse_equation;

    fn classify_text(text: &str) -> PropertyVerdicts {
        classify(&parse_equation(text).unwrap())
    }

    #[test]
    fn test_defaults() {
        let v = classify_text("y(t) = 2*x(t) + 1");
        assert!(v.linearity.is_linear);
        assert!(v.causality.is_causal);
        assert!(v.stability.is_stable);
        assert!(!v.memory.has_memory);
        assert!(v.time_invariance.is_invariant);
        assert_eq!(v.linearity.explanation, "explanations.linearSystem");
        assert_eq!(v.causality.explanation, "explanations.causalPastInput");
        assert_eq!(v.stability.explanation, "explanations.stableSystem");
        assert_eq!(v.memory.explanation, "explanations.memorylessCurrent");
        assert_eq!(v.time_invariance.explanation, "explanations.timeInvariant");
    }

    #[test]
    fn test_square_is_nonlinear() {
        let v = classify_text("y[n] = x[n]^2");
        assert!(!v.linearity.is_linear);
        assert_eq!(v.linearity.explanation, "explanations.nonLinearSquare");
        assert!(v.time_invariance.is_invariant);
    }

    #[test]
    fn test_future_input_is_noncausal() {
        let v = classify_text("y[n] = x[n+1]");
        assert!(!v.causality.is_causal);
        assert_eq!(v.causality.explanation, "explanations.nonCausalFuture");
        assert!(v.linearity.is_linear);
    }

    #[test]
    fn test_past_terms_have_memory() {
        assert!(classify_text("y[n] = x[n] + x[n-1]").memory.has_memory);
        let v = classify_text("y[t] = y[t-1] + x[t]");
        assert!(v.memory.has_memory);
        assert_eq!(v.memory.explanation, "explanations.memoryPastInput");
    }

    #[test]
    fn test_time_factor_flips_invariance_and_stability() {
        let v = classify_text("y(t) = t*x(t)");
        assert!(!v.time_invariance.is_invariant);
        assert_eq!(v.time_invariance.explanation, "explanations.timeVariant");
        assert!(!v.stability.is_stable);
        assert_eq!(v.stability.explanation, "explanations.unstableRamp");
    }

    #[test]
    fn test_rules_are_independent() {
        let v = classify_text("y[n] = n*x[n+1]");
        assert!(!v.linearity.is_linear);
        assert!(!v.causality.is_causal);
        assert!(!v.time_invariance.is_invariant);
        assert!(!v.stability.is_stable);
        assert!(!v.memory.has_memory);
    }
}
