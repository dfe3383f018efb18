//! Inverse one-sided Laplace transform by partial fractions.

use crate::derivation::{trace, DerivationStep};
use crate::error::{Fault, FaultResult};
use crate::rational::{scaled_var, snapped, RationalFunction, SNAP_TOL};
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use sigcomp_symbolic::{Coefficient, Polynomial, StagedNormalizer, SymExpr, SymExprKind};

const TIME: &str = "t";
const FREQ: &str = "s";
/// Roots closer than this (relative) are one repeated root
const CLUSTER_TOL: f64 = 1.0e-4;
const ROOT_SNAP_TOL: f64 = 1.0e-7;
const IMAG_TOL: f64 = 1.0e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverseResult {
    pub input_s: String,
    pub output_t: String,
    pub steps: Vec<DerivationStep>,
    pub is_causal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Pole {
    Real { root: f64, multiplicity: usize },
    /// `alpha +/- j*beta`, `beta > 0`
    Complex { alpha: f64, beta: f64 },
}

impl Pole {
    fn factor(&self) -> Polynomial {
        match *self {
            Pole::Real { root, .. } => Polynomial::new(vec![-root, 1.0]),
            Pole::Complex { alpha, beta } => {
                Polynomial::new(vec![alpha * alpha + beta * beta, -2.0 * alpha, 1.0])
            }
        }
    }

    fn real_part(&self) -> f64 {
        match *self {
            Pole::Real { root, .. } => root,
            Pole::Complex { alpha, .. } => alpha,
        }
    }

    fn multiplicity(&self) -> usize {
        match *self {
            Pole::Real { multiplicity, .. } => multiplicity,
            Pole::Complex { .. } => 1,
        }
    }
}

/// Unknown of the partial-fraction system
#[derive(Debug, Clone, Copy)]
enum Residue {
    /// `c/(s-root)^power`
    Real { root: f64, power: usize },
    /// `A*s/((s-alpha)^2+beta^2)`
    ComplexS { alpha: f64, beta: f64 },
    /// `B/((s-alpha)^2+beta^2)`
    ComplexConst,
}

/// `text` is the caller's input, used for the derivation trace
pub(crate) fn inverse(text: &str, expr: &SymExpr, causal: bool) -> FaultResult<InverseResult> {
    if let Some(var) = expr.free_vars().into_iter().find(|v| v != FREQ) {
        return Err(Fault::Input(format!(
            "unexpected variable '{var}' in an s-domain expression"
        )));
    }

    let result = inverse_expr(expr)?;
    let result_text = result.to_string();
    let steps = trace(text, &result_text);

    let output = if causal && !result_text.contains("Heaviside(t)") {
        result.times(SymExpr::heaviside(SymExpr::var(TIME)))
    } else {
        result
    };
    log::debug!("inverse of '{expr}' is '{output}'");

    Ok(InverseResult {
        input_s: expr.to_string(),
        output_t: output.to_string(),
        steps,
        is_causal: causal,
    })
}

/// Inverse transform before any causal factor is applied
pub(crate) fn inverse_expr(expr: &SymExpr) -> FaultResult<SymExpr> {
    let normalized = StagedNormalizer::aggressive().apply(expr.clone());
    let terms = match normalized.kind.as_ref() {
        SymExprKind::Add(terms) => terms.clone(),
        _ => vec![normalized.clone()],
    };

    let mut groups: Vec<(f64, Vec<SymExpr>)> = Vec::new();
    for term in &terms {
        let (delay, body) = split_delay(term)?;
        match groups
            .iter_mut()
            .find(|(d, _)| (d - delay).abs() <= SNAP_TOL)
        {
            Some((_, bodies)) => bodies.push(body),
            None => groups.push((delay, vec![body])),
        }
    }
    groups.sort_by(|a, b| a.0.total_cmp(&b.0));

    let tidy = StagedNormalizer::tidy();
    let mut out = Vec::new();
    for (delay, bodies) in groups {
        let sum = SymExpr::add(bodies);
        let rational = RationalFunction::from_expr(&sum, FREQ).ok_or_else(|| {
            Fault::Input(format!("'{sum}' is not a ratio of polynomials in s"))
        })?;
        let time = tidy.apply(partial_fractions(&rational)?);
        if time.is_zero() {
            continue;
        }
        out.push(if delay > 0.0 {
            delay_by(&time, delay)
        } else {
            time
        });
    }
    Ok(SymExpr::add(out))
}

/// Pull `exp(k*s + b)` factors out of a term: `(delay, rest)` with
/// `delay = -k`
fn split_delay(term: &SymExpr) -> FaultResult<(f64, SymExpr)> {
    let factors = match term.kind.as_ref() {
        SymExprKind::Mul(factors) => factors.clone(),
        _ => vec![term.clone()],
    };

    let mut delay = 0.0;
    let mut rest = Vec::new();
    for factor in factors {
        let shift = match factor.as_func() {
            Some(("exp", [arg])) if arg.depends_on(FREQ) => Some((arg.clone(), factor.clone())),
            _ => None,
        };
        let Some((arg, factor)) = shift else {
            rest.push(factor);
            continue;
        };
        let poly = Polynomial::from_expr(&arg, FREQ)
            .filter(|p| p.degree() <= 1)
            .ok_or_else(|| Fault::Input(format!("'{factor}' is not a time-shift factor")))?;
        let coeffs = poly.coeffs();
        let k = coeffs.get(1).copied().unwrap_or(0.0);
        let b = coeffs.first().copied().unwrap_or(0.0);
        delay -= k;
        if b != 0.0 {
            rest.push(snapped(b.exp()));
        }
    }

    let delay = Coefficient::approximate(delay, SNAP_TOL).to_f64();
    if delay < 0.0 {
        return Err(Fault::Computation(format!(
            "'{term}' shifts the signal to before t = 0; no causal inverse exists"
        )));
    }
    Ok((delay, SymExpr::mul(rest)))
}

/// `f(t-c)*Heaviside(t-c)`
fn delay_by(time: &SymExpr, delay: f64) -> SymExpr {
    let shifted_t = SymExpr::add(vec![SymExpr::var(TIME), snapped(-delay)]);
    let shifted = StagedNormalizer::tidy().apply(time.substitute(TIME, &shifted_t));
    shifted.times(SymExpr::heaviside(shifted_t))
}

fn partial_fractions(f: &RationalFunction) -> FaultResult<SymExpr> {
    let (quotient, remainder) = f.num.div_rem(&f.den)?;
    let mut terms = Vec::new();

    if !quotient.is_zero() {
        let Some(q) = quotient.as_constant() else {
            return Err(Fault::Computation(format!(
                "improper rational function: polynomial part '{}' has no inverse transform",
                quotient.to_expr(FREQ)
            )));
        };
        terms.push(SymExpr::mul(vec![
            snapped(q),
            SymExpr::dirac_delta(SymExpr::var(TIME)),
        ]));
    }

    if !remainder.is_zero() {
        let poles = cluster_poles(&f.den)?;
        let residues = solve_residues(&poles, &remainder)?;
        terms.extend(time_terms(&residues));
    }
    Ok(SymExpr::add(terms))
}

fn cluster_poles(den: &Polynomial) -> FaultResult<Vec<Pole>> {
    let mut clusters: Vec<(Complex64, Complex64, usize)> = Vec::new();
    for root in den.roots()? {
        match clusters
            .iter_mut()
            .find(|(first, _, _)| (root - *first).norm() <= CLUSTER_TOL * (1.0 + first.norm()))
        {
            Some((_, sum, count)) => {
                *sum += root;
                *count += 1;
            }
            None => clusters.push((root, root, 1)),
        }
    }

    let mut poles = Vec::new();
    for (_, sum, count) in clusters {
        let center = sum / count as f64;
        let re = Coefficient::approximate(center.re, ROOT_SNAP_TOL).to_f64();
        let im = Coefficient::approximate(center.im, ROOT_SNAP_TOL).to_f64();
        if im.abs() <= IMAG_TOL * (1.0 + re.abs()) {
            poles.push(Pole::Real {
                root: re,
                multiplicity: count,
            });
        } else if im > 0.0 {
            if count > 1 {
                return Err(Fault::Computation(format!(
                    "repeated complex poles at {re}±{im}j are not supported"
                )));
            }
            poles.push(Pole::Complex {
                alpha: re,
                beta: im,
            });
        }
    }

    let degree: usize = poles
        .iter()
        .map(|p| match p {
            Pole::Real { multiplicity, .. } => *multiplicity,
            Pole::Complex { .. } => 2,
        })
        .sum();
    if degree != den.degree() {
        return Err(Fault::Computation(format!(
            "could not factor denominator '{}'",
            den.to_expr(FREQ)
        )));
    }
    // slowest mode first
    poles.sort_by(|a, b| b.real_part().total_cmp(&a.real_part()));
    log::trace!("denominator poles: {poles:?}");
    Ok(poles)
}

/// Residues `c_k` with `remainder = sum_k c_k * basis_k`, where each basis
/// polynomial is the denominator with the matching factor divided out
fn solve_residues(poles: &[Pole], remainder: &Polynomial) -> FaultResult<Vec<(Residue, f64)>> {
    let factors: Vec<Polynomial> = poles.iter().map(Pole::factor).collect();
    let others = |skip: usize| -> Polynomial {
        poles
            .iter()
            .zip(&factors)
            .enumerate()
            .filter(|(i, _)| *i != skip)
            .fold(Polynomial::constant(1.0), |acc, (_, (pole, factor))| {
                &acc * &factor.powi(pole.multiplicity() as u32)
            })
    };

    let mut unknowns = Vec::new();
    let mut basis = Vec::new();
    for (i, pole) in poles.iter().enumerate() {
        let rest = others(i);
        match *pole {
            Pole::Real { root, multiplicity } => {
                for power in 1..=multiplicity {
                    unknowns.push(Residue::Real { root, power });
                    basis.push(&rest * &factors[i].powi((multiplicity - power) as u32));
                }
            }
            Pole::Complex { alpha, beta } => {
                unknowns.push(Residue::ComplexS { alpha, beta });
                basis.push(&rest * &Polynomial::x());
                unknowns.push(Residue::ComplexConst);
                basis.push(rest);
            }
        }
    }

    let n = basis.len();
    let coeff = |p: &Polynomial, k: usize| p.coeffs().get(k).copied().unwrap_or(0.0);
    let matrix = DMatrix::from_fn(n, n, |row, col| coeff(&basis[col], row));
    let rhs = DVector::from_fn(n, |row, _| coeff(remainder, row));
    let solution = matrix.lu().solve(&rhs).ok_or_else(|| {
        Fault::Computation("partial-fraction system is singular".to_string())
    })?;

    Ok(unknowns.into_iter().zip(solution.iter().copied()).collect())
}

fn time_terms(residues: &[(Residue, f64)]) -> Vec<SymExpr> {
    let mut terms = Vec::new();
    let mut iter = residues.iter().peekable();
    while let Some(&(residue, c)) = iter.next() {
        match residue {
            Residue::Real { root, power } => {
                let weight = Coefficient::approximate(c / factorial(power - 1), SNAP_TOL);
                if weight.is_zero() {
                    continue;
                }
                let mut factors = vec![SymExpr::num(weight)];
                match power - 1 {
                    0 => {}
                    1 => factors.push(SymExpr::var(TIME)),
                    k => factors.push(SymExpr::pow(SymExpr::var(TIME), SymExpr::int(k as i64))),
                }
                if root != 0.0 {
                    factors.push(SymExpr::exp(scaled_var(root, TIME)));
                }
                terms.push(SymExpr::mul(factors));
            }
            Residue::ComplexS { alpha, beta } => {
                let b = iter.next().map(|(_, b)| *b).unwrap_or(0.0);
                if let Some(term) = damped_oscillation(c, b, alpha, beta) {
                    terms.push(term);
                }
            }
            Residue::ComplexConst => {}
        }
    }
    terms
}

/// `(A*s+B)/((s-alpha)^2+beta^2)` maps to
/// `exp(alpha*t)*(A*cos(beta*t) + (B+A*alpha)/beta*sin(beta*t))`
fn damped_oscillation(a: f64, b: f64, alpha: f64, beta: f64) -> Option<SymExpr> {
    let wt = scaled_var(beta, TIME);
    let cos_weight = Coefficient::approximate(a, SNAP_TOL);
    let sin_weight = Coefficient::approximate((b + a * alpha) / beta, SNAP_TOL);

    let mut parts = Vec::new();
    if !cos_weight.is_zero() {
        parts.push(SymExpr::mul(vec![SymExpr::num(cos_weight), SymExpr::cos(wt.clone())]));
    }
    if !sin_weight.is_zero() {
        parts.push(SymExpr::mul(vec![SymExpr::num(sin_weight), SymExpr::sin(wt)]));
    }
    if parts.is_empty() {
        return None;
    }

    let oscillation = SymExpr::add(parts);
    Some(if alpha == 0.0 {
        oscillation
    } else {
        SymExpr::mul(vec![SymExpr::exp(scaled_var(alpha, TIME)), oscillation])
    })
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigcomp_parser::parse;

    fn invert(text: &str) -> String {
        inverse_expr(&parse(text).unwrap()).unwrap().to_string()
    }

    #[test]
    fn test_first_order() {
        assert_eq!(invert("1/(s+2)"), "exp(-2*t)");
        assert_eq!(invert("3/(s-1)"), "3*exp(t)");
        assert_eq!(invert("1/s"), "1");
    }

    #[test]
    fn test_distinct_real_poles() {
        // 1/((s+1)(s+2)) = 1/(s+1) - 1/(s+2)
        assert_eq!(invert("1/((s+1)*(s+2))"), "exp(-t)-exp(-2*t)");
    }

    #[test]
    fn test_repeated_pole() {
        assert_eq!(invert("1/(s+1)^2"), "t*exp(-t)");
        assert_eq!(invert("1/s^2"), "t");
    }

    #[test]
    fn test_high_multiplicity_poles() {
        let text = invert("1/(s+1)^4");
        assert!(text.contains("t^3"), "{text}");
        assert!(text.contains("exp(-t)"), "{text}");
        assert!(!text.contains('.'), "{text}");

        // 1/s - 1/(s+1) - 1/(s+1)^2 - 1/(s+1)^3
        let text = invert("1/(s*(s+1)^3)");
        assert!(text.starts_with("1-exp(-t)-t*exp(-t)"), "{text}");
        assert!(text.contains("t^2"), "{text}");
        assert!(!text.contains('.'), "{text}");
    }

    #[test]
    fn test_complex_pair() {
        assert_eq!(invert("s/(s^2+4)"), "cos(2*t)");
        let text = invert("1/(s^2+2*s+5)");
        assert!(text.contains("exp(-t)"), "{text}");
        assert!(text.contains("sin(2*t)"), "{text}");
    }

    #[test]
    fn test_proper_part_becomes_impulse() {
        assert_eq!(invert("s/(s+1)"), "DiracDelta(t)-exp(-t)");
    }

    #[test]
    fn test_delay_factor() {
        assert_eq!(invert("exp(-2*s)/s"), "Heaviside(t-2)");
        assert_eq!(invert("exp(-s)/(s+1)"), "exp(-(t-1))*Heaviside(t-1)");
    }

    #[test]
    fn test_causal_factor() {
        let result = inverse("1/(s+2)", &parse("1/(s+2)").unwrap(), true).unwrap();
        assert_eq!(result.output_t, "exp(-2*t)*Heaviside(t)");
        assert!(result.is_causal);
        assert_eq!(result.steps.first().unwrap().step, "Identify form");
        assert_eq!(result.steps.last().unwrap().step, "Final result");
        assert_eq!(result.steps.last().unwrap().value, "exp(-2*t)");

        let result = inverse("1/(s+2)", &parse("1/(s+2)").unwrap(), false).unwrap();
        assert_eq!(result.output_t, "exp(-2*t)");
        assert!(!result.is_causal);
    }

    #[test]
    fn test_causal_factor_wraps_sums() {
        let result = inverse("x", &parse("1/((s+1)*(s+2))").unwrap(), true).unwrap();
        assert_eq!(result.output_t, "(exp(-t)-exp(-2*t))*Heaviside(t)");
    }

    #[test]
    fn test_error_kinds() {
        let err = inverse_expr(&parse("s").unwrap()).unwrap_err();
        assert!(matches!(err, Fault::Computation(_)));

        let err = inverse_expr(&parse("sin(s)").unwrap()).unwrap_err();
        assert!(matches!(err, Fault::Input(_)));

        let err = inverse_expr(&parse("exp(s)/s").unwrap()).unwrap_err();
        assert!(matches!(err, Fault::Computation(_)));

        let err = inverse("t", &parse("t/s").unwrap(), true).unwrap_err();
        assert!(matches!(err, Fault::Input(_)));
    }
}
