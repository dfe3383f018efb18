//! One-sided Laplace transform of time-domain expressions.
//!
//! The input is expanded into a sum of terms and each term is matched as
//! `c * t^n * exp(a*t) * osc(b*t + phi)`, possibly switched on by a delayed
//! unit step or sifted by an impulse. Terms sharing a delay are combined over
//! a common denominator.

use crate::error::{Fault, FaultResult};
use crate::rational::{decompose, poles_and_zeros, scaled_var, RationalFunction, SNAP_TOL};
use crate::sampler::eval_at;
use serde::{Deserialize, Serialize};
use sigcomp_symbolic::{
    Coefficient, Polynomial, StagedNormalizer, SymExpr, SymExprKind, DIRAC_DELTA, HEAVISIDE,
};

const TIME: &str = "t";
const FREQ: &str = "s";
const ALL_S: &str = "All s";

/// Time-domain input with its transform, region of convergence and real
/// poles/zeros
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformPair {
    pub input_t: String,
    pub output_s: String,
    pub roc: String,
    pub poles: Vec<f64>,
    pub zeros: Vec<f64>,
}

/// `rational(s) * exp(-delay*s)`, converging for `Re(s) > abscissa`
/// (everywhere when `None`)
#[derive(Debug, Clone)]
struct Piece {
    rational: RationalFunction,
    abscissa: Option<f64>,
    delay: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Oscillator {
    Sin,
    Cos,
}

#[derive(Debug, Clone)]
struct Kernel {
    coeff: f64,
    power: u32,
    rate: f64,
    /// kind, angular frequency, phase
    oscillator: Option<(Oscillator, f64, f64)>,
}

pub(crate) fn forward(expr: &SymExpr) -> FaultResult<TransformPair> {
    if let Some(var) = expr.free_vars().into_iter().find(|v| v != TIME) {
        return Err(Fault::Input(format!(
            "unexpected variable '{var}' in a time-domain expression"
        )));
    }

    let normalized = StagedNormalizer::aggressive().apply(expr.clone());
    let pieces = transform_sum(&normalized)?;
    log::debug!("'{expr}' expands to {} transformed term(s)", pieces.len());

    let roc = region_of_convergence(&pieces);
    let output = combine(pieces)?;

    let form = decompose(&output);
    let (poles, zeros) = if form.is_ratio() {
        poles_and_zeros(&form, FREQ)
    } else {
        (Vec::new(), Vec::new())
    };

    Ok(TransformPair {
        input_t: expr.to_string(),
        output_s: output.to_string(),
        roc,
        poles,
        zeros,
    })
}

fn transform_sum(expr: &SymExpr) -> FaultResult<Vec<Piece>> {
    let terms = match expr.kind.as_ref() {
        SymExprKind::Add(terms) => terms.clone(),
        _ => vec![expr.clone()],
    };
    let mut pieces = Vec::new();
    for term in &terms {
        pieces.extend(transform_term(term)?);
    }
    Ok(pieces)
}

fn transform_term(term: &SymExpr) -> FaultResult<Vec<Piece>> {
    let mut sign = 1.0;
    let mut factors = Vec::new();
    flatten_factors(term, &mut sign, &mut factors);

    let (steps, rest): (Vec<SymExpr>, Vec<SymExpr>) = factors
        .into_iter()
        .partition(|f| time_call_arg(f, HEAVISIDE).is_some());

    let mut delay = 0.0_f64;
    for step in &steps {
        delay = delay.max(step_start(step)?);
    }
    if delay > 0.0 {
        return delayed(&signed(sign, rest), delay);
    }

    if let Some(pos) = rest.iter().position(|f| time_call_arg(f, DIRAC_DELTA).is_some()) {
        let mut others = rest;
        let delta = others.remove(pos);
        return sift(&delta, sign, &others);
    }

    if let Some((pos, poly)) = rest
        .iter()
        .enumerate()
        .find_map(|(i, f)| polynomial_sum(f).map(|p| (i, p)))
    {
        let mut others = rest;
        others.remove(pos);
        return transform_sum(&distribute(&poly, sign, &others));
    }

    Ok(vec![classify(sign, &rest)?.transform()?])
}

fn flatten_factors(expr: &SymExpr, sign: &mut f64, out: &mut Vec<SymExpr>) {
    match expr.kind.as_ref() {
        SymExprKind::Neg(inner) => {
            *sign = -*sign;
            flatten_factors(inner, sign, out);
        }
        SymExprKind::Mul(factors) => {
            for factor in factors {
                flatten_factors(factor, sign, out);
            }
        }
        _ => out.push(expr.clone()),
    }
}

fn signed(sign: f64, factors: Vec<SymExpr>) -> SymExpr {
    let product = SymExpr::mul(factors);
    if sign < 0.0 {
        SymExpr::neg(product)
    } else {
        product
    }
}

/// Argument of a one-argument call to `name` that depends on time
fn time_call_arg<'a>(expr: &'a SymExpr, name: &str) -> Option<&'a SymExpr> {
    match expr.as_func() {
        Some((func, [arg])) if func == name && arg.depends_on(TIME) => Some(arg),
        _ => None,
    }
}

/// `(k, m)` for an argument of the form `k*t + m`
fn linear_in_time(arg: &SymExpr) -> Option<(f64, f64)> {
    let poly = Polynomial::from_expr(arg, TIME)?;
    match poly.coeffs() {
        [] => Some((0.0, 0.0)),
        [m] => Some((0.0, *m)),
        [m, k] => Some((*k, *m)),
        _ => None,
    }
}

/// Switch-on time of `Heaviside(k*t + m)` with `k > 0`
fn step_start(step: &SymExpr) -> FaultResult<f64> {
    let (k, m) = time_call_arg(step, HEAVISIDE)
        .and_then(linear_in_time)
        .ok_or_else(|| no_rule(step))?;
    if k <= 0.0 {
        return Err(Fault::Computation(format!(
            "'{step}' is not switched on at a finite time; no one-sided transform rule applies"
        )));
    }
    Ok(Coefficient::approximate(-m / k, SNAP_TOL).to_f64())
}

/// `g(t)*u(t-c)` transforms to `exp(-c*s) * L{g(t+c)}`
fn delayed(body: &SymExpr, delay: f64) -> FaultResult<Vec<Piece>> {
    let advanced = SymExpr::add(vec![
        SymExpr::var(TIME),
        SymExpr::num(Coefficient::approximate(delay, SNAP_TOL)),
    ]);
    let shifted = StagedNormalizer::aggressive().apply(body.substitute(TIME, &advanced));
    log::trace!("term delayed by {delay}: transforming '{shifted}'");

    let mut pieces = transform_sum(&shifted)?;
    for piece in &mut pieces {
        piece.delay += delay;
    }
    Ok(pieces)
}

/// `g(t)*DiracDelta(k*t+m)` picks out `g(t0)/|k|` at `t0 = -m/k`
fn sift(delta: &SymExpr, sign: f64, others: &[SymExpr]) -> FaultResult<Vec<Piece>> {
    if others
        .iter()
        .any(|f| time_call_arg(f, DIRAC_DELTA).is_some())
    {
        return Err(Fault::Computation(format!(
            "no Laplace transform rule for a product of impulses in '{}'",
            SymExpr::mul(others.to_vec()).times(delta.clone())
        )));
    }
    let (k, m) = time_call_arg(delta, DIRAC_DELTA)
        .and_then(linear_in_time)
        .filter(|(k, _)| *k != 0.0)
        .ok_or_else(|| no_rule(delta))?;

    let at = Coefficient::approximate(-m / k, SNAP_TOL).to_f64();
    if at < 0.0 {
        return Ok(Vec::new());
    }
    let weight = SymExpr::mul(others.to_vec());
    let value = eval_at(&weight, TIME, at).ok_or_else(|| {
        Fault::Computation(format!("cannot evaluate '{weight}' at t = {at}"))
    })?;

    Ok(vec![Piece {
        rational: RationalFunction::constant(sign * value / k.abs()),
        abscissa: None,
        delay: at,
    }])
}

/// Polynomial in time with more than one term
fn polynomial_sum(factor: &SymExpr) -> Option<Polynomial> {
    if !factor.depends_on(TIME) {
        return None;
    }
    let poly = Polynomial::from_expr(factor, TIME)?;
    let terms = poly.coeffs().iter().filter(|c| **c != 0.0).count();
    (terms > 1).then_some(poly)
}

/// `sign * poly(t) * others` as a sum of monomial terms
fn distribute(poly: &Polynomial, sign: f64, others: &[SymExpr]) -> SymExpr {
    let terms = poly
        .coeffs()
        .iter()
        .enumerate()
        .filter(|(_, c)| **c != 0.0)
        .map(|(k, &c)| {
            let mut factors = vec![SymExpr::float(sign * c)];
            match k {
                0 => {}
                1 => factors.push(SymExpr::var(TIME)),
                _ => factors.push(SymExpr::pow(SymExpr::var(TIME), SymExpr::int(k as i64))),
            }
            factors.extend(others.iter().cloned());
            SymExpr::mul(factors)
        })
        .collect();
    SymExpr::add(terms)
}

fn classify(sign: f64, factors: &[SymExpr]) -> FaultResult<Kernel> {
    let mut kernel = Kernel {
        coeff: sign,
        power: 0,
        rate: 0.0,
        oscillator: None,
    };

    for factor in factors {
        if let Some(poly) = Polynomial::from_expr(factor, TIME) {
            if poly.is_zero() {
                kernel.coeff = 0.0;
            } else {
                kernel.coeff *= poly.leading();
                kernel.power += poly.degree() as u32;
            }
            continue;
        }

        match factor.kind.as_ref() {
            SymExprKind::Func(name, args) if args.len() == 1 => {
                let (k, m) = linear_in_time(&args[0]).ok_or_else(|| no_rule(factor))?;
                match name.as_str() {
                    "exp" => {
                        kernel.rate += k;
                        kernel.coeff *= m.exp();
                    }
                    "sin" | "cos" => {
                        if kernel.oscillator.is_some() {
                            return Err(Fault::Computation(format!(
                                "no Laplace transform rule for a product of sinusoids ('{factor}')"
                            )));
                        }
                        let kind = if name == "sin" {
                            Oscillator::Sin
                        } else {
                            Oscillator::Cos
                        };
                        kernel.oscillator = Some((kind, k, m));
                    }
                    _ => return Err(no_rule(factor)),
                }
            }
            // a^(k*t+m) = exp(log(a)*(k*t+m))
            SymExprKind::Pow(base, exp) if !base.depends_on(TIME) => {
                let a = eval_at(base, TIME, 0.0)
                    .filter(|a| *a > 0.0)
                    .ok_or_else(|| no_rule(factor))?;
                let (k, m) = linear_in_time(exp).ok_or_else(|| no_rule(factor))?;
                kernel.rate += a.ln() * k;
                kernel.coeff *= a.powf(m);
            }
            _ => return Err(no_rule(factor)),
        }
    }
    Ok(kernel)
}

impl Kernel {
    fn transform(&self) -> FaultResult<Piece> {
        let base = match self.oscillator {
            None => RationalFunction::new(
                Polynomial::constant(factorial(self.power)),
                Polynomial::x().powi(self.power + 1),
            )?,
            Some((kind, b, phase)) => {
                // sin(bt+p) = sin(p)cos(bt) + cos(p)sin(bt)
                // cos(bt+p) = cos(p)cos(bt) - sin(p)sin(bt)
                let (s_coeff, b_coeff) = match kind {
                    Oscillator::Sin => (phase.sin(), phase.cos()),
                    Oscillator::Cos => (phase.cos(), -phase.sin()),
                };
                let mut f = RationalFunction::new(
                    Polynomial::new(vec![b_coeff * b, s_coeff]),
                    Polynomial::new(vec![b * b, 0.0, 1.0]),
                )?;
                // t^n f(t) <-> (-d/ds)^n F(s)
                for _ in 0..self.power {
                    f = f.derivative()?.scale(-1.0);
                }
                f
            }
        };

        Ok(Piece {
            rational: base.shift(self.rate).scale(self.coeff),
            abscissa: Some(self.rate),
            delay: 0.0,
        })
    }
}

fn factorial(n: u32) -> f64 {
    (1..=n).map(f64::from).product()
}

fn no_rule(expr: &SymExpr) -> Fault {
    Fault::Computation(format!("no Laplace transform rule for '{expr}'"))
}

fn region_of_convergence(pieces: &[Piece]) -> String {
    pieces
        .iter()
        .filter_map(|p| p.abscissa)
        .reduce(f64::max)
        .map(|a| format!("Re(s) > {}", Coefficient::approximate(a, SNAP_TOL)))
        .unwrap_or_else(|| ALL_S.to_string())
}

/// Sum the pieces per delay and attach `exp(-c*s)` to delayed groups
fn combine(pieces: Vec<Piece>) -> FaultResult<SymExpr> {
    let mut groups: Vec<(f64, RationalFunction)> = Vec::new();
    for piece in pieces {
        match groups
            .iter_mut()
            .find(|(delay, _)| (delay - piece.delay).abs() <= SNAP_TOL)
        {
            Some((_, sum)) => *sum = sum.add(&piece.rational)?,
            None => groups.push((piece.delay, piece.rational)),
        }
    }
    groups.sort_by(|a, b| a.0.total_cmp(&b.0));

    let terms = groups
        .into_iter()
        .filter(|(_, f)| !f.is_zero())
        .map(|(delay, f)| {
            let shift = if delay > 0.0 {
                vec![SymExpr::exp(scaled_var(-delay, FREQ))]
            } else {
                Vec::new()
            };
            f.to_expr_with(FREQ, shift)
        })
        .collect();
    Ok(SymExpr::add(terms))
}
