//! Dense univariate polynomials with real coefficients.
//!
//! Rational transfer functions are handled as numerator/denominator pairs of
//! [`Polynomial`]s. Roots come from the companion matrix eigenvalues (with a
//! closed form for cubics). Eigenvalues that scatter around a repeated root
//! are merged back into one root of the right multiplicity; isolated roots
//! get a Newton polish.

use crate::coeff::Coefficient;
use crate::compiler::compile;
use crate::expr::{SymExpr, SymExprKind};
use crate::{Result, SymbolicError};
use nalgebra::DMatrix;
use num_complex::Complex64;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

const LEADING_ZERO_TOL: f64 = 1.0e-12;
const RESULT_ZERO_TOL: f64 = 1.0e-10;
/// Imaginary parts below this (relative) are treated as numerical noise
const REAL_ROOT_TOL: f64 = 1.0e-6;
const SNAP_TOL: f64 = 1.0e-9;
const MAX_EXPANDED_POWER: i64 = 64;
const NEWTON_STEPS: usize = 3;
/// A root of multiplicity m comes back as m eigenvalues spread over a circle
/// of radius about eps^(1/m), relative to its magnitude
const CLUSTER_RADIUS: f64 = 5.0e-2;
/// `p^(k)(z)` relative to `sum |c_j| |z|^j` below which a derivative vanishes
const MULTIPLICITY_TOL: f64 = 1.0e-10;

/// Polynomial stored as ascending coefficients: `coeffs[k]` multiplies `x^k`.
/// The zero polynomial has no coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coeffs: Vec<f64>,
}

impl Polynomial {
    pub fn new(mut coeffs: Vec<f64>) -> Self {
        let scale = coeffs.iter().map(|c| c.abs()).fold(0.0_f64, f64::max);
        let tol = LEADING_ZERO_TOL * scale.max(1.0);
        while coeffs.last().is_some_and(|c| c.abs() <= tol) {
            coeffs.pop();
        }
        Polynomial { coeffs }
    }

    pub fn zero() -> Self {
        Polynomial { coeffs: Vec::new() }
    }

    pub fn constant(c: f64) -> Self {
        Self::new(vec![c])
    }

    /// The polynomial `x`
    pub fn x() -> Self {
        Self::new(vec![0.0, 1.0])
    }

    /// Monic polynomial with the given real roots
    pub fn from_roots(roots: &[f64]) -> Self {
        roots.iter().fold(Self::constant(1.0), |acc, &r| {
            &acc * &Self::new(vec![-r, 1.0])
        })
    }

    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Degree; the zero polynomial reports 0
    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    pub fn leading(&self) -> f64 {
        self.coeffs.last().copied().unwrap_or(0.0)
    }

    /// Constant value, if the polynomial has degree 0
    pub fn as_constant(&self) -> Option<f64> {
        match self.coeffs.as_slice() {
            [] => Some(0.0),
            [c] => Some(*c),
            _ => None,
        }
    }

    pub fn eval(&self, x: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }

    pub fn eval_complex(&self, z: Complex64) -> Complex64 {
        self.coeffs
            .iter()
            .rev()
            .fold(Complex64::new(0.0, 0.0), |acc, &c| acc * z + c)
    }

    pub fn scale(&self, k: f64) -> Self {
        Self::new(self.coeffs.iter().map(|c| c * k).collect())
    }

    /// Divide through by the leading coefficient
    pub fn monic(&self) -> Self {
        match self.leading() {
            l if l == 0.0 => self.clone(),
            l => self.scale(1.0 / l),
        }
    }

    pub fn powi(&self, n: u32) -> Self {
        (0..n).fold(Self::constant(1.0), |acc, _| &acc * self)
    }

    pub fn derivative(&self) -> Self {
        Self::new(
            self.coeffs
                .iter()
                .enumerate()
                .skip(1)
                .map(|(k, c)| c * k as f64)
                .collect(),
        )
    }

    /// `p(x + a)`
    pub fn shift(&self, a: f64) -> Self {
        let step = Self::new(vec![a, 1.0]);
        self.coeffs
            .iter()
            .rev()
            .fold(Self::zero(), |acc, &c| &(&acc * &step) + &Self::constant(c))
    }

    /// Polynomial long division: `self = q * divisor + r` with
    /// `deg r < deg divisor`.
    pub fn div_rem(&self, divisor: &Polynomial) -> Result<(Polynomial, Polynomial)> {
        if divisor.is_zero() {
            return Err(SymbolicError::InvalidOperation(
                "polynomial division by zero".to_string(),
            ));
        }
        let d = divisor.degree();
        let lead = divisor.leading();
        let mut rem = self.coeffs.clone();
        if rem.len() <= d {
            return Ok((Self::zero(), self.clone()));
        }
        let mut quot = vec![0.0; rem.len() - d];
        for k in (0..quot.len()).rev() {
            let factor = rem[k + d] / lead;
            quot[k] = factor;
            for (j, &dc) in divisor.coeffs.iter().enumerate() {
                rem[k + j] -= factor * dc;
            }
        }
        rem.truncate(d);
        Ok((Self::new(quot), Self::new(rem)))
    }

    /// Read `expr` as a polynomial in `var`. Subtrees free of `var` are
    /// folded to numbers; `None` when the expression is not polynomial.
    pub fn from_expr(expr: &SymExpr, var: &str) -> Option<Polynomial> {
        if !expr.depends_on(var) {
            if expr.has_signal() || !expr.free_vars().is_empty() {
                return None;
            }
            let value: f64 = compile(expr).ok()?.eval(&[]).ok()?;
            return value.is_finite().then(|| Self::constant(value));
        }
        match expr.kind.as_ref() {
            SymExprKind::Var(_) => Some(Self::x()),
            SymExprKind::Add(terms) => terms.iter().try_fold(Self::zero(), |acc, t| {
                Some(&acc + &Self::from_expr(t, var)?)
            }),
            SymExprKind::Mul(factors) => factors.iter().try_fold(Self::constant(1.0), |acc, f| {
                Some(&acc * &Self::from_expr(f, var)?)
            }),
            SymExprKind::Neg(inner) => Some(-Self::from_expr(inner, var)?),
            SymExprKind::Pow(base, exp) => {
                if exp.depends_on(var) {
                    return None;
                }
                let n = Self::from_expr(exp, var)?.as_constant()?;
                if n.fract() != 0.0 || n < 0.0 || n > MAX_EXPANDED_POWER as f64 {
                    return None;
                }
                Some(Self::from_expr(base, var)?.powi(n as u32))
            }
            _ => None,
        }
    }

    /// Descending-power expression in `var`, coefficients snapped to small
    /// rationals
    pub fn to_expr(&self, var: &str) -> SymExpr {
        let x = SymExpr::var(var);
        let mut terms = Vec::new();
        for (k, &c) in self.coeffs.iter().enumerate().rev() {
            let coeff = Coefficient::approximate(c, SNAP_TOL);
            if coeff.is_zero() {
                continue;
            }
            let term = match k {
                0 => SymExpr::num(coeff),
                _ => {
                    let base = if k == 1 {
                        x.clone()
                    } else {
                        SymExpr::pow(x.clone(), SymExpr::int(k as i64))
                    };
                    if coeff.is_one() {
                        base
                    } else if coeff.is_neg_one() {
                        SymExpr::neg(base)
                    } else {
                        SymExpr::mul(vec![SymExpr::num(coeff), base])
                    }
                }
            };
            terms.push(term);
        }
        SymExpr::add(terms)
    }

    /// All complex roots, with multiplicity
    pub fn roots(&self) -> Result<Vec<Complex64>> {
        let descending = trim_leading_zeros(
            self.coeffs
                .iter()
                .rev()
                .map(|&c| Complex64::new(c, 0.0))
                .collect(),
        );
        let raw = solve_roots(&descending)?;
        Ok(self.merge_repeated(raw))
    }

    /// Group eigenvalues lying close together. A group of `m` whose mean is
    /// a root of multiplicity `m` becomes that mean repeated `m` times; any
    /// other group is polished point by point.
    fn merge_repeated(&self, raw: Vec<Complex64>) -> Vec<Complex64> {
        let mut pending = raw;
        let mut out = Vec::with_capacity(pending.len());
        while let Some(seed) = pending.pop() {
            let radius = CLUSTER_RADIUS * (1.0 + seed.norm());
            let (mut cluster, rest): (Vec<Complex64>, Vec<Complex64>) = pending
                .into_iter()
                .partition(|z| (*z - seed).norm() <= radius);
            pending = rest;
            cluster.push(seed);

            let m = cluster.len();
            if m > 1 {
                let center = cluster.iter().sum::<Complex64>() / m as f64;
                if self.vanishes_to_order(center, m) {
                    out.extend(std::iter::repeat(canonicalize_root(center)).take(m));
                    continue;
                }
            }
            out.extend(cluster.into_iter().map(|z| self.polish(z)));
        }
        out
    }

    /// True when `p` and its first `m - 1` derivatives vanish at `z`
    fn vanishes_to_order(&self, z: Complex64, m: usize) -> bool {
        let radius = z.norm();
        let mut p = self.clone();
        for _ in 0..m {
            let scale: f64 = p
                .coeffs
                .iter()
                .enumerate()
                .map(|(k, c)| c.abs() * radius.powi(k as i32))
                .sum();
            if p.eval_complex(z).norm() > MULTIPLICITY_TOL * scale.max(f64::MIN_POSITIVE) {
                return false;
            }
            p = p.derivative();
        }
        true
    }

    /// Real roots in ascending order. Complex roots are dropped.
    pub fn real_roots(&self) -> Result<Vec<f64>> {
        let mut out: Vec<f64> = self
            .roots()?
            .into_iter()
            .filter(|z| is_real(*z))
            .map(|z| snap(z.re))
            .collect();
        out.sort_by(f64::total_cmp);
        Ok(out)
    }

    /// Newton refinement, kept only while it reduces |p(z)|
    fn polish(&self, z: Complex64) -> Complex64 {
        let dp = self.derivative();
        let mut best = z;
        let mut best_err = self.eval_complex(z).norm();
        for _ in 0..NEWTON_STEPS {
            let slope = dp.eval_complex(best);
            if slope.norm() == 0.0 || best_err == 0.0 {
                break;
            }
            let candidate = best - self.eval_complex(best) / slope;
            let err = self.eval_complex(candidate).norm();
            if err.is_nan() || err >= best_err {
                break;
            }
            best = candidate;
            best_err = err;
        }
        canonicalize_root(best)
    }

    /// Remove roots shared by `num` and `den` (real roots and conjugate
    /// pairs), returning the reduced pair.
    pub fn cancel_common(num: &Polynomial, den: &Polynomial) -> Result<(Polynomial, Polynomial)> {
        if num.degree() == 0 || den.degree() == 0 {
            return Ok((num.clone(), den.clone()));
        }
        let mut den_roots = den.roots()?;
        let mut num = num.clone();
        let mut den = den.clone();
        for root in num.roots()? {
            if root.im < 0.0 {
                continue;
            }
            let Some(pos) = den_roots.iter().position(|d| roots_match(*d, root)) else {
                continue;
            };
            den_roots.swap_remove(pos);
            let factor = if is_real(root) {
                Polynomial::new(vec![-root.re, 1.0])
            } else {
                if let Some(conj) = den_roots.iter().position(|d| roots_match(*d, root.conj())) {
                    den_roots.swap_remove(conj);
                }
                Polynomial::new(vec![root.norm_sqr(), -2.0 * root.re, 1.0])
            };
            num = num.div_rem(&factor)?.0;
            den = den.div_rem(&factor)?.0;
        }
        Ok((num, den))
    }
}

fn is_real(z: Complex64) -> bool {
    z.im.abs() <= REAL_ROOT_TOL * (1.0 + z.re.abs())
}

fn roots_match(a: Complex64, b: Complex64) -> bool {
    (a - b).norm() <= 1.0e-6 * (1.0 + b.norm())
}

/// Snap to an integer or small rational when within tolerance; clears -0.0
fn snap(x: f64) -> f64 {
    let snapped = Coefficient::approximate(x, SNAP_TOL).to_f64();
    if snapped == 0.0 {
        0.0
    } else {
        snapped
    }
}

fn trim_leading_zeros(mut coeffs: Vec<Complex64>) -> Vec<Complex64> {
    if coeffs.is_empty() {
        return coeffs;
    }
    let scale = coeffs.iter().map(|c| c.norm()).fold(0.0_f64, f64::max);
    let tol = if scale == 0.0 {
        LEADING_ZERO_TOL
    } else {
        LEADING_ZERO_TOL * scale
    };
    let first_nonzero = coeffs
        .iter()
        .position(|c| c.norm() > tol)
        .unwrap_or(coeffs.len());
    coeffs.split_off(first_nonzero)
}

/// Roots of a polynomial given by descending coefficients
fn solve_roots(coeffs: &[Complex64]) -> Result<Vec<Complex64>> {
    if coeffs.len() <= 1 {
        return Ok(Vec::new());
    }
    let leading = coeffs[0];
    if leading.norm() <= LEADING_ZERO_TOL {
        return Err(SymbolicError::RootFinding(
            "leading coefficient must be non-zero after trimming".to_string(),
        ));
    }
    if coeffs.len() == 2 {
        return Ok(vec![-coeffs[1] / leading]);
    }

    let degree = coeffs.len() - 1;
    if degree == 3 {
        return Ok(cubic_roots(coeffs[0], coeffs[1], coeffs[2], coeffs[3]));
    }

    let mut companion = DMatrix::<Complex64>::zeros(degree, degree);
    for row in 1..degree {
        companion[(row, row - 1)] = Complex64::new(1.0, 0.0);
    }
    for (idx, coeff) in coeffs.iter().enumerate().skip(1) {
        companion[(0, idx - 1)] = -(*coeff) / leading;
    }

    let eigenvalues = companion.eigenvalues().ok_or_else(|| {
        SymbolicError::RootFinding("companion matrix eigenvalues did not converge".to_string())
    })?;
    Ok(eigenvalues.iter().map(|&z| canonicalize_root(z)).collect())
}

fn cubic_roots(a: Complex64, b: Complex64, c: Complex64, d: Complex64) -> Vec<Complex64> {
    // Depressed cubic via Cardano: x = y - b/(3a), y^3 + p y + q = 0
    let a2 = a * a;
    let p = (3.0 * a * c - b * b) / (3.0 * a2);
    let q = (27.0 * a2 * d - 9.0 * a * b * c + 2.0 * b * b * b) / (27.0 * a2 * a);
    let sqrt_disc = (q * q / 4.0 + p * p * p / 27.0).sqrt();

    // Take the larger branch for u and derive v from u*v = -p/3 so the pair
    // stays consistent.
    let plus = -q / 2.0 + sqrt_disc;
    let minus = -q / 2.0 - sqrt_disc;
    let w = if plus.norm() >= minus.norm() { plus } else { minus };
    let u = if w.norm() == 0.0 {
        Complex64::new(0.0, 0.0)
    } else {
        w.powf(1.0 / 3.0)
    };
    let v = if u.norm() == 0.0 {
        Complex64::new(0.0, 0.0)
    } else {
        -p / (3.0 * u)
    };

    let omega = Complex64::new(-0.5, 3.0_f64.sqrt() * 0.5);
    let omega2 = omega * omega;
    let shift = b / (3.0 * a);
    vec![
        canonicalize_root(u + v - shift),
        canonicalize_root(u * omega + v * omega2 - shift),
        canonicalize_root(u * omega2 + v * omega - shift),
    ]
}

fn canonicalize_root(z: Complex64) -> Complex64 {
    if !z.re.is_finite() || !z.im.is_finite() {
        return z;
    }
    let mut real = z.re;
    let mut imag = z.im;
    if imag.abs() <= RESULT_ZERO_TOL * (1.0 + real.abs()) {
        imag = 0.0;
    }
    if real.abs() <= RESULT_ZERO_TOL {
        real = 0.0;
    }
    Complex64::new(real, imag)
}

impl Add for &Polynomial {
    type Output = Polynomial;

    fn add(self, rhs: &Polynomial) -> Polynomial {
        let n = self.coeffs.len().max(rhs.coeffs.len());
        let at = |p: &Polynomial, k: usize| p.coeffs.get(k).copied().unwrap_or(0.0);
        Polynomial::new((0..n).map(|k| at(self, k) + at(rhs, k)).collect())
    }
}

impl Sub for &Polynomial {
    type Output = Polynomial;

    fn sub(self, rhs: &Polynomial) -> Polynomial {
        self + &(-rhs.clone())
    }
}

impl Mul for &Polynomial {
    type Output = Polynomial;

    fn mul(self, rhs: &Polynomial) -> Polynomial {
        if self.is_zero() || rhs.is_zero() {
            return Polynomial::zero();
        }
        let mut out = vec![0.0; self.coeffs.len() + rhs.coeffs.len() - 1];
        for (i, &a) in self.coeffs.iter().enumerate() {
            for (j, &b) in rhs.coeffs.iter().enumerate() {
                out[i + j] += a * b;
            }
        }
        Polynomial::new(out)
    }
}

impl Neg for Polynomial {
    type Output = Polynomial;

    fn neg(self) -> Polynomial {
        Polynomial::new(self.coeffs.into_iter().map(|c| -c).collect())
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_expr("x"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s() -> SymExpr {
        SymExpr::var("s")
    }

    #[test]
    fn test_arithmetic_and_degree() {
        let p = Polynomial::new(vec![1.0, 1.0]); // 1 + x
        let q = &p * &p;
        assert_eq!(q.coeffs(), &[1.0, 2.0, 1.0]);
        assert_eq!(q.degree(), 2);
        assert!((&q - &q).is_zero());
        assert_eq!(Polynomial::from_roots(&[1.0, 2.0]).coeffs(), &[2.0, -3.0, 1.0]);
    }

    #[test]
    fn test_div_rem() {
        // (x^2 + 3x + 5) / (x + 1) = x + 2 rem 3
        let p = Polynomial::new(vec![5.0, 3.0, 1.0]);
        let (q, r) = p.div_rem(&Polynomial::new(vec![1.0, 1.0])).unwrap();
        assert_eq!(q.coeffs(), &[2.0, 1.0]);
        assert_eq!(r.coeffs(), &[3.0]);
        assert!(p.div_rem(&Polynomial::zero()).is_err());
    }

    #[test]
    fn test_shift_and_derivative() {
        // (x^2)(x -> x - 1) = x^2 - 2x + 1
        let p = Polynomial::new(vec![0.0, 0.0, 1.0]);
        assert_eq!(p.shift(-1.0).coeffs(), &[1.0, -2.0, 1.0]);
        assert_eq!(p.derivative().coeffs(), &[0.0, 2.0]);
    }

    #[test]
    fn test_from_expr() {
        // (s + 1)*(s + 2) - 2
        let expr = SymExpr::add(vec![
            (s() + SymExpr::int(1)) * (s() + SymExpr::int(2)),
            SymExpr::int(-2),
        ]);
        let p = Polynomial::from_expr(&expr, "s").unwrap();
        assert_eq!(p.coeffs(), &[0.0, 3.0, 1.0]);

        let scaled = SymExpr::int(2) * SymExpr::pow(s(), SymExpr::int(3));
        assert_eq!(
            Polynomial::from_expr(&scaled, "s").unwrap().coeffs(),
            &[0.0, 0.0, 0.0, 2.0]
        );

        assert!(Polynomial::from_expr(&SymExpr::recip(s()), "s").is_none());
        assert!(Polynomial::from_expr(&SymExpr::exp(s()), "s").is_none());
        assert!(Polynomial::from_expr(&SymExpr::var("t"), "s").is_none());
    }

    #[test]
    fn test_to_expr_text() {
        let p = Polynomial::new(vec![5.0, -2.0, 1.0]);
        assert_eq!(p.to_expr("s").to_string(), "s^2-2*s+5");
        let q = Polynomial::new(vec![0.0, -1.0]);
        assert_eq!(q.to_expr("s").to_string(), "-s");
        assert_eq!(Polynomial::zero().to_expr("s").to_string(), "0");
    }

    #[test]
    fn test_real_roots_sorted() {
        let p = Polynomial::from_roots(&[3.0, -1.0, 0.5]);
        assert_eq!(p.real_roots().unwrap(), vec![-1.0, 0.5, 3.0]);
    }

    #[test]
    fn test_complex_roots_dropped_from_real_roots() {
        // s^2 + 2s + 5 has roots -1 +- 2j
        let p = Polynomial::new(vec![5.0, 2.0, 1.0]);
        let roots = p.roots().unwrap();
        assert_eq!(roots.len(), 2);
        assert!(roots
            .iter()
            .all(|z| (z.re + 1.0).abs() < 1e-9 && (z.im.abs() - 2.0).abs() < 1e-9));
        assert!(p.real_roots().unwrap().is_empty());
    }

    #[test]
    fn test_cubic_repeated_root() {
        // (x + 1)^3
        let p = Polynomial::new(vec![1.0, 3.0, 3.0, 1.0]);
        let roots = p.roots().unwrap();
        assert_eq!(roots.len(), 3);
        for z in roots {
            assert!((z - Complex64::new(-1.0, 0.0)).norm() < 1e-4);
        }
    }

    #[test]
    fn test_fourfold_root_stays_real() {
        // (x + 1)^4
        let p = Polynomial::from_roots(&[-1.0; 4]);
        assert_eq!(p.real_roots().unwrap(), vec![-1.0; 4]);
    }

    #[test]
    fn test_mixed_multiplicities() {
        let p = Polynomial::from_roots(&[0.0, -1.0, -1.0, -1.0]);
        assert_eq!(p.real_roots().unwrap(), vec![-1.0, -1.0, -1.0, 0.0]);

        let q = Polynomial::from_roots(&[-1.0, -1.0, -2.0, -2.0]);
        assert_eq!(q.real_roots().unwrap(), vec![-2.0, -2.0, -1.0, -1.0]);

        let high = Polynomial::from_roots(&[-3.0; 5]);
        assert_eq!(high.real_roots().unwrap(), vec![-3.0; 5]);
    }

    #[test]
    fn test_close_distinct_roots_are_not_merged() {
        let p = Polynomial::from_roots(&[-1.0, -1.02, -4.0, -5.0]);
        let roots = p.real_roots().unwrap();
        assert_eq!(roots.len(), 4);
        assert!((roots[2] + 1.02).abs() < 1e-9);
        assert!((roots[3] + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_complex_pair() {
        // (x^2 + 1)^2
        let p = Polynomial::new(vec![1.0, 0.0, 2.0, 0.0, 1.0]);
        let roots = p.roots().unwrap();
        assert_eq!(roots.len(), 4);
        assert!(roots.iter().all(|z| z.re.abs() < 1e-9 && (z.im.abs() - 1.0).abs() < 1e-9));
        assert!(p.real_roots().unwrap().is_empty());
    }

    #[test]
    fn test_quartic_roots() {
        let p = Polynomial::from_roots(&[-1.0, -2.0, -3.0, -4.0]);
        assert_eq!(p.real_roots().unwrap(), vec![-4.0, -3.0, -2.0, -1.0]);
    }

    #[test]
    fn test_cancel_common() {
        // (s + 1) / ((s + 1)(s + 2)) -> 1 / (s + 2)
        let num = Polynomial::from_roots(&[-1.0]);
        let den = Polynomial::from_roots(&[-1.0, -2.0]);
        let (n, d) = Polynomial::cancel_common(&num, &den).unwrap();
        assert_eq!(n.degree(), 0);
        assert!((n.coeffs()[0] - 1.0).abs() < 1e-9);
        assert_eq!(d.degree(), 1);
        assert!((d.coeffs()[0] - 2.0).abs() < 1e-9);
    }
}
