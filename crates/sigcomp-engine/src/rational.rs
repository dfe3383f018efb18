//! Rational function analysis: numerator/denominator split, real roots and
//! arithmetic on polynomial ratios.

use crate::error::{Fault, FaultResult};
use sigcomp_symbolic::{Coefficient, Polynomial, SymExpr, SymExprKind};

pub(crate) const SNAP_TOL: f64 = 1.0e-9;

/// Numerator and denominator of an expression read as a quotient.
/// Non-quotients have denominator 1.
#[derive(Debug, Clone, PartialEq)]
pub struct RationalForm {
    pub numerator: SymExpr,
    pub denominator: SymExpr,
}

impl RationalForm {
    pub fn is_ratio(&self) -> bool {
        !self.denominator.is_one()
    }
}

/// Split a product or quotient into numerator and denominator. Factors with
/// a negative integer exponent go to the denominator.
pub fn decompose(expr: &SymExpr) -> RationalForm {
    let factors: Vec<SymExpr> = match expr.kind.as_ref() {
        SymExprKind::Mul(factors) => factors.clone(),
        SymExprKind::Pow(..) => vec![expr.clone()],
        _ => {
            return RationalForm {
                numerator: expr.clone(),
                denominator: SymExpr::int(1),
            }
        }
    };

    let mut numerator = Vec::new();
    let mut denominator = Vec::new();
    for factor in factors {
        match negative_power(&factor) {
            Some((base, 1)) => denominator.push(base),
            Some((base, k)) => denominator.push(SymExpr::pow(base, SymExpr::int(k))),
            None => numerator.push(factor),
        }
    }
    RationalForm {
        numerator: SymExpr::mul(numerator),
        denominator: SymExpr::mul(denominator),
    }
}

/// `(base, k)` for `base^-k` with integer `k > 0`
fn negative_power(expr: &SymExpr) -> Option<(SymExpr, i64)> {
    let SymExprKind::Pow(base, exp) = expr.kind.as_ref() else {
        return None;
    };
    let k = match exp.kind.as_ref() {
        SymExprKind::Num(c) => c.as_integer()?,
        SymExprKind::Neg(inner) => -inner.as_coeff()?.as_integer()?,
        _ => return None,
    };
    (k < 0).then(|| (base.as_ref().clone(), -k))
}

/// Real roots of `expr` read as a polynomial in `var`. Complex roots are
/// dropped; a non-polynomial or failed root search yields no roots.
pub fn find_real_roots(expr: &SymExpr, var: &str) -> Vec<f64> {
    let Some(poly) = Polynomial::from_expr(expr, var) else {
        log::warn!("'{expr}' is not a polynomial in {var}; reporting no roots");
        return Vec::new();
    };
    match poly.real_roots() {
        Ok(roots) => roots,
        Err(err) => {
            log::warn!("root finding for '{expr}' failed: {err}");
            Vec::new()
        }
    }
}

/// Real poles and zeros of a quotient. A constant-one numerator has no zeros.
pub fn poles_and_zeros(form: &RationalForm, var: &str) -> (Vec<f64>, Vec<f64>) {
    let zeros = if form.numerator.is_one() {
        Vec::new()
    } else {
        find_real_roots(&form.numerator, var)
    };
    let poles = find_real_roots(&form.denominator, var);
    (poles, zeros)
}

/// `num / den` with real polynomial coefficients; `den` is kept monic
#[derive(Debug, Clone, PartialEq)]
pub struct RationalFunction {
    pub num: Polynomial,
    pub den: Polynomial,
}

impl RationalFunction {
    pub fn new(num: Polynomial, den: Polynomial) -> FaultResult<Self> {
        if den.is_zero() {
            return Err(Fault::Computation("division by zero".to_string()));
        }
        let lead = den.leading();
        Ok(RationalFunction {
            num: num.scale(1.0 / lead),
            den: den.monic(),
        })
    }

    pub fn constant(c: f64) -> Self {
        RationalFunction {
            num: Polynomial::constant(c),
            den: Polynomial::constant(1.0),
        }
    }

    pub fn polynomial(p: Polynomial) -> Self {
        RationalFunction {
            num: p,
            den: Polynomial::constant(1.0),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    /// Read `expr` as a ratio of polynomials in `var`, combining sums and
    /// products of fractions. `None` if some part is not rational.
    pub fn from_expr(expr: &SymExpr, var: &str) -> Option<Self> {
        if let Some(p) = Polynomial::from_expr(expr, var) {
            return Some(Self::polynomial(p));
        }
        match expr.kind.as_ref() {
            SymExprKind::Add(terms) => terms.iter().try_fold(Self::constant(0.0), |acc, t| {
                acc.add(&Self::from_expr(t, var)?).ok()
            }),
            SymExprKind::Mul(factors) => factors.iter().try_fold(Self::constant(1.0), |acc, f| {
                acc.mul(&Self::from_expr(f, var)?).ok()
            }),
            SymExprKind::Neg(inner) => Some(Self::from_expr(inner, var)?.scale(-1.0)),
            SymExprKind::Pow(..) => {
                let (base, k) = negative_power(expr)?;
                let recip = Self::from_expr(&base, var)?.recip().ok()?;
                Some(recip.powi(u32::try_from(k).ok()?))
            }
            _ => None,
        }
    }

    pub fn scale(&self, k: f64) -> Self {
        RationalFunction {
            num: self.num.scale(k),
            den: self.den.clone(),
        }
    }

    pub fn recip(&self) -> FaultResult<Self> {
        Self::new(self.den.clone(), self.num.clone())
    }

    pub fn powi(&self, n: u32) -> Self {
        RationalFunction {
            num: self.num.powi(n),
            den: self.den.powi(n),
        }
    }

    pub fn add(&self, other: &RationalFunction) -> FaultResult<Self> {
        if self.den == other.den {
            return Self::new(&self.num + &other.num, self.den.clone());
        }
        let num = &(&self.num * &other.den) + &(&other.num * &self.den);
        let den = &self.den * &other.den;
        let (num, den) = Polynomial::cancel_common(&num, &den)?;
        Self::new(num, den)
    }

    pub fn mul(&self, other: &RationalFunction) -> FaultResult<Self> {
        let (num, den) =
            Polynomial::cancel_common(&(&self.num * &other.num), &(&self.den * &other.den))?;
        Self::new(num, den)
    }

    /// `F(s - a)`, the frequency shift by `a`
    pub fn shift(&self, a: f64) -> Self {
        RationalFunction {
            num: self.num.shift(-a),
            den: self.den.shift(-a),
        }
    }

    /// `dF/ds = (N'D - ND') / D^2`
    pub fn derivative(&self) -> FaultResult<Self> {
        let num = &(&self.num.derivative() * &self.den) - &(&self.num * &self.den.derivative());
        let den = &self.den * &self.den;
        let (num, den) = Polynomial::cancel_common(&num, &den)?;
        Self::new(num, den)
    }

    /// `num*extra/den` in `var`; a numerator of 1 is omitted when `extra`
    /// factors are present
    pub fn to_expr_with(&self, var: &str, extra: Vec<SymExpr>) -> SymExpr {
        let num = self.num.to_expr(var);
        let mut factors = Vec::with_capacity(extra.len() + 2);
        if !num.is_one() || extra.is_empty() {
            factors.push(num);
        }
        factors.extend(extra);
        if self.den.degree() > 0 {
            factors.push(SymExpr::recip(self.den.to_expr(var)));
        }
        SymExpr::mul(factors)
    }
}

/// `c*var`, written as `var` or `-var` for unit coefficients
pub(crate) fn scaled_var(c: f64, var: &str) -> SymExpr {
    let coeff = Coefficient::approximate(c, SNAP_TOL);
    let x = SymExpr::var(var);
    if coeff.is_one() {
        x
    } else if coeff.is_neg_one() {
        SymExpr::neg(x)
    } else {
        SymExpr::mul(vec![SymExpr::num(coeff), x])
    }
}

/// Number snapped to a small rational when within tolerance
pub(crate) fn snapped(c: f64) -> SymExpr {
    SymExpr::num(Coefficient::approximate(c, SNAP_TOL))
}
